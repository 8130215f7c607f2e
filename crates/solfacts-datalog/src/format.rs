//! Render lifted facts through message templates.
//!
//! A template refers to the fact's columns positionally. `{0}` renders the
//! first value; `{1}.name` follows the `name` field of the node in the second
//! column; `{0}.source` reads the source text the node was parsed from.
//!
//! Cross references such as `referencedDeclaration` are bare identifiers in
//! the tree. Given a [`NodeIndex`], a path continuing past one resolves it,
//! so `{0}.referencedDeclaration.name` names the declaration.

use std::collections::HashMap;
use std::sync::OnceLock;

use regex::{Captures, Regex};
use solfacts_ast::{Node, NodeIndex, SourceLocation, Value};

use crate::DatalogError;
use crate::lift::{Lifted, LiftedFact};

/// Accessor returning a node's original source text.
pub const SOURCE_ACCESSOR: &str = "source";

fn placeholder_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"\{(\d+)\}((?:\.[A-Za-z_0-9]+)*)").expect("placeholder regex is valid")
    })
}

/// Formats lifted facts, with optional access to source files by index.
#[derive(Debug, Clone, Default)]
pub struct TemplateFormatter<'i> {
    sources: HashMap<usize, Vec<u8>>,
    nodes: Option<&'i NodeIndex<'i>>,
}

impl<'i> TemplateFormatter<'i> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Resolve identifiers reached by accessor paths against `nodes`.
    pub fn with_index(mut self, nodes: &'i NodeIndex<'i>) -> Self {
        self.nodes = Some(nodes);
        self
    }

    /// Supply the contents of source file `index` for the `source` accessor.
    pub fn with_source(mut self, index: usize, contents: impl Into<Vec<u8>>) -> Self {
        self.sources.insert(index, contents.into());
        self
    }

    /// Substitute every placeholder of `template` from `fact`.
    ///
    /// Text outside placeholders is copied unchanged. The first placeholder
    /// that cannot be resolved fails the whole message.
    pub fn format<'a>(&self, fact: &LiftedFact<'a>, template: &str) -> Result<String, DatalogError>
    where
        'i: 'a,
    {
        let mut error = None;
        let rendered = placeholder_regex().replace_all(template, |cap: &Captures<'_>| {
            if error.is_some() {
                return String::new();
            }
            match self.resolve(fact, &cap[1], &cap[2]) {
                Ok(value) => value.to_string(),
                Err(e) => {
                    error = Some(e);
                    String::new()
                }
            }
        });
        match error {
            Some(e) => Err(e),
            None => Ok(rendered.into_owned()),
        }
    }

    fn resolve<'a>(
        &self,
        fact: &LiftedFact<'a>,
        index: &str,
        path: &str,
    ) -> Result<Lifted<'a>, DatalogError>
    where
        'i: 'a,
    {
        let fail = |placeholder: usize| DatalogError::FormatPathError {
            placeholder,
            path: path.to_string(),
        };
        let placeholder: usize = index.parse().map_err(|_| fail(usize::MAX))?;
        let mut current = fact.get(placeholder).cloned().ok_or_else(|| fail(placeholder))?;

        for segment in path.split('.').skip(1) {
            current = self.step(current, segment).ok_or_else(|| fail(placeholder))?;
        }
        Ok(current)
    }

    fn step<'a>(&self, value: Lifted<'a>, segment: &str) -> Option<Lifted<'a>>
    where
        'i: 'a,
    {
        match value {
            Lifted::Node(node) => self.node_accessor(node, segment),
            Lifted::Number(id) => self.node_accessor(self.nodes?.get(id)?, segment),
            Lifted::Variant { tag, payload } => {
                if segment == "tag" {
                    return Some(Lifted::Text(tag));
                }
                take_named(payload, segment)
            }
            Lifted::Record(fields) => take_named(fields, segment),
            Lifted::List(items) => {
                if segment == "len" {
                    return Some(Lifted::Number(items.len() as i64));
                }
                let index: usize = segment.parse().ok()?;
                items.into_iter().nth(index)
            }
            _ => None,
        }
    }

    fn node_accessor<'a>(&self, node: &'a Node, segment: &str) -> Option<Lifted<'a>> {
        match segment {
            "id" => Some(Lifted::Number(node.id)),
            "nodeType" => Some(Lifted::Text(node.node_type.clone())),
            "src" => Some(Lifted::Text(node.src.clone())),
            SOURCE_ACCESSOR => {
                let location: SourceLocation = node.src.parse().ok()?;
                let contents = self.sources.get(&location.file?)?;
                let bytes = location.slice(contents)?;
                Some(Lifted::Text(String::from_utf8_lossy(bytes).into_owned()))
            }
            field => node.field(field).map(from_tree),
        }
    }
}

fn take_named<'a>(fields: Vec<(String, Lifted<'a>)>, name: &str) -> Option<Lifted<'a>> {
    fields.into_iter().find(|(n, _)| n == name).map(|(_, v)| v)
}

/// A tree field value as a lifted value.
fn from_tree(value: &Value) -> Lifted<'_> {
    match value {
        Value::Null => Lifted::Absent,
        Value::Bool(b) => Lifted::Bool(*b),
        Value::Int(n) => Lifted::Number(*n),
        Value::Str(s) => Lifted::Text(s.clone()),
        Value::Node(node) => Lifted::Node(node.as_ref()),
        Value::List(items) => Lifted::List(items.iter().map(from_tree).collect()),
        Value::Map(entries) => Lifted::Record(
            entries
                .iter()
                .map(|(k, v)| (k.clone(), from_tree(v)))
                .collect(),
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    const SOURCE: &str = "contract Vault { function drain() external {} }";

    fn function() -> Node {
        Node::new(7, "FunctionDefinition", "17:28:0")
            .with("name", "drain")
            .with("visibility", "external")
            .with(
                "parameters",
                Node::new(8, "ParameterList", "31:2:0").with("parameters", Vec::<Node>::new()),
            )
    }

    fn fact(node: &Node) -> LiftedFact<'_> {
        LiftedFact {
            relation: "finding".to_string(),
            columns: vec!["fn".into(), "loc".into(), "path".into()],
            values: vec![
                Lifted::Node(node),
                Lifted::Variant {
                    tag: "Member".to_string(),
                    payload: vec![
                        ("base".to_string(), Lifted::Node(node)),
                        ("field".to_string(), Lifted::Text("balance".to_string())),
                    ],
                },
                Lifted::List(vec![Lifted::Number(3), Lifted::Number(5)]),
            ],
        }
    }

    #[test]
    fn test_plain_placeholders() {
        let node = function();
        let formatter = TemplateFormatter::new();
        assert_eq!(
            formatter.format(&fact(&node), "{0} writes {1} via {2}").unwrap(),
            "FunctionDefinition#7 writes Member(FunctionDefinition#7, balance) via [3,5]"
        );
    }

    #[test]
    fn test_accessor_paths() {
        let node = function();
        let formatter = TemplateFormatter::new();
        let fact = fact(&node);

        assert_eq!(
            formatter
                .format(&fact, "{0}.name is {0}.visibility ({0}.nodeType {0}.id at {0}.src)")
                .unwrap(),
            "drain is external (FunctionDefinition 7 at 17:28:0)"
        );
        assert_eq!(
            formatter.format(&fact, "{1}.tag {1}.base.name.{1}.field").unwrap(),
            "Member drain.balance"
        );
        assert_eq!(formatter.format(&fact, "{2}.len/{2}.1").unwrap(), "2/5");
        assert_eq!(
            formatter.format(&fact, "{0}.parameters.id").unwrap(),
            "8"
        );
    }

    #[test]
    fn test_source_accessor() {
        let node = function();
        let formatter = TemplateFormatter::new().with_source(0, SOURCE);
        assert_eq!(
            formatter.format(&fact(&node), "`{0}.source`").unwrap(),
            "`function drain() external {}`"
        );
    }

    #[test]
    fn test_missing_source_file() {
        let node = function();
        let err = TemplateFormatter::new()
            .format(&fact(&node), "{0}.source")
            .unwrap_err();
        assert!(matches!(
            err,
            DatalogError::FormatPathError { placeholder: 0, path } if path == ".source"
        ));
    }

    #[test]
    fn test_unresolvable_paths() {
        let node = function();
        let formatter = TemplateFormatter::new();
        let fact = fact(&node);

        for (template, placeholder) in [("{0}.missing", 0), ("{1}.base.nope", 1), ("{2}.9", 2), ("{5}", 5)] {
            let err = formatter.format(&fact, template).unwrap_err();
            assert!(
                matches!(err, DatalogError::FormatPathError { placeholder: p, .. } if p == placeholder),
                "{template}"
            );
        }
    }

    #[test]
    fn test_references_resolve_through_index() {
        let owner = Node::new(4, "VariableDeclaration", "17:13:0")
            .with("name", "owner")
            .with("scope", 1i64);
        let contract = Node::new(1, "ContractDefinition", "0:60:0")
            .with("name", "Vault")
            .with("nodes", vec![owner]);
        let read = Node::new(6, "Identifier", "40:5:0")
            .with("name", "owner")
            .with("referencedDeclaration", 4i64);
        let stray = Node::new(8, "Identifier", "50:5:0").with("referencedDeclaration", 99i64);
        let index = NodeIndex::from_roots([&contract, &read, &stray]).unwrap();

        let fact = LiftedFact {
            relation: "read".to_string(),
            columns: vec!["expr".into(), "stray".into()],
            values: vec![Lifted::Node(&read), Lifted::Node(&stray)],
        };
        let formatter = TemplateFormatter::new().with_index(&index);
        assert_eq!(
            formatter
                .format(&fact, "{0}.referencedDeclaration.name in {0}.referencedDeclaration.scope.name")
                .unwrap(),
            "owner in Vault"
        );
        assert_eq!(formatter.format(&fact, "{0}.referencedDeclaration").unwrap(), "4");
        assert!(matches!(
            formatter.format(&fact, "{1}.referencedDeclaration.name"),
            Err(DatalogError::FormatPathError { placeholder: 1, .. })
        ));
        assert!(matches!(
            TemplateFormatter::new().format(&fact, "{0}.referencedDeclaration.name"),
            Err(DatalogError::FormatPathError { placeholder: 0, .. })
        ));
    }

    #[test]
    fn test_literal_braces_untouched() {
        let node = function();
        assert_eq!(
            TemplateFormatter::new().format(&fact(&node), "{x} {0}.id").unwrap(),
            "{x} 7"
        );
    }
}
