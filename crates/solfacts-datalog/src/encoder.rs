//! Tree-to-fact encoding.
//!
//! The encoder walks each tree once, in pre-order, and for every node emits
//! its membership fact, its `src` fact, its `parent` edge and one fact per
//! element of every projected field. Derived facts come from the configured
//! [`Enrichment`] in the same pass.

use std::collections::HashSet;

use solfacts_ast::{ABSENT_ID, FieldShape, Node, SemanticType, Value};
use tracing::{debug, trace, warn};

use crate::DatalogError;
use crate::derived::Enrichment;
use crate::factset::FactSet;
use crate::schema::{FieldProjection, PARENT_RELATION, SRC_RELATION, Schema};
use crate::types::{ColumnType, TypeClass, TypeRegistry};
use crate::value::RawValue;

static NULL: Value = Value::Null;

/// Make text safe for a symbol column.
///
/// Double quotes become single quotes, line breaks become the two-character
/// escapes `\n` and `\r`, and anything else outside printable ASCII is
/// dropped.
pub fn sanitize(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '"' => out.push('\''),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            ' '..='~' => out.push(c),
            _ => {}
        }
    }
    out
}

/// Encodes trees into the relations of one [`Schema`].
pub struct FactEncoder<'s> {
    schema: &'s Schema,
    enrichment: &'s dyn Enrichment,
}

impl<'s> FactEncoder<'s> {
    pub fn new(schema: &'s Schema, enrichment: &'s dyn Enrichment) -> Self {
        Self { schema, enrichment }
    }

    /// Encode a single tree.
    pub fn encode(&self, root: &Node) -> Result<FactSet, DatalogError> {
        self.encode_all([root])
    }

    /// Encode several trees into one fact set; identifiers must be unique
    /// across all of them.
    pub fn encode_all<'n>(
        &self,
        roots: impl IntoIterator<Item = &'n Node>,
    ) -> Result<FactSet, DatalogError> {
        let mut out = FactSet::new(self.schema.inputs());
        let mut seen = HashSet::new();
        let mut nodes = 0usize;

        for root in roots {
            for (parent, node) in root.walk() {
                if node.id < 0 || !seen.insert(node.id) {
                    return Err(DatalogError::IdentifierConflict(node.id));
                }
                self.encode_node(parent, node, &mut out)?;
                self.enrichment.enrich(node, &mut out)?;
                nodes += 1;
            }
        }
        self.enrichment.finish(&mut out)?;

        debug!(nodes, facts = out.len(), "encoded trees");
        Ok(out)
    }

    fn encode_node(
        &self,
        parent: Option<&Node>,
        node: &Node,
        out: &mut FactSet,
    ) -> Result<(), DatalogError> {
        let kind = self
            .schema
            .kind(&node.node_type)
            .filter(|k| !k.is_abstract)
            .ok_or_else(|| DatalogError::UnknownNodeKind(node.node_type.clone()))?;
        let id = RawValue::Number(node.id);

        out.add(kind.name, vec![id.clone()])?;
        out.add(SRC_RELATION, vec![id.clone(), RawValue::symbol(sanitize(&node.src))])?;
        if let Some(parent) = parent {
            out.add(PARENT_RELATION, vec![RawValue::Number(parent.id), id.clone()])?;
        }

        for projection in &kind.fields {
            let value = node.field(projection.field).unwrap_or(&NULL);
            let field = FieldEncoder {
                registry: self.schema.registry(),
                kind: kind.name,
                projection,
            };
            for tuple in field.tuples(&id, value)? {
                out.add(&projection.relation, tuple)?;
            }
        }

        trace!(id = node.id, kind = kind.name, "encoded node");
        Ok(())
    }
}

/// Translates one field of one node into tuples of its relation.
struct FieldEncoder<'a> {
    registry: &'a TypeRegistry,
    kind: &'a str,
    projection: &'a FieldProjection,
}

impl FieldEncoder<'_> {
    fn error(&self, reason: impl Into<String>) -> DatalogError {
        DatalogError::field_type(self.kind, self.projection.field, reason)
    }

    fn tuples(&self, id: &RawValue, value: &Value) -> Result<Vec<Vec<RawValue>>, DatalogError> {
        let semantic = &self.projection.semantic;
        let column = &self.projection.value_type;

        match self.projection.shape {
            FieldShape::Scalar => {
                let encoded = if value.is_null() {
                    self.sentinel(column)?
                } else {
                    self.element(semantic, column, value)?
                };
                Ok(vec![vec![id.clone(), encoded]])
            }
            FieldShape::Optional => {
                let tuple = if value.is_null() {
                    vec![id.clone(), self.sentinel(column)?, RawValue::bool(false)]
                } else {
                    let encoded = self.element(semantic, column, value)?;
                    if self.is_sentinel(column, &encoded) {
                        warn!(
                            kind = self.kind,
                            field = self.projection.field,
                            id = %id,
                            "present value equals the absent sentinel; only `present` tells them apart"
                        );
                    }
                    vec![id.clone(), encoded, RawValue::bool(true)]
                };
                Ok(vec![tuple])
            }
            FieldShape::Array => {
                let items = self.list(value)?;
                let mut tuples = Vec::with_capacity(items.len());
                for (index, item) in items.iter().enumerate() {
                    if item.is_null() {
                        return Err(self.error(format!("hole at index {index} of a dense array")));
                    }
                    tuples.push(vec![
                        id.clone(),
                        self.element(semantic, column, item)?,
                        index_value(index),
                    ]);
                }
                Ok(tuples)
            }
            FieldShape::SparseArray => {
                let items = self.list(value)?;
                let mut tuples = Vec::new();
                for (raw_index, item) in items.iter().enumerate() {
                    if item.is_null() {
                        continue;
                    }
                    let index = tuples.len();
                    tuples.push(vec![
                        id.clone(),
                        self.element(semantic, column, item)?,
                        index_value(index),
                        index_value(raw_index),
                    ]);
                }
                Ok(tuples)
            }
            FieldShape::Map => {
                let entries = match value {
                    Value::Null => return Ok(Vec::new()),
                    Value::Map(entries) => entries,
                    _ => return Err(self.error("expected a map")),
                };
                // solc maps each exported name to a list of declarations
                let mut tuples = Vec::with_capacity(entries.len());
                for (key, item) in entries {
                    let key = RawValue::symbol(sanitize(key));
                    match item {
                        Value::List(targets) if self.projection.is_node_ref() => {
                            for target in targets {
                                tuples.push(vec![
                                    id.clone(),
                                    key.clone(),
                                    self.element(semantic, column, target)?,
                                ]);
                            }
                        }
                        _ => tuples.push(vec![
                            id.clone(),
                            key,
                            self.element(semantic, column, item)?,
                        ]),
                    }
                }
                Ok(tuples)
            }
            FieldShape::RecordList => {
                let elem = match self.registry.record(&column.to_string()) {
                    Some([(_, head), ..]) => head.clone(),
                    _ => return Err(self.error(format!("{column} is not a list type"))),
                };
                let items = self
                    .list(value)?
                    .iter()
                    .map(|item| self.element(semantic, &elem, item))
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(vec![vec![id.clone(), RawValue::cons_list(items)]])
            }
        }
    }

    fn list<'v>(&self, value: &'v Value) -> Result<&'v [Value], DatalogError> {
        match value {
            Value::Null => Ok(&[]),
            Value::List(items) => Ok(items),
            _ => Err(self.error("expected a list")),
        }
    }

    /// The stand-in for an absent value of `column`.
    fn sentinel(&self, column: &ColumnType) -> Result<RawValue, DatalogError> {
        match self.registry.classify(column)? {
            TypeClass::Number | TypeClass::Bool | TypeClass::NodeId => {
                Ok(RawValue::Number(ABSENT_ID))
            }
            TypeClass::Symbol => Ok(RawValue::symbol("")),
            TypeClass::Record => Ok(RawValue::nil()),
            TypeClass::Adt => Err(self.error("tagged unions have no absent value")),
        }
    }

    fn is_sentinel(&self, column: &ColumnType, encoded: &RawValue) -> bool {
        self.sentinel(column).is_ok_and(|sentinel| &sentinel == encoded)
    }

    /// Translate one non-null element.
    fn element(
        &self,
        semantic: &SemanticType,
        column: &ColumnType,
        value: &Value,
    ) -> Result<RawValue, DatalogError> {
        match semantic {
            SemanticType::Number => value
                .as_i64()
                .map(RawValue::Number)
                .ok_or_else(|| self.error("expected a number")),
            SemanticType::Bool => value
                .as_bool()
                .map(RawValue::bool)
                .ok_or_else(|| self.error("expected a boolean")),
            SemanticType::Text => value
                .as_str()
                .map(|s| RawValue::symbol(sanitize(s)))
                .ok_or_else(|| self.error("expected text")),
            SemanticType::Enum(_) => value
                .as_str()
                .map(RawValue::symbol)
                .ok_or_else(|| self.error("expected an enumeration symbol")),
            SemanticType::Node(_) | SemanticType::AnyNode | SemanticType::NodeUnion(_) => {
                match value {
                    Value::Null => Ok(RawValue::Number(ABSENT_ID)),
                    other => other
                        .as_node_id()
                        .map(RawValue::Number)
                        .ok_or_else(|| self.error("expected a node or node identifier")),
                }
            }
            SemanticType::NodeOrKeyword(_) => match value {
                Value::Str(keyword) => Ok(RawValue::symbol(sanitize(keyword))),
                Value::Node(node) => node
                    .name()
                    .map(|name| RawValue::symbol(sanitize(name)))
                    .ok_or_else(|| self.error(format!("node {} has no name", node.id))),
                _ => Err(self.error("expected a node or keyword")),
            },
            SemanticType::Record(_) | SemanticType::Adt(_) => self.structured(column, value),
        }
    }

    /// Translate a record or tagged-union value by its column type.
    ///
    /// Records accept a positional list or a map keyed by field name; `null`
    /// is `nil`. Tagged unions accept a bare branch name or a one-entry map
    /// from branch name to its arguments.
    fn structured(&self, column: &ColumnType, value: &Value) -> Result<RawValue, DatalogError> {
        match self.registry.classify(column)? {
            TypeClass::Number => value
                .as_i64()
                .map(RawValue::Number)
                .ok_or_else(|| self.error(format!("expected a number for {column}"))),
            TypeClass::Bool => value
                .as_bool()
                .map(RawValue::bool)
                .ok_or_else(|| self.error(format!("expected a boolean for {column}"))),
            TypeClass::NodeId => match value {
                Value::Null => Ok(RawValue::Number(ABSENT_ID)),
                other => other
                    .as_node_id()
                    .map(RawValue::Number)
                    .ok_or_else(|| self.error(format!("expected a node for {column}"))),
            },
            TypeClass::Symbol => value
                .as_str()
                .map(|s| RawValue::symbol(sanitize(s)))
                .ok_or_else(|| self.error(format!("expected text for {column}"))),
            TypeClass::Record => {
                let name = column.to_string();
                let fields = self
                    .registry
                    .record(&name)
                    .ok_or_else(|| DatalogError::UnknownType(name.clone()))?;
                self.fields_of(&name, fields, value).map(|values| match values {
                    Some(values) => RawValue::Record(Some(values)),
                    None => RawValue::nil(),
                })
            }
            TypeClass::Adt => {
                let name = column.to_string();
                let branches = self
                    .registry
                    .adt(&name)
                    .ok_or_else(|| DatalogError::UnknownType(name.clone()))?;
                let (tag, args) = match value {
                    Value::Str(tag) => (tag.as_str(), &NULL),
                    Value::Map(entries) if entries.len() == 1 => {
                        let Some((tag, args)) = entries.iter().next() else {
                            return Err(self.error(format!("empty value for {name}")));
                        };
                        (tag.as_str(), args)
                    }
                    _ => return Err(self.error(format!("expected a branch of {name}"))),
                };
                let branch = branches
                    .iter()
                    .find(|b| b.name == tag)
                    .ok_or_else(|| self.error(format!("{tag} is not a branch of {name}")))?;
                let args = if branch.fields.is_empty() {
                    Vec::new()
                } else {
                    self.fields_of(&branch.name, &branch.fields, args)?
                        .ok_or_else(|| self.error(format!("{tag} needs arguments")))?
                };
                Ok(RawValue::Adt {
                    branch: branch.name.clone(),
                    args,
                })
            }
        }
    }

    /// Field values of a record or branch; `None` for `null`.
    fn fields_of(
        &self,
        name: &str,
        fields: &[(String, ColumnType)],
        value: &Value,
    ) -> Result<Option<Vec<RawValue>>, DatalogError> {
        let values: Vec<&Value> = match value {
            Value::Null => return Ok(None),
            Value::List(items) if items.len() == fields.len() => items.iter().collect(),
            Value::Map(entries) => fields
                .iter()
                .map(|(field, _)| entries.get(field).unwrap_or(&NULL))
                .collect(),
            _ => {
                return Err(self.error(format!(
                    "expected {} fields for {name}",
                    fields.len()
                )));
            }
        };
        fields
            .iter()
            .zip(values)
            .map(|((_, ty), v)| self.structured(ty, v))
            .collect::<Result<Vec<_>, _>>()
            .map(Some)
    }
}

fn index_value(index: usize) -> RawValue {
    RawValue::Number(i64::try_from(index).unwrap_or(i64::MAX))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::derived::NoEnrichment;
    use crate::schema::SkipSet;
    use crate::types::AdtBranch;
    use pretty_assertions::assert_eq;
    use solfacts_ast::{FieldDescriptor as F, Grammar, NodeKindDescriptor, SemanticType as T};

    fn grammar() -> Grammar {
        Grammar::new("Node")
            .with_enum("Color")
            .with_kind(NodeKindDescriptor::abstract_kind("Expression", "Node"))
            .with_kind(NodeKindDescriptor::concrete(
                "Leaf",
                "Expression",
                vec![
                    F::scalar("name", T::Text),
                    F::optional("color", T::Enum("Color")),
                    F::optional("weight", T::Number),
                    F::optional("flag", T::Bool),
                ],
            ))
            .with_kind(NodeKindDescriptor::concrete(
                "Container",
                "Node",
                vec![
                    F::scalar("child", T::Node("Leaf")),
                    F::optional("target", T::AnyNode),
                    F::array("items", T::Node("Expression")),
                    F::sparse("slots", T::Node("Expression")),
                    F::map("named", T::Node("Leaf")),
                    F::array("tags", T::Text),
                    F::record_list("chain", T::AnyNode),
                    F::scalar("alias", T::NodeOrKeyword("Leaf")),
                ],
            ))
    }

    fn schema() -> Schema {
        Schema::derive(&grammar(), &SkipSet::standard(), &NoEnrichment).unwrap()
    }

    fn leaf(id: i64, name: &str) -> Node {
        Node::new(id, "Leaf", format!("{id}:1:0")).with("name", name)
    }

    fn encode(root: &Node) -> Result<FactSet, DatalogError> {
        let schema = schema();
        FactEncoder::new(&schema, &NoEnrichment).encode(root)
    }

    fn field_encoder<'a>(schema: &'a Schema, kind: &'a str, field: &str) -> FieldEncoder<'a> {
        let projection = schema
            .kind(kind)
            .and_then(|k| k.fields.iter().find(|p| p.field == field))
            .unwrap();
        FieldEncoder {
            registry: schema.registry(),
            kind,
            projection,
        }
    }

    fn n(v: i64) -> RawValue {
        RawValue::Number(v)
    }

    fn s(v: &str) -> RawValue {
        RawValue::symbol(v)
    }

    #[test]
    fn test_sanitize() {
        assert_eq!(sanitize("say \"hi\""), "say 'hi'");
        assert_eq!(sanitize("a\nb\rc"), "a\\nb\\rc");
        assert_eq!(sanitize("caf\u{e9}\t!"), "caf!");
    }

    #[test]
    fn test_membership_src_and_parent() {
        let root = Node::new(1, "Container", "0:10:0").with("child", leaf(2, "x"));
        let facts = encode(&root).unwrap();

        assert_eq!(facts.facts_of("Container").unwrap(), &[vec![n(1)]]);
        assert_eq!(facts.facts_of("Leaf").unwrap(), &[vec![n(2)]]);
        assert_eq!(
            facts.facts_of("src").unwrap(),
            &[vec![n(1), s("0:10:0")], vec![n(2), s("2:1:0")]]
        );
        assert_eq!(facts.facts_of("parent").unwrap(), &[vec![n(1), n(2)]]);
        assert_eq!(facts.facts_of("Container_child").unwrap(), &[vec![n(1), n(2)]]);
    }

    #[test]
    fn test_optional_presence_and_sentinels() {
        let absent = leaf(1, "a");
        let present = leaf(2, "b")
            .with("color", "red")
            .with("weight", 0i64)
            .with("flag", false);
        let root = Node::new(3, "Container", "0:1:0")
            .with("child", absent)
            .with("items", vec![present])
            .with("target", Value::Null);
        let facts = encode(&root).unwrap();

        assert_eq!(
            facts.facts_of("Leaf_color").unwrap(),
            &[vec![n(1), s(""), n(0)], vec![n(2), s("red"), n(1)]]
        );
        assert_eq!(
            facts.facts_of("Leaf_weight").unwrap(),
            &[vec![n(1), n(-1), n(0)], vec![n(2), n(0), n(1)]]
        );
        assert_eq!(
            facts.facts_of("Leaf_flag").unwrap(),
            &[vec![n(1), n(-1), n(0)], vec![n(2), n(0), n(1)]]
        );
        assert_eq!(
            facts.facts_of("Container_target").unwrap(),
            &[vec![n(3), n(-1), n(0)]]
        );
    }

    #[test]
    fn test_present_values_equal_to_sentinels() {
        let root = leaf(1, "a").with("weight", -1i64).with("color", "");
        let facts = encode(&root).unwrap();

        assert_eq!(facts.facts_of("Leaf_weight").unwrap(), &[vec![n(1), n(-1), n(1)]]);
        assert_eq!(facts.facts_of("Leaf_color").unwrap(), &[vec![n(1), s(""), n(1)]]);

        let schema = schema();
        let weight = field_encoder(&schema, "Leaf", "weight");
        assert!(weight.is_sentinel(&ColumnType::Number, &n(-1)));
        assert!(!weight.is_sentinel(&ColumnType::Number, &n(0)));
        let color = field_encoder(&schema, "Leaf", "color");
        assert!(color.is_sentinel(&ColumnType::named("Color"), &s("")));
        assert!(!color.is_sentinel(&ColumnType::named("Color"), &s("red")));
    }

    #[test]
    fn test_sparse_array_indexing() {
        let root = Node::new(10, "Container", "0:1:0").with(
            "slots",
            vec![
                Value::from(leaf(0, "a")),
                Value::Null,
                Value::from(leaf(2, "c")),
                Value::from(leaf(3, "d")),
            ],
        );
        let facts = encode(&root).unwrap();
        let indices: Vec<(i64, i64, i64)> = facts
            .facts_of("Container_slots")
            .unwrap()
            .iter()
            .map(|t| (t[1].as_number().unwrap(), t[2].as_number().unwrap(), t[3].as_number().unwrap()))
            .collect();
        assert_eq!(indices, vec![(0, 0, 0), (2, 1, 2), (3, 2, 3)]);
    }

    #[test]
    fn test_dense_array_rejects_holes() {
        let root = Node::new(1, "Container", "0:1:0")
            .with("items", vec![Value::from(leaf(2, "a")), Value::Null]);
        assert!(matches!(
            encode(&root),
            Err(DatalogError::FieldType { field, .. }) if field == "items"
        ));
    }

    #[test]
    fn test_map_and_scalar_arrays() {
        let mut named = std::collections::BTreeMap::new();
        named.insert("first".to_string(), Value::from(leaf(2, "a")));
        let root = Node::new(1, "Container", "0:1:0")
            .with("named", Value::Map(named))
            .with("tags", vec!["x\"y", "z"]);
        let facts = encode(&root).unwrap();

        assert_eq!(
            facts.facts_of("Container_named").unwrap(),
            &[vec![n(1), s("first"), n(2)]]
        );
        assert_eq!(
            facts.facts_of("Container_tags").unwrap(),
            &[vec![n(1), s("x'y"), n(0)], vec![n(1), s("z"), n(1)]]
        );
    }

    #[test]
    fn test_map_of_identifier_lists() {
        let mut named = std::collections::BTreeMap::new();
        named.insert("both".to_string(), Value::from(vec![2i64, 3i64]));
        named.insert("none".to_string(), Value::List(Vec::new()));
        let root = Node::new(1, "Container", "0:1:0").with("named", Value::Map(named));
        let facts = encode(&root).unwrap();

        assert_eq!(
            facts.facts_of("Container_named").unwrap(),
            &[vec![n(1), s("both"), n(2)], vec![n(1), s("both"), n(3)]]
        );
    }

    #[test]
    fn test_record_list() {
        let root = Node::new(1, "Container", "0:1:0").with("chain", vec![5i64, 6i64]);
        let facts = encode(&root).unwrap();
        assert_eq!(
            facts.facts_of("Container_chain").unwrap(),
            &[vec![n(1), RawValue::cons_list(vec![n(5), n(6)])]]
        );
    }

    #[test]
    fn test_node_or_keyword_encodes_as_text() {
        let as_node = Node::new(1, "Container", "0:1:0").with("alias", leaf(2, "uint256"));
        let as_keyword = Node::new(1, "Container", "0:1:0").with("alias", "uint256");

        let expected = vec![vec![n(1), s("uint256")]];
        assert_eq!(encode(&as_node).unwrap().facts_of("Container_alias").unwrap(), expected);
        assert_eq!(
            encode(&as_keyword).unwrap().facts_of("Container_alias").unwrap(),
            expected
        );
    }

    #[test]
    fn test_unknown_and_abstract_kinds_rejected() {
        let unknown = Node::new(1, "Mystery", "0:1:0");
        assert!(matches!(
            encode(&unknown),
            Err(DatalogError::UnknownNodeKind(kind)) if kind == "Mystery"
        ));
        let abstract_node = Node::new(1, "Expression", "0:1:0");
        assert!(matches!(encode(&abstract_node), Err(DatalogError::UnknownNodeKind(_))));
    }

    #[test]
    fn test_identifier_conflicts() {
        let duplicate = Node::new(1, "Container", "0:1:0").with("child", leaf(1, "a"));
        assert!(matches!(
            encode(&duplicate),
            Err(DatalogError::IdentifierConflict(1))
        ));
        let negative = leaf(-4, "a");
        assert!(matches!(
            encode(&negative),
            Err(DatalogError::IdentifierConflict(-4))
        ));
    }

    #[test]
    fn test_wrong_value_type() {
        let root = leaf(1, "a").with("weight", "heavy");
        assert!(matches!(
            encode(&root),
            Err(DatalogError::FieldType { field, .. }) if field == "weight"
        ));
    }

    #[test]
    fn test_every_node_encoded_exactly_once() {
        let root = Node::new(1, "Container", "0:1:0")
            .with("child", leaf(2, "a"))
            .with("items", vec![leaf(3, "b"), leaf(4, "c")]);
        let facts = encode(&root).unwrap();
        let mut members: Vec<i64> = ["Container", "Leaf"]
            .iter()
            .flat_map(|r| facts.facts_of(r).unwrap().iter())
            .map(|t| t[0].as_number().unwrap())
            .collect();
        members.sort();
        assert_eq!(members, vec![1, 2, 3, 4]);
        assert_eq!(facts.facts_of("parent").unwrap().len(), 3);
    }

    #[test]
    fn test_structured_values() {
        let mut registry = TypeRegistry::new();
        registry
            .register_adt(
                "Loc",
                vec![
                    AdtBranch::new("Var", vec![("v".to_string(), ColumnType::id())]),
                    AdtBranch::new("Unknown", vec![]),
                ],
            )
            .unwrap();
        let projection = FieldProjection {
            field: "loc",
            relation: "X_loc".to_string(),
            shape: FieldShape::Scalar,
            semantic: T::Adt("Loc"),
            value_type: ColumnType::named("Loc"),
        };
        let field = FieldEncoder {
            registry: &registry,
            kind: "X",
            projection: &projection,
        };

        let mut var = std::collections::BTreeMap::new();
        var.insert("Var".to_string(), Value::from(vec![7i64]));
        assert_eq!(
            field.element(&T::Adt("Loc"), &ColumnType::named("Loc"), &Value::Map(var)).unwrap(),
            RawValue::Adt {
                branch: "Var".to_string(),
                args: vec![n(7)]
            }
        );
        assert_eq!(
            field
                .element(&T::Adt("Loc"), &ColumnType::named("Loc"), &Value::from("Unknown"))
                .unwrap()
                .to_string(),
            "$Unknown"
        );
        assert!(
            field
                .element(&T::Adt("Loc"), &ColumnType::named("Loc"), &Value::from("Nope"))
                .is_err()
        );
    }
}
