//! Relation and type declarations read from rule program text.
//!
//! Rule programs declare the relations they produce (and any record or
//! tagged-union types those relations use) with ordinary `.decl` and `.type`
//! statements. Reading them gives the column types needed to load and lift
//! the engine's output.
//!
//! Declarations inside a `.comp` only become relations through an `.init`:
//! `.init cg = CallGraph` turns the component's `edge` into `cg.edge`.

use std::collections::{HashMap, HashSet};
use std::sync::OnceLock;

use regex::Regex;
use tracing::debug;

use crate::DatalogError;
use crate::schema::{Column, RelationSchema};
use crate::types::{AdtBranch, ColumnType, TypeDef, TypeRegistry};

const IDENT: &str = r"[A-Za-z_][A-Za-z0-9_]*";
const QUALIFIED: &str = r"[A-Za-z_][A-Za-z0-9_]*(?:\.[A-Za-z_][A-Za-z0-9_]*)*";

fn comment_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?s)/\*.*?\*/|//[^\n]*").expect("comment regex is valid"))
}

fn subtype_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(&format!(r"\.type\s+({IDENT})\s*<:\s*({IDENT})")).expect("subtype regex is valid")
    })
}

fn record_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(&format!(r"\.type\s+({IDENT})\s*=\s*\[([^\]]*)\]")).expect("record regex is valid")
    })
}

fn adt_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        let branch = format!(r"{IDENT}\s*\{{[^}}]*\}}");
        Regex::new(&format!(
            r"\.type\s+({IDENT})\s*=\s*({branch}(?:\s*\|\s*{branch})*)"
        ))
        .expect("adt regex is valid")
    })
}

fn branch_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(&format!(r"({IDENT})\s*\{{([^}}]*)\}}")).expect("branch regex is valid")
    })
}

fn decl_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(&format!(r"\.decl\s+({QUALIFIED})\s*\(([^)]*)\)")).expect("decl regex is valid")
    })
}

fn output_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(&format!(r"\.output\s+({QUALIFIED}(?:\s*,\s*{QUALIFIED})*)"))
            .expect("output regex is valid")
    })
}

/// `.comp Name<Params> : Base<Args>, ... {`, up to and including the brace.
fn comp_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(&format!(
            r"\.comp\s+({IDENT})\s*(?:<([^>]*)>)?\s*(?::([^{{]*))?\{{"
        ))
        .expect("comp regex is valid")
    })
}

fn instance_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(&format!(r"({IDENT})\s*(?:<([^>]*)>)?")).expect("instance regex is valid")
    })
}

fn init_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(&format!(r"\.init\s+({IDENT})\s*=\s*({IDENT})\s*(?:<([^>]*)>)?"))
            .expect("init regex is valid")
    })
}

/// The types and relations a rule program declares.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ProgramInterface {
    types: Vec<TypeDef>,
    relations: Vec<RelationSchema>,
    outputs: Vec<String>,
}

impl ProgramInterface {
    /// Read every `.type`, `.decl` and `.output` statement of `text`,
    /// expanding component instances into qualified relations.
    pub fn parse(text: &str) -> Result<Self, DatalogError> {
        let text = comment_regex().replace_all(text, "");
        let scope = Scope::scan(&text)?;

        let mut components = HashMap::new();
        scope.collect_components(&mut components);
        let expander = Expander {
            components: &components,
        };

        let mut interface = Self {
            types: scope.types,
            relations: scope.relations,
            outputs: scope.outputs,
        };
        for init in &scope.inits {
            expander.instantiate(
                &init.component,
                &init.args,
                &init.instance,
                &mut interface,
                &mut Vec::new(),
            )?;
        }

        debug!(
            types = interface.types.len(),
            relations = interface.relations.len(),
            outputs = interface.outputs.len(),
            components = components.len(),
            "read program interface"
        );
        Ok(interface)
    }

    pub fn types(&self) -> &[TypeDef] {
        &self.types
    }

    pub fn relations(&self) -> &[RelationSchema] {
        &self.relations
    }

    pub fn relation(&self, name: &str) -> Option<&RelationSchema> {
        self.relations.iter().find(|r| r.name == name)
    }

    /// Relations the program itself marks with `.output`.
    pub fn declared_outputs(&self) -> &[String] {
        &self.outputs
    }

    /// Schemas of the named relations, in the order given.
    pub fn outputs<S: AsRef<str>>(&self, names: &[S]) -> Result<Vec<RelationSchema>, DatalogError> {
        names
            .iter()
            .map(|name| {
                let name = name.as_ref();
                self.relation(name)
                    .cloned()
                    .ok_or_else(|| DatalogError::UnknownRelation(name.to_string()))
            })
            .collect()
    }

    /// Add the program's types to `registry`.
    pub fn register_types(&self, registry: &mut TypeRegistry) -> Result<(), DatalogError> {
        for def in &self.types {
            registry.define(def.clone())?;
        }
        Ok(())
    }
}

/// Statements at one level of nesting: the whole program or a component body.
#[derive(Debug, Clone, Default)]
struct Scope {
    types: Vec<TypeDef>,
    relations: Vec<RelationSchema>,
    outputs: Vec<String>,
    components: Vec<Component>,
    inits: Vec<Init>,
}

#[derive(Debug, Clone)]
struct Component {
    name: String,
    params: Vec<String>,
    bases: Vec<Instance>,
    scope: Scope,
}

/// A component name with its type arguments.
#[derive(Debug, Clone)]
struct Instance {
    name: String,
    args: Vec<ColumnType>,
}

#[derive(Debug, Clone)]
struct Init {
    instance: String,
    component: String,
    args: Vec<ColumnType>,
}

impl Scope {
    fn scan(text: &str) -> Result<Self, DatalogError> {
        // Component bodies are cut out first so their statements stay local.
        let mut components = Vec::new();
        let mut rest = String::with_capacity(text.len());
        let mut cursor = 0;
        while let Some(cap) = comp_regex().captures(&text[cursor..]) {
            let Some(whole) = cap.get(0) else { break };
            let open = cursor + whole.end() - 1;
            let close = matching_brace(text, open).ok_or_else(|| {
                DatalogError::Parse(format!("unterminated component {}", &cap[1]))
            })?;

            components.push(Component {
                name: cap[1].to_string(),
                params: cap
                    .get(2)
                    .map(|m| split_list(m.as_str()).map(str::to_string).collect())
                    .unwrap_or_default(),
                bases: cap
                    .get(3)
                    .map(|m| {
                        instance_regex()
                            .captures_iter(m.as_str())
                            .map(|b| Instance {
                                name: b[1].to_string(),
                                args: type_args(b.get(2).map(|a| a.as_str())),
                            })
                            .collect()
                    })
                    .unwrap_or_default(),
                scope: Scope::scan(&text[open + 1..close])?,
            });
            rest.push_str(&text[cursor..cursor + whole.start()]);
            rest.push('\n');
            cursor = close + 1;
        }
        rest.push_str(&text[cursor..]);
        let text = rest.as_str();

        let mut types: Vec<(usize, TypeDef)> = Vec::new();
        for cap in subtype_regex().captures_iter(text) {
            types.push((
                cap.get(0).map_or(0, |m| m.start()),
                TypeDef::Subtype {
                    name: cap[1].to_string(),
                    base: ColumnType::parse(&cap[2]),
                },
            ));
        }
        for cap in record_regex().captures_iter(text) {
            types.push((
                cap.get(0).map_or(0, |m| m.start()),
                TypeDef::Record {
                    name: cap[1].to_string(),
                    fields: parse_fields(&cap[2])?,
                },
            ));
        }
        for cap in adt_regex().captures_iter(text) {
            let branches = branch_regex()
                .captures_iter(&cap[2])
                .map(|b| Ok(AdtBranch::new(&b[1], parse_fields(&b[2])?)))
                .collect::<Result<Vec<_>, DatalogError>>()?;
            types.push((
                cap.get(0).map_or(0, |m| m.start()),
                TypeDef::Adt {
                    name: cap[1].to_string(),
                    branches,
                },
            ));
        }
        types.sort_by_key(|(start, _)| *start);

        let relations = decl_regex()
            .captures_iter(text)
            .map(|cap| {
                let columns = parse_fields(&cap[2])?;
                Ok(RelationSchema {
                    name: cap[1].to_string(),
                    columns: columns
                        .into_iter()
                        .map(|(name, ty)| Column { name, ty })
                        .collect(),
                })
            })
            .collect::<Result<Vec<_>, DatalogError>>()?;

        let outputs = output_regex()
            .captures_iter(text)
            .flat_map(|cap| {
                split_list(&cap[1])
                    .map(str::to_string)
                    .collect::<Vec<_>>()
            })
            .collect();

        let inits = init_regex()
            .captures_iter(text)
            .map(|cap| Init {
                instance: cap[1].to_string(),
                component: cap[2].to_string(),
                args: type_args(cap.get(3).map(|m| m.as_str())),
            })
            .collect();

        Ok(Self {
            types: types.into_iter().map(|(_, def)| def).collect(),
            relations,
            outputs,
            components,
            inits,
        })
    }

    fn collect_components(&self, into: &mut HashMap<String, Component>) {
        for component in &self.components {
            component.scope.collect_components(into);
            into.insert(component.name.clone(), component.clone());
        }
    }
}

/// Expands component instances into qualified declarations.
struct Expander<'c> {
    components: &'c HashMap<String, Component>,
}

impl Expander<'_> {
    fn component(&self, name: &str) -> Result<&Component, DatalogError> {
        self.components
            .get(name)
            .ok_or_else(|| DatalogError::Parse(format!("unknown component {name}")))
    }

    /// Add the declarations of `name<args>` to `out`, each qualified by
    /// `prefix`. `stack` holds the components being expanded.
    fn instantiate(
        &self,
        name: &str,
        args: &[ColumnType],
        prefix: &str,
        out: &mut ProgramInterface,
        stack: &mut Vec<String>,
    ) -> Result<(), DatalogError> {
        if stack.iter().any(|open| open == name) {
            return Err(DatalogError::Parse(format!(
                "component {name} instantiates itself"
            )));
        }
        let component = self.component(name)?;
        if component.params.len() != args.len() {
            return Err(DatalogError::Parse(format!(
                "component {name} takes {} type arguments, found {}",
                component.params.len(),
                args.len()
            )));
        }
        let bindings: HashMap<&str, &ColumnType> = component
            .params
            .iter()
            .map(String::as_str)
            .zip(args)
            .collect();

        stack.push(name.to_string());
        // Inherited declarations share the instance's prefix.
        for base in &component.bases {
            let base_args: Vec<ColumnType> = base.args.iter().map(|ty| bind(ty, &bindings)).collect();
            self.instantiate(&base.name, &base_args, prefix, out, stack)?;
        }

        let mut locals = HashSet::new();
        self.local_types(component, &mut locals, 0);
        let rename = |ty: &ColumnType| -> ColumnType {
            match bind(ty, &bindings) {
                ColumnType::Named(local) if locals.contains(&local) => {
                    ColumnType::named(format!("{prefix}.{local}"))
                }
                other => other,
            }
        };

        let scope = &component.scope;
        out.types
            .extend(scope.types.iter().map(|def| qualify_type(def, prefix, &rename)));
        out.relations.extend(scope.relations.iter().map(|relation| RelationSchema {
            name: format!("{prefix}.{}", relation.name),
            columns: relation
                .columns
                .iter()
                .map(|c| Column {
                    name: c.name.clone(),
                    ty: rename(&c.ty),
                })
                .collect(),
        }));
        out.outputs
            .extend(scope.outputs.iter().map(|output| format!("{prefix}.{output}")));

        for init in &scope.inits {
            let inner_args: Vec<ColumnType> = init.args.iter().map(&rename).collect();
            let inner_prefix = format!("{prefix}.{}", init.instance);
            self.instantiate(&init.component, &inner_args, &inner_prefix, out, stack)?;
        }
        stack.pop();
        Ok(())
    }

    /// Names of the types `component` and its bases declare.
    fn local_types(&self, component: &Component, into: &mut HashSet<String>, depth: usize) {
        into.extend(component.scope.types.iter().map(|def| def.name().to_string()));
        if depth >= self.components.len() {
            return;
        }
        for base in &component.bases {
            if let Some(base) = self.components.get(&base.name) {
                self.local_types(base, into, depth + 1);
            }
        }
    }
}

fn bind(ty: &ColumnType, bindings: &HashMap<&str, &ColumnType>) -> ColumnType {
    match ty {
        ColumnType::Named(name) => bindings
            .get(name.as_str())
            .map_or_else(|| ty.clone(), |bound| (*bound).clone()),
        _ => ty.clone(),
    }
}

fn qualify_type(def: &TypeDef, prefix: &str, rename: &dyn Fn(&ColumnType) -> ColumnType) -> TypeDef {
    let fields = |fields: &[(String, ColumnType)]| -> Vec<(String, ColumnType)> {
        fields
            .iter()
            .map(|(name, ty)| (name.clone(), rename(ty)))
            .collect()
    };
    match def {
        TypeDef::Subtype { name, base } => TypeDef::Subtype {
            name: format!("{prefix}.{name}"),
            base: rename(base),
        },
        TypeDef::Record { name, fields: own } => TypeDef::Record {
            name: format!("{prefix}.{name}"),
            fields: fields(own),
        },
        TypeDef::Adt { name, branches } => TypeDef::Adt {
            name: format!("{prefix}.{name}"),
            branches: branches
                .iter()
                .map(|b| AdtBranch::new(b.name.clone(), fields(&b.fields)))
                .collect(),
        },
    }
}

/// Index of the brace closing the one at `open`, skipping quoted strings.
fn matching_brace(text: &str, open: usize) -> Option<usize> {
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;
    for (offset, byte) in text.as_bytes()[open..].iter().copied().enumerate() {
        if in_string {
            match byte {
                _ if escaped => escaped = false,
                b'\\' => escaped = true,
                b'"' => in_string = false,
                _ => {}
            }
            continue;
        }
        match byte {
            b'"' => in_string = true,
            b'{' => depth += 1,
            b'}' => {
                depth = depth.checked_sub(1)?;
                if depth == 0 {
                    return Some(open + offset);
                }
            }
            _ => {}
        }
    }
    None
}

fn split_list(text: &str) -> impl Iterator<Item = &str> {
    text.split(',').map(str::trim).filter(|part| !part.is_empty())
}

fn type_args(text: Option<&str>) -> Vec<ColumnType> {
    text.map(|t| split_list(t).map(ColumnType::parse).collect())
        .unwrap_or_default()
}

/// Parse `name: type, ...`.
fn parse_fields(text: &str) -> Result<Vec<(String, ColumnType)>, DatalogError> {
    text.split(',')
        .map(str::trim)
        .filter(|part| !part.is_empty())
        .map(|part| {
            let (name, ty) = part
                .split_once(':')
                .ok_or_else(|| DatalogError::Parse(format!("expected `name: type`, found {part:?}")))?;
            Ok((name.trim().to_string(), ColumnType::parse(ty)))
        })
        .collect()
}
