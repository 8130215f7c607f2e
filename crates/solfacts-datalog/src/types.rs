//! Column types and the type registry.
//!
//! The registry maps grammar-level semantic types onto Soufflé column types
//! and holds every user-defined type a program needs: identifier subtypes
//! (one per node kind, refining its base kind's), enumeration subtypes of
//! `symbol`, records and tagged unions.

use std::collections::{HashMap, HashSet};
use std::fmt;

use serde::Serialize;
use solfacts_ast::{Grammar, SemanticType};

use crate::DatalogError;

/// Universal node identifier type.
pub const ID_TYPE: &str = "id";

/// Boolean type, a refinement of `number` holding 0 or 1.
pub const BOOL_TYPE: &str = "bool";

/// The type of one relation column.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(into = "String")]
pub enum ColumnType {
    Number,
    Symbol,
    /// A registered user-defined type.
    Named(String),
}

impl ColumnType {
    pub fn named(name: impl Into<String>) -> Self {
        ColumnType::Named(name.into())
    }

    pub fn id() -> Self {
        ColumnType::named(ID_TYPE)
    }

    pub fn bool() -> Self {
        ColumnType::named(BOOL_TYPE)
    }

    /// Parse a type as written in a program.
    pub fn parse(name: &str) -> Self {
        match name.trim() {
            "number" => ColumnType::Number,
            "symbol" => ColumnType::Symbol,
            other => ColumnType::named(other),
        }
    }
}

impl fmt::Display for ColumnType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ColumnType::Number => f.write_str("number"),
            ColumnType::Symbol => f.write_str("symbol"),
            ColumnType::Named(name) => f.write_str(name),
        }
    }
}

impl From<ColumnType> for String {
    fn from(ty: ColumnType) -> Self {
        ty.to_string()
    }
}

/// One branch of a tagged union.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AdtBranch {
    pub name: String,
    pub fields: Vec<(String, ColumnType)>,
}

impl AdtBranch {
    pub fn new(name: impl Into<String>, fields: Vec<(String, ColumnType)>) -> Self {
        Self {
            name: name.into(),
            fields,
        }
    }
}

/// A user-defined type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TypeDef {
    Subtype {
        name: String,
        base: ColumnType,
    },
    Record {
        name: String,
        fields: Vec<(String, ColumnType)>,
    },
    Adt {
        name: String,
        branches: Vec<AdtBranch>,
    },
}

impl TypeDef {
    pub fn name(&self) -> &str {
        match self {
            TypeDef::Subtype { name, .. } | TypeDef::Record { name, .. } | TypeDef::Adt { name, .. } => {
                name
            }
        }
    }

    fn to_datalog(&self) -> String {
        match self {
            TypeDef::Subtype { name, base } => format!(".type {name} <: {base}"),
            TypeDef::Record { name, fields } => {
                format!(".type {name} = [{}]", render_fields(fields))
            }
            TypeDef::Adt { name, branches } => {
                let branches: Vec<String> = branches
                    .iter()
                    .map(|b| format!("{} {{{}}}", b.name, render_fields(&b.fields)))
                    .collect();
                format!(".type {name} = {}", branches.join(" | "))
            }
        }
    }
}

fn render_fields(fields: &[(String, ColumnType)]) -> String {
    fields
        .iter()
        .map(|(name, ty)| format!("{name}: {ty}"))
        .collect::<Vec<_>>()
        .join(", ")
}

/// How a column's values are interpreted when lifting.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TypeClass {
    Number,
    Symbol,
    Bool,
    NodeId,
    Record,
    Adt,
}

/// Registry of user-defined types, in declaration order.
#[derive(Debug, Clone)]
pub struct TypeRegistry {
    defs: Vec<TypeDef>,
    by_name: HashMap<String, usize>,
    /// Node kind -> base kind, for every kind of the registered grammar.
    bases: HashMap<String, String>,
    root: Option<String>,
}

impl Default for TypeRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl TypeRegistry {
    /// A registry holding only the built-in `id` and `bool` types.
    pub fn new() -> Self {
        let mut registry = Self {
            defs: Vec::new(),
            by_name: HashMap::new(),
            bases: HashMap::new(),
            root: None,
        };
        registry.push(TypeDef::Subtype {
            name: ID_TYPE.to_string(),
            base: ColumnType::Number,
        });
        registry.push(TypeDef::Subtype {
            name: BOOL_TYPE.to_string(),
            base: ColumnType::Number,
        });
        registry
    }

    fn push(&mut self, def: TypeDef) {
        self.by_name.insert(def.name().to_string(), self.defs.len());
        self.defs.push(def);
    }

    /// Define a type. Redefining a name identically is a no-op; redefining it
    /// differently is an error.
    pub fn define(&mut self, def: TypeDef) -> Result<(), DatalogError> {
        match self.get(def.name()) {
            Some(existing) if *existing == def => Ok(()),
            Some(_) => Err(DatalogError::InvalidGrammar(format!(
                "type {} defined twice",
                def.name()
            ))),
            None => {
                self.push(def);
                Ok(())
            }
        }
    }

    /// Register a symbol enumeration as `<name> <: symbol`.
    pub fn register_enum(&mut self, name: &str) -> Result<(), DatalogError> {
        self.define(TypeDef::Subtype {
            name: name.to_string(),
            base: ColumnType::Symbol,
        })
    }

    pub fn register_record(
        &mut self,
        name: &str,
        fields: Vec<(String, ColumnType)>,
    ) -> Result<(), DatalogError> {
        self.define(TypeDef::Record {
            name: name.to_string(),
            fields,
        })
    }

    pub fn register_adt(&mut self, name: &str, branches: Vec<AdtBranch>) -> Result<(), DatalogError> {
        self.define(TypeDef::Adt {
            name: name.to_string(),
            branches,
        })
    }

    /// Record the node-kind hierarchy of `grammar`.
    ///
    /// Every base must name a kind of the grammar or its root, and every chain
    /// must reach the root without revisiting a kind.
    pub fn register_node_kinds(&mut self, grammar: &Grammar) -> Result<(), DatalogError> {
        let mut bases = HashMap::new();
        for kind in &grammar.kinds {
            if kind.name == grammar.root {
                return Err(DatalogError::InvalidGrammar(format!(
                    "kind {} shadows the root",
                    kind.name
                )));
            }
            if bases
                .insert(kind.name.to_string(), kind.base.to_string())
                .is_some()
            {
                return Err(DatalogError::InvalidGrammar(format!(
                    "kind {} declared twice",
                    kind.name
                )));
            }
        }

        for kind in &grammar.kinds {
            let mut seen = HashSet::new();
            let mut current = kind.name;
            while current != grammar.root {
                if !seen.insert(current) {
                    return Err(DatalogError::InvalidGrammar(format!(
                        "base chain of {} is cyclic",
                        kind.name
                    )));
                }
                current = match bases.get(current) {
                    Some(base) => base.as_str(),
                    None => {
                        return Err(DatalogError::InvalidGrammar(format!(
                            "kind {} has undeclared base {current}",
                            kind.name
                        )));
                    }
                };
            }
        }

        self.bases = bases;
        self.root = Some(grammar.root.to_string());
        Ok(())
    }

    /// The identifier type of `kind`, interning `<Kind>Id <: <Base>Id` for it
    /// and every kind above it.
    pub fn identifier_type_for(&mut self, kind: &str) -> Result<ColumnType, DatalogError> {
        if self.root.as_deref() == Some(kind) {
            return Ok(ColumnType::id());
        }
        let base = self
            .bases
            .get(kind)
            .cloned()
            .ok_or_else(|| DatalogError::UnknownType(format!("node kind {kind}")))?;
        let base_id = self.identifier_type_for(&base)?;
        let name = format!("{kind}Id");
        if self.get(&name).is_none() {
            self.push(TypeDef::Subtype {
                name: name.clone(),
                base: base_id,
            });
        }
        Ok(ColumnType::Named(name))
    }

    /// Map a semantic field type to its column type.
    pub fn resolve(&mut self, ty: &SemanticType) -> Result<ColumnType, DatalogError> {
        match ty {
            SemanticType::Number => Ok(ColumnType::Number),
            SemanticType::Text | SemanticType::NodeOrKeyword(_) => Ok(ColumnType::Symbol),
            SemanticType::Bool => Ok(ColumnType::bool()),
            SemanticType::AnyNode => Ok(ColumnType::id()),
            SemanticType::Node(kind) => self.identifier_type_for(kind),
            SemanticType::NodeUnion(kinds) => self.common_identifier_type(kinds),
            SemanticType::Enum(name) | SemanticType::Record(name) | SemanticType::Adt(name) => {
                if self.get(name).is_some() {
                    Ok(ColumnType::named(*name))
                } else {
                    Err(DatalogError::UnknownType(name.to_string()))
                }
            }
        }
    }

    /// Nearest identifier type shared by every kind in `kinds`.
    fn common_identifier_type(&mut self, kinds: &[&str]) -> Result<ColumnType, DatalogError> {
        let mut chains = Vec::with_capacity(kinds.len());
        for kind in kinds {
            chains.push(self.ancestors(kind)?);
        }
        let Some((first, rest)) = chains.split_first() else {
            return Ok(ColumnType::id());
        };
        for candidate in first {
            if rest.iter().all(|chain| chain.contains(candidate)) {
                let candidate = candidate.clone();
                return self.identifier_type_for(&candidate);
            }
        }
        Ok(ColumnType::id())
    }

    /// `kind` followed by its bases, ending at the root.
    fn ancestors(&self, kind: &str) -> Result<Vec<String>, DatalogError> {
        let root = self.root.as_deref().unwrap_or_default();
        let mut chain = vec![kind.to_string()];
        let mut current = kind;
        while current != root {
            current = self
                .bases
                .get(current)
                .ok_or_else(|| DatalogError::UnknownType(format!("node kind {kind}")))?;
            chain.push(current.to_string());
        }
        Ok(chain)
    }

    /// The cons-list record type `<Elem>List = [head: Elem, tail: <Elem>List]`.
    pub fn list_type_for(&mut self, elem: &ColumnType) -> Result<ColumnType, DatalogError> {
        let name = format!("{elem}List");
        self.register_record(
            &name,
            vec![
                ("head".to_string(), elem.clone()),
                ("tail".to_string(), ColumnType::named(name.clone())),
            ],
        )?;
        Ok(ColumnType::Named(name))
    }

    pub fn get(&self, name: &str) -> Option<&TypeDef> {
        self.by_name.get(name).map(|&i| &self.defs[i])
    }

    pub fn defs(&self) -> &[TypeDef] {
        &self.defs
    }

    /// Fields of a registered record.
    pub fn record(&self, name: &str) -> Option<&[(String, ColumnType)]> {
        match self.get(name) {
            Some(TypeDef::Record { fields, .. }) => Some(fields),
            _ => None,
        }
    }

    /// Branches of a registered tagged union.
    pub fn adt(&self, name: &str) -> Option<&[AdtBranch]> {
        match self.get(name) {
            Some(TypeDef::Adt { branches, .. }) => Some(branches),
            _ => None,
        }
    }

    /// Whether `name` is a record whose last field refers back to itself.
    pub fn is_cons_list(&self, name: &str) -> bool {
        self.record(name)
            .and_then(|fields| fields.last())
            .is_some_and(|(_, ty)| matches!(ty, ColumnType::Named(n) if n == name))
    }

    /// Reverse mapping from a column type to how its values are read.
    pub fn classify(&self, ty: &ColumnType) -> Result<TypeClass, DatalogError> {
        let mut current = ty;
        // Bounded by the number of definitions, which rules out cycles.
        for _ in 0..=self.defs.len() {
            let name = match current {
                ColumnType::Number => return Ok(TypeClass::Number),
                ColumnType::Symbol => return Ok(TypeClass::Symbol),
                ColumnType::Named(name) => name,
            };
            if name == BOOL_TYPE {
                return Ok(TypeClass::Bool);
            }
            if name == ID_TYPE {
                return Ok(TypeClass::NodeId);
            }
            match self.get(name) {
                Some(TypeDef::Subtype { base, .. }) => current = base,
                Some(TypeDef::Record { .. }) => return Ok(TypeClass::Record),
                Some(TypeDef::Adt { .. }) => return Ok(TypeClass::Adt),
                None => return Err(DatalogError::UnknownType(name.clone())),
            }
        }
        Err(DatalogError::UnknownType(ty.to_string()))
    }

    /// Render every definition as a Soufflé `.type` statement.
    pub fn to_datalog(&self) -> String {
        let mut out = String::new();
        for def in &self.defs {
            out.push_str(&def.to_datalog());
            out.push('\n');
        }
        out
    }
}
