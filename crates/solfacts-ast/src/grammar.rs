//! Node-kind descriptors.
//!
//! A grammar is an ordered list of node kinds, each with exactly one base
//! kind and an ordered list of fields. Base kinds form a single-inheritance
//! chain that ends at the grammar's root.

use serde::Serialize;

/// How a field's values are laid out on a node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldShape {
    /// Exactly one value.
    Scalar,
    /// Zero or one value.
    Optional,
    /// Ordered list without holes.
    Array,
    /// Ordered list whose elements may be null.
    SparseArray,
    /// String-keyed entries.
    Map,
    /// Ordered list stored natively as one cons-list value.
    RecordList,
}

/// What a field's values mean.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(tag = "kind", content = "of", rename_all = "snake_case")]
pub enum SemanticType {
    Number,
    Text,
    Bool,
    /// Tagged symbol enumeration, e.g. `ContractKind`.
    Enum(&'static str),
    /// Reference to a node of the named kind (concrete or abstract).
    Node(&'static str),
    /// Reference to a node of any kind.
    AnyNode,
    /// Reference to a node of one of several kinds.
    NodeUnion(&'static [&'static str]),
    /// Either a node of the named kind or a bare keyword standing in for it.
    NodeOrKeyword(&'static str),
    /// Value of a registered record type.
    Record(&'static str),
    /// Value of a registered tagged union.
    Adt(&'static str),
}

/// One field of a node kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct FieldDescriptor {
    pub name: &'static str,
    pub shape: FieldShape,
    pub ty: SemanticType,
}

impl FieldDescriptor {
    pub const fn scalar(name: &'static str, ty: SemanticType) -> Self {
        Self {
            name,
            shape: FieldShape::Scalar,
            ty,
        }
    }

    pub const fn optional(name: &'static str, ty: SemanticType) -> Self {
        Self {
            name,
            shape: FieldShape::Optional,
            ty,
        }
    }

    pub const fn array(name: &'static str, ty: SemanticType) -> Self {
        Self {
            name,
            shape: FieldShape::Array,
            ty,
        }
    }

    pub const fn sparse(name: &'static str, ty: SemanticType) -> Self {
        Self {
            name,
            shape: FieldShape::SparseArray,
            ty,
        }
    }

    pub const fn map(name: &'static str, ty: SemanticType) -> Self {
        Self {
            name,
            shape: FieldShape::Map,
            ty,
        }
    }

    pub const fn record_list(name: &'static str, ty: SemanticType) -> Self {
        Self {
            name,
            shape: FieldShape::RecordList,
            ty,
        }
    }
}

/// One node kind.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NodeKindDescriptor {
    pub name: &'static str,
    pub base: &'static str,
    /// Abstract kinds never appear as instances; they only refine identifiers
    /// and collect membership from their subkinds.
    pub is_abstract: bool,
    pub fields: Vec<FieldDescriptor>,
}

impl NodeKindDescriptor {
    pub fn concrete(name: &'static str, base: &'static str, fields: Vec<FieldDescriptor>) -> Self {
        Self {
            name,
            base,
            is_abstract: false,
            fields,
        }
    }

    pub fn abstract_kind(name: &'static str, base: &'static str) -> Self {
        Self {
            name,
            base,
            is_abstract: true,
            fields: Vec::new(),
        }
    }
}

/// A complete grammar: root kind, enumerations and node kinds.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Grammar {
    /// Name of the root kind; its identifier type is the universal `id`.
    pub root: &'static str,
    /// Names of symbol enumerations used by fields.
    pub enums: Vec<&'static str>,
    pub kinds: Vec<NodeKindDescriptor>,
}

impl Grammar {
    pub fn new(root: &'static str) -> Self {
        Self {
            root,
            enums: Vec::new(),
            kinds: Vec::new(),
        }
    }

    pub fn with_enum(mut self, name: &'static str) -> Self {
        self.enums.push(name);
        self
    }

    pub fn with_kind(mut self, kind: NodeKindDescriptor) -> Self {
        self.kinds.push(kind);
        self
    }

    pub fn kind(&self, name: &str) -> Option<&NodeKindDescriptor> {
        self.kinds.iter().find(|k| k.name == name)
    }

    pub fn concrete_kinds(&self) -> impl Iterator<Item = &NodeKindDescriptor> {
        self.kinds.iter().filter(|k| !k.is_abstract)
    }
}
