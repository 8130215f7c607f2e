//! Relational schema derivation.
//!
//! A [`Schema`] is derived once from a node-kind grammar and is then shared,
//! read-only, by the encoder, the rule compiler and the engine. Derivation is
//! deterministic: the same grammar always yields the same relation names,
//! column order and declaration order.

use std::collections::{BTreeMap, BTreeSet, HashSet};
use std::fmt;

use serde::{Deserialize, Serialize};
use solfacts_ast::{FieldShape, Grammar, SemanticType};
use tracing::debug;

use crate::DatalogError;
use crate::derived::Enrichment;
use crate::types::{ColumnType, TypeRegistry};

/// Relation holding `(parentId, childId)` for every owned child.
pub const PARENT_RELATION: &str = "parent";

/// Relation holding `(id, src)` for every node.
pub const SRC_RELATION: &str = "src";

/// One named, typed column.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Column {
    pub name: String,
    pub ty: ColumnType,
}

/// A relation's name and ordered columns.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RelationSchema {
    pub name: String,
    pub columns: Vec<Column>,
}

impl RelationSchema {
    pub fn new<'c>(
        name: impl Into<String>,
        columns: impl IntoIterator<Item = (&'c str, ColumnType)>,
    ) -> Self {
        Self {
            name: name.into(),
            columns: columns
                .into_iter()
                .map(|(name, ty)| Column {
                    name: name.to_string(),
                    ty,
                })
                .collect(),
        }
    }

    pub fn arity(&self) -> usize {
        self.columns.len()
    }

    /// Position of the named column.
    pub fn column(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c.name == name)
    }

    /// Render as a Soufflé `.decl` statement.
    pub fn to_decl(&self) -> String {
        let columns: Vec<String> = self
            .columns
            .iter()
            .map(|c| format!("{}: {}", c.name, c.ty))
            .collect();
        format!(".decl {}({})", self.name, columns.join(", "))
    }
}

/// A membership inference rule `head(id) :- body(id).`
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Rule {
    pub head: String,
    pub body: String,
}

impl fmt::Display for Rule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}(id) :- {}(id).", self.head, self.body)
    }
}

/// Fields that never get a relation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SkipSet {
    /// Field names skipped on every kind.
    pub global: BTreeSet<String>,
    /// `(kind, field)` pairs skipped on one kind.
    pub pairs: BTreeSet<(String, String)>,
}

impl Default for SkipSet {
    fn default() -> Self {
        Self::standard()
    }
}

impl SkipSet {
    /// Nothing skipped.
    pub fn empty() -> Self {
        Self {
            global: BTreeSet::new(),
            pairs: BTreeSet::new(),
        }
    }

    /// The standard exclusions: raw text, documentation, name locations,
    /// generic child lists and source spans (spans live in [`SRC_RELATION`]).
    pub fn standard() -> Self {
        let mut skip = Self::empty();
        for name in ["raw", "documentation", "nameLocation", "children", "src"] {
            skip.global.insert(name.to_string());
        }
        skip
    }

    pub fn with_global(mut self, field: &str) -> Self {
        self.global.insert(field.to_string());
        self
    }

    pub fn with_pair(mut self, kind: &str, field: &str) -> Self {
        self.pairs.insert((kind.to_string(), field.to_string()));
        self
    }

    pub fn contains(&self, kind: &str, field: &str) -> bool {
        self.global.contains(field) || self.pairs.contains(&(kind.to_string(), field.to_string()))
    }
}

/// How one field of one kind is projected into its relation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FieldProjection {
    pub field: &'static str,
    pub relation: String,
    pub shape: FieldShape,
    pub semantic: SemanticType,
    /// Column type of the field's values (the list type for record lists).
    pub value_type: ColumnType,
}

impl FieldProjection {
    /// Whether values are node references, which changes the column names.
    pub fn is_node_ref(&self) -> bool {
        is_node_ref(&self.semantic)
    }
}

fn is_node_ref(ty: &SemanticType) -> bool {
    matches!(
        ty,
        SemanticType::Node(_) | SemanticType::AnyNode | SemanticType::NodeUnion(_)
    )
}

/// Per-kind view of the schema.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct KindSchema {
    pub name: &'static str,
    pub base: &'static str,
    pub is_abstract: bool,
    pub id_type: ColumnType,
    pub fields: Vec<FieldProjection>,
}

/// The complete relational schema for one grammar.
#[derive(Debug, Clone)]
pub struct Schema {
    root: String,
    registry: TypeRegistry,
    /// Relations populated by the encoder.
    inputs: Vec<RelationSchema>,
    /// Abstract-kind and root markers, populated only by rules.
    markers: Vec<RelationSchema>,
    rules: Vec<Rule>,
    kinds: BTreeMap<String, KindSchema>,
}

impl Schema {
    /// Derive the schema of `grammar`, minus the fields in `skip`, plus the
    /// relations `enrichment` contributes.
    pub fn derive(
        grammar: &Grammar,
        skip: &SkipSet,
        enrichment: &dyn Enrichment,
    ) -> Result<Self, DatalogError> {
        let mut registry = TypeRegistry::new();
        for name in &grammar.enums {
            registry.register_enum(name)?;
        }
        registry.register_node_kinds(grammar)?;

        let root = grammar.root;
        let mut inputs = vec![
            RelationSchema::new(
                PARENT_RELATION,
                [("parentId", ColumnType::id()), ("childId", ColumnType::id())],
            ),
            RelationSchema::new(SRC_RELATION, [("id", ColumnType::id()), ("src", ColumnType::Symbol)]),
        ];
        let mut markers = vec![RelationSchema::new(root, [("id", ColumnType::id())])];
        let mut rules = Vec::new();
        let mut kinds = BTreeMap::new();

        for kind in &grammar.kinds {
            let id_type = registry.identifier_type_for(kind.name)?;
            let membership = RelationSchema::new(kind.name, [("id", id_type.clone())]);

            if kind.base != root {
                rules.push(Rule {
                    head: kind.base.to_string(),
                    body: kind.name.to_string(),
                });
            }

            let mut fields = Vec::new();
            if kind.is_abstract {
                markers.push(membership);
            } else {
                inputs.push(membership);
                rules.push(Rule {
                    head: root.to_string(),
                    body: kind.name.to_string(),
                });

                for field in &kind.fields {
                    if skip.contains(kind.name, field.name) {
                        continue;
                    }
                    let projection = project_field(&mut registry, kind.name, field)?;
                    inputs.push(field_relation(&projection, &id_type));
                    fields.push(projection);
                }
            }

            kinds.insert(
                kind.name.to_string(),
                KindSchema {
                    name: kind.name,
                    base: kind.base,
                    is_abstract: kind.is_abstract,
                    id_type,
                    fields,
                },
            );
        }

        inputs.extend(enrichment.declare(&mut registry)?);

        let mut names = HashSet::new();
        for relation in inputs.iter().chain(&markers) {
            if !names.insert(relation.name.as_str()) {
                return Err(DatalogError::InvalidGrammar(format!(
                    "relation {} derived twice",
                    relation.name
                )));
            }
        }

        debug!(
            kinds = kinds.len(),
            inputs = inputs.len(),
            markers = markers.len(),
            rules = rules.len(),
            types = registry.defs().len(),
            "derived schema"
        );

        Ok(Self {
            root: root.to_string(),
            registry,
            inputs,
            markers,
            rules,
            kinds,
        })
    }

    pub fn root(&self) -> &str {
        &self.root
    }

    pub fn registry(&self) -> &TypeRegistry {
        &self.registry
    }

    /// Relations the encoder fills, in declaration order.
    pub fn inputs(&self) -> &[RelationSchema] {
        &self.inputs
    }

    /// Marker relations filled only by membership rules.
    pub fn markers(&self) -> &[RelationSchema] {
        &self.markers
    }

    pub fn rules(&self) -> &[Rule] {
        &self.rules
    }

    pub fn kind(&self, name: &str) -> Option<&KindSchema> {
        self.kinds.get(name)
    }

    pub fn kinds(&self) -> impl Iterator<Item = &KindSchema> {
        self.kinds.values()
    }

    /// Look up any relation, input or marker.
    pub fn relation(&self, name: &str) -> Option<&RelationSchema> {
        self.inputs
            .iter()
            .chain(&self.markers)
            .find(|r| r.name == name)
    }

    /// Render the types, declarations and membership rules as Soufflé text.
    pub fn to_datalog(&self) -> String {
        let mut out = String::from("// Types\n");
        out.push_str(&self.registry.to_datalog());

        out.push_str("\n// Relations\n");
        for relation in self.inputs.iter().chain(&self.markers) {
            out.push_str(&relation.to_decl());
            out.push('\n');
        }

        out.push_str("\n// Membership\n");
        for rule in &self.rules {
            out.push_str(&rule.to_string());
            out.push('\n');
        }
        out
    }
}

fn project_field(
    registry: &mut TypeRegistry,
    kind: &str,
    field: &solfacts_ast::FieldDescriptor,
) -> Result<FieldProjection, DatalogError> {
    let elem = registry.resolve(&field.ty)?;
    let value_type = match field.shape {
        FieldShape::RecordList => registry.list_type_for(&elem)?,
        _ => elem,
    };
    Ok(FieldProjection {
        field: field.name,
        relation: format!("{kind}_{}", field.name),
        shape: field.shape,
        semantic: field.ty,
        value_type,
    })
}

fn field_relation(projection: &FieldProjection, id_type: &ColumnType) -> RelationSchema {
    let id = ("id", id_type.clone());
    let value = projection.value_type.clone();
    let element = if projection.is_node_ref() { "childId" } else { "value" };
    let columns: Vec<(&str, ColumnType)> = match projection.shape {
        FieldShape::Scalar => vec![id, (element, value)],
        FieldShape::RecordList => vec![id, ("value", value)],
        FieldShape::Optional => vec![id, (element, value), ("present", ColumnType::bool())],
        FieldShape::Array => vec![id, (element, value), ("index", ColumnType::Number)],
        FieldShape::SparseArray => vec![
            id,
            (element, value),
            ("index", ColumnType::Number),
            ("rawIndex", ColumnType::Number),
        ],
        FieldShape::Map => vec![id, ("key", ColumnType::Symbol), (element, value)],
    };
    RelationSchema::new(projection.relation.clone(), columns)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::derived::NoEnrichment;
    use pretty_assertions::assert_eq;
    use solfacts_ast::{FieldDescriptor as F, NodeKindDescriptor, SemanticType as T};

    fn grammar() -> Grammar {
        Grammar::new("Node")
            .with_enum("Color")
            .with_kind(NodeKindDescriptor::abstract_kind("Expression", "Node"))
            .with_kind(NodeKindDescriptor::concrete(
                "Leaf",
                "Expression",
                vec![F::scalar("name", T::Text), F::optional("color", T::Enum("Color"))],
            ))
            .with_kind(NodeKindDescriptor::concrete(
                "Container",
                "Node",
                vec![
                    F::scalar("child", T::Node("Leaf")),
                    F::array("items", T::Node("Expression")),
                    F::sparse("slots", T::AnyNode),
                    F::map("named", T::Node("Leaf")),
                    F::array("tags", T::Text),
                    F::record_list("chain", T::Node("Leaf")),
                    F::scalar("raw", T::Text),
                ],
            ))
    }

    fn derive() -> Schema {
        Schema::derive(&grammar(), &SkipSet::standard(), &NoEnrichment).unwrap()
    }

    fn decl(schema: &Schema, name: &str) -> String {
        schema.relation(name).unwrap().to_decl()
    }

    #[test]
    fn test_membership_and_rules() {
        let schema = derive();
        assert_eq!(decl(&schema, "Leaf"), ".decl Leaf(id: LeafId)");
        assert_eq!(decl(&schema, "Expression"), ".decl Expression(id: ExpressionId)");
        assert_eq!(decl(&schema, "Node"), ".decl Node(id: id)");

        let rules: Vec<String> = schema.rules().iter().map(ToString::to_string).collect();
        assert_eq!(
            rules,
            vec![
                "Expression(id) :- Leaf(id).",
                "Node(id) :- Leaf(id).",
                "Node(id) :- Container(id).",
            ]
        );
    }

    #[test]
    fn test_abstract_kinds_are_markers() {
        let schema = derive();
        assert!(schema.markers().iter().any(|r| r.name == "Expression"));
        assert!(!schema.inputs().iter().any(|r| r.name == "Expression"));
        assert!(schema.kind("Expression").unwrap().fields.is_empty());
    }

    #[test]
    fn test_field_relations_per_shape() {
        let schema = derive();
        assert_eq!(
            decl(&schema, "Leaf_color"),
            ".decl Leaf_color(id: LeafId, value: Color, present: bool)"
        );
        assert_eq!(
            decl(&schema, "Container_child"),
            ".decl Container_child(id: ContainerId, childId: LeafId)"
        );
        assert_eq!(
            decl(&schema, "Container_items"),
            ".decl Container_items(id: ContainerId, childId: ExpressionId, index: number)"
        );
        assert_eq!(
            decl(&schema, "Container_slots"),
            ".decl Container_slots(id: ContainerId, childId: id, index: number, rawIndex: number)"
        );
        assert_eq!(
            decl(&schema, "Container_named"),
            ".decl Container_named(id: ContainerId, key: symbol, childId: LeafId)"
        );
        assert_eq!(
            decl(&schema, "Container_tags"),
            ".decl Container_tags(id: ContainerId, value: symbol, index: number)"
        );
        assert_eq!(
            decl(&schema, "Container_chain"),
            ".decl Container_chain(id: ContainerId, value: LeafIdList)"
        );
    }

    #[test]
    fn test_skip_set_applies() {
        let schema = derive();
        assert!(schema.relation("Container_raw").is_none());

        let skip = SkipSet::empty().with_pair("Leaf", "color");
        let schema = Schema::derive(&grammar(), &skip, &NoEnrichment).unwrap();
        assert!(schema.relation("Leaf_color").is_none());
        assert!(schema.relation("Container_raw").is_some());
    }

    #[test]
    fn test_derivation_is_deterministic() {
        assert_eq!(derive().to_datalog(), derive().to_datalog());
    }

    #[test]
    fn test_first_column_is_kind_identifier() {
        let schema = derive();
        for kind in schema.kinds().filter(|k| !k.is_abstract) {
            for field in &kind.fields {
                let relation = schema.relation(&field.relation).unwrap();
                assert_eq!(relation.columns[0].ty, kind.id_type);
            }
        }
    }

    #[test]
    fn test_unknown_enum_fails() {
        let grammar = Grammar::new("Node").with_kind(NodeKindDescriptor::concrete(
            "Leaf",
            "Node",
            vec![F::scalar("color", T::Enum("Color"))],
        ));
        assert!(matches!(
            Schema::derive(&grammar, &SkipSet::standard(), &NoEnrichment),
            Err(DatalogError::UnknownType(_))
        ));
    }

    #[test]
    fn test_clashing_relation_names() {
        let grammar = Grammar::new("Node")
            .with_kind(NodeKindDescriptor::concrete(
                "A",
                "Node",
                vec![F::scalar("b_c", T::Number)],
            ))
            .with_kind(NodeKindDescriptor::concrete("A_b", "Node", vec![F::scalar("c", T::Number)]));
        assert!(matches!(
            Schema::derive(&grammar, &SkipSet::standard(), &NoEnrichment),
            Err(DatalogError::InvalidGrammar(_))
        ));
    }

    #[test]
    fn test_solidity_grammar_derives() {
        let schema = Schema::derive(
            &solfacts_ast::solidity::grammar(),
            &SkipSet::standard(),
            &NoEnrichment,
        )
        .unwrap();
        assert_eq!(
            decl(&schema, "InheritanceSpecifier_baseName"),
            ".decl InheritanceSpecifier_baseName(id: InheritanceSpecifierId, childId: id)"
        );
        assert_eq!(
            decl(&schema, "ElementaryTypeNameExpression_typeName"),
            ".decl ElementaryTypeNameExpression_typeName(id: ElementaryTypeNameExpressionId, value: symbol)"
        );
        assert_eq!(
            decl(&schema, "ContractDefinition_linearizedBaseContracts"),
            ".decl ContractDefinition_linearizedBaseContracts(id: ContractDefinitionId, value: ContractDefinitionIdList)"
        );
        assert!(schema.relation("FunctionDefinition_documentation").is_none());
        let literal = schema.kind("Literal").unwrap();
        assert_eq!(literal.id_type, ColumnType::named("LiteralId"));
    }
}
