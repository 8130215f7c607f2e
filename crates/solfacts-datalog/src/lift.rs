//! Engine tuples back to tree-level values.
//!
//! Lifting is driven by column types: identifier columns resolve to the
//! nodes they name, `bool` columns become booleans, cons-list records become
//! sequences and tagged unions become variants with named payloads.

use std::fmt;

use solfacts_ast::{ABSENT_ID, Node, NodeIndex};

use crate::DatalogError;
use crate::factset::FactSet;
use crate::schema::RelationSchema;
use crate::types::{ColumnType, TypeClass, TypeRegistry};
use crate::value::RawValue;

/// A lifted column value.
#[derive(Debug, Clone, PartialEq)]
pub enum Lifted<'a> {
    Number(i64),
    Text(String),
    Bool(bool),
    Node(&'a Node),
    /// The absent-reference sentinel, or `nil` for a non-list record.
    Absent,
    List(Vec<Lifted<'a>>),
    Record(Vec<(String, Lifted<'a>)>),
    Variant {
        tag: String,
        payload: Vec<(String, Lifted<'a>)>,
    },
}

impl Lifted<'_> {
    pub fn as_node(&self) -> Option<&Node> {
        match self {
            Lifted::Node(node) => Some(node),
            _ => None,
        }
    }
}

/// Nodes render as `NodeType#id`, lists as `[a,b]`, records as
/// `{name: a, other: b}`, variants as `Tag(a, b)`.
impl fmt::Display for Lifted<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Lifted::Number(n) => write!(f, "{n}"),
            Lifted::Text(s) => f.write_str(s),
            Lifted::Bool(b) => write!(f, "{b}"),
            Lifted::Node(node) => write!(f, "{}#{}", node.node_type, node.id),
            Lifted::Absent => f.write_str("<absent>"),
            Lifted::List(items) => {
                f.write_str("[")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        f.write_str(",")?;
                    }
                    write!(f, "{item}")?;
                }
                f.write_str("]")
            }
            Lifted::Record(fields) => {
                f.write_str("{")?;
                for (i, (name, value)) in fields.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{name}: {value}")?;
                }
                f.write_str("}")
            }
            Lifted::Variant { tag, payload } if payload.is_empty() => f.write_str(tag),
            Lifted::Variant { tag, payload } => {
                write!(f, "{tag}(")?;
                for (i, (_, value)) in payload.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{value}")?;
                }
                f.write_str(")")
            }
        }
    }
}

/// One lifted tuple with its relation and column names.
#[derive(Debug, Clone, PartialEq)]
pub struct LiftedFact<'a> {
    pub relation: String,
    pub columns: Vec<String>,
    pub values: Vec<Lifted<'a>>,
}

impl<'a> LiftedFact<'a> {
    pub fn get(&self, index: usize) -> Option<&Lifted<'a>> {
        self.values.get(index)
    }

    /// The value of the named column.
    pub fn column(&self, name: &str) -> Option<&Lifted<'a>> {
        let index = self.columns.iter().position(|c| c == name)?;
        self.values.get(index)
    }
}

/// Lifts tuples against one set of trees.
pub struct ResultLifter<'r, 'a> {
    registry: &'r TypeRegistry,
    nodes: &'r NodeIndex<'a>,
}

impl<'r, 'a> ResultLifter<'r, 'a> {
    pub fn new(registry: &'r TypeRegistry, nodes: &'r NodeIndex<'a>) -> Self {
        Self { registry, nodes }
    }

    /// Lift one tuple of `schema`.
    pub fn lift(
        &self,
        tuple: &[RawValue],
        schema: &RelationSchema,
    ) -> Result<LiftedFact<'a>, DatalogError> {
        if tuple.len() != schema.arity() {
            return Err(DatalogError::ArityMismatch {
                relation: schema.name.clone(),
                expected: schema.arity(),
                actual: tuple.len(),
            });
        }
        let values = tuple
            .iter()
            .zip(&schema.columns)
            .map(|(raw, column)| self.lift_value(raw, &column.ty))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(LiftedFact {
            relation: schema.name.clone(),
            columns: schema.columns.iter().map(|c| c.name.clone()).collect(),
            values,
        })
    }

    /// Lift every tuple of `relation` in `facts`.
    pub fn lift_all(
        &self,
        facts: &FactSet,
        relation: &str,
    ) -> Result<Vec<LiftedFact<'a>>, DatalogError> {
        let schema = facts
            .schema_of(relation)
            .ok_or_else(|| DatalogError::UnknownRelation(relation.to_string()))?;
        facts
            .facts_of(relation)?
            .iter()
            .map(|tuple| self.lift(tuple, schema))
            .collect()
    }

    /// Lift one value of column type `ty`.
    pub fn lift_value(&self, raw: &RawValue, ty: &ColumnType) -> Result<Lifted<'a>, DatalogError> {
        let mismatch = || DatalogError::Parse(format!("value {raw} does not fit column type {ty}"));

        match self.registry.classify(ty)? {
            TypeClass::Number => raw.as_number().map(Lifted::Number).ok_or_else(mismatch),
            TypeClass::Symbol => raw
                .as_symbol()
                .map(|s| Lifted::Text(s.to_string()))
                .ok_or_else(mismatch),
            TypeClass::Bool => raw.as_number().map(|n| Lifted::Bool(n == 1)).ok_or_else(mismatch),
            TypeClass::NodeId => {
                let id = raw.as_number().ok_or_else(mismatch)?;
                if id == ABSENT_ID {
                    return Ok(Lifted::Absent);
                }
                self.nodes
                    .get(id)
                    .map(Lifted::Node)
                    .ok_or(DatalogError::DanglingReference(id))
            }
            TypeClass::Record => self.lift_record(raw, ty),
            TypeClass::Adt => {
                let RawValue::Adt { branch, args } = raw else {
                    return Err(mismatch());
                };
                let name = ty.to_string();
                let def = self
                    .registry
                    .adt(&name)
                    .and_then(|branches| branches.iter().find(|b| &b.name == branch))
                    .ok_or_else(|| DatalogError::UnknownType(format!("{name}::{branch}")))?;
                if def.fields.len() != args.len() {
                    return Err(mismatch());
                }
                let payload = def
                    .fields
                    .iter()
                    .zip(args)
                    .map(|((field, field_ty), arg)| Ok((field.clone(), self.lift_value(arg, field_ty)?)))
                    .collect::<Result<Vec<_>, DatalogError>>()?;
                Ok(Lifted::Variant {
                    tag: branch.clone(),
                    payload,
                })
            }
        }
    }

    fn lift_record(&self, raw: &RawValue, ty: &ColumnType) -> Result<Lifted<'a>, DatalogError> {
        let RawValue::Record(value) = raw else {
            return Err(DatalogError::Parse(format!(
                "value {raw} does not fit column type {ty}"
            )));
        };
        let name = ty.to_string();
        let fields = self
            .registry
            .record(&name)
            .ok_or_else(|| DatalogError::UnknownType(name.clone()))?;

        if self.registry.is_cons_list(&name) {
            // Walk head/tail pairs until nil.
            let head_ty = &fields[0].1;
            let mut items = Vec::new();
            let mut current = value;
            while let Some(cell) = current {
                let [head, RawValue::Record(tail)] = cell.as_slice() else {
                    return Err(DatalogError::Parse(format!("malformed {name} cell")));
                };
                items.push(self.lift_value(head, head_ty)?);
                current = tail;
            }
            return Ok(Lifted::List(items));
        }

        let Some(values) = value else {
            return Ok(Lifted::Absent);
        };
        if values.len() != fields.len() {
            return Err(DatalogError::Parse(format!(
                "{name} expects {} fields, found {}",
                fields.len(),
                values.len()
            )));
        }
        let lifted = fields
            .iter()
            .zip(values)
            .map(|((field, field_ty), v)| Ok((field.clone(), self.lift_value(v, field_ty)?)))
            .collect::<Result<Vec<_>, DatalogError>>()?;
        Ok(Lifted::Record(lifted))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::AdtBranch;
    use pretty_assertions::assert_eq;

    fn tree() -> Node {
        Node::new(1, "Block", "0:10:0").with(
            "statements",
            vec![Node::new(2, "Break", "1:6:0"), Node::new(3, "Continue", "8:9:0")],
        )
    }

    fn registry() -> TypeRegistry {
        let mut registry = TypeRegistry::new();
        registry.list_type_for(&ColumnType::id()).unwrap();
        registry
            .register_record(
                "Edge",
                vec![
                    ("from".to_string(), ColumnType::id()),
                    ("label".to_string(), ColumnType::Symbol),
                ],
            )
            .unwrap();
        registry
            .register_adt(
                "Loc",
                vec![
                    AdtBranch::new("Var", vec![("v".to_string(), ColumnType::id())]),
                    AdtBranch::new("Unknown", vec![]),
                ],
            )
            .unwrap();
        registry
    }

    #[test]
    fn test_lift_references_and_flags() {
        let root = tree();
        let index = NodeIndex::from_roots([&root]).unwrap();
        let registry = registry();
        let lifter = ResultLifter::new(&registry, &index);
        let schema = RelationSchema::new(
            "r",
            [
                ("a", ColumnType::id()),
                ("b", ColumnType::id()),
                ("flag", ColumnType::bool()),
                ("n", ColumnType::Number),
            ],
        );

        let fact = lifter
            .lift(
                &[
                    RawValue::Number(2),
                    RawValue::Number(-1),
                    RawValue::Number(1),
                    RawValue::Number(-1),
                ],
                &schema,
            )
            .unwrap();
        assert!(std::ptr::eq(fact.values[0].as_node().unwrap(), index.get(2).unwrap()));
        assert_eq!(fact.values[1], Lifted::Absent);
        assert_eq!(fact.column("flag"), Some(&Lifted::Bool(true)));
        assert_eq!(fact.column("n"), Some(&Lifted::Number(-1)));
    }

    #[test]
    fn test_dangling_reference() {
        let root = tree();
        let index = NodeIndex::from_roots([&root]).unwrap();
        let registry = registry();
        let lifter = ResultLifter::new(&registry, &index);
        assert!(matches!(
            lifter.lift_value(&RawValue::Number(42), &ColumnType::id()),
            Err(DatalogError::DanglingReference(42))
        ));
    }

    #[test]
    fn test_lift_cons_list_and_record() {
        let root = tree();
        let index = NodeIndex::from_roots([&root]).unwrap();
        let registry = registry();
        let lifter = ResultLifter::new(&registry, &index);

        let list = RawValue::cons_list(vec![RawValue::Number(3), RawValue::Number(2)]);
        let lifted = lifter.lift_value(&list, &ColumnType::named("idList")).unwrap();
        assert_eq!(lifted.to_string(), "[Continue#3,Break#2]");

        let empty = lifter.lift_value(&RawValue::nil(), &ColumnType::named("idList")).unwrap();
        assert_eq!(empty, Lifted::List(vec![]));

        let edge = RawValue::Record(Some(vec![RawValue::Number(1), RawValue::symbol("x")]));
        let lifted = lifter.lift_value(&edge, &ColumnType::named("Edge")).unwrap();
        assert_eq!(lifted.to_string(), "{from: Block#1, label: x}");
    }

    #[test]
    fn test_lift_variant() {
        let root = tree();
        let index = NodeIndex::from_roots([&root]).unwrap();
        let registry = registry();
        let lifter = ResultLifter::new(&registry, &index);

        let var = RawValue::Adt {
            branch: "Var".to_string(),
            args: vec![RawValue::Number(2)],
        };
        let lifted = lifter.lift_value(&var, &ColumnType::named("Loc")).unwrap();
        assert_eq!(lifted.to_string(), "Var(Break#2)");

        let unknown = RawValue::Adt {
            branch: "Unknown".to_string(),
            args: vec![],
        };
        assert_eq!(
            lifter
                .lift_value(&unknown, &ColumnType::named("Loc"))
                .unwrap()
                .to_string(),
            "Unknown"
        );
    }

    #[test]
    fn test_type_mismatch() {
        let root = tree();
        let index = NodeIndex::from_roots([&root]).unwrap();
        let registry = registry();
        let lifter = ResultLifter::new(&registry, &index);
        assert!(matches!(
            lifter.lift_value(&RawValue::symbol("x"), &ColumnType::Number),
            Err(DatalogError::Parse(_))
        ));
    }
}
