//! Typed fact collections and their on-disk form.
//!
//! A [`FactSet`] owns every tuple of one analysis run, grouped by relation.
//! On disk each relation is one `<relation>.csv` file in RFC 4180 form:
//! comma separated, numbers bare, every other value in double quotes with
//! embedded quotes doubled. This is what Soufflé reads and writes for
//! `IO=file, rfc4180=true`.

use std::collections::BTreeMap;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use tracing::{debug, trace};

use crate::DatalogError;
use crate::schema::RelationSchema;
use crate::types::TypeRegistry;
use crate::value::RawValue;

/// One fact: a value per column.
pub type Tuple = Vec<RawValue>;

#[derive(Debug, Clone, PartialEq)]
struct Relation {
    schema: RelationSchema,
    tuples: Vec<Tuple>,
}

/// Facts grouped by relation, in relation-name order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FactSet {
    relations: BTreeMap<String, Relation>,
}

impl FactSet {
    /// An empty fact set accepting tuples for `schemas`.
    pub fn new<'s>(schemas: impl IntoIterator<Item = &'s RelationSchema>) -> Self {
        let mut facts = Self::default();
        for schema in schemas {
            facts.declare(schema.clone());
        }
        facts
    }

    /// Accept tuples for one more relation. Redeclaring keeps existing tuples.
    pub fn declare(&mut self, schema: RelationSchema) {
        self.relations
            .entry(schema.name.clone())
            .or_insert_with(|| Relation {
                schema,
                tuples: Vec::new(),
            });
    }

    /// Add one tuple to a declared relation.
    pub fn add(&mut self, relation: &str, tuple: Tuple) -> Result<(), DatalogError> {
        let rel = self
            .relations
            .get_mut(relation)
            .ok_or_else(|| DatalogError::UnknownRelation(relation.to_string()))?;
        if tuple.len() != rel.schema.arity() {
            return Err(DatalogError::ArityMismatch {
                relation: relation.to_string(),
                expected: rel.schema.arity(),
                actual: tuple.len(),
            });
        }
        rel.tuples.push(tuple);
        Ok(())
    }

    /// Every tuple of `relation`, in insertion order.
    pub fn facts_of(&self, relation: &str) -> Result<&[Tuple], DatalogError> {
        self.relations
            .get(relation)
            .map(|rel| rel.tuples.as_slice())
            .ok_or_else(|| DatalogError::UnknownRelation(relation.to_string()))
    }

    pub fn schema_of(&self, relation: &str) -> Option<&RelationSchema> {
        self.relations.get(relation).map(|rel| &rel.schema)
    }

    pub fn relation_names(&self) -> impl Iterator<Item = &str> {
        self.relations.keys().map(String::as_str)
    }

    /// Total number of tuples across all relations.
    pub fn len(&self) -> usize {
        self.relations.values().map(|rel| rel.tuples.len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Write one file per declared relation into `dir`, including empty ones.
    pub fn write(&self, dir: &Path) -> Result<(), DatalogError> {
        for (name, rel) in &self.relations {
            let file = File::create(dir.join(format!("{name}.csv")))?;
            let mut out = BufWriter::new(file);
            for tuple in &rel.tuples {
                let fields: Vec<String> = tuple.iter().map(encode_field).collect();
                writeln!(out, "{}", fields.join(","))?;
            }
            out.flush()?;
            trace!(relation = %name, tuples = rel.tuples.len(), "wrote fact file");
        }
        debug!(
            dir = %dir.display(),
            relations = self.relations.len(),
            tuples = self.len(),
            "wrote fact set"
        );
        Ok(())
    }

    /// Read the files for `schemas` from `dir`.
    ///
    /// Every requested relation must have a file; values are parsed according
    /// to the column types, resolved through `registry`.
    pub fn read(
        dir: &Path,
        schemas: &[RelationSchema],
        registry: &TypeRegistry,
    ) -> Result<Self, DatalogError> {
        let mut facts = Self::default();
        for schema in schemas {
            let path = dir.join(format!("{}.csv", schema.name));
            if !path.exists() {
                return Err(DatalogError::MissingOutput(schema.name.clone()));
            }
            let content = std::fs::read_to_string(&path)?;
            facts.declare(schema.clone());
            for (line, row) in parse_rows(&content)?.into_iter().enumerate() {
                if row.len() != schema.arity() {
                    return Err(DatalogError::Parse(format!(
                        "{}.csv line {}: expected {} fields, found {}",
                        schema.name,
                        line + 1,
                        schema.arity(),
                        row.len()
                    )));
                }
                let tuple = row
                    .iter()
                    .zip(&schema.columns)
                    .map(|(text, column)| RawValue::parse(text, &column.ty, registry))
                    .collect::<Result<Tuple, _>>()?;
                facts.add(&schema.name, tuple)?;
            }
            trace!(relation = %schema.name, "read fact file");
        }
        debug!(dir = %dir.display(), tuples = facts.len(), "read fact set");
        Ok(facts)
    }

    /// Discard every tuple, returning how many were held.
    pub fn release(self) -> usize {
        let released = self.len();
        debug!(tuples = released, "released fact set");
        released
    }
}

fn encode_field(value: &RawValue) -> String {
    let text = value.to_field_text();
    if value.is_quoted() {
        format!("\"{}\"", text.replace('"', "\"\""))
    } else {
        text
    }
}

/// Split RFC 4180 content into rows of unquoted fields.
///
/// Quoted fields may contain commas, doubled quotes and line breaks. Outside
/// quotes, commas nested in brackets or parentheses do not split, so record
/// and tagged-union values written without quotes stay whole.
fn parse_rows(content: &str) -> Result<Vec<Vec<String>>, DatalogError> {
    #[derive(Clone, Copy)]
    enum State {
        FieldStart,
        Unquoted,
        Quoted,
        QuoteInQuoted,
    }

    let mut rows = Vec::new();
    let mut row = Vec::new();
    let mut field = String::new();
    let mut state = State::FieldStart;
    let mut depth = 0usize;

    for c in content.chars() {
        match state {
            State::FieldStart | State::Unquoted => match c {
                '"' if matches!(state, State::FieldStart) => state = State::Quoted,
                ',' if depth == 0 => {
                    row.push(std::mem::take(&mut field));
                    state = State::FieldStart;
                }
                '\n' if depth == 0 => {
                    end_row(&mut rows, &mut row, &mut field, &state);
                    state = State::FieldStart;
                }
                '\r' if depth == 0 => {}
                c => {
                    match c {
                        '[' | '(' => depth += 1,
                        ']' | ')' => depth = depth.saturating_sub(1),
                        _ => {}
                    }
                    field.push(c);
                    state = State::Unquoted;
                }
            },
            State::Quoted => match c {
                '"' => state = State::QuoteInQuoted,
                c => field.push(c),
            },
            State::QuoteInQuoted => match c {
                '"' => {
                    field.push('"');
                    state = State::Quoted;
                }
                ',' => {
                    row.push(std::mem::take(&mut field));
                    state = State::FieldStart;
                }
                '\n' => {
                    end_row(&mut rows, &mut row, &mut field, &State::Unquoted);
                    state = State::FieldStart;
                }
                '\r' => {}
                other => {
                    return Err(DatalogError::Parse(format!(
                        "unexpected {other:?} after closing quote"
                    )));
                }
            },
        }
    }

    match state {
        State::Quoted => return Err(DatalogError::Parse("unterminated quoted field".to_string())),
        State::QuoteInQuoted | State::Unquoted => {
            row.push(field);
            rows.push(row);
        }
        State::FieldStart if !row.is_empty() => {
            row.push(field);
            rows.push(row);
        }
        State::FieldStart => {}
    }

    fn end_row(
        rows: &mut Vec<Vec<String>>,
        row: &mut Vec<String>,
        field: &mut String,
        state: &State,
    ) {
        // A bare newline at field start ends an empty line unless fields came before it.
        if matches!(state, State::FieldStart) && row.is_empty() {
            return;
        }
        row.push(std::mem::take(field));
        rows.push(std::mem::take(row));
    }

    Ok(rows)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::ColumnType;
    use pretty_assertions::assert_eq;

    fn edge() -> RelationSchema {
        RelationSchema::new(
            "edge",
            [("from", ColumnType::id()), ("label", ColumnType::Symbol)],
        )
    }

    #[test]
    fn test_add_validates_relation_and_arity() {
        let mut facts = FactSet::new([&edge()]);
        facts
            .add("edge", vec![RawValue::Number(1), RawValue::symbol("a")])
            .unwrap();

        assert!(matches!(
            facts.add("missing", vec![]),
            Err(DatalogError::UnknownRelation(name)) if name == "missing"
        ));
        assert!(matches!(
            facts.add("edge", vec![RawValue::Number(1)]),
            Err(DatalogError::ArityMismatch {
                expected: 2,
                actual: 1,
                ..
            })
        ));
        assert_eq!(facts.facts_of("edge").unwrap().len(), 1);
    }

    #[test]
    fn test_write_quotes_symbols_only() {
        let dir = tempfile::tempdir().unwrap();
        let mut facts = FactSet::new([&edge()]);
        facts
            .add("edge", vec![RawValue::Number(7), RawValue::symbol("say \"hi\", x")])
            .unwrap();
        facts.write(dir.path()).unwrap();

        let content = std::fs::read_to_string(dir.path().join("edge.csv")).unwrap();
        assert_eq!(content, "7,\"say \"\"hi\"\", x\"\n");
    }

    #[test]
    fn test_empty_relations_still_written() {
        let dir = tempfile::tempdir().unwrap();
        FactSet::new([&edge()]).write(dir.path()).unwrap();
        assert_eq!(std::fs::read_to_string(dir.path().join("edge.csv")).unwrap(), "");
    }

    #[test]
    fn test_read_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let err = FactSet::read(dir.path(), &[edge()], &TypeRegistry::new()).unwrap_err();
        assert!(matches!(err, DatalogError::MissingOutput(name) if name == "edge"));
    }

    #[test]
    fn test_read_rejects_wrong_width() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("edge.csv"), "1,\"a\",3\n").unwrap();
        let err = FactSet::read(dir.path(), &[edge()], &TypeRegistry::new()).unwrap_err();
        assert!(matches!(err, DatalogError::Parse(_)));
    }

    #[test]
    fn test_parse_rows() {
        let rows = parse_rows("1,\"a,b\"\n2,\"multi\nline\"\r\n3,bare\n\n").unwrap();
        assert_eq!(
            rows,
            vec![
                vec!["1".to_string(), "a,b".to_string()],
                vec!["2".to_string(), "multi\nline".to_string()],
                vec!["3".to_string(), "bare".to_string()],
            ]
        );
    }

    #[test]
    fn test_parse_rows_keeps_unquoted_records_whole() {
        let rows = parse_rows("4,[1, [2, nil]],$Var(3, 4)").unwrap();
        assert_eq!(rows, vec![vec!["4", "[1, [2, nil]]", "$Var(3, 4)"]]);
    }

    #[test]
    fn test_parse_rows_empty_symbol() {
        let rows = parse_rows("1,\"\"\n").unwrap();
        assert_eq!(rows, vec![vec!["1".to_string(), String::new()]]);
    }

    #[test]
    fn test_release_counts_tuples() {
        let mut facts = FactSet::new([&edge()]);
        facts
            .add("edge", vec![RawValue::Number(1), RawValue::symbol("a")])
            .unwrap();
        assert_eq!(facts.release(), 1);
    }
}
