//! Raw column values and their textual form.
//!
//! Inside a fact file, numbers are written bare and everything else is a
//! symbol-like string. Records are written `[a, b]` (or `nil`) and tagged
//! union values `$Branch(a, b)` (or `$Branch`), with nested symbols in double
//! quotes using backslash escapes.

use std::fmt::{self, Write as _};

use crate::DatalogError;
use crate::types::{ColumnType, TypeClass, TypeRegistry};

/// One column value of one tuple.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum RawValue {
    Number(i64),
    Symbol(String),
    /// A record; `None` is `nil`.
    Record(Option<Vec<RawValue>>),
    Adt { branch: String, args: Vec<RawValue> },
}

impl RawValue {
    pub fn symbol(s: impl Into<String>) -> Self {
        RawValue::Symbol(s.into())
    }

    pub fn bool(b: bool) -> Self {
        RawValue::Number(i64::from(b))
    }

    pub fn nil() -> Self {
        RawValue::Record(None)
    }

    /// Build a cons-list record `[head, [.., nil]]` from `items`.
    pub fn cons_list(items: Vec<RawValue>) -> Self {
        items
            .into_iter()
            .rev()
            .fold(RawValue::nil(), |tail, head| {
                RawValue::Record(Some(vec![head, tail]))
            })
    }

    pub fn as_number(&self) -> Option<i64> {
        match self {
            RawValue::Number(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_symbol(&self) -> Option<&str> {
        match self {
            RawValue::Symbol(s) => Some(s),
            _ => None,
        }
    }

    /// Whether the value must be quoted when it is a whole fact-file field.
    pub(crate) fn is_quoted(&self) -> bool {
        !matches!(self, RawValue::Number(_))
    }

    /// Text of the value as one fact-file field, before CSV quoting.
    pub(crate) fn to_field_text(&self) -> String {
        match self {
            RawValue::Symbol(s) => s.clone(),
            other => other.to_string(),
        }
    }

    /// Parse one fact-file field (already CSV-unquoted) as a value of `ty`.
    pub fn parse(text: &str, ty: &ColumnType, registry: &TypeRegistry) -> Result<Self, DatalogError> {
        match registry.classify(ty)? {
            TypeClass::Symbol => Ok(RawValue::Symbol(text.to_string())),
            TypeClass::Number | TypeClass::Bool | TypeClass::NodeId => parse_number(text.trim()),
            TypeClass::Record | TypeClass::Adt => {
                let mut parser = Parser {
                    input: text,
                    pos: 0,
                    registry,
                };
                let value = parser.value(ty)?;
                parser.skip_ws();
                if parser.pos != text.len() {
                    return Err(parser.error("trailing input"));
                }
                Ok(value)
            }
        }
    }
}

/// Renders the nested form used inside records and tagged unions.
impl fmt::Display for RawValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RawValue::Number(n) => write!(f, "{n}"),
            RawValue::Symbol(s) => {
                f.write_char('"')?;
                for c in s.chars() {
                    if c == '"' || c == '\\' {
                        f.write_char('\\')?;
                    }
                    f.write_char(c)?;
                }
                f.write_char('"')
            }
            RawValue::Record(None) => f.write_str("nil"),
            RawValue::Record(Some(fields)) => {
                f.write_char('[')?;
                write_joined(f, fields)?;
                f.write_char(']')
            }
            RawValue::Adt { branch, args } if args.is_empty() => write!(f, "${branch}"),
            RawValue::Adt { branch, args } => {
                write!(f, "${branch}(")?;
                write_joined(f, args)?;
                f.write_char(')')
            }
        }
    }
}

fn write_joined(f: &mut fmt::Formatter<'_>, values: &[RawValue]) -> fmt::Result {
    for (i, value) in values.iter().enumerate() {
        if i > 0 {
            f.write_str(", ")?;
        }
        write!(f, "{value}")?;
    }
    Ok(())
}

fn parse_number(text: &str) -> Result<RawValue, DatalogError> {
    text.parse()
        .map(RawValue::Number)
        .map_err(|_| DatalogError::Parse(format!("expected a number, found {text:?}")))
}

/// Type-directed recursive-descent parser for record and ADT text.
struct Parser<'t, 'r> {
    input: &'t str,
    pos: usize,
    registry: &'r TypeRegistry,
}

impl Parser<'_, '_> {
    fn error(&self, what: &str) -> DatalogError {
        DatalogError::Parse(format!("{what} at offset {} in {:?}", self.pos, self.input))
    }

    fn rest(&self) -> &str {
        &self.input[self.pos..]
    }

    fn skip_ws(&mut self) {
        let trimmed = self.rest().trim_start();
        self.pos = self.input.len() - trimmed.len();
    }

    fn eat(&mut self, token: &str) -> bool {
        self.skip_ws();
        if self.rest().starts_with(token) {
            self.pos += token.len();
            true
        } else {
            false
        }
    }

    fn expect(&mut self, token: &str) -> Result<(), DatalogError> {
        if self.eat(token) {
            Ok(())
        } else {
            Err(self.error(&format!("expected {token:?}")))
        }
    }

    fn value(&mut self, ty: &ColumnType) -> Result<RawValue, DatalogError> {
        self.skip_ws();
        match self.registry.classify(ty)? {
            TypeClass::Symbol => self.symbol().map(RawValue::Symbol),
            TypeClass::Number | TypeClass::Bool | TypeClass::NodeId => {
                let end = self
                    .rest()
                    .find(|c: char| !(c == '-' || c.is_ascii_digit()))
                    .unwrap_or(self.rest().len());
                let text = &self.rest()[..end];
                let value = parse_number(text)?;
                self.pos += end;
                Ok(value)
            }
            TypeClass::Record => self.record(ty),
            TypeClass::Adt => self.adt(ty),
        }
    }

    /// A quoted symbol with backslash escapes, or a bare one running up to
    /// the next delimiter.
    fn symbol(&mut self) -> Result<String, DatalogError> {
        if !self.eat("\"") {
            let end = self
                .rest()
                .find([',', ']', ')'])
                .unwrap_or(self.rest().len());
            let text = self.rest()[..end].trim_end().to_string();
            self.pos += end;
            return Ok(text);
        }

        let input = self.input;
        let start = self.pos;
        let mut out = String::new();
        let mut chars = input[start..].char_indices();
        while let Some((i, c)) = chars.next() {
            match c {
                '\\' => match chars.next() {
                    Some((_, escaped)) => out.push(escaped),
                    None => break,
                },
                '"' => {
                    self.pos = start + i + 1;
                    return Ok(out);
                }
                c => out.push(c),
            }
        }
        Err(self.error("unterminated symbol"))
    }

    fn record(&mut self, ty: &ColumnType) -> Result<RawValue, DatalogError> {
        let name = ty.to_string();
        let registry = self.registry;
        let fields = registry
            .record(&name)
            .ok_or_else(|| DatalogError::UnknownType(name.clone()))?;
        if self.eat("nil") {
            return Ok(RawValue::nil());
        }
        self.expect("[")?;
        let mut values = Vec::with_capacity(fields.len());
        for (i, (_, field_ty)) in fields.iter().enumerate() {
            if i > 0 {
                self.expect(",")?;
            }
            values.push(self.value(field_ty)?);
        }
        self.expect("]")?;
        Ok(RawValue::Record(Some(values)))
    }

    fn adt(&mut self, ty: &ColumnType) -> Result<RawValue, DatalogError> {
        let name = ty.to_string();
        let registry = self.registry;
        let branches = registry
            .adt(&name)
            .ok_or_else(|| DatalogError::UnknownType(name.clone()))?;
        self.expect("$")?;
        let end = self
            .rest()
            .find(|c: char| !(c.is_alphanumeric() || c == '_'))
            .unwrap_or(self.rest().len());
        let tag = &self.rest()[..end];
        let branch = branches
            .iter()
            .find(|b| b.name == tag)
            .ok_or_else(|| self.error(&format!("unknown branch {tag} of {name}")))?;
        self.pos += end;

        let mut args = Vec::with_capacity(branch.fields.len());
        if self.eat("(") {
            for (i, (_, field_ty)) in branch.fields.iter().enumerate() {
                if i > 0 {
                    self.expect(",")?;
                }
                args.push(self.value(field_ty)?);
            }
            self.expect(")")?;
        } else if !branch.fields.is_empty() {
            return Err(self.error(&format!("branch {} takes arguments", branch.name)));
        }
        Ok(RawValue::Adt {
            branch: branch.name.clone(),
            args,
        })
    }
}
