//! Derived facts computed alongside the structural encoding.
//!
//! An [`Enrichment`] declares extra relations at schema-build time and fills
//! them while the encoder walks the tree, one node at a time. These facts
//! exist only in the encoded fact set; nothing in the tree stores them.

use std::fmt;
use std::str::FromStr;

use sha3::{Digest, Keccak256};
use solfacts_ast::solidity::SolKind;
use solfacts_ast::{Node, Value};
use tracing::trace;

use crate::DatalogError;
use crate::factset::FactSet;
use crate::schema::RelationSchema;
use crate::types::{ColumnType, TypeRegistry};
use crate::value::RawValue;

/// Extra relations computed from single nodes during encoding.
pub trait Enrichment: Send + Sync {
    /// Relations this enrichment fills, declared against `registry`.
    fn declare(&self, registry: &mut TypeRegistry) -> Result<Vec<RelationSchema>, DatalogError>;

    /// Emit facts derivable from `node`'s own fields.
    fn enrich(&self, node: &Node, out: &mut FactSet) -> Result<(), DatalogError>;

    /// Emit facts that belong to the encoding as a whole.
    fn finish(&self, _out: &mut FactSet) -> Result<(), DatalogError> {
        Ok(())
    }
}

/// Derives nothing.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoEnrichment;

impl Enrichment for NoEnrichment {
    fn declare(&self, _registry: &mut TypeRegistry) -> Result<Vec<RelationSchema>, DatalogError> {
        Ok(Vec::new())
    }

    fn enrich(&self, _node: &Node, _out: &mut FactSet) -> Result<(), DatalogError> {
        Ok(())
    }
}

pub const CONSTANT_EXPRESSION: &str = "ConstantExpression";
pub const EXTERNAL_CALL: &str = "externalCall";
pub const COMPILER_VERSION: &str = "CompilerVersion";
pub const FUNCTION_SIGNATURE: &str = "FunctionDefinition_signature";
pub const FUNCTION_SIGNATURE_HASH: &str = "FunctionDefinition_signatureHash";
pub const VARIABLE_SIGNATURE: &str = "VariableDeclaration_signature";
pub const VARIABLE_SIGNATURE_HASH: &str = "VariableDeclaration_signatureHash";

/// A `major.minor.patch` compiler version.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct CompilerVersion {
    pub major: u32,
    pub minor: u32,
    pub patch: u32,
}

impl CompilerVersion {
    pub fn new(major: u32, minor: u32, patch: u32) -> Self {
        Self {
            major,
            minor,
            patch,
        }
    }
}

/// Parses `0.8.19`, also accepting a leading `v` and build metadata such as
/// `0.8.19+commit.7dd6d404`.
impl FromStr for CompilerVersion {
    type Err = DatalogError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || DatalogError::Config(format!("invalid compiler version: {s}"));
        let core = s.trim().trim_start_matches('v');
        let core = core.split(['+', '-']).next().unwrap_or(core);
        let parts: Vec<u32> = core
            .split('.')
            .map(|p| p.parse().map_err(|_| invalid()))
            .collect::<Result<_, _>>()?;
        match parts.as_slice() {
            [major, minor, patch] => Ok(Self::new(*major, *minor, *patch)),
            _ => Err(invalid()),
        }
    }
}

impl fmt::Display for CompilerVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}.{}", self.major, self.minor, self.patch)
    }
}

/// Derived facts for Solidity trees.
///
/// - `ConstantExpression(id)`: expressions built only from literals
/// - `externalCall(id)`: calls whose callee is an external function
/// - `FunctionDefinition_signature` / `_signatureHash`: public and external
///   functions
/// - `VariableDeclaration_signature` / `_signatureHash`: getters of public
///   state variables
/// - `CompilerVersion(major, minor, patch)`: once, when configured
#[derive(Debug, Clone, Default)]
pub struct SolidityEnrichment {
    compiler_version: Option<CompilerVersion>,
}

impl SolidityEnrichment {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_compiler_version(mut self, version: CompilerVersion) -> Self {
        self.compiler_version = Some(version);
        self
    }
}

impl Enrichment for SolidityEnrichment {
    fn declare(&self, registry: &mut TypeRegistry) -> Result<Vec<RelationSchema>, DatalogError> {
        let expression = registry.identifier_type_for("Expression")?;
        let call = registry.identifier_type_for("FunctionCall")?;
        let function = registry.identifier_type_for("FunctionDefinition")?;
        let variable = registry.identifier_type_for("VariableDeclaration")?;

        Ok(vec![
            RelationSchema::new(CONSTANT_EXPRESSION, [("id", expression)]),
            RelationSchema::new(EXTERNAL_CALL, [("id", call)]),
            RelationSchema::new(
                FUNCTION_SIGNATURE,
                [("id", function.clone()), ("signature", ColumnType::Symbol)],
            ),
            RelationSchema::new(
                FUNCTION_SIGNATURE_HASH,
                [("id", function), ("hash", ColumnType::Symbol)],
            ),
            RelationSchema::new(
                VARIABLE_SIGNATURE,
                [("id", variable.clone()), ("signature", ColumnType::Symbol)],
            ),
            RelationSchema::new(
                VARIABLE_SIGNATURE_HASH,
                [("id", variable), ("hash", ColumnType::Symbol)],
            ),
            RelationSchema::new(
                COMPILER_VERSION,
                [
                    ("major", ColumnType::Number),
                    ("minor", ColumnType::Number),
                    ("patch", ColumnType::Number),
                ],
            ),
        ])
    }

    fn enrich(&self, node: &Node, out: &mut FactSet) -> Result<(), DatalogError> {
        let Ok(kind) = node.node_type.parse::<SolKind>() else {
            return Ok(());
        };
        let id = RawValue::Number(node.id);

        if kind.is_expression() && is_constant(node) {
            out.add(CONSTANT_EXPRESSION, vec![id.clone()])?;
        }

        match kind {
            SolKind::FunctionCall if is_external_call(node) => {
                out.add(EXTERNAL_CALL, vec![id])?;
            }
            SolKind::FunctionDefinition => {
                if let Some(signature) = function_signature(node) {
                    let hash = selector(node, &signature);
                    trace!(id = node.id, %signature, %hash, "function signature");
                    out.add(FUNCTION_SIGNATURE, vec![id.clone(), RawValue::symbol(signature)])?;
                    out.add(FUNCTION_SIGNATURE_HASH, vec![id, RawValue::symbol(hash)])?;
                }
            }
            SolKind::VariableDeclaration => {
                if let Some(signature) = getter_signature(node) {
                    let hash = selector(node, &signature);
                    out.add(VARIABLE_SIGNATURE, vec![id.clone(), RawValue::symbol(signature)])?;
                    out.add(VARIABLE_SIGNATURE_HASH, vec![id, RawValue::symbol(hash)])?;
                }
            }
            _ => {}
        }
        Ok(())
    }

    fn finish(&self, out: &mut FactSet) -> Result<(), DatalogError> {
        if let Some(version) = self.compiler_version {
            out.add(
                COMPILER_VERSION,
                vec![
                    RawValue::Number(i64::from(version.major)),
                    RawValue::Number(i64::from(version.minor)),
                    RawValue::Number(i64::from(version.patch)),
                ],
            )?;
        }
        Ok(())
    }
}

fn text<'n>(node: &'n Node, field: &str) -> Option<&'n str> {
    node.field(field).and_then(Value::as_str)
}

fn child<'n>(node: &'n Node, field: &str) -> Option<&'n Node> {
    node.field(field).and_then(Value::as_node)
}

fn children<'n>(node: &'n Node, field: &str) -> Vec<Option<&'n Node>> {
    match node.field(field) {
        Some(Value::List(items)) => items.iter().map(Value::as_node).collect(),
        _ => Vec::new(),
    }
}

/// Whether an expression is built only from literals.
fn is_constant(node: &Node) -> bool {
    let Ok(kind) = node.node_type.parse::<SolKind>() else {
        return false;
    };
    let operand = |field: &str| child(node, field).is_some_and(is_constant);
    let all = |field: &str| {
        let items = children(node, field);
        items.iter().all(|c| c.is_some_and(is_constant))
    };

    match kind {
        SolKind::Literal => true,
        SolKind::UnaryOperation => operand("subExpression"),
        SolKind::BinaryOperation => operand("leftExpression") && operand("rightExpression"),
        SolKind::Conditional => {
            operand("condition") && operand("trueExpression") && operand("falseExpression")
        }
        SolKind::TupleExpression => !children(node, "components").is_empty() && all("components"),
        SolKind::FunctionCall => {
            text(node, "kind") == Some("typeConversion")
                && !children(node, "arguments").is_empty()
                && all("arguments")
        }
        _ => false,
    }
}

fn is_external_call(node: &Node) -> bool {
    if text(node, "kind") != Some("functionCall") {
        return false;
    }
    child(node, "expression")
        .and_then(|callee| text(callee, "typeString"))
        .is_some_and(|ty| ty.starts_with("function") && ty.contains(" external"))
}

/// `name(type,...)` for public and external functions.
fn function_signature(node: &Node) -> Option<String> {
    if text(node, "kind") != Some("function") {
        return None;
    }
    if !matches!(text(node, "visibility"), Some("public" | "external")) {
        return None;
    }
    let name = node.name().filter(|n| !n.is_empty())?;
    let params = child(node, "parameters")?;
    let types = children(params, "parameters")
        .into_iter()
        .map(|param| param.and_then(|p| text(p, "typeString")).map(canonical_type))
        .collect::<Option<Vec<_>>>()?;
    Some(format!("{name}({})", types.join(",")))
}

/// Getter signature of a public state variable: one `uint256` per array
/// dimension and one key type per mapping level.
fn getter_signature(node: &Node) -> Option<String> {
    if node.field("stateVariable").and_then(Value::as_bool) != Some(true) {
        return None;
    }
    if text(node, "visibility") != Some("public") {
        return None;
    }
    let name = node.name()?;

    let mut types = Vec::new();
    let mut current = child(node, "typeName");
    while let Some(type_name) = current {
        current = match type_name.node_type.as_str() {
            "Mapping" => {
                let key = child(type_name, "keyType").and_then(|k| text(k, "typeString"))?;
                types.push(canonical_type(key));
                child(type_name, "valueType")
            }
            "ArrayTypeName" => {
                types.push("uint256".to_string());
                child(type_name, "baseType")
            }
            _ => None,
        };
    }
    Some(format!("{name}({})", types.join(",")))
}

/// ABI form of a solc type string.
///
/// Struct types keep their name; their tuple expansion needs the struct's
/// definition, which a single node does not carry.
fn canonical_type(type_string: &str) -> String {
    let mut ty = type_string.trim();
    for location in [" storage ref", " storage pointer", " memory", " calldata", " storage"] {
        if let Some(stripped) = ty.strip_suffix(location) {
            ty = stripped;
            break;
        }
    }

    let (base, dims) = match ty.find('[') {
        Some(i) => ty.split_at(i),
        None => (ty, ""),
    };
    let base = if base.starts_with("contract ") || base == "address payable" {
        "address"
    } else if base.starts_with("enum ") {
        "uint8"
    } else if let Some(name) = base.strip_prefix("struct ") {
        name
    } else if base.starts_with("function ") {
        "function"
    } else {
        base
    };
    format!("{base}{dims}")
}

/// Four-byte selector in hex: the compiler's when it recorded one, otherwise
/// computed from `signature`.
fn selector(node: &Node, signature: &str) -> String {
    match text(node, "functionSelector") {
        Some(recorded) if !recorded.is_empty() => recorded.to_string(),
        _ => {
            let digest = Keccak256::digest(signature.as_bytes());
            hex::encode(&digest[..4])
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{Schema, SkipSet};
    use pretty_assertions::assert_eq;

    fn literal(id: i64, value: &str) -> Node {
        Node::new(id, "Literal", "0:1:0")
            .with("kind", "number")
            .with("value", value)
            .with("typeString", format!("int_const {value}"))
    }

    fn ident(id: i64, name: &str, type_string: &str) -> Node {
        Node::new(id, "Identifier", "0:1:0")
            .with("name", name)
            .with("referencedDeclaration", 99i64)
            .with("typeString", type_string)
    }

    fn param(id: i64, type_string: &str) -> Node {
        Node::new(id, "VariableDeclaration", "0:1:0")
            .with("name", "")
            .with("typeString", type_string)
    }

    fn function(visibility: &str, params: Vec<Node>) -> Node {
        Node::new(1, "FunctionDefinition", "0:1:0")
            .with("name", "transfer")
            .with("kind", "function")
            .with("visibility", visibility)
            .with("parameters", Node::new(2, "ParameterList", "0:1:0").with("parameters", params))
    }

    fn facts() -> FactSet {
        let schema = Schema::derive(
            &solfacts_ast::solidity::grammar(),
            &SkipSet::standard(),
            &SolidityEnrichment::new(),
        )
        .unwrap();
        FactSet::new(schema.inputs())
    }

    #[test]
    fn test_constant_expressions() {
        let sum = Node::new(3, "BinaryOperation", "0:1:0")
            .with("operator", "+")
            .with("leftExpression", literal(1, "1"))
            .with("rightExpression", literal(2, "2"));
        assert!(is_constant(&sum));

        let mixed = Node::new(3, "BinaryOperation", "0:1:0")
            .with("leftExpression", literal(1, "1"))
            .with("rightExpression", ident(2, "x", "uint256"));
        assert!(!is_constant(&mixed));

        let conversion = Node::new(5, "FunctionCall", "0:1:0")
            .with("kind", "typeConversion")
            .with("arguments", vec![literal(4, "0")]);
        assert!(is_constant(&conversion));

        let holey = Node::new(6, "TupleExpression", "0:1:0")
            .with("components", vec![Value::Null, literal(7, "1").into()]);
        assert!(!is_constant(&holey));
    }

    #[test]
    fn test_external_call_detection() {
        let call = |type_string: &str| {
            Node::new(10, "FunctionCall", "0:1:0")
                .with("kind", "functionCall")
                .with("expression", ident(11, "f", type_string))
        };
        assert!(is_external_call(&call(
            "function (address,uint256) external returns (bool)"
        )));
        assert!(!is_external_call(&call("function (uint256) pure returns (uint256)")));
    }

    #[test]
    fn test_function_signature_and_selector() {
        let node = function(
            "external",
            vec![param(3, "address"), param(4, "uint256")],
        );
        let signature = function_signature(&node).unwrap();
        assert_eq!(signature, "transfer(address,uint256)");
        assert_eq!(selector(&node, &signature), "a9059cbb");

        assert!(function_signature(&function("internal", vec![])).is_none());
    }

    #[test]
    fn test_recorded_selector_wins() {
        let node = function("public", vec![]).with("functionSelector", "deadbeef");
        assert_eq!(selector(&node, "transfer()"), "deadbeef");
    }

    #[test]
    fn test_canonical_types() {
        assert_eq!(canonical_type("uint256[] memory"), "uint256[]");
        assert_eq!(canonical_type("contract IERC20"), "address");
        assert_eq!(canonical_type("contract IERC20[2] storage ref"), "address[2]");
        assert_eq!(canonical_type("enum Color"), "uint8");
        assert_eq!(canonical_type("bytes calldata"), "bytes");
        assert_eq!(canonical_type("address payable"), "address");
    }

    #[test]
    fn test_getter_signature() {
        let mapping = Node::new(2, "Mapping", "0:1:0")
            .with(
                "keyType",
                Node::new(3, "ElementaryTypeName", "0:1:0").with("typeString", "address"),
            )
            .with(
                "valueType",
                Node::new(4, "ElementaryTypeName", "0:1:0").with("typeString", "uint256"),
            );
        let var = Node::new(1, "VariableDeclaration", "0:1:0")
            .with("name", "balanceOf")
            .with("stateVariable", true)
            .with("visibility", "public")
            .with("typeName", mapping);

        let signature = getter_signature(&var).unwrap();
        assert_eq!(signature, "balanceOf(address)");
        assert_eq!(selector(&var, &signature), "70a08231");

        let private = var.clone().with("visibility", "private");
        assert!(getter_signature(&private).is_none());
    }

    #[test]
    fn test_enrich_emits_facts() {
        let mut out = facts();
        let enrichment =
            SolidityEnrichment::new().with_compiler_version("0.8.19+commit.7dd6d404".parse().unwrap());
        enrichment.enrich(&literal(1, "1"), &mut out).unwrap();
        enrichment
            .enrich(&function("public", vec![param(3, "address")]), &mut out)
            .unwrap();
        enrichment.finish(&mut out).unwrap();

        assert_eq!(
            out.facts_of(CONSTANT_EXPRESSION).unwrap(),
            &[vec![RawValue::Number(1)]]
        );
        assert_eq!(
            out.facts_of(FUNCTION_SIGNATURE).unwrap(),
            &[vec![RawValue::Number(1), RawValue::symbol("transfer(address)")]]
        );
        assert_eq!(
            out.facts_of(COMPILER_VERSION).unwrap(),
            &[vec![
                RawValue::Number(0),
                RawValue::Number(8),
                RawValue::Number(19)
            ]]
        );
    }

    #[test]
    fn test_compiler_version_parsing() {
        assert_eq!(
            "v0.7.6".parse::<CompilerVersion>().unwrap(),
            CompilerVersion::new(0, 7, 6)
        );
        assert!("0.8".parse::<CompilerVersion>().is_err());
        assert!("latest".parse::<CompilerVersion>().is_err());
    }
}
