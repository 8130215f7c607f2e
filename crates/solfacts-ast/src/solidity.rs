//! The Solidity AST grammar.
//!
//! Field names follow the solc compact JSON AST, with `typeString` lifted
//! out of `typeDescriptions` onto the node itself.

use std::fmt;
use std::str::FromStr;

use crate::grammar::{FieldDescriptor as F, Grammar, NodeKindDescriptor, SemanticType as T};
use crate::{AstError, Node, Value};

/// Name of the root kind.
pub const ROOT: &str = "Node";

/// Abstract kinds and their bases, in declaration order.
pub const ABSTRACT_KINDS: &[(&str, &str)] = &[
    ("Expression", ROOT),
    ("PrimaryExpression", "Expression"),
    ("Statement", ROOT),
    ("StatementWithChildren", "Statement"),
    ("TypeName", ROOT),
];

/// Symbol enumerations used by Solidity fields.
pub const ENUMS: &[&str] = &[
    "ContractKind",
    "LiteralKind",
    "FunctionCallKind",
    "DataLocation",
    "Mutability",
    "FunctionStateMutability",
    "FunctionKind",
    "ModifierInvocationKind",
    "StateVariableVisibility",
    "FunctionVisibility",
    "ElementaryTypeNameMutability",
    "SubdenominationT",
];

macro_rules! sol_kinds {
    ($($kind:ident),* $(,)?) => {
        /// Concrete Solidity node kinds.
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
        pub enum SolKind {
            $($kind,)*
        }

        impl SolKind {
            /// Every concrete kind, in grammar order.
            pub const ALL: &'static [SolKind] = &[$(SolKind::$kind,)*];

            pub fn as_str(self) -> &'static str {
                match self {
                    $(SolKind::$kind => stringify!($kind),)*
                }
            }
        }

        impl FromStr for SolKind {
            type Err = AstError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s {
                    $(stringify!($kind) => Ok(SolKind::$kind),)*
                    other => Err(AstError::UnknownNodeKind(other.to_string())),
                }
            }
        }
    };
}

sol_kinds! {
    SourceUnit,
    PragmaDirective,
    ImportDirective,
    InheritanceSpecifier,
    ModifierInvocation,
    OverrideSpecifier,
    ParameterList,
    UsingForDirective,
    IdentifierPath,
    StructuredDocumentation,
    ContractDefinition,
    FunctionDefinition,
    ModifierDefinition,
    EventDefinition,
    ErrorDefinition,
    StructDefinition,
    EnumDefinition,
    EnumValue,
    UserDefinedValueTypeDefinition,
    VariableDeclaration,
    ElementaryTypeName,
    UserDefinedTypeName,
    ArrayTypeName,
    Mapping,
    FunctionTypeName,
    Block,
    UncheckedBlock,
    ExpressionStatement,
    VariableDeclarationStatement,
    IfStatement,
    ForStatement,
    WhileStatement,
    DoWhileStatement,
    Return,
    EmitStatement,
    RevertStatement,
    Break,
    Continue,
    PlaceholderStatement,
    Throw,
    TryStatement,
    TryCatchClause,
    InlineAssembly,
    Assignment,
    BinaryOperation,
    UnaryOperation,
    Conditional,
    FunctionCall,
    FunctionCallOptions,
    IndexAccess,
    IndexRangeAccess,
    MemberAccess,
    NewExpression,
    TupleExpression,
    ElementaryTypeNameExpression,
    Identifier,
    Literal,
}

impl fmt::Display for SolKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

const EXPR: T = T::Node("Expression");
const STMT: T = T::Node("Statement");
const TYPE_NAME: T = T::Node("TypeName");
const PARAMS: T = T::Node("ParameterList");
const TYPE_STRING: F = F::scalar("typeString", T::Text);

impl SolKind {
    /// The kind's base in the single-inheritance chain.
    pub fn base(self) -> &'static str {
        use SolKind::*;
        match self {
            Assignment | BinaryOperation | UnaryOperation | Conditional | FunctionCall
            | FunctionCallOptions | IndexAccess | IndexRangeAccess | MemberAccess
            | NewExpression | TupleExpression => "Expression",
            ElementaryTypeNameExpression | Identifier | Literal => "PrimaryExpression",
            Block | UncheckedBlock => "StatementWithChildren",
            ExpressionStatement | VariableDeclarationStatement | IfStatement | ForStatement
            | WhileStatement | DoWhileStatement | Return | EmitStatement | RevertStatement
            | Break | Continue | PlaceholderStatement | Throw | TryStatement | InlineAssembly => {
                "Statement"
            }
            ElementaryTypeName | UserDefinedTypeName | ArrayTypeName | Mapping
            | FunctionTypeName => "TypeName",
            SourceUnit | PragmaDirective | ImportDirective | InheritanceSpecifier
            | ModifierInvocation | OverrideSpecifier | ParameterList | UsingForDirective
            | IdentifierPath | StructuredDocumentation | ContractDefinition
            | FunctionDefinition | ModifierDefinition | EventDefinition | ErrorDefinition
            | StructDefinition | EnumDefinition | EnumValue | UserDefinedValueTypeDefinition
            | VariableDeclaration | TryCatchClause => ROOT,
        }
    }

    /// Whether instances of this kind are expressions.
    pub fn is_expression(self) -> bool {
        matches!(self.base(), "Expression" | "PrimaryExpression")
    }

    /// Field layout of this kind.
    pub fn fields(self) -> Vec<F> {
        use SolKind::*;
        match self {
            SourceUnit => vec![
                F::scalar("absolutePath", T::Text),
                // solc writes a list of declaration ids per name
                F::map("exportedSymbols", T::AnyNode),
                F::optional("license", T::Text),
            ],
            PragmaDirective => vec![F::array("literals", T::Text)],
            ImportDirective => vec![
                F::scalar("file", T::Text),
                F::scalar("absolutePath", T::Text),
                F::scalar("unitAlias", T::Text),
                F::scalar("scope", T::Node("SourceUnit")),
                F::scalar("sourceUnit", T::Node("SourceUnit")),
            ],
            InheritanceSpecifier => vec![
                F::scalar(
                    "baseName",
                    T::NodeUnion(&["UserDefinedTypeName", "IdentifierPath"]),
                ),
                F::array("arguments", EXPR),
            ],
            ModifierInvocation => vec![
                F::scalar("modifierName", T::NodeUnion(&["Identifier", "IdentifierPath"])),
                F::array("arguments", EXPR),
                F::optional("kind", T::Enum("ModifierInvocationKind")),
            ],
            OverrideSpecifier => vec![F::array("overrides", T::AnyNode)],
            ParameterList => vec![F::array("parameters", T::Node("VariableDeclaration"))],
            UsingForDirective => vec![
                F::optional(
                    "libraryName",
                    T::NodeUnion(&["UserDefinedTypeName", "IdentifierPath"]),
                ),
                F::optional("typeName", TYPE_NAME),
                F::scalar("global", T::Bool),
            ],
            IdentifierPath => vec![
                F::scalar("name", T::Text),
                F::scalar("referencedDeclaration", T::AnyNode),
            ],
            StructuredDocumentation => vec![F::scalar("text", T::Text)],
            ContractDefinition => vec![
                F::scalar("name", T::Text),
                F::scalar("scope", T::Node("SourceUnit")),
                F::scalar("contractKind", T::Enum("ContractKind")),
                F::scalar("abstract", T::Bool),
                F::scalar("fullyImplemented", T::Bool),
                F::record_list("linearizedBaseContracts", T::Node("ContractDefinition")),
                F::array("usedErrors", T::Node("ErrorDefinition")),
                F::array("usedEvents", T::Node("EventDefinition")),
                F::array("baseContracts", T::Node("InheritanceSpecifier")),
                F::optional("documentation", T::Node("StructuredDocumentation")),
            ],
            FunctionDefinition => vec![
                F::scalar("name", T::Text),
                F::scalar("scope", T::AnyNode),
                F::scalar("kind", T::Enum("FunctionKind")),
                F::scalar("stateMutability", T::Enum("FunctionStateMutability")),
                F::scalar("virtual", T::Bool),
                F::scalar("visibility", T::Enum("FunctionVisibility")),
                F::scalar("implemented", T::Bool),
                F::scalar("parameters", PARAMS),
                F::scalar("returnParameters", PARAMS),
                F::array("modifiers", T::Node("ModifierInvocation")),
                F::optional("overrides", T::Node("OverrideSpecifier")),
                F::optional("body", T::Node("Block")),
                F::optional("functionSelector", T::Text),
                F::optional("documentation", T::Node("StructuredDocumentation")),
            ],
            ModifierDefinition => vec![
                F::scalar("name", T::Text),
                F::scalar("virtual", T::Bool),
                F::scalar("visibility", T::Enum("FunctionVisibility")),
                F::scalar("parameters", PARAMS),
                F::optional("overrides", T::Node("OverrideSpecifier")),
                F::optional("body", T::Node("Block")),
            ],
            EventDefinition => vec![
                F::scalar("name", T::Text),
                F::scalar("anonymous", T::Bool),
                F::scalar("parameters", PARAMS),
            ],
            ErrorDefinition => vec![F::scalar("name", T::Text), F::scalar("parameters", PARAMS)],
            StructDefinition => vec![
                F::scalar("name", T::Text),
                F::scalar("canonicalName", T::Text),
                F::scalar("scope", T::AnyNode),
                F::scalar("visibility", T::Text),
                F::array("members", T::Node("VariableDeclaration")),
            ],
            EnumDefinition => vec![
                F::scalar("name", T::Text),
                F::scalar("canonicalName", T::Text),
                F::array("members", T::Node("EnumValue")),
            ],
            EnumValue => vec![F::scalar("name", T::Text)],
            UserDefinedValueTypeDefinition => vec![
                F::scalar("name", T::Text),
                F::scalar("underlyingType", T::Node("ElementaryTypeName")),
            ],
            VariableDeclaration => vec![
                F::scalar("name", T::Text),
                F::scalar("constant", T::Bool),
                F::optional("indexed", T::Bool),
                F::scalar("scope", T::AnyNode),
                F::scalar("stateVariable", T::Bool),
                F::scalar("storageLocation", T::Enum("DataLocation")),
                F::scalar("visibility", T::Enum("StateVariableVisibility")),
                F::scalar("mutability", T::Enum("Mutability")),
                TYPE_STRING,
                F::optional("typeName", TYPE_NAME),
                F::optional("overrides", T::Node("OverrideSpecifier")),
                F::optional("value", EXPR),
                F::optional("functionSelector", T::Text),
                F::optional("documentation", T::Node("StructuredDocumentation")),
            ],
            ElementaryTypeName => vec![
                F::scalar("name", T::Text),
                TYPE_STRING,
                F::optional("stateMutability", T::Enum("ElementaryTypeNameMutability")),
            ],
            UserDefinedTypeName => vec![
                F::optional("name", T::Text),
                F::scalar("referencedDeclaration", T::AnyNode),
                F::optional("pathNode", T::Node("IdentifierPath")),
                TYPE_STRING,
            ],
            ArrayTypeName => vec![
                F::scalar("baseType", TYPE_NAME),
                F::optional("length", EXPR),
                TYPE_STRING,
            ],
            Mapping => vec![
                F::scalar("keyType", TYPE_NAME),
                F::scalar("valueType", TYPE_NAME),
                TYPE_STRING,
            ],
            FunctionTypeName => vec![
                F::scalar("visibility", T::Enum("FunctionVisibility")),
                F::scalar("stateMutability", T::Enum("FunctionStateMutability")),
                F::scalar("parameterTypes", PARAMS),
                F::scalar("returnParameterTypes", PARAMS),
                TYPE_STRING,
            ],
            Block | UncheckedBlock => vec![F::array("statements", STMT)],
            ExpressionStatement => vec![F::scalar("expression", EXPR)],
            VariableDeclarationStatement => vec![
                F::sparse("assignments", T::Node("VariableDeclaration")),
                F::sparse("declarations", T::Node("VariableDeclaration")),
                F::optional("initialValue", EXPR),
            ],
            IfStatement => vec![
                F::scalar("condition", EXPR),
                F::scalar("trueBody", STMT),
                F::optional("falseBody", STMT),
            ],
            ForStatement => vec![
                F::optional(
                    "initializationExpression",
                    T::NodeUnion(&["ExpressionStatement", "VariableDeclarationStatement"]),
                ),
                F::optional("condition", EXPR),
                F::optional("loopExpression", T::Node("ExpressionStatement")),
                F::scalar("body", STMT),
            ],
            WhileStatement | DoWhileStatement => {
                vec![F::scalar("condition", EXPR), F::scalar("body", STMT)]
            }
            Return => vec![
                F::optional("expression", EXPR),
                F::scalar("functionReturnParameters", T::AnyNode),
            ],
            EmitStatement => vec![F::scalar("eventCall", T::Node("FunctionCall"))],
            RevertStatement => vec![F::scalar("errorCall", T::Node("FunctionCall"))],
            Break | Continue | PlaceholderStatement | Throw | InlineAssembly => Vec::new(),
            TryStatement => vec![
                F::scalar("externalCall", T::Node("FunctionCall")),
                F::array("clauses", T::Node("TryCatchClause")),
            ],
            TryCatchClause => vec![
                F::scalar("errorName", T::Text),
                F::optional("parameters", PARAMS),
                F::scalar("block", T::Node("Block")),
            ],
            Assignment => vec![
                F::scalar("operator", T::Text),
                F::scalar("leftHandSide", EXPR),
                F::scalar("rightHandSide", EXPR),
                TYPE_STRING,
            ],
            BinaryOperation => vec![
                F::scalar("operator", T::Text),
                F::scalar("leftExpression", EXPR),
                F::scalar("rightExpression", EXPR),
                F::optional("function", T::AnyNode),
                TYPE_STRING,
            ],
            UnaryOperation => vec![
                F::scalar("prefix", T::Bool),
                F::scalar("operator", T::Text),
                F::scalar("subExpression", EXPR),
                F::optional("function", T::AnyNode),
                TYPE_STRING,
            ],
            Conditional => vec![
                F::scalar("condition", EXPR),
                F::scalar("trueExpression", EXPR),
                F::scalar("falseExpression", EXPR),
                TYPE_STRING,
            ],
            FunctionCall => vec![
                F::scalar("kind", T::Enum("FunctionCallKind")),
                F::scalar("expression", EXPR),
                F::array("arguments", EXPR),
                F::array("names", T::Text),
                F::scalar("tryCall", T::Bool),
                TYPE_STRING,
            ],
            FunctionCallOptions => vec![
                F::scalar("expression", EXPR),
                F::map("options", EXPR),
                TYPE_STRING,
            ],
            IndexAccess => vec![
                F::scalar("baseExpression", EXPR),
                F::optional("indexExpression", EXPR),
                TYPE_STRING,
            ],
            IndexRangeAccess => vec![
                F::scalar("baseExpression", EXPR),
                F::optional("startExpression", EXPR),
                F::optional("endExpression", EXPR),
                TYPE_STRING,
            ],
            MemberAccess => vec![
                F::scalar("expression", EXPR),
                F::scalar("memberName", T::Text),
                F::scalar("referencedDeclaration", T::AnyNode),
                TYPE_STRING,
            ],
            NewExpression => vec![F::scalar("typeName", TYPE_NAME), TYPE_STRING],
            TupleExpression => vec![
                F::scalar("isInlineArray", T::Bool),
                F::sparse("components", EXPR),
                TYPE_STRING,
            ],
            ElementaryTypeNameExpression => vec![
                F::scalar("typeName", T::NodeOrKeyword("ElementaryTypeName")),
                TYPE_STRING,
            ],
            Identifier => vec![
                F::scalar("name", T::Text),
                F::scalar("referencedDeclaration", T::AnyNode),
                TYPE_STRING,
            ],
            Literal => vec![
                F::scalar("kind", T::Enum("LiteralKind")),
                F::optional("value", T::Text),
                F::scalar("hexValue", T::Text),
                F::optional("subdenomination", T::Enum("SubdenominationT")),
                TYPE_STRING,
            ],
        }
    }

    pub fn descriptor(self) -> NodeKindDescriptor {
        NodeKindDescriptor::concrete(self.as_str(), self.base(), self.fields())
    }
}

/// The full Solidity grammar: abstract kinds first, then every concrete kind.
pub fn grammar() -> Grammar {
    let mut grammar = Grammar::new(ROOT);
    grammar.enums.extend_from_slice(ENUMS);
    for &(name, base) in ABSTRACT_KINDS {
        grammar = grammar.with_kind(NodeKindDescriptor::abstract_kind(name, base));
    }
    for kind in SolKind::ALL {
        grammar = grammar.with_kind(kind.descriptor());
    }
    grammar
}

/// Load a solc compact JSON tree.
///
/// Every `typeDescriptions.typeString` is copied onto its node as
/// `typeString`, which is where the grammar expects it.
pub fn load(json: &str) -> Result<Node, AstError> {
    let mut root = Node::from_json(json)?;
    lift_type_strings(&mut root);
    Ok(root)
}

fn lift_type_strings(node: &mut Node) {
    if !node.fields.contains_key("typeString") {
        let lifted = match node.field("typeDescriptions") {
            Some(Value::Map(desc)) => desc.get("typeString").cloned(),
            _ => None,
        };
        if let Some(type_string) = lifted {
            node.fields.insert("typeString".to_string(), type_string);
        }
    }
    for value in node.fields.values_mut() {
        lift_in_value(value);
    }
}

fn lift_in_value(value: &mut Value) {
    match value {
        Value::Node(child) => lift_type_strings(child),
        Value::List(items) => items.iter_mut().for_each(lift_in_value),
        Value::Map(entries) => entries.values_mut().for_each(lift_in_value),
        Value::Null | Value::Bool(_) | Value::Int(_) | Value::Str(_) => {}
    }
}
