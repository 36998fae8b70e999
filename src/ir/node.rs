use serde::{Deserialize, Serialize};

use super::{NodeId, Position};

/// A node of the syntax graph.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Node {
    #[serde(flatten)]
    pub kind: NodeKind,
    pub position: Position,
    /// Name of the CST node kind this node was lowered from.
    pub cst_kind: String,
}

impl Node {
    pub fn label_type(&self) -> LabelType {
        self.kind.label_type()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LiteralKind {
    String,
    Template,
    Number,
    Boolean,
    Null,
    Regex,
}

/// Kind-specific attributes, one variant per label type.
///
/// Child references point at nodes that are also linked through AST edges.
/// Attributes a rule reads are always present for their kind.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "label_type")]
pub enum NodeKind {
    File,
    StatementBlock,
    Comment,
    Pass,
    Import {
        module: String,
        names: Vec<String>,
    },
    ClassDeclaration {
        name: Option<String>,
        body: Option<NodeId>,
    },
    TypeDeclaration {
        name: String,
    },
    MethodDeclaration {
        name: Option<String>,
        parameters: Option<NodeId>,
        body: Option<NodeId>,
    },
    ParameterList,
    Parameter {
        name: String,
        variable_type: Option<String>,
        default: Option<NodeId>,
    },
    VariableDeclaration {
        variables: Vec<String>,
        variable_type: Option<String>,
        value: Option<NodeId>,
    },
    Assignment {
        variables: Vec<String>,
        operator: String,
        value: NodeId,
    },
    If {
        condition: NodeId,
        true_branch: NodeId,
        false_branch: Option<NodeId>,
    },
    While {
        condition: NodeId,
        body: NodeId,
    },
    DoWhile {
        condition: NodeId,
        body: NodeId,
    },
    For {
        initializer: Option<NodeId>,
        condition: Option<NodeId>,
        update: Option<NodeId>,
        body: NodeId,
    },
    ForEach {
        variables: Vec<String>,
        iterable: NodeId,
        body: NodeId,
    },
    Switch {
        value: NodeId,
    },
    SwitchSection {
        case_value: Option<NodeId>,
    },
    Return {
        value: Option<NodeId>,
    },
    Break,
    Continue,
    Throw {
        value: Option<NodeId>,
    },
    Try {
        body: NodeId,
        finalizer: Option<NodeId>,
    },
    CatchClause {
        variable: Option<String>,
        body: NodeId,
    },
    Using {
        variables: Vec<String>,
        value: NodeId,
        body: NodeId,
    },
    MethodInvocation {
        expression: String,
        object: Option<NodeId>,
        arguments: Option<NodeId>,
    },
    ArgumentList,
    NamedArgument {
        name: String,
        value: NodeId,
    },
    MemberAccess {
        expression: String,
        member: String,
        object: NodeId,
    },
    ElementAccess {
        expression: String,
        object: NodeId,
        index: NodeId,
    },
    SymbolLookup {
        symbol: String,
    },
    Literal {
        value: String,
        literal_kind: LiteralKind,
    },
    BinaryOperation {
        operator: String,
        left: NodeId,
        right: NodeId,
    },
    UnaryExpression {
        operator: String,
        operand: NodeId,
    },
    TernaryOperation {
        condition: NodeId,
        true_value: NodeId,
        false_value: NodeId,
    },
    ObjectCreation {
        name: String,
        arguments: Option<NodeId>,
    },
    Object,
    Pair {
        key: String,
        value: NodeId,
    },
    ArrayInitializer,
    Unsupported {
        cst_kind: String,
    },
}

/// Fieldless mirror of [`NodeKind`], used to key dispatch tables.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum LabelType {
    File,
    StatementBlock,
    Comment,
    Pass,
    Import,
    ClassDeclaration,
    TypeDeclaration,
    MethodDeclaration,
    ParameterList,
    Parameter,
    VariableDeclaration,
    Assignment,
    If,
    While,
    DoWhile,
    For,
    ForEach,
    Switch,
    SwitchSection,
    Return,
    Break,
    Continue,
    Throw,
    Try,
    CatchClause,
    Using,
    MethodInvocation,
    ArgumentList,
    NamedArgument,
    MemberAccess,
    ElementAccess,
    SymbolLookup,
    Literal,
    BinaryOperation,
    UnaryExpression,
    TernaryOperation,
    ObjectCreation,
    Object,
    Pair,
    ArrayInitializer,
    Unsupported,
}

impl LabelType {
    pub const ALL: [LabelType; 41] = [
        Self::File,
        Self::StatementBlock,
        Self::Comment,
        Self::Pass,
        Self::Import,
        Self::ClassDeclaration,
        Self::TypeDeclaration,
        Self::MethodDeclaration,
        Self::ParameterList,
        Self::Parameter,
        Self::VariableDeclaration,
        Self::Assignment,
        Self::If,
        Self::While,
        Self::DoWhile,
        Self::For,
        Self::ForEach,
        Self::Switch,
        Self::SwitchSection,
        Self::Return,
        Self::Break,
        Self::Continue,
        Self::Throw,
        Self::Try,
        Self::CatchClause,
        Self::Using,
        Self::MethodInvocation,
        Self::ArgumentList,
        Self::NamedArgument,
        Self::MemberAccess,
        Self::ElementAccess,
        Self::SymbolLookup,
        Self::Literal,
        Self::BinaryOperation,
        Self::UnaryExpression,
        Self::TernaryOperation,
        Self::ObjectCreation,
        Self::Object,
        Self::Pair,
        Self::ArrayInitializer,
        Self::Unsupported,
    ];

    /// Constructs whose value can flow into a sink.
    pub fn is_expression(self) -> bool {
        matches!(
            self,
            Self::MethodInvocation
                | Self::ArgumentList
                | Self::NamedArgument
                | Self::MemberAccess
                | Self::ElementAccess
                | Self::SymbolLookup
                | Self::Literal
                | Self::BinaryOperation
                | Self::UnaryExpression
                | Self::TernaryOperation
                | Self::ObjectCreation
                | Self::Object
                | Self::Pair
                | Self::ArrayInitializer
        )
    }
}

impl std::fmt::Display for LabelType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{self:?}")
    }
}

impl NodeKind {
    pub fn label_type(&self) -> LabelType {
        match self {
            Self::File => LabelType::File,
            Self::StatementBlock => LabelType::StatementBlock,
            Self::Comment => LabelType::Comment,
            Self::Pass => LabelType::Pass,
            Self::Import { .. } => LabelType::Import,
            Self::ClassDeclaration { .. } => LabelType::ClassDeclaration,
            Self::TypeDeclaration { .. } => LabelType::TypeDeclaration,
            Self::MethodDeclaration { .. } => LabelType::MethodDeclaration,
            Self::ParameterList => LabelType::ParameterList,
            Self::Parameter { .. } => LabelType::Parameter,
            Self::VariableDeclaration { .. } => LabelType::VariableDeclaration,
            Self::Assignment { .. } => LabelType::Assignment,
            Self::If { .. } => LabelType::If,
            Self::While { .. } => LabelType::While,
            Self::DoWhile { .. } => LabelType::DoWhile,
            Self::For { .. } => LabelType::For,
            Self::ForEach { .. } => LabelType::ForEach,
            Self::Switch { .. } => LabelType::Switch,
            Self::SwitchSection { .. } => LabelType::SwitchSection,
            Self::Return { .. } => LabelType::Return,
            Self::Break => LabelType::Break,
            Self::Continue => LabelType::Continue,
            Self::Throw { .. } => LabelType::Throw,
            Self::Try { .. } => LabelType::Try,
            Self::CatchClause { .. } => LabelType::CatchClause,
            Self::Using { .. } => LabelType::Using,
            Self::MethodInvocation { .. } => LabelType::MethodInvocation,
            Self::ArgumentList => LabelType::ArgumentList,
            Self::NamedArgument { .. } => LabelType::NamedArgument,
            Self::MemberAccess { .. } => LabelType::MemberAccess,
            Self::ElementAccess { .. } => LabelType::ElementAccess,
            Self::SymbolLookup { .. } => LabelType::SymbolLookup,
            Self::Literal { .. } => LabelType::Literal,
            Self::BinaryOperation { .. } => LabelType::BinaryOperation,
            Self::UnaryExpression { .. } => LabelType::UnaryExpression,
            Self::TernaryOperation { .. } => LabelType::TernaryOperation,
            Self::ObjectCreation { .. } => LabelType::ObjectCreation,
            Self::Object => LabelType::Object,
            Self::Pair { .. } => LabelType::Pair,
            Self::ArrayInitializer => LabelType::ArrayInitializer,
            Self::Unsupported { .. } => LabelType::Unsupported,
        }
    }

    /// Whether this node binds `symbol` for code that runs after it.
    pub fn defines(&self, symbol: &str) -> bool {
        match self {
            Self::VariableDeclaration { variables, .. }
            | Self::Assignment { variables, .. }
            | Self::ForEach { variables, .. }
            | Self::Using { variables, .. } => variables.iter().any(|v| v == symbol),
            Self::Parameter { name, .. } => name == symbol,
            Self::CatchClause { variable, .. } => variable.as_deref() == Some(symbol),
            _ => false,
        }
    }
}
