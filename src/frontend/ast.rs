//! Untyped syntax tree produced by the parser. The semantic analyzer fills in
//! the `resolved_type` and `declaration` slots in place; nothing else is ever
//! mutated after parsing.

use strum::EnumIter;

use super::{SourceLocation, intern::InternedSymbol};
use crate::{
    index::{IndexVec, simple_index},
    middle::ty::Type,
};

simple_index! {
    /// Identifies a declaration in the [`Program`] declaration arena. Use sites
    /// store this instead of a reference so they can never outlive the
    /// declaration they point at.
    pub struct DeclId;
}

#[derive(Debug, Default)]
pub struct Program {
    /// Every parameter, variable and function declared in the program
    pub declarations: IndexVec<DeclId, Declaration>,
    /// Top level functions in source order
    pub functions: Vec<FunctionDefinition>,
}

impl Program {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn declare_parameter(
        &mut self,
        location: SourceLocation,
        identifier: &str,
        type_name: &str,
    ) -> DeclId {
        self.declarations.push(Declaration {
            location,
            identifier: InternedSymbol::new(identifier),
            type_name: type_name.to_owned(),
            resolved_type: None,
            kind: DeclarationKind::Parameter,
        })
    }

    /// Declares a block scoped variable. The declaration only becomes visible
    /// once the matching [`StatementKind::VariableDeclaration`] is resolved.
    pub fn declare_variable(
        &mut self,
        location: SourceLocation,
        identifier: &str,
        type_name: &str,
    ) -> DeclId {
        self.declarations.push(Declaration {
            location,
            identifier: InternedSymbol::new(identifier),
            type_name: type_name.to_owned(),
            resolved_type: None,
            kind: DeclarationKind::Variable,
        })
    }

    /// Declares a top level function and appends it to the function list
    pub fn declare_function(
        &mut self,
        location: SourceLocation,
        identifier: &str,
        return_type_name: &str,
        parameters: Vec<DeclId>,
        body: Block,
    ) -> DeclId {
        let declaration = self.declarations.push(Declaration {
            location,
            identifier: InternedSymbol::new(identifier),
            type_name: return_type_name.to_owned(),
            resolved_type: None,
            kind: DeclarationKind::Function { parameters },
        });

        self.functions
            .push(FunctionDefinition { declaration, body });

        declaration
    }

    pub fn declaration(&self, id: DeclId) -> &Declaration {
        &self.declarations[id]
    }

    pub fn function_named(&self, identifier: &str) -> Option<&FunctionDefinition> {
        let symbol = InternedSymbol::new(identifier);

        self.functions
            .iter()
            .find(|function| self.declarations[function.declaration].identifier == symbol)
    }
}

#[derive(Debug)]
pub struct FunctionDefinition {
    pub declaration: DeclId,
    pub body: Block,
}

#[derive(Debug)]
pub struct Declaration {
    pub location: SourceLocation,
    pub identifier: InternedSymbol,
    /// The declared type (or return type for functions) as spelled in the
    /// source
    pub type_name: String,
    /// Absent until semantic analysis resolves `type_name`
    pub resolved_type: Option<Type>,
    pub kind: DeclarationKind,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeclarationKind {
    Parameter,
    Variable,
    Function { parameters: Vec<DeclId> },
}

impl DeclarationKind {
    pub fn is_function(&self) -> bool {
        matches!(self, Self::Function { .. })
    }
}

#[derive(Debug)]
pub struct Block {
    pub location: SourceLocation,
    pub statements: Vec<Statement>,
}

impl Block {
    pub fn new(location: SourceLocation, statements: Vec<Statement>) -> Self {
        Self {
            location,
            statements,
        }
    }
}

#[derive(Debug)]
pub struct Statement {
    pub location: SourceLocation,
    pub kind: StatementKind,
}

#[derive(Debug)]
pub enum StatementKind {
    Expression(Expression),
    VariableDeclaration {
        declaration: DeclId,
        initializer: Option<Expression>,
    },
    Return(Option<Expression>),
    If {
        condition: Expression,
        then_block: Block,
        else_block: Option<Block>,
    },
    While { condition: Expression, body: Block },
    Block(Block),
    /// Placeholder left behind by parser error recovery
    Invalid,
}

impl Statement {
    pub fn new(location: SourceLocation, kind: StatementKind) -> Self {
        Self { location, kind }
    }

    pub fn expression(expression: Expression) -> Self {
        Self::new(expression.location, StatementKind::Expression(expression))
    }

    pub fn variable(
        location: SourceLocation,
        declaration: DeclId,
        initializer: Option<Expression>,
    ) -> Self {
        Self::new(
            location,
            StatementKind::VariableDeclaration {
                declaration,
                initializer,
            },
        )
    }

    pub fn ret(location: SourceLocation, value: Option<Expression>) -> Self {
        Self::new(location, StatementKind::Return(value))
    }
}

#[derive(Debug)]
pub struct Expression {
    pub location: SourceLocation,
    pub kind: ExpressionKind,
    /// Absent until semantic analysis succeeds for this node
    pub resolved_type: Option<Type>,
}

#[derive(Debug)]
pub enum ExpressionKind {
    /// The literal as spelled in the source (`1`, `2.5`)
    NumberLiteral(String),
    StringLiteral(String),
    BooleanLiteral(bool),
    Reference(Reference),
    Call {
        callee: Reference,
        arguments: Vec<Expression>,
    },
    Binary {
        lhs: Box<Expression>,
        operator: BinaryOperator,
        rhs: Box<Expression>,
    },
    Assignment {
        target: Reference,
        value: Box<Expression>,
    },
    Print { arguments: Vec<Expression> },
    /// Placeholder left behind by parser error recovery
    Invalid,
}

/// A use of a name. `declaration` is filled in once the name resolves.
#[derive(Debug, Clone)]
pub struct Reference {
    pub identifier: InternedSymbol,
    pub declaration: Option<DeclId>,
}

impl Reference {
    pub fn new(identifier: &str) -> Self {
        Self {
            identifier: InternedSymbol::new(identifier),
            declaration: None,
        }
    }
}

impl Expression {
    pub fn new(location: SourceLocation, kind: ExpressionKind) -> Self {
        Self {
            location,
            kind,
            resolved_type: None,
        }
    }

    pub fn number(location: SourceLocation, value: &str) -> Self {
        Self::new(location, ExpressionKind::NumberLiteral(value.to_owned()))
    }

    pub fn string(location: SourceLocation, value: &str) -> Self {
        Self::new(location, ExpressionKind::StringLiteral(value.to_owned()))
    }

    pub fn boolean(location: SourceLocation, value: bool) -> Self {
        Self::new(location, ExpressionKind::BooleanLiteral(value))
    }

    pub fn reference(location: SourceLocation, identifier: &str) -> Self {
        Self::new(
            location,
            ExpressionKind::Reference(Reference::new(identifier)),
        )
    }

    pub fn call(location: SourceLocation, callee: &str, arguments: Vec<Expression>) -> Self {
        Self::new(
            location,
            ExpressionKind::Call {
                callee: Reference::new(callee),
                arguments,
            },
        )
    }

    pub fn binary(
        location: SourceLocation,
        lhs: Expression,
        operator: BinaryOperator,
        rhs: Expression,
    ) -> Self {
        Self::new(
            location,
            ExpressionKind::Binary {
                lhs: Box::new(lhs),
                operator,
                rhs: Box::new(rhs),
            },
        )
    }

    pub fn assignment(location: SourceLocation, target: &str, value: Expression) -> Self {
        Self::new(
            location,
            ExpressionKind::Assignment {
                target: Reference::new(target),
                value: Box::new(value),
            },
        )
    }

    pub fn print(location: SourceLocation, arguments: Vec<Expression>) -> Self {
        Self::new(location, ExpressionKind::Print { arguments })
    }

    /// The declaration a reference, call or assignment resolved to
    pub fn declaration(&self) -> Option<DeclId> {
        match &self.kind {
            ExpressionKind::Reference(reference)
            | ExpressionKind::Call {
                callee: reference, ..
            }
            | ExpressionKind::Assignment {
                target: reference, ..
            } => reference.declaration,
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, EnumIter)]
pub enum BinaryOperator {
    Add,
    Subtract,
    Multiply,
    Divide,
    Modulus,
    LessThan,
    GreaterThan,
    LessThanOrEqualTo,
    GreaterThanOrEqualTo,
    Equals,
    NotEquals,
    LogicalAnd,
    LogicalOr,
}

/// Binary operators are type checked per family
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OperatorFamily {
    Arithmetic,
    Comparison,
    Logical,
}

impl BinaryOperator {
    pub fn family(self) -> OperatorFamily {
        match self {
            Self::Add | Self::Subtract | Self::Multiply | Self::Divide | Self::Modulus => {
                OperatorFamily::Arithmetic
            }
            Self::LessThan
            | Self::GreaterThan
            | Self::LessThanOrEqualTo
            | Self::GreaterThanOrEqualTo
            | Self::Equals
            | Self::NotEquals => OperatorFamily::Comparison,
            Self::LogicalAnd | Self::LogicalOr => OperatorFamily::Logical,
        }
    }
}

impl core::fmt::Display for BinaryOperator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Self::Add => "+",
            Self::Subtract => "-",
            Self::Multiply => "*",
            Self::Divide => "/",
            Self::Modulus => "%",
            Self::LessThan => "<",
            Self::GreaterThan => ">",
            Self::LessThanOrEqualTo => "<=",
            Self::GreaterThanOrEqualTo => ">=",
            Self::Equals => "==",
            Self::NotEquals => "!=",
            Self::LogicalAnd => "&&",
            Self::LogicalOr => "||",
        })
    }
}
