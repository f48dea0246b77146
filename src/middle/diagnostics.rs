use crate::{
    frontend::{SourceLocation, ast::BinaryOperator, intern::InternedSymbol},
    middle::ty::Type,
};

/// Everything the semantic analyzer can reject
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SemaError {
    #[error("{role} '{identifier}' has invalid type '{type_name}'")]
    InvalidType {
        role: &'static str,
        identifier: InternedSymbol,
        type_name: String,
    },
    #[error("variable '{identifier}' cannot have type 'void'")]
    VoidVariable { identifier: InternedSymbol },
    #[error("'{identifier}' redeclared in the same scope")]
    DuplicateDeclaration { identifier: InternedSymbol },
    #[error("symbol '{identifier}' not found")]
    UndefinedSymbol { identifier: InternedSymbol },
    #[error("calling non-function element '{identifier}'")]
    NotCallable { identifier: InternedSymbol },
    #[error("wrong number of arguments in call to '{callee}': expected {expected}, found {found}")]
    ArityMismatch {
        callee: InternedSymbol,
        expected: usize,
        found: usize,
    },
    #[error(
        "unexpected type of argument {position} in '{callee}' function call: expected {expected}, found {found}"
    )]
    ArgumentTypeMismatch {
        callee: InternedSymbol,
        position: usize,
        expected: Type,
        found: Type,
    },
    #[error("void function '{function}' cannot return a value")]
    VoidReturnsValue { function: InternedSymbol },
    #[error("function '{function}' must return a {expected} value")]
    MissingReturnValue {
        function: InternedSymbol,
        expected: Type,
    },
    #[error("function '{function}' returns {expected}, found {found}")]
    ReturnTypeMismatch {
        function: InternedSymbol,
        expected: Type,
        found: Type,
    },
    #[error("initializer of '{identifier}' has type {found}, expected {expected}")]
    InitializerTypeMismatch {
        identifier: InternedSymbol,
        expected: Type,
        found: Type,
    },
    #[error("assignment to undeclared variable '{identifier}'")]
    AssignToUndefined { identifier: InternedSymbol },
    #[error("cannot assign to function '{identifier}'")]
    NotAssignable { identifier: InternedSymbol },
    #[error("cannot assign {found} to '{identifier}' of type {expected}")]
    AssignmentTypeMismatch {
        identifier: InternedSymbol,
        expected: Type,
        found: Type,
    },
    #[error("operator '{operator}' expects number operands, found {found}")]
    OperandTypeMismatch {
        operator: BinaryOperator,
        found: Type,
    },
    #[error("condition must be a number, found {found}")]
    ConditionTypeMismatch { found: Type },
    #[error("print requires at least one argument")]
    PrintWithoutArguments,
    #[error("unknown {construct} type")]
    UnknownConstruct { construct: &'static str },
}

/// A single error tied to the place in the source that caused it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Diagnostic {
    pub location: SourceLocation,
    pub error: SemaError,
}

impl core::fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: error: {}", self.location, self.error)
    }
}

/// The non-empty, ordered list of diagnostics produced by a failed analysis
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("semantic analysis failed with {} error(s)", .0.len())]
pub struct Diagnostics(Vec<Diagnostic>);

impl Diagnostics {
    pub(crate) fn new(diagnostics: Vec<Diagnostic>) -> Self {
        assert!(
            !diagnostics.is_empty(),
            "A failed analysis must carry at least one diagnostic"
        );

        Self(diagnostics)
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Diagnostic> {
        self.0.iter()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn first(&self) -> &Diagnostic {
        &self.0[0]
    }

    /// Just the error kinds, in report order
    pub fn errors(&self) -> Vec<&SemaError> {
        self.0.iter().map(|diagnostic| &diagnostic.error).collect()
    }

    pub fn into_inner(self) -> Vec<Diagnostic> {
        self.0
    }
}

impl IntoIterator for Diagnostics {
    type Item = Diagnostic;
    type IntoIter = std::vec::IntoIter<Diagnostic>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}

impl<'a> IntoIterator for &'a Diagnostics {
    type Item = &'a Diagnostic;
    type IntoIter = std::slice::Iter<'a, Diagnostic>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn diagnostic_display_includes_location() {
        let diagnostic = Diagnostic {
            location: SourceLocation::new("main.ram", 3, 7),
            error: SemaError::UndefinedSymbol {
                identifier: InternedSymbol::new("y"),
            },
        };

        assert_eq!(
            diagnostic.to_string(),
            "main.ram:3:7: error: symbol 'y' not found"
        );
    }

    #[test]
    fn type_names_in_messages() {
        let error = SemaError::AssignmentTypeMismatch {
            identifier: InternedSymbol::new("x"),
            expected: Type::Number,
            found: Type::String,
        };

        assert_eq!(
            error.to_string(),
            "cannot assign string to 'x' of type number"
        );
    }

    #[test]
    #[should_panic]
    fn empty_diagnostics_are_rejected() {
        Diagnostics::new(Vec::new());
    }
}
