//! Ram semantic analyzer
//!
//! Resolution happens in 2 passes over the top level functions:
//!
//!   1) every function signature is resolved (return type and parameter types)
//!      and the function is bound in the global scope. This is what makes
//!      calls to functions declared later in the file (or mutually recursive
//!      functions) legal.
//!   2) every function body is resolved against a stack of lexical scopes.
//!      Each expression gets its resolved type and every reference, call and
//!      assignment gets a link back to the declaration it names.
//!
//! If any signature fails, no body is looked at. A failing body abandons the
//! rest of that function but the following functions are still resolved so
//! that one run reports as much as possible.

use std::collections::{BTreeMap, VecDeque};

use colored::Colorize;
use itertools::Itertools;

use crate::{
    frontend::{
        SourceLocation,
        ast::{
            Block, DeclId, Declaration, DeclarationKind, Expression, ExpressionKind,
            FunctionDefinition, OperatorFamily, Program, Reference, Statement, StatementKind,
        },
        intern::InternedSymbol,
    },
    index::IndexVec,
    middle::{
        diagnostics::{Diagnostic, Diagnostics, SemaError},
        ty::Type,
    },
};

/// Resolves names and checks types for a whole program, annotating the AST in
/// place
pub fn resolve(program: &mut Program) -> Result<(), Diagnostics> {
    Resolver::resolve_program(program)
}

/// Proof that a diagnostic has already been recorded for a failure. Callers
/// that receive it abort silently so each failure is reported exactly once.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ErrorReported;

type ResolveResult<T> = Result<T, ErrorReported>;

macro_rules! function {
    () => {{
        fn f() {}
        fn type_name_of<T>(_: T) -> &'static str {
            std::any::type_name::<T>()
        }
        type_name_of(f)
            .rsplit("::")
            .find(|&part| part != "f" && part != "{{closure}}")
            .expect("Short function name")
    }};
}

macro_rules! report_error {
    ($self:expr, $location:expr, $error:expr $(,)?) => {{
        #[cfg(feature = "error-backtrace")]
        let origin = Some(format!("{}::{}", module_path!(), function!()));

        #[cfg(not(feature = "error-backtrace"))]
        let origin: Option<String> = None;

        $self.report_error($location, $error, origin)
    }};
}

#[derive(Debug)]
pub struct Resolver<'program> {
    declarations: &'program mut IndexVec<DeclId, Declaration>,
    scope_stack: ScopeStack,
    diagnostics: Vec<Diagnostic>,
    /// The function whose body is currently being resolved
    current_function: Option<DeclId>,
}

impl<'program> Resolver<'program> {
    pub fn resolve_program(program: &'program mut Program) -> Result<(), Diagnostics> {
        let Program {
            declarations,
            functions,
        } = program;

        let mut resolver = Self {
            declarations,
            scope_stack: ScopeStack::new(),
            diagnostics: Vec::new(),
            current_function: None,
        };

        log::debug!("resolving {} function signature(s)", functions.len());

        for function in functions.iter() {
            // Failures are recorded as diagnostics; keep going to report every
            // broken signature
            let _ = resolver.resolve_function_signature(function.declaration);
        }

        if !resolver.diagnostics.is_empty() {
            log::debug!("signature resolution failed, skipping function bodies");
            return resolver.finish();
        }

        for function in functions.iter_mut() {
            // A failed body only abandons its own function
            let _ = resolver.resolve_function_body(function);
        }

        resolver.finish()
    }

    fn finish(self) -> Result<(), Diagnostics> {
        debug_assert_eq!(self.scope_stack.depth(), 0, "unbalanced scope stack");

        if self.diagnostics.is_empty() {
            Ok(())
        } else {
            Err(Diagnostics::new(self.diagnostics))
        }
    }

    fn report_error(
        &mut self,
        location: SourceLocation,
        error: SemaError,
        origin: Option<String>,
    ) -> ErrorReported {
        if let Some(origin) = origin {
            eprintln!("{}: {}", "backtrace".blue(), origin.white());
        }

        eprintln!("{location}: {}: {error}", "error".red());

        self.diagnostics.push(Diagnostic { location, error });

        ErrorReported
    }

    /// Runs `f` inside a fresh innermost scope. The scope is popped on every
    /// exit path, including failures.
    fn with_scope<T>(&mut self, f: impl FnOnce(&mut Self) -> T) -> T {
        self.scope_stack.push_shallow_scope();
        let result = f(self);
        self.scope_stack.pop_shallow_scope();

        result
    }

    /// Writes a resolved type into a slot that may only ever hold one value
    fn annotate(slot: &mut Option<Type>, ty: Type) {
        debug_assert!(
            slot.is_none_or(|existing| existing == ty),
            "resolved type changed from {slot:?} to {ty:?}"
        );

        *slot = Some(ty);
    }

    fn resolve_type_name(
        &mut self,
        declaration: DeclId,
        role: &'static str,
    ) -> ResolveResult<Type> {
        let declaration = &self.declarations[declaration];

        match Type::from_name(&declaration.type_name) {
            Some(ty) => Ok(ty),
            None => {
                let location = declaration.location;
                let error = SemaError::InvalidType {
                    role,
                    identifier: declaration.identifier,
                    type_name: declaration.type_name.clone(),
                };

                Err(report_error!(self, location, error))
            }
        }
    }

    /* Signatures */

    fn resolve_function_signature(&mut self, function: DeclId) -> ResolveResult<()> {
        let return_type = self.resolve_type_name(function, "function")?;
        Self::annotate(&mut self.declarations[function].resolved_type, return_type);

        let DeclarationKind::Function { parameters } = self.declarations[function].kind.clone()
        else {
            unreachable!("top level definitions are always functions")
        };

        // Parameters are checked for duplicates against a scope of their own
        self.with_scope(|this| {
            for parameter in parameters {
                this.resolve_parameter(parameter)?;
            }

            Ok(())
        })?;

        let Declaration {
            location,
            identifier,
            ..
        } = self.declarations[function];

        if self.scope_stack.get_global_binding(identifier).is_some() {
            return Err(report_error!(
                self,
                location,
                SemaError::DuplicateDeclaration { identifier }
            ));
        }

        self.scope_stack.add_global_binding(identifier, function);

        log::trace!("bound function `{identifier}` ({return_type})");

        Ok(())
    }

    fn resolve_parameter(&mut self, parameter: DeclId) -> ResolveResult<()> {
        let ty = self.resolve_type_name(parameter, "parameter")?;

        let Declaration {
            location,
            identifier,
            ..
        } = self.declarations[parameter];

        if self.scope_stack.get_shallow_binding(identifier).is_some() {
            return Err(report_error!(
                self,
                location,
                SemaError::DuplicateDeclaration { identifier }
            ));
        }

        Self::annotate(&mut self.declarations[parameter].resolved_type, ty);
        self.scope_stack.add_shallow_binding(identifier, parameter);

        Ok(())
    }

    /* Bodies */

    fn resolve_function_body(&mut self, function: &mut FunctionDefinition) -> ResolveResult<()> {
        let DeclarationKind::Function { parameters } =
            self.declarations[function.declaration].kind.clone()
        else {
            unreachable!("top level definitions are always functions")
        };

        log::trace!(
            "resolving body of `{}`",
            self.declarations[function.declaration].identifier
        );

        self.current_function = Some(function.declaration);

        // The outermost block of a function shares the scope holding its
        // parameters
        let result = self.with_scope(|this| {
            for parameter in parameters {
                let identifier = this.declarations[parameter].identifier;
                this.scope_stack.add_shallow_binding(identifier, parameter);
            }

            this.resolve_statements(&mut function.body.statements)
        });

        self.current_function = None;

        result
    }

    fn resolve_block(&mut self, block: &mut Block) -> ResolveResult<()> {
        self.with_scope(|this| this.resolve_statements(&mut block.statements))
    }

    fn resolve_statements(&mut self, statements: &mut [Statement]) -> ResolveResult<()> {
        for statement in statements {
            self.resolve_statement(statement)?;
        }

        Ok(())
    }

    fn resolve_statement(&mut self, statement: &mut Statement) -> ResolveResult<()> {
        let location = statement.location;

        match &mut statement.kind {
            StatementKind::Expression(expression) => self.resolve_expression(expression).map(drop),
            StatementKind::VariableDeclaration {
                declaration,
                initializer,
            } => self.resolve_variable_declaration(*declaration, initializer.as_mut()),
            StatementKind::Return(value) => self.resolve_return(location, value.as_mut()),
            StatementKind::If {
                condition,
                then_block,
                else_block,
            } => {
                self.resolve_condition(condition)?;
                self.resolve_block(then_block)?;

                if let Some(else_block) = else_block {
                    self.resolve_block(else_block)?;
                }

                Ok(())
            }
            StatementKind::While { condition, body } => {
                self.resolve_condition(condition)?;
                self.resolve_block(body)
            }
            StatementKind::Block(block) => self.resolve_block(block),
            StatementKind::Invalid => Err(report_error!(
                self,
                location,
                SemaError::UnknownConstruct {
                    construct: "statement"
                }
            )),
        }
    }

    fn resolve_variable_declaration(
        &mut self,
        declaration: DeclId,
        initializer: Option<&mut Expression>,
    ) -> ResolveResult<()> {
        let ty = self.resolve_type_name(declaration, "variable")?;

        let Declaration {
            location,
            identifier,
            ..
        } = self.declarations[declaration];

        if ty == Type::Void {
            return Err(report_error!(self, location, SemaError::VoidVariable { identifier }));
        }

        // The initializer is resolved before the name is bound so it can not
        // refer to the variable it initializes
        if let Some(initializer) = initializer {
            let found = self.resolve_expression(initializer)?;

            if found != ty {
                return Err(report_error!(
                    self,
                    initializer.location,
                    SemaError::InitializerTypeMismatch {
                        identifier,
                        expected: ty,
                        found,
                    }
                ));
            }
        }

        if self.scope_stack.get_shallow_binding(identifier).is_some() {
            return Err(report_error!(
                self,
                location,
                SemaError::DuplicateDeclaration { identifier }
            ));
        }

        Self::annotate(&mut self.declarations[declaration].resolved_type, ty);
        self.scope_stack
            .add_shallow_binding(identifier, declaration);

        Ok(())
    }

    fn resolve_return(
        &mut self,
        location: SourceLocation,
        value: Option<&mut Expression>,
    ) -> ResolveResult<()> {
        let function = self
            .current_function
            .expect("return statements only appear inside function bodies");
        let Declaration {
            identifier,
            resolved_type,
            ..
        } = self.declarations[function];
        let expected = resolved_type.expect("signatures are resolved before bodies");

        match (value, expected) {
            (None, Type::Void) => Ok(()),
            (None, expected) => Err(report_error!(
                self,
                location,
                SemaError::MissingReturnValue {
                    function: identifier,
                    expected,
                }
            )),
            (Some(_), Type::Void) => Err(report_error!(
                self,
                location,
                SemaError::VoidReturnsValue {
                    function: identifier
                }
            )),
            (Some(value), expected) => {
                let found = self.resolve_expression(value)?;

                if found != expected {
                    return Err(report_error!(
                        self,
                        value.location,
                        SemaError::ReturnTypeMismatch {
                            function: identifier,
                            expected,
                            found,
                        }
                    ));
                }

                Ok(())
            }
        }
    }

    fn resolve_condition(&mut self, condition: &mut Expression) -> ResolveResult<()> {
        let found = self.resolve_expression(condition)?;

        if found != Type::Number {
            return Err(report_error!(
                self,
                condition.location,
                SemaError::ConditionTypeMismatch { found }
            ));
        }

        Ok(())
    }

    /* Expressions */

    fn resolve_expression(&mut self, expression: &mut Expression) -> ResolveResult<Type> {
        let location = expression.location;

        let ty = match &mut expression.kind {
            ExpressionKind::NumberLiteral(_) | ExpressionKind::BooleanLiteral(_) => Type::Number,
            ExpressionKind::StringLiteral(_) => Type::String,
            ExpressionKind::Reference(reference) => {
                let declaration = self.resolve_reference(location, reference)?;

                self.declarations[declaration]
                    .resolved_type
                    .expect("names are only bound after their type resolves")
            }
            ExpressionKind::Call { callee, arguments } => {
                self.resolve_call(location, callee, arguments)?
            }
            ExpressionKind::Binary { lhs, operator, rhs } => {
                for operand in [lhs, rhs] {
                    let found = self.resolve_expression(operand)?;

                    if found != Type::Number {
                        return Err(report_error!(
                            self,
                            operand.location,
                            SemaError::OperandTypeMismatch {
                                operator: *operator,
                                found,
                            }
                        ));
                    }
                }

                // Comparisons and logical operators produce 0 or 1
                match operator.family() {
                    OperatorFamily::Arithmetic
                    | OperatorFamily::Comparison
                    | OperatorFamily::Logical => Type::Number,
                }
            }
            ExpressionKind::Assignment { target, value } => {
                self.resolve_assignment(location, target, value)?
            }
            ExpressionKind::Print { arguments } => {
                if arguments.is_empty() {
                    return Err(report_error!(self, location, SemaError::PrintWithoutArguments));
                }

                for argument in arguments {
                    self.resolve_expression(argument)?;
                }

                Type::Void
            }
            ExpressionKind::Invalid => {
                return Err(report_error!(
                    self,
                    location,
                    SemaError::UnknownConstruct {
                        construct: "expression"
                    }
                ));
            }
        };

        Self::annotate(&mut expression.resolved_type, ty);

        Ok(ty)
    }

    /// Looks a name up innermost scope first
    fn lookup(
        &mut self,
        location: SourceLocation,
        identifier: InternedSymbol,
    ) -> ResolveResult<DeclId> {
        match self.scope_stack.get_binding(identifier) {
            Some(declaration) => Ok(declaration),
            None => Err(report_error!(self, location, SemaError::UndefinedSymbol { identifier })),
        }
    }

    /// Resolves a plain name and records the declaration it refers to
    fn resolve_reference(
        &mut self,
        location: SourceLocation,
        reference: &mut Reference,
    ) -> ResolveResult<DeclId> {
        let declaration = self.lookup(location, reference.identifier)?;
        reference.declaration = Some(declaration);

        Ok(declaration)
    }

    fn resolve_call(
        &mut self,
        location: SourceLocation,
        callee: &mut Reference,
        arguments: &mut [Expression],
    ) -> ResolveResult<Type> {
        let identifier = callee.identifier;
        let declaration = self.lookup(location, identifier)?;

        let DeclarationKind::Function { parameters } = self.declarations[declaration].kind.clone()
        else {
            return Err(report_error!(self, location, SemaError::NotCallable { identifier }));
        };

        if arguments.len() != parameters.len() {
            return Err(report_error!(
                self,
                location,
                SemaError::ArityMismatch {
                    callee: identifier,
                    expected: parameters.len(),
                    found: arguments.len(),
                }
            ));
        }

        for (position, (argument, parameter)) in
            arguments.iter_mut().zip_eq(parameters).enumerate()
        {
            let found = self.resolve_expression(argument)?;
            let expected = self.declarations[parameter]
                .resolved_type
                .expect("parameters are resolved with their function signature");

            if found != expected {
                return Err(report_error!(
                    self,
                    argument.location,
                    SemaError::ArgumentTypeMismatch {
                        callee: identifier,
                        position: position + 1,
                        expected,
                        found,
                    }
                ));
            }
        }

        // Only a well formed call links back to its callee
        callee.declaration = Some(declaration);

        Ok(self.declarations[declaration]
            .resolved_type
            .expect("signatures are resolved before bodies"))
    }

    fn resolve_assignment(
        &mut self,
        location: SourceLocation,
        target: &mut Reference,
        value: &mut Expression,
    ) -> ResolveResult<Type> {
        let identifier = target.identifier;

        let Some(declaration) = self.scope_stack.get_binding(identifier) else {
            return Err(report_error!(self, location, SemaError::AssignToUndefined { identifier }));
        };

        if self.declarations[declaration].kind.is_function() {
            return Err(report_error!(self, location, SemaError::NotAssignable { identifier }));
        }

        let expected = self.declarations[declaration]
            .resolved_type
            .expect("names are only bound after their type resolves");
        let found = self.resolve_expression(value)?;

        if found != expected {
            return Err(report_error!(
                self,
                value.location,
                SemaError::AssignmentTypeMismatch {
                    identifier,
                    expected,
                    found,
                }
            ));
        }

        target.declaration = Some(declaration);

        Ok(expected)
    }
}

/// Lexical scopes for value names. Functions live in the global scope which is
/// never popped; parameters and locals live in the shallow scopes pushed and
/// popped around function bodies and blocks.
#[derive(Debug)]
struct ScopeStack {
    global_scope: BTreeMap<InternedSymbol, DeclId>,
    stack: VecDeque<BTreeMap<InternedSymbol, DeclId>>,
}

impl ScopeStack {
    fn new() -> Self {
        Self {
            global_scope: BTreeMap::new(),
            stack: VecDeque::new(),
        }
    }

    /// Creates a new block or function scope
    fn push_shallow_scope(&mut self) {
        self.stack.push_back(BTreeMap::new());
    }

    /// Destroys the current block or function scope
    fn pop_shallow_scope(&mut self) {
        assert!(
            !self.stack.is_empty(),
            "Attempted to pop a shallow scope from the global context"
        );

        self.stack.pop_back();
    }

    /// Looks for a binding only within the current (most nested) scope
    fn get_shallow_binding(&self, symbol: InternedSymbol) -> Option<DeclId> {
        let shallow_scope = self
            .stack
            .back()
            .expect("Tried to get a shallow binding from the global context");

        shallow_scope.get(&symbol).copied()
    }

    /// Adds a binding only within the current (most nested) scope
    fn add_shallow_binding(&mut self, symbol: InternedSymbol, declaration: DeclId) {
        let shallow_scope = self
            .stack
            .back_mut()
            .expect("Tried to add a shallow binding in the global context");

        shallow_scope.insert(symbol, declaration);
    }

    /// Gets a binding from the global scope
    fn get_global_binding(&self, symbol: InternedSymbol) -> Option<DeclId> {
        self.global_scope.get(&symbol).copied()
    }

    /// Adds a binding into the global scope which is accessible from all
    /// shallow scopes
    fn add_global_binding(&mut self, symbol: InternedSymbol, declaration: DeclId) {
        self.global_scope.insert(symbol, declaration);
    }

    /// Traverses the scope stack from back to front looking for bindings before
    /// checking the global scope.
    fn get_binding(&self, symbol: InternedSymbol) -> Option<DeclId> {
        self.stack
            .iter()
            .rev()
            .find_map(|scope| scope.get(&symbol))
            .or_else(|| self.global_scope.get(&symbol))
            .copied()
    }

    fn depth(&self) -> usize {
        self.stack.len()
    }
}
