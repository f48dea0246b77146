//! Ram Language middle end: semantic analysis over the parsed AST and
//! optimization of the LIR produced from it.

pub mod frontend;
pub mod index;
pub mod middle;

pub use middle::{
    diagnostics::{Diagnostic, Diagnostics, SemaError},
    optimization::{optimize_function, optimize_module},
    resolve::resolve,
    ty::Type,
};
