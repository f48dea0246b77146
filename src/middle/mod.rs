//! Names and types are resolved here against the AST, and the LIR produced by
//! code generation is optimized before it is handed to a backend.

pub mod diagnostics;
pub mod lir;
pub mod optimization;
pub mod resolve;
pub mod ty;
