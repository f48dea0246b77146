//! The frontend model consumed by the middle of the compiler. Lexing and
//! parsing happen elsewhere; this module only holds the data they produce.

pub mod ast;
pub mod intern;

/// A position inside a source file, as reported in diagnostics
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SourceLocation {
    pub file: InternedFile,
    pub line: u32,
    pub column: u32,
}

/// The path of a source file, interned so locations stay cheap to clone
pub type InternedFile = intern::InternedSymbol;

impl SourceLocation {
    pub fn new(file: &str, line: u32, column: u32) -> Self {
        Self {
            file: InternedFile::new(file),
            line,
            column,
        }
    }
}

impl core::fmt::Display for SourceLocation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}:{}", self.file, self.line, self.column)
    }
}
