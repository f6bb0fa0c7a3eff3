//! In-memory code objects.

use crate::instr::Instr;

/// A code object: the record handed to the module writer.
///
/// Mirrors the host runtime's loader contract: argument slots are named,
/// local slots are addressed by name, and nested functions appear as
/// constants of the enclosing object.
#[derive(Debug, Clone, PartialEq)]
pub struct CodeObject {
    /// Function name, or `__stub__` for the module root
    pub name: String,
    /// Source filename recorded for tracebacks
    pub filename: String,
    /// Line of the declaration; 0 for synthetic objects
    pub firstlineno: u32,
    /// Argument slot names (`_0`, `_1`, ...)
    pub args: Vec<String>,
    /// Whether the trailing argument collects varargs (never for Javalette)
    pub varargs: bool,
    /// Whether the trailing argument collects keyword args (never)
    pub varkwargs: bool,
    /// Whether calls get a fresh local namespace (true for functions,
    /// false for the module root)
    pub newlocals: bool,
    /// Closure variable names (always empty)
    pub freevars: Vec<String>,
    /// Docstring (always absent)
    pub docstring: Option<String>,
    /// Instruction stream
    pub code: Vec<Instr>,
}

impl CodeObject {
    /// A code object with the fields every Javalette function shares.
    pub fn function(
        name: impl Into<String>,
        filename: impl Into<String>,
        firstlineno: u32,
        args: Vec<String>,
        code: Vec<Instr>,
    ) -> Self {
        CodeObject {
            name: name.into(),
            filename: filename.into(),
            firstlineno,
            args,
            varargs: false,
            varkwargs: false,
            newlocals: true,
            freevars: Vec::new(),
            docstring: None,
            code,
        }
    }

    /// The module-root code object.
    pub fn stub(filename: impl Into<String>, code: Vec<Instr>) -> Self {
        CodeObject {
            name: "__stub__".to_string(),
            filename: filename.into(),
            firstlineno: 0,
            args: Vec::new(),
            varargs: false,
            varkwargs: false,
            newlocals: false,
            freevars: Vec::new(),
            docstring: None,
            code,
        }
    }
}
