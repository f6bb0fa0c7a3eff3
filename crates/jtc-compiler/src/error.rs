//! Code generation errors.
//!
//! Backends run only over programs that passed semantic analysis, so these
//! errors flag broken pipeline invariants (an unbound reference, an untyped
//! expression), not user mistakes.

use thiserror::Error;

/// Code generation failure.
#[derive(Debug, Error)]
pub enum CompileError {
    /// A reference survived to codegen without a binding
    #[error("unbound reference '{0}' reached code generation")]
    UnboundReference(String),

    /// An expression survived to codegen without a computed type
    #[error("untyped expression reached code generation")]
    UntypedExpression,

    /// A call whose callee is not a function reached codegen
    #[error("call to non-function '{0}' reached code generation")]
    InvalidCallee(String),

    /// Module encoding failed
    #[error(transparent)]
    Encode(#[from] jtc_bytecode::EncodeError),
}

/// Result alias for code generation.
pub type CompileResult<T> = Result<T, CompileError>;
