//! Code generation for the Javalette compiler
//!
//! Two independent backends over the decorated AST from `jtc-parser`:
//!
//! - [`vm`] lowers to stack-VM code objects serialized by `jtc-bytecode`;
//! - [`x86`] lowers to an IA-32 listing flattened and built by `jtc-x86`.
//!
//! The backends share nothing but the tree.

#![warn(missing_docs)]
#![warn(rust_2018_idioms)]

pub mod error;
pub mod vm;
pub mod x86;

pub use error::{CompileError, CompileResult};
