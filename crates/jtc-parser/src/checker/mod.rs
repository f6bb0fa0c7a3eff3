//! Semantic analysis for Javalette programs.
//!
//! Three passes run in order over the freshly parsed tree:
//!
//! 1. **Built-in injection** ([`builtins`]) appends the declarations of the
//!    six runtime intrinsics.
//! 2. **Inspection** ([`binder`]) builds the function table, resolves every
//!    reference through block scoping, and assigns each variable a unique id.
//! 3. **Validation** ([`validate`]) type-checks expressions and statements,
//!    verifies returns on every path, and runs the use-before-assignment
//!    analysis ([`usage`]).
//!
//! All faults are soft: they land in the shared [`Diagnostics`] collector
//! and analysis continues to report as much as possible per run.

pub mod binder;
pub mod builtins;
pub mod usage;
pub mod validate;

use crate::ast::Program;
use crate::diag::Diagnostics;

/// Run all semantic passes over a parsed program.
///
/// The caller decides what to do with the collected diagnostics; the
/// decorated tree is only meaningful for code generation when no errors
/// were reported.
pub fn analyze(program: &mut Program, diags: &mut Diagnostics) {
    builtins::inject(program);
    binder::inspect(program, diags);
    validate::validate(program, diags);
}
