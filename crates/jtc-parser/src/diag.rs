//! Diagnostics for Javalette programs.
//!
//! Lexer and parser faults are fatal: the first one aborts the pipeline.
//! Semantic faults are soft: they accumulate in a [`Diagnostics`] collector
//! so a single run reports as many problems as possible, and the driver
//! aborts only after all passes have finished.

use crate::token::Span;
use serde::Serialize;
use std::fmt;

/// How serious a diagnostic is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    /// Reported but does not fail the compilation
    Warning,
    /// Fails the compilation
    Error,
}

/// What part of the pipeline produced a diagnostic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DiagnosticKind {
    /// Tokenizer fault: unterminated string or comment, illegal character,
    /// unknown string escape
    Lex,
    /// Syntax error at a token or at end of file
    Parse,
    /// Expression, declaration, cast, assignment, return or condition types
    /// do not match
    TypeMismatch,
    /// Wrong argument count in a call
    ArityMismatch,
    /// Possible use of a variable before it was assigned
    ReferenceBeforeAssignment,
    /// Binding fault: undeclared identifier, redeclaration, duplicate
    /// function, missing `main`
    Inspect,
    /// A non-void function lacks a return on some path
    MissingReturn,
}

/// A single diagnostic message with an optional source position.
#[derive(Debug, Clone, Serialize)]
pub struct Diagnostic {
    /// Diagnostic category
    pub kind: DiagnosticKind,
    /// Warning or error
    pub severity: Severity,
    /// `(line, column)`, absent for faults without a location
    pub position: Option<(u32, u32)>,
    /// Human-readable message
    pub message: String,
}

impl Diagnostic {
    /// Create an error diagnostic.
    pub fn error(kind: DiagnosticKind, span: Option<Span>, message: impl Into<String>) -> Self {
        Diagnostic {
            kind,
            severity: Severity::Error,
            position: span.map(|s| s.position()),
            message: message.into(),
        }
    }

    /// Create a warning diagnostic.
    pub fn warning(kind: DiagnosticKind, span: Option<Span>, message: impl Into<String>) -> Self {
        Diagnostic {
            kind,
            severity: Severity::Warning,
            position: span.map(|s| s.position()),
            message: message.into(),
        }
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.position {
            Some((line, column)) => write!(f, "[{line}.{column}] {}", self.message),
            None => write!(f, "[?] {}", self.message),
        }
    }
}

/// Accumulator for soft diagnostics.
#[derive(Debug, Default)]
pub struct Diagnostics {
    items: Vec<Diagnostic>,
}

impl Diagnostics {
    /// Create an empty collector.
    pub fn new() -> Self {
        Diagnostics::default()
    }

    /// Record a diagnostic.
    pub fn report(&mut self, diagnostic: Diagnostic) {
        self.items.push(diagnostic);
    }

    /// Record an error.
    pub fn error(&mut self, kind: DiagnosticKind, span: Option<Span>, message: impl Into<String>) {
        self.report(Diagnostic::error(kind, span, message));
    }

    /// Record a warning.
    pub fn warning(
        &mut self,
        kind: DiagnosticKind,
        span: Option<Span>,
        message: impl Into<String>,
    ) {
        self.report(Diagnostic::warning(kind, span, message));
    }

    /// Whether any error-severity diagnostic was recorded.
    pub fn has_errors(&self) -> bool {
        self.items
            .iter()
            .any(|d| d.severity == Severity::Error)
    }

    /// All recorded diagnostics, in report order.
    pub fn iter(&self) -> impl Iterator<Item = &Diagnostic> {
        self.items.iter()
    }

    /// Number of recorded diagnostics.
    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// Whether nothing was recorded.
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Consume the collector.
    pub fn into_vec(self) -> Vec<Diagnostic> {
        self.items
    }
}
