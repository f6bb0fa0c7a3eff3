//! Diagnostic rendering.
//!
//! Diagnostics print to stderr one per line as `[line.column] message`
//! (`[?]` without a position), colored when stderr is a terminal. The
//! `json` format emits the same list as one JSON array for tooling.

use clap::ValueEnum;
use jtc_parser::{Diagnostic, Severity};
use std::io::Write;
use termcolor::{Color, ColorChoice, ColorSpec, StandardStream, WriteColor};

/// Diagnostic output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Format {
    /// One `[line.column] message` per line
    Pretty,
    /// A JSON array of diagnostic objects
    Json,
}

/// Render diagnostics to stderr.
pub fn render(diagnostics: &[Diagnostic], format: Format) {
    if diagnostics.is_empty() {
        return;
    }
    match format {
        Format::Pretty => render_pretty(diagnostics),
        Format::Json => render_json(diagnostics),
    }
}

fn render_pretty(diagnostics: &[Diagnostic]) {
    let mut stderr = StandardStream::stderr(ColorChoice::Auto);
    for diagnostic in diagnostics {
        let color = match diagnostic.severity {
            Severity::Error => Color::Red,
            Severity::Warning => Color::Yellow,
        };
        let _ = stderr.set_color(ColorSpec::new().set_fg(Some(color)));
        let prefix = match diagnostic.position {
            Some((line, column)) => format!("[{line}.{column}]"),
            None => "[?]".to_string(),
        };
        let _ = write!(stderr, "{prefix}");
        let _ = stderr.reset();
        let _ = writeln!(stderr, " {}", diagnostic.message);
    }
}

fn render_json(diagnostics: &[Diagnostic]) {
    let rendered =
        serde_json::to_string_pretty(diagnostics).unwrap_or_else(|_| "[]".to_string());
    eprintln!("{rendered}");
}
