//! Javalette compiler driver.
//!
//! `jtc [-T|-P|-X] [-o <output_file>] <source_file>`
//!
//! One target per invocation: pretty-print the tree, emit a bytecode
//! module (the default) or build a native executable. Exit codes: 0 on
//! success, 1 for usage errors, 2 when compilation fails.

mod output;

use anyhow::{Context, Result};
use clap::Parser as ClapParser;
use jtc_compiler::vm::Dialect;
use jtc_parser::checker;
use jtc_parser::{Diagnostic, Diagnostics, Parser};
use output::Format;
use std::io::{IsTerminal, Write};
use std::path::PathBuf;
use std::process::ExitCode;

#[derive(ClapParser)]
#[command(name = "jtc")]
#[command(about = "Javalette compiler", version)]
struct Cli {
    /// Pretty-print the program instead of compiling
    #[arg(short = 'T', group = "target")]
    tree: bool,

    /// Compile to a bytecode module (default)
    #[arg(short = 'P', group = "target")]
    bytecode: bool,

    /// Compile to a native executable
    #[arg(short = 'X', group = "target")]
    executable: bool,

    /// Output file; stdout when omitted
    #[arg(short = 'o', value_name = "output_file")]
    output: Option<PathBuf>,

    /// Emit bytecode for the legacy host-runtime generation
    #[arg(long)]
    legacy_runtime: bool,

    /// Diagnostic output format
    #[arg(long, value_enum, default_value = "pretty")]
    format: Format,

    /// Javalette source file
    source: PathBuf,
}

enum Target {
    Tree,
    Bytecode,
    Executable,
}

impl Cli {
    fn target(&self) -> Target {
        if self.tree {
            Target::Tree
        } else if self.executable {
            Target::Executable
        } else {
            Target::Bytecode
        }
    }
}

fn main() -> ExitCode {
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(err) => {
            let _ = err.print();
            return ExitCode::from(1);
        }
    };
    match run(&cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(message) => {
            if let Some(message) = message {
                eprintln!("{message}");
            }
            eprintln!("Compilation failed!");
            ExitCode::from(2)
        }
    }
}

/// Run the pipeline; `Err` carries an optional message and means exit 2.
fn run(cli: &Cli) -> Result<(), Option<String>> {
    let source = std::fs::read_to_string(&cli.source)
        .map_err(|e| Some(format!("{}: {e}", cli.source.display())))?;

    let parser = Parser::new(&source).map_err(|diag| Some(diag.to_string()))?;
    let (mut program, warnings) = parser.parse().map_err(|diag| Some(diag.to_string()))?;
    program.filename = Some(
        std::path::absolute(&cli.source).unwrap_or_else(|_| cli.source.clone()),
    );

    let mut diags = Diagnostics::new();
    checker::analyze(&mut program, &mut diags);

    let mut reported: Vec<Diagnostic> = warnings;
    let failed = diags.has_errors();
    reported.extend(diags.into_vec());
    output::render(&reported, cli.format);

    if let Target::Tree = cli.target() {
        // The tree prints even when analysis failed, diagnostics first
        write_output(cli, jtc_parser::ast::pretty(&program).as_bytes(), false)
            .map_err(|e| Some(e.to_string()))?;
        return if failed { Err(None) } else { Ok(()) };
    }
    if failed {
        return Err(None);
    }

    match cli.target() {
        Target::Tree => unreachable!(),
        Target::Bytecode => {
            let dialect = if cli.legacy_runtime {
                Dialect::Legacy
            } else {
                Dialect::Modern
            };
            let module = jtc_compiler::vm::compile(&program, dialect)
                .map_err(|e| Some(e.to_string()))?;
            let bytes = module.encode().map_err(|e| Some(e.to_string()))?;
            write_output(cli, &bytes, true).map_err(|e| Some(e.to_string()))?;
        }
        Target::Executable => {
            let listing = jtc_compiler::x86::compile(&program)
                .map_err(|e| Some(e.to_string()))?;
            let asm = jtc_x86::flatten(&listing).map_err(|e| Some(e.to_string()))?;
            build_executable(cli, &asm).map_err(|e| Some(e.to_string()))?;
        }
    }
    Ok(())
}

/// Write an artifact to the selected output, refusing to put binary data
/// on a terminal.
fn write_output(cli: &Cli, bytes: &[u8], binary: bool) -> Result<()> {
    match &cli.output {
        Some(path) => {
            std::fs::write(path, bytes).with_context(|| format!("{}", path.display()))?;
        }
        None => {
            let mut stdout = std::io::stdout();
            if binary && stdout.is_terminal() {
                anyhow::bail!("Prevented from printing binary garbage to the terminal.");
            }
            stdout.write_all(bytes)?;
            if !binary && !bytes.ends_with(b"\n") {
                stdout.write_all(b"\n")?;
            }
        }
    }
    Ok(())
}

/// Assemble and link, either straight to the output path or through a
/// scoped temporary when the executable goes to stdout.
fn build_executable(cli: &Cli, asm: &str) -> Result<()> {
    match &cli.output {
        Some(path) => {
            jtc_x86::build(asm, path)?;
        }
        None => {
            if std::io::stdout().is_terminal() {
                anyhow::bail!("Prevented from printing binary garbage to the terminal.");
            }
            let exe = tempfile::Builder::new().prefix("jtc").tempfile()?;
            jtc_x86::build(asm, exe.path())?;
            let bytes = std::fs::read(exe.path())?;
            std::io::stdout().write_all(&bytes)?;
        }
    }
    Ok(())
}
