//! External assembler and linker drivers.
//!
//! The backend only produces a listing; turning it into an ELF executable
//! is delegated to `nasm` and `gcc` as blocking subprocesses. Intermediate
//! files live in scoped temporary handles released on every exit path,
//! success or failure.

use std::io::Write as _;
use std::path::Path;
use std::process::Command;
use tempfile::NamedTempFile;
use thiserror::Error;

/// Failures of the external build steps.
#[derive(Debug, Error)]
pub enum BuildError {
    /// NASM reported errors or could not be run
    #[error("assembler failed: {0}")]
    Assemble(String),

    /// GCC reported errors or could not be run
    #[error("linker failed: {0}")]
    Link(String),

    /// Temporary-file plumbing failed
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// Assemble NASM-syntax text into an ELF object file.
///
/// Returns the scoped handle of the object file; dropping it removes the
/// file.
pub fn assemble(asm_text: &str) -> Result<NamedTempFile, BuildError> {
    let mut asm_file = tempfile::Builder::new()
        .prefix("jtc")
        .suffix(".asm")
        .tempfile()?;
    asm_file.write_all(asm_text.as_bytes())?;
    asm_file.flush()?;

    let object_file = tempfile::Builder::new()
        .prefix("jtc")
        .suffix(".o")
        .tempfile()?;

    let status = Command::new("nasm")
        .arg("-O3")
        .arg("-f")
        .arg("elf")
        .arg(asm_file.path())
        .arg("-o")
        .arg(object_file.path())
        .status()
        .map_err(|e| BuildError::Assemble(format!("could not run nasm: {e}")))?;
    if !status.success() {
        return Err(BuildError::Assemble(format!("nasm exited with {status}")));
    }
    Ok(object_file)
}

/// Link an ELF object file into an executable.
pub fn link(object: &Path, output: &Path) -> Result<(), BuildError> {
    let status = Command::new("gcc")
        .arg("-m32")
        .arg(object)
        .arg("-o")
        .arg(output)
        .status()
        .map_err(|e| BuildError::Link(format!("could not run gcc: {e}")))?;
    if !status.success() {
        return Err(BuildError::Link(format!("gcc exited with {status}")));
    }
    Ok(())
}

/// Assemble and link a listing's text into an executable at `output`.
pub fn build(asm_text: &str, output: &Path) -> Result<(), BuildError> {
    let object_file = assemble(asm_text)?;
    link(object_file.path(), output)
}
