//! IA-32 assembly support for the Javalette compiler
//!
//! Listings, the lazy-ESP flattener and the external assemble/link drivers.
//! The backend crate builds [`listing::Item`] sequences; this crate turns
//! them into NASM text and, through `nasm` and `gcc`, into ELF executables.

#![warn(missing_docs)]
#![warn(rust_2018_idioms)]

pub mod flatten;
pub mod listing;
pub mod tools;

pub use flatten::{flatten, FlattenError};
pub use listing::{line, ConstData, Item, Label, NameAlloc};
pub use tools::{assemble, build, link, BuildError};
