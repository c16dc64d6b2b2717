//! # dexmerge
//!
//! A library for combining two Android DEX files into a single one. The
//! merger deduplicates the sorted ID sections of both inputs, rewrites
//! every cross-reference (including bytecode operands, debug info and
//! exception tables) into the combined index space, and emits a complete
//! file with a valid header, map list and hashes.
//!
//! # Examples
//!
//! ```no_run
//! use std::path::Path;
//! use dexmerge::{CollisionPolicy, DexBuffer, DexMerger};
//!
//! let a = DexBuffer::from_file(Path::new("classes.dex")).unwrap();
//! let b = DexBuffer::from_file(Path::new("classes2.dex")).unwrap();
//! let merged = DexMerger::new(a, b, CollisionPolicy::KeepFirst).merge().unwrap();
//! std::fs::write("merged.dex", merged).unwrap();
//! ```

#[macro_use]
pub mod dex;
pub mod merge;

#[cfg(test)]
mod tests;

pub use crate::dex::error::{DexError, DexErrorKind};
pub use crate::dex::file::DexBuffer;
pub use crate::merge::{CollisionPolicy, DexMerger};
