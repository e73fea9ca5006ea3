// src/pe/mod.rs
//! Just enough of the Portable Executable format to enumerate imports.
//!
//! Covers the DOS header, COFF header, PE32/PE32+ optional header, data
//! directories, section table and the import directory with its lookup and
//! hint/name tables. Exports, relocations, resources and delay-load imports
//! are not parsed.

pub mod error;
pub mod headers;
pub mod imports;
pub mod reader;

pub use self::error::{PeError, Result};
pub use self::headers::{machine_name, DataDirectory, ImageHeaders, ImageKind, SectionHeader};
pub use self::imports::{ImportDescriptor, ImportEntry, ImportSymbol, ImportTable};
pub use self::reader::{FileReader, Reader, SliceReader};
