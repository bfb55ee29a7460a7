//! ZIP archive building and reading.
//!
//! The writer produces ZIP32 archives from in-memory buffers using only the
//! STORED method. The reader lists and verifies such archives.
//!
//! ## Architecture
//!
//! - [`crc`]: CRC-32 checksum used by every header
//! - [`structures`]: Data structures representing ZIP format elements (EOCD, file headers, etc.)
//! - [`writer`]: Per-entry header building and archive assembly
//! - [`parser`]: Low-level parsing of ZIP structures from raw bytes
//! - [`reader`]: Entry reading with CRC verification
//!
//! ## ZIP Format Overview
//!
//! A ZIP file consists of:
//! 1. Local file headers and data for each file
//! 2. Central Directory with metadata for all files
//! 3. End of Central Directory (EOCD) record at the end
//!
//! ## Limitations
//!
//! - STORED entries only; no compression
//! - No ZIP64: entries, offsets and the central directory must stay below
//!   4 GiB, and there may be at most 65534 entries
//! - No encryption
//! - No multi-disk archive support

pub mod crc;
mod parser;
mod reader;
pub mod structures;
mod writer;

pub use crc::{Crc32, crc32};
pub use parser::ZipParser;
pub use reader::{ArchiveReader, VerifyReport};
pub use structures::*;
pub use writer::{
    Archive, ArchiveAssembler, EntryHeaders, FileEntry, build_zip, build_zip_async,
};
