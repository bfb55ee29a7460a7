//! # storezip
//!
//! An in-memory ZIP archive builder.
//!
//! This library packages named byte buffers into a single ZIP archive using the
//! STORED (uncompressed) method, so any ZIP32 reader can open the result
//! without a decompressor. Building is a pure computation: no timestamps or
//! randomness are embedded, so identical input always gives identical bytes.
//!
//! ## Features
//!
//! - Build archives from `(path, data)` entries, in order, duplicates allowed
//! - Entries without a path or data are skipped instead of failing the build
//! - Explicit errors instead of corrupt output when a value exceeds ZIP32 limits
//! - Async wrapper that builds on tokio's blocking pool
//! - List and CRC-verify existing archives from memory or local files
//!
//! ## Example
//!
//! ```
//! use storezip::{FileEntry, build_zip};
//!
//! let archive = build_zip(&[
//!     FileEntry::new("readme.txt", "hello"),
//!     FileEntry::new("data/numbers.bin", vec![1u8, 2, 3]),
//! ])?;
//!
//! assert_eq!(archive.entry_count(), 2);
//! assert_eq!(archive.media_type(), "application/zip");
//!
//! let bytes: Vec<u8> = archive.into_bytes();
//! assert_eq!(&bytes[..4], b"PK\x03\x04");
//! # Ok::<(), storezip::ZipError>(())
//! ```

pub mod cli;
pub mod error;
pub mod io;
pub mod pack;
pub mod zip;

pub use cli::Cli;
pub use error::{Result, ZipError};
pub use io::{LocalFileReader, MemoryReader, ReadAt};
pub use zip::{
    Archive, ArchiveReader, FileEntry, MEDIA_TYPE, ZipFileEntry, build_zip, build_zip_async, crc32,
};
