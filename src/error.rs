use thiserror::Error;

/// Errors that can occur while building an archive.
///
/// Every variant except [`ZipError::Task`] means some value does not fit its
/// ZIP32 header field. The writer never truncates such values, so a failed
/// build produces no output at all.
#[derive(Debug, Error)]
pub enum ZipError {
    /// An entry's data does not fit the 4-byte size fields.
    #[error("entry {path:?} is {size} bytes, which exceeds the ZIP32 size limit")]
    EntryTooLarge { path: String, size: u64 },

    /// An entry's UTF-8 encoded path does not fit the 2-byte length field.
    #[error("path {path:?} is {len} bytes long, which exceeds the ZIP32 filename limit")]
    PathTooLong { path: String, len: usize },

    /// A local header offset or the central directory does not fit a 4-byte field.
    #[error("archive offset {offset} exceeds the ZIP32 size limit")]
    ArchiveTooLarge { offset: u64 },

    /// The number of entries does not fit the 2-byte count fields.
    #[error("{count} entries exceed the ZIP32 entry count limit")]
    TooManyEntries { count: usize },

    /// I/O error while writing records.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// The blocking build task panicked or was cancelled.
    #[error("build task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
}

impl ZipError {
    /// Whether the error is one of the ZIP32 overflow conditions.
    pub fn is_overflow(&self) -> bool {
        matches!(
            self,
            ZipError::EntryTooLarge { .. }
                | ZipError::PathTooLong { .. }
                | ZipError::ArchiveTooLarge { .. }
                | ZipError::TooManyEntries { .. }
        )
    }
}

/// Result type for archive building.
pub type Result<T> = std::result::Result<T, ZipError>;
