//! I/O error types.

use std::path::PathBuf;

/// Errors from chunked array access and the I/O backend.
#[derive(Debug, thiserror::Error)]
pub enum IoError {
    /// Underlying OS I/O error.
    #[error("I/O error: {source}")]
    Io {
        #[from]
        source: std::io::Error,
    },

    /// File not found.
    #[error("file not found: {path}")]
    NotFound { path: PathBuf },

    /// Invalid file handle.
    #[error("invalid file handle: {handle}")]
    InvalidHandle { handle: u64 },

    /// A positional read returned fewer bytes than the chunk table promised.
    #[error("short read at offset {offset}: expected {expected} bytes, got {actual}")]
    ShortRead {
        offset: u64,
        expected: usize,
        actual: usize,
    },

    /// The group has no array with this name.
    #[error("group {group} has no field {field}")]
    MissingField { group: String, field: String },

    /// Stored chunk bytes could not be turned back into elements.
    #[error("corrupt chunk in {array}: {reason}")]
    CorruptChunk { array: String, reason: String },
}
