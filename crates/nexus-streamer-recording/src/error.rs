//! Recording error types.

use std::path::PathBuf;

use nexus_streamer_io::IoError;
use thiserror::Error;

/// Errors from opening, reading or writing a recording.
#[derive(Debug, Error)]
pub enum RecordingError {
    /// I/O backend error.
    #[error(transparent)]
    Io(#[from] IoError),

    /// Directory creation or other filesystem error outside the backend.
    #[error("filesystem error at {path}: {source}")]
    Filesystem {
        path: PathBuf,
        source: std::io::Error,
    },

    /// The manifest is not valid JSON for the expected schema.
    #[error("failed to parse manifest at {path}: {source}")]
    ManifestParse {
        path: PathBuf,
        source: serde_json::Error,
    },

    /// The manifest could not be serialized.
    #[error("failed to serialize manifest: {0}")]
    ManifestSerialize(#[source] serde_json::Error),

    /// The recording was written by an incompatible format version.
    #[error("unsupported recording format version {found} (expected {expected})")]
    UnsupportedVersion { found: u32, expected: u32 },

    /// The manifest parsed but describes an inconsistent recording.
    #[error("invalid manifest: {0}")]
    InvalidManifest(String),

    /// Two groups share a path.
    #[error("duplicate group {0}")]
    DuplicateGroup(String),

    /// No group with this path.
    #[error("unknown group {0}")]
    UnknownGroup(String),

    /// The recording has no run start time.
    #[error("recording has no start_time")]
    MissingStartTime,

    /// The run start time is not a recognizable ISO 8601 timestamp.
    #[error("invalid start_time {value:?}: {reason}")]
    InvalidStartTime { value: String, reason: String },

    /// Compression failed.
    #[error("compression failed ({codec}): {reason}")]
    CompressionFailed { codec: &'static str, reason: String },

    /// Decompression failed.
    #[error("decompression failed ({codec}): {reason}")]
    DecompressionFailed { codec: &'static str, reason: String },
}
