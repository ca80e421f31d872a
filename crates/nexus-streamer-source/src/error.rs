//! Source construction and read errors.

use nexus_streamer_io::IoError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SourceError {
    /// A required array is absent from the group.
    #[error("{group} is missing required field {field}")]
    MissingField { group: String, field: String },

    /// A time array has no `units` attribute, or one that is not a time unit.
    #[error("{group}/{field} has unrecognised or missing units {units:?}")]
    UnrecognizedUnits {
        group: String,
        field: String,
        units: Option<String>,
    },

    /// A log array holds no data.
    #[error("{group}/{field} is empty")]
    EmptySource { group: String, field: String },

    /// `event_index` decreases, so pulse boundaries cannot be derived.
    #[error("{group}/event_index decreases at position {position}")]
    NonMonotonicIndex { group: String, position: usize },

    /// Reading the underlying arrays failed.
    #[error(transparent)]
    Io(#[from] IoError),
}
