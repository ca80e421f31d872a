//! Replay error types.

use thiserror::Error;

/// Errors from driving a [`ReplayScheduler`](crate::ReplayScheduler).
#[derive(Debug, Error, PartialEq, Eq)]
pub enum SchedulerError {
    #[error("scheduler for {source_name} is already running")]
    AlreadyRunning { source_name: String },

    /// The source has been consumed or the scheduler was stopped; sources
    /// cannot be replayed twice.
    #[error("scheduler for {source_name} has already finished")]
    AlreadyFinished { source_name: String },
}

/// Errors from the [`BackpressuredSink`](crate::BackpressuredSink).
#[derive(Debug, Error, PartialEq, Eq)]
pub enum SinkError {
    #[error("sink is closed")]
    Closed,
}

/// Errors encoding or decoding outbound payloads.
#[derive(Debug, Error)]
pub enum WireError {
    #[error("failed to encode {schema} payload: {reason}")]
    Encode { schema: &'static str, reason: String },

    #[error("failed to decode {schema} payload: {reason}")]
    Decode { schema: &'static str, reason: String },

    #[error("payload of {len} bytes is too short for a schema id")]
    Truncated { len: usize },

    #[error("unknown schema id {0:?}")]
    UnknownSchema([u8; 4]),
}

/// Errors delivering messages to a transport.
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("transport I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to serialize message: {0}")]
    Json(#[from] serde_json::Error),

    #[error("invalid output target {0:?}")]
    InvalidTarget(String),

    #[error("message of {size} bytes exceeds the {max} byte limit")]
    MessageTooLarge { size: usize, max: usize },
}
