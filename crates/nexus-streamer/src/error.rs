use std::path::PathBuf;

use nexus_streamer_recording::RecordingError;
use nexus_streamer_replay::{SchedulerError, SinkError, WireError};
use thiserror::Error;

/// Why a run could not be published.
#[derive(Debug, Error)]
pub enum RunError {
    #[error("no valid data sources found in {}", path.display())]
    NoValidSources { path: PathBuf },

    #[error(transparent)]
    Recording(#[from] RecordingError),

    #[error("failed to read run description template {}", path.display())]
    Description {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error(transparent)]
    Wire(#[from] WireError),

    #[error("run aborted: {0}")]
    Sink(#[from] SinkError),

    #[error(transparent)]
    Scheduler(#[from] SchedulerError),
}
