//! # nexus-streamer
//!
//! Replays a recorded instrument run onto a message bus as if the
//! instrument were producing it live.
//!
//! ```text
//!  Recording ──► discover_sources ──► DataSource per group ──► ReplayScheduler per source
//!                                                                      │
//!                  run start / run stop ──► BackpressuredSink ◄────────┘
//!                                                 │
//!                                              Channel
//! ```
//!
//! [`publish_run`] drives one complete run: it announces the run, replays
//! every log and event group of the recording on its own task, and ends the
//! run once every source is exhausted or a shutdown signal arrives.
//!
//! # Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use nexus_streamer::{RunOptions, publish_run};
//! use nexus_streamer::replay::{MonotonicTimeSource, QueueChannel, QueueChannelConfig, transport};
//! use nexus_streamer::recording::Recording;
//!
//! let recording = Recording::open("runs/loki_0042")?;
//! let channel = QueueChannel::spawn(QueueChannelConfig::default(), transport::connect("-")?)?;
//! let options = RunOptions::new("LOKI", "localhost:9092");
//! let summary = publish_run(
//!     &options,
//!     &recording,
//!     Arc::new(channel),
//!     Arc::new(MonotonicTimeSource::new()),
//!     async { let _ = tokio::signal::ctrl_c().await; },
//! ).await?;
//! ```

pub mod description;
pub mod discovery;
mod error;
pub mod run;

pub use discovery::{DiscoveredSources, Rejection, discover_sources};
pub use error::RunError;
pub use run::{RunOptions, RunSummary, publish_run};

pub use nexus_streamer_io as io;
pub use nexus_streamer_recording as recording;
pub use nexus_streamer_replay as replay;
pub use nexus_streamer_source as source;
pub use nexus_streamer_types as types;
