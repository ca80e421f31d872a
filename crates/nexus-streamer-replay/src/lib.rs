//! # nexus-streamer-replay: timed replay onto the message bus
//!
//! ```text
//!  DataSource ──► ReplayScheduler ──► BackpressuredSink ──► Channel ──► Transport
//!  (one each)     (one task each)      (shared, retries)    (queue +    (JSON lines:
//!                                                            worker)     stdout/file/tcp)
//! ```
//!
//! A [`RunClock`] computed once per run decides when each record is due.
//! Schedulers wake every poll interval and publish whatever has come due,
//! encoded by [`wire`]. The [`BackpressuredSink`] turns a full channel
//! buffer into a wait rather than an error.

mod bounded_queue;
pub mod channel;
pub mod clock;
mod error;
pub mod scheduler;
pub mod sink;
pub mod transport;
pub mod wire;


pub use bounded_queue::{BoundedQueue, PushResult};
pub use channel::{
    Channel, ChannelStats, OutboundMessage, PublishOutcome, QueueChannel, QueueChannelConfig,
};
pub use clock::{MonotonicTimeSource, PacingMode, RunClock, SystemTimeSource, TimeSource};
pub use error::{SchedulerError, SinkError, TransportError, WireError};
pub use scheduler::{
    DEFAULT_POLL_INTERVAL, ReplayContext, ReplayScheduler, SchedulerState, StreamStats,
};
pub use sink::{BackpressuredSink, SinkConfig};
pub use transport::{JsonLinesTransport, MemoryTransport, Transport};
pub use wire::WireMessage;
