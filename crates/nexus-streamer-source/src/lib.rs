//! # nexus-streamer-source: replayable record sources
//!
//! Turns the arrays of one recorded group into a lazy, forward-only
//! sequence of [`Record`]s with nanosecond timestamps.
//!
//! - [`EventPulseSource`] frames `NXevent_data` groups into one
//!   [`EventPulse`](nexus_streamer_types::EventPulse) per pulse.
//! - [`LogSampleSource`] pairs the `time` and `value` arrays of an `NXlog`
//!   group into [`LogSample`](nexus_streamer_types::LogSample)s.
//!
//! Both read their large arrays through
//! [`ChunkedSequentialReader`](nexus_streamer_io::ChunkedSequentialReader),
//! so memory use is bounded by one chunk per array regardless of the
//! recording's size. Sources are not restartable.

mod error;
pub mod event;
pub mod log;
pub mod units;


pub use error::SourceError;
pub use event::{EventPulseSource, reconcile_boundaries};
pub use log::LogSampleSource;
pub use units::{TimeUnit, ToNanos, UnitRegistry};

use nexus_streamer_types::{Record, SourceDescriptor, SourceKind};

/// A lazy sequence of records from one recorded group.
pub trait DataSource: Send + std::fmt::Debug {
    fn descriptor(&self) -> &SourceDescriptor;

    /// Last segment of the group path.
    fn name(&self) -> &str {
        self.descriptor().name()
    }

    fn kind(&self) -> SourceKind {
        self.descriptor().kind()
    }

    /// Timestamp of the last record, known without consuming the sequence.
    /// `None` when the source yields no records.
    fn final_timestamp(&self) -> Option<i64>;

    /// Produces the next record, or `None` once the sequence has ended.
    fn next_record(&mut self) -> Result<Option<Record>, SourceError>;
}

impl<S: DataSource + ?Sized> DataSource for Box<S> {
    fn descriptor(&self) -> &SourceDescriptor {
        (**self).descriptor()
    }

    fn final_timestamp(&self) -> Option<i64> {
        (**self).final_timestamp()
    }

    fn next_record(&mut self) -> Result<Option<Record>, SourceError> {
        (**self).next_record()
    }
}
