//! Per-source replay schedulers.
//!
//! Each scheduler owns one [`DataSource`] and a tokio task that wakes every
//! poll interval, works out how far into the recording the run has got and
//! publishes every record that has come due.
//!
//! ```text
//!          start()              source exhausted / stop()
//!   Idle ───────────► Running ─────────────────────────► Done
//!     └──────────────── stop() ─────────────────────────────┘
//! ```

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use nexus_streamer_source::DataSource;
use nexus_streamer_types::{Record, SourceDescriptor, SourceKind};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::clock::{RunClock, TimeSource};
use crate::sink::BackpressuredSink;
use crate::wire::{self, EventMessage, LogMessage};
use crate::{SchedulerError, SinkError};

/// Default wait between emission passes.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(200);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchedulerState {
    Idle,
    Running,
    Done,
}

/// Everything the schedulers of one run share.
#[derive(Debug, Clone)]
pub struct ReplayContext {
    pub sink: Arc<BackpressuredSink>,
    pub clock: RunClock,
    pub time: Arc<dyn TimeSource>,
    pub poll_interval: Duration,
}

/// What a finished stream did.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StreamStats {
    pub published: u64,
    /// Log samples dropped for having a negative recorded timestamp.
    pub skipped_negative: u64,
    /// The source ran to its end rather than being stopped.
    pub exhausted: bool,
    /// The stream ended on a source or sink error.
    pub failed: bool,
}

/// Replays one source on its own task.
#[derive(Debug)]
pub struct ReplayScheduler {
    descriptor: SourceDescriptor,
    topic: String,
    final_timestamp: Option<i64>,
    context: ReplayContext,
    source: Option<Box<dyn DataSource>>,
    stop_tx: watch::Sender<bool>,
    done: Arc<AtomicBool>,
    task: Option<JoinHandle<StreamStats>>,
}

impl ReplayScheduler {
    pub fn new(
        source: Box<dyn DataSource>,
        topic: impl Into<String>,
        context: ReplayContext,
    ) -> Self {
        let (stop_tx, _) = watch::channel(false);
        Self {
            descriptor: source.descriptor().clone(),
            topic: topic.into(),
            final_timestamp: source.final_timestamp(),
            context,
            source: Some(source),
            stop_tx,
            done: Arc::new(AtomicBool::new(false)),
            task: None,
        }
    }

    pub fn name(&self) -> &str {
        self.descriptor.name()
    }

    pub fn kind(&self) -> SourceKind {
        self.descriptor.kind()
    }

    pub fn topic(&self) -> &str {
        &self.topic
    }

    /// Recorded timestamp of the source's last record.
    pub fn final_timestamp(&self) -> Option<i64> {
        self.final_timestamp
    }

    pub fn state(&self) -> SchedulerState {
        if self.is_done() {
            SchedulerState::Done
        } else if self.source.is_some() {
            SchedulerState::Idle
        } else {
            SchedulerState::Running
        }
    }

    /// True once the task has stopped, by exhaustion, error or `stop`.
    pub fn is_done(&self) -> bool {
        self.done.load(Ordering::Acquire)
    }

    /// Spawns the replay task on the current tokio runtime.
    ///
    /// # Errors
    ///
    /// [`SchedulerError::AlreadyRunning`] while the task is live, and
    /// [`SchedulerError::AlreadyFinished`] once the source has been
    /// consumed or the scheduler stopped.
    pub fn start(&mut self) -> Result<(), SchedulerError> {
        match self.state() {
            SchedulerState::Running => {
                return Err(SchedulerError::AlreadyRunning {
                    source_name: self.name().to_string(),
                });
            }
            SchedulerState::Done => {
                return Err(SchedulerError::AlreadyFinished {
                    source_name: self.name().to_string(),
                });
            }
            SchedulerState::Idle => {}
        }
        let Some(source) = self.source.take() else {
            return Err(SchedulerError::AlreadyFinished {
                source_name: self.name().to_string(),
            });
        };

        let stream = Stream {
            source,
            topic: self.topic.clone(),
            context: self.context.clone(),
            stop_rx: self.stop_tx.subscribe(),
            message_id: 0,
            stats: StreamStats::default(),
        };
        let done = Arc::clone(&self.done);
        debug!(source = %self.descriptor, topic = %self.topic, "starting scheduler");
        self.task = Some(tokio::spawn(async move {
            let stats = stream.run().await;
            done.store(true, Ordering::Release);
            stats
        }));
        Ok(())
    }

    /// Asks the task to stop at its next suspension point or between
    /// records. A scheduler that never started is marked done. Idempotent.
    pub fn stop(&mut self) {
        self.stop_tx.send_replace(true);
        if self.task.is_none() {
            self.source = None;
            self.done.store(true, Ordering::Release);
        }
    }

    /// Waits for the task to end. Returns `None` if it never started or was
    /// already joined.
    pub async fn join(&mut self) -> Option<StreamStats> {
        let task = self.task.take()?;
        match task.await {
            Ok(stats) => Some(stats),
            Err(e) => {
                error!(source = %self.descriptor, error = %e, "replay task failed");
                self.done.store(true, Ordering::Release);
                None
            }
        }
    }
}

impl Drop for ReplayScheduler {
    fn drop(&mut self) {
        self.stop_tx.send_replace(true);
    }
}

/// State owned by a running task.
struct Stream {
    source: Box<dyn DataSource>,
    topic: String,
    context: ReplayContext,
    stop_rx: watch::Receiver<bool>,
    message_id: u64,
    stats: StreamStats,
}

enum Step {
    /// Nothing more is due before the next poll.
    Wait,
    /// The stream is over.
    Finish,
}

impl Stream {
    async fn run(mut self) -> StreamStats {
        let mut pending: Option<Record> = None;
        loop {
            if *self.stop_rx.borrow() {
                break;
            }
            tokio::select! {
                _ = self.stop_rx.changed() => break,
                () = tokio::time::sleep(self.context.poll_interval) => {}
            }
            let virtual_now = self.context.clock.virtual_now(self.context.time.now_ns());
            match self.emit_due(&mut pending, virtual_now).await {
                Step::Wait => {}
                Step::Finish => break,
            }
        }

        if self.stats.skipped_negative > 0 {
            warn!(
                source = self.source.name(),
                skipped = self.stats.skipped_negative,
                "skipped log samples with negative timestamps"
            );
        }
        if self.stats.exhausted {
            info!(
                source = self.source.name(),
                published = self.stats.published,
                "reached end of source"
            );
        }
        self.stats
    }

    /// Publishes records until the next one lies after `virtual_now`.
    async fn emit_due(&mut self, pending: &mut Option<Record>, virtual_now: i64) -> Step {
        loop {
            if *self.stop_rx.borrow() {
                return Step::Finish;
            }
            let record = match pending.take() {
                Some(record) => record,
                None => match self.source.next_record() {
                    Ok(Some(record)) => record,
                    Ok(None) => {
                        self.stats.exhausted = true;
                        return Step::Finish;
                    }
                    Err(e) => {
                        error!(source = self.source.name(), error = %e, "failed to read source");
                        self.stats.failed = true;
                        return Step::Finish;
                    }
                },
            };
            if record.timestamp_ns() > virtual_now {
                *pending = Some(record);
                return Step::Wait;
            }
            if let Err(SinkError::Closed) = self.publish(record).await {
                warn!(source = self.source.name(), "sink closed, stopping stream");
                self.stats.failed = true;
                return Step::Finish;
            }
        }
    }

    async fn publish(&mut self, record: Record) -> Result<(), SinkError> {
        let live_ns = self.context.clock.to_live(record.timestamp_ns());
        let encoded = match record {
            Record::Event(pulse) => {
                let message = EventMessage {
                    source_name: self.source.name().to_string(),
                    message_id: self.message_id,
                    pulse_time_ns: live_ns,
                    time_of_flight: pulse.time_of_flight,
                    detector_id: pulse.detector_id,
                };
                self.message_id += 1;
                wire::encode_event(&message)
            }
            Record::Log(sample) => {
                if sample.timestamp_ns < 0 {
                    self.stats.skipped_negative += 1;
                    return Ok(());
                }
                wire::encode_log(&LogMessage {
                    source_name: self.source.name().to_string(),
                    value: sample.value,
                    timestamp_ns: live_ns,
                })
            }
        };
        let payload = match encoded {
            Ok(payload) => payload,
            Err(e) => {
                error!(source = self.source.name(), error = %e, "failed to encode record");
                return Ok(());
            }
        };
        self.context.sink.publish(&self.topic, payload, live_ns).await?;
        self.stats.published += 1;
        Ok(())
    }
}
