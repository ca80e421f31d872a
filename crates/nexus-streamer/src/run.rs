//! Publishing one run.
//!
//! ```text
//!   discover ──► run clock ──► run start ──► schedulers ──► wait ──► stop all ──► run stop ──► close
//!      │                                                     ▲
//!      └─ no sources: abort                   shutdown signal┘
//! ```
//!
//! The sink is closed on every exit path, including errors after the
//! schedulers have started.

use std::future::Future;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, SecondsFormat};
use nexus_streamer_recording::Recording;
use nexus_streamer_replay::wire::{self, RunStart, RunStop};
use nexus_streamer_replay::{
    BackpressuredSink, Channel, DEFAULT_POLL_INTERVAL, PacingMode, ReplayContext, ReplayScheduler,
    RunClock, SinkConfig, StreamStats, TimeSource,
};
use nexus_streamer_source::{DataSource, UnitRegistry};
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::RunError;
use crate::description;
use crate::discovery::{Rejection, discover_sources};

/// How often the driver checks whether every stream has finished.
const DRIVER_POLL_INTERVAL: Duration = Duration::from_secs(1);

/// Settings of one run.
#[derive(Debug, Clone)]
pub struct RunOptions {
    /// Prefix of every topic the run publishes to.
    pub instrument: String,
    /// Written into the run start so file writers know where to read from.
    pub broker: String,
    pub mode: PacingMode,
    /// Template for the run description; generated from the recording
    /// when absent.
    pub json_description: Option<PathBuf>,
    pub poll_interval: Duration,
    pub run_number: u64,
    pub sink: SinkConfig,
    pub units: UnitRegistry,
}

impl RunOptions {
    pub fn new(instrument: impl Into<String>, broker: impl Into<String>) -> Self {
        Self {
            instrument: instrument.into(),
            broker: broker.into(),
            mode: PacingMode::default(),
            json_description: None,
            poll_interval: DEFAULT_POLL_INTERVAL,
            run_number: 0,
            sink: SinkConfig::default(),
            units: UnitRegistry::default(),
        }
    }

    pub fn mode(mut self, mode: PacingMode) -> Self {
        self.mode = mode;
        self
    }

    pub fn json_description(mut self, path: impl Into<PathBuf>) -> Self {
        self.json_description = Some(path.into());
        self
    }

    pub fn poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    pub fn run_number(mut self, run_number: u64) -> Self {
        self.run_number = run_number;
        self
    }

    pub fn sink(mut self, sink: SinkConfig) -> Self {
        self.sink = sink;
        self
    }

    pub fn run_info_topic(&self) -> String {
        format!("{}_runInfo", self.instrument)
    }

    pub fn log_topic(&self) -> String {
        format!("{}_sampleEnv", self.instrument)
    }

    pub fn event_topic(&self) -> String {
        format!("{}_events", self.instrument)
    }
}

/// What a finished run did.
#[derive(Debug)]
pub struct RunSummary {
    pub job_id: String,
    pub run_name: String,
    pub log_sources: Vec<String>,
    pub event_sources: Vec<String>,
    pub rejected: Vec<Rejection>,
    /// Messages accepted by the channel, run start and stop included.
    pub published: u64,
    /// Publish attempts that found the channel's buffer full.
    pub retries: u64,
    pub skipped_negative: u64,
    /// Streams that ended on an error.
    pub failed_streams: usize,
    /// Live run window, nanoseconds since the Unix epoch.
    pub start_ns: i64,
    pub stop_ns: i64,
    /// The shutdown signal ended the run before every stream finished.
    pub interrupted: bool,
    /// Messages still queued when the channel was shut down.
    pub undelivered: usize,
}

/// Formats nanoseconds since the Unix epoch as ISO 8601.
pub fn iso8601(ns: i64) -> String {
    DateTime::from_timestamp_nanos(ns).to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// Publishes one run of `recording` through `channel`.
///
/// Returns once every stream has finished or `shutdown` resolves. Either
/// way every scheduler is stopped, the run stop is published and the
/// channel is shut down before returning.
///
/// # Errors
///
/// [`RunError::NoValidSources`] if no group of the recording can be
/// replayed. Recording, description and publishing failures are returned
/// after the same cleanup.
pub async fn publish_run<F>(
    options: &RunOptions,
    recording: &Recording,
    channel: Arc<dyn Channel>,
    time: Arc<dyn TimeSource>,
    shutdown: F,
) -> Result<RunSummary, RunError>
where
    F: Future<Output = ()>,
{
    let sink = Arc::new(BackpressuredSink::new(channel, options.sink));
    let result = drive(options, recording, &sink, time, shutdown).await;
    let undelivered = sink.close().await;
    if undelivered > 0 {
        warn!(undelivered, "run ended with undelivered messages");
    }
    let mut summary = result?;
    summary.undelivered = undelivered;
    Ok(summary)
}

async fn drive<F>(
    options: &RunOptions,
    recording: &Recording,
    sink: &Arc<BackpressuredSink>,
    time: Arc<dyn TimeSource>,
    shutdown: F,
) -> Result<RunSummary, RunError>
where
    F: Future<Output = ()>,
{
    let discovered = discover_sources(recording, &options.units);
    if discovered.is_empty() {
        error!(
            recording = %recording.root().display(),
            rejected = discovered.rejected.len(),
            "no valid data sources found, aborting"
        );
        return Err(RunError::NoValidSources {
            path: recording.root().to_path_buf(),
        });
    }

    let recorded_start_ns = recording.start_time_ns()?;
    let last_timestamp = discovered.last_timestamp().unwrap_or(recorded_start_ns);
    let clock = RunClock::new(options.mode, time.now_ns(), recorded_start_ns, last_timestamp);
    info!(
        mode = %options.mode,
        start = %iso8601(clock.start_ns),
        stop = %iso8601(clock.stop_ns),
        duration_s = clock.duration_ns() as f64 / 1e9,
        "run window"
    );

    let log_topic = options.log_topic();
    let event_topic = options.event_topic();
    let nexus_structure = match &options.json_description {
        Some(path) => description::from_template(path, &log_topic, &event_topic)?,
        None => description::generate(
            recording,
            &log_topic,
            &event_topic,
            &iso8601(clock.start_ns),
        ),
    };

    let context = ReplayContext {
        sink: Arc::clone(sink),
        clock,
        time: Arc::clone(&time),
        poll_interval: options.poll_interval,
    };
    let log_sources: Vec<String> = discovered.logs.iter().map(|s| s.name().to_string()).collect();
    let event_sources: Vec<String> = discovered
        .events
        .iter()
        .map(|s| s.name().to_string())
        .collect();
    let mut schedulers: Vec<ReplayScheduler> = Vec::with_capacity(discovered.source_count());
    for source in discovered.logs {
        schedulers.push(ReplayScheduler::new(
            Box::new(source),
            log_topic.as_str(),
            context.clone(),
        ));
    }
    for source in discovered.events {
        schedulers.push(ReplayScheduler::new(
            Box::new(source),
            event_topic.as_str(),
            context.clone(),
        ));
    }

    let job_id = Uuid::new_v4().to_string();
    let run_name = options.run_number.to_string();
    let run_start = RunStart {
        job_id: job_id.clone(),
        filename: format!("FromNeXusStreamer_{}.nxs", options.run_number),
        start_time_ms: clock.start_ns.div_euclid(1_000_000),
        stop_time_ms: clock.stop_ns.div_euclid(1_000_000),
        run_name: run_name.clone(),
        instrument_name: options.instrument.clone(),
        broker: options.broker.clone(),
        nexus_structure,
    };

    let started = start_streams(
        sink,
        &options.run_info_topic(),
        &run_start,
        clock.start_ns,
        &mut schedulers,
    )
    .await;
    if started.is_ok() {
        info!(sources = ?log_sources, "publishing log data sources");
        info!(sources = ?event_sources, "publishing event data sources");
    }

    let interrupted = match started {
        Ok(()) => wait_for_streams(&schedulers, shutdown).await,
        Err(_) => false,
    };
    let stats = stop_all(&mut schedulers).await;
    started?;

    if interrupted {
        info!("run interrupted, stopped every data source");
    } else {
        info!("reached end of data sources");
    }

    // An interrupted run ends now rather than at the planned stop time.
    let stop_ns = if interrupted {
        time.now_ns()
    } else {
        clock.stop_ns
    };
    let run_stop = RunStop {
        job_id: job_id.clone(),
        stop_time_ms: stop_ns.div_euclid(1_000_000),
        run_name: run_name.clone(),
    };
    sink.publish(
        &options.run_info_topic(),
        wire::encode_run_stop(&run_stop)?,
        stop_ns,
    )
    .await?;

    Ok(RunSummary {
        job_id,
        run_name,
        log_sources,
        event_sources,
        rejected: discovered.rejected,
        published: sink.published(),
        retries: sink.retries(),
        skipped_negative: stats.iter().map(|s| s.skipped_negative).sum(),
        failed_streams: stats.iter().filter(|s| s.failed).count(),
        start_ns: clock.start_ns,
        stop_ns,
        interrupted,
        undelivered: 0,
    })
}

async fn start_streams(
    sink: &BackpressuredSink,
    run_info_topic: &str,
    run_start: &RunStart,
    start_ns: i64,
    schedulers: &mut [ReplayScheduler],
) -> Result<(), RunError> {
    sink.publish(run_info_topic, wire::encode_run_start(run_start)?, start_ns)
        .await?;
    for scheduler in schedulers {
        scheduler.start()?;
    }
    Ok(())
}

/// Returns true if `shutdown` resolved before every stream finished.
async fn wait_for_streams<F>(schedulers: &[ReplayScheduler], shutdown: F) -> bool
where
    F: Future<Output = ()>,
{
    tokio::pin!(shutdown);
    loop {
        if schedulers.iter().all(ReplayScheduler::is_done) {
            return false;
        }
        tokio::select! {
            () = &mut shutdown => return true,
            () = tokio::time::sleep(DRIVER_POLL_INTERVAL) => {}
        }
    }
}

async fn stop_all(schedulers: &mut [ReplayScheduler]) -> Vec<StreamStats> {
    for scheduler in schedulers.iter_mut() {
        scheduler.stop();
    }
    let mut stats = Vec::with_capacity(schedulers.len());
    for scheduler in schedulers.iter_mut() {
        if let Some(stream) = scheduler.join().await {
            stats.push(stream);
        }
    }
    stats
}
