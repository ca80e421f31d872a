//! Replay a recording, one run after another.

use std::sync::Arc;

use anyhow::{Context, Result};
use nexus_streamer::recording::Recording;
use nexus_streamer::replay::{MonotonicTimeSource, PacingMode, QueueChannel, transport};
use nexus_streamer::run::iso8601;
use nexus_streamer::{RunError, RunOptions, RunSummary, publish_run};
use nexus_streamer_config::StreamerConfig;
use tokio::sync::watch;
use tracing::info;

use crate::StreamArgs;
use crate::style::{info_table, print_error, print_success, print_warn};

/// Command line flags take precedence over every configuration layer.
fn apply_args(args: &StreamArgs, config: &mut StreamerConfig) {
    if let Some(instrument) = &args.instrument {
        config.instrument.name.clone_from(instrument);
    }
    if let Some(output) = &args.output {
        config.output.target.clone_from(output);
    }
    if let Some(broker) = &args.broker {
        config.output.broker.clone_from(broker);
    }
    if args.slow {
        config.playback.mode = PacingMode::Slow;
    }
    if args.single_run {
        config.playback.single_run = true;
    }
    if let Some(template) = &args.json_description {
        config.playback.json_description = Some(template.clone());
    }
    if let Some(poll) = args.poll_interval_ms {
        config.playback.poll_interval_ms = poll;
    }
}

pub fn run(args: &StreamArgs, mut config: StreamerConfig) -> Result<()> {
    apply_args(args, &mut config);
    config.validate()?;

    let recording = Recording::open(&args.recording)
        .with_context(|| format!("Failed to open recording {}", args.recording.display()))?;
    info!(recording = %args.recording.display(), "nexus-streamer started");

    let runtime = tokio::runtime::Runtime::new().context("Failed to start async runtime")?;
    runtime.block_on(stream_runs(&recording, &config))
}

async fn stream_runs(recording: &Recording, config: &StreamerConfig) -> Result<()> {
    let (interrupt_tx, interrupt_rx) = watch::channel(false);
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("aborted by user");
            interrupt_tx.send_replace(true);
        }
    });

    let mut run_number = 0u64;
    loop {
        let options = run_options(config, run_number);
        let transport = transport::connect(&config.output.target)
            .with_context(|| format!("Failed to open output {}", config.output.target))?;
        let channel = QueueChannel::spawn(config.producer.channel_config(), transport)
            .context("Failed to start delivery worker")?;

        let mut interrupted = interrupt_rx.clone();
        let shutdown = async move {
            let _ = interrupted.wait_for(|stop| *stop).await;
        };
        let summary = match publish_run(
            &options,
            recording,
            Arc::new(channel),
            Arc::new(MonotonicTimeSource::new()),
            shutdown,
        )
        .await
        {
            Ok(summary) => summary,
            Err(e @ RunError::NoValidSources { .. }) => {
                print_error("No valid data sources found in the recording, aborting");
                return Err(e.into());
            }
            Err(e) => return Err(e).context(format!("Run {run_number} failed")),
        };
        report(&summary);

        if summary.interrupted || *interrupt_rx.borrow() {
            print_warn(&format!("Run {run_number} interrupted"));
            return Ok(());
        }
        if config.playback.single_run {
            print_success(&format!("Completed streaming run {run_number}"));
            return Ok(());
        }
        print_success(&format!("Streamed run {run_number}"));
        run_number += 1;
    }
}

fn run_options(config: &StreamerConfig, run_number: u64) -> RunOptions {
    let mut options = RunOptions::new(&config.instrument.name, &config.output.broker)
        .mode(config.playback.mode)
        .poll_interval(config.playback.poll_interval())
        .run_number(run_number)
        .sink(config.producer.sink_config());
    if let Some(template) = &config.playback.json_description {
        options = options.json_description(template);
    }
    options
}

fn report(summary: &RunSummary) {
    let table = info_table(&[
        ("Run", summary.run_name.clone()),
        ("Job id", summary.job_id.clone()),
        ("Start", iso8601(summary.start_ns)),
        ("Stop", iso8601(summary.stop_ns)),
        ("Log sources", summary.log_sources.join(", ")),
        ("Event sources", summary.event_sources.join(", ")),
        ("Rejected groups", summary.rejected.len().to_string()),
        ("Messages", summary.published.to_string()),
        ("Retries", summary.retries.to_string()),
    ]);
    eprintln!("{table}");
    if summary.undelivered > 0 {
        print_warn(&format!("{} messages were not delivered", summary.undelivered));
    }
    if summary.failed_streams > 0 {
        print_warn(&format!("{} data sources ended on an error", summary.failed_streams));
    }
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;

    use super::*;

    fn args() -> StreamArgs {
        StreamArgs {
            recording: PathBuf::from("run"),
            instrument: None,
            output: None,
            broker: None,
            slow: false,
            single_run: false,
            json_description: None,
            poll_interval_ms: None,
        }
    }

    #[test]
    fn flags_override_config() {
        let mut config = StreamerConfig::default();
        config.playback.poll_interval_ms = 500;
        let args = StreamArgs {
            instrument: Some("LOKI".into()),
            output: Some("loki.jsonl".into()),
            slow: true,
            single_run: true,
            poll_interval_ms: Some(50),
            ..args()
        };
        apply_args(&args, &mut config);

        assert_eq!(config.instrument.name, "LOKI");
        assert_eq!(config.output.target, "loki.jsonl");
        assert_eq!(config.playback.mode, PacingMode::Slow);
        assert!(config.playback.single_run);
        assert_eq!(config.playback.poll_interval_ms, 50);
    }

    #[test]
    fn absent_flags_keep_config() {
        let mut config = StreamerConfig::default();
        config.instrument.name = "DREAM".into();
        apply_args(&args(), &mut config);
        assert_eq!(config.instrument.name, "DREAM");
        assert_eq!(config.playback.mode, PacingMode::Fast);
    }

    #[test]
    fn run_options_carry_topics_and_number() {
        let mut config = StreamerConfig::default();
        config.instrument.name = "LOKI".into();
        let options = run_options(&config, 3);
        assert_eq!(options.run_number, 3);
        assert_eq!(options.event_topic(), "LOKI_events");
        assert_eq!(options.sink.backoff, config.producer.sink_config().backoff);
    }
}
