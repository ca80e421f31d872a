//! Tracing subscriber setup.

use std::fs::OpenOptions;
use std::sync::Mutex;

use anyhow::{Context, Result};
use nexus_streamer_config::LoggingConfig;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer, fmt};

/// Installs the global subscriber.
///
/// Logs go to stderr, since stdout may be the output target. `RUST_LOG`
/// overrides the configured level. A log file gets the same events
/// without ANSI colors.
pub fn init(config: &LoggingConfig, no_color: bool) -> Result<()> {
    let filter = match std::env::var("RUST_LOG") {
        Ok(directives) if !directives.is_empty() => EnvFilter::try_new(directives),
        _ => EnvFilter::try_new(&config.level),
    }
    .with_context(|| format!("Invalid log level {:?}", config.level))?;

    let stderr = fmt::layer()
        .with_writer(std::io::stderr)
        .with_ansi(!no_color)
        .boxed();

    let file = match &config.file {
        Some(path) => {
            let file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .with_context(|| format!("Failed to open log file {}", path.display()))?;
            Some(
                fmt::layer()
                    .with_writer(Mutex::new(file))
                    .with_ansi(false)
                    .boxed(),
            )
        }
        None => None,
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(stderr)
        .with(file)
        .try_init()
        .context("Failed to install log subscriber")?;
    Ok(())
}
