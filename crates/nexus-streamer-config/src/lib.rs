//! Configuration management for nexus-streamer
//!
//! Provides hierarchical configuration loading from multiple sources:
//! 1. CLI arguments (highest precedence, applied by the CLI)
//! 2. Environment variables (`NXS_*` prefix, `__` between section and key)
//! 3. nexus-streamer.local.toml (gitignored, local overrides)
//! 4. nexus-streamer.toml (git-tracked, project config)
//! 5. ~/.config/nexus-streamer/config.toml (user defaults)
//! 6. Built-in defaults (lowest precedence)

use anyhow::Result;
use nexus_streamer_replay::{PacingMode, QueueChannelConfig, SinkConfig};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

mod error;
mod loader;
mod paths;

pub use error::ConfigError;
pub use loader::ConfigLoader;
pub use paths::Paths;

/// Main nexus-streamer configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StreamerConfig {
    pub instrument: InstrumentConfig,
    pub output: OutputConfig,
    pub playback: PlaybackConfig,
    pub producer: ProducerConfig,
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct InstrumentConfig {
    /// Prefix of every published topic.
    pub name: String,
}

impl Default for InstrumentConfig {
    fn default() -> Self {
        Self {
            name: "TEST".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    /// Where messages go: `-` for stdout, `tcp://host:port`, or a file path.
    pub target: String,
    /// Broker address announced in run start messages.
    pub broker: String,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            target: "-".to_string(),
            broker: "localhost:9092".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlaybackConfig {
    pub mode: PacingMode,
    pub poll_interval_ms: u64,
    /// Stream one run and exit instead of looping.
    pub single_run: bool,
    /// Run description template with topic placeholders.
    pub json_description: Option<PathBuf>,
}

impl Default for PlaybackConfig {
    fn default() -> Self {
        Self {
            mode: PacingMode::Fast,
            poll_interval_ms: 200,
            single_run: false,
            json_description: None,
        }
    }
}

impl PlaybackConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProducerConfig {
    pub queue_capacity: usize,
    pub batch_size: usize,
    pub max_message_bytes: usize,
    pub backoff_ms: u64,
    pub flush_timeout_ms: u64,
}

impl Default for ProducerConfig {
    fn default() -> Self {
        Self {
            queue_capacity: 10_000,
            batch_size: 256,
            max_message_bytes: 1_000_000_000,
            backoff_ms: 500,
            flush_timeout_ms: 2_000,
        }
    }
}

impl ProducerConfig {
    pub fn channel_config(&self) -> QueueChannelConfig {
        QueueChannelConfig {
            capacity: self.queue_capacity,
            max_message_bytes: self.max_message_bytes,
            batch_size: self.batch_size,
        }
    }

    pub fn sink_config(&self) -> SinkConfig {
        SinkConfig {
            backoff: Duration::from_millis(self.backoff_ms),
            close_grace: Duration::from_millis(self.flush_timeout_ms),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Default filter directive, overridden by `RUST_LOG`.
    pub level: String,
    /// Also write logs to this file, without colors.
    pub file: Option<PathBuf>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            file: None,
        }
    }
}

impl StreamerConfig {
    /// Load configuration from default locations
    pub fn load() -> Result<Self> {
        ConfigLoader::new().load()
    }

    /// Load configuration from specific project directory
    pub fn load_from_dir(project_dir: impl AsRef<Path>) -> Result<Self> {
        ConfigLoader::new().with_project_dir(project_dir).load()
    }

    /// Parse a single TOML file, without layering.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::ReadError {
            path: path.to_path_buf(),
            source,
        })?;
        toml::from_str(&text).map_err(|source| ConfigError::ParseError {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Render as TOML.
    pub fn to_toml(&self) -> Result<String> {
        Ok(toml::to_string_pretty(self)?)
    }

    /// Reject values no run could work with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.instrument.name.trim().is_empty() {
            return Err(ConfigError::ValidationError(
                "instrument.name must not be empty".to_string(),
            ));
        }
        if self.output.target.trim().is_empty() {
            return Err(ConfigError::ValidationError(
                "output.target must not be empty".to_string(),
            ));
        }
        if self.playback.poll_interval_ms == 0 {
            return Err(ConfigError::ValidationError(
                "playback.poll_interval_ms must be positive".to_string(),
            ));
        }
        if self.producer.queue_capacity == 0 {
            return Err(ConfigError::ValidationError(
                "producer.queue_capacity must be positive".to_string(),
            ));
        }
        Ok(())
    }

    /// Resolve relative paths to absolute
    pub fn resolve_paths(&mut self, base_dir: impl AsRef<Path>) {
        let base = base_dir.as_ref();

        if let Some(template) = &mut self.playback.json_description
            && template.is_relative()
        {
            *template = base.join(&*template);
        }

        if let Some(file) = &mut self.logging.file
            && file.is_relative()
        {
            *file = base.join(&*file);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = StreamerConfig::default();
        assert_eq!(config.instrument.name, "TEST");
        assert_eq!(config.output.target, "-");
        assert_eq!(config.playback.mode, PacingMode::Fast);
        assert_eq!(config.playback.poll_interval(), Duration::from_millis(200));
        assert!(!config.playback.single_run);
        assert_eq!(config.logging.level, "info");
        config.validate().unwrap();
    }

    #[test]
    fn test_producer_conversions() {
        let producer = ProducerConfig::default();
        let sink = producer.sink_config();
        assert_eq!(sink.backoff, Duration::from_millis(500));
        assert_eq!(sink.close_grace, Duration::from_secs(2));
        assert_eq!(producer.channel_config().capacity, 10_000);
    }

    #[test]
    fn test_validation_rejects_zero_poll() {
        let mut config = StreamerConfig::default();
        config.playback.poll_interval_ms = 0;
        assert!(matches!(
            config.validate(),
            Err(ConfigError::ValidationError(_))
        ));
    }

    #[test]
    fn test_path_resolution() {
        let mut config = StreamerConfig::default();
        config.playback.json_description = Some(PathBuf::from("structure.json"));
        config.logging.file = Some(PathBuf::from("/var/log/nxs.log"));
        config.resolve_paths("/srv/streamer");

        assert_eq!(
            config.playback.json_description,
            Some(PathBuf::from("/srv/streamer/structure.json"))
        );
        assert_eq!(config.logging.file, Some(PathBuf::from("/var/log/nxs.log")));
    }

    #[test]
    fn test_toml_round_trip() {
        let mut config = StreamerConfig::default();
        config.playback.mode = PacingMode::Slow;
        config.instrument.name = "LOKI".to_string();

        let text = config.to_toml().unwrap();
        assert!(text.contains("mode = \"slow\""));
        let parsed: StreamerConfig = toml::from_str(&text).unwrap();
        assert_eq!(parsed, config);
    }
}
