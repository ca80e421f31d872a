//! Configuration loader with multi-source merging

use crate::{Paths, StreamerConfig};
use anyhow::{Context, Result};
use std::env;
use std::path::{Path, PathBuf};

/// Configuration loader with builder pattern
pub struct ConfigLoader {
    project_dir: PathBuf,
    env_prefix: String,
    extra_file: Option<PathBuf>,
    user_config: bool,
}

impl ConfigLoader {
    /// Create a new config loader with default project directory (current dir)
    pub fn new() -> Self {
        Self {
            project_dir: env::current_dir().unwrap_or_else(|_| PathBuf::from(".")),
            env_prefix: "NXS".to_string(),
            extra_file: None,
            user_config: true,
        }
    }

    /// Set the project directory
    pub fn with_project_dir(mut self, dir: impl AsRef<Path>) -> Self {
        self.project_dir = dir.as_ref().to_path_buf();
        self
    }

    /// Set the environment variable prefix (default: "NXS")
    pub fn with_env_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.env_prefix = prefix.into();
        self
    }

    /// Layer an explicitly named file over the local config.
    pub fn with_file(mut self, path: impl AsRef<Path>) -> Self {
        self.extra_file = Some(path.as_ref().to_path_buf());
        self
    }

    /// Skip ~/.config/nexus-streamer/config.toml
    pub fn without_user_config(mut self) -> Self {
        self.user_config = false;
        self
    }

    /// Load configuration from all sources with proper precedence
    pub fn load(self) -> Result<StreamerConfig> {
        let mut builder = config::Config::builder();

        // 1. Start with built-in defaults
        let defaults = StreamerConfig::default();
        builder = builder.add_source(config::Config::try_from(&defaults)?);

        // 2. User config (~/.config/nexus-streamer/config.toml)
        if self.user_config
            && let Ok(user_config_file) = Paths::new().user_config_file()
            && user_config_file.exists()
        {
            builder = builder.add_source(
                config::File::from(user_config_file)
                    .required(false)
                    .format(config::FileFormat::Toml),
            );
        }

        // 3. Project config (nexus-streamer.toml)
        let project_config_file = Paths::project_config_file(&self.project_dir);
        if project_config_file.exists() {
            builder = builder.add_source(
                config::File::from(project_config_file)
                    .required(false)
                    .format(config::FileFormat::Toml),
            );
        }

        // 4. Local config (nexus-streamer.local.toml, gitignored)
        let local_config_file = Paths::local_config_file(&self.project_dir);
        if local_config_file.exists() {
            builder = builder.add_source(
                config::File::from(local_config_file)
                    .required(false)
                    .format(config::FileFormat::Toml),
            );
        }

        // 5. File named on the command line, which must exist
        if let Some(file) = &self.extra_file {
            builder = builder.add_source(
                config::File::from(file.as_path())
                    .required(true)
                    .format(config::FileFormat::Toml),
            );
        }

        // 6. Environment variables (NXS_PLAYBACK__MODE=slow)
        builder = builder.add_source(
            config::Environment::with_prefix(&self.env_prefix)
                .prefix_separator("_")
                .separator("__")
                .try_parsing(true),
        );

        // Build and deserialize
        let config = builder.build().context("Failed to build configuration")?;

        let mut streamer_config: StreamerConfig = config
            .try_deserialize()
            .context("Failed to deserialize configuration")?;

        // Resolve relative paths
        streamer_config.resolve_paths(&self.project_dir);
        streamer_config.validate()?;

        Ok(streamer_config)
    }

    /// Load configuration or return defaults if not found
    pub fn load_or_default(self) -> StreamerConfig {
        self.load().unwrap_or_default()
    }
}

impl Default for ConfigLoader {
    fn default() -> Self {
        Self::new()
    }
}
