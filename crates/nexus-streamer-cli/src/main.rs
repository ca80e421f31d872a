//! nexus-streamer command line.
//!
//! Replays a recorded instrument run onto a message bus as if it were live.
//!
//! # Quick Start
//!
//! ```bash
//! # Look at what a recording contains
//! nexus-streamer inspect runs/loki_0042
//!
//! # Replay it once, at the recorded pace, to a file
//! nexus-streamer stream runs/loki_0042 --instrument LOKI --slow --single-run -o loki.jsonl
//! ```

mod commands;
mod logging;
mod style;

use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand, ValueEnum};
use clap_complete::Shell;
use nexus_streamer_config::{ConfigLoader, StreamerConfig};

/// nexus-streamer - replay recorded neutron instrument data as a live stream.
#[derive(Parser)]
#[command(name = "nexus-streamer")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Extra TOML config file, layered over the project config.
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Log filter, e.g. `debug` or `nexus_streamer=trace`. `RUST_LOG` wins.
    #[arg(long, global = true)]
    log_level: Option<String>,

    /// Also write logs to this file.
    #[arg(long, global = true)]
    log_file: Option<PathBuf>,

    /// Disable colored output.
    #[arg(long, global = true)]
    no_color: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Replay a recording onto the output target.
    Stream(StreamArgs),

    /// Show the groups of a recording and whether each can be replayed.
    Inspect {
        /// Recording directory.
        recording: PathBuf,

        /// Output format.
        #[arg(short, long, value_enum, default_value_t = Format::Text)]
        format: Format,
    },

    /// Show the effective configuration.
    Config {
        /// Output format.
        #[arg(short, long, value_enum, default_value_t = Format::Text)]
        format: Format,
    },

    /// Generate shell completions.
    Completions {
        shell: Shell,
    },

    /// Show version information.
    Version,
}

#[derive(clap::Args)]
pub struct StreamArgs {
    /// Recording directory.
    pub recording: PathBuf,

    /// Instrument name, used as the topic prefix.
    #[arg(short, long)]
    pub instrument: Option<String>,

    /// Output target: `-` for stdout, `tcp://host:port`, or a file path.
    #[arg(short, long)]
    pub output: Option<String>,

    /// Broker address written into run start messages.
    #[arg(short, long)]
    pub broker: Option<String>,

    /// Replay at the recorded pace instead of as fast as possible.
    #[arg(short, long)]
    pub slow: bool,

    /// Stream one run and exit instead of repeating.
    #[arg(short = 'z', long)]
    pub single_run: bool,

    /// Run description template; `SAMPLE_ENV_TOPIC` and `EVENT_DATA_TOPIC`
    /// are replaced by the run's topics.
    #[arg(short, long)]
    pub json_description: Option<PathBuf>,

    /// Milliseconds between scheduler wake-ups.
    #[arg(long)]
    pub poll_interval_ms: Option<u64>,
}

#[derive(Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Format {
    Text,
    Json,
    Toml,
}

fn load_config(cli: &Cli) -> Result<StreamerConfig> {
    let mut loader = ConfigLoader::new();
    if let Some(file) = &cli.config {
        loader = loader.with_file(file);
    }
    let mut config = loader.load()?;
    if let Some(level) = &cli.log_level {
        config.logging.level.clone_from(level);
    }
    if let Some(file) = &cli.log_file {
        config.logging.file = Some(file.clone());
    }
    Ok(config)
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    style::set_no_color(cli.no_color);

    // These two need neither configuration nor logging.
    if matches!(cli.command, Commands::Version) {
        commands::version::run();
        return Ok(());
    }
    if let Commands::Completions { shell } = cli.command {
        commands::completions::run::<Cli>(shell);
        return Ok(());
    }

    let config = load_config(&cli)?;
    logging::init(&config.logging, cli.no_color)?;

    match cli.command {
        Commands::Stream(args) => commands::stream::run(&args, config),
        Commands::Inspect { recording, format } => commands::inspect::run(&recording, format),
        Commands::Config { format } => commands::config::show(&config, format),
        Commands::Version | Commands::Completions { .. } => Ok(()),
    }
}
