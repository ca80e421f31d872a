//! Show the effective configuration.

use anyhow::Result;
use nexus_streamer_config::StreamerConfig;

use crate::Format;
use crate::style::colors::SemanticStyle;

pub fn show(config: &StreamerConfig, format: Format) -> Result<()> {
    match format {
        Format::Json => println!("{}", serde_json::to_string_pretty(config)?),
        Format::Toml => println!("{}", config.to_toml()?),
        Format::Text => {
            let optional = |path: &Option<std::path::PathBuf>| {
                path.as_ref()
                    .map_or_else(|| "-".to_string(), |p| p.display().to_string())
            };

            println!("{}", "Instrument".header());
            println!("  Name: {}", config.instrument.name);
            println!();

            println!("{}", "Output".header());
            println!("  Target: {}", config.output.target);
            println!("  Broker: {}", config.output.broker);
            println!();

            println!("{}", "Playback".header());
            println!("  Mode: {}", config.playback.mode);
            println!("  Poll interval: {} ms", config.playback.poll_interval_ms);
            println!("  Single run: {}", config.playback.single_run);
            println!(
                "  JSON description: {}",
                optional(&config.playback.json_description)
            );
            println!();

            println!("{}", "Producer".header());
            println!("  Queue capacity: {}", config.producer.queue_capacity);
            println!("  Batch size: {}", config.producer.batch_size);
            println!("  Max message bytes: {}", config.producer.max_message_bytes);
            println!("  Backoff: {} ms", config.producer.backoff_ms);
            println!("  Flush timeout: {} ms", config.producer.flush_timeout_ms);
            println!();

            println!("{}", "Logging".header());
            println!("  Level: {}", config.logging.level);
            println!("  File: {}", optional(&config.logging.file));
        }
    }
    Ok(())
}
