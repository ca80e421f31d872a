//! Describe a recording.

use std::collections::HashMap;
use std::path::Path;

use anyhow::{Context, Result};
use nexus_streamer::io::ArrayGroup;
use nexus_streamer::recording::Recording;
use nexus_streamer::run::iso8601;
use nexus_streamer::source::UnitRegistry;
use nexus_streamer::types::SourceKind;
use nexus_streamer::discover_sources;

use crate::Format;
use crate::style::colors::SemanticStyle;
use crate::style::{info_table, list_table, print_hint};

pub fn run(path: &Path, format: Format) -> Result<()> {
    let recording = Recording::open(path)
        .with_context(|| format!("Failed to open recording {}", path.display()))?;

    match format {
        Format::Json => println!("{}", serde_json::to_string_pretty(recording.manifest())?),
        Format::Toml => println!("{}", toml::to_string_pretty(recording.manifest())?),
        Format::Text => print_text(&recording),
    }
    Ok(())
}

fn print_text(recording: &Recording) {
    let discovered = discover_sources(recording, &UnitRegistry::default());
    let rejected: HashMap<&str, String> = discovered
        .rejected
        .iter()
        .map(|r| (r.path.as_str(), r.error.to_string()))
        .collect();

    let start = match recording.start_time_ns() {
        Ok(ns) => iso8601(ns),
        Err(e) => format!("{} ({e})", "unavailable".error()),
    };
    let last = discovered
        .last_timestamp()
        .map_or_else(|| "-".to_string(), iso8601);
    println!(
        "{}",
        info_table(&[
            ("Recording", recording.root().display().to_string()),
            ("Run start", start),
            ("Last record", last),
            ("Log sources", discovered.logs.len().to_string()),
            ("Event sources", discovered.events.len().to_string()),
            ("Rejected", discovered.rejected.len().to_string()),
        ])
    );

    let rows: Vec<Vec<String>> = recording
        .groups()
        .map(|group| {
            let replayable = [SourceKind::Log, SourceKind::Event]
                .iter()
                .any(|kind| kind.group_class() == group.class());
            let status = match rejected.get(group.path()) {
                Some(reason) => reason.error(),
                None if replayable => "ready".success(),
                None => "-".muted(),
            };
            let fields: Vec<String> = group
                .field_names()
                .map(|name| match group.len(name) {
                    Some(len) => format!("{name}[{len}]"),
                    None => name.to_string(),
                })
                .collect();
            vec![
                group.path().to_string(),
                group.class().to_string(),
                fields.join(", "),
                status,
            ]
        })
        .collect();

    if rows.is_empty() {
        print_hint("The recording has no groups.");
        return;
    }
    println!("{}", list_table(&["Group", "Class", "Fields", "Status"], &rows));
}
