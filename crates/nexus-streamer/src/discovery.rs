//! Finding the replayable groups of a recording.

use nexus_streamer_io::ArrayGroup;
use nexus_streamer_recording::Recording;
use nexus_streamer_source::{
    DataSource, EventPulseSource, LogSampleSource, SourceError, UnitRegistry,
};
use nexus_streamer_types::SourceKind;
use tracing::{debug, warn};

/// A group that could not be turned into a source.
#[derive(Debug)]
pub struct Rejection {
    pub path: String,
    pub kind: SourceKind,
    pub error: SourceError,
}

/// Every source of a recording, plus the groups that were skipped.
#[derive(Debug, Default)]
pub struct DiscoveredSources {
    pub logs: Vec<LogSampleSource>,
    pub events: Vec<EventPulseSource>,
    pub rejected: Vec<Rejection>,
}

impl DiscoveredSources {
    pub fn is_empty(&self) -> bool {
        self.logs.is_empty() && self.events.is_empty()
    }

    pub fn source_count(&self) -> usize {
        self.logs.len() + self.events.len()
    }

    /// Latest final timestamp over all sources.
    pub fn last_timestamp(&self) -> Option<i64> {
        let logs = self.logs.iter().map(DataSource::final_timestamp);
        let events = self.events.iter().map(DataSource::final_timestamp);
        logs.chain(events).flatten().max()
    }
}

/// Builds a log source for every `NXlog` group and an event source for
/// every `NXevent_data` group. A group that fails validation is logged and
/// skipped; it never prevents the other groups from streaming.
pub fn discover_sources(recording: &Recording, units: &UnitRegistry) -> DiscoveredSources {
    let mut found = DiscoveredSources::default();

    for group in recording.groups_by_class(SourceKind::Log.group_class()) {
        match LogSampleSource::from_group(&group, units) {
            Ok(source) => found.logs.push(source),
            Err(error) => found.rejected.push(reject(group.path(), SourceKind::Log, error)),
        }
    }
    for group in recording.groups_by_class(SourceKind::Event.group_class()) {
        match EventPulseSource::from_group(&group, units) {
            Ok(source) => found.events.push(source),
            Err(error) => found.rejected.push(reject(group.path(), SourceKind::Event, error)),
        }
    }

    debug!(
        logs = found.logs.len(),
        events = found.events.len(),
        rejected = found.rejected.len(),
        "discovered data sources"
    );
    found
}

fn reject(path: &str, kind: SourceKind, error: SourceError) -> Rejection {
    warn!(group = path, %kind, %error, "skipping data source");
    Rejection {
        path: path.to_string(),
        kind,
        error,
    }
}
