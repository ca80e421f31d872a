//! Event data sources (`NXevent_data`).
//!
//! An event group stores every detected event of a run in two long arrays,
//! `event_time_offset` and `event_id`, plus two short per-pulse arrays:
//! `event_time_zero` (pulse time) and `event_index` (offset of each pulse's
//! first event). The source turns them into one [`EventPulse`] per pulse.

use nexus_streamer_io::{ArrayGroup, BoxedArray, ChunkedArray, ChunkedSequentialReader};
use nexus_streamer_types::{EventPulse, Record, Scalar, SourceDescriptor, SourceKind};
use tracing::{debug, error};

use crate::units::{ToNanos, UnitRegistry};
use crate::{DataSource, SourceError};

pub const EVENT_TIME_ZERO: &str = "event_time_zero";
pub const EVENT_INDEX: &str = "event_index";
pub const EVENT_TIME_OFFSET: &str = "event_time_offset";
pub const EVENT_ID: &str = "event_id";

const REQUIRED_FIELDS: [&str; 4] = [EVENT_TIME_ZERO, EVENT_INDEX, EVENT_TIME_OFFSET, EVENT_ID];

/// Lazily yields the pulses of one event group.
pub struct EventPulseSource {
    descriptor: SourceDescriptor,
    /// Converted pulse times, one per pulse.
    pulse_times: Vec<i64>,
    /// `pulse_times.len() + 1` event offsets.
    boundaries: Vec<u64>,
    time_of_flight: ChunkedSequentialReader<BoxedArray<Scalar>>,
    detector_id: ChunkedSequentialReader<BoxedArray<u32>>,
    tof_to_ns: ToNanos,
    next_pulse: usize,
}

impl std::fmt::Debug for EventPulseSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventPulseSource")
            .field("descriptor", &self.descriptor)
            .field("pulses", &self.pulse_times.len())
            .field("next_pulse", &self.next_pulse)
            .finish_non_exhaustive()
    }
}

impl EventPulseSource {
    /// Validates an event group and derives its pulse boundaries.
    ///
    /// Only `event_time_zero` and `event_index` are read here; the event
    /// arrays are read chunk by chunk as pulses are produced.
    pub fn from_group<G: ArrayGroup>(group: &G, units: &UnitRegistry) -> Result<Self, SourceError> {
        let path = group.path();

        let missing: Vec<&str> = REQUIRED_FIELDS
            .into_iter()
            .filter(|field| !group.contains(field))
            .collect();
        for field in &missing {
            error!(group = path, field, "event data source is missing a required field");
        }
        if let Some(field) = missing.first() {
            return Err(SourceError::MissingField {
                group: path.to_string(),
                field: (*field).to_string(),
            });
        }

        let pulse_to_ns = resolve_units(group, EVENT_TIME_ZERO, units)?;
        let tof_to_ns = resolve_units(group, EVENT_TIME_OFFSET, units)?;

        let detector_id = group.open::<u32>(EVENT_ID)?;
        let total_events = detector_id.len();
        let raw_index = group.open::<u64>(EVENT_INDEX)?.read_to_end()?;
        let mut boundaries = reconcile_boundaries(raw_index, total_events)
            .map_err(|position| SourceError::NonMonotonicIndex {
                group: path.to_string(),
                position,
            })?;

        let mut pulse_times: Vec<i64> = group
            .open::<Scalar>(EVENT_TIME_ZERO)?
            .read_to_end()?
            .into_iter()
            .map(|t| pulse_to_ns.convert(t))
            .collect();
        let pulses = boundaries.len().saturating_sub(1).min(pulse_times.len());
        if pulses + 1 < boundaries.len() {
            debug!(
                group = path,
                pulses,
                boundaries = boundaries.len(),
                "event_time_zero is shorter than event_index, dropping trailing pulses"
            );
        }
        boundaries.truncate(pulses + 1);
        pulse_times.truncate(pulses);

        debug!(group = path, pulses, total_events, "opened event data source");
        Ok(Self {
            descriptor: SourceDescriptor::from_group_path(path, SourceKind::Event),
            pulse_times,
            boundaries,
            time_of_flight: ChunkedSequentialReader::new(group.open::<Scalar>(EVENT_TIME_OFFSET)?),
            detector_id: ChunkedSequentialReader::new(detector_id),
            tof_to_ns,
            next_pulse: 0,
        })
    }

    /// Number of pulses the source will yield in total.
    pub fn pulse_count(&self) -> usize {
        self.pulse_times.len()
    }

    /// The derived boundary table, `pulse_count() + 1` entries.
    pub fn boundaries(&self) -> &[u64] {
        &self.boundaries
    }

    /// Reads the next pulse, or `None` after the last one.
    pub fn next_pulse(&mut self) -> Result<Option<EventPulse>, SourceError> {
        let n = self.next_pulse;
        if n >= self.pulse_times.len() {
            return Ok(None);
        }
        let (start, end) = (self.boundaries[n], self.boundaries[n + 1]);
        let tof_to_ns = self.tof_to_ns;
        let time_of_flight = self
            .time_of_flight
            .fetch_range(start, end)?
            .into_iter()
            .map(|t| tof_to_ns.convert_unsigned(t))
            .collect();
        let detector_id = self.detector_id.fetch_range(start, end)?;
        self.next_pulse += 1;

        Ok(Some(EventPulse {
            pulse_timestamp_ns: self.pulse_times[n],
            time_of_flight,
            detector_id,
        }))
    }
}

impl DataSource for EventPulseSource {
    fn descriptor(&self) -> &SourceDescriptor {
        &self.descriptor
    }

    fn final_timestamp(&self) -> Option<i64> {
        self.pulse_times.last().copied()
    }

    fn next_record(&mut self) -> Result<Option<Record>, SourceError> {
        Ok(self.next_pulse()?.map(Record::Event))
    }
}

/// Resolves the unit converter for one time field of a group.
pub(crate) fn resolve_units<G: ArrayGroup>(
    group: &G,
    field: &str,
    registry: &UnitRegistry,
) -> Result<ToNanos, SourceError> {
    let units = group.units(field);
    units.and_then(|u| registry.resolve(u)).ok_or_else(|| {
        error!(
            group = group.path(),
            field,
            units = units.unwrap_or("<none>"),
            "unrecognised or missing units for time field"
        );
        SourceError::UnrecognizedUnits {
            group: group.path().to_string(),
            field: field.to_string(),
            units: units.map(str::to_string),
        }
    })
}

/// Turns a recorded `event_index` into `P + 1` pulse boundaries.
///
/// Recorders disagree on the final entry. When it is below the event count
/// it is the start of the last pulse and the count is appended. Otherwise
/// it marks the end (or past the end) and is replaced with the count.
/// Entries beyond the count are clamped to it.
///
/// Returns the position of the first decreasing entry on failure.
pub fn reconcile_boundaries(mut index: Vec<u64>, total_events: u64) -> Result<Vec<u64>, usize> {
    if let Some(position) = index.windows(2).position(|w| w[1] < w[0]) {
        return Err(position + 1);
    }
    let Some(&last) = index.last() else {
        return Ok(index);
    };
    if last < total_events {
        index.push(total_events);
    } else if let Some(last) = index.last_mut() {
        *last = total_events;
    }
    for boundary in &mut index {
        *boundary = (*boundary).min(total_events);
    }
    Ok(index)
}
