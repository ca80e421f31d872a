//! Log data sources (`NXlog`).

use nexus_streamer_io::{ArrayGroup, BoxedArray, ChunkedArray, ChunkedSequentialReader};
use nexus_streamer_types::{LogSample, Record, Scalar, SourceDescriptor, SourceKind};
use tracing::{debug, error};

use crate::event::resolve_units;
use crate::units::{ToNanos, UnitRegistry};
use crate::{DataSource, SourceError};

pub const VALUE: &str = "value";
pub const TIME: &str = "time";

/// Lazily yields the samples of one log group, pairing `time[i]` with
/// `value[i]`.
pub struct LogSampleSource {
    descriptor: SourceDescriptor,
    values: ChunkedSequentialReader<BoxedArray<Scalar>>,
    times: ChunkedSequentialReader<BoxedArray<Scalar>>,
    time_to_ns: ToNanos,
    final_timestamp: Option<i64>,
    next_index: u64,
    finished: bool,
}

impl std::fmt::Debug for LogSampleSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LogSampleSource")
            .field("descriptor", &self.descriptor)
            .field("next_index", &self.next_index)
            .field("finished", &self.finished)
            .finish_non_exhaustive()
    }
}

impl LogSampleSource {
    pub fn from_group<G: ArrayGroup>(group: &G, units: &UnitRegistry) -> Result<Self, SourceError> {
        let path = group.path();
        for field in [VALUE, TIME] {
            if !group.contains(field) {
                error!(group = path, field, "log data source is missing a required field");
                return Err(SourceError::MissingField {
                    group: path.to_string(),
                    field: field.to_string(),
                });
            }
        }
        let time_to_ns = resolve_units(group, TIME, units)?;

        let values = group.open::<Scalar>(VALUE)?;
        let times = group.open::<Scalar>(TIME)?;
        for (field, len) in [(VALUE, values.len()), (TIME, times.len())] {
            if len == 0 {
                error!(group = path, field, "log data source has no data");
                return Err(SourceError::EmptySource {
                    group: path.to_string(),
                    field: field.to_string(),
                });
            }
        }
        if values.len() != times.len() {
            debug!(
                group = path,
                values = values.len(),
                times = times.len(),
                "value and time lengths differ, stopping at the shorter"
            );
        }

        // Separate handle so the sequential readers start untouched. Playback
        // stops at the shorter array, so the last paired time ends the source.
        let mut last_time = group.open::<Scalar>(TIME)?;
        let final_time = if values.len() < times.len() {
            ChunkedSequentialReader::new(last_time).fetch_one(values.len() - 1)?
        } else {
            last_time.read_last()?
        };
        let final_timestamp = final_time.map(|t| time_to_ns.convert(t));

        Ok(Self {
            descriptor: SourceDescriptor::from_group_path(path, SourceKind::Log),
            values: ChunkedSequentialReader::new(values),
            times: ChunkedSequentialReader::new(times),
            time_to_ns,
            final_timestamp,
            next_index: 0,
            finished: false,
        })
    }

    /// Reads the next sample, or `None` once either array runs out.
    pub fn next_sample(&mut self) -> Result<Option<LogSample>, SourceError> {
        if self.finished {
            return Ok(None);
        }
        let i = self.next_index;
        let (Some(time), Some(value)) = (self.times.fetch_one(i)?, self.values.fetch_one(i)?)
        else {
            self.finished = true;
            return Ok(None);
        };
        self.next_index += 1;
        Ok(Some(LogSample {
            timestamp_ns: self.time_to_ns.convert(time),
            value,
        }))
    }
}

impl DataSource for LogSampleSource {
    fn descriptor(&self) -> &SourceDescriptor {
        &self.descriptor
    }

    fn final_timestamp(&self) -> Option<i64> {
        self.final_timestamp
    }

    fn next_record(&mut self) -> Result<Option<Record>, SourceError> {
        Ok(self.next_sample()?.map(Record::Log))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use nexus_streamer_io::MemoryGroup;

    fn temperature() -> MemoryGroup {
        MemoryGroup::new("/entry/sample/temperature")
            .with_timed_field(TIME, [0i64, 250, 500, 750], 3, "ms")
            .with_field(VALUE, [20.5f64, 20.75, 21.0, 21.5], 2)
    }

    #[test]
    fn pairs_time_and_value() {
        let mut source = LogSampleSource::from_group(&temperature(), &UnitRegistry::new()).unwrap();
        assert_eq!(source.name(), "temperature");
        assert_eq!(source.kind(), SourceKind::Log);
        assert_eq!(source.final_timestamp(), Some(750_000_000));

        let mut samples = Vec::new();
        while let Some(sample) = source.next_sample().unwrap() {
            samples.push(sample);
        }
        assert_eq!(samples.len(), 4);
        assert_eq!(samples[1].timestamp_ns, 250_000_000);
        assert_eq!(samples[1].value, Scalar::Float(20.75));
        assert!(source.next_record().unwrap().is_none());
    }

    #[test]
    fn integer_values_pass_through() {
        let group = MemoryGroup::new("/entry/selog/counter")
            .with_timed_field(TIME, [1.0f64], 1, "s")
            .with_field(VALUE, [-3i64], 1);
        let mut source = LogSampleSource::from_group(&group, &UnitRegistry::new()).unwrap();
        let sample = source.next_sample().unwrap().unwrap();
        assert_eq!(sample.value, Scalar::Int(-3));
        assert_eq!(sample.timestamp_ns, 1_000_000_000);
    }

    #[test]
    fn shorter_array_ends_the_stream() {
        let group = MemoryGroup::new("/entry/x")
            .with_timed_field(TIME, [1u64, 2, 3], 2, "ns")
            .with_field(VALUE, [7u64, 8], 2);
        let mut source = LogSampleSource::from_group(&group, &UnitRegistry::new()).unwrap();
        assert!(source.next_sample().unwrap().is_some());
        assert!(source.next_sample().unwrap().is_some());
        assert!(source.next_sample().unwrap().is_none());
        assert!(source.next_sample().unwrap().is_none());
    }

    #[test]
    fn final_timestamp_is_last_paired_sample() {
        let group = MemoryGroup::new("/entry/x")
            .with_timed_field(TIME, [1u64, 2, 3, 4, 5], 2, "ms")
            .with_field(VALUE, [7u64, 8], 2);
        let mut source = LogSampleSource::from_group(&group, &UnitRegistry::new()).unwrap();
        assert_eq!(source.final_timestamp(), Some(2_000_000));

        let mut last = None;
        while let Some(sample) = source.next_sample().unwrap() {
            last = Some(sample.timestamp_ns);
        }
        assert_eq!(last, source.final_timestamp());
    }

    #[test]
    fn final_timestamp_with_extra_values() {
        let group = MemoryGroup::new("/entry/x")
            .with_timed_field(TIME, [1u64, 2], 1, "ms")
            .with_field(VALUE, [7u64, 8, 9], 1);
        let source = LogSampleSource::from_group(&group, &UnitRegistry::new()).unwrap();
        assert_eq!(source.final_timestamp(), Some(2_000_000));
    }

    #[test]
    fn missing_value_rejected() {
        let mut group = temperature();
        group.remove_field(VALUE);
        assert!(matches!(
            LogSampleSource::from_group(&group, &UnitRegistry::new()),
            Err(SourceError::MissingField { field, .. }) if field == VALUE
        ));
    }

    #[test]
    fn empty_time_rejected() {
        let group = MemoryGroup::new("/entry/empty")
            .with_timed_field(TIME, Vec::<f64>::new(), 1, "s")
            .with_field(VALUE, [1.0f64], 1);
        assert!(matches!(
            LogSampleSource::from_group(&group, &UnitRegistry::new()),
            Err(SourceError::EmptySource { field, .. }) if field == TIME
        ));
    }

    #[test]
    fn non_time_units_rejected() {
        let group = MemoryGroup::new("/entry/t")
            .with_timed_field(TIME, [1.0f64], 1, "K")
            .with_field(VALUE, [1.0f64], 1);
        assert!(matches!(
            LogSampleSource::from_group(&group, &UnitRegistry::new()),
            Err(SourceError::UnrecognizedUnits { .. })
        ));
    }
}
