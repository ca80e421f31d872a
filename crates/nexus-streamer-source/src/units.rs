//! Time unit normalization.
//!
//! Recorded times carry a `units` attribute. Every timestamp leaving a
//! source is in nanoseconds, so each time array gets a [`ToNanos`]
//! converter resolved once, at source construction, from a
//! [`UnitRegistry`].

use std::collections::HashMap;
use std::fmt::Display;

use nexus_streamer_types::Scalar;

/// The time units recordings use.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TimeUnit {
    Seconds,
    Milliseconds,
    Microseconds,
    Nanoseconds,
}

impl TimeUnit {
    /// Nanoseconds per unit.
    pub fn nanos_per_unit(self) -> i64 {
        match self {
            TimeUnit::Seconds => 1_000_000_000,
            TimeUnit::Milliseconds => 1_000_000,
            TimeUnit::Microseconds => 1_000,
            TimeUnit::Nanoseconds => 1,
        }
    }

    pub fn converter(self) -> ToNanos {
        ToNanos {
            unit: self,
            factor: self.nanos_per_unit(),
        }
    }
}

impl Display for TimeUnit {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TimeUnit::Seconds => write!(f, "s"),
            TimeUnit::Milliseconds => write!(f, "ms"),
            TimeUnit::Microseconds => write!(f, "us"),
            TimeUnit::Nanoseconds => write!(f, "ns"),
        }
    }
}

/// Converts raw time values in one unit to nanoseconds.
///
/// Integers are scaled with saturation. Floats are scaled and then
/// truncated toward zero.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ToNanos {
    unit: TimeUnit,
    factor: i64,
}

impl ToNanos {
    pub fn unit(self) -> TimeUnit {
        self.unit
    }

    pub fn convert(self, value: Scalar) -> i64 {
        match value {
            Scalar::Int(v) => v.saturating_mul(self.factor),
            Scalar::UInt(v) => i64::try_from(v)
                .unwrap_or(i64::MAX)
                .saturating_mul(self.factor),
            Scalar::Float(v) => (v * self.factor as f64) as i64,
        }
    }

    /// Converts a duration that cannot be negative; negative values clamp to 0.
    pub fn convert_unsigned(self, value: Scalar) -> u64 {
        u64::try_from(self.convert(value)).unwrap_or(0)
    }
}

/// Maps `units` attribute strings to time units.
///
/// Lookup ignores surrounding whitespace. Build one registry and pass it by
/// reference to every source constructor.
#[derive(Debug, Clone)]
pub struct UnitRegistry {
    aliases: HashMap<String, TimeUnit>,
}

impl UnitRegistry {
    /// A registry knowing the usual spellings of the four time units.
    pub fn new() -> Self {
        let mut registry = Self {
            aliases: HashMap::new(),
        };
        for (unit, names) in [
            (TimeUnit::Seconds, &["s", "sec", "second", "seconds"][..]),
            (
                TimeUnit::Milliseconds,
                &["ms", "msec", "millisecond", "milliseconds"][..],
            ),
            (
                TimeUnit::Microseconds,
                &["us", "µs", "μs", "usec", "microsecond", "microseconds"][..],
            ),
            (
                TimeUnit::Nanoseconds,
                &["ns", "nsec", "nanosecond", "nanoseconds"][..],
            ),
        ] {
            for name in names {
                registry.aliases.insert((*name).to_string(), unit);
            }
        }
        registry
    }

    /// Adds or replaces a spelling.
    pub fn with_alias(mut self, name: impl Into<String>, unit: TimeUnit) -> Self {
        self.aliases.insert(name.into(), unit);
        self
    }

    pub fn parse(&self, units: &str) -> Option<TimeUnit> {
        self.aliases.get(units.trim()).copied()
    }

    /// Resolves the converter for a `units` attribute.
    pub fn resolve(&self, units: &str) -> Option<ToNanos> {
        self.parse(units).map(TimeUnit::converter)
    }
}

impl Default for UnitRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_case::test_case;

    #[test_case("s", 1_000_000_000; "s")]
    #[test_case("seconds", 1_000_000_000; "seconds")]
    #[test_case("ms", 1_000_000; "ms")]
    #[test_case("millisecond", 1_000_000; "millisecond")]
    #[test_case("us", 1_000; "us")]
    #[test_case("µs", 1_000; "micro sign")]
    #[test_case("microseconds", 1_000; "microseconds")]
    #[test_case("ns", 1; "ns")]
    #[test_case(" nanoseconds ", 1; "padded")]
    fn known_units_scale_by_power_of_ten(units: &str, factor: i64) {
        let to_ns = UnitRegistry::new().resolve(units).unwrap();
        assert_eq!(to_ns.convert(Scalar::Int(3)), 3 * factor);
        assert_eq!(to_ns.convert(Scalar::UInt(3)), 3 * factor);
    }

    #[test_case("K"; "temperature")]
    #[test_case(""; "empty")]
    #[test_case("minutes"; "unsupported time unit")]
    #[test_case("S"; "case sensitive")]
    fn unknown_units_unresolved(units: &str) {
        assert!(UnitRegistry::new().resolve(units).is_none());
    }

    #[test]
    fn floats_truncate_toward_zero() {
        let s = TimeUnit::Seconds.converter();
        assert_eq!(s.convert(Scalar::Float(1.5)), 1_500_000_000);
        assert_eq!(s.convert(Scalar::Float(-0.25)), -250_000_000);
        let us = TimeUnit::Microseconds.converter();
        assert_eq!(us.convert(Scalar::Float(2.0009)), 2000);
    }

    #[test]
    fn integers_saturate() {
        let s = TimeUnit::Seconds.converter();
        assert_eq!(s.convert(Scalar::Int(i64::MAX / 2)), i64::MAX);
        assert_eq!(s.convert(Scalar::Int(i64::MIN / 2)), i64::MIN);
        assert_eq!(s.convert(Scalar::UInt(u64::MAX)), i64::MAX);
    }

    #[test]
    fn unsigned_clamps_negative() {
        let ns = TimeUnit::Nanoseconds.converter();
        assert_eq!(ns.convert_unsigned(Scalar::Int(-5)), 0);
        assert_eq!(ns.convert_unsigned(Scalar::Int(5)), 5);
    }

    #[test]
    fn aliases_extend_registry() {
        let registry = UnitRegistry::new().with_alias("microsec", TimeUnit::Microseconds);
        assert_eq!(registry.parse("microsec"), Some(TimeUnit::Microseconds));
        assert_eq!(registry.resolve("microsec").unwrap().unit().to_string(), "us");
    }
}
