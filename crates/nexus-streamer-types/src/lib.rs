//! # nexus-streamer-types: Core types for the NeXus streamer
//!
//! This crate contains shared types used across the streamer:
//! - Source identity ([`SourceKind`], [`SourceDescriptor`])
//! - Opaque numeric values ([`Scalar`]) and their stored layout ([`DType`])
//! - Chunk compression ([`CompressionKind`])
//! - Replayed records ([`EventPulse`], [`LogSample`], [`Record`])
//!
//! All timestamps carried by records are nanoseconds since the Unix epoch,
//! as recorded. Rebasing into live time happens in the replay layer.

use std::fmt::{Debug, Display};

use serde::{Deserialize, Serialize};

// ============================================================================
// Source identity
// ============================================================================

/// The kind of data a source produces.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceKind {
    /// Slow-control values sampled over time (`NXlog`).
    Log,
    /// Detection events grouped by pulse (`NXevent_data`).
    Event,
}

impl SourceKind {
    /// Returns the group class this kind is discovered from.
    pub fn group_class(self) -> &'static str {
        match self {
            SourceKind::Log => "NXlog",
            SourceKind::Event => "NXevent_data",
        }
    }
}

impl Display for SourceKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SourceKind::Log => write!(f, "log"),
            SourceKind::Event => write!(f, "event"),
        }
    }
}

/// Identity of a data source, used to attribute outbound records.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SourceDescriptor {
    name: String,
    kind: SourceKind,
}

impl SourceDescriptor {
    /// Creates a descriptor from a group path such as `/entry/monitor_1/events`.
    ///
    /// The source name is the final path segment.
    ///
    /// # Examples
    ///
    /// ```
    /// # use nexus_streamer_types::{SourceDescriptor, SourceKind};
    /// let d = SourceDescriptor::from_group_path("/entry/instrument/detector_1/events", SourceKind::Event);
    /// assert_eq!(d.name(), "events");
    /// ```
    pub fn from_group_path(path: &str, kind: SourceKind) -> Self {
        let name = path
            .trim_end_matches('/')
            .rsplit('/')
            .next()
            .unwrap_or_default()
            .to_string();
        Self { name, kind }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn kind(&self) -> SourceKind {
        self.kind
    }
}

impl Display for SourceDescriptor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} ({})", self.name, self.kind)
    }
}

// ============================================================================
// Scalar values - Copy (opaque numeric passthrough)
// ============================================================================

/// A single numeric value read from a recorded array.
///
/// Log values are forwarded without interpretation, so the integer or
/// floating point nature of the stored dtype is preserved.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum Scalar {
    Int(i64),
    UInt(u64),
    Float(f64),
}

impl Scalar {
    /// Converts to `i64`, saturating out-of-range values and truncating floats.
    pub fn as_i64(self) -> i64 {
        match self {
            Scalar::Int(v) => v,
            Scalar::UInt(v) => i64::try_from(v).unwrap_or(i64::MAX),
            // `as` saturates and maps NaN to zero
            Scalar::Float(v) => v as i64,
        }
    }

    /// Converts to `u64`, clamping negative values to zero.
    pub fn as_u64(self) -> u64 {
        match self {
            Scalar::Int(v) => u64::try_from(v).unwrap_or(0),
            Scalar::UInt(v) => v,
            Scalar::Float(v) => v as u64,
        }
    }

    pub fn as_f64(self) -> f64 {
        match self {
            Scalar::Int(v) => v as f64,
            Scalar::UInt(v) => v as f64,
            Scalar::Float(v) => v,
        }
    }

    /// Returns true for floating point values.
    pub fn is_float(self) -> bool {
        matches!(self, Scalar::Float(_))
    }
}

impl Default for Scalar {
    fn default() -> Self {
        Scalar::Int(0)
    }
}

impl Display for Scalar {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Scalar::Int(v) => write!(f, "{v}"),
            Scalar::UInt(v) => write!(f, "{v}"),
            Scalar::Float(v) => write!(f, "{v}"),
        }
    }
}

impl From<i64> for Scalar {
    fn from(value: i64) -> Self {
        Scalar::Int(value)
    }
}

impl From<u64> for Scalar {
    fn from(value: u64) -> Self {
        Scalar::UInt(value)
    }
}

impl From<u32> for Scalar {
    fn from(value: u32) -> Self {
        Scalar::UInt(u64::from(value))
    }
}

impl From<f64> for Scalar {
    fn from(value: f64) -> Self {
        Scalar::Float(value)
    }
}

// ============================================================================
// Stored element layout
// ============================================================================

/// Element type of a stored array. Values are little-endian on disk.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DType {
    U8,
    U16,
    U32,
    U64,
    I8,
    I16,
    I32,
    I64,
    F32,
    F64,
}

impl DType {
    /// Size of one element in bytes.
    pub fn size(self) -> usize {
        match self {
            DType::U8 | DType::I8 => 1,
            DType::U16 | DType::I16 => 2,
            DType::U32 | DType::I32 | DType::F32 => 4,
            DType::U64 | DType::I64 | DType::F64 => 8,
        }
    }

    /// Decodes one little-endian element.
    ///
    /// # Panics
    ///
    /// Panics if `bytes.len() != self.size()`.
    pub fn decode(self, bytes: &[u8]) -> Scalar {
        assert_eq!(bytes.len(), self.size(), "element width mismatch for {self}");
        // Lengths are checked above, so the array conversions cannot fail.
        match self {
            DType::U8 => Scalar::UInt(u64::from(bytes[0])),
            DType::I8 => Scalar::Int(i64::from(bytes[0] as i8)),
            DType::U16 => Scalar::UInt(u64::from(u16::from_le_bytes([bytes[0], bytes[1]]))),
            DType::I16 => Scalar::Int(i64::from(i16::from_le_bytes([bytes[0], bytes[1]]))),
            DType::U32 => Scalar::UInt(u64::from(u32::from_le_bytes(le4(bytes)))),
            DType::I32 => Scalar::Int(i64::from(i32::from_le_bytes(le4(bytes)))),
            DType::F32 => Scalar::Float(f64::from(f32::from_le_bytes(le4(bytes)))),
            DType::U64 => Scalar::UInt(u64::from_le_bytes(le8(bytes))),
            DType::I64 => Scalar::Int(i64::from_le_bytes(le8(bytes))),
            DType::F64 => Scalar::Float(f64::from_le_bytes(le8(bytes))),
        }
    }

    /// Appends one value encoded as this dtype, narrowing with `as` semantics.
    pub fn encode(self, value: Scalar, out: &mut Vec<u8>) {
        match self {
            DType::U8 => out.push(value.as_u64() as u8),
            DType::I8 => out.push(value.as_i64() as i8 as u8),
            DType::U16 => out.extend_from_slice(&(value.as_u64() as u16).to_le_bytes()),
            DType::I16 => out.extend_from_slice(&(value.as_i64() as i16).to_le_bytes()),
            DType::U32 => out.extend_from_slice(&(value.as_u64() as u32).to_le_bytes()),
            DType::I32 => out.extend_from_slice(&(value.as_i64() as i32).to_le_bytes()),
            DType::F32 => out.extend_from_slice(&(value.as_f64() as f32).to_le_bytes()),
            DType::U64 => out.extend_from_slice(&value.as_u64().to_le_bytes()),
            DType::I64 => out.extend_from_slice(&value.as_i64().to_le_bytes()),
            DType::F64 => out.extend_from_slice(&value.as_f64().to_le_bytes()),
        }
    }

    /// Returns true for floating point dtypes.
    pub fn is_float(self) -> bool {
        matches!(self, DType::F32 | DType::F64)
    }
}

fn le4(bytes: &[u8]) -> [u8; 4] {
    [bytes[0], bytes[1], bytes[2], bytes[3]]
}

fn le8(bytes: &[u8]) -> [u8; 8] {
    [
        bytes[0], bytes[1], bytes[2], bytes[3], bytes[4], bytes[5], bytes[6], bytes[7],
    ]
}

impl Display for DType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            DType::U8 => "u8",
            DType::U16 => "u16",
            DType::U32 => "u32",
            DType::U64 => "u64",
            DType::I8 => "i8",
            DType::I16 => "i16",
            DType::I32 => "i32",
            DType::I64 => "i64",
            DType::F32 => "f32",
            DType::F64 => "f64",
        };
        write!(f, "{name}")
    }
}

// ============================================================================
// Chunk compression
// ============================================================================

/// Compression applied to a stored chunk.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CompressionKind {
    /// No compression (default).
    #[default]
    None,
    /// LZ4 compression (fast, moderate ratio).
    Lz4,
    /// Zstandard compression (slower, better ratio).
    Zstd,
}

impl Display for CompressionKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::None => write!(f, "none"),
            Self::Lz4 => write!(f, "lz4"),
            Self::Zstd => write!(f, "zstd"),
        }
    }
}

// ============================================================================
// Records
// ============================================================================

/// All events detected during one pulse.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EventPulse {
    /// Pulse origin time in nanoseconds since the Unix epoch.
    pub pulse_timestamp_ns: i64,
    /// Per-event time of flight relative to the pulse, in nanoseconds.
    pub time_of_flight: Vec<u64>,
    /// Per-event detector pixel id.
    pub detector_id: Vec<u32>,
}

impl EventPulse {
    /// Number of events in the pulse.
    pub fn event_count(&self) -> usize {
        self.detector_id.len()
    }
}

/// One sampled log value.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LogSample {
    /// Sample time in nanoseconds since the Unix epoch.
    pub timestamp_ns: i64,
    pub value: Scalar,
}

/// A record produced by a data source.
#[derive(Debug, Clone, PartialEq)]
pub enum Record {
    Event(EventPulse),
    Log(LogSample),
}

impl Record {
    /// The record's recorded timestamp in nanoseconds.
    pub fn timestamp_ns(&self) -> i64 {
        match self {
            Record::Event(pulse) => pulse.pulse_timestamp_ns,
            Record::Log(sample) => sample.timestamp_ns,
        }
    }

    pub fn kind(&self) -> SourceKind {
        match self {
            Record::Event(_) => SourceKind::Event,
            Record::Log(_) => SourceKind::Log,
        }
    }
}

impl From<EventPulse> for Record {
    fn from(pulse: EventPulse) -> Self {
        Record::Event(pulse)
    }
}

impl From<LogSample> for Record {
    fn from(sample: LogSample) -> Self {
        Record::Log(sample)
    }
}

#[cfg(test)]
mod tests;
