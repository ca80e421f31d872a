//! The recording manifest.
//!
//! `manifest.json` at the root of a recording directory lists every group
//! and, for each field, where its chunks live:
//!
//! ```json
//! {
//!   "version": 1,
//!   "start_time": "2019-03-01T14:35:04Z",
//!   "groups": [{
//!     "path": "/entry/events",
//!     "class": "NXevent_data",
//!     "fields": {
//!       "event_id": {
//!         "file": "arrays/0003.chunks", "dtype": "u32", "len": 4096,
//!         "compression": "lz4",
//!         "chunks": [{ "offset": 0, "stored_len": 2171, "len": 4096 }]
//!       }
//!     }
//!   }]
//! }
//! ```

use std::collections::{BTreeMap, HashSet};
use std::path::{Component, Path};

use chrono::{DateTime, NaiveDateTime, Utc};
use nexus_streamer_types::{CompressionKind, DType};
use serde::{Deserialize, Serialize};

use crate::RecordingError;

/// Manifest file name inside a recording directory.
pub const MANIFEST_FILENAME: &str = "manifest.json";

/// Current manifest format version.
pub const FORMAT_VERSION: u32 = 1;

/// Where run start time lives when the manifest does not say.
pub const DEFAULT_START_TIME_PATH: &str = "/entry/start_time";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Manifest {
    pub version: u32,
    /// Run start, ISO 8601.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start_time: Option<String>,
    /// Path of the start time inside the original file, referenced by the
    /// run structure description.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start_time_path: Option<String>,
    #[serde(default)]
    pub groups: Vec<GroupMeta>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GroupMeta {
    pub path: String,
    /// NeXus class name, e.g. `NXlog`.
    pub class: String,
    #[serde(default)]
    pub fields: BTreeMap<String, FieldMeta>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldMeta {
    /// Chunk file, relative to the recording directory.
    pub file: String,
    pub dtype: DType,
    pub len: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub units: Option<String>,
    #[serde(default)]
    pub compression: CompressionKind,
    pub chunks: Vec<ChunkMeta>,
}

/// Location of one chunk inside a field's chunk file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChunkMeta {
    pub offset: u64,
    pub stored_len: u64,
    /// Number of elements.
    pub len: u64,
}

impl Manifest {
    pub fn new() -> Self {
        Self {
            version: FORMAT_VERSION,
            start_time: None,
            start_time_path: None,
            groups: Vec::new(),
        }
    }

    pub fn from_json(path: &Path, bytes: &[u8]) -> Result<Self, RecordingError> {
        serde_json::from_slice(bytes).map_err(|source| RecordingError::ManifestParse {
            path: path.to_path_buf(),
            source,
        })
    }

    pub fn to_json(&self) -> Result<Vec<u8>, RecordingError> {
        serde_json::to_vec_pretty(self).map_err(RecordingError::ManifestSerialize)
    }

    /// Checks the manifest describes a readable recording.
    pub fn validate(&self) -> Result<(), RecordingError> {
        if self.version != FORMAT_VERSION {
            return Err(RecordingError::UnsupportedVersion {
                found: self.version,
                expected: FORMAT_VERSION,
            });
        }

        let mut seen = HashSet::new();
        for group in &self.groups {
            if !seen.insert(group.path.as_str()) {
                return Err(RecordingError::DuplicateGroup(group.path.clone()));
            }
            for (name, field) in &group.fields {
                field.validate().map_err(|reason| {
                    RecordingError::InvalidManifest(format!("{}/{name}: {reason}", group.path))
                })?;
            }
        }
        Ok(())
    }

    /// Parses `start_time` as nanoseconds since the Unix epoch.
    pub fn start_time_ns(&self) -> Result<i64, RecordingError> {
        let value = self
            .start_time
            .as_deref()
            .ok_or(RecordingError::MissingStartTime)?;
        parse_start_time(value)
    }

    pub fn start_time_path(&self) -> &str {
        self.start_time_path
            .as_deref()
            .unwrap_or(DEFAULT_START_TIME_PATH)
    }
}

impl Default for Manifest {
    fn default() -> Self {
        Self::new()
    }
}

impl FieldMeta {
    fn validate(&self) -> Result<(), String> {
        let file = Path::new(&self.file);
        if !file
            .components()
            .all(|c| matches!(c, Component::Normal(_) | Component::CurDir))
        {
            return Err(format!("chunk file {:?} escapes the recording", self.file));
        }

        let mut covered = 0u64;
        let element_size = self.dtype.size() as u64;
        for (i, chunk) in self.chunks.iter().enumerate() {
            if chunk.len == 0 {
                return Err(format!("chunk {i} is empty"));
            }
            let Some(decoded_len) = chunk.len.checked_mul(element_size) else {
                return Err(format!("chunk {i} length {} overflows", chunk.len));
            };
            if chunk.offset.checked_add(chunk.stored_len).is_none() {
                return Err(format!(
                    "chunk {i} at offset {} with {} bytes overflows",
                    chunk.offset, chunk.stored_len
                ));
            }
            if self.compression == CompressionKind::None && chunk.stored_len != decoded_len {
                return Err(format!(
                    "chunk {i} stores {} bytes for {} {} elements",
                    chunk.stored_len, chunk.len, self.dtype
                ));
            }
            covered = covered
                .checked_add(chunk.len)
                .ok_or_else(|| format!("chunks up to {i} cover more than u64::MAX elements"))?;
        }
        if covered != self.len {
            return Err(format!(
                "chunks cover {covered} elements but len is {}",
                self.len
            ));
        }
        Ok(())
    }

    /// Global index of the first element of each chunk.
    pub fn chunk_starts(&self) -> impl Iterator<Item = u64> + '_ {
        self.chunks.iter().scan(0u64, |start, chunk| {
            let this = *start;
            *start = start.saturating_add(chunk.len);
            Some(this)
        })
    }
}

/// Parses an ISO 8601 timestamp to nanoseconds since the Unix epoch.
///
/// Timestamps without an offset are taken as UTC.
pub fn parse_start_time(value: &str) -> Result<i64, RecordingError> {
    let invalid = |reason: &str| RecordingError::InvalidStartTime {
        value: value.to_string(),
        reason: reason.to_string(),
    };

    let utc = match DateTime::parse_from_rfc3339(value) {
        Ok(dt) => dt.with_timezone(&Utc),
        Err(_) => ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"]
            .iter()
            .find_map(|fmt| NaiveDateTime::parse_from_str(value, fmt).ok())
            .ok_or_else(|| invalid("not an ISO 8601 timestamp"))?
            .and_utc(),
    };
    utc.timestamp_nanos_opt()
        .ok_or_else(|| invalid("outside the representable nanosecond range"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_case::test_case;

    fn field(chunks: &[(u64, u64)], len: u64) -> FieldMeta {
        let mut offset = 0;
        let chunks = chunks
            .iter()
            .map(|&(stored_len, len)| {
                let meta = ChunkMeta {
                    offset,
                    stored_len,
                    len,
                };
                offset += stored_len;
                meta
            })
            .collect();
        FieldMeta {
            file: "arrays/0000.chunks".into(),
            dtype: DType::U32,
            len,
            units: None,
            compression: CompressionKind::None,
            chunks,
        }
    }

    fn with_field(field: FieldMeta) -> Manifest {
        let mut manifest = Manifest::new();
        manifest.groups.push(GroupMeta {
            path: "/entry/events".into(),
            class: "NXevent_data".into(),
            fields: BTreeMap::from([("event_id".to_string(), field)]),
        });
        manifest
    }

    #[test]
    fn valid_manifest_passes() {
        with_field(field(&[(12, 3), (8, 2)], 5)).validate().unwrap();
    }

    #[test]
    fn chunk_starts_accumulate() {
        let f = field(&[(12, 3), (8, 2), (4, 1)], 6);
        assert_eq!(f.chunk_starts().collect::<Vec<_>>(), vec![0, 3, 5]);
    }

    #[test]
    fn coverage_mismatch_rejected() {
        let err = with_field(field(&[(12, 3)], 5)).validate().unwrap_err();
        assert!(err.to_string().contains("/entry/events/event_id"), "{err}");
    }

    #[test]
    fn raw_stored_len_must_match_dtype() {
        let err = with_field(field(&[(10, 3)], 3)).validate().unwrap_err();
        assert!(matches!(err, RecordingError::InvalidManifest(_)));
    }

    #[test]
    fn huge_chunk_lengths_rejected() {
        let mut f = field(&[(4, u64::MAX), (8, 2)], 1);
        f.compression = CompressionKind::Lz4;
        let err = with_field(f).validate().unwrap_err();
        assert!(matches!(err, RecordingError::InvalidManifest(_)), "{err}");

        // each length fits, their sum does not
        let quarter = (4, u64::MAX / 4);
        let mut f = field(&[quarter, quarter, quarter, quarter, (4, 4)], 1);
        f.dtype = DType::U8;
        f.compression = CompressionKind::Zstd;
        let err = with_field(f).validate().unwrap_err();
        assert!(err.to_string().contains("u64::MAX"), "{err}");
    }

    #[test]
    fn huge_chunk_from_json_rejected() {
        let json = br#"{"version":1,"groups":[{"path":"/entry/t","class":"NXlog","fields":{
            "time":{"file":"arrays/t","dtype":"f64","len":2,"compression":"lz4","chunks":[
                {"offset":0,"stored_len":4,"len":18446744073709551615},
                {"offset":4,"stored_len":4,"len":2}]}}}]}"#;
        let manifest = Manifest::from_json(Path::new("manifest.json"), json).unwrap();
        assert!(matches!(
            manifest.validate(),
            Err(RecordingError::InvalidManifest(_))
        ));
    }

    #[test]
    fn chunk_end_overflow_rejected() {
        let mut f = field(&[(4, 1)], 1);
        f.chunks[0].offset = u64::MAX;
        assert!(matches!(
            with_field(f).validate(),
            Err(RecordingError::InvalidManifest(_))
        ));
    }

    #[test]
    fn escaping_file_rejected() {
        let mut f = field(&[(4, 1)], 1);
        f.file = "../outside.chunks".into();
        assert!(with_field(f).validate().is_err());
    }

    #[test]
    fn unsupported_version_rejected() {
        let mut manifest = Manifest::new();
        manifest.version = 7;
        assert!(matches!(
            manifest.validate(),
            Err(RecordingError::UnsupportedVersion {
                found: 7,
                expected: 1
            })
        ));
    }

    #[test]
    fn duplicate_group_rejected() {
        let mut manifest = with_field(field(&[(4, 1)], 1));
        manifest.groups.push(manifest.groups[0].clone());
        assert!(matches!(
            manifest.validate(),
            Err(RecordingError::DuplicateGroup(_))
        ));
    }

    #[test]
    fn defaults_fill_optional_keys() {
        let json = br#"{"version":1,"groups":[{"path":"/entry/t","class":"NXlog","fields":{
            "time":{"file":"arrays/t","dtype":"f64","len":0,"chunks":[]}}}]}"#;
        let manifest = Manifest::from_json(Path::new("manifest.json"), json).unwrap();
        let time = &manifest.groups[0].fields["time"];
        assert_eq!(time.compression, CompressionKind::None);
        assert_eq!(time.units, None);
        assert_eq!(manifest.start_time_path(), DEFAULT_START_TIME_PATH);
        assert!(matches!(
            manifest.start_time_ns(),
            Err(RecordingError::MissingStartTime)
        ));
    }

    #[test_case("1970-01-01T00:00:01Z", 1_000_000_000; "utc suffix")]
    #[test_case("1970-01-01T01:00:00+01:00", 0; "offset")]
    #[test_case("1970-01-01T00:00:00.5", 500_000_000; "naive fractional")]
    #[test_case("1970-01-01 00:00:02", 2_000_000_000; "space separator")]
    fn start_time_formats(value: &str, expected: i64) {
        assert_eq!(parse_start_time(value).unwrap(), expected);
    }

    #[test]
    fn garbage_start_time_rejected() {
        assert!(matches!(
            parse_start_time("yesterday"),
            Err(RecordingError::InvalidStartTime { .. })
        ));
    }
}
