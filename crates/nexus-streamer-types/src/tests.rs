//! Unit tests for nexus-streamer-types.

use proptest::prelude::*;
use test_case::test_case;

use crate::{DType, EventPulse, LogSample, Record, Scalar, SourceDescriptor, SourceKind};

// ============================================================================
// SourceDescriptor
// ============================================================================

#[test_case("/entry/instrument/detector_1/events", "events"; "nested path")]
#[test_case("/entry/sample/temperature/", "temperature"; "trailing slash")]
#[test_case("chopper_speed", "chopper_speed"; "bare name")]
fn descriptor_name_is_last_segment(path: &str, expected: &str) {
    let descriptor = SourceDescriptor::from_group_path(path, SourceKind::Log);
    assert_eq!(descriptor.name(), expected);
    assert_eq!(descriptor.kind(), SourceKind::Log);
}

#[test]
fn source_kind_group_class() {
    assert_eq!(SourceKind::Log.group_class(), "NXlog");
    assert_eq!(SourceKind::Event.group_class(), "NXevent_data");
}

#[test]
fn source_kind_serializes_lowercase() {
    let json = serde_json::to_string(&SourceKind::Event).unwrap();
    assert_eq!(json, "\"event\"");
}

// ============================================================================
// Scalar
// ============================================================================

#[test]
fn scalar_conversions_saturate() {
    assert_eq!(Scalar::UInt(u64::MAX).as_i64(), i64::MAX);
    assert_eq!(Scalar::Int(-5).as_u64(), 0);
    assert_eq!(Scalar::Float(2.9).as_i64(), 2);
    assert_eq!(Scalar::Float(f64::NAN).as_i64(), 0);
    assert!(Scalar::Float(1.0).is_float());
    assert!(!Scalar::Int(1).is_float());
}

// ============================================================================
// DType
// ============================================================================

#[test_case(DType::U8, 1)]
#[test_case(DType::I16, 2)]
#[test_case(DType::F32, 4)]
#[test_case(DType::U64, 8)]
fn dtype_sizes(dtype: DType, size: usize) {
    assert_eq!(dtype.size(), size);
}

#[test]
fn dtype_decodes_little_endian() {
    assert_eq!(DType::U32.decode(&[1, 0, 0, 0]), Scalar::UInt(1));
    assert_eq!(DType::I16.decode(&[0xff, 0xff]), Scalar::Int(-1));
    assert_eq!(
        DType::F64.decode(&1.5f64.to_le_bytes()),
        Scalar::Float(1.5)
    );
}

#[test]
#[should_panic(expected = "element width mismatch")]
fn dtype_decode_rejects_wrong_width() {
    let _ = DType::U64.decode(&[0, 1, 2]);
}

#[test]
fn dtype_serde_names() {
    let json = serde_json::to_string(&DType::F32).unwrap();
    assert_eq!(json, "\"f32\"");
    let parsed: DType = serde_json::from_str("\"i64\"").unwrap();
    assert_eq!(parsed, DType::I64);
}

proptest! {
    #[test]
    fn i64_encoding_is_lossless(v in any::<i64>()) {
        let mut buf = Vec::new();
        DType::I64.encode(Scalar::Int(v), &mut buf);
        prop_assert_eq!(DType::I64.decode(&buf), Scalar::Int(v));
    }

    #[test]
    fn u32_encoding_is_lossless(v in any::<u32>()) {
        let mut buf = Vec::new();
        DType::U32.encode(Scalar::from(v), &mut buf);
        prop_assert_eq!(buf.len(), 4);
        prop_assert_eq!(DType::U32.decode(&buf), Scalar::UInt(u64::from(v)));
    }
}

// ============================================================================
// Records
// ============================================================================

#[test]
fn record_timestamp_and_kind() {
    let pulse = Record::from(EventPulse {
        pulse_timestamp_ns: 42,
        time_of_flight: vec![1, 2],
        detector_id: vec![7, 8],
    });
    assert_eq!(pulse.timestamp_ns(), 42);
    assert_eq!(pulse.kind(), SourceKind::Event);

    let sample = Record::from(LogSample {
        timestamp_ns: 7,
        value: Scalar::Float(0.5),
    });
    assert_eq!(sample.timestamp_ns(), 7);
    assert_eq!(sample.kind(), SourceKind::Log);
}
