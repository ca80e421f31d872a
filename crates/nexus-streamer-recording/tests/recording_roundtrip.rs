//! Writing recordings and reading them back through the array boundary.

use nexus_streamer_io::{ArrayGroup, ChunkedArray, ChunkedSequentialReader, IoError};
use nexus_streamer_recording::{FieldSpec, Manifest, Recording, RecordingError, RecordingWriter};
use nexus_streamer_types::{CompressionKind, DType, Scalar};
use proptest::prelude::*;
use test_case::test_case;

fn compression() -> impl Strategy<Value = CompressionKind> {
    prop_oneof![
        Just(CompressionKind::None),
        Just(CompressionKind::Lz4),
        Just(CompressionKind::Zstd),
    ]
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    #[test]
    fn chunks_read_back_unchanged(
        values in prop::collection::vec(any::<u32>(), 0..300),
        chunk_len in 1usize..50,
        compression in compression(),
    ) {
        let dir = tempfile::tempdir().unwrap();
        let mut writer = RecordingWriter::create(dir.path()).unwrap();
        writer.add_group("/entry/events", "NXevent_data").unwrap();
        let spec = FieldSpec::new(DType::U32).chunk_len(chunk_len).compression(compression);
        writer.write_field("/entry/events", "event_id", &spec, values.iter().copied()).unwrap();
        let recording = writer.finish(None).unwrap();

        let group = recording.group("/entry/events").unwrap();
        let mut array = group.open::<u32>("event_id").unwrap();
        prop_assert_eq!(array.len(), values.len() as u64);

        let mut expected_start = 0u64;
        let mut rebuilt = Vec::new();
        while let Some(chunk) = array.next_chunk().unwrap() {
            prop_assert_eq!(chunk.start, expected_start);
            prop_assert!(chunk.len() <= chunk_len);
            expected_start = chunk.end();
            rebuilt.extend(chunk.data);
        }
        prop_assert_eq!(rebuilt, values);
    }
}

#[test_case(CompressionKind::None; "raw")]
#[test_case(CompressionKind::Lz4; "lz4")]
#[test_case(CompressionKind::Zstd; "zstd")]
fn float_log_with_units(compression: CompressionKind) {
    let dir = tempfile::tempdir().unwrap();
    let mut writer = RecordingWriter::create(dir.path()).unwrap();
    writer.add_group("/entry/sample/temperature", "NXlog").unwrap();
    writer
        .write_field(
            "/entry/sample/temperature",
            "time",
            &FieldSpec::new(DType::F64)
                .chunk_len(2)
                .units("s")
                .compression(compression),
            [0.0f64, 0.5, 1.0, 1.5, 2.0],
        )
        .unwrap();
    writer
        .write_field(
            "/entry/sample/temperature",
            "value",
            &FieldSpec::new(DType::F32).chunk_len(4).units("K"),
            [270.0f64, 271.5, 272.0, 273.25, 274.0],
        )
        .unwrap();
    let recording = writer.finish(Some("2019-03-01T14:35:04Z")).unwrap();

    let group = recording.group("/entry/sample/temperature").unwrap();
    assert_eq!(group.class(), "NXlog");
    assert_eq!(ArrayGroup::units(&group, "time"), Some("s"));
    assert_eq!(group.len("value"), Some(5));

    let mut reader = ChunkedSequentialReader::new(group.open::<f64>("time").unwrap());
    assert_eq!(reader.units(), Some("s"));
    assert_eq!(reader.fetch_range(1, 4).unwrap(), vec![0.5, 1.0, 1.5]);

    let mut value = group.open::<Scalar>("value").unwrap();
    assert_eq!(value.read_last().unwrap(), Some(Scalar::Float(274.0)));
    assert_eq!(value.next_chunk().unwrap().unwrap().start, 0);

    assert_eq!(recording.start_time_ns().unwrap(), 1_551_450_904_000_000_000);
}

#[test]
fn reopen_from_disk_and_query_by_class() {
    let dir = tempfile::tempdir().unwrap();
    let mut writer = RecordingWriter::create(dir.path()).unwrap();
    writer.add_group("/entry/a", "NXlog").unwrap();
    writer.add_group("/entry/b", "NXevent_data").unwrap();
    writer.add_group("/entry/c", "NXlog").unwrap();
    writer.set_start_time_path("/raw_data_1/start_time");
    drop(writer.finish(None).unwrap());

    let recording = Recording::open(dir.path()).unwrap();
    let logs: Vec<_> = recording
        .groups_by_class("NXlog")
        .iter()
        .map(|g| g.path().to_string())
        .collect();
    assert_eq!(logs, vec!["/entry/a", "/entry/c"]);
    assert_eq!(recording.manifest().start_time_path(), "/raw_data_1/start_time");
    assert!(matches!(
        recording.group("/entry/d"),
        Err(RecordingError::UnknownGroup(_))
    ));
}

#[test]
fn missing_field_is_reported_by_name() {
    let dir = tempfile::tempdir().unwrap();
    let mut writer = RecordingWriter::create(dir.path()).unwrap();
    writer.add_group("/entry/events", "NXevent_data").unwrap();
    let recording = writer.finish(None).unwrap();

    let group = recording.group("/entry/events").unwrap();
    assert!(!group.contains("event_id"));
    let err = group.open::<u32>("event_id").err().expect("no such field");
    assert!(matches!(err, IoError::MissingField { field, .. } if field == "event_id"));
}

#[test]
fn truncated_chunk_file_fails_on_open() {
    let dir = tempfile::tempdir().unwrap();
    let mut writer = RecordingWriter::create(dir.path()).unwrap();
    writer.add_group("/entry/events", "NXevent_data").unwrap();
    writer
        .write_field(
            "/entry/events",
            "event_id",
            &FieldSpec::new(DType::U64).chunk_len(8),
            0u64..16,
        )
        .unwrap();
    let recording = writer.finish(None).unwrap();

    let file = &recording.manifest().groups[0].fields["event_id"].file;
    let path = dir.path().join(file);
    let bytes = std::fs::read(&path).unwrap();
    std::fs::write(&path, &bytes[..bytes.len() - 4]).unwrap();

    let err = recording
        .group("/entry/events")
        .unwrap()
        .open::<u64>("event_id")
        .err()
        .expect("second chunk runs past the end of the file");
    assert!(
        matches!(&err, IoError::CorruptChunk { reason, .. } if reason.starts_with("chunk 1 ")),
        "{err}"
    );
}

/// Writes a two-chunk lz4 log field and returns the recording directory.
fn lz4_log() -> tempfile::TempDir {
    let dir = tempfile::tempdir().unwrap();
    let mut writer = RecordingWriter::create(dir.path()).unwrap();
    writer.add_group("/entry/sample/pressure", "NXlog").unwrap();
    writer
        .write_field(
            "/entry/sample/pressure",
            "time",
            &FieldSpec::new(DType::F64)
                .chunk_len(2)
                .units("s")
                .compression(CompressionKind::Lz4),
            [0.0f64, 1.0, 2.0, 3.0],
        )
        .unwrap();
    drop(writer.finish(None).unwrap());
    dir
}

fn rewrite_manifest(dir: &std::path::Path, edit: impl FnOnce(&mut Manifest)) {
    let path = dir.join("manifest.json");
    let mut manifest = Manifest::from_json(&path, &std::fs::read(&path).unwrap()).unwrap();
    edit(&mut manifest);
    std::fs::write(&path, manifest.to_json().unwrap()).unwrap();
}

#[test]
fn oversized_compressed_chunk_rejected_at_open() {
    let dir = lz4_log();
    rewrite_manifest(dir.path(), |manifest| {
        let time = manifest.groups[0].fields.get_mut("time").unwrap();
        time.chunks[1].stored_len = 1 << 40;
    });

    // compressed chunks carry no size the manifest alone can check
    let recording = Recording::open(dir.path()).unwrap();
    let group = recording.group("/entry/sample/pressure").unwrap();
    let err = group.open::<f64>("time").err().expect("chunk exceeds file");
    assert!(matches!(err, IoError::CorruptChunk { .. }), "{err}");
}

#[test]
fn lz4_size_prefix_must_match_chunk_length() {
    let dir = lz4_log();
    let recording = Recording::open(dir.path()).unwrap();
    let time = &recording.manifest().groups[0].fields["time"];
    let path = dir.path().join(&time.file);
    let second = time.chunks[1].offset as usize;
    let mut bytes = std::fs::read(&path).unwrap();
    bytes[second..second + 4].copy_from_slice(&u32::MAX.to_le_bytes());
    std::fs::write(&path, bytes).unwrap();

    let mut array = recording
        .group("/entry/sample/pressure")
        .unwrap()
        .open::<f64>("time")
        .unwrap();
    assert_eq!(array.next_chunk().unwrap().unwrap().data, vec![0.0, 1.0]);
    assert!(matches!(array.next_chunk(), Err(IoError::CorruptChunk { .. })));
    assert!(matches!(array.read_last(), Err(IoError::CorruptChunk { .. })));
}

#[test]
fn writer_rejects_bad_input() {
    let dir = tempfile::tempdir().unwrap();
    let mut writer = RecordingWriter::create(dir.path()).unwrap();
    writer.add_group("/entry/a", "NXlog").unwrap();
    assert!(matches!(
        writer.add_group("/entry/a", "NXlog"),
        Err(RecordingError::DuplicateGroup(_))
    ));
    assert!(matches!(
        writer.write_field("/entry/z", "time", &FieldSpec::new(DType::F64), [1.0f64]),
        Err(RecordingError::UnknownGroup(_))
    ));
    assert!(
        writer
            .write_field("/entry/a", "time", &FieldSpec::new(DType::F64).chunk_len(0), [1.0f64])
            .is_err()
    );
    assert!(matches!(
        writer.finish(Some("not a time")),
        Err(RecordingError::InvalidStartTime { .. })
    ));
}
