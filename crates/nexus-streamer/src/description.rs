//! The run structure description sent with the run start message.
//!
//! File writers receiving the run start need to know what file to write and
//! which topics feed which groups. The description is either a JSON
//! template supplied by the user, with topic placeholders filled in, or is
//! generated from the recording's groups.

use std::collections::BTreeMap;
use std::path::Path;

use nexus_streamer_io::ArrayGroup;
use nexus_streamer_recording::{RecordedGroup, Recording};
use nexus_streamer_types::{SourceDescriptor, SourceKind};
use serde_json::{Value, json};

use crate::RunError;

/// Placeholder replaced by the log data topic in templates.
pub const SAMPLE_ENV_PLACEHOLDER: &str = "SAMPLE_ENV_TOPIC";
/// Placeholder replaced by the event data topic in templates.
pub const EVENT_DATA_PLACEHOLDER: &str = "EVENT_DATA_TOPIC";

/// Reads a template and substitutes the topic placeholders.
pub fn from_template(path: &Path, log_topic: &str, event_topic: &str) -> Result<String, RunError> {
    let template = std::fs::read_to_string(path).map_err(|source| RunError::Description {
        path: path.to_path_buf(),
        source,
    })?;
    Ok(fill_placeholders(&template, log_topic, event_topic))
}

pub fn fill_placeholders(template: &str, log_topic: &str, event_topic: &str) -> String {
    template
        .replace(SAMPLE_ENV_PLACEHOLDER, log_topic)
        .replace(EVENT_DATA_PLACEHOLDER, event_topic)
}

/// A node of the group tree being built.
#[derive(Default)]
struct Node {
    class: Option<String>,
    stream: Option<Value>,
    datasets: Vec<Value>,
    children: BTreeMap<String, Node>,
}

impl Node {
    fn insert(&mut self, segments: &[&str], class: &str, stream: Option<Value>) {
        match segments {
            [] => {
                self.class = Some(class.to_string());
                self.stream = stream;
            }
            [first, rest @ ..] => self
                .children
                .entry((*first).to_string())
                .or_default()
                .insert(rest, class, stream),
        }
    }

    fn to_json(&self, name: &str) -> Value {
        let mut children: Vec<Value> = self
            .children
            .iter()
            .map(|(child, node)| node.to_json(child))
            .collect();
        children.extend(self.datasets.iter().cloned());
        if let Some(stream) = &self.stream {
            children.push(stream.clone());
        }
        let class = self.class.clone().unwrap_or_else(|| default_class(name));
        json!({
            "type": "group",
            "name": name,
            "attributes": [{ "name": "NX_class", "values": class }],
            "children": children,
        })
    }
}

fn default_class(name: &str) -> String {
    if name == "entry" || name == "raw_data_1" {
        "NXentry".to_string()
    } else {
        "NXcollection".to_string()
    }
}

fn stream_module(group: &RecordedGroup<'_>, log_topic: &str, event_topic: &str) -> Option<Value> {
    let kind = [SourceKind::Log, SourceKind::Event]
        .into_iter()
        .find(|kind| kind.group_class() == group.class())?;
    let source = SourceDescriptor::from_group_path(group.path(), kind);
    Some(match kind {
        SourceKind::Log => {
            let dtype = group
                .field("value")
                .map_or_else(|| "f64".to_string(), |f| f.dtype.to_string());
            json!({
                "module": "f142",
                "config": { "topic": log_topic, "source": source.name(), "dtype": dtype },
            })
        }
        SourceKind::Event => json!({
            "module": "ev42",
            "config": { "topic": event_topic, "source": source.name() },
        }),
    })
}

/// Generates a description mirroring the recording's group tree, with a
/// stream module for every log and event group and the run start time at
/// the recording's start time path.
pub fn generate(
    recording: &Recording,
    log_topic: &str,
    event_topic: &str,
    start_time_iso: &str,
) -> String {
    let mut root = Node::default();
    for group in recording.groups() {
        let segments: Vec<&str> = group.path().split('/').filter(|s| !s.is_empty()).collect();
        let stream = stream_module(&group, log_topic, event_topic);
        root.insert(&segments, group.class(), stream);
    }

    let start_path = recording.manifest().start_time_path();
    let start_segments: Vec<&str> = start_path.split('/').filter(|s| !s.is_empty()).collect();
    if let [parents @ .., leaf] = start_segments.as_slice() {
        let mut node = &mut root;
        for segment in parents {
            node = node.children.entry((*segment).to_string()).or_default();
        }
        node.datasets.push(json!({
            "type": "dataset",
            "name": leaf,
            "values": start_time_iso,
        }));
    }

    let children: Vec<Value> = root
        .children
        .iter()
        .map(|(name, node)| node.to_json(name))
        .collect();
    json!({ "children": children }).to_string()
}

#[cfg(test)]
mod tests {
    use nexus_streamer_recording::{FieldSpec, RecordingWriter};
    use nexus_streamer_types::DType;

    use super::*;

    fn find<'a>(node: &'a Value, name: &str) -> Option<&'a Value> {
        node["children"]
            .as_array()?
            .iter()
            .find(|child| child["name"] == name)
    }

    #[test]
    fn placeholders_are_replaced_everywhere() {
        let template = r#"{"a": "SAMPLE_ENV_TOPIC", "b": "EVENT_DATA_TOPIC", "c": "SAMPLE_ENV_TOPIC"}"#;
        let filled = fill_placeholders(template, "LOKI_sampleEnv", "LOKI_events");
        assert_eq!(
            filled,
            r#"{"a": "LOKI_sampleEnv", "b": "LOKI_events", "c": "LOKI_sampleEnv"}"#
        );
    }

    #[test]
    fn missing_template_is_a_description_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = from_template(&dir.path().join("absent.json"), "l", "e").unwrap_err();
        assert!(matches!(err, RunError::Description { .. }));
    }

    #[test]
    fn generated_tree_has_stream_modules_and_start_time() {
        let dir = tempfile::tempdir().unwrap();
        let mut writer = RecordingWriter::create(dir.path()).unwrap();
        writer.add_group("/entry/sample/temperature", "NXlog").unwrap();
        writer
            .write_field(
                "/entry/sample/temperature",
                "value",
                &FieldSpec::new(DType::F32),
                [1.0f64],
            )
            .unwrap();
        writer.add_group("/entry/detector_1_events", "NXevent_data").unwrap();
        let recording = writer.finish(Some("2021-01-01T00:00:00Z")).unwrap();

        let json = generate(&recording, "T_sampleEnv", "T_events", "2021-06-01T00:00:00Z");
        let tree: Value = serde_json::from_str(&json).unwrap();

        let entry = find(&tree, "entry").unwrap();
        assert_eq!(entry["attributes"][0]["values"], "NXentry");
        let start = find(entry, "start_time").unwrap();
        assert_eq!(start["values"], "2021-06-01T00:00:00Z");

        let events = find(entry, "detector_1_events").unwrap();
        let module = events["children"].as_array().unwrap().last().unwrap();
        assert_eq!(module["module"], "ev42");
        assert_eq!(module["config"]["topic"], "T_events");

        let sample = find(entry, "sample").unwrap();
        assert_eq!(sample["attributes"][0]["values"], "NXcollection");
        let temperature = find(sample, "temperature").unwrap();
        let module = &temperature["children"][0];
        assert_eq!(module["module"], "f142");
        assert_eq!(module["config"]["source"], "temperature");
        assert_eq!(module["config"]["dtype"], "f32");
    }
}
