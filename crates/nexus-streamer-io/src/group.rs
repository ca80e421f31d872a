//! Array groups.
//!
//! A group bundles the named arrays that make up one data source, e.g. the
//! `value` and `time` arrays of an `NXlog`.

use std::collections::BTreeMap;

use nexus_streamer_types::Scalar;

use crate::{BoxedArray, Element, IoError, MemoryArray};

/// A named collection of chunked arrays.
pub trait ArrayGroup {
    /// Full path of the group inside the recording.
    fn path(&self) -> &str;

    /// Returns true if the group has an array named `field`.
    fn contains(&self, field: &str) -> bool;

    /// The `units` attribute of `field`, without opening it.
    fn units(&self, field: &str) -> Option<&str>;

    /// Opens a fresh forward-only view of the array named `field`.
    ///
    /// Each call returns an independent view starting at the first chunk.
    fn open<T: Element>(&self, field: &str) -> Result<BoxedArray<T>, IoError>;
}

#[derive(Debug, Clone)]
struct MemoryField {
    values: Vec<Scalar>,
    chunk_len: usize,
    units: Option<String>,
}

/// An in-memory group, used for tests and synthetic sources.
#[derive(Debug, Clone, Default)]
pub struct MemoryGroup {
    path: String,
    fields: BTreeMap<String, MemoryField>,
}

impl MemoryGroup {
    pub fn new(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            fields: BTreeMap::new(),
        }
    }

    /// Adds a field without a `units` attribute.
    pub fn with_field<V: Into<Scalar>>(
        mut self,
        name: impl Into<String>,
        values: impl IntoIterator<Item = V>,
        chunk_len: usize,
    ) -> Self {
        self.insert(name.into(), values, chunk_len, None);
        self
    }

    /// Adds a field carrying a `units` attribute.
    pub fn with_timed_field<V: Into<Scalar>>(
        mut self,
        name: impl Into<String>,
        values: impl IntoIterator<Item = V>,
        chunk_len: usize,
        units: impl Into<String>,
    ) -> Self {
        self.insert(name.into(), values, chunk_len, Some(units.into()));
        self
    }

    fn insert<V: Into<Scalar>>(
        &mut self,
        name: String,
        values: impl IntoIterator<Item = V>,
        chunk_len: usize,
        units: Option<String>,
    ) {
        let values = values.into_iter().map(Into::into).collect();
        self.fields.insert(
            name,
            MemoryField {
                values,
                chunk_len,
                units,
            },
        );
    }

    /// Removes a field, returning true if it existed.
    pub fn remove_field(&mut self, name: &str) -> bool {
        self.fields.remove(name).is_some()
    }
}

impl ArrayGroup for MemoryGroup {
    fn path(&self) -> &str {
        &self.path
    }

    fn contains(&self, field: &str) -> bool {
        self.fields.contains_key(field)
    }

    fn units(&self, field: &str) -> Option<&str> {
        self.fields.get(field).and_then(|f| f.units.as_deref())
    }

    fn open<T: Element>(&self, field: &str) -> Result<BoxedArray<T>, IoError> {
        let stored = self.fields.get(field).ok_or_else(|| IoError::MissingField {
            group: self.path.clone(),
            field: field.to_string(),
        })?;
        let values = stored.values.iter().copied().map(T::from_scalar).collect();
        let mut array = MemoryArray::new(values, stored.chunk_len.max(1));
        if let Some(units) = &stored.units {
            array = array.with_units(units.clone());
        }
        Ok(Box::new(array))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ChunkedArray;

    #[test]
    fn open_converts_and_keeps_units() {
        let group = MemoryGroup::new("/entry/temperature")
            .with_timed_field("time", [0.5f64, 1.5], 1, "s")
            .with_field("value", [10i64, 20], 2);

        assert!(group.contains("time"));
        assert!(!group.contains("average_value"));
        assert_eq!(ArrayGroup::units(&group, "time"), Some("s"));
        assert_eq!(ArrayGroup::units(&group, "value"), None);

        let mut time = group.open::<Scalar>("time").unwrap();
        assert_eq!(time.units(), Some("s"));
        assert_eq!(
            time.read_to_end().unwrap(),
            vec![Scalar::Float(0.5), Scalar::Float(1.5)]
        );

        let mut value = group.open::<u64>("value").unwrap();
        assert_eq!(value.units(), None);
        assert_eq!(value.read_to_end().unwrap(), vec![10, 20]);
    }

    #[test]
    fn open_missing_field_names_it() {
        let mut group = MemoryGroup::new("/entry/events").with_field("event_id", [1u32], 1);
        assert!(group.remove_field("event_id"));

        let err = group.open::<u32>("event_id").err().expect("field was removed");
        match err {
            IoError::MissingField { group, field } => {
                assert_eq!(group, "/entry/events");
                assert_eq!(field, "event_id");
            }
            other => panic!("expected missing field, got {other:?}"),
        }
    }

    #[test]
    fn each_open_is_independent() {
        let group = MemoryGroup::new("/g").with_field("x", [1u64, 2, 3], 1);
        let mut a = group.open::<u64>("x").unwrap();
        let _ = a.next_chunk().unwrap();
        let mut b = group.open::<u64>("x").unwrap();
        assert_eq!(b.next_chunk().unwrap().unwrap().start, 0);
    }
}
