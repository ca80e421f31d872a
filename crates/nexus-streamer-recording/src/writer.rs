//! Building recordings.
//!
//! Used by tests and tooling to produce recordings in the same layout the
//! streamer replays. Each field gets its own chunk file under `arrays/`.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use nexus_streamer_io::{IoBackend, OpenFlags, SyncBackend};
use nexus_streamer_types::{CompressionKind, DType, Scalar};
use tracing::debug;

use crate::manifest::{ChunkMeta, FieldMeta, GroupMeta, MANIFEST_FILENAME, Manifest, parse_start_time};
use crate::{CodecRegistry, Recording, RecordingError};

const ARRAYS_DIR: &str = "arrays";

/// Storage layout of one field.
#[derive(Debug, Clone, PartialEq)]
pub struct FieldSpec {
    pub dtype: DType,
    /// Elements per chunk.
    pub chunk_len: usize,
    pub units: Option<String>,
    pub compression: CompressionKind,
}

impl FieldSpec {
    pub fn new(dtype: DType) -> Self {
        Self {
            dtype,
            chunk_len: 1024,
            units: None,
            compression: CompressionKind::None,
        }
    }

    pub fn chunk_len(mut self, chunk_len: usize) -> Self {
        self.chunk_len = chunk_len;
        self
    }

    pub fn units(mut self, units: impl Into<String>) -> Self {
        self.units = Some(units.into());
        self
    }

    pub fn compression(mut self, compression: CompressionKind) -> Self {
        self.compression = compression;
        self
    }
}

/// Writes a new recording directory.
#[derive(Debug)]
pub struct RecordingWriter {
    root: PathBuf,
    backend: Arc<dyn IoBackend>,
    codecs: CodecRegistry,
    manifest: Manifest,
    next_file: usize,
}

impl RecordingWriter {
    /// Prepares `root` for a new recording. Existing chunk files with
    /// clashing names are replaced.
    pub fn create(root: impl AsRef<Path>) -> Result<Self, RecordingError> {
        let root = root.as_ref().to_path_buf();
        let arrays = root.join(ARRAYS_DIR);
        std::fs::create_dir_all(&arrays)
            .map_err(|source| RecordingError::Filesystem { path: arrays, source })?;
        Ok(Self {
            root,
            backend: Arc::new(SyncBackend::new()),
            codecs: CodecRegistry::new(),
            manifest: Manifest::new(),
            next_file: 0,
        })
    }

    pub fn add_group(
        &mut self,
        path: impl Into<String>,
        class: impl Into<String>,
    ) -> Result<(), RecordingError> {
        let path = path.into();
        if self.manifest.groups.iter().any(|g| g.path == path) {
            return Err(RecordingError::DuplicateGroup(path));
        }
        self.manifest.groups.push(GroupMeta {
            path,
            class: class.into(),
            fields: Default::default(),
        });
        Ok(())
    }

    /// Writes `values` as field `field` of `group`, returning the number of
    /// elements written.
    pub fn write_field<V: Into<Scalar>>(
        &mut self,
        group: &str,
        field: &str,
        spec: &FieldSpec,
        values: impl IntoIterator<Item = V>,
    ) -> Result<u64, RecordingError> {
        if spec.chunk_len == 0 {
            return Err(RecordingError::InvalidManifest(format!(
                "{group}/{field}: chunk length must be positive"
            )));
        }
        let group_index = self
            .manifest
            .groups
            .iter()
            .position(|g| g.path == group)
            .ok_or_else(|| RecordingError::UnknownGroup(group.to_string()))?;
        if self.manifest.groups[group_index].fields.contains_key(field) {
            return Err(RecordingError::InvalidManifest(format!(
                "{group}/{field} written twice"
            )));
        }

        let values: Vec<Scalar> = values.into_iter().map(Into::into).collect();
        let file = format!("{ARRAYS_DIR}/{:04}.chunks", self.next_file);
        self.next_file += 1;

        let mut handle = self
            .backend
            .open(&self.root.join(&file), OpenFlags::create_truncate())?;
        let mut chunks = Vec::with_capacity(values.len().div_ceil(spec.chunk_len));
        let mut offset = 0u64;
        let mut raw = Vec::with_capacity(spec.chunk_len * spec.dtype.size());
        for chunk in values.chunks(spec.chunk_len) {
            raw.clear();
            for value in chunk {
                spec.dtype.encode(*value, &mut raw);
            }
            let stored = self.codecs.compress(spec.compression, &raw)?;
            self.backend.write(&mut handle, &stored)?;
            chunks.push(ChunkMeta {
                offset,
                stored_len: stored.len() as u64,
                len: chunk.len() as u64,
            });
            offset += stored.len() as u64;
        }
        self.backend.fsync(&handle)?;
        self.backend.close(handle)?;

        debug!(
            group,
            field,
            len = values.len(),
            chunks = chunks.len(),
            compression = %spec.compression,
            "wrote field"
        );
        self.manifest.groups[group_index].fields.insert(
            field.to_string(),
            FieldMeta {
                file,
                dtype: spec.dtype,
                len: values.len() as u64,
                units: spec.units.clone(),
                compression: spec.compression,
                chunks,
            },
        );
        Ok(values.len() as u64)
    }

    /// Sets where the run start time lives in the original file.
    pub fn set_start_time_path(&mut self, path: impl Into<String>) {
        self.manifest.start_time_path = Some(path.into());
    }

    /// Writes the manifest and reopens the finished recording.
    pub fn finish(mut self, start_time: Option<&str>) -> Result<Recording, RecordingError> {
        if let Some(value) = start_time {
            parse_start_time(value)?;
            self.manifest.start_time = Some(value.to_string());
        }
        self.manifest.validate()?;
        let json = self.manifest.to_json()?;
        self.backend
            .write_all(&self.root.join(MANIFEST_FILENAME), &json)?;
        Recording::open_with_backend(&self.root, self.backend)
    }
}
