//! Reading recordings.

use std::marker::PhantomData;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use nexus_streamer_io::{
    ArrayGroup, BoxedArray, Chunk, ChunkedArray, Element, FileHandle, IoBackend, IoError,
    OpenFlags, SyncBackend,
};
use nexus_streamer_types::CompressionKind;
use tracing::debug;

use crate::manifest::{FieldMeta, GroupMeta, MANIFEST_FILENAME, Manifest};
use crate::{CodecRegistry, RecordingError};

/// An opened recording directory.
#[derive(Debug, Clone)]
pub struct Recording {
    root: PathBuf,
    manifest: Manifest,
    backend: Arc<dyn IoBackend>,
}

impl Recording {
    /// Opens the recording at `root` with the standard file backend.
    pub fn open(root: impl AsRef<Path>) -> Result<Self, RecordingError> {
        Self::open_with_backend(root, Arc::new(SyncBackend::new()))
    }

    pub fn open_with_backend(
        root: impl AsRef<Path>,
        backend: Arc<dyn IoBackend>,
    ) -> Result<Self, RecordingError> {
        let root = root.as_ref().to_path_buf();
        let manifest_path = root.join(MANIFEST_FILENAME);
        let bytes = backend.read_all(&manifest_path)?;
        let manifest = Manifest::from_json(&manifest_path, &bytes)?;
        manifest.validate()?;
        debug!(
            root = %root.display(),
            groups = manifest.groups.len(),
            "opened recording"
        );
        Ok(Self {
            root,
            manifest,
            backend,
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn manifest(&self) -> &Manifest {
        &self.manifest
    }

    /// Recorded run start in nanoseconds since the Unix epoch.
    pub fn start_time_ns(&self) -> Result<i64, RecordingError> {
        self.manifest.start_time_ns()
    }

    pub fn groups(&self) -> impl Iterator<Item = RecordedGroup<'_>> {
        self.manifest.groups.iter().map(|meta| RecordedGroup {
            recording: self,
            meta,
        })
    }

    /// Groups of the given NeXus class, in manifest order.
    pub fn groups_by_class(&self, class: &str) -> Vec<RecordedGroup<'_>> {
        self.groups().filter(|g| g.class() == class).collect()
    }

    pub fn group(&self, path: &str) -> Result<RecordedGroup<'_>, RecordingError> {
        self.groups()
            .find(|g| g.path() == path)
            .ok_or_else(|| RecordingError::UnknownGroup(path.to_string()))
    }
}

/// One group of a [`Recording`].
#[derive(Debug, Clone, Copy)]
pub struct RecordedGroup<'a> {
    recording: &'a Recording,
    meta: &'a GroupMeta,
}

impl RecordedGroup<'_> {
    pub fn class(&self) -> &str {
        &self.meta.class
    }

    /// Element count of `field`, if present.
    pub fn len(&self, field: &str) -> Option<u64> {
        self.meta.fields.get(field).map(|f| f.len)
    }

    pub fn field_names(&self) -> impl Iterator<Item = &str> {
        self.meta.fields.keys().map(String::as_str)
    }

    pub fn field(&self, field: &str) -> Option<&FieldMeta> {
        self.meta.fields.get(field)
    }
}

impl ArrayGroup for RecordedGroup<'_> {
    fn path(&self) -> &str {
        &self.meta.path
    }

    fn contains(&self, field: &str) -> bool {
        self.meta.fields.contains_key(field)
    }

    fn units(&self, field: &str) -> Option<&str> {
        self.meta.fields.get(field).and_then(|f| f.units.as_deref())
    }

    fn open<T: Element>(&self, field: &str) -> Result<BoxedArray<T>, IoError> {
        let meta = self
            .meta
            .fields
            .get(field)
            .ok_or_else(|| IoError::MissingField {
                group: self.meta.path.clone(),
                field: field.to_string(),
            })?;
        let array = RecordedArray::<T>::open(
            format!("{}/{field}", self.meta.path),
            Arc::clone(&self.recording.backend),
            &self.recording.root,
            meta.clone(),
        )?;
        Ok(Box::new(array))
    }
}

/// A forward-only view of one recorded field.
///
/// Each [`next_chunk`](ChunkedArray::next_chunk) call reads, decompresses
/// and decodes exactly one chunk.
#[derive(Debug)]
pub struct RecordedArray<T> {
    name: String,
    backend: Arc<dyn IoBackend>,
    handle: FileHandle,
    meta: FieldMeta,
    codecs: CodecRegistry,
    next: usize,
    next_start: u64,
    _element: PhantomData<fn() -> T>,
}

impl<T: Element> RecordedArray<T> {
    fn open(
        name: String,
        backend: Arc<dyn IoBackend>,
        root: &Path,
        meta: FieldMeta,
    ) -> Result<Self, IoError> {
        let handle = backend.open(&root.join(&meta.file), OpenFlags::read_only())?;
        let file_len = backend.file_size(&handle)?;
        // Chunk tables come from the manifest; nothing is allocated for a
        // chunk the file cannot hold.
        for (i, chunk) in meta.chunks.iter().enumerate() {
            let end = chunk.offset.saturating_add(chunk.stored_len);
            if end > file_len {
                return Err(IoError::CorruptChunk {
                    array: name,
                    reason: format!(
                        "chunk {i} ends at byte {end} but {} holds {file_len} bytes",
                        meta.file
                    ),
                });
            }
        }
        Ok(Self {
            name,
            backend,
            handle,
            meta,
            codecs: CodecRegistry::new(),
            next: 0,
            next_start: 0,
            _element: PhantomData,
        })
    }

    fn corrupt(&self, reason: impl Into<String>) -> IoError {
        IoError::CorruptChunk {
            array: self.name.clone(),
            reason: reason.into(),
        }
    }

    fn read_chunk(&self, index: usize) -> Result<Vec<T>, IoError> {
        let chunk = self.meta.chunks[index];
        let stored_len = usize::try_from(chunk.stored_len)
            .map_err(|_| self.corrupt(format!("chunk {index} is too large")))?;
        let width = self.meta.dtype.size();
        let expected = chunk.len.saturating_mul(width as u64);
        let mut stored = vec![0u8; stored_len];
        self.backend
            .read_exact_at(&self.handle, chunk.offset, &mut stored)?;

        if self.meta.compression == CompressionKind::Lz4
            && let Some(prefix) = stored.first_chunk::<4>()
            && u64::from(u32::from_le_bytes(*prefix)) != expected
        {
            return Err(self.corrupt(format!(
                "chunk {index} claims {} decompressed bytes, expected {expected}",
                u32::from_le_bytes(*prefix)
            )));
        }

        let raw = self
            .codecs
            .decompress(self.meta.compression, &stored)
            .map_err(|e| self.corrupt(format!("chunk {index}: {e}")))?;

        if raw.len() as u64 != expected {
            return Err(self.corrupt(format!(
                "chunk {index} decoded to {} bytes, expected {} {} elements",
                raw.len(),
                chunk.len,
                self.meta.dtype
            )));
        }
        Ok(raw
            .chunks_exact(width)
            .map(|bytes| T::from_scalar(self.meta.dtype.decode(bytes)))
            .collect())
    }
}

impl<T: Element> ChunkedArray for RecordedArray<T> {
    type Item = T;

    fn len(&self) -> u64 {
        self.meta.len
    }

    fn units(&self) -> Option<&str> {
        self.meta.units.as_deref()
    }

    fn next_chunk(&mut self) -> Result<Option<Chunk<T>>, IoError> {
        if self.next >= self.meta.chunks.len() {
            return Ok(None);
        }
        let data = self.read_chunk(self.next)?;
        let start = self.next_start;
        self.next += 1;
        self.next_start += data.len() as u64;
        Ok(Some(Chunk::new(start, data)))
    }

    fn read_last(&mut self) -> Result<Option<T>, IoError> {
        match self.meta.chunks.len().checked_sub(1) {
            Some(last) => Ok(self.read_chunk(last)?.last().copied()),
            None => Ok(None),
        }
    }
}
