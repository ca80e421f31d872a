//! I/O backend trait.
//!
//! The [`IoBackend`] trait abstracts the file operations a chunk store
//! needs: positional reads of individual chunks while replaying, and
//! sequential writes while a recording is being built.
//!
//! Keeping this behind a trait lets the recording store be exercised with
//! mock backends and leaves room for an `io_uring` backend without
//! changing the store's API.

use std::path::Path;

use bytes::Bytes;

use crate::IoError;

/// Flags for opening files.
#[derive(Debug, Clone, Copy, Default)]
pub struct OpenFlags {
    /// Open for reading.
    pub read: bool,
    /// Open for writing.
    pub write: bool,
    /// Create the file if it doesn't exist.
    pub create: bool,
    /// Truncate an existing file to zero length.
    pub truncate: bool,
    /// Open in append mode.
    pub append: bool,
}

impl OpenFlags {
    /// Flags for reading an existing chunk file.
    pub fn read_only() -> Self {
        Self {
            read: true,
            ..Self::default()
        }
    }

    /// Flags for starting a fresh chunk file, replacing any previous contents.
    pub fn create_truncate() -> Self {
        Self {
            write: true,
            create: true,
            truncate: true,
            ..Self::default()
        }
    }

    /// Flags for creating or appending to a file.
    pub fn append_create() -> Self {
        Self {
            read: true,
            write: true,
            create: true,
            append: true,
            ..Self::default()
        }
    }
}

/// Opaque handle to an open file.
///
/// For `SyncBackend` it wraps a `std::fs::File`. The handle must be closed
/// via [`IoBackend::close`].
#[derive(Debug)]
pub struct FileHandle {
    /// Internal file descriptor or identifier.
    pub(crate) id: u64,
    /// The open file (for sync backend).
    pub(crate) file: Option<std::fs::File>,
}

impl FileHandle {
    /// Creates a new file handle wrapping a `std::fs::File`.
    pub(crate) fn from_file(id: u64, file: std::fs::File) -> Self {
        Self {
            id,
            file: Some(file),
        }
    }

    /// Returns the internal file reference.
    pub(crate) fn file(&self) -> Result<&std::fs::File, IoError> {
        self.file
            .as_ref()
            .ok_or(IoError::InvalidHandle { handle: self.id })
    }

    /// Returns the internal file reference mutably.
    pub(crate) fn file_mut(&mut self) -> Result<&mut std::fs::File, IoError> {
        self.file
            .as_mut()
            .ok_or(IoError::InvalidHandle { handle: self.id })
    }
}

/// Abstraction over file I/O operations.
///
/// All methods are synchronous. Chunk reads happen between the replay
/// scheduler's suspension points, so they never block an await.
pub trait IoBackend: Send + Sync + std::fmt::Debug {
    /// Opens a file with the given flags.
    fn open(&self, path: &Path, flags: OpenFlags) -> Result<FileHandle, IoError>;

    /// Reads data from a file at the given byte offset.
    ///
    /// Returns the number of bytes read, which may be short at end of file.
    fn read_at(&self, handle: &FileHandle, offset: u64, buf: &mut [u8]) -> Result<usize, IoError>;

    /// Fills `buf` completely from the given offset, failing with
    /// [`IoError::ShortRead`] if the file ends first.
    fn read_exact_at(&self, handle: &FileHandle, offset: u64, buf: &mut [u8]) -> Result<(), IoError> {
        let mut filled = 0;
        while filled < buf.len() {
            let n = self.read_at(handle, offset + filled as u64, &mut buf[filled..])?;
            if n == 0 {
                return Err(IoError::ShortRead {
                    offset,
                    expected: buf.len(),
                    actual: filled,
                });
            }
            filled += n;
        }
        Ok(())
    }

    /// Writes data to a file (at the current position or end in append mode).
    ///
    /// Returns the number of bytes written.
    fn write(&self, handle: &mut FileHandle, buf: &[u8]) -> Result<usize, IoError>;

    /// Syncs file data and metadata to disk.
    fn fsync(&self, handle: &FileHandle) -> Result<(), IoError>;

    /// Closes a file handle.
    fn close(&self, handle: FileHandle) -> Result<(), IoError>;

    /// Reads an entire file into memory.
    ///
    /// Convenience method for small files (manifests).
    fn read_all(&self, path: &Path) -> Result<Bytes, IoError>;

    /// Writes data to a file and syncs it.
    ///
    /// Convenience method for small files (manifests).
    fn write_all(&self, path: &Path, data: &[u8]) -> Result<(), IoError>;

    /// Returns the file size in bytes.
    fn file_size(&self, handle: &FileHandle) -> Result<u64, IoError>;
}
