//! Synchronous I/O backend using `std::fs`.

use std::fs::{self, OpenOptions};
use std::io::{ErrorKind, Write};
use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};

use bytes::Bytes;

use crate::IoError;
use crate::backend::{FileHandle, IoBackend, OpenFlags};

/// Synchronous I/O backend using `std::fs::File`.
///
/// All operations are blocking and go through the OS page cache.
#[derive(Debug)]
pub struct SyncBackend {
    /// Counter for generating unique file handle IDs.
    next_handle_id: AtomicU64,
}

impl SyncBackend {
    /// Creates a new synchronous I/O backend.
    pub fn new() -> Self {
        Self {
            next_handle_id: AtomicU64::new(1),
        }
    }

    /// Returns the next unique handle ID.
    fn next_id(&self) -> u64 {
        self.next_handle_id.fetch_add(1, Ordering::Relaxed)
    }
}

impl Default for SyncBackend {
    fn default() -> Self {
        Self::new()
    }
}

fn not_found_or(path: &Path, err: std::io::Error) -> IoError {
    if err.kind() == ErrorKind::NotFound {
        IoError::NotFound {
            path: path.to_path_buf(),
        }
    } else {
        IoError::Io { source: err }
    }
}

impl IoBackend for SyncBackend {
    fn open(&self, path: &Path, flags: OpenFlags) -> Result<FileHandle, IoError> {
        let file = OpenOptions::new()
            .read(flags.read)
            .write(flags.write)
            .create(flags.create)
            .truncate(flags.truncate)
            .append(flags.append)
            .open(path)
            .map_err(|e| not_found_or(path, e))?;
        let id = self.next_id();
        Ok(FileHandle::from_file(id, file))
    }

    fn read_at(&self, handle: &FileHandle, offset: u64, buf: &mut [u8]) -> Result<usize, IoError> {
        // Positional read without moving a shared cursor
        #[cfg(unix)]
        {
            use std::os::unix::fs::FileExt;
            let file = handle.file()?;
            let n = file.read_at(buf, offset)?;
            Ok(n)
        }

        #[cfg(not(unix))]
        {
            use std::os::windows::fs::FileExt;
            let file = handle.file()?;
            let n = file.seek_read(buf, offset)?;
            Ok(n)
        }
    }

    fn write(&self, handle: &mut FileHandle, buf: &[u8]) -> Result<usize, IoError> {
        let file = handle.file_mut()?;
        file.write_all(buf)?;
        Ok(buf.len())
    }

    fn fsync(&self, handle: &FileHandle) -> Result<(), IoError> {
        handle.file()?.sync_all()?;
        Ok(())
    }

    fn close(&self, mut handle: FileHandle) -> Result<(), IoError> {
        handle.file = None;
        Ok(())
    }

    fn read_all(&self, path: &Path) -> Result<Bytes, IoError> {
        let data = fs::read(path).map_err(|e| not_found_or(path, e))?;
        Ok(Bytes::from(data))
    }

    fn write_all(&self, path: &Path, data: &[u8]) -> Result<(), IoError> {
        let mut file = fs::File::create(path)?;
        file.write_all(data)?;
        file.sync_all()?;
        Ok(())
    }

    fn file_size(&self, handle: &FileHandle) -> Result<u64, IoError> {
        let metadata = handle.file()?.metadata()?;
        Ok(metadata.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sync_backend_write_and_read() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("chunks.bin");
        let backend = SyncBackend::new();

        let mut handle = backend.open(&path, OpenFlags::create_truncate()).unwrap();
        let written = backend.write(&mut handle, b"chunk-0chunk-1").unwrap();
        assert_eq!(written, 14);
        backend.fsync(&handle).unwrap();
        backend.close(handle).unwrap();

        let data = backend.read_all(&path).unwrap();
        assert_eq!(&data[..], b"chunk-0chunk-1");
    }

    #[test]
    fn read_exact_at_reads_one_chunk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("chunks.bin");
        let backend = SyncBackend::new();
        backend.write_all(&path, b"aaaabbbbcccc").unwrap();

        let handle = backend.open(&path, OpenFlags::read_only()).unwrap();
        let mut buf = [0u8; 4];
        backend.read_exact_at(&handle, 4, &mut buf).unwrap();
        assert_eq!(&buf, b"bbbb");
        backend.close(handle).unwrap();
    }

    #[test]
    fn read_exact_at_reports_short_read() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("truncated.bin");
        let backend = SyncBackend::new();
        backend.write_all(&path, b"0123456789").unwrap();

        let handle = backend.open(&path, OpenFlags::read_only()).unwrap();
        let mut buf = [0u8; 8];
        let err = backend.read_exact_at(&handle, 6, &mut buf).unwrap_err();
        assert!(matches!(
            err,
            IoError::ShortRead {
                offset: 6,
                expected: 8,
                actual: 4
            }
        ));
    }

    #[test]
    fn open_missing_file_is_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let backend = SyncBackend::new();
        let err = backend
            .open(&dir.path().join("absent.bin"), OpenFlags::read_only())
            .unwrap_err();
        assert!(matches!(err, IoError::NotFound { .. }));
    }

    #[test]
    fn create_truncate_replaces_contents() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("replace.bin");
        let backend = SyncBackend::new();
        backend.write_all(&path, b"old contents").unwrap();

        let mut handle = backend.open(&path, OpenFlags::create_truncate()).unwrap();
        backend.write(&mut handle, b"new").unwrap();
        assert_eq!(backend.file_size(&handle).unwrap(), 3);
        backend.close(handle).unwrap();
    }
}
