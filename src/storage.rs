//! Directory abstraction for the document store.
//!
//! A directory is a write-once-read-many container of named byte blobs.
//! Access to its shared state is single-writer/multi-reader: writers hold an
//! exclusive lease, readers a shared one, and acquisition never blocks.

use crate::source::ReadOnlySource;
use std::io::{self, Write};
use std::ops::Deref;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use thiserror::Error;

/// Storage-related errors.
#[derive(Error, Debug)]
pub enum StorageError {
    /// The name is already present in the directory.
    #[error("file already exists: {0}")]
    FileAlreadyExists(PathBuf),

    /// The name is not present in the directory.
    #[error("file not found: {0}")]
    FileNotFound(PathBuf),

    /// The required lock mode is held by someone else.
    #[error("directory already locked")]
    DirectoryAlreadyLocked,

    /// I/O error from the storage backend.
    #[error("storage I/O error: {0}")]
    Io(#[from] io::Error),
}

/// Result type for storage operations.
pub type StorageResult<T> = std::result::Result<T, StorageError>;

#[derive(Default)]
struct LockState {
    readers: usize,
    writer: bool,
}

/// Lock bookkeeping shared by every handle a directory gives out.
///
/// Acquisition is try-only: if the requested mode is unavailable the
/// operation fails with [`StorageError::DirectoryAlreadyLocked`] instead of
/// blocking.
#[derive(Clone, Default)]
pub struct DirectoryLock {
    state: Arc<Mutex<LockState>>,
}

impl DirectoryLock {
    /// Create unlocked bookkeeping.
    pub fn new() -> DirectoryLock {
        DirectoryLock::default()
    }

    /// Try to take the shared (reader) mode.
    pub fn try_shared(&self) -> StorageResult<LockToken> {
        let mut state = self.state.lock().unwrap();
        if state.writer {
            return Err(StorageError::DirectoryAlreadyLocked);
        }
        state.readers += 1;
        Ok(LockToken {
            state: Arc::clone(&self.state),
            exclusive: false,
        })
    }

    /// Try to take the exclusive (writer) mode.
    pub fn try_exclusive(&self) -> StorageResult<LockToken> {
        let mut state = self.state.lock().unwrap();
        if state.writer || state.readers > 0 {
            return Err(StorageError::DirectoryAlreadyLocked);
        }
        state.writer = true;
        Ok(LockToken {
            state: Arc::clone(&self.state),
            exclusive: true,
        })
    }
}

/// Scoped lease on a directory lock; the mode is released on drop.
pub struct LockToken {
    state: Arc<Mutex<LockState>>,
    exclusive: bool,
}

impl Drop for LockToken {
    fn drop(&mut self) {
        let mut state = self.state.lock().unwrap();
        if self.exclusive {
            state.writer = false;
        } else {
            state.readers -= 1;
        }
    }
}

/// Write half of a directory file, bundled with the exclusive lease.
///
/// Bytes become visible to readers once the writer is flushed; dropping an
/// unflushed writer flushes whatever was buffered. The lease is released
/// when the writer is dropped.
pub struct WritePtr {
    inner: Box<dyn Write + Send>,
    _lock: LockToken,
}

impl WritePtr {
    pub(crate) fn new(inner: Box<dyn Write + Send>, lock: LockToken) -> WritePtr {
        WritePtr { inner, _lock: lock }
    }
}

impl Write for WritePtr {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.inner.write(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.inner.flush()
    }
}

/// Read half of a directory file, bundled with a shared lease.
///
/// Dereferences to the underlying [`ReadOnlySource`]; the lease is released
/// when the handle is dropped, while sources cloned out of it stay valid.
pub struct ReadHandle {
    source: ReadOnlySource,
    _lock: LockToken,
}

impl ReadHandle {
    pub(crate) fn new(source: ReadOnlySource, lock: LockToken) -> ReadHandle {
        ReadHandle {
            source,
            _lock: lock,
        }
    }

    /// Clone out the underlying source, independent of the lease.
    pub fn source(&self) -> ReadOnlySource {
        self.source.clone()
    }
}

impl Deref for ReadHandle {
    type Target = ReadOnlySource;

    fn deref(&self) -> &ReadOnlySource {
        &self.source
    }
}

/// Write-once-read-many container of named byte blobs.
///
/// Names are opaque path-like keys: the RAM backend treats them as map keys,
/// the mmap backend as filesystem paths under its root.
pub trait Directory: Send + Sync + 'static {
    /// Open a fresh blob for writing.
    ///
    /// Fails with [`StorageError::FileAlreadyExists`] if the name is present,
    /// or [`StorageError::DirectoryAlreadyLocked`] if any reader or writer
    /// currently holds the directory.
    fn open_write(&self, path: &Path) -> StorageResult<WritePtr>;

    /// Open an existing blob for reading.
    ///
    /// Fails with [`StorageError::FileNotFound`] if the name is absent, or
    /// [`StorageError::DirectoryAlreadyLocked`] if a writer holds the
    /// directory.
    fn open_read(&self, path: &Path) -> StorageResult<ReadHandle>;

    /// A read-only source over an existing blob, without holding a lease.
    fn source(&self, path: &Path) -> StorageResult<ReadOnlySource>;

    /// Remove a blob. Sources obtained before the removal remain valid.
    fn remove(&self, path: &Path) -> StorageResult<()>;

    /// Atomically replace a blob's content; readers observe either the old
    /// or the new contents in full, never a mix. The blob may or may not
    /// previously exist.
    fn replace_content(&self, path: &Path, data: &[u8]) -> StorageResult<()>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_shared_locks_stack() {
        let lock = DirectoryLock::new();
        let a = lock.try_shared().unwrap();
        let b = lock.try_shared().unwrap();
        drop(a);
        drop(b);
        lock.try_exclusive().unwrap();
    }

    #[test]
    fn test_exclusive_excludes_everyone() {
        let lock = DirectoryLock::new();
        let token = lock.try_exclusive().unwrap();
        assert!(matches!(
            lock.try_exclusive(),
            Err(StorageError::DirectoryAlreadyLocked)
        ));
        assert!(matches!(
            lock.try_shared(),
            Err(StorageError::DirectoryAlreadyLocked)
        ));
        drop(token);
        lock.try_shared().unwrap();
    }

    #[test]
    fn test_readers_block_writer() {
        let lock = DirectoryLock::new();
        let reader = lock.try_shared().unwrap();
        assert!(matches!(
            lock.try_exclusive(),
            Err(StorageError::DirectoryAlreadyLocked)
        ));
        drop(reader);
        lock.try_exclusive().unwrap();
    }

    #[test]
    fn test_error_display() {
        let err = StorageError::FileNotFound(PathBuf::from("store"));
        assert!(err.to_string().contains("store"));
        let err = StorageError::DirectoryAlreadyLocked;
        assert!(err.to_string().contains("locked"));
    }
}
