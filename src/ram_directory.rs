//! In-memory directory used for tests and ephemeral storage.

use crate::source::ReadOnlySource;
use crate::storage::{
    Directory, DirectoryLock, ReadHandle, StorageError, StorageResult, WritePtr,
};
use bytes::Bytes;
use std::collections::HashMap;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

type RamCache = HashMap<PathBuf, Bytes>;

/// Directory keeping every blob in an in-memory map.
///
/// Blobs are stored as [`Bytes`], so sources are O(1) clones of the map
/// entries and survive [`Directory::remove`] untouched.
#[derive(Clone, Default)]
pub struct RamDirectory {
    cache: Arc<Mutex<RamCache>>,
    lock: DirectoryLock,
}

impl RamDirectory {
    /// Create an empty RAM directory.
    pub fn create() -> RamDirectory {
        RamDirectory::default()
    }
}

/// Writer appending into a private buffer, published to the directory map on
/// flush (and on drop, for writers never flushed explicitly).
struct RamWriter {
    cache: Arc<Mutex<RamCache>>,
    path: PathBuf,
    buffer: Vec<u8>,
}

impl Write for RamWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.buffer.extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        let mut cache = self.cache.lock().unwrap();
        cache.insert(self.path.clone(), Bytes::from(self.buffer.clone()));
        Ok(())
    }
}

impl Drop for RamWriter {
    fn drop(&mut self) {
        let _ = self.flush();
    }
}

impl Directory for RamDirectory {
    fn open_write(&self, path: &Path) -> StorageResult<WritePtr> {
        let token = self.lock.try_exclusive()?;
        let mut cache = self.cache.lock().unwrap();
        if cache.contains_key(path) {
            return Err(StorageError::FileAlreadyExists(path.to_path_buf()));
        }
        // Reserve the name so the existence check holds while writing.
        cache.insert(path.to_path_buf(), Bytes::new());
        let writer = RamWriter {
            cache: Arc::clone(&self.cache),
            path: path.to_path_buf(),
            buffer: Vec::new(),
        };
        Ok(WritePtr::new(Box::new(writer), token))
    }

    fn open_read(&self, path: &Path) -> StorageResult<ReadHandle> {
        let token = self.lock.try_shared()?;
        let source = self.lookup(path)?;
        Ok(ReadHandle::new(source, token))
    }

    fn source(&self, path: &Path) -> StorageResult<ReadOnlySource> {
        let _token = self.lock.try_shared()?;
        self.lookup(path)
    }

    fn remove(&self, path: &Path) -> StorageResult<()> {
        let _token = self.lock.try_exclusive()?;
        let mut cache = self.cache.lock().unwrap();
        cache
            .remove(path)
            .map(|_| ())
            .ok_or_else(|| StorageError::FileNotFound(path.to_path_buf()))
    }

    fn replace_content(&self, path: &Path, data: &[u8]) -> StorageResult<()> {
        let _token = self.lock.try_exclusive()?;
        let mut cache = self.cache.lock().unwrap();
        cache.insert(path.to_path_buf(), Bytes::copy_from_slice(data));
        Ok(())
    }
}

impl RamDirectory {
    fn lookup(&self, path: &Path) -> StorageResult<ReadOnlySource> {
        let cache = self.cache.lock().unwrap();
        cache
            .get(path)
            .map(|bytes| ReadOnlySource::Memory(bytes.clone()))
            .ok_or_else(|| StorageError::FileNotFound(path.to_path_buf()))
    }
}
