//! Directory storing blobs as files under a root, read via memory maps.
//!
//! Mappings are cached per path to limit system calls; removing or replacing
//! a file evicts its cache entry, while sources already handed out keep their
//! mapping alive through the shared handle.

use crate::source::ReadOnlySource;
use crate::storage::{
    Directory, DirectoryLock, ReadHandle, StorageError, StorageResult, WritePtr,
};
use memmap2::Mmap;
use std::collections::HashMap;
use std::fs::{File, OpenOptions};
use std::io::{self, BufWriter, ErrorKind, Write};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use tracing::debug;

/// Directory rooted at a filesystem path.
pub struct MmapDirectory {
    root: PathBuf,
    mmap_cache: Mutex<HashMap<PathBuf, Arc<Mmap>>>,
    lock: DirectoryLock,
}

impl MmapDirectory {
    /// Open a directory rooted at `root`, creating the root if needed.
    pub fn open(root: impl Into<PathBuf>) -> StorageResult<MmapDirectory> {
        let root = root.into();
        std::fs::create_dir_all(&root)?;
        Ok(MmapDirectory {
            root,
            mmap_cache: Mutex::new(HashMap::new()),
            lock: DirectoryLock::new(),
        })
    }

    fn full_path(&self, path: &Path) -> PathBuf {
        self.root.join(path)
    }

    fn mmap_source(&self, path: &Path) -> StorageResult<ReadOnlySource> {
        let full = self.full_path(path);
        let mut cache = self.mmap_cache.lock().unwrap();
        if let Some(mmap) = cache.get(&full) {
            let len = mmap.len();
            return Ok(ReadOnlySource::Mmap {
                mmap: Arc::clone(mmap),
                range: 0..len,
            });
        }
        let file = File::open(&full).map_err(|e| match e.kind() {
            ErrorKind::NotFound => StorageError::FileNotFound(path.to_path_buf()),
            _ => StorageError::Io(e),
        })?;
        // Zero-length files cannot be mapped portably.
        if file.metadata()?.len() == 0 {
            return Ok(ReadOnlySource::empty());
        }
        let mmap = Arc::new(unsafe { Mmap::map(&file)? });
        cache.insert(full, Arc::clone(&mmap));
        let len = mmap.len();
        Ok(ReadOnlySource::Mmap {
            mmap,
            range: 0..len,
        })
    }

    fn evict(&self, path: &Path) {
        let full = self.full_path(path);
        self.mmap_cache.lock().unwrap().remove(&full);
    }
}

/// Writer over a buffered file; flush drains the buffer and syncs to disk.
struct FileWriter {
    writer: BufWriter<File>,
}

impl Write for FileWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.writer.write(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.writer.flush()?;
        self.writer.get_ref().sync_all()
    }
}

impl Drop for FileWriter {
    fn drop(&mut self) {
        let _ = self.flush();
    }
}

impl Directory for MmapDirectory {
    fn open_write(&self, path: &Path) -> StorageResult<WritePtr> {
        let token = self.lock.try_exclusive()?;
        let full = self.full_path(path);
        let file = OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&full)
            .map_err(|e| match e.kind() {
                ErrorKind::AlreadyExists => StorageError::FileAlreadyExists(path.to_path_buf()),
                _ => StorageError::Io(e),
            })?;
        let writer = FileWriter {
            writer: BufWriter::new(file),
        };
        Ok(WritePtr::new(Box::new(writer), token))
    }

    fn open_read(&self, path: &Path) -> StorageResult<ReadHandle> {
        let token = self.lock.try_shared()?;
        let source = self.mmap_source(path)?;
        Ok(ReadHandle::new(source, token))
    }

    fn source(&self, path: &Path) -> StorageResult<ReadOnlySource> {
        let _token = self.lock.try_shared()?;
        self.mmap_source(path)
    }

    fn remove(&self, path: &Path) -> StorageResult<()> {
        let _token = self.lock.try_exclusive()?;
        debug!(path = %path.display(), "removing file");
        self.evict(path);
        std::fs::remove_file(self.full_path(path)).map_err(|e| match e.kind() {
            ErrorKind::NotFound => StorageError::FileNotFound(path.to_path_buf()),
            _ => StorageError::Io(e),
        })
    }

    fn replace_content(&self, path: &Path, data: &[u8]) -> StorageResult<()> {
        let _token = self.lock.try_exclusive()?;
        debug!(path = %path.display(), bytes = data.len(), "replacing file content");
        // Write next to the target then rename, so readers only ever observe
        // a complete file.
        let mut tmp = tempfile::NamedTempFile::new_in(&self.root)?;
        tmp.write_all(data)?;
        tmp.flush()?;
        tmp.persist(self.full_path(path))
            .map_err(|e| StorageError::Io(e.error))?;
        self.evict(path);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_write_then_read() {
        let tmp = TempDir::new().unwrap();
        let dir = MmapDirectory::open(tmp.path()).unwrap();
        let path = Path::new("blob");
        {
            let mut writer = dir.open_write(path).unwrap();
            writer.write_all(b"Hello, World!").unwrap();
            writer.flush().unwrap();
        }
        let handle = dir.open_read(path).unwrap();
        assert_eq!(handle.as_slice(), b"Hello, World!");
    }

    #[test]
    fn test_reopen_directory_instance() {
        let tmp = TempDir::new().unwrap();
        {
            let dir = MmapDirectory::open(tmp.path()).unwrap();
            let mut writer = dir.open_write(Path::new("persisted")).unwrap();
            writer.write_all(b"on disk").unwrap();
        }
        let dir = MmapDirectory::open(tmp.path()).unwrap();
        let source = dir.source(Path::new("persisted")).unwrap();
        assert_eq!(source.as_slice(), b"on disk");
    }

    #[test]
    fn test_open_write_existing_fails() {
        let tmp = TempDir::new().unwrap();
        let dir = MmapDirectory::open(tmp.path()).unwrap();
        drop(dir.open_write(Path::new("once")).unwrap());
        assert!(matches!(
            dir.open_write(Path::new("once")),
            Err(StorageError::FileAlreadyExists(_))
        ));
    }

    #[test]
    fn test_missing_file() {
        let tmp = TempDir::new().unwrap();
        let dir = MmapDirectory::open(tmp.path()).unwrap();
        assert!(matches!(
            dir.source(Path::new("ghost")),
            Err(StorageError::FileNotFound(_))
        ));
        assert!(matches!(
            dir.remove(Path::new("ghost")),
            Err(StorageError::FileNotFound(_))
        ));
    }

    #[test]
    fn test_empty_file_reads_as_empty_source() {
        let tmp = TempDir::new().unwrap();
        let dir = MmapDirectory::open(tmp.path()).unwrap();
        drop(dir.open_write(Path::new("empty")).unwrap());
        assert!(dir.source(Path::new("empty")).unwrap().is_empty());
    }

    #[test]
    fn test_source_survives_remove() {
        let tmp = TempDir::new().unwrap();
        let dir = MmapDirectory::open(tmp.path()).unwrap();
        let path = Path::new("doomed");
        {
            let mut writer = dir.open_write(path).unwrap();
            writer.write_all(b"mapped bytes").unwrap();
        }
        let source = dir.source(path).unwrap();
        dir.remove(path).unwrap();
        assert_eq!(source.as_slice(), b"mapped bytes");
    }

    #[test]
    fn test_replace_content() {
        let tmp = TempDir::new().unwrap();
        let dir = MmapDirectory::open(tmp.path()).unwrap();
        let path = Path::new("swap");
        dir.replace_content(path, b"first").unwrap();
        let old = dir.source(path).unwrap();
        dir.replace_content(path, b"second").unwrap();
        assert_eq!(old.as_slice(), b"first");
        assert_eq!(dir.source(path).unwrap().as_slice(), b"second");
    }
}
