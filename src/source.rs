//! Read-only byte sources handed out by directories.

use bytes::Bytes;
use memmap2::Mmap;
use std::ops::{Deref, Range};
use std::sync::Arc;

/// A reference-counted, immutable view over a file's bytes.
///
/// Cloning is O(1) and shares the backing storage. Whatever happens to the
/// directory entry the source came from (removal, replacement), the bytes
/// seen through an existing source never change.
#[derive(Clone)]
pub enum ReadOnlySource {
    /// In-memory bytes, possibly a sub-slice view.
    Memory(Bytes),
    /// A view over a memory-mapped file region.
    Mmap {
        /// The shared mapping, kept alive by every view into it.
        mmap: Arc<Mmap>,
        /// The window of the mapping this source exposes.
        range: Range<usize>,
    },
}

impl ReadOnlySource {
    /// A zero-length source.
    pub fn empty() -> ReadOnlySource {
        ReadOnlySource::Memory(Bytes::new())
    }

    /// View the source's bytes.
    pub fn as_slice(&self) -> &[u8] {
        match self {
            ReadOnlySource::Memory(bytes) => bytes,
            ReadOnlySource::Mmap { mmap, range } => &mmap[range.clone()],
        }
    }

    /// Number of bytes in the source.
    pub fn len(&self) -> usize {
        match self {
            ReadOnlySource::Memory(bytes) => bytes.len(),
            ReadOnlySource::Mmap { range, .. } => range.len(),
        }
    }

    /// Whether the source is zero-length.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// A new source viewing `from..to` of this one, sharing the same backing
    /// storage.
    ///
    /// # Panics
    /// Panics if `from..to` is not a valid range within the source.
    pub fn slice(&self, from: usize, to: usize) -> ReadOnlySource {
        assert!(
            from <= to && to <= self.len(),
            "slice {from}..{to} out of bounds for source of {} bytes",
            self.len()
        );
        match self {
            ReadOnlySource::Memory(bytes) => ReadOnlySource::Memory(bytes.slice(from..to)),
            ReadOnlySource::Mmap { mmap, range } => ReadOnlySource::Mmap {
                mmap: Arc::clone(mmap),
                range: range.start + from..range.start + to,
            },
        }
    }
}

impl Deref for ReadOnlySource {
    type Target = [u8];

    fn deref(&self) -> &[u8] {
        self.as_slice()
    }
}

impl From<Bytes> for ReadOnlySource {
    fn from(bytes: Bytes) -> ReadOnlySource {
        ReadOnlySource::Memory(bytes)
    }
}

impl From<Vec<u8>> for ReadOnlySource {
    fn from(bytes: Vec<u8>) -> ReadOnlySource {
        ReadOnlySource::Memory(Bytes::from(bytes))
    }
}
