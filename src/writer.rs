//! Store writer: serializes documents into compressed, random-accessible
//! blocks.
//!
//! Documents are appended to an in-memory block; once the block grows past
//! the size threshold it is compressed and written out, preceded by nothing
//! and followed by nothing — the block carries its own trailer (intra-block
//! offsets plus their position) so the reader can locate documents without
//! any side table.

use crate::codec::{write_bytes, BinaryCodec, CodecError, CodecResult};
use crate::compress::Compressor;
use crate::error::StoreError;
use crate::storage::WritePtr;
use crate::types::{DocId, Document};
use std::collections::BTreeMap;
use std::io::Write;
use tracing::debug;

/// Uncompressed block size threshold in bytes; a block is flushed once it
/// grows past this.
pub const BLOCK_SIZE: usize = 16_384;

/// One entry of the block offset table.
///
/// In the emitted table, `doc_id` is the highest doc id contained in the
/// block and `offset` the cumulative payload bytes written once the block
/// was out. The reader shifts the offsets back to block starts on load.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OffsetIndex {
    /// Highest doc id stored in the block.
    pub doc_id: DocId,
    /// Cumulative payload bytes after the block.
    pub offset: u64,
}

impl BinaryCodec for OffsetIndex {
    fn encode<W: Write>(&self, writer: &mut W) -> CodecResult<u64> {
        Ok(self.doc_id.encode(writer)? + self.offset.encode(writer)?)
    }

    fn decode<R: std::io::Read>(reader: &mut R) -> CodecResult<OffsetIndex> {
        Ok(OffsetIndex {
            doc_id: DocId::decode(reader)?,
            offset: u64::decode(reader)?,
        })
    }
}

/// Writer producing a store file from a stream of documents.
///
/// Doc ids are assigned incrementally in submission order. The file is
/// sealed by [`StoreWriter::close`]; dropping an unclosed writer closes it,
/// discarding any error.
pub struct StoreWriter {
    writer: WritePtr,
    compressor: Compressor,
    block_size: usize,
    doc_id: DocId,
    written: u64,
    current_block: Vec<u8>,
    current_block_offsets: BTreeMap<DocId, u64>,
    block_offsets: Vec<OffsetIndex>,
    closed: bool,
}

impl StoreWriter {
    /// Create a writer emitting into `writer` with the given compression
    /// strategy and block size threshold.
    pub fn new(writer: WritePtr, compressor: Compressor, block_size: usize) -> StoreWriter {
        StoreWriter {
            writer,
            compressor,
            block_size,
            doc_id: 0,
            written: 0,
            current_block: Vec::new(),
            current_block_offsets: BTreeMap::new(),
            block_offsets: Vec::new(),
            closed: false,
        }
    }

    fn encode_error(&self, source: CodecError) -> StoreError {
        StoreError::Encode {
            doc_id: self.doc_id,
            source,
        }
    }

    /// Append a document and return its assigned id.
    pub fn store(&mut self, doc: &Document) -> Result<DocId, StoreError> {
        if self.closed {
            return Err(StoreError::WriterClosed);
        }
        let doc_start = self.current_block.len() as u64;
        let fields = doc.get_fields();
        (fields.len() as u64)
            .encode(&mut self.current_block)
            .map_err(|e| self.encode_error(e))?;
        for field in fields {
            field
                .encode(&mut self.current_block)
                .map_err(|e| self.encode_error(e))?;
        }
        self.current_block_offsets.insert(self.doc_id, doc_start);
        let assigned = self.doc_id;
        self.doc_id += 1;

        if self.current_block.len() > self.block_size {
            self.flush_block()?;
        }
        Ok(assigned)
    }

    /// Seal the current block: append the intra-block offset map and its
    /// position, compress, and emit as one length-prefixed byte sequence.
    fn flush_block(&mut self) -> Result<(), StoreError> {
        let prefix_length = self.current_block.len() as u64;
        let offsets = std::mem::take(&mut self.current_block_offsets);
        offsets
            .encode(&mut self.current_block)
            .map_err(|e| self.encode_error(e))?;
        prefix_length
            .encode(&mut self.current_block)
            .map_err(|e| self.encode_error(e))?;

        let compressed = self.compressor.compress(&self.current_block);
        let emitted =
            write_bytes(&mut self.writer, &compressed).map_err(|e| self.encode_error(e))?;
        self.written += emitted;

        // The block cannot be empty here, so doc_id - 1 is its last doc.
        self.block_offsets.push(OffsetIndex {
            doc_id: self.doc_id - 1,
            offset: self.written,
        });
        debug!(
            docs = offsets.len(),
            uncompressed = prefix_length,
            compressed = compressed.len(),
            "flushed store block"
        );
        self.current_block.clear();
        Ok(())
    }

    /// Flush the pending block, write the block offset table and the header
    /// offset, and seal the underlying writer.
    ///
    /// Closing twice is a no-op.
    pub fn close(&mut self) -> Result<(), StoreError> {
        if self.closed {
            return Ok(());
        }
        if !self.current_block.is_empty() {
            self.flush_block()?;
        }
        self.block_offsets
            .encode(&mut self.writer)
            .map_err(|e| self.encode_error(e))?;
        // Payload length before the offsets table; the reader seeks here.
        self.written
            .encode(&mut self.writer)
            .map_err(|e| self.encode_error(e))?;
        self.writer.flush()?;
        self.closed = true;
        Ok(())
    }
}

impl Drop for StoreWriter {
    fn drop(&mut self) {
        let _ = self.close();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ram_directory::RamDirectory;
    use crate::storage::Directory;
    use std::io::Cursor;
    use std::path::Path;

    fn ram_writer(dir: &RamDirectory) -> WritePtr {
        dir.open_write(Path::new("store")).unwrap()
    }

    #[test]
    fn test_offset_index_roundtrip() {
        let entry = OffsetIndex {
            doc_id: 41,
            offset: 16_500,
        };
        let mut buf = Vec::new();
        let written = entry.encode(&mut buf).unwrap();
        assert_eq!(written, 12);
        assert_eq!(OffsetIndex::decode(&mut Cursor::new(&buf)).unwrap(), entry);
    }

    #[test]
    fn test_doc_ids_are_sequential() {
        let dir = RamDirectory::create();
        let mut writer = StoreWriter::new(ram_writer(&dir), Compressor::None, BLOCK_SIZE);
        let mut doc = Document::new();
        doc.add_text(0, "payload");
        assert_eq!(writer.store(&doc).unwrap(), 0);
        assert_eq!(writer.store(&doc).unwrap(), 1);
        assert_eq!(writer.store(&doc).unwrap(), 2);
        writer.close().unwrap();
    }

    #[test]
    fn test_store_after_close_fails() {
        let dir = RamDirectory::create();
        let mut writer = StoreWriter::new(ram_writer(&dir), Compressor::None, BLOCK_SIZE);
        writer.close().unwrap();
        let mut doc = Document::new();
        doc.add_u32(0, 1);
        assert!(matches!(
            writer.store(&doc),
            Err(StoreError::WriterClosed)
        ));
        // double close is a no-op
        writer.close().unwrap();
    }

    #[test]
    fn test_small_block_size_emits_multiple_blocks() {
        let dir = RamDirectory::create();
        {
            let mut writer = StoreWriter::new(ram_writer(&dir), Compressor::None, 64);
            for i in 0..10u32 {
                let mut doc = Document::new();
                doc.add_text(0, format!("document number {i} with some padding"));
                writer.store(&doc).unwrap();
            }
            writer.close().unwrap();
        }
        let source = dir.source(Path::new("store")).unwrap();
        // header offset points strictly inside the file
        let header_offset = u64::from_le_bytes(
            source.as_slice()[source.len() - 8..].try_into().unwrap(),
        );
        assert!(header_offset > 0 && (header_offset as usize) < source.len());
        let table =
            Vec::<OffsetIndex>::decode(&mut Cursor::new(&source.as_slice()[header_offset as usize..]))
                .unwrap();
        assert!(table.len() > 1);
        assert_eq!(table.last().unwrap().doc_id, 9);
        assert_eq!(table.last().unwrap().offset, header_offset);
    }

    #[test]
    fn test_drop_closes_writer() {
        let dir = RamDirectory::create();
        {
            let mut writer = StoreWriter::new(ram_writer(&dir), Compressor::None, BLOCK_SIZE);
            let mut doc = Document::new();
            doc.add_text(0, "sealed by drop");
            writer.store(&doc).unwrap();
        }
        let source = dir.source(Path::new("store")).unwrap();
        assert!(source.len() > 8);
    }
}
