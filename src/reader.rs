//! Store reader: random access to stored documents by id.
//!
//! Opening a reader parses the file trailer once: the header offset in the
//! last eight bytes, then the block offset table it points at. Lookups
//! binary-search that table for the owning block, decompress it, and resolve
//! the document through the block's own offset map. The most recently
//! decompressed block is kept around, so sequential ids in the same block
//! decompress only once.

use crate::codec::{read_bytes, BinaryCodec, CodecError};
use crate::compress::Compressor;
use crate::error::StoreError;
use crate::source::ReadOnlySource;
use crate::types::{DocId, Document, Field};
use crate::writer::OffsetIndex;
use std::collections::BTreeMap;
use std::io::Cursor;
use tracing::debug;

/// Reader over a sealed store file.
pub struct StoreReader {
    source: ReadOnlySource,
    compressor: Compressor,
    /// Block table normalized to start offsets, ascending by doc id.
    block_offsets: Vec<OffsetIndex>,
    current_block: Vec<u8>,
    current_block_offsets: BTreeMap<DocId, u64>,
    current_offset: Option<OffsetIndex>,
}

fn corrupted(context: &str, source: CodecError) -> StoreError {
    StoreError::corrupted(context, source)
}

impl StoreReader {
    /// Open a store file, parsing its header and block offset table.
    ///
    /// `compressor` must match the strategy the file was written with.
    pub fn open(source: ReadOnlySource, compressor: Compressor) -> Result<StoreReader, StoreError> {
        let data = source.as_slice();
        if data.len() < 8 {
            return Err(StoreError::Corrupted(format!(
                "file of {} bytes is too short for a header",
                data.len()
            )));
        }
        let header_start = data.len() - 8;
        let header_offset = u64::decode(&mut Cursor::new(&data[header_start..]))
            .map_err(|e| corrupted("header offset", e))?;
        let table_start = usize::try_from(header_offset)
            .ok()
            .filter(|&start| start <= header_start)
            .ok_or_else(|| {
                StoreError::Corrupted(format!("header offset {header_offset} out of bounds"))
            })?;

        let raw = Vec::<OffsetIndex>::decode(&mut Cursor::new(&data[table_start..header_start]))
            .map_err(|e| corrupted("block offset table", e))?;

        // The writer records cumulative bytes after each block; shift each
        // entry to the previous entry's value to obtain block starts.
        let mut block_offsets = Vec::with_capacity(raw.len());
        let mut start = 0u64;
        for entry in raw {
            block_offsets.push(OffsetIndex {
                doc_id: entry.doc_id,
                offset: start,
            });
            start = entry.offset;
        }
        debug!(blocks = block_offsets.len(), "opened store");

        Ok(StoreReader {
            source,
            compressor,
            block_offsets,
            current_block: Vec::new(),
            current_block_offsets: BTreeMap::new(),
            current_offset: None,
        })
    }

    /// The block covering `doc_id`: the first entry whose highest contained
    /// doc id is at least `doc_id`.
    fn block_offset(&self, doc_id: DocId) -> Result<OffsetIndex, StoreError> {
        let index = self
            .block_offsets
            .partition_point(|entry| entry.doc_id < doc_id);
        self.block_offsets
            .get(index)
            .copied()
            .ok_or(StoreError::UnknownDocId(doc_id))
    }

    /// Decompress the block starting at `block.offset` and parse its
    /// trailer into the intra-block offset map.
    fn read_block(&mut self, block: OffsetIndex) -> Result<(), StoreError> {
        let start = usize::try_from(block.offset)
            .ok()
            .filter(|&start| start < self.source.len())
            .ok_or_else(|| {
                StoreError::Corrupted(format!("block offset {} out of bounds", block.offset))
            })?;
        let compressed = read_bytes(&mut Cursor::new(&self.source.as_slice()[start..]))
            .map_err(|e| corrupted("compressed block", e))?;
        let uncompressed = self.compressor.decompress(&compressed)?;

        if uncompressed.len() < 8 {
            return Err(StoreError::Corrupted(
                "block too short for its trailer".to_string(),
            ));
        }
        let trailer_start = uncompressed.len() - 8;
        let prefix_length = u64::decode(&mut Cursor::new(&uncompressed[trailer_start..]))
            .map_err(|e| corrupted("block prefix length", e))?;
        let offsets_start = usize::try_from(prefix_length)
            .ok()
            .filter(|&offsets_start| offsets_start <= trailer_start)
            .ok_or_else(|| {
                StoreError::Corrupted(format!("block prefix length {prefix_length} out of bounds"))
            })?;
        let offsets = BTreeMap::<DocId, u64>::decode(&mut Cursor::new(
            &uncompressed[offsets_start..trailer_start],
        ))
        .map_err(|e| corrupted("block offset map", e))?;

        self.current_block = uncompressed;
        self.current_block_offsets = offsets;
        Ok(())
    }

    /// Number of documents in the store.
    pub fn doc_count(&self) -> DocId {
        self.block_offsets
            .last()
            .map(|entry| entry.doc_id + 1)
            .unwrap_or(0)
    }

    /// Iterate over all documents in doc-id order.
    ///
    /// Each block is decompressed once thanks to the current-block cache.
    pub fn iter(&mut self) -> impl Iterator<Item = Result<Document, StoreError>> + '_ {
        let doc_count = self.doc_count();
        (0..doc_count).map(move |doc_id| self.get(doc_id))
    }

    /// Retrieve the document stored under `doc_id`.
    pub fn get(&mut self, doc_id: DocId) -> Result<Document, StoreError> {
        let block = self.block_offset(doc_id)?;
        if self.current_offset != Some(block) || self.current_block.is_empty() {
            self.read_block(block)?;
            self.current_offset = Some(block);
        }

        let doc_offset = *self
            .current_block_offsets
            .get(&doc_id)
            .ok_or(StoreError::UnknownDocId(doc_id))?;
        let doc_start = usize::try_from(doc_offset)
            .ok()
            .filter(|&doc_start| doc_start < self.current_block.len())
            .ok_or_else(|| {
                StoreError::Corrupted(format!("doc {doc_id}: offset {doc_offset} out of bounds"))
            })?;

        let mut cursor = Cursor::new(&self.current_block[doc_start..]);
        let field_count = u64::decode(&mut cursor)
            .map_err(|e| corrupted(&format!("doc {doc_id} field count"), e))?;
        let mut fields = Vec::with_capacity(usize::try_from(field_count).unwrap_or(0).min(4096));
        for _ in 0..field_count {
            fields.push(
                Field::decode(&mut cursor).map_err(|e| corrupted(&format!("doc {doc_id}"), e))?,
            );
        }
        if fields.len() as u64 != field_count {
            return Err(StoreError::Corrupted(format!(
                "doc {doc_id}: expected {field_count} fields, decoded {}",
                fields.len()
            )));
        }
        Ok(Document::from_fields(fields))
    }
}
