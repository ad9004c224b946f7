//! Error types for the docstore library.

use crate::codec::CodecError;
use crate::storage::StorageError;
use crate::types::DocId;
use thiserror::Error;

/// Top-level error type for docstore operations.
#[derive(Error, Debug)]
pub enum Error {
    /// Directory and source errors.
    #[error("storage error: {0}")]
    Storage(#[from] StorageError),

    /// Schema and JSON conversion errors.
    #[error("schema error: {0}")]
    Schema(#[from] SchemaError),

    /// Store writer/reader errors.
    #[error("store error: {0}")]
    Store(#[from] StoreError),

    /// Binary codec errors.
    #[error("codec error: {0}")]
    Codec(#[from] CodecError),

    /// I/O errors.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Errors raised by the schema and its JSON conversions.
#[derive(Error, Debug)]
pub enum SchemaError {
    /// Field name not declared in the schema.
    #[error("unknown field: {0}")]
    UnknownField(String),

    /// Two distinct non-unindexed text indexing modes cannot be combined.
    #[error("incompatible indexing options: {left} | {right}")]
    IncompatibleOptions {
        left: &'static str,
        right: &'static str,
    },

    /// A required key is absent from the JSON input.
    #[error("missing json key: {0}")]
    MissingJsonKey(String),

    /// A JSON value has the right kind but invalid content.
    #[error("invalid json value: {0}")]
    InvalidJsonValue(String),

    /// A JSON scalar kind with no corresponding field value type.
    #[error("unsupported value kind for field {0}")]
    UnsupportedValueKind(String),
}

/// Errors raised by the store writer and reader.
#[derive(Error, Debug)]
pub enum StoreError {
    /// Requested doc id is not covered by the offset tables.
    #[error("unknown doc id: {0}")]
    UnknownDocId(DocId),

    /// The store file failed a decode or consistency check.
    #[error("corrupted store: {0}")]
    Corrupted(String),

    /// Document encoding failed while writing.
    #[error("failed to encode document {doc_id}: {source}")]
    Encode {
        doc_id: DocId,
        #[source]
        source: CodecError,
    },

    /// Operation on a writer that was already closed.
    #[error("store writer already closed")]
    WriterClosed,

    /// I/O failure against the backing directory.
    #[error("store I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl StoreError {
    /// Wrap a codec failure observed while decoding, with positional context.
    pub(crate) fn corrupted(context: impl std::fmt::Display, source: CodecError) -> StoreError {
        StoreError::Corrupted(format!("{context}: {source}"))
    }
}

/// Result type for docstore operations.
pub type Result<T> = std::result::Result<T, Error>;
