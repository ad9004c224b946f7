//! docstore - A Rust library for schema-typed document storage.
//!
//! This library provides the storage core of a document search engine:
//! - **Typed schemas**: fields are declared up front with text or numeric
//!   options, and the schema doubles as a JSON codec for documents
//! - **Document store**: documents are batched into 16 KiB blocks,
//!   optionally LZ4-compressed, and retrievable at random by doc id
//! - **Directories**: a write-once-read-many container of named byte blobs,
//!   backed by RAM for tests or by memory-mapped files for persistence
//!
//! A store file is written once through [`StoreWriter`], sealed by `close`,
//! and then served read-only through [`StoreReader`] over a reference-counted
//! [`ReadOnlySource`].

pub mod codec;
pub mod compress;
pub mod error;
pub mod mmap_directory;
pub mod options;
pub mod ram_directory;
pub mod reader;
pub mod schema;
pub mod source;
pub mod storage;
pub mod types;
pub mod writer;

// Re-export commonly used types
pub use compress::Compressor;
pub use error::{Error, Result, SchemaError, StoreError};
pub use mmap_directory::MmapDirectory;
pub use options::{NumericOptions, TextIndexing, TextOptions, FAST, NUMERIC, STORED, STRING, TEXT};
pub use ram_directory::RamDirectory;
pub use reader::StoreReader;
pub use schema::{FieldEntry, FieldType, Schema, SchemaBuilder};
pub use source::ReadOnlySource;
pub use storage::{Directory, ReadHandle, StorageError, WritePtr};
pub use types::{DocId, Document, Field, FieldId, NamedDocument, Value};
pub use writer::{StoreWriter, BLOCK_SIZE};
