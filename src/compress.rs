//! Block compression strategies for the document store.
//!
//! The store's wire format is identical for every strategy because compressed
//! blocks are written length-prefixed; the reader runs the configured
//! strategy unconditionally over whatever the prefix delimits.

use crate::error::StoreError;

/// Compression applied to a store block before it is written out.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Compressor {
    /// Identity: blocks are stored uncompressed.
    #[default]
    None,
    /// LZ4 block compression with a prepended decompressed size.
    Lz4,
}

impl Compressor {
    /// Compress a block payload.
    pub fn compress(&self, uncompressed: &[u8]) -> Vec<u8> {
        match self {
            Compressor::None => uncompressed.to_vec(),
            Compressor::Lz4 => lz4_flex::compress_prepend_size(uncompressed),
        }
    }

    /// Decompress a block payload produced by [`Compressor::compress`].
    pub fn decompress(&self, compressed: &[u8]) -> Result<Vec<u8>, StoreError> {
        match self {
            Compressor::None => Ok(compressed.to_vec()),
            Compressor::Lz4 => lz4_flex::decompress_size_prepended(compressed)
                .map_err(|e| StoreError::Corrupted(format!("lz4 decompression failed: {e}"))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_identity_roundtrip() {
        let data = b"hello block".to_vec();
        let compressed = Compressor::None.compress(&data);
        assert_eq!(compressed, data);
        assert_eq!(Compressor::None.decompress(&compressed).unwrap(), data);
    }

    #[test]
    fn test_lz4_roundtrip() {
        let data = vec![42u8; 20_000];
        let compressed = Compressor::Lz4.compress(&data);
        assert!(compressed.len() < data.len());
        assert_eq!(Compressor::Lz4.decompress(&compressed).unwrap(), data);
    }

    #[test]
    fn test_lz4_rejects_garbage() {
        let err = Compressor::Lz4.decompress(&[0xff, 0xff, 0xff]).unwrap_err();
        assert!(matches!(err, StoreError::Corrupted(_)));
    }

    #[test]
    fn test_default_is_identity() {
        assert_eq!(Compressor::default(), Compressor::None);
    }
}
