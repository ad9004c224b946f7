//! Length-prefixed binary encoding for the store's on-disk structures.
//!
//! Every shape encoded here is self-describing: integers are fixed-width
//! little-endian, strings and byte sequences carry a `u64` length prefix,
//! sequences and maps carry a `u64` element count. The stream needs no
//! external schema to be decoded.

use std::collections::BTreeMap;
use std::io::{Read, Write};
use thiserror::Error;

/// Errors raised by the binary codec.
#[derive(Error, Debug)]
pub enum CodecError {
    /// Write-side failure from the underlying writer.
    #[error("encode failed: {0}")]
    EncodeFailed(#[source] std::io::Error),

    /// Read-side failure: short read, invalid tag, or size mismatch.
    #[error("decode failed: {0}")]
    DecodeFailed(String),
}

/// Result type for codec operations.
pub type CodecResult<T> = std::result::Result<T, CodecError>;

impl CodecError {
    pub(crate) fn decode(msg: impl Into<String>) -> CodecError {
        CodecError::DecodeFailed(msg.into())
    }
}

/// A type with a bijective binary encoding.
///
/// `decode(encode(value))` always yields the original value; the encoded
/// length returned by [`BinaryCodec::encode`] is exact.
pub trait BinaryCodec: Sized {
    /// Encode `self` into `writer`, returning the number of bytes written.
    fn encode<W: Write>(&self, writer: &mut W) -> CodecResult<u64>;

    /// Decode a value of this type from `reader`.
    fn decode<R: Read>(reader: &mut R) -> CodecResult<Self>;
}

fn write_all<W: Write>(writer: &mut W, bytes: &[u8]) -> CodecResult<u64> {
    writer
        .write_all(bytes)
        .map_err(CodecError::EncodeFailed)?;
    Ok(bytes.len() as u64)
}

fn read_exact<R: Read>(reader: &mut R, buf: &mut [u8]) -> CodecResult<()> {
    reader
        .read_exact(buf)
        .map_err(|e| CodecError::decode(format!("short read: {e}")))
}

fn checked_len(len: u64) -> CodecResult<usize> {
    usize::try_from(len).map_err(|_| CodecError::decode(format!("length {len} exceeds usize")))
}

impl BinaryCodec for u8 {
    fn encode<W: Write>(&self, writer: &mut W) -> CodecResult<u64> {
        write_all(writer, &[*self])
    }

    fn decode<R: Read>(reader: &mut R) -> CodecResult<Self> {
        let mut buf = [0u8; 1];
        read_exact(reader, &mut buf)?;
        Ok(buf[0])
    }
}

impl BinaryCodec for u32 {
    fn encode<W: Write>(&self, writer: &mut W) -> CodecResult<u64> {
        write_all(writer, &self.to_le_bytes())
    }

    fn decode<R: Read>(reader: &mut R) -> CodecResult<Self> {
        let mut buf = [0u8; 4];
        read_exact(reader, &mut buf)?;
        Ok(u32::from_le_bytes(buf))
    }
}

impl BinaryCodec for u64 {
    fn encode<W: Write>(&self, writer: &mut W) -> CodecResult<u64> {
        write_all(writer, &self.to_le_bytes())
    }

    fn decode<R: Read>(reader: &mut R) -> CodecResult<Self> {
        let mut buf = [0u8; 8];
        read_exact(reader, &mut buf)?;
        Ok(u64::from_le_bytes(buf))
    }
}

impl BinaryCodec for bool {
    fn encode<W: Write>(&self, writer: &mut W) -> CodecResult<u64> {
        (*self as u8).encode(writer)
    }

    fn decode<R: Read>(reader: &mut R) -> CodecResult<Self> {
        match u8::decode(reader)? {
            0 => Ok(false),
            1 => Ok(true),
            other => Err(CodecError::decode(format!("invalid bool byte {other}"))),
        }
    }
}

impl BinaryCodec for String {
    fn encode<W: Write>(&self, writer: &mut W) -> CodecResult<u64> {
        let written = (self.len() as u64).encode(writer)?;
        Ok(written + write_all(writer, self.as_bytes())?)
    }

    fn decode<R: Read>(reader: &mut R) -> CodecResult<Self> {
        let bytes = read_bytes(reader)?;
        String::from_utf8(bytes).map_err(|e| CodecError::decode(format!("invalid utf-8: {e}")))
    }
}

impl<T: BinaryCodec> BinaryCodec for Vec<T> {
    fn encode<W: Write>(&self, writer: &mut W) -> CodecResult<u64> {
        let mut written = (self.len() as u64).encode(writer)?;
        for item in self {
            written += item.encode(writer)?;
        }
        Ok(written)
    }

    fn decode<R: Read>(reader: &mut R) -> CodecResult<Self> {
        let len = checked_len(u64::decode(reader)?)?;
        let mut items = Vec::with_capacity(len.min(4096));
        for _ in 0..len {
            items.push(T::decode(reader)?);
        }
        Ok(items)
    }
}

impl<K: BinaryCodec + Ord, V: BinaryCodec> BinaryCodec for BTreeMap<K, V> {
    fn encode<W: Write>(&self, writer: &mut W) -> CodecResult<u64> {
        let mut written = (self.len() as u64).encode(writer)?;
        // BTreeMap iteration is ascending by key, which is the wire order.
        for (key, value) in self {
            written += key.encode(writer)?;
            written += value.encode(writer)?;
        }
        Ok(written)
    }

    fn decode<R: Read>(reader: &mut R) -> CodecResult<Self> {
        let len = checked_len(u64::decode(reader)?)?;
        let mut map = BTreeMap::new();
        for _ in 0..len {
            let key = K::decode(reader)?;
            let value = V::decode(reader)?;
            map.insert(key, value);
        }
        Ok(map)
    }
}

/// Write a raw byte sequence with a `u64` length prefix.
pub fn write_bytes<W: Write>(writer: &mut W, bytes: &[u8]) -> CodecResult<u64> {
    let written = (bytes.len() as u64).encode(writer)?;
    Ok(written + write_all(writer, bytes)?)
}

/// Read a `u64`-length-prefixed byte sequence.
pub fn read_bytes<R: Read>(reader: &mut R) -> CodecResult<Vec<u8>> {
    let len = checked_len(u64::decode(reader)?)?;
    let mut bytes = vec![0u8; len];
    read_exact(reader, &mut bytes)?;
    Ok(bytes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn roundtrip<T: BinaryCodec + PartialEq + std::fmt::Debug>(value: T) {
        let mut buf = Vec::new();
        let written = value.encode(&mut buf).unwrap();
        assert_eq!(written as usize, buf.len());
        let decoded = T::decode(&mut Cursor::new(&buf)).unwrap();
        assert_eq!(decoded, value);
    }

    #[test]
    fn test_primitives_roundtrip() {
        roundtrip(0u8);
        roundtrip(255u8);
        roundtrip(0u32);
        roundtrip(u32::MAX);
        roundtrip(0u64);
        roundtrip(u64::MAX);
        roundtrip(true);
        roundtrip(false);
    }

    #[test]
    fn test_string_roundtrip() {
        roundtrip(String::new());
        roundtrip("Hello, World!".to_string());
        roundtrip("snowman \u{2603}".to_string());
    }

    #[test]
    fn test_vec_roundtrip() {
        roundtrip(Vec::<u32>::new());
        roundtrip(vec![1u32, 2, 3]);
        roundtrip(vec!["a".to_string(), "b".to_string()]);
    }

    #[test]
    fn test_map_roundtrip() {
        let mut map = BTreeMap::new();
        map.insert(3u32, 30u64);
        map.insert(1u32, 10u64);
        map.insert(2u32, 20u64);
        roundtrip(map);
    }

    #[test]
    fn test_map_keys_are_ascending_on_wire() {
        let mut map = BTreeMap::new();
        map.insert(7u32, 0u64);
        map.insert(2u32, 0u64);
        let mut buf = Vec::new();
        map.encode(&mut buf).unwrap();
        // count, then first key must be the smaller one
        let first_key = u32::from_le_bytes(buf[8..12].try_into().unwrap());
        assert_eq!(first_key, 2);
    }

    #[test]
    fn test_length_prefix_accounts_for_all_bytes() {
        let value = "abcdef".to_string();
        let mut buf = Vec::new();
        let written = value.encode(&mut buf).unwrap();
        assert_eq!(written, 8 + 6);
    }

    #[test]
    fn test_short_read_fails() {
        let mut buf = Vec::new();
        1234u64.encode(&mut buf).unwrap();
        buf.truncate(4);
        let err = u64::decode(&mut Cursor::new(&buf)).unwrap_err();
        assert!(matches!(err, CodecError::DecodeFailed(_)));
    }

    #[test]
    fn test_invalid_bool_byte_fails() {
        let buf = [2u8];
        let err = bool::decode(&mut Cursor::new(&buf[..])).unwrap_err();
        assert!(matches!(err, CodecError::DecodeFailed(_)));
    }

    #[test]
    fn test_bytes_helpers() {
        let mut buf = Vec::new();
        let written = write_bytes(&mut buf, b"payload").unwrap();
        assert_eq!(written, 8 + 7);
        let bytes = read_bytes(&mut Cursor::new(&buf)).unwrap();
        assert_eq!(bytes, b"payload");
    }
}
