//! Payload header
//!
//! Fixed 4-byte header. The layout is defined byte by byte so it reads the
//! same on every platform.

use crate::error::{CacheError, Result};

/// Header size in bytes
pub const HEADER_SIZE: usize = 4;

/// Longest type name the 15-bit length field can describe
pub const MAX_TYPE_NAME_LEN: usize = 0x7FFF;

/// Largest chunk count the 16-bit field can describe
pub const MAX_CHUNK_COUNT: usize = u16::MAX as usize;

const COMPRESSED_FLAG: u8 = 0x80;

/// Decoded payload header
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PayloadHeader {
    /// Bytes after the header are compressed
    pub compressed: bool,

    /// Length of the UTF-8 type name following the header (0 = raw bytes)
    pub type_name_len: u16,

    /// Number of transport entries holding the payload
    pub chunk_count: u16,
}

impl PayloadHeader {
    /// Header for a fresh, uncompressed and not yet chunked payload
    pub fn new(type_name_len: usize) -> Result<Self> {
        if type_name_len > MAX_TYPE_NAME_LEN {
            return Err(CacheError::Encoding(format!(
                "type name is {} bytes (max {})",
                type_name_len, MAX_TYPE_NAME_LEN
            )));
        }
        Ok(Self {
            compressed: false,
            type_name_len: type_name_len as u16,
            chunk_count: 0,
        })
    }

    /// Encode to the 4-byte wire form
    pub fn to_bytes(&self) -> [u8; HEADER_SIZE] {
        let name_len = self.type_name_len & 0x7FFF;
        let mut byte0 = (name_len >> 8) as u8;
        if self.compressed {
            byte0 |= COMPRESSED_FLAG;
        }
        let count = self.chunk_count.to_be_bytes();
        [byte0, (name_len & 0xFF) as u8, count[0], count[1]]
    }

    /// Parse the header at the start of a payload
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        if bytes.len() < HEADER_SIZE {
            return Err(CacheError::Corrupt(format!(
                "incomplete header: expected {} bytes, got {}",
                HEADER_SIZE,
                bytes.len()
            )));
        }

        Ok(Self {
            compressed: bytes[0] & COMPRESSED_FLAG != 0,
            type_name_len: u16::from_be_bytes([bytes[0] & !COMPRESSED_FLAG, bytes[1]]),
            chunk_count: u16::from_be_bytes([bytes[2], bytes[3]]),
        })
    }

    /// Overwrite the header at the start of `buf`
    pub fn write_to(&self, buf: &mut [u8]) {
        buf[..HEADER_SIZE].copy_from_slice(&self.to_bytes());
    }
}
