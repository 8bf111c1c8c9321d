//! Payload compression
//!
//! Threshold-gated compression of everything after the payload header.
//! Small payloads are never compressed, even when they would shrink, to keep
//! the common path free of extra work.

use std::fmt::Debug;
use std::io::Write;
use std::sync::Arc;

use bytes::{BufMut, Bytes, BytesMut};

use crate::codec::{PayloadHeader, HEADER_SIZE};
use crate::config::{CompressionKind, Config};
use crate::error::{CacheError, Result};

/// A lossless compression algorithm
pub trait Compressor: Debug + Send + Sync {
    fn compress(&self, data: &[u8]) -> Result<Vec<u8>>;

    fn decompress(&self, data: &[u8]) -> Result<Vec<u8>>;

    /// Short algorithm name for logs
    fn name(&self) -> &'static str;
}

/// Zstandard
#[derive(Debug, Clone, Copy)]
pub struct ZstdCompressor {
    level: i32,
}

impl ZstdCompressor {
    pub fn new(level: i32) -> Self {
        Self { level }
    }
}

impl Default for ZstdCompressor {
    fn default() -> Self {
        Self::new(3)
    }
}

impl Compressor for ZstdCompressor {
    fn compress(&self, data: &[u8]) -> Result<Vec<u8>> {
        let mut encoder = zstd::Encoder::new(Vec::new(), self.level)
            .map_err(|e| CacheError::Compression(format!("Failed to create zstd encoder: {}", e)))?;
        encoder
            .write_all(data)
            .map_err(|e| CacheError::Compression(format!("Failed to compress: {}", e)))?;
        encoder
            .finish()
            .map_err(|e| CacheError::Compression(format!("Failed to finish compression: {}", e)))
    }

    fn decompress(&self, data: &[u8]) -> Result<Vec<u8>> {
        zstd::decode_all(data)
            .map_err(|e| CacheError::Compression(format!("Failed to decompress: {}", e)))
    }

    fn name(&self) -> &'static str {
        "zstd"
    }
}

/// LZ4 block format with the uncompressed size prepended
#[derive(Debug, Clone, Copy, Default)]
pub struct Lz4Compressor;

impl Compressor for Lz4Compressor {
    fn compress(&self, data: &[u8]) -> Result<Vec<u8>> {
        Ok(lz4_flex::compress_prepend_size(data))
    }

    fn decompress(&self, data: &[u8]) -> Result<Vec<u8>> {
        lz4_flex::decompress_size_prepended(data)
            .map_err(|e| CacheError::Compression(format!("Failed to decompress: {}", e)))
    }

    fn name(&self) -> &'static str {
        "lz4"
    }
}

/// Build the compressor for a configured algorithm
pub fn compressor_for(kind: CompressionKind) -> Option<Arc<dyn Compressor>> {
    match kind {
        CompressionKind::None => None,
        CompressionKind::Zstd { level } => Some(Arc::new(ZstdCompressor::new(level))),
        CompressionKind::Lz4 => Some(Arc::new(Lz4Compressor)),
    }
}

/// Applies a compressor to payloads above the threshold
#[derive(Debug, Clone)]
pub struct PayloadCompressor {
    threshold: usize,
    compressor: Option<Arc<dyn Compressor>>,
}

impl PayloadCompressor {
    pub fn new(threshold: usize, compressor: Option<Arc<dyn Compressor>>) -> Self {
        Self {
            threshold,
            compressor,
        }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(config.compression_threshold, compressor_for(config.compression))
    }

    pub fn threshold(&self) -> usize {
        self.threshold
    }

    /// Compress everything after the header if the body is longer than the
    /// threshold. The type name does not count towards the body length.
    pub fn compress(&self, payload: BytesMut) -> Result<BytesMut> {
        let mut header = PayloadHeader::from_bytes(&payload)?;
        let section_len = payload.len() - HEADER_SIZE;
        let body_len = section_len.saturating_sub(header.type_name_len as usize);

        let compressor = match &self.compressor {
            Some(compressor) if body_len > self.threshold && !header.compressed => compressor,
            _ => return Ok(payload),
        };

        let compressed = compressor.compress(&payload[HEADER_SIZE..])?;
        tracing::trace!(
            "Compressed {} bytes to {} with {}",
            section_len,
            compressed.len(),
            compressor.name()
        );

        header.compressed = true;
        let mut out = BytesMut::with_capacity(HEADER_SIZE + compressed.len());
        out.put_slice(&header.to_bytes());
        out.put_slice(&compressed);
        Ok(out)
    }

    /// Undo [`compress`](Self::compress); payloads without the flag pass through
    pub fn decompress(&self, payload: Bytes) -> Result<Bytes> {
        let mut header = PayloadHeader::from_bytes(&payload)?;
        if !header.compressed {
            return Ok(payload);
        }

        let compressor = self.compressor.as_ref().ok_or_else(|| {
            CacheError::Corrupt("payload is compressed but compression is disabled".to_string())
        })?;
        let section = compressor.decompress(&payload[HEADER_SIZE..])?;

        header.compressed = false;
        let mut out = BytesMut::with_capacity(HEADER_SIZE + section.len());
        out.put_slice(&header.to_bytes());
        out.put_slice(&section);
        Ok(out.freeze())
    }
}
