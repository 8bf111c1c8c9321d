//! Configuration for chunkcache
//!
//! Centralized configuration with sensible defaults. A coordinator takes its
//! config at construction and never mutates it afterwards.

use crate::error::{CacheError, Result};

/// Main configuration for the encoding pipeline
#[derive(Debug, Clone)]
pub struct Config {
    // -------------------------------------------------------------------------
    // Compression Configuration
    // -------------------------------------------------------------------------
    /// Payloads whose post-header section is longer than this get compressed
    pub compression_threshold: usize,

    /// Algorithm used above the compression threshold
    pub compression: CompressionKind,

    // -------------------------------------------------------------------------
    // Chunking Configuration
    // -------------------------------------------------------------------------
    /// Largest payload stored as a single entry (in bytes).
    /// Sized below the transport's per-entry limit to leave room for the key
    /// and item metadata.
    pub chunk_threshold: usize,

    /// A split remainder larger than this gets its own trailing chunk
    pub remainder_chunk_min: usize,

    // -------------------------------------------------------------------------
    // Encoding Configuration
    // -------------------------------------------------------------------------
    /// Strings with fewer characters than this bypass the payload encoder
    pub native_text_limit: usize,
}

/// Compression algorithm applied to large payloads
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompressionKind {
    /// Never compress
    None,

    /// Zstandard at the given level
    Zstd { level: i32 },

    /// LZ4 block format with a size prefix
    Lz4,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            compression_threshold: 100_000,
            compression: CompressionKind::Zstd { level: 3 },
            chunk_threshold: 252_400,
            remainder_chunk_min: 100,
            native_text_limit: 65_537,
        }
    }
}

impl Config {
    /// Create a new config builder
    pub fn builder() -> ConfigBuilder {
        ConfigBuilder::default()
    }

    /// Check that the thresholds describe a usable pipeline
    pub fn validate(&self) -> Result<()> {
        if self.chunk_threshold <= crate::codec::HEADER_SIZE {
            return Err(CacheError::Config(format!(
                "chunk_threshold must exceed the {}-byte header, got {}",
                crate::codec::HEADER_SIZE,
                self.chunk_threshold
            )));
        }
        if let CompressionKind::Zstd { level } = self.compression {
            if !(1..=22).contains(&level) {
                return Err(CacheError::Config(format!(
                    "zstd level must be within 1..=22, got {}",
                    level
                )));
            }
        }
        Ok(())
    }
}

/// Builder for Config
#[derive(Default)]
pub struct ConfigBuilder {
    config: Config,
}

impl ConfigBuilder {
    /// Set the compression threshold (in bytes)
    pub fn compression_threshold(mut self, bytes: usize) -> Self {
        self.config.compression_threshold = bytes;
        self
    }

    /// Set the compression algorithm
    pub fn compression(mut self, kind: CompressionKind) -> Self {
        self.config.compression = kind;
        self
    }

    /// Set the single-entry size limit (in bytes)
    pub fn chunk_threshold(mut self, bytes: usize) -> Self {
        self.config.chunk_threshold = bytes;
        self
    }

    /// Set the minimum remainder that earns a dedicated chunk
    pub fn remainder_chunk_min(mut self, bytes: usize) -> Self {
        self.config.remainder_chunk_min = bytes;
        self
    }

    /// Set the character limit for natively stored strings
    pub fn native_text_limit(mut self, chars: usize) -> Self {
        self.config.native_text_limit = chars;
        self
    }

    pub fn build(self) -> Config {
        self.config
    }
}
