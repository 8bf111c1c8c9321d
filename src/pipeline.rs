//! Encoding pipeline
//!
//! The transport-free stages shared by the blocking and non-blocking
//! coordinators:
//!
//! ```text
//! write:  CacheValue ──encode──▶ payload ──compress──▶ payload ──split──▶ chunks
//! read:   chunks ──merge──▶ payload ──decompress──▶ payload ──decode──▶ CacheValue
//! ```

use std::sync::Arc;

use bytes::Bytes;

use crate::chunk::{chunk_key, declared_chunks, merge_chunks, split_payload};
use crate::codec::{decode_payload, encode_value, Encoded};
use crate::compression::PayloadCompressor;
use crate::config::Config;
use crate::error::{CacheError, Result};
use crate::registry::TypeRegistry;
use crate::transport::{Fetched, StoredItem};
use crate::value::{CacheValue, Scalar};

/// Entries to write for one logical value
#[derive(Debug)]
pub enum WritePlan {
    /// A single natively stored scalar
    Native(Scalar),

    /// Payload chunks in index order; chunk 0 carries the header
    Chunks(Vec<Bytes>),
}

impl WritePlan {
    /// Number of transport entries the plan occupies
    pub fn chunk_count(&self) -> usize {
        match self {
            WritePlan::Native(_) => 1,
            WritePlan::Chunks(chunks) => chunks.len(),
        }
    }

    /// Transport items in index order
    pub fn into_items(self) -> Vec<StoredItem> {
        match self {
            WritePlan::Native(scalar) => vec![StoredItem::Native(scalar)],
            WritePlan::Chunks(chunks) => chunks.into_iter().map(StoredItem::Payload).collect(),
        }
    }
}

/// What chunk 0 says about the rest of a value
#[derive(Debug)]
pub enum ReadPlan {
    /// Complete natively stored value
    Native(Scalar),

    /// Payload whose chunk 0 is `first`; `count` chunks in total
    Chunked { first: Bytes, count: usize },
}

impl ReadPlan {
    /// Inspect the item stored under the main key
    pub fn from_first(item: StoredItem) -> Result<Self> {
        match item {
            StoredItem::Native(scalar) => Ok(ReadPlan::Native(scalar)),
            StoredItem::Payload(first) => {
                let count = declared_chunks(&first)?;
                Ok(ReadPlan::Chunked { first, count })
            }
        }
    }
}

/// Reads chunk `index` of `key` out of a transport answer.
///
/// A missing entry, or a native value where a chunk belongs, is a miss for
/// the whole logical value.
pub fn tail_chunk(key: &str, index: usize, fetched: Option<Fetched>) -> Option<Bytes> {
    match fetched.map(|fetched| fetched.item) {
        Some(StoredItem::Payload(bytes)) => Some(bytes),
        Some(StoredItem::Native(_)) => {
            tracing::warn!(
                "Chunk '{}' holds a native value, treating as miss",
                chunk_key(key, index)
            );
            None
        }
        None => {
            tracing::debug!(
                "Chunk '{}' missing, treating '{}' as miss",
                chunk_key(key, index),
                key
            );
            None
        }
    }
}

/// A tail chunk write that did not go through
#[derive(Debug)]
pub enum TailFailure {
    /// The transport refused the write
    Refused,

    /// The transport returned an error
    Failed {
        key: String,
        chunk: usize,
        source: CacheError,
    },
}

impl TailFailure {
    /// Classify the transport answer for tail chunk `index`; `None` if stored
    pub fn from_write(key: &str, index: usize, result: Result<bool>) -> Option<Self> {
        match result {
            Ok(true) => None,
            Ok(false) => {
                tracing::warn!("Chunk {} of '{}' refused, rolling back", index, key);
                Some(TailFailure::Refused)
            }
            Err(e) => {
                tracing::warn!("Chunk {} of '{}' failed: {}, rolling back", index, key, e);
                Some(TailFailure::Failed {
                    key: key.to_string(),
                    chunk: index,
                    source: e,
                })
            }
        }
    }

    /// What the store reports once the rollback has run
    pub fn into_result(self) -> Result<bool> {
        match self {
            TailFailure::Refused => Ok(false),
            TailFailure::Failed { key, chunk, source } => Err(CacheError::PartialWrite {
                key,
                chunk,
                source: Box::new(source),
            }),
        }
    }
}

/// Keys to delete after tail chunk `failed` could not be written: the key
/// itself and chunks 1..failed
pub fn rollback_keys(key: &str, failed: usize) -> impl Iterator<Item = String> + '_ {
    (0..failed).map(move |index| chunk_key(key, index))
}

/// Log a rollback delete that failed; cleanup errors are never escalated
pub fn log_rollback_error(part_key: &str, error: &CacheError) {
    tracing::warn!("Rollback of '{}' failed: {}", part_key, error);
}

/// Immutable encode/compress/chunk configuration
#[derive(Debug)]
pub struct Pipeline {
    config: Arc<Config>,
    compressor: PayloadCompressor,
    registry: Arc<TypeRegistry>,
}

impl Pipeline {
    pub fn new(config: Config, registry: Arc<TypeRegistry>) -> Result<Self> {
        config.validate()?;
        let compressor = PayloadCompressor::from_config(&config);
        Ok(Self {
            config: Arc::new(config),
            compressor,
            registry,
        })
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn registry(&self) -> &TypeRegistry {
        &self.registry
    }

    /// Encode, compress and split a value
    pub fn prepare(&self, value: CacheValue) -> Result<WritePlan> {
        match encode_value(value, &self.registry, &self.config)? {
            Encoded::Native(scalar) => Ok(WritePlan::Native(scalar)),
            Encoded::Payload(payload) => {
                let payload = self.compressor.compress(payload)?;
                let chunks = split_payload(payload, &self.config)?;
                Ok(WritePlan::Chunks(chunks))
            }
        }
    }

    /// Merge, decompress and decode the chunks of one value
    pub fn finish(&self, chunks: Vec<Bytes>) -> Result<CacheValue> {
        let payload = merge_chunks(chunks);
        let payload = self.compressor.decompress(payload)?;
        decode_payload(payload, &self.registry)
    }
}

/// Reject keys the coordinators cannot address
pub fn validate_key(key: &str) -> Result<()> {
    if key.is_empty() {
        return Err(CacheError::InvalidArgument("key must not be empty".to_string()));
    }
    Ok(())
}
