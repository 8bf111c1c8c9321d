//! Store / Fetch Coordinator
//!
//! Runs the encoding pipeline against a blocking [`Transport`].
//!
//! ## Write Sequence
//! 1. Encode, compress and split the value
//! 2. Write chunk 0 under the key (Add, Set or CAS); stop on failure
//! 3. Write chunks 1..N-1 under derived keys with Set
//! 4. If chunk k fails, delete the key and chunks 1..k-1, report failure
//!
//! ## Read Sequence
//! 1. Read chunk 0; absent means miss
//! 2. Read chunks 1..N-1 in order; any absent chunk means miss
//! 3. Merge, decompress and decode
//!
//! Concurrent writers of one key are not serialized: chunk 0 of one writer
//! can end up next to tail chunks of another. CAS only guards chunk 0.

use std::sync::Arc;

use bytes::Bytes;

use crate::chunk::chunk_key;
use crate::config::Config;
use crate::error::{CacheError, Result};
use crate::pipeline::{
    log_rollback_error, rollback_keys, tail_chunk, validate_key, Pipeline, ReadPlan, TailFailure,
};
use crate::registry::TypeRegistry;
use crate::transport::{CasResponse, CasToken, StoreMode, StoredItem, Transport};
use crate::ttl::Expiration;
use crate::value::CacheValue;

/// Outcome of a conditional store
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CasOutcome {
    /// Stored; the caller must use this version for its next update
    Stored(CasToken),

    /// Another writer changed the entry; nothing was written
    Conflict,

    /// No entry under the key
    NotFound,

    /// Chunk 0 was swapped but a tail chunk was refused; the value was removed
    NotStored,
}

/// Coordinates multi-entry writes and reads over a blocking transport
pub struct StoreCoordinator<T: Transport> {
    transport: T,
    pipeline: Pipeline,
}

impl<T: Transport> StoreCoordinator<T> {
    pub fn new(transport: T, config: Config, registry: Arc<TypeRegistry>) -> Result<Self> {
        Ok(Self {
            transport,
            pipeline: Pipeline::new(config, registry)?,
        })
    }

    /// Store a value unconditionally (`Set`) or only if absent (`Add`).
    ///
    /// Returns `Ok(false)` when the transport refused a write; no part of
    /// the value is left behind in that case.
    pub fn store(
        &self,
        mode: StoreMode,
        key: &str,
        value: CacheValue,
        expiration: Expiration,
    ) -> Result<bool> {
        validate_key(key)?;
        let ttl = expiration.ttl_secs()?;
        let mut items = self.pipeline.prepare(value)?.into_items().into_iter();
        let first = items
            .next()
            .ok_or_else(|| CacheError::Encoding("empty write plan".to_string()))?;

        if !self.transport.store(mode, key, first, ttl)? {
            tracing::debug!("Store of '{}' refused ({:?})", key, mode);
            return Ok(false);
        }

        self.write_tail(key, items.collect(), ttl)
    }

    /// Store a value only if the entry still has version `version`
    pub fn check_and_store(
        &self,
        key: &str,
        value: CacheValue,
        version: CasToken,
        expiration: Expiration,
    ) -> Result<CasOutcome> {
        validate_key(key)?;
        let ttl = expiration.ttl_secs()?;
        let mut items = self.pipeline.prepare(value)?.into_items().into_iter();
        let first = items
            .next()
            .ok_or_else(|| CacheError::Encoding("empty write plan".to_string()))?;

        let new_version = match self.transport.compare_and_swap(key, first, ttl, version)? {
            CasResponse::Stored(new_version) => new_version,
            CasResponse::Exists => {
                tracing::debug!("CAS conflict on '{}' (expected version {})", key, version);
                return Ok(CasOutcome::Conflict);
            }
            CasResponse::NotFound => return Ok(CasOutcome::NotFound),
        };

        if self.write_tail(key, items.collect(), ttl)? {
            Ok(CasOutcome::Stored(new_version))
        } else {
            Ok(CasOutcome::NotStored)
        }
    }

    /// Read a value; `None` if it or any of its chunks is missing
    pub fn fetch(&self, key: &str) -> Result<Option<CacheValue>> {
        Ok(self.fetch_with_version(key)?.map(|(value, _)| value))
    }

    /// Read a value together with the version of its chunk 0
    pub fn fetch_with_version(&self, key: &str) -> Result<Option<(CacheValue, CasToken)>> {
        validate_key(key)?;
        let fetched = match self.transport.get(key)? {
            Some(fetched) => fetched,
            None => return Ok(None),
        };

        let (first, count) = match ReadPlan::from_first(fetched.item)? {
            ReadPlan::Native(scalar) => return Ok(Some((scalar.into(), fetched.cas))),
            ReadPlan::Chunked { first, count } => (first, count),
        };

        let mut chunks = Vec::with_capacity(count);
        chunks.push(first);
        for index in 1..count {
            match self.fetch_chunk(key, index)? {
                Some(chunk) => chunks.push(chunk),
                None => return Ok(None),
            }
        }

        let value = self.pipeline.finish(chunks)?;
        Ok(Some((value, fetched.cas)))
    }

    /// Delete a value and every chunk after it.
    ///
    /// Chunk keys are probed in order until one is missing; the chunk count
    /// itself is not consulted.
    pub fn remove(&self, key: &str) -> Result<bool> {
        validate_key(key)?;
        if !self.transport.remove(key)? {
            return Ok(false);
        }

        let mut index = 1;
        while self.transport.remove(&chunk_key(key, index))? {
            index += 1;
        }
        tracing::trace!("Removed '{}' and {} tail chunk(s)", key, index - 1);
        Ok(true)
    }

    /// Whether anything is stored under the key (chunk 0 only)
    pub fn contains(&self, key: &str) -> Result<bool> {
        validate_key(key)?;
        Ok(self.transport.get(key)?.is_some())
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    pub fn pipeline(&self) -> &Pipeline {
        &self.pipeline
    }

    fn fetch_chunk(&self, key: &str, index: usize) -> Result<Option<Bytes>> {
        let fetched = self.transport.get(&chunk_key(key, index))?;
        Ok(tail_chunk(key, index, fetched))
    }

    /// Write chunks 1.. and roll back on the first failure
    fn write_tail(&self, key: &str, tail: Vec<StoredItem>, ttl: u32) -> Result<bool> {
        for (offset, item) in tail.into_iter().enumerate() {
            let index = offset + 1;
            let result = self.transport.store(StoreMode::Set, &chunk_key(key, index), item, ttl);
            if let Some(failure) = TailFailure::from_write(key, index, result) {
                self.rollback(key, index);
                return failure.into_result();
            }
        }
        Ok(true)
    }

    /// Best-effort delete of the key and chunks 1..failed
    fn rollback(&self, key: &str, failed: usize) {
        for part_key in rollback_keys(key, failed) {
            if let Err(e) = self.transport.remove(&part_key) {
                log_rollback_error(&part_key, &e);
            }
        }
    }
}
