//! Async Store / Fetch Coordinator
//!
//! Same sequences as [`StoreCoordinator`](crate::coordinator::StoreCoordinator),
//! awaiting an [`AsyncTransport`] instead of blocking on one.
//!
//! Dropping a store future part way through stops further chunk writes.
//! Chunks already written are left for their TTL to reclaim; no rollback
//! runs for a cancelled call.

use std::sync::Arc;

use bytes::Bytes;

use crate::chunk::chunk_key;
use crate::config::Config;
use crate::coordinator::CasOutcome;
use crate::error::{CacheError, Result};
use crate::pipeline::{
    log_rollback_error, rollback_keys, tail_chunk, validate_key, Pipeline, ReadPlan, TailFailure,
};
use crate::registry::TypeRegistry;
use crate::transport::{AsyncTransport, CasResponse, CasToken, StoreMode, StoredItem};
use crate::ttl::Expiration;
use crate::value::CacheValue;

/// Coordinates multi-entry writes and reads over a non-blocking transport
pub struct AsyncStoreCoordinator<T: AsyncTransport> {
    transport: T,
    pipeline: Pipeline,
}

impl<T: AsyncTransport> AsyncStoreCoordinator<T> {
    pub fn new(transport: T, config: Config, registry: Arc<TypeRegistry>) -> Result<Self> {
        Ok(Self {
            transport,
            pipeline: Pipeline::new(config, registry)?,
        })
    }

    pub async fn store(
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

        if !self.transport.store(mode, key, first, ttl).await? {
            tracing::debug!("Store of '{}' refused ({:?})", key, mode);
            return Ok(false);
        }

        self.write_tail(key, items.collect(), ttl).await
    }

    pub async fn check_and_store(
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

        let new_version = match self
            .transport
            .compare_and_swap(key, first, ttl, version)
            .await?
        {
            CasResponse::Stored(new_version) => new_version,
            CasResponse::Exists => {
                tracing::debug!("CAS conflict on '{}' (expected version {})", key, version);
                return Ok(CasOutcome::Conflict);
            }
            CasResponse::NotFound => return Ok(CasOutcome::NotFound),
        };

        if self.write_tail(key, items.collect(), ttl).await? {
            Ok(CasOutcome::Stored(new_version))
        } else {
            Ok(CasOutcome::NotStored)
        }
    }

    pub async fn fetch(&self, key: &str) -> Result<Option<CacheValue>> {
        Ok(self.fetch_with_version(key).await?.map(|(value, _)| value))
    }

    pub async fn fetch_with_version(&self, key: &str) -> Result<Option<(CacheValue, CasToken)>> {
        validate_key(key)?;
        let fetched = match self.transport.get(key).await? {
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
            match self.fetch_chunk(key, index).await? {
                Some(chunk) => chunks.push(chunk),
                None => return Ok(None),
            }
        }

        let value = self.pipeline.finish(chunks)?;
        Ok(Some((value, fetched.cas)))
    }

    pub async fn remove(&self, key: &str) -> Result<bool> {
        validate_key(key)?;
        if !self.transport.remove(key).await? {
            return Ok(false);
        }

        let mut index = 1;
        while self.transport.remove(&chunk_key(key, index)).await? {
            index += 1;
        }
        tracing::trace!("Removed '{}' and {} tail chunk(s)", key, index - 1);
        Ok(true)
    }

    pub async fn contains(&self, key: &str) -> Result<bool> {
        validate_key(key)?;
        Ok(self.transport.get(key).await?.is_some())
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    pub fn pipeline(&self) -> &Pipeline {
        &self.pipeline
    }

    async fn fetch_chunk(&self, key: &str, index: usize) -> Result<Option<Bytes>> {
        let fetched = self.transport.get(&chunk_key(key, index)).await?;
        Ok(tail_chunk(key, index, fetched))
    }

    async fn write_tail(&self, key: &str, tail: Vec<StoredItem>, ttl: u32) -> Result<bool> {
        for (offset, item) in tail.into_iter().enumerate() {
            let index = offset + 1;
            let result = self
                .transport
                .store(StoreMode::Set, &chunk_key(key, index), item, ttl)
                .await;
            if let Some(failure) = TailFailure::from_write(key, index, result) {
                self.rollback(key, index).await;
                return failure.into_result();
            }
        }
        Ok(true)
    }

    async fn rollback(&self, key: &str, failed: usize) {
        for part_key in rollback_keys(key, failed) {
            if let Err(e) = self.transport.remove(&part_key).await {
                log_rollback_error(&part_key, &e);
            }
        }
    }
}
