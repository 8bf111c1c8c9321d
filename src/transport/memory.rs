//! In-memory transport
//!
//! HashMap-based transport with CAS versions and lazy TTL expiry. Used as
//! the in-process cache and as the test double for coordinator tests.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use parking_lot::RwLock;

use crate::error::Result;

use super::{AsyncTransport, CasResponse, CasToken, Fetched, StoreMode, StoredItem, Transport};

#[derive(Debug, Clone)]
struct MemoryEntry {
    item: StoredItem,
    cas: CasToken,
    expires_at: Option<Instant>,
}

impl MemoryEntry {
    fn is_live(&self, now: Instant) -> bool {
        self.expires_at.map_or(true, |at| now < at)
    }
}

/// Shared in-memory transport
///
/// Clones share the same entries, so a test can hand one clone to a
/// coordinator and inspect raw entries through another.
#[derive(Debug, Clone, Default)]
pub struct MemoryTransport {
    entries: Arc<RwLock<HashMap<String, MemoryEntry>>>,
    cas_counter: Arc<AtomicU64>,
}

impl MemoryTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of live entries
    pub fn len(&self) -> usize {
        let now = Instant::now();
        self.entries.read().values().filter(|e| e.is_live(now)).count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Raw item stored under a key, ignoring CAS
    pub fn raw(&self, key: &str) -> Option<StoredItem> {
        let now = Instant::now();
        self.entries
            .read()
            .get(key)
            .filter(|e| e.is_live(now))
            .map(|e| e.item.clone())
    }

    /// Sorted list of live keys
    pub fn keys(&self) -> Vec<String> {
        let now = Instant::now();
        let mut keys: Vec<String> = self
            .entries
            .read()
            .iter()
            .filter(|(_, e)| e.is_live(now))
            .map(|(k, _)| k.clone())
            .collect();
        keys.sort();
        keys
    }

    /// Relative TTL recorded for a key, rounded to whole seconds
    pub fn ttl_secs(&self, key: &str) -> Option<u64> {
        let now = Instant::now();
        let entries = self.entries.read();
        let entry = entries.get(key)?;
        Some(
            entry
                .expires_at
                .map_or(0, |at| at.saturating_duration_since(now).as_secs_f64().round() as u64),
        )
    }

    /// Drop every entry
    pub fn clear(&self) {
        self.entries.write().clear();
    }

    /// Evict expired entries, returning how many were dropped
    pub fn purge_expired(&self) -> usize {
        let now = Instant::now();
        let mut entries = self.entries.write();
        let before = entries.len();
        entries.retain(|_, e| e.is_live(now));
        before - entries.len()
    }

    fn next_cas(&self) -> CasToken {
        self.cas_counter.fetch_add(1, Ordering::Relaxed) + 1
    }

    fn entry(&self, item: StoredItem, ttl_secs: u32) -> MemoryEntry {
        let expires_at = (ttl_secs > 0).then(|| Instant::now() + Duration::from_secs(ttl_secs as u64));
        MemoryEntry {
            item,
            cas: self.next_cas(),
            expires_at,
        }
    }

    fn get_sync(&self, key: &str) -> Option<Fetched> {
        let now = Instant::now();
        self.entries
            .read()
            .get(key)
            .filter(|e| e.is_live(now))
            .map(|e| Fetched {
                item: e.item.clone(),
                cas: e.cas,
            })
    }

    fn store_sync(&self, mode: StoreMode, key: &str, item: StoredItem, ttl_secs: u32) -> bool {
        let now = Instant::now();
        let mut entries = self.entries.write();
        // Expired entries are only hidden by reads; writes evict them
        entries.retain(|_, e| e.is_live(now));
        if mode == StoreMode::Add && entries.contains_key(key) {
            return false;
        }
        let entry = self.entry(item, ttl_secs);
        entries.insert(key.to_string(), entry);
        true
    }

    fn cas_sync(&self, key: &str, item: StoredItem, ttl_secs: u32, expected: CasToken) -> CasResponse {
        let now = Instant::now();
        let mut entries = self.entries.write();
        let current = entries.get(key).filter(|e| e.is_live(now)).map(|e| e.cas);
        match current {
            None => CasResponse::NotFound,
            Some(cas) if cas != expected => CasResponse::Exists,
            Some(_) => {
                let entry = self.entry(item, ttl_secs);
                let cas = entry.cas;
                entries.insert(key.to_string(), entry);
                CasResponse::Stored(cas)
            }
        }
    }

    fn remove_sync(&self, key: &str) -> bool {
        let now = Instant::now();
        self.entries
            .write()
            .remove(key)
            .map_or(false, |e| e.is_live(now))
    }
}

impl Transport for MemoryTransport {
    fn get(&self, key: &str) -> Result<Option<Fetched>> {
        Ok(self.get_sync(key))
    }

    fn store(&self, mode: StoreMode, key: &str, item: StoredItem, ttl_secs: u32) -> Result<bool> {
        Ok(self.store_sync(mode, key, item, ttl_secs))
    }

    fn compare_and_swap(
        &self,
        key: &str,
        item: StoredItem,
        ttl_secs: u32,
        expected: CasToken,
    ) -> Result<CasResponse> {
        Ok(self.cas_sync(key, item, ttl_secs, expected))
    }

    fn remove(&self, key: &str) -> Result<bool> {
        Ok(self.remove_sync(key))
    }
}

#[async_trait]
impl AsyncTransport for MemoryTransport {
    async fn get(&self, key: &str) -> Result<Option<Fetched>> {
        Ok(self.get_sync(key))
    }

    async fn store(
        &self,
        mode: StoreMode,
        key: &str,
        item: StoredItem,
        ttl_secs: u32,
    ) -> Result<bool> {
        Ok(self.store_sync(mode, key, item, ttl_secs))
    }

    async fn compare_and_swap(
        &self,
        key: &str,
        item: StoredItem,
        ttl_secs: u32,
        expected: CasToken,
    ) -> Result<CasResponse> {
        Ok(self.cas_sync(key, item, ttl_secs, expected))
    }

    async fn remove(&self, key: &str) -> Result<bool> {
        Ok(self.remove_sync(key))
    }
}
