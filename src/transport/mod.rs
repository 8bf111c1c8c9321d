//! Transport Module
//!
//! The boundary to the remote cache. A transport stores small flat entries
//! and knows nothing about payload headers, chunks or object types.
//!
//! ## Capabilities
//! - `get`: read an entry and its CAS version
//! - `store`: add-if-absent or unconditional set, with a relative TTL
//! - `compare_and_swap`: set only if the stored version matches
//! - `remove`: delete an entry
//!
//! Both a blocking ([`Transport`]) and a non-blocking ([`AsyncTransport`])
//! calling convention are supported. Implementations must be safe to call
//! from many threads at once; retries and connection handling are their own
//! business.

mod memory;

use async_trait::async_trait;
use bytes::Bytes;

use crate::error::Result;
use crate::value::Scalar;

pub use memory::MemoryTransport;

/// Opaque entry version returned by the transport
pub type CasToken = u64;

/// How an unconditional store treats an existing entry
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreMode {
    /// Only store if the key is absent
    Add,

    /// Overwrite any existing entry
    Set,
}

/// What the transport holds under one key
#[derive(Debug, Clone, PartialEq)]
pub enum StoredItem {
    /// Scalar or short string, encoded by the transport itself
    Native(Scalar),

    /// Encoded payload or one chunk of it
    Payload(Bytes),
}

impl StoredItem {
    /// Entry size as seen by the transport (payloads only)
    pub fn payload_len(&self) -> Option<usize> {
        match self {
            StoredItem::Payload(bytes) => Some(bytes.len()),
            StoredItem::Native(_) => None,
        }
    }
}

/// An entry read from the transport
#[derive(Debug, Clone, PartialEq)]
pub struct Fetched {
    pub item: StoredItem,
    pub cas: CasToken,
}

/// Result of a compare-and-swap
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CasResponse {
    /// Stored; carries the entry's new version
    Stored(CasToken),

    /// The entry exists with a different version
    Exists,

    /// No entry under the key
    NotFound,
}

/// Blocking transport
pub trait Transport: Send + Sync {
    fn get(&self, key: &str) -> Result<Option<Fetched>>;

    /// Returns false when the store was refused (e.g. `Add` on an existing key)
    fn store(&self, mode: StoreMode, key: &str, item: StoredItem, ttl_secs: u32) -> Result<bool>;

    fn compare_and_swap(
        &self,
        key: &str,
        item: StoredItem,
        ttl_secs: u32,
        expected: CasToken,
    ) -> Result<CasResponse>;

    /// Returns false when nothing was stored under the key
    fn remove(&self, key: &str) -> Result<bool>;
}

/// Non-blocking transport
#[async_trait]
pub trait AsyncTransport: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<Fetched>>;

    async fn store(&self, mode: StoreMode, key: &str, item: StoredItem, ttl_secs: u32)
        -> Result<bool>;

    async fn compare_and_swap(
        &self,
        key: &str,
        item: StoredItem,
        ttl_secs: u32,
        expected: CasToken,
    ) -> Result<CasResponse>;

    async fn remove(&self, key: &str) -> Result<bool>;
}
