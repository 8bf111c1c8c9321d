//! # chunkcache
//!
//! Value-encoding pipeline for distributed cache clients. Lets a transport
//! limited to small flat entries store arbitrarily large, arbitrarily typed
//! values:
//! - Typed payloads with a compact 4-byte header
//! - Threshold-gated compression (zstd or lz4)
//! - Transparent chunking across derived keys
//! - Compare-and-swap updates and rollback of partial writes
//!
//! ## Architecture Overview
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                 Cache / AsyncCache facade                    │
//! └─────────────────────┬───────────────────────────────────────┘
//!                       │
//! ┌─────────────────────▼───────────────────────────────────────┐
//! │            StoreCoordinator / AsyncStoreCoordinator          │
//! │        (chunk writes, CAS, rollback, chunk reassembly)       │
//! └──────────┬─────────────────────────────────┬────────────────┘
//!            │                                 │
//!            ▼                                 ▼
//!   ┌─────────────────┐               ┌─────────────────┐
//!   │    Pipeline     │               │    Transport    │
//!   │ encode/compress │               │ get/store/cas/  │
//!   │     /chunk      │               │     remove      │
//!   └────────┬────────┘               └─────────────────┘
//!            │
//!            ▼
//!   ┌─────────────────┐
//!   │  TypeRegistry   │
//!   │  (serde_json)   │
//!   └─────────────────┘
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod error;
pub mod config;

pub mod value;
pub mod registry;
pub mod codec;
pub mod compression;
pub mod chunk;
pub mod ttl;
pub mod transport;
pub mod pipeline;
pub mod coordinator;
pub mod async_coordinator;
pub mod cache;

// =============================================================================
// Public API Re-exports
// =============================================================================

pub use error::{CacheError, Result};
pub use config::{CompressionKind, Config};
pub use value::{CacheObject, CacheValue, Scalar};
pub use registry::TypeRegistry;
pub use ttl::Expiration;
pub use transport::{AsyncTransport, CasToken, MemoryTransport, StoreMode, StoredItem, Transport};
pub use coordinator::{CasOutcome, StoreCoordinator};
pub use async_coordinator::AsyncStoreCoordinator;
pub use cache::{AsyncCache, Cache};

// =============================================================================
// Version Info
// =============================================================================

/// Current version of chunkcache
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
