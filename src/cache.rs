//! Cache facade
//!
//! Thin public surface over the coordinators. Batch operations are plain
//! loops over the single-key calls.

use std::any::type_name;
use std::collections::HashMap;
use std::sync::Arc;

use crate::async_coordinator::AsyncStoreCoordinator;
use crate::config::Config;
use crate::coordinator::{CasOutcome, StoreCoordinator};
use crate::error::{CacheError, Result};
use crate::registry::TypeRegistry;
use crate::transport::{AsyncTransport, CasToken, StoreMode, Transport};
use crate::ttl::Expiration;
use crate::value::CacheValue;

fn typed<V: 'static>(key: &str, value: CacheValue) -> Result<V> {
    value.into_typed::<V>().ok_or_else(|| CacheError::TypeMismatch {
        key: key.to_string(),
        expected: type_name::<V>(),
    })
}

/// Blocking cache client
pub struct Cache<T: Transport> {
    coordinator: StoreCoordinator<T>,
}

impl<T: Transport> Cache<T> {
    pub fn new(transport: T, config: Config, registry: TypeRegistry) -> Result<Self> {
        Ok(Self {
            coordinator: StoreCoordinator::new(transport, config, Arc::new(registry))?,
        })
    }

    /// Store only if the key is absent
    pub fn add(&self, key: &str, value: impl Into<CacheValue>, expiration: Expiration) -> Result<bool> {
        self.coordinator.store(StoreMode::Add, key, value.into(), expiration)
    }

    /// Store, replacing any existing value
    pub fn set(&self, key: &str, value: impl Into<CacheValue>, expiration: Expiration) -> Result<bool> {
        self.coordinator.store(StoreMode::Set, key, value.into(), expiration)
    }

    /// Store only if the value still has version `version`
    pub fn check_and_set(
        &self,
        key: &str,
        value: impl Into<CacheValue>,
        version: CasToken,
        expiration: Expiration,
    ) -> Result<CasOutcome> {
        self.coordinator
            .check_and_store(key, value.into(), version, expiration)
    }

    pub fn get(&self, key: &str) -> Result<Option<CacheValue>> {
        self.coordinator.fetch(key)
    }

    /// Fetch and convert to a concrete type
    pub fn get_as<V: 'static>(&self, key: &str) -> Result<Option<V>> {
        self.coordinator
            .fetch(key)?
            .map(|value| typed(key, value))
            .transpose()
    }

    pub fn get_with_version(&self, key: &str) -> Result<Option<(CacheValue, CasToken)>> {
        self.coordinator.fetch_with_version(key)
    }

    /// Fetch several keys; misses are left out of the result
    pub fn get_many<'a, I>(&self, keys: I) -> Result<HashMap<String, CacheValue>>
    where
        I: IntoIterator<Item = &'a str>,
    {
        let mut found = HashMap::new();
        for key in keys {
            if let Some(value) = self.coordinator.fetch(key)? {
                found.insert(key.to_string(), value);
            }
        }
        Ok(found)
    }

    pub fn remove(&self, key: &str) -> Result<bool> {
        self.coordinator.remove(key)
    }

    /// Remove several keys, returning how many were present
    pub fn remove_many<'a, I>(&self, keys: I) -> Result<usize>
    where
        I: IntoIterator<Item = &'a str>,
    {
        let mut removed = 0;
        for key in keys {
            if self.coordinator.remove(key)? {
                removed += 1;
            }
        }
        Ok(removed)
    }

    pub fn contains(&self, key: &str) -> Result<bool> {
        self.coordinator.contains(key)
    }

    pub fn contains_any<'a, I>(&self, keys: I) -> Result<bool>
    where
        I: IntoIterator<Item = &'a str>,
    {
        for key in keys {
            if self.coordinator.contains(key)? {
                return Ok(true);
            }
        }
        Ok(false)
    }

    pub fn contains_all<'a, I>(&self, keys: I) -> Result<bool>
    where
        I: IntoIterator<Item = &'a str>,
    {
        for key in keys {
            if !self.coordinator.contains(key)? {
                return Ok(false);
            }
        }
        Ok(true)
    }

    pub fn coordinator(&self) -> &StoreCoordinator<T> {
        &self.coordinator
    }
}

/// Non-blocking cache client
pub struct AsyncCache<T: AsyncTransport> {
    coordinator: AsyncStoreCoordinator<T>,
}

impl<T: AsyncTransport> AsyncCache<T> {
    pub fn new(transport: T, config: Config, registry: TypeRegistry) -> Result<Self> {
        Ok(Self {
            coordinator: AsyncStoreCoordinator::new(transport, config, Arc::new(registry))?,
        })
    }

    pub async fn add(
        &self,
        key: &str,
        value: impl Into<CacheValue>,
        expiration: Expiration,
    ) -> Result<bool> {
        self.coordinator
            .store(StoreMode::Add, key, value.into(), expiration)
            .await
    }

    pub async fn set(
        &self,
        key: &str,
        value: impl Into<CacheValue>,
        expiration: Expiration,
    ) -> Result<bool> {
        self.coordinator
            .store(StoreMode::Set, key, value.into(), expiration)
            .await
    }

    pub async fn check_and_set(
        &self,
        key: &str,
        value: impl Into<CacheValue>,
        version: CasToken,
        expiration: Expiration,
    ) -> Result<CasOutcome> {
        self.coordinator
            .check_and_store(key, value.into(), version, expiration)
            .await
    }

    pub async fn get(&self, key: &str) -> Result<Option<CacheValue>> {
        self.coordinator.fetch(key).await
    }

    pub async fn get_as<V: 'static>(&self, key: &str) -> Result<Option<V>> {
        self.coordinator
            .fetch(key)
            .await?
            .map(|value| typed(key, value))
            .transpose()
    }

    pub async fn get_with_version(&self, key: &str) -> Result<Option<(CacheValue, CasToken)>> {
        self.coordinator.fetch_with_version(key).await
    }

    /// Fetch several keys; misses are left out of the result
    pub async fn get_many<'a, I>(&self, keys: I) -> Result<HashMap<String, CacheValue>>
    where
        I: IntoIterator<Item = &'a str>,
    {
        let mut found = HashMap::new();
        for key in keys {
            if let Some(value) = self.coordinator.fetch(key).await? {
                found.insert(key.to_string(), value);
            }
        }
        Ok(found)
    }

    pub async fn remove(&self, key: &str) -> Result<bool> {
        self.coordinator.remove(key).await
    }

    /// Remove several keys, returning how many were present
    pub async fn remove_many<'a, I>(&self, keys: I) -> Result<usize>
    where
        I: IntoIterator<Item = &'a str>,
    {
        let mut removed = 0;
        for key in keys {
            if self.coordinator.remove(key).await? {
                removed += 1;
            }
        }
        Ok(removed)
    }

    pub async fn contains(&self, key: &str) -> Result<bool> {
        self.coordinator.contains(key).await
    }

    pub async fn contains_any<'a, I>(&self, keys: I) -> Result<bool>
    where
        I: IntoIterator<Item = &'a str>,
    {
        for key in keys {
            if self.coordinator.contains(key).await? {
                return Ok(true);
            }
        }
        Ok(false)
    }

    pub async fn contains_all<'a, I>(&self, keys: I) -> Result<bool>
    where
        I: IntoIterator<Item = &'a str>,
    {
        for key in keys {
            if !self.coordinator.contains(key).await? {
                return Ok(false);
            }
        }
        Ok(true)
    }

    pub fn coordinator(&self) -> &AsyncStoreCoordinator<T> {
        &self.coordinator
    }
}
