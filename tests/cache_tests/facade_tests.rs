//! Cache Facade Tests
//!
//! Tests for the public add/set/get surface and its batch helpers.

#[path = "../common/mod.rs"]
mod common;

use std::time::Duration;

use bytes::Bytes;
use chunkcache::{AsyncCache, Cache, CacheError, CasOutcome, Expiration, MemoryTransport};

use common::{noise, profile, registry, small_chunks, Profile};

fn cache() -> (Cache<MemoryTransport>, MemoryTransport) {
    let transport = MemoryTransport::new();
    let cache = Cache::new(transport.clone(), small_chunks(1_000), registry()).unwrap();
    (cache, transport)
}

#[test]
fn test_add_then_set() {
    let (cache, _) = cache();

    assert!(cache.add("k", "one", Expiration::Never).unwrap());
    assert!(!cache.add("k", "two", Expiration::Never).unwrap());
    assert_eq!(cache.get_as::<String>("k").unwrap(), Some("one".to_string()));

    assert!(cache.set("k", "three", Expiration::Never).unwrap());
    assert_eq!(cache.get_as::<String>("k").unwrap(), Some("three".to_string()));
}

#[test]
fn test_get_as_typed_values() {
    let (cache, _) = cache();

    cache.set("n", 7i32, Expiration::Never).unwrap();
    cache.set("p", chunkcache::CacheValue::object(profile("dee")), Expiration::Never).unwrap();

    assert_eq!(cache.get_as::<i64>("n").unwrap(), Some(7));
    assert_eq!(cache.get_as::<Profile>("p").unwrap(), Some(profile("dee")));
    assert_eq!(cache.get_as::<Profile>("absent").unwrap(), None);
}

#[test]
fn test_get_as_wrong_type() {
    let (cache, _) = cache();
    cache.set("n", 7i32, Expiration::Never).unwrap();

    match cache.get_as::<String>("n") {
        Err(CacheError::TypeMismatch { key, .. }) => assert_eq!(key, "n"),
        other => panic!("expected type mismatch, got {:?}", other),
    }
}

#[test]
fn test_long_text_round_trip() {
    let (cache, transport) = cache();
    let text = "é".repeat(70_000);

    cache.set("essay", text.clone(), Expiration::Never).unwrap();
    assert!(transport.len() > 1);
    assert_eq!(cache.get_as::<String>("essay").unwrap(), Some(text));
}

#[test]
fn test_check_and_set() {
    let (cache, _) = cache();
    cache.set("c", 1i64, Expiration::Never).unwrap();

    let (_, version) = cache.get_with_version("c").unwrap().unwrap();
    assert!(matches!(
        cache.check_and_set("c", 2i64, version, Expiration::Never).unwrap(),
        CasOutcome::Stored(_)
    ));
    assert_eq!(
        cache.check_and_set("c", 3i64, version, Expiration::Never).unwrap(),
        CasOutcome::Conflict
    );
    assert_eq!(cache.get_as::<i64>("c").unwrap(), Some(2));
}

#[test]
fn test_contains_variants() {
    let (cache, _) = cache();
    cache.set("a", true, Expiration::Never).unwrap();
    cache.set("b", false, Expiration::Never).unwrap();

    assert!(cache.contains("a").unwrap());
    assert!(!cache.contains("z").unwrap());
    assert!(cache.contains_any(["z", "b"]).unwrap());
    assert!(!cache.contains_any(["y", "z"]).unwrap());
    assert!(cache.contains_all(["a", "b"]).unwrap());
    assert!(!cache.contains_all(["a", "z"]).unwrap());
}

#[test]
fn test_batch_get_and_remove() {
    let (cache, transport) = cache();
    let big = Bytes::from(noise(3_000, 31));

    cache.set("a", 1i64, Expiration::Never).unwrap();
    cache.set("big", big.clone(), Expiration::Never).unwrap();

    let found = cache.get_many(["a", "big", "missing"]).unwrap();
    assert_eq!(found.len(), 2);
    assert_eq!(found["big"].as_bytes(), Some(&big));

    assert_eq!(cache.remove_many(["a", "big", "missing"]).unwrap(), 2);
    assert!(transport.is_empty());
}

#[test]
fn test_expiring_value_readable() {
    let (cache, _) = cache();
    cache
        .set("soon", "x", Expiration::after(Duration::from_secs(5)))
        .unwrap();
    assert!(cache.contains("soon").unwrap());
}

#[tokio::test]
async fn test_async_cache() {
    let transport = MemoryTransport::new();
    let cache = AsyncCache::new(transport.clone(), small_chunks(1_000), registry()).unwrap();
    let big = Bytes::from(noise(5_000, 32));

    assert!(cache.add("big", big.clone(), Expiration::Never).await.unwrap());
    assert!(!cache.add("big", "other", Expiration::Never).await.unwrap());
    assert_eq!(cache.get_as::<Bytes>("big").await.unwrap(), Some(big));

    cache.set("p", chunkcache::CacheValue::object(profile("eve")), Expiration::Never)
        .await
        .unwrap();
    assert!(cache.contains_all(["big", "p"]).await.unwrap());
    assert!(cache.contains_any(["nope", "p"]).await.unwrap());

    let found = cache.get_many(["p", "nope"]).await.unwrap();
    assert_eq!(found.len(), 1);

    assert_eq!(cache.remove_many(vec!["big", "p"]).await.unwrap(), 2);
    assert!(transport.is_empty());
}

#[tokio::test]
async fn test_batch_keys_from_owned_strings() {
    let keys: Vec<String> = (0..3).map(|i| format!("user:{}", i)).collect();

    let (cache, _) = cache();
    let async_cache = AsyncCache::new(MemoryTransport::new(), small_chunks(1_000), registry()).unwrap();
    for key in &keys {
        cache.set(key, 1i64, Expiration::Never).unwrap();
        async_cache.set(key, 1i64, Expiration::Never).await.unwrap();
    }

    assert_eq!(cache.get_many(keys.iter().map(String::as_str)).unwrap().len(), 3);
    assert_eq!(
        async_cache.get_many(keys.iter().map(String::as_str)).await.unwrap().len(),
        3
    );
    assert!(cache.contains_all(keys.iter().map(String::as_str)).unwrap());
    assert!(async_cache.contains_all(keys.iter().map(String::as_str)).await.unwrap());
    assert_eq!(cache.remove_many(keys.iter().map(String::as_str)).unwrap(), 3);
    assert_eq!(async_cache.remove_many(keys.iter().map(String::as_str)).await.unwrap(), 3);
}
