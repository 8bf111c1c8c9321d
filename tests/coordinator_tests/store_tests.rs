//! Store Coordinator Tests
//!
//! Tests for chunked writes and reads, rollback of partial writes,
//! compare-and-swap and removal over the blocking transport.

#[path = "../common/mod.rs"]
mod common;

use std::sync::Arc;
use std::time::{Duration, SystemTime};

use bytes::Bytes;
use chunkcache::codec::PayloadHeader;
use chunkcache::transport::{StoreMode, StoredItem, Transport};
use chunkcache::{
    CacheError, CacheValue, CasOutcome, Config, Expiration, MemoryTransport, Scalar,
    StoreCoordinator, TypeRegistry,
};

use common::{noise, profile, registry, small_chunks, Drawing, FailMode, FailingTransport, Profile, Shape};

const CHUNK: usize = 1_000;

fn coordinator(transport: &MemoryTransport) -> StoreCoordinator<MemoryTransport> {
    StoreCoordinator::new(transport.clone(), small_chunks(CHUNK), Arc::new(registry())).unwrap()
}

fn failing_coordinator() -> StoreCoordinator<FailingTransport> {
    let transport = FailingTransport::new(MemoryTransport::new());
    StoreCoordinator::new(transport, small_chunks(CHUNK), Arc::new(registry())).unwrap()
}

/// Raw bytes that encode to exactly `chunks` full chunks
fn value_in_chunks(chunks: usize, seed: u64) -> Bytes {
    Bytes::from(noise(chunks * CHUNK - 4, seed))
}

// =============================================================================
// Round Trip Tests
// =============================================================================

#[test]
fn test_short_text_stored_natively() {
    let transport = MemoryTransport::new();
    let coordinator = coordinator(&transport);

    assert!(coordinator
        .store(StoreMode::Set, "greeting", "hello".into(), Expiration::Never)
        .unwrap());

    assert_eq!(
        transport.raw("greeting"),
        Some(StoredItem::Native(Scalar::Text("hello".to_string())))
    );
    assert_eq!(
        coordinator.fetch("greeting").unwrap(),
        Some(CacheValue::Text("hello".to_string()))
    );
}

#[test]
fn test_scalar_round_trips() {
    let transport = MemoryTransport::new();
    let coordinator = coordinator(&transport);
    let when = SystemTime::UNIX_EPOCH + Duration::from_secs(1_700_000_000);

    let values = vec![
        CacheValue::Bool(false),
        CacheValue::Int(-42),
        CacheValue::UInt(u64::MAX),
        CacheValue::Float(2.25),
        CacheValue::Timestamp(when),
    ];

    for (i, value) in values.into_iter().enumerate() {
        let key = format!("scalar:{}", i);
        coordinator
            .store(StoreMode::Set, &key, value.clone(), Expiration::Never)
            .unwrap();
        assert_eq!(coordinator.fetch(&key).unwrap(), Some(value));
    }
}

#[test]
fn test_chunked_bytes_round_trip() {
    let transport = MemoryTransport::new();
    let coordinator = coordinator(&transport);
    let data = value_in_chunks(4, 1);

    assert!(coordinator
        .store(StoreMode::Set, "big", data.clone().into(), Expiration::Never)
        .unwrap());

    assert_eq!(transport.keys(), vec!["big", "big-PART1", "big-PART2", "big-PART3"]);
    assert!(transport
        .keys()
        .iter()
        .all(|k| transport.raw(k).and_then(|item| item.payload_len()) == Some(CHUNK)));

    let fetched = coordinator.fetch("big").unwrap().unwrap();
    assert_eq!(fetched.as_bytes(), Some(&data));
}

#[test]
fn test_object_round_trip() {
    let transport = MemoryTransport::new();
    let coordinator = coordinator(&transport);

    coordinator
        .store(StoreMode::Set, "p", CacheValue::object(profile("bo")), Expiration::Never)
        .unwrap();
    let fetched = coordinator.fetch("p").unwrap().unwrap();
    assert_eq!(fetched.into_typed::<Profile>(), Some(profile("bo")));
}

#[test]
fn test_polymorphic_collection_across_chunks() {
    let transport = MemoryTransport::new();
    let coordinator = coordinator(&transport);

    let shapes = (0..200)
        .map(|i| {
            if i % 2 == 0 {
                Shape::Circle { radius: i as f64 }
            } else {
                Shape::Rect { width: i as f64, height: 1.0 }
            }
        })
        .collect();
    let drawing = Drawing {
        title: "mixed".to_string(),
        shapes,
    };

    coordinator
        .store(StoreMode::Set, "drawing", CacheValue::object(drawing.clone()), Expiration::Never)
        .unwrap();
    assert!(transport.len() > 1);

    let fetched = coordinator.fetch("drawing").unwrap().unwrap();
    assert_eq!(fetched.downcast_ref::<Drawing>(), Some(&drawing));
}

#[test]
fn test_compressed_chunked_round_trip() {
    let transport = MemoryTransport::new();
    let config = Config::builder()
        .chunk_threshold(CHUNK)
        .compression_threshold(CHUNK)
        .build();
    let coordinator = StoreCoordinator::new(transport.clone(), config, Arc::new(registry())).unwrap();

    // Half noise so the result is still larger than one chunk
    let mut data = noise(5_000, 3);
    data.extend(std::iter::repeat(b'z').take(50_000));
    let data = Bytes::from(data);

    coordinator
        .store(StoreMode::Set, "mixed", data.clone().into(), Expiration::Never)
        .unwrap();
    let stored: usize = transport
        .keys()
        .iter()
        .filter_map(|k| transport.raw(k).and_then(|item| item.payload_len()))
        .sum();
    assert!(stored < data.len());
    assert!(transport.len() > 1);

    let fetched = coordinator.fetch("mixed").unwrap().unwrap();
    assert_eq!(fetched.as_bytes(), Some(&data));
}

#[test]
fn test_text_body_at_compression_threshold_not_compressed() {
    let transport = MemoryTransport::new();
    let config = Config::builder().compression_threshold(100_000).build();
    let coordinator = StoreCoordinator::new(transport.clone(), config, Arc::new(registry())).unwrap();
    let text = "a".repeat(100_000);

    coordinator
        .store(StoreMode::Set, "text", text.clone().into(), Expiration::Never)
        .unwrap();

    let first = match transport.raw("text") {
        Some(StoredItem::Payload(first)) => first,
        other => panic!("expected payload, got {:?}", other),
    };
    assert!(!PayloadHeader::from_bytes(&first).unwrap().compressed);
    assert_eq!(coordinator.fetch("text").unwrap().unwrap().as_text(), Some(text.as_str()));
}

#[test]
fn test_unknown_type_on_read() {
    let transport = MemoryTransport::new();
    coordinator(&transport)
        .store(StoreMode::Set, "p", CacheValue::object(profile("cy")), Expiration::Never)
        .unwrap();

    let reader =
        StoreCoordinator::new(transport.clone(), small_chunks(CHUNK), Arc::new(TypeRegistry::new()))
            .unwrap();
    assert!(matches!(reader.fetch("p"), Err(CacheError::TypeResolution(_))));
}

// =============================================================================
// Store Mode Tests
// =============================================================================

#[test]
fn test_add_refuses_existing_key() {
    let transport = MemoryTransport::new();
    let coordinator = coordinator(&transport);

    assert!(coordinator
        .store(StoreMode::Add, "k", "first".into(), Expiration::Never)
        .unwrap());
    assert!(!coordinator
        .store(StoreMode::Add, "k", value_in_chunks(3, 2).into(), Expiration::Never)
        .unwrap());

    assert_eq!(transport.keys(), vec!["k"]);
    assert_eq!(coordinator.fetch("k").unwrap().unwrap().as_text(), Some("first"));
}

#[test]
fn test_empty_key_rejected() {
    let transport = MemoryTransport::new();
    let coordinator = coordinator(&transport);

    let result = coordinator.store(StoreMode::Set, "", 1i64.into(), Expiration::Never);
    assert!(matches!(result, Err(CacheError::InvalidArgument(_))));
    assert!(matches!(coordinator.fetch(""), Err(CacheError::InvalidArgument(_))));
}

// =============================================================================
// Expiration Tests
// =============================================================================

#[test]
fn test_expiration_applies_to_every_chunk() {
    let transport = MemoryTransport::new();
    let coordinator = coordinator(&transport);

    coordinator
        .store(
            StoreMode::Set,
            "ttl",
            value_in_chunks(3, 4).into(),
            Expiration::after(Duration::from_secs(60)),
        )
        .unwrap();

    for key in transport.keys() {
        assert_eq!(transport.ttl_secs(&key), Some(60), "key {}", key);
    }
}

#[test]
fn test_invalid_expiration_rejected() {
    let transport = MemoryTransport::new();
    let coordinator = coordinator(&transport);

    let past = Expiration::At(SystemTime::now() - Duration::from_secs(1));
    let too_far = Expiration::after(Duration::from_secs(31 * 24 * 60 * 60));

    for expiration in [past, too_far] {
        let result = coordinator.store(StoreMode::Set, "k", 1i64.into(), expiration);
        assert!(matches!(result, Err(CacheError::InvalidArgument(_))));
    }
    assert!(transport.is_empty());
}

// =============================================================================
// Rollback Tests
// =============================================================================

#[test]
fn test_refused_tail_chunk_rolls_back() {
    for failed in 1..4 {
        let coordinator = failing_coordinator();
        coordinator
            .transport()
            .fail_store_of(&format!("big-PART{}", failed), FailMode::Refuse);

        let stored = coordinator
            .store(StoreMode::Set, "big", value_in_chunks(4, 5).into(), Expiration::Never)
            .unwrap();
        assert!(!stored);

        let transport = coordinator.transport();
        assert!(Transport::get(transport, "big").unwrap().is_none());
        for index in 1..4 {
            let key = format!("big-PART{}", index);
            assert!(Transport::get(transport, &key).unwrap().is_none(), "failed {} key {}", failed, key);
        }
        assert_eq!(coordinator.fetch("big").unwrap(), None);
    }
}

#[test]
fn test_failed_tail_chunk_reports_partial_write() {
    let coordinator = failing_coordinator();
    coordinator
        .transport()
        .fail_store_of("big-PART2", FailMode::Error);

    let result = coordinator.store(StoreMode::Set, "big", value_in_chunks(4, 6).into(), Expiration::Never);
    match result {
        Err(CacheError::PartialWrite { key, chunk, source }) => {
            assert_eq!(key, "big");
            assert_eq!(chunk, 2);
            assert!(matches!(*source, CacheError::Transport(_)));
        }
        other => panic!("expected partial write, got {:?}", other),
    }

    // Chunk 3 is never attempted
    assert!(!coordinator.transport().store_calls().contains(&"big-PART3".to_string()));
    assert!(Transport::get(coordinator.transport(), "big").unwrap().is_none());
    assert!(Transport::get(coordinator.transport(), "big-PART1").unwrap().is_none());
}

#[test]
fn test_refused_first_chunk_writes_nothing_else() {
    let coordinator = failing_coordinator();
    coordinator.transport().fail_store_of("big", FailMode::Refuse);

    let stored = coordinator
        .store(StoreMode::Set, "big", value_in_chunks(4, 7).into(), Expiration::Never)
        .unwrap();
    assert!(!stored);
    assert_eq!(coordinator.transport().store_calls(), vec!["big".to_string()]);
}

#[test]
fn test_rollback_errors_are_not_escalated() {
    let coordinator = failing_coordinator();
    coordinator
        .transport()
        .fail_store_of("big-PART2", FailMode::Refuse);
    coordinator.transport().fail_removes(true);

    let stored = coordinator
        .store(StoreMode::Set, "big", value_in_chunks(4, 8).into(), Expiration::Never)
        .unwrap();
    assert!(!stored);

    // Leftovers are unreadable: chunk 2 was never written
    coordinator.transport().fail_removes(false);
    assert_eq!(coordinator.fetch("big").unwrap(), None);
}

// =============================================================================
// Read Tests
// =============================================================================

#[test]
fn test_missing_chunk_is_a_miss() {
    let transport = MemoryTransport::new();
    let coordinator = coordinator(&transport);

    coordinator
        .store(StoreMode::Set, "big", value_in_chunks(4, 9).into(), Expiration::Never)
        .unwrap();
    assert!(Transport::remove(&transport, "big-PART2").unwrap());

    assert_eq!(coordinator.fetch("big").unwrap(), None);
    assert!(coordinator.contains("big").unwrap());
}

#[test]
fn test_native_value_at_chunk_key_is_a_miss() {
    let transport = MemoryTransport::new();
    let coordinator = coordinator(&transport);

    coordinator
        .store(StoreMode::Set, "big", value_in_chunks(2, 10).into(), Expiration::Never)
        .unwrap();
    coordinator
        .store(StoreMode::Set, "big-PART1", 5i64.into(), Expiration::Never)
        .unwrap();

    assert_eq!(coordinator.fetch("big").unwrap(), None);
}

// =============================================================================
// Compare-and-Swap Tests
// =============================================================================

#[test]
fn test_check_and_store_with_current_version() {
    let transport = MemoryTransport::new();
    let coordinator = coordinator(&transport);

    coordinator
        .store(StoreMode::Set, "doc", CacheValue::object(profile("v1")), Expiration::Never)
        .unwrap();
    let (_, version) = coordinator.fetch_with_version("doc").unwrap().unwrap();

    let outcome = coordinator
        .check_and_store("doc", value_in_chunks(3, 11).into(), version, Expiration::Never)
        .unwrap();
    let new_version = match outcome {
        CasOutcome::Stored(new_version) => new_version,
        other => panic!("expected stored, got {:?}", other),
    };
    assert_ne!(new_version, version);

    let (_, current) = coordinator.fetch_with_version("doc").unwrap().unwrap();
    assert_eq!(current, new_version);
    assert_eq!(transport.len(), 3);
}

#[test]
fn test_check_and_store_with_stale_version() {
    let transport = MemoryTransport::new();
    let coordinator = coordinator(&transport);

    coordinator
        .store(StoreMode::Set, "doc", CacheValue::object(profile("v1")), Expiration::Never)
        .unwrap();
    let (_, stale) = coordinator.fetch_with_version("doc").unwrap().unwrap();
    coordinator
        .store(StoreMode::Set, "doc", CacheValue::object(profile("v2")), Expiration::Never)
        .unwrap();

    let outcome = coordinator
        .check_and_store("doc", CacheValue::object(profile("v3")), stale, Expiration::Never)
        .unwrap();
    assert_eq!(outcome, CasOutcome::Conflict);

    let current = coordinator.fetch("doc").unwrap().unwrap();
    assert_eq!(current.into_typed::<Profile>(), Some(profile("v2")));
}

#[test]
fn test_check_and_store_missing_key() {
    let transport = MemoryTransport::new();
    let coordinator = coordinator(&transport);

    let outcome = coordinator
        .check_and_store("absent", 1i64.into(), 1, Expiration::Never)
        .unwrap();
    assert_eq!(outcome, CasOutcome::NotFound);
    assert!(transport.is_empty());
}

#[test]
fn test_check_and_store_refused_tail_rolls_back() {
    let coordinator = failing_coordinator();
    coordinator
        .store(StoreMode::Set, "doc", "v1".into(), Expiration::Never)
        .unwrap();
    let (_, version) = coordinator.fetch_with_version("doc").unwrap().unwrap();

    coordinator
        .transport()
        .fail_store_of("doc-PART1", FailMode::Refuse);
    let outcome = coordinator
        .check_and_store("doc", value_in_chunks(3, 12).into(), version, Expiration::Never)
        .unwrap();

    assert_eq!(outcome, CasOutcome::NotStored);
    assert_eq!(coordinator.fetch("doc").unwrap(), None);
}

// =============================================================================
// Remove Tests
// =============================================================================

#[test]
fn test_remove_deletes_all_chunks() {
    let transport = MemoryTransport::new();
    let coordinator = coordinator(&transport);

    coordinator
        .store(StoreMode::Set, "big", value_in_chunks(4, 13).into(), Expiration::Never)
        .unwrap();
    assert!(coordinator.remove("big").unwrap());
    assert!(transport.is_empty());
    assert!(!coordinator.remove("big").unwrap());
}

#[test]
fn test_remove_follows_stale_chunks() {
    let transport = MemoryTransport::new();
    let coordinator = coordinator(&transport);

    coordinator
        .store(StoreMode::Set, "big", value_in_chunks(4, 14).into(), Expiration::Never)
        .unwrap();
    coordinator
        .store(StoreMode::Set, "big", value_in_chunks(2, 15).into(), Expiration::Never)
        .unwrap();

    // The shorter value does not clean up PART2 and PART3
    assert_eq!(transport.len(), 4);
    assert!(coordinator.fetch("big").unwrap().is_some());

    assert!(coordinator.remove("big").unwrap());
    assert!(transport.is_empty());
}

#[test]
fn test_remove_stops_at_first_gap() {
    let transport = MemoryTransport::new();
    let coordinator = coordinator(&transport);

    coordinator
        .store(StoreMode::Set, "big", value_in_chunks(4, 16).into(), Expiration::Never)
        .unwrap();
    assert!(Transport::remove(&transport, "big-PART2").unwrap());

    assert!(coordinator.remove("big").unwrap());
    assert_eq!(transport.keys(), vec!["big-PART3"]);
}
