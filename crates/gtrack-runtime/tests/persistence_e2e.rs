//! Persistence E2E Tests
//!
//! End-to-end validation of the persistence adapter over every store shape.
//!
//! # Running Tests
//!
//! ```sh
//! cargo test -p gtrack-runtime --test persistence_e2e
//! ```
//!
//! # Invariants
//!
//! 1. **Round-trip integrity**: a saved record loads back unchanged
//! 2. **Last call wins**: the stored value is the one from the latest call,
//!    whatever the completion order of the underlying store
//! 3. **Graceful degradation**: corrupt text loads as absent and never panics
//! 4. **Restart survival**: file-backed records survive a new adapter

#![cfg(test)]

use gtrack_core::scheduler::Scheduler;
use gtrack_runtime::persistence::{
    LatentStore, MemoryStorage, OpKind, PersistenceAdapter, StorageBackend, WriteOutcome,
};
use proptest::prelude::*;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

// ============================================================================
// Test Utilities
// ============================================================================

fn log_jsonl(event: &str, case: &str, passed: bool, details: &str) {
    let timestamp = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0);

    eprintln!(
        r#"{{"event":"{event}","case":"{case}","passed":{passed},"details":"{details}","timestamp":{timestamp}}}"#
    );
}

type Snapshot = BTreeMap<String, serde_json::Value>;

fn snapshot(pairs: &[(&str, serde_json::Value)]) -> Snapshot {
    pairs
        .iter()
        .map(|(k, v)| ((*k).to_string(), v.clone()))
        .collect()
}

// ============================================================================
// 1. Round Trips
// ============================================================================

#[test]
fn persist_round_trip_mixed_values() {
    let adapter = PersistenceAdapter::in_memory();
    let record = snapshot(&[
        ("full_name", serde_json::json!("سارة")),
        ("skills", serde_json::json!(["rust", "sql"])),
    ]);

    adapter.save("form_profile", &record);
    let loaded = adapter.load::<Snapshot>("form_profile").value().flatten();
    assert_eq!(loaded, Some(record));

    log_jsonl("persist_round_trip", "mixed_values", true, "");
}

#[cfg(feature = "file-storage")]
#[test]
fn persist_survives_restart_with_file_storage() {
    use gtrack_runtime::persistence::FileStorage;

    let tmp = tempfile::TempDir::new().unwrap();
    let path = tmp.path().join("store.json");
    let record = snapshot(&[("email", serde_json::json!("a@b.sa"))]);

    {
        let adapter = PersistenceAdapter::with_backend(Arc::new(FileStorage::new(&path)));
        adapter.save("form_contact", &record);
    }

    let adapter = PersistenceAdapter::with_backend(Arc::new(FileStorage::new(&path)));
    assert_eq!(
        adapter.load::<Snapshot>("form_contact").value().flatten(),
        Some(record)
    );

    log_jsonl("persist_restart", "file_storage", true, "");
}

// ============================================================================
// 2. Corruption
// ============================================================================

#[test]
fn persist_corrupt_text_is_absent() {
    let backend = Arc::new(MemoryStorage::new());
    for (key, text) in [("a", "{"), ("b", "[1,2"), ("c", "not json at all")] {
        backend.set_item(key, text).unwrap();
    }
    let adapter = PersistenceAdapter::with_backend(backend);
    for key in ["a", "b", "c"] {
        assert_eq!(adapter.load::<Snapshot>(key).value(), Some(None));
    }
    assert_eq!(adapter.stats().corrupt_loads, 3);

    log_jsonl("persist_corrupt", "three_keys", true, "");
}

// ============================================================================
// 3. Write Serialization
// ============================================================================

#[test]
fn persist_independent_keys_do_not_block_each_other() {
    let scheduler = Scheduler::new();
    let backend = Arc::new(MemoryStorage::new());
    let store = LatentStore::with_latency_fn(backend.clone(), &scheduler, |_, key| {
        if key == "slow" {
            Duration::from_millis(500)
        } else {
            Duration::from_millis(10)
        }
    });
    let adapter = PersistenceAdapter::new(store);

    let slow = adapter.save("slow", &1);
    let fast = adapter.save("fast", &2);
    scheduler.advance(Duration::from_millis(10));
    assert!(fast.is_ready());
    assert!(!slow.is_ready());
    assert_eq!(backend.get_item("fast").unwrap().as_deref(), Some("2"));

    scheduler.run_until_idle();
    assert!(slow.is_ready());
}

proptest! {
    /// Whatever latencies the store picks, the value left behind is the one
    /// from the last call, and every handle resolves.
    #[test]
    fn persist_last_call_wins(
        latencies in proptest::collection::vec(0u64..200, 1..12),
        clear_last in any::<bool>(),
    ) {
        let scheduler = Scheduler::new();
        let backend = Arc::new(MemoryStorage::new());
        let plan = latencies.clone();
        let mut cursor = 0usize;
        let store = LatentStore::with_latency_fn(backend.clone(), &scheduler, move |kind, _| {
            let delay = plan.get(cursor % plan.len()).copied().unwrap_or(0);
            cursor += 1;
            match kind {
                OpKind::Read => Duration::ZERO,
                OpKind::Set | OpKind::Remove => Duration::from_millis(delay),
            }
        });
        let adapter = PersistenceAdapter::new(store);

        let mut handles = Vec::new();
        for (i, _) in latencies.iter().enumerate() {
            handles.push(adapter.save("survey_responses", &i));
        }
        if clear_last {
            handles.push(adapter.clear("survey_responses"));
        }

        scheduler.run_until_idle();

        let stored = backend.get_item("survey_responses").unwrap();
        if clear_last {
            prop_assert!(stored.is_none());
        } else {
            prop_assert_eq!(stored, Some((latencies.len() - 1).to_string()));
        }
        for handle in &handles {
            prop_assert!(handle.is_ready());
            let outcome = handle.value().and_then(|r| r.ok());
            prop_assert!(matches!(
                outcome,
                Some(WriteOutcome::Written | WriteOutcome::Superseded)
            ));
        }
        prop_assert!(!adapter.has_pending("survey_responses"));
    }
}
