// ledgerline-store-sqlite/tests/sqlite_backend.rs
// ============================================================================
// Module: SQLite Backend Tests
// Description: Storage interface conformance, persistence, and concurrency.
// Purpose: Ensure the SQLite backend upholds ledger and cursor invariants.
// Dependencies: ledgerline-store-sqlite, ledgerline-core
// ============================================================================

//! ## Overview
//! Exercises content idempotency and collision detection, ledger ordering,
//! conditional cursor updates, signal leasing, reopen persistence, and racing
//! appends from separate connections to the same database file.

#![allow(
    clippy::panic,
    clippy::print_stdout,
    clippy::print_stderr,
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::use_debug,
    clippy::dbg_macro,
    clippy::panic_in_result_fn,
    clippy::unwrap_in_result,
    reason = "Test-only output and panic-based assertions are permitted."
)]

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::path::PathBuf;
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use ledgerline_core::Backend;
use ledgerline_core::ChangeSignal;
use ledgerline_core::ContentStore;
use ledgerline_core::EntityId;
use ledgerline_core::Fingerprint;
use ledgerline_core::IngestService;
use ledgerline_core::IngestServiceConfig;
use ledgerline_core::Reconciler;
use ledgerline_core::ServiceError;
use ledgerline_core::SignalQueue;
use ledgerline_core::StoreError;
use ledgerline_core::Version;
use ledgerline_core::VersionLedger;
use ledgerline_core::VersionRequest;
use ledgerline_core::VersionStrategy;
use ledgerline_core::WatchRegistry;
use ledgerline_core::WatcherUrl;
use ledgerline_store_sqlite::SqliteBackend;
use ledgerline_store_sqlite::SqliteStoreConfig;
use ledgerline_store_sqlite::SqliteStoreMode;
use ledgerline_store_sqlite::SqliteSyncMode;
use rusqlite::Connection;
use serde_json::json;
use tempfile::TempDir;

// ============================================================================
// SECTION: Fixtures
// ============================================================================

struct SqliteFixture {
    _dir: TempDir,
    path: PathBuf,
    backend: SqliteBackend,
}

fn config_for(path: &PathBuf) -> SqliteStoreConfig {
    SqliteStoreConfig {
        path: path.clone(),
        busy_timeout_ms: 5_000,
        journal_mode: SqliteStoreMode::Wal,
        sync_mode: SqliteSyncMode::Normal,
    }
}

fn sqlite_fixture() -> SqliteFixture {
    let dir = TempDir::new().expect("tempdir");
    let path = dir.path().join("ledger.db");
    let backend = SqliteBackend::new(&config_for(&path)).expect("open store");
    SqliteFixture {
        _dir: dir,
        path,
        backend,
    }
}

fn pointer(byte: u8) -> Fingerprint {
    Fingerprint::from_bytes(vec![byte; 8])
}

fn url(raw: &str) -> WatcherUrl {
    WatcherUrl::parse(raw).unwrap()
}

// ============================================================================
// SECTION: Content Store
// ============================================================================

/// Tests identical inserts are idempotent and collisions are rejected.
#[test]
fn test_content_idempotency_and_collision() {
    let fx = sqlite_fixture();
    fx.backend.insert(&pointer(1), b"abc").unwrap();
    fx.backend.insert(&pointer(1), b"abc").unwrap();
    let err = fx.backend.insert(&pointer(1), b"xyz").unwrap_err();
    assert!(matches!(err, StoreError::Conflict(_)));
    assert_eq!(fx.backend.get(&pointer(1)).unwrap(), Some(b"abc".to_vec()));
    assert_eq!(fx.backend.get(&pointer(2)).unwrap(), None);
}

// ============================================================================
// SECTION: Version Ledger
// ============================================================================

/// Tests sequential appends produce descending history with latest first.
#[test]
fn test_ledger_history_order() {
    let fx = sqlite_fixture();
    let e1 = EntityId::new("e1");
    for byte in 1..=4 {
        fx.backend.append(&e1, VersionRequest::Next, &pointer(byte)).unwrap();
    }
    let history = fx.backend.history(&e1, 3).unwrap();
    let versions: Vec<u64> = history.iter().map(|entry| entry.version.get()).collect();
    assert_eq!(versions, vec![4, 3, 2]);
    assert_eq!(Some(history[0].clone()), fx.backend.latest(&e1).unwrap());
    assert_eq!(history[0].fingerprint, pointer(4));
}

/// Tests explicit versions: duplicates are no-ops and stale versions fail.
#[test]
fn test_ledger_explicit_versions() {
    let fx = sqlite_fixture();
    let e1 = EntityId::new("e1");
    assert_eq!(
        fx.backend.append(&e1, VersionRequest::Exact(Version::new(5)), &pointer(1)).unwrap(),
        Version::new(5)
    );
    assert_eq!(
        fx.backend.append(&e1, VersionRequest::Exact(Version::new(5)), &pointer(2)).unwrap(),
        Version::new(5)
    );
    let err = fx.backend.append(&e1, VersionRequest::Exact(Version::new(3)), &pointer(3)).unwrap_err();
    assert!(err.is_validation());
    assert_eq!(fx.backend.append(&e1, VersionRequest::Next, &pointer(4)).unwrap(), Version::new(6));
    assert_eq!(fx.backend.history(&e1, 10).unwrap().len(), 2);
}

/// Tests versions beyond the signed 64-bit range are rejected as caller
/// errors before touching the database.
#[test]
fn test_ledger_version_range() {
    let fx = sqlite_fixture();
    let e1 = EntityId::new("e1");
    let err = fx
        .backend
        .append(&e1, VersionRequest::Exact(Version::new(1 << 63)), &pointer(1))
        .unwrap_err();
    assert!(matches!(err, StoreError::OutOfRange(_)));
    assert_eq!(fx.backend.latest(&e1).unwrap(), None);

    let service = IngestService::new(Backend::from_store(fx.backend.clone()), IngestServiceConfig::default());
    let err = service.store_json("e1", &json!({"a": 1}), Some(Version::new(1 << 63))).unwrap_err();
    assert!(matches!(err, ServiceError::Validation(_)));
    service.store_json("e1", &json!({"a": 1}), Some(Version::MAX)).unwrap();
    let err = service.store_json("e1", &json!({"a": 2}), None).unwrap_err();
    assert!(matches!(err, ServiceError::Validation(_)));
    assert_eq!(fx.backend.history(&e1, 10).unwrap().len(), 1);
}

/// Tests an append records its change signal in the same transaction.
#[test]
fn test_append_enqueues_signal() {
    let fx = sqlite_fixture();
    let e1 = EntityId::new("e1");
    let version = fx.backend.append(&e1, VersionRequest::Next, &pointer(1)).unwrap();
    fx.backend.append(&e1, VersionRequest::Exact(version), &pointer(1)).unwrap();
    assert_eq!(fx.backend.pending().unwrap(), 1);
    let lease = fx.backend.dequeue(Duration::from_secs(60)).unwrap().unwrap();
    assert_eq!(lease.signal, ChangeSignal::new(e1, Some(version)));
}

/// Tests a failing signal insert rolls back the version row.
#[test]
fn test_append_rolls_back_when_signal_insert_fails() {
    let fx = sqlite_fixture();
    let e1 = EntityId::new("e1");
    fx.backend.append(&e1, VersionRequest::Next, &pointer(1)).unwrap();
    let admin = Connection::open(&fx.path).unwrap();
    admin
        .execute_batch(
            "CREATE TRIGGER reject_signals BEFORE INSERT ON change_signal BEGIN SELECT \
             RAISE(ABORT, 'queue down'); END;",
        )
        .unwrap();

    let err = fx.backend.append(&e1, VersionRequest::Next, &pointer(2)).unwrap_err();
    assert!(!err.is_validation());
    assert_eq!(fx.backend.history(&e1, 10).unwrap().len(), 1);
    assert_eq!(fx.backend.pending().unwrap(), 1);

    let service = IngestService::new(Backend::from_store(fx.backend.clone()), IngestServiceConfig::default());
    let err = service.store_json("e1", &json!({"a": 1}), None).unwrap_err();
    assert!(matches!(err, ServiceError::Storage(_)));
    assert_eq!(fx.backend.history(&e1, 10).unwrap().len(), 1);

    admin.execute_batch("DROP TRIGGER reject_signals;").unwrap();
    let retried = service.store_json("e1", &json!({"a": 1}), None).unwrap();
    assert_eq!(retried.version, Version::new(2));
}

/// Tests clock-based versions remain strictly increasing.
#[test]
fn test_ledger_unix_millis_strategy() {
    let fx = sqlite_fixture();
    let backend = fx.backend.clone().with_strategy(VersionStrategy::UnixMillis);
    let e1 = EntityId::new("e1");
    let first = backend.append(&e1, VersionRequest::Next, &pointer(1)).unwrap();
    let second = backend.append(&e1, VersionRequest::Next, &pointer(2)).unwrap();
    assert!(first.get() > 1_000_000_000_000);
    assert!(second > first);
}

/// Tests racing appends from separate connections get distinct versions.
#[test]
fn test_racing_appends_across_connections() {
    let fx = sqlite_fixture();
    let path = Arc::new(fx.path.clone());
    let handles: Vec<_> = (0..4)
        .map(|worker| {
            let path = Arc::clone(&path);
            thread::spawn(move || {
                let backend = SqliteBackend::new(&config_for(&path)).unwrap();
                let e1 = EntityId::new("shared");
                (0..10)
                    .map(|_| backend.append(&e1, VersionRequest::Next, &pointer(worker)).unwrap())
                    .collect::<Vec<_>>()
            })
        })
        .collect();
    let mut versions: Vec<Version> =
        handles.into_iter().flat_map(|handle| handle.join().unwrap()).collect();
    versions.sort();
    let expected: Vec<Version> = (1..=40).map(Version::new).collect();
    assert_eq!(versions, expected);
}

// ============================================================================
// SECTION: Watch Registry
// ============================================================================

/// Tests cursors start at zero, never regress, and survive re-registration.
#[test]
fn test_watch_cursor_semantics() {
    let fx = sqlite_fixture();
    let e1 = EntityId::new("e1");
    let watcher = url("https://watcher.test/hook");
    fx.backend.add(&e1, &watcher).unwrap();
    assert_eq!(fx.backend.cursor(&e1, &watcher).unwrap(), Version::ZERO);
    assert!(fx.backend.advance(&e1, &watcher, Version::new(9)).unwrap());
    assert!(!fx.backend.advance(&e1, &watcher, Version::new(4)).unwrap());
    fx.backend.add(&e1, &watcher).unwrap();
    assert_eq!(fx.backend.cursor(&e1, &watcher).unwrap(), Version::new(9));
    assert_eq!(fx.backend.watched_entities().unwrap(), vec![e1.clone()]);
    fx.backend.remove(&e1, &watcher).unwrap();
    fx.backend.remove(&e1, &watcher).unwrap();
    assert!(fx.backend.watchers(&e1).unwrap().is_empty());
    assert_eq!(fx.backend.cursor(&e1, &watcher).unwrap(), Version::ZERO);
}

/// Tests the reconciler over SQLite storage.
#[test]
fn test_reconciler_over_sqlite() {
    let fx = sqlite_fixture();
    let backend = Backend::from_store(fx.backend.clone());
    let e1 = EntityId::new("e1");
    let watcher = url("http://watcher.test/");
    backend.watches.add(&e1, &watcher).unwrap();
    for byte in 0..3 {
        backend.ledger.append(&e1, VersionRequest::Next, &pointer(byte)).unwrap();
    }
    let trailing = Reconciler::new(backend.clone()).trailing(&e1).unwrap();
    assert_eq!(trailing.len(), 1);
    assert_eq!(trailing[0].version, Version::new(3));
    backend.watches.advance(&e1, &watcher, Version::new(3)).unwrap();
    assert!(Reconciler::new(backend).trailing(&e1).unwrap().is_empty());
}

// ============================================================================
// SECTION: Signal Queue
// ============================================================================

/// Tests leases hide signals until expiry and acks delete them.
#[test]
fn test_signal_leasing() {
    let fx = sqlite_fixture();
    let signal = ChangeSignal::new(EntityId::new("e1"), Some(Version::new(2)));
    let id = fx.backend.enqueue(&signal).unwrap();
    let lease = fx.backend.dequeue(Duration::from_secs(60)).unwrap().unwrap();
    assert_eq!(lease.id, id);
    assert_eq!(lease.signal, signal);
    assert_eq!(lease.attempts, 1);
    assert!(fx.backend.dequeue(Duration::from_secs(60)).unwrap().is_none());
    fx.backend.ack(id).unwrap();
    assert_eq!(fx.backend.pending().unwrap(), 0);
}

/// Tests an expired lease is redelivered with a higher attempt count.
#[test]
fn test_signal_redelivery() {
    let fx = sqlite_fixture();
    fx.backend.enqueue(&ChangeSignal::new(EntityId::new("e1"), None)).unwrap();
    let first = fx.backend.dequeue(Duration::ZERO).unwrap().unwrap();
    let second = fx.backend.dequeue(Duration::from_secs(60)).unwrap().unwrap();
    assert_eq!(first.id, second.id);
    assert_eq!(second.attempts, 2);
    assert_eq!(second.signal.version, None);
}

// ============================================================================
// SECTION: Persistence
// ============================================================================

/// Tests data survives reopening the database.
#[test]
fn test_reopen_preserves_state() {
    let fx = sqlite_fixture();
    let service = IngestService::new(Backend::from_store(fx.backend.clone()), IngestServiceConfig::default());
    let receipt = service.store_json("e1", &json!({"a": 1}), None).unwrap();
    service.watch("e1", "http://watcher.test/").unwrap();
    drop(service);
    drop(fx.backend);

    let reopened = SqliteBackend::new(&config_for(&fx.path)).unwrap();
    let latest = reopened.latest(&EntityId::new("e1")).unwrap().unwrap();
    assert_eq!(latest.version, receipt.version);
    assert_eq!(reopened.get(&receipt.pointer).unwrap(), Some(br#"{"a":1}"#.to_vec()));
    assert_eq!(reopened.watchers(&EntityId::new("e1")).unwrap().len(), 1);
    assert_eq!(reopened.pending().unwrap(), 1);
}

/// Tests a directory path is rejected.
#[test]
fn test_directory_path_is_rejected() {
    let dir = TempDir::new().unwrap();
    assert!(SqliteBackend::new(&SqliteStoreConfig::new(dir.path())).is_err());
}
