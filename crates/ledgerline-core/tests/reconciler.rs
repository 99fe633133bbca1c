// ledgerline-core/tests/reconciler.rs
// ============================================================================
// Module: Reconciler Tests
// Description: Trailing-watch computation.
// ============================================================================
//! ## Overview
//! Validates that a watch trails exactly when its cursor is behind the latest
//! version and that catch-up notices carry the latest version.

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

use ledgerline_core::Backend;
use ledgerline_core::EntityId;
use ledgerline_core::Fingerprint;
use ledgerline_core::Reconciler;
use ledgerline_core::TrailingWatch;
use ledgerline_core::Version;
use ledgerline_core::VersionRequest;
use ledgerline_core::WatcherUrl;
use proptest::prelude::*;

// ============================================================================
// SECTION: Helpers
// ============================================================================

fn url(raw: &str) -> WatcherUrl {
    WatcherUrl::parse(raw).unwrap()
}

fn append_n(backend: &Backend, entity: &EntityId, count: u8) {
    for byte in 0..count {
        backend
            .ledger
            .append(entity, VersionRequest::Next, &Fingerprint::from_bytes(vec![byte]))
            .unwrap();
    }
}

// ============================================================================
// SECTION: Tests
// ============================================================================

/// Tests an entity without versions has no trailing watches.
#[test]
fn test_no_versions_means_no_trailing() {
    let backend = Backend::in_memory();
    let e1 = EntityId::new("e1");
    backend.watches.add(&e1, &url("http://a.test/")).unwrap();
    let reconciler = Reconciler::new(backend);
    assert!(reconciler.trailing(&e1).unwrap().is_empty());
}

/// Tests intermediate versions coalesce into one catch-up at the latest.
#[test]
fn test_catch_up_is_coalesced() {
    let backend = Backend::in_memory();
    let e1 = EntityId::new("e1");
    let watcher = url("http://a.test/");
    backend.watches.add(&e1, &watcher).unwrap();
    append_n(&backend, &e1, 5);
    let reconciler = Reconciler::new(backend);
    assert_eq!(
        reconciler.trailing(&e1).unwrap(),
        vec![TrailingWatch {
            url: watcher,
            version: Version::new(5),
        }]
    );
}

/// Tests only watchers behind the latest version trail.
#[test]
fn test_caught_up_watchers_are_skipped() {
    let backend = Backend::in_memory();
    let e1 = EntityId::new("e1");
    let behind = url("http://behind.test/");
    let current = url("http://current.test/");
    backend.watches.add(&e1, &behind).unwrap();
    backend.watches.add(&e1, &current).unwrap();
    append_n(&backend, &e1, 3);
    backend.watches.advance(&e1, &current, Version::new(3)).unwrap();
    backend.watches.advance(&e1, &behind, Version::new(2)).unwrap();
    let trailing = Reconciler::new(backend).trailing(&e1).unwrap();
    assert_eq!(trailing.len(), 1);
    assert_eq!(trailing[0].url, behind);
    assert_eq!(trailing[0].version, Version::new(3));
}

proptest! {
    /// Tests a watch trails iff its cursor is below the latest version.
    #[test]
    fn prop_trailing_iff_cursor_behind(writes in 1u8..20, cursor in 0u64..25) {
        let backend = Backend::in_memory();
        let e1 = EntityId::new("e1");
        let watcher = url("http://w.test/");
        backend.watches.add(&e1, &watcher).unwrap();
        append_n(&backend, &e1, writes);
        backend.watches.advance(&e1, &watcher, Version::new(cursor)).unwrap();
        let trailing = Reconciler::new(backend).trailing(&e1).unwrap();
        let latest = u64::from(writes);
        prop_assert_eq!(!trailing.is_empty(), cursor < latest);
        for watch in trailing {
            prop_assert_eq!(watch.version, Version::new(latest));
        }
    }
}
