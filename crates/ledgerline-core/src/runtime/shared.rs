// ledgerline-core/src/runtime/shared.rs
// ============================================================================
// Module: Ledgerline Shared Backend
// Description: Clonable handle over the four storage interfaces.
// Purpose: Pass one backend handle to the service, reconciler, and dispatcher.
// Dependencies: crate::interfaces
// ============================================================================

//! ## Overview
//! [`Backend`] bundles `Arc` trait objects for the content store, ledger,
//! watch registry, and signal queue. Most deployments back all four with one
//! engine via [`Backend::from_store`]. [`Backend::from_parts`] mixes engines,
//! but the ledger and the signal queue always come from the same engine so
//! appends and their signals commit together.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::sync::Arc;

use crate::interfaces::ContentStore;
use crate::interfaces::SignalQueue;
use crate::interfaces::VersionLedger;
use crate::interfaces::WatchRegistry;
use crate::runtime::memory::InMemoryBackend;

// ============================================================================
// SECTION: Backend Handle
// ============================================================================

/// Shared storage backend handle.
#[derive(Clone)]
pub struct Backend {
    /// Content-addressed payload store.
    pub content: Arc<dyn ContentStore + Send + Sync>,
    /// Version ledger.
    pub ledger: Arc<dyn VersionLedger + Send + Sync>,
    /// Watch registry.
    pub watches: Arc<dyn WatchRegistry + Send + Sync>,
    /// Change-signal queue.
    pub signals: Arc<dyn SignalQueue + Send + Sync>,
}

impl Backend {
    /// Wraps one store implementing every interface.
    #[must_use]
    pub fn from_store<S>(store: S) -> Self
    where
        S: ContentStore + VersionLedger + WatchRegistry + SignalQueue + Send + Sync + 'static,
    {
        let store = Arc::new(store);
        Self {
            content: store.clone(),
            ledger: store.clone(),
            watches: store.clone(),
            signals: store,
        }
    }

    /// Builds a handle from independently supplied parts. `ledger` also
    /// serves as the signal queue.
    #[must_use]
    pub fn from_parts<L>(
        content: Arc<dyn ContentStore + Send + Sync>,
        ledger: Arc<L>,
        watches: Arc<dyn WatchRegistry + Send + Sync>,
    ) -> Self
    where
        L: VersionLedger + Send + Sync + 'static,
    {
        Self {
            content,
            ledger: ledger.clone(),
            watches,
            signals: ledger,
        }
    }

    /// Creates a fresh in-memory backend.
    #[must_use]
    pub fn in_memory() -> Self {
        Self::from_store(InMemoryBackend::new())
    }
}
