// ledgerline-core/src/runtime/reconciler.rs
// ============================================================================
// Module: Ledgerline Reconciler
// Description: Trailing-watch computation for an entity.
// Purpose: Decide which watchers must be told that an entity advanced.
// Dependencies: crate::{core, interfaces, runtime}
// ============================================================================

//! ## Overview
//! A watch is trailing when its cursor is behind the entity's latest version.
//! Intermediate versions are coalesced: a watcher that missed several writes
//! receives one catch-up notice carrying the current latest version.

// ============================================================================
// SECTION: Imports
// ============================================================================

use crate::core::EntityId;
use crate::core::Version;
use crate::core::WatcherUrl;
use crate::interfaces::StoreError;
use crate::runtime::shared::Backend;

// ============================================================================
// SECTION: Types
// ============================================================================

/// Watcher that must be notified up to `version`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrailingWatch {
    /// Watcher endpoint.
    pub url: WatcherUrl,
    /// Latest entity version to announce.
    pub version: Version,
}

// ============================================================================
// SECTION: Reconciler
// ============================================================================

/// Computes trailing watches against a shared backend.
#[derive(Clone)]
pub struct Reconciler {
    /// Storage backend.
    backend: Backend,
}

impl Reconciler {
    /// Creates a reconciler over a backend.
    #[must_use]
    pub const fn new(backend: Backend) -> Self {
        Self {
            backend,
        }
    }

    /// Returns every watch on `entity` whose cursor is behind the latest
    /// version. Empty when the entity has no versions.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when the ledger or registry is unavailable.
    pub fn trailing(&self, entity: &EntityId) -> Result<Vec<TrailingWatch>, StoreError> {
        let Some(latest) = self.backend.ledger.latest(entity)? else {
            return Ok(Vec::new());
        };
        let watchers = self.backend.watches.watchers(entity)?;
        Ok(watchers
            .into_iter()
            .filter(|watch| watch.last_notified_version < latest.version)
            .map(|watch| TrailingWatch {
                url: watch.url,
                version: latest.version,
            })
            .collect())
    }
}
