// ledgerline-core/src/interfaces/mod.rs
// ============================================================================
// Module: Ledgerline Interfaces
// Description: Backend-agnostic storage interfaces.
// Purpose: Define the content store, ledger, watch registry, and signal queue contracts.
// Dependencies: crate::core
// ============================================================================

//! ## Overview
//! Interfaces define how Ledgerline persists payloads, versions, watch
//! cursors, and change signals. Implementations must be deterministic and
//! fail closed. Every invariant that must hold across service instances
//! (write-once content, idempotent appends, monotonic cursors, leased
//! signals) is enforced behind these traits, never by in-process state.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::time::Duration;

use thiserror::Error;

use crate::core::ChangeSignal;
use crate::core::EntityId;
use crate::core::Fingerprint;
use crate::core::LedgerEntry;
use crate::core::SignalId;
use crate::core::SignalLease;
use crate::core::Version;
use crate::core::VersionRequest;
use crate::core::VersionStrategy;
use crate::core::WatchRecord;
use crate::core::WatcherUrl;

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Storage errors shared by every backend.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Store I/O error or unavailable backend.
    #[error("store io error: {0}")]
    Io(String),
    /// Store data is corrupted or fails integrity checks.
    #[error("store corruption: {0}")]
    Corrupt(String),
    /// Store schema version is incompatible.
    #[error("store version mismatch: {0}")]
    VersionMismatch(String),
    /// Store data is invalid.
    #[error("store invalid data: {0}")]
    Invalid(String),
    /// Content key already holds different bytes.
    #[error("content conflict: {0}")]
    Conflict(String),
    /// Explicit version is behind the ledger.
    #[error("stale version: {0}")]
    Stale(String),
    /// Version lies outside the storable range.
    #[error("version out of range: {0}")]
    OutOfRange(String),
    /// Store reported an error.
    #[error("store error: {0}")]
    Store(String),
}

impl StoreError {
    /// Returns true when the error was caused by the caller's request.
    #[must_use]
    pub const fn is_validation(&self) -> bool {
        matches!(self, Self::Stale(_) | Self::OutOfRange(_))
    }

    /// Returns true when retrying the same request cannot succeed.
    #[must_use]
    pub const fn is_conflict(&self) -> bool {
        matches!(self, Self::Conflict(_))
    }
}

// ============================================================================
// SECTION: Content Store
// ============================================================================

/// Write-once content-addressed byte store.
pub trait ContentStore {
    /// Inserts bytes under a fingerprint. Re-inserting identical bytes is a
    /// no-op.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Conflict`] when the key already holds different
    /// bytes, or another [`StoreError`] when the store is unavailable.
    fn insert(&self, fingerprint: &Fingerprint, bytes: &[u8]) -> Result<(), StoreError>;

    /// Fetches bytes by fingerprint.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when the store is unavailable.
    fn get(&self, fingerprint: &Fingerprint) -> Result<Option<Vec<u8>>, StoreError>;
}

// ============================================================================
// SECTION: Version Ledger
// ============================================================================

/// Append-only per-entity version ledger.
///
/// The ledger owns the signal queue its appends feed, so a committed version
/// always has a queued change signal.
///
/// # Invariants
/// - Versions per entity are strictly increasing.
/// - `history(entity, n)[0] == latest(entity)` for any non-empty entity.
/// - A new record and its [`ChangeSignal`] commit together or not at all.
pub trait VersionLedger: SignalQueue {
    /// Appends a version record, enqueues its change signal in the same
    /// atomic step, and returns the effective version.
    ///
    /// An exact request naming an existing version returns that version
    /// unchanged and enqueues nothing.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Stale`] when an exact version is behind the
    /// latest, [`StoreError::OutOfRange`] when the version would exceed
    /// [`Version::MAX`], or another [`StoreError`] when the ledger or queue is
    /// unavailable. Nothing is committed on error.
    fn append(
        &self,
        entity: &EntityId,
        request: VersionRequest,
        fingerprint: &Fingerprint,
    ) -> Result<Version, StoreError>;

    /// Returns the latest entry for an entity.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when the ledger is unavailable.
    fn latest(&self, entity: &EntityId) -> Result<Option<LedgerEntry>, StoreError>;

    /// Returns up to `limit` entries, most recent first.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when the ledger is unavailable.
    fn history(&self, entity: &EntityId, limit: usize) -> Result<Vec<LedgerEntry>, StoreError>;
}

/// Outcome of planning an append against the current ledger state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppendPlan {
    /// Insert a new record at this version.
    Insert(Version),
    /// The version already exists; nothing to write.
    Existing(Version),
}

impl AppendPlan {
    /// Returns the effective version.
    #[must_use]
    pub const fn version(self) -> Version {
        match self {
            Self::Insert(version) | Self::Existing(version) => version,
        }
    }
}

/// Decides which version an append lands on.
///
/// Backends call this inside their per-entity critical section with the
/// current latest version and a lookup for exact requests.
///
/// # Errors
///
/// Returns [`StoreError::Stale`] for an exact version that is zero or behind
/// the latest without existing, and [`StoreError::OutOfRange`] for an exact
/// version above [`Version::MAX`] or when the version space is exhausted.
pub fn plan_append(
    strategy: VersionStrategy,
    request: VersionRequest,
    latest: Option<Version>,
    exists: impl FnOnce(Version) -> Result<bool, StoreError>,
    now_millis: u64,
) -> Result<AppendPlan, StoreError> {
    match request {
        VersionRequest::Next => strategy
            .next(latest, now_millis)
            .map(AppendPlan::Insert)
            .ok_or_else(|| StoreError::OutOfRange("version space exhausted".to_string())),
        VersionRequest::Exact(version) => {
            if version == Version::ZERO {
                return Err(StoreError::Stale("version must be at least 1".to_string()));
            }
            if version > Version::MAX {
                return Err(StoreError::OutOfRange(format!(
                    "version {version} exceeds {}",
                    Version::MAX
                )));
            }
            match latest {
                Some(latest) if version > latest => Ok(AppendPlan::Insert(version)),
                None => Ok(AppendPlan::Insert(version)),
                Some(latest) => {
                    if exists(version)? {
                        Ok(AppendPlan::Existing(version))
                    } else {
                        Err(StoreError::Stale(format!(
                            "version {version} is behind latest {latest}"
                        )))
                    }
                }
            }
        }
    }
}

// ============================================================================
// SECTION: Watch Registry
// ============================================================================

/// Watch registrations with per-watcher delivery cursors.
///
/// # Invariants
/// - A cursor never decreases; regressing advances are ignored.
pub trait WatchRegistry {
    /// Registers a watcher. An existing cursor is left untouched.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when the registry is unavailable.
    fn add(&self, entity: &EntityId, url: &WatcherUrl) -> Result<(), StoreError>;

    /// Removes a watcher if present.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when the registry is unavailable.
    fn remove(&self, entity: &EntityId, url: &WatcherUrl) -> Result<(), StoreError>;

    /// Returns the watcher cursor, or [`Version::ZERO`] when unregistered.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when the registry is unavailable.
    fn cursor(&self, entity: &EntityId, url: &WatcherUrl) -> Result<Version, StoreError>;

    /// Advances the cursor when `version` is ahead of it.
    ///
    /// Returns whether the cursor moved.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when the registry is unavailable.
    fn advance(
        &self,
        entity: &EntityId,
        url: &WatcherUrl,
        version: Version,
    ) -> Result<bool, StoreError>;

    /// Returns every watch record on an entity.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when the registry is unavailable.
    fn watchers(&self, entity: &EntityId) -> Result<Vec<WatchRecord>, StoreError>;

    /// Returns every entity with at least one watcher.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when the registry is unavailable.
    fn watched_entities(&self) -> Result<Vec<EntityId>, StoreError>;
}

// ============================================================================
// SECTION: Signal Queue
// ============================================================================

/// Durable at-least-once queue of change signals.
///
/// # Invariants
/// - A leased signal is invisible until acknowledged or until its lease
///   expires, after which it is redelivered.
pub trait SignalQueue {
    /// Enqueues a change signal.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when the queue is unavailable.
    fn enqueue(&self, signal: &ChangeSignal) -> Result<SignalId, StoreError>;

    /// Leases the oldest visible signal for `lease`.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when the queue is unavailable.
    fn dequeue(&self, lease: Duration) -> Result<Option<SignalLease>, StoreError>;

    /// Acknowledges and deletes a leased signal. Unknown ids are ignored.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when the queue is unavailable.
    fn ack(&self, id: SignalId) -> Result<(), StoreError>;

    /// Returns the number of queued signals, leased or not.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when the queue is unavailable.
    fn pending(&self) -> Result<usize, StoreError>;
}
