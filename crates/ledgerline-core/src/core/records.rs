// ledgerline-core/src/core/records.rs
// ============================================================================
// Module: Ledgerline Records
// Description: Ledger, watch, and change-signal records.
// Purpose: Define the durable row shapes shared by every storage backend.
// Dependencies: serde
// ============================================================================

//! ## Overview
//! These records mirror the persisted relations: version entries per entity,
//! watch registrations with their delivery cursor, and queued change signals.
//! Records are plain data; all invariants are enforced by the storage
//! interfaces in [`crate::interfaces`].

// ============================================================================
// SECTION: Imports
// ============================================================================

use serde::Deserialize;
use serde::Serialize;

use crate::core::hashing::Fingerprint;
use crate::core::identifiers::EntityId;
use crate::core::identifiers::WatcherUrl;
use crate::core::version::Version;

// ============================================================================
// SECTION: Ledger Records
// ============================================================================

/// One ledger entry for an entity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerEntry {
    /// Entity version.
    pub version: Version,
    /// Content pointer recorded at this version.
    pub fingerprint: Fingerprint,
}

/// Fully qualified version record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VersionRecord {
    /// Owning entity.
    pub entity: EntityId,
    /// Entity version.
    pub version: Version,
    /// Content pointer recorded at this version.
    pub fingerprint: Fingerprint,
}

impl VersionRecord {
    /// Returns the ledger entry portion of the record.
    #[must_use]
    pub fn entry(&self) -> LedgerEntry {
        LedgerEntry {
            version: self.version,
            fingerprint: self.fingerprint.clone(),
        }
    }
}

// ============================================================================
// SECTION: Watch Records
// ============================================================================

/// Watch registration with its delivery cursor.
///
/// # Invariants
/// - `last_notified_version` never decreases.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WatchRecord {
    /// Watched entity.
    pub entity: EntityId,
    /// Watcher notification endpoint.
    pub url: WatcherUrl,
    /// Last version successfully delivered to the watcher.
    pub last_notified_version: Version,
}

// ============================================================================
// SECTION: Change Signals
// ============================================================================

/// Work item asking the dispatcher to reconcile an entity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChangeSignal {
    /// Entity that changed.
    pub entity: EntityId,
    /// Version observed at enqueue time, when known.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<Version>,
}

impl ChangeSignal {
    /// Creates a change signal for an entity.
    #[must_use]
    pub const fn new(entity: EntityId, version: Option<Version>) -> Self {
        Self {
            entity,
            version,
        }
    }
}

/// Queue-assigned identifier of an enqueued signal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SignalId(u64);

impl SignalId {
    /// Creates a signal identifier from a raw integer.
    #[must_use]
    pub const fn new(value: u64) -> Self {
        Self(value)
    }

    /// Returns the raw integer value.
    #[must_use]
    pub const fn get(self) -> u64 {
        self.0
    }
}

/// A dequeued signal held under a visibility lease.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignalLease {
    /// Queue identifier used to acknowledge the signal.
    pub id: SignalId,
    /// Leased signal.
    pub signal: ChangeSignal,
    /// Number of times the signal has been leased, including this one.
    pub attempts: u32,
}

// ============================================================================
// SECTION: Notices
// ============================================================================

/// Body delivered to watchers when an entity advances.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChangeNotice {
    /// Entity that advanced.
    pub entity: EntityId,
}
