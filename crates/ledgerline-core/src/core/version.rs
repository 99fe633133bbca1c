// ledgerline-core/src/core/version.rs
// ============================================================================
// Module: Ledgerline Versions
// Description: Per-entity version numbers and assignment policy.
// Purpose: Provide the ordered version type shared by ledger and watch cursors.
// Dependencies: serde
// ============================================================================

//! ## Overview
//! A [`Version`] is a per-entity, strictly increasing integer. Watch cursors
//! use the same type, with [`Version::ZERO`] meaning "has seen nothing".
//! Ledger backends decide how a new version is chosen using
//! [`VersionStrategy`]; callers may also request an exact version.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::fmt;

use serde::Deserialize;
use serde::Serialize;

// ============================================================================
// SECTION: Version
// ============================================================================

/// Per-entity version number.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct Version(u64);

impl Version {
    /// Cursor value for a watcher that has observed nothing.
    pub const ZERO: Self = Self(0);
    /// Largest version any backend stores (the signed 64-bit maximum).
    pub const MAX: Self = Self(9_223_372_036_854_775_807);

    /// Creates a version from a raw integer.
    #[must_use]
    pub const fn new(value: u64) -> Self {
        Self(value)
    }

    /// Returns the raw integer value.
    #[must_use]
    pub const fn get(self) -> u64 {
        self.0
    }

    /// Returns the next version, or `None` past [`Version::MAX`].
    #[must_use]
    pub const fn checked_next(self) -> Option<Self> {
        if self.0 >= Self::MAX.0 {
            return None;
        }
        Some(Self(self.0 + 1))
    }
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl From<u64> for Version {
    fn from(value: u64) -> Self {
        Self(value)
    }
}

// ============================================================================
// SECTION: Version Requests
// ============================================================================

/// Version requested by an append.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VersionRequest {
    /// Let the ledger assign the next version.
    Next,
    /// Use the caller-supplied version.
    Exact(Version),
}

impl From<Option<Version>> for VersionRequest {
    fn from(value: Option<Version>) -> Self {
        value.map_or(Self::Next, Self::Exact)
    }
}

/// Ledger policy for assigning versions to [`VersionRequest::Next`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VersionStrategy {
    /// Monotonic counter: `latest + 1`, starting at 1.
    #[default]
    Sequence,
    /// Wall clock milliseconds, bumped to `latest + 1` when the clock lags.
    UnixMillis,
}

impl VersionStrategy {
    /// Chooses the next version given the current latest and clock reading.
    ///
    /// Returns `None` when the next version would exceed [`Version::MAX`].
    #[must_use]
    pub fn next(self, latest: Option<Version>, now_millis: u64) -> Option<Version> {
        let floor = match latest {
            Some(latest) => latest.checked_next()?,
            None => Version::new(1),
        };
        match self {
            Self::Sequence => Some(floor),
            Self::UnixMillis => Some(floor.max(Version::new(now_millis)).min(Version::MAX)),
        }
    }
}
