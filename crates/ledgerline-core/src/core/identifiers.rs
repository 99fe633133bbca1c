// ledgerline-core/src/core/identifiers.rs
// ============================================================================
// Module: Ledgerline Identifiers
// Description: Opaque identifiers for entities and watcher endpoints.
// Purpose: Provide strongly typed, serializable IDs with stable string forms.
// Dependencies: serde, thiserror, url
// ============================================================================

//! ## Overview
//! Entities are caller-chosen opaque string keys; watchers are identified by
//! the URL of their notification endpoint. Both serialize as plain strings.
//! `new` constructors are unchecked wrappers for trusted inputs; `parse`
//! constructors enforce the limits applied at request boundaries.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::fmt;

use serde::Deserialize;
use serde::Serialize;
use thiserror::Error;
use url::Url;

// ============================================================================
// SECTION: Limits
// ============================================================================

/// Maximum entity key length in bytes.
///
/// Keys are frequently URLs; 4096 bytes fits any practical URL.
pub const MAX_ENTITY_KEY_BYTES: usize = 4096;
/// Maximum watcher URL length in bytes.
pub const MAX_WATCHER_URL_BYTES: usize = 4096;

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Identifier validation errors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum IdentifierError {
    /// Entity key is empty.
    #[error("entity key must not be empty")]
    EmptyEntity,
    /// Entity key exceeds the length limit.
    #[error("entity key exceeds {max} bytes ({actual})")]
    EntityTooLong {
        /// Maximum allowed bytes.
        max: usize,
        /// Actual key length in bytes.
        actual: usize,
    },
    /// Watcher URL failed to parse or uses an unsupported scheme.
    #[error("invalid watcher url: {0}")]
    InvalidUrl(String),
}

// ============================================================================
// SECTION: Entity Identifier
// ============================================================================

/// Caller-chosen entity key.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EntityId(String);

impl EntityId {
    /// Creates a new entity identifier without validation.
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Parses an entity identifier, enforcing boundary limits.
    ///
    /// # Errors
    ///
    /// Returns [`IdentifierError`] when the key is empty or too long.
    pub fn parse(raw: &str) -> Result<Self, IdentifierError> {
        if raw.is_empty() {
            return Err(IdentifierError::EmptyEntity);
        }
        if raw.len() > MAX_ENTITY_KEY_BYTES {
            return Err(IdentifierError::EntityTooLong {
                max: MAX_ENTITY_KEY_BYTES,
                actual: raw.len(),
            });
        }
        Ok(Self(raw.to_string()))
    }

    /// Returns the identifier as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl From<&str> for EntityId {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl From<String> for EntityId {
    fn from(value: String) -> Self {
        Self::new(value)
    }
}

// ============================================================================
// SECTION: Watcher URL
// ============================================================================

/// Notification endpoint of a watcher.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct WatcherUrl(String);

impl WatcherUrl {
    /// Creates a new watcher URL without validation.
    #[must_use]
    pub fn new(url: impl Into<String>) -> Self {
        Self(url.into())
    }

    /// Parses a watcher URL, requiring an absolute `http` or `https` URL.
    ///
    /// The original string form is kept so registrations match byte-for-byte.
    ///
    /// # Errors
    ///
    /// Returns [`IdentifierError::InvalidUrl`] when the URL is malformed,
    /// too long, or not HTTP(S).
    pub fn parse(raw: &str) -> Result<Self, IdentifierError> {
        if raw.len() > MAX_WATCHER_URL_BYTES {
            return Err(IdentifierError::InvalidUrl(format!(
                "url exceeds {MAX_WATCHER_URL_BYTES} bytes"
            )));
        }
        let url = Url::parse(raw).map_err(|err| IdentifierError::InvalidUrl(err.to_string()))?;
        match url.scheme() {
            "http" | "https" => Ok(Self(raw.to_string())),
            scheme => Err(IdentifierError::InvalidUrl(format!("unsupported scheme: {scheme}"))),
        }
    }

    /// Returns the URL as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for WatcherUrl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl From<&str> for WatcherUrl {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl From<String> for WatcherUrl {
    fn from(value: String) -> Self {
        Self::new(value)
    }
}
