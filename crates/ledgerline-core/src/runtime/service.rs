// ledgerline-core/src/runtime/service.rs
// ============================================================================
// Module: Ledgerline Ingest Service
// Description: Store, read, history, and watch operations over a backend.
// Purpose: Provide the synchronous request path shared by every API surface.
// Dependencies: crate::{audit, core, interfaces, runtime}, serde
// ============================================================================

//! ## Overview
//! [`IngestService`] validates requests, canonicalizes payloads, and drives
//! the storage interfaces in a fixed order: content insert, then the ledger
//! append, which enqueues the change signal atomically. An append therefore
//! never refers to content that failed to persist, and a failed request
//! leaves no version behind. Delivery is never awaited here; the dispatcher
//! consumes the enqueued signals asynchronously.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::sync::Arc;

use serde::Deserialize;
use serde::Serialize;
use thiserror::Error;

use crate::audit::AuditSink;
use crate::audit::IngestAuditEvent;
use crate::audit::NoopAuditSink;
use crate::audit::WatchAction;
use crate::audit::WatchAuditEvent;
use crate::core::DEFAULT_HASH_ALGORITHM;
use crate::core::EntityId;
use crate::core::Fingerprint;
use crate::core::HashAlgorithm;
use crate::core::HashError;
use crate::core::IdentifierError;
use crate::core::LedgerEntry;
use crate::core::MAX_POINTER_BYTES;
use crate::core::Version;
use crate::core::VersionRequest;
use crate::core::WatcherUrl;
use crate::core::guess_media_type;
use crate::core::hashing::encode_canonical;
use crate::interfaces::StoreError;
use crate::runtime::shared::Backend;

// ============================================================================
// SECTION: Limits
// ============================================================================

/// Default number of history entries returned.
pub const DEFAULT_HISTORY_LIMIT: usize = 100;
/// Hard cap on history entries returned.
pub const MAX_HISTORY_LIMIT: usize = 1000;

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Errors raised by the ingest service.
#[derive(Debug, Error)]
pub enum ServiceError {
    /// Request was rejected before any state changed.
    #[error("validation error: {0}")]
    Validation(String),
    /// Storage was unavailable or failed.
    #[error("storage error: {0}")]
    Storage(String),
    /// Stored content contradicts the request; retrying cannot succeed.
    #[error("conflict: {0}")]
    Conflict(String),
    /// Payload could not be canonicalized.
    #[error("encoding error: {0}")]
    Encoding(String),
}

impl From<StoreError> for ServiceError {
    fn from(error: StoreError) -> Self {
        if error.is_validation() {
            Self::Validation(error.to_string())
        } else if error.is_conflict() {
            Self::Conflict(error.to_string())
        } else {
            Self::Storage(error.to_string())
        }
    }
}

impl From<IdentifierError> for ServiceError {
    fn from(error: IdentifierError) -> Self {
        Self::Validation(error.to_string())
    }
}

impl From<HashError> for ServiceError {
    fn from(error: HashError) -> Self {
        Self::Encoding(error.to_string())
    }
}

// ============================================================================
// SECTION: Types
// ============================================================================

/// Ingest service configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IngestServiceConfig {
    /// Fingerprint algorithm for structured payloads.
    pub hash_algorithm: HashAlgorithm,
    /// History entries returned when no limit is given.
    pub default_history_limit: usize,
    /// Largest accepted history limit.
    pub max_history_limit: usize,
}

impl Default for IngestServiceConfig {
    fn default() -> Self {
        Self {
            hash_algorithm: DEFAULT_HASH_ALGORITHM,
            default_history_limit: DEFAULT_HISTORY_LIMIT,
            max_history_limit: MAX_HISTORY_LIMIT,
        }
    }
}

/// Result of a successful store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoreReceipt {
    /// Effective version.
    pub version: Version,
    /// Content pointer recorded at that version.
    pub pointer: Fingerprint,
}

/// Latest payload for an entity.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReadResult {
    /// Latest version.
    pub version: Version,
    /// Content pointer at that version.
    pub pointer: Fingerprint,
    /// Stored bytes.
    pub bytes: Vec<u8>,
    /// Sniffed media type, when recognized.
    pub media_type: Option<&'static str>,
}

/// One entry of a batch watch or unwatch request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WatchRequest {
    /// Entity key.
    pub entity: String,
    /// Watcher endpoint.
    pub url: String,
}

// ============================================================================
// SECTION: Service
// ============================================================================

/// Synchronous ingest, read, and watch operations.
#[derive(Clone)]
pub struct IngestService {
    /// Storage backend.
    backend: Backend,
    /// Service configuration.
    config: IngestServiceConfig,
    /// Audit sink for ingest and watch events.
    audit: Arc<dyn AuditSink>,
}

impl IngestService {
    /// Creates a service with a no-op audit sink.
    #[must_use]
    pub fn new(backend: Backend, config: IngestServiceConfig) -> Self {
        Self {
            backend,
            config,
            audit: Arc::new(NoopAuditSink),
        }
    }

    /// Replaces the audit sink.
    #[must_use]
    pub fn with_audit(mut self, audit: Arc<dyn AuditSink>) -> Self {
        self.audit = audit;
        self
    }

    /// Returns the storage backend handle.
    #[must_use]
    pub const fn backend(&self) -> &Backend {
        &self.backend
    }

    /// Returns the service configuration.
    #[must_use]
    pub const fn config(&self) -> &IngestServiceConfig {
        &self.config
    }

    /// Canonicalizes and stores a structured payload.
    ///
    /// # Errors
    ///
    /// Returns [`ServiceError::Validation`] for a bad key or a stale or
    /// out-of-range explicit version, [`ServiceError::Encoding`] when
    /// canonicalization fails, [`ServiceError::Conflict`] on a content
    /// collision, and [`ServiceError::Storage`] when any storage step fails.
    pub fn store_json<T: Serialize + ?Sized>(
        &self,
        entity: &str,
        payload: &T,
        version: Option<Version>,
    ) -> Result<StoreReceipt, ServiceError> {
        let entity = EntityId::parse(entity)?;
        check_version(version)?;
        let (bytes, fingerprint) = encode_canonical(self.config.hash_algorithm, payload)?;
        self.backend.content.insert(&fingerprint, &bytes)?;
        let receipt = self.record(&entity, fingerprint, version)?;
        self.audit.record_ingest(&IngestAuditEvent::new(
            entity,
            receipt.version,
            receipt.pointer.clone(),
            bytes.len(),
            false,
        ));
        Ok(receipt)
    }

    /// Records a caller-supplied pointer without touching the content store.
    ///
    /// # Errors
    ///
    /// Returns [`ServiceError::Validation`] for an empty or oversized pointer,
    /// a bad key, or a stale or out-of-range explicit version, and
    /// [`ServiceError::Storage`] when the ledger or queue fails.
    pub fn store_pointer(
        &self,
        entity: &str,
        pointer: &[u8],
        version: Option<Version>,
    ) -> Result<StoreReceipt, ServiceError> {
        let entity = EntityId::parse(entity)?;
        check_version(version)?;
        if pointer.is_empty() {
            return Err(ServiceError::Validation("pointer must not be empty".to_string()));
        }
        if pointer.len() > MAX_POINTER_BYTES {
            return Err(ServiceError::Validation(format!(
                "pointer exceeds {MAX_POINTER_BYTES} bytes ({})",
                pointer.len()
            )));
        }
        let receipt = self.record(&entity, Fingerprint::from_bytes(pointer.to_vec()), version)?;
        self.audit.record_ingest(&IngestAuditEvent::new(
            entity,
            receipt.version,
            receipt.pointer.clone(),
            0,
            true,
        ));
        Ok(receipt)
    }

    /// Appends the ledger record together with its change signal.
    fn record(
        &self,
        entity: &EntityId,
        pointer: Fingerprint,
        version: Option<Version>,
    ) -> Result<StoreReceipt, ServiceError> {
        let version = self.backend.ledger.append(entity, VersionRequest::from(version), &pointer)?;
        Ok(StoreReceipt {
            version,
            pointer,
        })
    }

    /// Reads the latest payload for an entity.
    ///
    /// Returns `None` when the entity has no versions or its latest pointer
    /// has no content-store entry.
    ///
    /// # Errors
    ///
    /// Returns [`ServiceError`] when the key is invalid or storage fails.
    pub fn read(&self, entity: &str) -> Result<Option<ReadResult>, ServiceError> {
        let entity = EntityId::parse(entity)?;
        let Some(latest) = self.backend.ledger.latest(&entity)? else {
            return Ok(None);
        };
        let Some(bytes) = self.backend.content.get(&latest.fingerprint)? else {
            return Ok(None);
        };
        let media_type = guess_media_type(&bytes);
        Ok(Some(ReadResult {
            version: latest.version,
            pointer: latest.fingerprint,
            bytes,
            media_type,
        }))
    }

    /// Reads the latest ledger entry for an entity.
    ///
    /// # Errors
    ///
    /// Returns [`ServiceError`] when the key is invalid or storage fails.
    pub fn read_pointer(&self, entity: &str) -> Result<Option<LedgerEntry>, ServiceError> {
        let entity = EntityId::parse(entity)?;
        Ok(self.backend.ledger.latest(&entity)?)
    }

    /// Returns version history, most recent first.
    ///
    /// # Errors
    ///
    /// Returns [`ServiceError::Validation`] when `limit` is zero or above the
    /// configured maximum.
    pub fn history(
        &self,
        entity: &str,
        limit: Option<usize>,
    ) -> Result<Vec<LedgerEntry>, ServiceError> {
        let entity = EntityId::parse(entity)?;
        let limit = limit.unwrap_or(self.config.default_history_limit);
        if limit == 0 || limit > self.config.max_history_limit {
            return Err(ServiceError::Validation(format!(
                "history limit must be between 1 and {}",
                self.config.max_history_limit
            )));
        }
        Ok(self.backend.ledger.history(&entity, limit)?)
    }

    /// Registers a watcher on an entity.
    ///
    /// # Errors
    ///
    /// Returns [`ServiceError`] when validation or storage fails.
    pub fn watch(&self, entity: &str, url: &str) -> Result<(), ServiceError> {
        let (entity, url) = parse_watch(entity, url)?;
        self.apply_watch(entity, url, WatchAction::Watch)
    }

    /// Removes a watcher from an entity.
    ///
    /// # Errors
    ///
    /// Returns [`ServiceError`] when validation or storage fails.
    pub fn unwatch(&self, entity: &str, url: &str) -> Result<(), ServiceError> {
        let (entity, url) = parse_watch(entity, url)?;
        self.apply_watch(entity, url, WatchAction::Unwatch)
    }

    /// Registers a batch of watchers. Every entry is validated before any is
    /// applied.
    ///
    /// # Errors
    ///
    /// Returns [`ServiceError`] when validation or storage fails.
    pub fn watch_many(&self, requests: &[WatchRequest]) -> Result<(), ServiceError> {
        self.apply_batch(requests, WatchAction::Watch)
    }

    /// Removes a batch of watchers. Every entry is validated before any is
    /// applied.
    ///
    /// # Errors
    ///
    /// Returns [`ServiceError`] when validation or storage fails.
    pub fn unwatch_many(&self, requests: &[WatchRequest]) -> Result<(), ServiceError> {
        self.apply_batch(requests, WatchAction::Unwatch)
    }

    /// Validates then applies a batch.
    fn apply_batch(
        &self,
        requests: &[WatchRequest],
        action: WatchAction,
    ) -> Result<(), ServiceError> {
        let parsed = requests
            .iter()
            .map(|request| parse_watch(&request.entity, &request.url))
            .collect::<Result<Vec<_>, _>>()?;
        for (entity, url) in parsed {
            self.apply_watch(entity, url, action)?;
        }
        Ok(())
    }

    /// Applies one registration change and audits it.
    fn apply_watch(
        &self,
        entity: EntityId,
        url: WatcherUrl,
        action: WatchAction,
    ) -> Result<(), ServiceError> {
        match action {
            WatchAction::Watch => self.backend.watches.add(&entity, &url)?,
            WatchAction::Unwatch => self.backend.watches.remove(&entity, &url)?,
        }
        self.audit.record_watch(&WatchAuditEvent::new(entity, url, action));
        Ok(())
    }
}

/// Rejects explicit versions no backend can store.
fn check_version(version: Option<Version>) -> Result<(), ServiceError> {
    match version {
        Some(version) if version > Version::MAX => Err(ServiceError::Validation(format!(
            "version {version} exceeds {}",
            Version::MAX
        ))),
        _ => Ok(()),
    }
}

/// Parses a watch registration pair.
fn parse_watch(entity: &str, url: &str) -> Result<(EntityId, WatcherUrl), ServiceError> {
    Ok((EntityId::parse(entity)?, WatcherUrl::parse(url)?))
}
