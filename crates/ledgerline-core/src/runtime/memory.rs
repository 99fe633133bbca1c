// ledgerline-core/src/runtime/memory.rs
// ============================================================================
// Module: Ledgerline In-Memory Backend
// Description: In-memory implementation of every storage interface.
// Purpose: Provide a deterministic backend for tests and single-process demos.
// Dependencies: crate::core, crate::interfaces
// ============================================================================

//! ## Overview
//! [`InMemoryBackend`] implements [`ContentStore`], [`VersionLedger`],
//! [`WatchRegistry`], and [`SignalQueue`] over one mutex-guarded state. Clones
//! share the same state. A ledger append and its change signal are applied
//! under one lock acquisition. Nothing survives a restart, so it is not
//! intended for production use.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;
use std::sync::Arc;
use std::sync::Mutex;
use std::sync::MutexGuard;
use std::time::Duration;
use std::time::Instant;

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
use crate::core::unix_millis;
use crate::interfaces::AppendPlan;
use crate::interfaces::ContentStore;
use crate::interfaces::SignalQueue;
use crate::interfaces::StoreError;
use crate::interfaces::VersionLedger;
use crate::interfaces::WatchRegistry;
use crate::interfaces::plan_append;

// ============================================================================
// SECTION: State
// ============================================================================

/// Queued signal with its visibility deadline.
#[derive(Debug, Clone)]
struct QueuedSignal {
    /// Queued signal.
    signal: ChangeSignal,
    /// Instant at which the signal becomes visible.
    visible_at: Instant,
    /// Number of leases handed out.
    attempts: u32,
}

/// Shared backend state.
#[derive(Debug, Default)]
struct MemoryState {
    /// Content bytes by fingerprint.
    content: BTreeMap<Fingerprint, Vec<u8>>,
    /// Ledger entries by entity and version.
    versions: BTreeMap<EntityId, BTreeMap<Version, Fingerprint>>,
    /// Watch cursors by entity and watcher.
    watches: BTreeMap<EntityId, BTreeMap<WatcherUrl, Version>>,
    /// Queued signals by id.
    signals: BTreeMap<u64, QueuedSignal>,
    /// Next signal identifier.
    next_signal_id: u64,
}

impl MemoryState {
    /// Queues a signal, failing when `capacity` signals are already queued.
    fn push_signal(
        &mut self,
        signal: ChangeSignal,
        capacity: Option<usize>,
    ) -> Result<SignalId, StoreError> {
        if let Some(capacity) = capacity
            && self.signals.len() >= capacity
        {
            return Err(StoreError::Io(format!("signal queue full ({capacity} pending)")));
        }
        self.next_signal_id = self.next_signal_id.saturating_add(1);
        let id = self.next_signal_id;
        self.signals.insert(
            id,
            QueuedSignal {
                signal,
                visible_at: Instant::now(),
                attempts: 0,
            },
        );
        Ok(SignalId::new(id))
    }
}

// ============================================================================
// SECTION: Backend
// ============================================================================

/// In-memory storage backend.
#[derive(Debug, Clone, Default)]
pub struct InMemoryBackend {
    /// State protected by a mutex.
    state: Arc<Mutex<MemoryState>>,
    /// Version assignment policy.
    strategy: VersionStrategy,
    /// Maximum queued signals; unbounded when `None`.
    signal_capacity: Option<usize>,
}

impl InMemoryBackend {
    /// Creates an empty backend using sequential versions.
    #[must_use]
    pub fn new() -> Self {
        Self::with_strategy(VersionStrategy::default())
    }

    /// Creates an empty backend with an explicit version strategy.
    #[must_use]
    pub fn with_strategy(strategy: VersionStrategy) -> Self {
        Self {
            state: Arc::new(Mutex::new(MemoryState::default())),
            strategy,
            signal_capacity: None,
        }
    }

    /// Bounds the signal queue. Appends and enqueues fail once `capacity`
    /// signals are pending.
    #[must_use]
    pub const fn with_signal_capacity(mut self, capacity: usize) -> Self {
        self.signal_capacity = Some(capacity);
        self
    }

    /// Returns the number of distinct content entries.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when the state lock is poisoned.
    pub fn content_len(&self) -> Result<usize, StoreError> {
        Ok(self.lock()?.content.len())
    }

    /// Locks the shared state.
    fn lock(&self) -> Result<MutexGuard<'_, MemoryState>, StoreError> {
        self.state
            .lock()
            .map_err(|_| StoreError::Store("in-memory backend mutex poisoned".to_string()))
    }
}

impl ContentStore for InMemoryBackend {
    fn insert(&self, fingerprint: &Fingerprint, bytes: &[u8]) -> Result<(), StoreError> {
        let mut guard = self.lock()?;
        if let Some(existing) = guard.content.get(fingerprint) {
            if existing.as_slice() == bytes {
                return Ok(());
            }
            return Err(StoreError::Conflict(format!(
                "fingerprint {fingerprint} already holds different bytes"
            )));
        }
        guard.content.insert(fingerprint.clone(), bytes.to_vec());
        Ok(())
    }

    fn get(&self, fingerprint: &Fingerprint) -> Result<Option<Vec<u8>>, StoreError> {
        Ok(self.lock()?.content.get(fingerprint).cloned())
    }
}

impl VersionLedger for InMemoryBackend {
    fn append(
        &self,
        entity: &EntityId,
        request: VersionRequest,
        fingerprint: &Fingerprint,
    ) -> Result<Version, StoreError> {
        let mut guard = self.lock()?;
        let state = &mut *guard;
        let entries = state.versions.get(entity);
        let latest = entries.and_then(|entries| entries.keys().next_back().copied());
        let plan = plan_append(
            self.strategy,
            request,
            latest,
            |version| Ok(entries.is_some_and(|entries| entries.contains_key(&version))),
            unix_millis(),
        )?;
        if let AppendPlan::Insert(version) = plan {
            state.push_signal(
                ChangeSignal::new(entity.clone(), Some(version)),
                self.signal_capacity,
            )?;
            state.versions.entry(entity.clone()).or_default().insert(version, fingerprint.clone());
        }
        Ok(plan.version())
    }

    fn latest(&self, entity: &EntityId) -> Result<Option<LedgerEntry>, StoreError> {
        let guard = self.lock()?;
        Ok(guard.versions.get(entity).and_then(|entries| {
            entries.iter().next_back().map(|(version, fingerprint)| LedgerEntry {
                version: *version,
                fingerprint: fingerprint.clone(),
            })
        }))
    }

    fn history(&self, entity: &EntityId, limit: usize) -> Result<Vec<LedgerEntry>, StoreError> {
        let guard = self.lock()?;
        let Some(entries) = guard.versions.get(entity) else {
            return Ok(Vec::new());
        };
        Ok(entries
            .iter()
            .rev()
            .take(limit)
            .map(|(version, fingerprint)| LedgerEntry {
                version: *version,
                fingerprint: fingerprint.clone(),
            })
            .collect())
    }
}

impl WatchRegistry for InMemoryBackend {
    fn add(&self, entity: &EntityId, url: &WatcherUrl) -> Result<(), StoreError> {
        let mut guard = self.lock()?;
        guard
            .watches
            .entry(entity.clone())
            .or_default()
            .entry(url.clone())
            .or_insert(Version::ZERO);
        Ok(())
    }

    fn remove(&self, entity: &EntityId, url: &WatcherUrl) -> Result<(), StoreError> {
        let mut guard = self.lock()?;
        if let Some(watchers) = guard.watches.get_mut(entity) {
            watchers.remove(url);
            if watchers.is_empty() {
                guard.watches.remove(entity);
            }
        }
        Ok(())
    }

    fn cursor(&self, entity: &EntityId, url: &WatcherUrl) -> Result<Version, StoreError> {
        let guard = self.lock()?;
        Ok(guard
            .watches
            .get(entity)
            .and_then(|watchers| watchers.get(url))
            .copied()
            .unwrap_or(Version::ZERO))
    }

    fn advance(
        &self,
        entity: &EntityId,
        url: &WatcherUrl,
        version: Version,
    ) -> Result<bool, StoreError> {
        let mut guard = self.lock()?;
        let Some(cursor) = guard.watches.get_mut(entity).and_then(|watchers| watchers.get_mut(url))
        else {
            return Ok(false);
        };
        if version > *cursor {
            *cursor = version;
            return Ok(true);
        }
        Ok(false)
    }

    fn watchers(&self, entity: &EntityId) -> Result<Vec<WatchRecord>, StoreError> {
        let guard = self.lock()?;
        let Some(watchers) = guard.watches.get(entity) else {
            return Ok(Vec::new());
        };
        Ok(watchers
            .iter()
            .map(|(url, cursor)| WatchRecord {
                entity: entity.clone(),
                url: url.clone(),
                last_notified_version: *cursor,
            })
            .collect())
    }

    fn watched_entities(&self) -> Result<Vec<EntityId>, StoreError> {
        Ok(self.lock()?.watches.keys().cloned().collect())
    }
}

impl SignalQueue for InMemoryBackend {
    fn enqueue(&self, signal: &ChangeSignal) -> Result<SignalId, StoreError> {
        self.lock()?.push_signal(signal.clone(), self.signal_capacity)
    }

    fn dequeue(&self, lease: Duration) -> Result<Option<SignalLease>, StoreError> {
        let mut guard = self.lock()?;
        let now = Instant::now();
        let Some((id, queued)) =
            guard.signals.iter_mut().find(|(_, queued)| queued.visible_at <= now)
        else {
            return Ok(None);
        };
        queued.visible_at = now.checked_add(lease).unwrap_or(now);
        queued.attempts = queued.attempts.saturating_add(1);
        Ok(Some(SignalLease {
            id: SignalId::new(*id),
            signal: queued.signal.clone(),
            attempts: queued.attempts,
        }))
    }

    fn ack(&self, id: SignalId) -> Result<(), StoreError> {
        self.lock()?.signals.remove(&id.get());
        Ok(())
    }

    fn pending(&self) -> Result<usize, StoreError> {
        Ok(self.lock()?.signals.len())
    }
}
