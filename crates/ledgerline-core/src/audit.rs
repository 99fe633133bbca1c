// ledgerline-core/src/audit.rs
// ============================================================================
// Module: Ledgerline Audit Logging
// Description: Structured audit events for ingest, watch, and dispatch activity.
// Purpose: Emit JSON-lines audit records without a hard logging dependency.
// Dependencies: serde, serde_json
// ============================================================================

//! ## Overview
//! This module defines audit event payloads and sinks. Every event carries an
//! `event` label and a `timestamp_ms` so deployments can route the JSON lines
//! to their preferred logging pipeline. Delivery failures are only ever
//! reported here; they never reach ingest callers.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::fs::OpenOptions;
use std::io;
use std::io::Write;
use std::path::Path;
use std::sync::Mutex;

use serde::Serialize;

use crate::core::EntityId;
use crate::core::Fingerprint;
use crate::core::Version;
use crate::core::WatcherUrl;
use crate::core::unix_millis;

// ============================================================================
// SECTION: Ingest and Watch Events
// ============================================================================

/// Audit record for a successful store operation.
#[derive(Debug, Clone, Serialize)]
pub struct IngestAuditEvent {
    /// Event identifier.
    pub event: &'static str,
    /// Event timestamp (milliseconds since epoch).
    pub timestamp_ms: u64,
    /// Entity written.
    pub entity: EntityId,
    /// Effective version.
    pub version: Version,
    /// Content pointer recorded.
    pub pointer: Fingerprint,
    /// Payload size in bytes (zero for pointer-only writes).
    pub payload_bytes: usize,
    /// Whether the write supplied a pointer instead of a payload.
    pub by_pointer: bool,
}

impl IngestAuditEvent {
    /// Creates an ingest event stamped with the current time.
    #[must_use]
    pub fn new(
        entity: EntityId,
        version: Version,
        pointer: Fingerprint,
        payload_bytes: usize,
        by_pointer: bool,
    ) -> Self {
        Self {
            event: "entity_ingest",
            timestamp_ms: unix_millis(),
            entity,
            version,
            pointer,
            payload_bytes,
            by_pointer,
        }
    }
}

/// Watch registration change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum WatchAction {
    /// Watcher registered.
    Watch,
    /// Watcher removed.
    Unwatch,
}

/// Audit record for a watch registration change.
#[derive(Debug, Clone, Serialize)]
pub struct WatchAuditEvent {
    /// Event identifier.
    pub event: &'static str,
    /// Event timestamp (milliseconds since epoch).
    pub timestamp_ms: u64,
    /// Watched entity.
    pub entity: EntityId,
    /// Watcher endpoint.
    pub url: WatcherUrl,
    /// Registration change.
    pub action: WatchAction,
}

impl WatchAuditEvent {
    /// Creates a watch event stamped with the current time.
    #[must_use]
    pub fn new(entity: EntityId, url: WatcherUrl, action: WatchAction) -> Self {
        Self {
            event: "watch_change",
            timestamp_ms: unix_millis(),
            entity,
            url,
            action,
        }
    }
}

// ============================================================================
// SECTION: Dispatch Events
// ============================================================================

/// Outcome of a single delivery attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DeliveryOutcome {
    /// Watcher acknowledged and its cursor was advanced.
    Delivered,
    /// Watcher rejected the notice or was unreachable.
    Failed,
    /// Attempt exceeded the delivery timeout.
    TimedOut,
}

/// Audit record for a single delivery attempt.
#[derive(Debug, Clone, Serialize)]
pub struct DeliveryAuditEvent {
    /// Event identifier.
    pub event: &'static str,
    /// Event timestamp (milliseconds since epoch).
    pub timestamp_ms: u64,
    /// Entity being announced.
    pub entity: EntityId,
    /// Target watcher.
    pub url: WatcherUrl,
    /// Version announced.
    pub version: Version,
    /// Attempt outcome.
    pub outcome: DeliveryOutcome,
    /// Failure detail when the attempt did not succeed.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Attempt duration in milliseconds.
    pub elapsed_ms: u64,
}

impl DeliveryAuditEvent {
    /// Creates a delivery event stamped with the current time.
    #[must_use]
    pub fn new(
        entity: EntityId,
        url: WatcherUrl,
        version: Version,
        outcome: DeliveryOutcome,
        error: Option<String>,
        elapsed_ms: u64,
    ) -> Self {
        Self {
            event: "delivery_attempt",
            timestamp_ms: unix_millis(),
            entity,
            url,
            version,
            outcome,
            error,
            elapsed_ms,
        }
    }
}

/// Audit record summarizing one dispatch cycle.
#[derive(Debug, Clone, Serialize)]
pub struct DispatchCycleEvent {
    /// Event identifier.
    pub event: &'static str,
    /// Event timestamp (milliseconds since epoch).
    pub timestamp_ms: u64,
    /// Queue identifier of the signal.
    pub signal_id: u64,
    /// Entity reconciled.
    pub entity: EntityId,
    /// Lease count for the signal.
    pub attempts: u32,
    /// Number of trailing watchers found.
    pub trailing: usize,
    /// Number of successful deliveries.
    pub delivered: usize,
    /// Whether the signal was acknowledged.
    pub acknowledged: bool,
    /// Storage error that aborted the cycle, if any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Inputs required to construct a dispatch cycle event.
pub struct DispatchCycleParams {
    /// Queue identifier of the signal.
    pub signal_id: u64,
    /// Entity reconciled.
    pub entity: EntityId,
    /// Lease count for the signal.
    pub attempts: u32,
    /// Number of trailing watchers found.
    pub trailing: usize,
    /// Number of successful deliveries.
    pub delivered: usize,
    /// Whether the signal was acknowledged.
    pub acknowledged: bool,
    /// Storage error that aborted the cycle, if any.
    pub error: Option<String>,
}

impl DispatchCycleEvent {
    /// Creates a cycle event stamped with the current time.
    #[must_use]
    pub fn new(params: DispatchCycleParams) -> Self {
        Self {
            event: "dispatch_cycle",
            timestamp_ms: unix_millis(),
            signal_id: params.signal_id,
            entity: params.entity,
            attempts: params.attempts,
            trailing: params.trailing,
            delivered: params.delivered,
            acknowledged: params.acknowledged,
            error: params.error,
        }
    }
}

/// Audit record for a periodic sweep.
#[derive(Debug, Clone, Serialize)]
pub struct SweepAuditEvent {
    /// Event identifier.
    pub event: &'static str,
    /// Event timestamp (milliseconds since epoch).
    pub timestamp_ms: u64,
    /// Watched entities inspected.
    pub scanned: usize,
    /// Signals re-enqueued.
    pub enqueued: usize,
    /// Storage error that cut the sweep short, if any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl SweepAuditEvent {
    /// Creates a sweep event stamped with the current time.
    #[must_use]
    pub fn new(scanned: usize, enqueued: usize, error: Option<String>) -> Self {
        Self {
            event: "dispatch_sweep",
            timestamp_ms: unix_millis(),
            scanned,
            enqueued,
            error,
        }
    }
}

/// Audit record for dispatcher start and stop transitions.
#[derive(Debug, Clone, Serialize)]
pub struct LifecycleAuditEvent {
    /// Event identifier.
    pub event: &'static str,
    /// Event timestamp (milliseconds since epoch).
    pub timestamp_ms: u64,
    /// Lifecycle phase label (`started`, `stopped`, `aborted`, `dequeue_failed`).
    pub phase: &'static str,
    /// Optional detail.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}

impl LifecycleAuditEvent {
    /// Creates a lifecycle event stamped with the current time.
    #[must_use]
    pub fn new(phase: &'static str, detail: Option<String>) -> Self {
        Self {
            event: "dispatcher_lifecycle",
            timestamp_ms: unix_millis(),
            phase,
            detail,
        }
    }
}

// ============================================================================
// SECTION: Trait
// ============================================================================

/// Audit sink for Ledgerline events.
///
/// Every method defaults to a no-op so sinks may record a subset.
pub trait AuditSink: Send + Sync {
    /// Record an ingest event.
    fn record_ingest(&self, _event: &IngestAuditEvent) {}

    /// Record a watch registration change.
    fn record_watch(&self, _event: &WatchAuditEvent) {}

    /// Record a delivery attempt.
    fn record_delivery(&self, _event: &DeliveryAuditEvent) {}

    /// Record a dispatch cycle summary.
    fn record_cycle(&self, _event: &DispatchCycleEvent) {}

    /// Record a sweep summary.
    fn record_sweep(&self, _event: &SweepAuditEvent) {}

    /// Record a dispatcher lifecycle transition.
    fn record_lifecycle(&self, _event: &LifecycleAuditEvent) {}
}

// ============================================================================
// SECTION: Sinks
// ============================================================================

/// Serializes an event and writes it as one line.
fn write_line<W: Write, T: Serialize>(writer: &mut W, event: &T) {
    if let Ok(payload) = serde_json::to_string(event) {
        let _ = writeln!(writer, "{payload}");
        let _ = writer.flush();
    }
}

/// Audit sink that logs JSON lines to stderr.
pub struct StderrAuditSink;

impl AuditSink for StderrAuditSink {
    fn record_ingest(&self, event: &IngestAuditEvent) {
        write_line(&mut io::stderr(), event);
    }

    fn record_watch(&self, event: &WatchAuditEvent) {
        write_line(&mut io::stderr(), event);
    }

    fn record_delivery(&self, event: &DeliveryAuditEvent) {
        write_line(&mut io::stderr(), event);
    }

    fn record_cycle(&self, event: &DispatchCycleEvent) {
        write_line(&mut io::stderr(), event);
    }

    fn record_sweep(&self, event: &SweepAuditEvent) {
        write_line(&mut io::stderr(), event);
    }

    fn record_lifecycle(&self, event: &LifecycleAuditEvent) {
        write_line(&mut io::stderr(), event);
    }
}

/// Audit sink that appends JSON lines to a file.
pub struct FileAuditSink {
    /// File handle used for append-only logging.
    file: Mutex<std::fs::File>,
}

impl FileAuditSink {
    /// Opens the audit log file in append mode.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be opened.
    pub fn new(path: &Path) -> io::Result<Self> {
        let file = OpenOptions::new().create(true).append(true).open(path)?;
        Ok(Self {
            file: Mutex::new(file),
        })
    }

    /// Writes one event under the file lock.
    fn append<T: Serialize>(&self, event: &T) {
        if let Ok(mut file) = self.file.lock() {
            write_line(&mut *file, event);
        }
    }
}

impl AuditSink for FileAuditSink {
    fn record_ingest(&self, event: &IngestAuditEvent) {
        self.append(event);
    }

    fn record_watch(&self, event: &WatchAuditEvent) {
        self.append(event);
    }

    fn record_delivery(&self, event: &DeliveryAuditEvent) {
        self.append(event);
    }

    fn record_cycle(&self, event: &DispatchCycleEvent) {
        self.append(event);
    }

    fn record_sweep(&self, event: &SweepAuditEvent) {
        self.append(event);
    }

    fn record_lifecycle(&self, event: &LifecycleAuditEvent) {
        self.append(event);
    }
}

/// No-op audit sink.
pub struct NoopAuditSink;

impl AuditSink for NoopAuditSink {}
