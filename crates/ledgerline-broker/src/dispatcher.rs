// ledgerline-broker/src/dispatcher.rs
// ============================================================================
// Module: Ledgerline Notification Dispatcher
// Description: Queue-draining loop that fans change notices out to watchers.
// Purpose: Bring every trailing watcher up to the latest entity version.
// Dependencies: ledgerline-core, tokio
// ============================================================================

//! ## Overview
//! Each cycle leases one change signal, asks the [`Reconciler`] which watches
//! trail the entity, and runs one delivery attempt per trailing watch in a
//! [`JoinSet`]. Every attempt is bounded by the delivery timeout. A successful
//! attempt advances that watcher's cursor; a failed one leaves it unchanged.
//! The signal is acknowledged only after every attempt has joined.
//!
//! Storage failures abort the cycle without acknowledging, so the leased
//! signal becomes visible again once its lease expires. A failed cycle is
//! audited and the loop keeps running.
//!
//! Storage interfaces are synchronous; the dispatcher calls them through
//! `spawn_blocking` so the runtime workers never block on I/O.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::sync::Arc;
use std::time::Duration;

use ledgerline_core::AuditSink;
use ledgerline_core::Backend;
use ledgerline_core::ChangeSignal;
use ledgerline_core::DeliveryAuditEvent;
use ledgerline_core::DeliveryOutcome;
use ledgerline_core::DispatchCycleEvent;
use ledgerline_core::DispatchCycleParams;
use ledgerline_core::EntityId;
use ledgerline_core::LifecycleAuditEvent;
use ledgerline_core::NoopAuditSink;
use ledgerline_core::Reconciler;
use ledgerline_core::SignalId;
use ledgerline_core::SignalLease;
use ledgerline_core::StoreError;
use ledgerline_core::SweepAuditEvent;
use thiserror::Error;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::task::JoinSet;
use tokio::time::Instant;

use crate::notifier::Delivery;
use crate::notifier::Notifier;

// ============================================================================
// SECTION: Configuration
// ============================================================================

/// Default bound on a single delivery attempt.
const DEFAULT_DELIVERY_TIMEOUT: Duration = Duration::from_secs(5);
/// Default visibility lease for a dequeued signal.
const DEFAULT_SIGNAL_LEASE: Duration = Duration::from_secs(30);
/// Default idle wait between empty polls.
const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(250);
/// Default time an in-flight cycle may run after shutdown is requested.
const DEFAULT_SHUTDOWN_GRACE: Duration = Duration::from_secs(7);
/// Default interval between trailing-watch sweeps.
const DEFAULT_SWEEP_INTERVAL: Duration = Duration::from_secs(30);

/// Dispatcher timing configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DispatcherConfig {
    /// Upper bound on one delivery attempt.
    pub delivery_timeout: Duration,
    /// Lease applied to each dequeued signal.
    pub signal_lease: Duration,
    /// Wait between polls when the queue is empty.
    pub poll_interval: Duration,
    /// Grace period for the in-flight cycle at shutdown.
    pub shutdown_grace: Duration,
    /// Interval between sweeps; `None` disables sweeping.
    pub sweep_interval: Option<Duration>,
}

impl Default for DispatcherConfig {
    fn default() -> Self {
        Self {
            delivery_timeout: DEFAULT_DELIVERY_TIMEOUT,
            signal_lease: DEFAULT_SIGNAL_LEASE,
            poll_interval: DEFAULT_POLL_INTERVAL,
            shutdown_grace: DEFAULT_SHUTDOWN_GRACE,
            sweep_interval: Some(DEFAULT_SWEEP_INTERVAL),
        }
    }
}

// ============================================================================
// SECTION: Errors and Reports
// ============================================================================

/// Errors that abort a dispatch cycle or sweep.
#[derive(Debug, Error)]
pub enum DispatchError {
    /// Storage backend failed; the signal stays leased for redelivery.
    #[error("dispatch storage error: {0}")]
    Storage(String),
    /// Blocking storage task failed to join.
    #[error("dispatch task join failed: {0}")]
    Join(String),
}

impl From<StoreError> for DispatchError {
    fn from(err: StoreError) -> Self {
        Self::Storage(err.to_string())
    }
}

/// Summary of one completed, acknowledged cycle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CycleReport {
    /// Acknowledged signal.
    pub signal_id: SignalId,
    /// Entity the signal referred to.
    pub entity: EntityId,
    /// Number of times the signal had been leased, including this one.
    pub attempts: u32,
    /// Trailing watches found by the reconciler.
    pub trailing: usize,
    /// Deliveries that succeeded and advanced a cursor.
    pub delivered: usize,
    /// Deliveries that failed or timed out.
    pub failed: usize,
}

/// Summary of one sweep.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SweepReport {
    /// Watched entities inspected.
    pub scanned: usize,
    /// Signals enqueued for entities with trailing watches.
    pub enqueued: usize,
}

/// Result of one delivery task.
struct Attempt {
    /// Delivery that was attempted.
    delivery: Delivery,
    /// Outcome classification.
    outcome: DeliveryOutcome,
    /// Failure detail.
    error: Option<String>,
    /// Wall time spent in the attempt.
    elapsed_ms: u64,
}

// ============================================================================
// SECTION: Dispatcher
// ============================================================================

/// Drains the change-signal queue and notifies trailing watchers.
#[derive(Clone)]
pub struct NotificationDispatcher {
    /// Storage backend.
    backend: Backend,
    /// Trailing-watch computation.
    reconciler: Reconciler,
    /// Delivery transport.
    notifier: Arc<dyn Notifier>,
    /// Audit sink for delivery and lifecycle events.
    audit: Arc<dyn AuditSink>,
    /// Timing configuration.
    config: DispatcherConfig,
}

impl NotificationDispatcher {
    /// Creates a dispatcher with a no-op audit sink.
    #[must_use]
    pub fn new(backend: Backend, notifier: Arc<dyn Notifier>, config: DispatcherConfig) -> Self {
        let reconciler = Reconciler::new(backend.clone());
        Self {
            backend,
            reconciler,
            notifier,
            audit: Arc::new(NoopAuditSink),
            config,
        }
    }

    /// Replaces the audit sink.
    #[must_use]
    pub fn with_audit(mut self, audit: Arc<dyn AuditSink>) -> Self {
        self.audit = audit;
        self
    }

    /// Returns the timing configuration.
    #[must_use]
    pub const fn config(&self) -> &DispatcherConfig {
        &self.config
    }

    /// Runs one cycle. Returns `None` when no signal was visible.
    ///
    /// # Errors
    ///
    /// Returns [`DispatchError`] when storage fails mid-cycle. The signal is
    /// not acknowledged in that case. A failed dequeue is audited as the
    /// `dequeue_failed` lifecycle phase.
    pub async fn run_cycle(&self) -> Result<Option<CycleReport>, DispatchError> {
        let signals = self.backend.signals.clone();
        let lease_duration = self.config.signal_lease;
        let lease = match run_blocking(move || signals.dequeue(lease_duration)).await {
            Ok(Some(lease)) => lease,
            Ok(None) => return Ok(None),
            Err(err) => {
                self.audit.record_lifecycle(&LifecycleAuditEvent::new(
                    "dequeue_failed",
                    Some(err.to_string()),
                ));
                return Err(err);
            }
        };
        let mut params = DispatchCycleParams {
            signal_id: lease.id.get(),
            entity: lease.signal.entity.clone(),
            attempts: lease.attempts,
            trailing: 0,
            delivered: 0,
            acknowledged: false,
            error: None,
        };
        match self.process_lease(&lease, &mut params).await {
            Ok(report) => {
                params.acknowledged = true;
                self.audit.record_cycle(&DispatchCycleEvent::new(params));
                Ok(Some(report))
            }
            Err(err) => {
                params.error = Some(err.to_string());
                self.audit.record_cycle(&DispatchCycleEvent::new(params));
                Err(err)
            }
        }
    }

    /// Reconciles, delivers, advances, and acknowledges one leased signal.
    async fn process_lease(
        &self,
        lease: &SignalLease,
        params: &mut DispatchCycleParams,
    ) -> Result<CycleReport, DispatchError> {
        let entity = lease.signal.entity.clone();
        let reconciler = self.reconciler.clone();
        let lookup = entity.clone();
        let trailing = run_blocking(move || reconciler.trailing(&lookup)).await?;
        params.trailing = trailing.len();

        let mut deliveries = JoinSet::new();
        for watch in trailing {
            let delivery = Delivery {
                entity: entity.clone(),
                url: watch.url,
                version: watch.version,
            };
            deliveries.spawn(deliver_once(
                Arc::clone(&self.notifier),
                delivery,
                self.config.delivery_timeout,
            ));
        }

        let mut delivered = 0;
        let mut failed = 0;
        let mut storage_error = None;
        while let Some(joined) = deliveries.join_next().await {
            let attempt = match joined {
                Ok(attempt) => attempt,
                Err(err) => {
                    failed += 1;
                    if storage_error.is_none() {
                        storage_error = Some(DispatchError::Join(err.to_string()));
                    }
                    continue;
                }
            };
            self.audit.record_delivery(&DeliveryAuditEvent::new(
                attempt.delivery.entity.clone(),
                attempt.delivery.url.clone(),
                attempt.delivery.version,
                attempt.outcome,
                attempt.error,
                attempt.elapsed_ms,
            ));
            if attempt.outcome != DeliveryOutcome::Delivered {
                failed += 1;
                continue;
            }
            delivered += 1;
            let watches = self.backend.watches.clone();
            let Delivery {
                entity,
                url,
                version,
            } = attempt.delivery;
            let advanced = run_blocking(move || watches.advance(&entity, &url, version)).await;
            if let Err(err) = advanced
                && storage_error.is_none()
            {
                storage_error = Some(err);
            }
        }
        params.delivered = delivered;
        if let Some(err) = storage_error {
            return Err(err);
        }

        let signals = self.backend.signals.clone();
        let signal_id = lease.id;
        run_blocking(move || signals.ack(signal_id)).await?;
        Ok(CycleReport {
            signal_id: lease.id,
            entity,
            attempts: lease.attempts,
            trailing: params.trailing,
            delivered,
            failed,
        })
    }

    /// Enqueues a signal for every watched entity that still has trailing
    /// watches, so watchers of entities that stopped changing are retried.
    ///
    /// # Errors
    ///
    /// Returns [`DispatchError`] when storage fails.
    pub async fn sweep(&self) -> Result<SweepReport, DispatchError> {
        let backend = self.backend.clone();
        let reconciler = self.reconciler.clone();
        let result = run_blocking(move || {
            let entities = backend.watches.watched_entities()?;
            let mut enqueued = 0;
            for entity in &entities {
                if reconciler.trailing(entity)?.is_empty() {
                    continue;
                }
                backend.signals.enqueue(&ChangeSignal::new(entity.clone(), None))?;
                enqueued += 1;
            }
            Ok(SweepReport {
                scanned: entities.len(),
                enqueued,
            })
        })
        .await;
        let event = match &result {
            Ok(report) => SweepAuditEvent::new(report.scanned, report.enqueued, None),
            Err(err) => SweepAuditEvent::new(0, 0, Some(err.to_string())),
        };
        self.audit.record_sweep(&event);
        result
    }

    /// Starts the dispatch loop on the current tokio runtime.
    #[must_use]
    pub fn spawn(self) -> DispatcherHandle {
        let (stop_tx, stop_rx) = watch::channel(false);
        let audit = Arc::clone(&self.audit);
        let grace = self.config.shutdown_grace;
        let task = tokio::spawn(self.run(stop_rx));
        DispatcherHandle {
            stop: stop_tx,
            task,
            grace,
            audit,
        }
    }

    /// Dispatch loop body. Exits when stop is requested or the handle drops.
    async fn run(self, mut stop: watch::Receiver<bool>) {
        self.audit.record_lifecycle(&LifecycleAuditEvent::new("started", None));
        let mut next_sweep = self.config.sweep_interval.map(|interval| Instant::now() + interval);
        loop {
            if *stop.borrow() {
                break;
            }
            if next_sweep.is_some_and(|due| Instant::now() >= due) {
                let _ = self.sweep().await;
                next_sweep = self.config.sweep_interval.map(|interval| Instant::now() + interval);
            }
            let busy = matches!(self.run_cycle().await, Ok(Some(_)));
            if busy {
                continue;
            }
            tokio::select! {
                changed = stop.changed() => {
                    if changed.is_err() {
                        break;
                    }
                }
                () = tokio::time::sleep(self.config.poll_interval) => {}
            }
        }
        self.audit.record_lifecycle(&LifecycleAuditEvent::new("stopped", None));
    }
}

// ============================================================================
// SECTION: Handle
// ============================================================================

/// Running dispatcher loop.
///
/// Dropping the handle without calling [`DispatcherHandle::shutdown`] stops
/// the loop after its current cycle.
pub struct DispatcherHandle {
    /// Stop flag observed by the loop.
    stop: watch::Sender<bool>,
    /// Loop task.
    task: JoinHandle<()>,
    /// Time allowed for the in-flight cycle after stop.
    grace: Duration,
    /// Audit sink for lifecycle events.
    audit: Arc<dyn AuditSink>,
}

impl DispatcherHandle {
    /// Stops dequeuing and waits for the in-flight cycle up to the grace
    /// period, then aborts it. An aborted cycle leaves its signal leased, so
    /// it is redelivered after the lease expires.
    pub async fn shutdown(mut self) {
        let _ = self.stop.send(true);
        if tokio::time::timeout(self.grace, &mut self.task).await.is_ok() {
            return;
        }
        self.task.abort();
        let _ = (&mut self.task).await;
        self.audit.record_lifecycle(&LifecycleAuditEvent::new(
            "aborted",
            Some(format!("in-flight cycle exceeded {} ms grace", self.grace.as_millis())),
        ));
    }

    /// Returns true once the loop task has exited.
    #[must_use]
    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }
}

// ============================================================================
// SECTION: Helpers
// ============================================================================

/// Runs one bounded delivery attempt.
async fn deliver_once(notifier: Arc<dyn Notifier>, delivery: Delivery, timeout: Duration) -> Attempt {
    let started = Instant::now();
    let result = tokio::time::timeout(timeout, notifier.notify(&delivery)).await;
    let elapsed_ms = u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX);
    let (outcome, error) = match result {
        Ok(Ok(())) => (DeliveryOutcome::Delivered, None),
        Ok(Err(err)) => (DeliveryOutcome::Failed, Some(err.to_string())),
        Err(_) => {
            (DeliveryOutcome::TimedOut, Some(format!("timed out after {} ms", timeout.as_millis())))
        }
    };
    Attempt {
        delivery,
        outcome,
        error,
        elapsed_ms,
    }
}

/// Runs a synchronous storage call on the blocking pool.
async fn run_blocking<T, F>(op: F) -> Result<T, DispatchError>
where
    F: FnOnce() -> Result<T, StoreError> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(op)
        .await
        .map_err(|err| DispatchError::Join(err.to_string()))?
        .map_err(DispatchError::from)
}
