// ledgerline-broker/tests/dispatcher.rs
// ============================================================================
// Module: Notification Dispatcher Tests
// Description: Cycle, sweep, and lifecycle behavior of the dispatcher.
// Purpose: Validate cursor advancement, acknowledgement, and shutdown.
// Dependencies: ledgerline-broker, ledgerline-core, tokio
// ============================================================================

//! ## Overview
//! Drives [`ledgerline_broker::NotificationDispatcher`] over the in-memory
//! backend with channel, callback, and deliberately slow notifiers.

#![allow(
    clippy::panic,
    clippy::print_stdout,
    clippy::print_stderr,
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::use_debug,
    clippy::dbg_macro,
    clippy::panic_in_result_fn,
    clippy::unwrap_in_result,
    reason = "Test-only output and panic-based assertions are permitted."
)]

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::sync::Arc;
use std::sync::Mutex;
use std::sync::atomic::AtomicBool;
use std::sync::atomic::Ordering;
use std::time::Duration;

use async_trait::async_trait;
use ledgerline_broker::CallbackNotifier;
use ledgerline_broker::ChannelNotifier;
use ledgerline_broker::Delivery;
use ledgerline_broker::DispatchError;
use ledgerline_broker::DispatcherConfig;
use ledgerline_broker::NotificationDispatcher;
use ledgerline_broker::Notifier;
use ledgerline_broker::SinkError;
use ledgerline_core::AuditSink;
use ledgerline_core::Backend;
use ledgerline_core::ChangeSignal;
use ledgerline_core::DeliveryAuditEvent;
use ledgerline_core::DeliveryOutcome;
use ledgerline_core::DispatchCycleEvent;
use ledgerline_core::EntityId;
use ledgerline_core::IngestService;
use ledgerline_core::IngestServiceConfig;
use ledgerline_core::InMemoryBackend;
use ledgerline_core::LifecycleAuditEvent;
use ledgerline_core::SignalId;
use ledgerline_core::SignalLease;
use ledgerline_core::SignalQueue;
use ledgerline_core::StoreError;
use ledgerline_core::SweepAuditEvent;
use ledgerline_core::Version;
use ledgerline_core::WatchRecord;
use ledgerline_core::WatchRegistry;
use ledgerline_core::WatcherUrl;
use serde_json::json;
use tokio::sync::Notify;
use tokio::sync::mpsc;

// ============================================================================
// SECTION: Fixtures
// ============================================================================

const HOOK_A: &str = "http://watcher-a.local/hook";
const HOOK_B: &str = "http://watcher-b.local/hook";

#[derive(Default)]
struct RecordingAudit {
    deliveries: Mutex<Vec<DeliveryAuditEvent>>,
    cycles: Mutex<Vec<DispatchCycleEvent>>,
    sweeps: Mutex<Vec<SweepAuditEvent>>,
    lifecycle: Mutex<Vec<LifecycleAuditEvent>>,
}

impl RecordingAudit {
    fn phases(&self) -> Vec<&'static str> {
        self.lifecycle.lock().unwrap().iter().map(|event| event.phase).collect()
    }
}

impl AuditSink for RecordingAudit {
    fn record_delivery(&self, event: &DeliveryAuditEvent) {
        self.deliveries.lock().unwrap().push(event.clone());
    }

    fn record_cycle(&self, event: &DispatchCycleEvent) {
        self.cycles.lock().unwrap().push(event.clone());
    }

    fn record_sweep(&self, event: &SweepAuditEvent) {
        self.sweeps.lock().unwrap().push(event.clone());
    }

    fn record_lifecycle(&self, event: &LifecycleAuditEvent) {
        self.lifecycle.lock().unwrap().push(event.clone());
    }
}

struct Fixture {
    memory: InMemoryBackend,
    service: IngestService,
    audit: Arc<RecordingAudit>,
}

fn fixture() -> Fixture {
    let memory = InMemoryBackend::new();
    let service =
        IngestService::new(Backend::from_store(memory.clone()), IngestServiceConfig::default());
    Fixture {
        memory,
        service,
        audit: Arc::new(RecordingAudit::default()),
    }
}

impl Fixture {
    fn dispatcher(&self, notifier: Arc<dyn Notifier>, config: DispatcherConfig) -> NotificationDispatcher {
        NotificationDispatcher::new(Backend::from_store(self.memory.clone()), notifier, config)
            .with_audit(self.audit.clone())
    }

    fn cursor(&self, entity: &str, url: &str) -> Version {
        self.memory.cursor(&EntityId::new(entity), &WatcherUrl::new(url)).unwrap()
    }
}

/// Callback notifier that fails while `failing` is set.
fn toggled_notifier(failing: Arc<AtomicBool>) -> Arc<dyn Notifier> {
    Arc::new(CallbackNotifier::new(move |_| {
        if failing.load(Ordering::SeqCst) {
            Err(SinkError::DeliveryFailed("watcher unavailable".to_string()))
        } else {
            Ok(())
        }
    }))
}

/// Notifier that never completes and signals when it has been entered.
struct HangingNotifier {
    entered: Arc<Notify>,
}

#[async_trait]
impl Notifier for HangingNotifier {
    async fn notify(&self, _delivery: &Delivery) -> Result<(), SinkError> {
        self.entered.notify_one();
        tokio::time::sleep(Duration::from_secs(3600)).await;
        Ok(())
    }
}

/// Registry wrapper whose cursor updates always fail.
struct BrokenAdvance {
    inner: InMemoryBackend,
}

impl WatchRegistry for BrokenAdvance {
    fn add(&self, entity: &EntityId, url: &WatcherUrl) -> Result<(), StoreError> {
        self.inner.add(entity, url)
    }

    fn remove(&self, entity: &EntityId, url: &WatcherUrl) -> Result<(), StoreError> {
        self.inner.remove(entity, url)
    }

    fn cursor(&self, entity: &EntityId, url: &WatcherUrl) -> Result<Version, StoreError> {
        self.inner.cursor(entity, url)
    }

    fn advance(
        &self,
        _entity: &EntityId,
        _url: &WatcherUrl,
        _version: Version,
    ) -> Result<bool, StoreError> {
        Err(StoreError::Io("registry offline".to_string()))
    }

    fn watchers(&self, entity: &EntityId) -> Result<Vec<WatchRecord>, StoreError> {
        self.inner.watchers(entity)
    }

    fn watched_entities(&self) -> Result<Vec<EntityId>, StoreError> {
        self.inner.watched_entities()
    }
}

/// Signal queue that cannot be read.
struct OfflineQueue;

impl SignalQueue for OfflineQueue {
    fn enqueue(&self, _signal: &ChangeSignal) -> Result<SignalId, StoreError> {
        Err(StoreError::Io("queue offline".to_string()))
    }

    fn dequeue(&self, _lease: Duration) -> Result<Option<SignalLease>, StoreError> {
        Err(StoreError::Io("queue offline".to_string()))
    }

    fn ack(&self, _id: SignalId) -> Result<(), StoreError> {
        Err(StoreError::Io("queue offline".to_string()))
    }

    fn pending(&self) -> Result<usize, StoreError> {
        Err(StoreError::Io("queue offline".to_string()))
    }
}

// ============================================================================
// SECTION: Cycle Tests
// ============================================================================

/// Tests intermediate versions coalesce into one catch-up notice.
#[tokio::test]
async fn catch_up_notice_carries_latest_version() {
    let fx = fixture();
    fx.service.watch("e1", HOOK_A).unwrap();
    for value in 1 ..= 3 {
        fx.service.store_json("e1", &json!({"a": value}), None).unwrap();
    }
    let (tx, mut rx) = mpsc::channel(16);
    let dispatcher = fx.dispatcher(Arc::new(ChannelNotifier::new(tx)), DispatcherConfig::default());

    let first = dispatcher.run_cycle().await.unwrap().unwrap();
    assert_eq!(first.trailing, 1);
    assert_eq!(first.delivered, 1);
    for _ in 0 .. 2 {
        let report = dispatcher.run_cycle().await.unwrap().unwrap();
        assert_eq!(report.trailing, 0);
    }
    assert!(dispatcher.run_cycle().await.unwrap().is_none());

    let delivery = rx.try_recv().unwrap();
    assert_eq!(delivery.entity, EntityId::new("e1"));
    assert_eq!(delivery.version, Version::new(3));
    assert_eq!(delivery.notice().entity, EntityId::new("e1"));
    assert!(rx.try_recv().is_err());
    assert_eq!(fx.cursor("e1", HOOK_A), Version::new(3));
    assert_eq!(fx.memory.pending().unwrap(), 0);
}

/// Tests a failing watcher keeps its cursor until a later delivery succeeds.
#[tokio::test]
async fn failing_watcher_catches_up_after_recovery() {
    let fx = fixture();
    fx.service.watch("e1", HOOK_A).unwrap();
    let failing = Arc::new(AtomicBool::new(true));
    let dispatcher = fx.dispatcher(toggled_notifier(failing.clone()), DispatcherConfig::default());

    for value in 1 ..= 4 {
        fx.service.store_json("e1", &json!({"n": value}), None).unwrap();
        let report = dispatcher.run_cycle().await.unwrap().unwrap();
        assert_eq!(report.failed, 1);
    }
    assert_eq!(fx.cursor("e1", HOOK_A), Version::ZERO);
    assert_eq!(fx.memory.pending().unwrap(), 0);

    failing.store(false, Ordering::SeqCst);
    let receipt = fx.service.store_json("e1", &json!({"n": 5}), None).unwrap();
    let report = dispatcher.run_cycle().await.unwrap().unwrap();
    assert_eq!(report.delivered, 1);
    assert_eq!(fx.cursor("e1", HOOK_A), receipt.version);

    let outcomes: Vec<DeliveryOutcome> =
        fx.audit.deliveries.lock().unwrap().iter().map(|event| event.outcome).collect();
    assert_eq!(outcomes.iter().filter(|outcome| **outcome == DeliveryOutcome::Failed).count(), 4);
    assert_eq!(outcomes.last(), Some(&DeliveryOutcome::Delivered));
}

/// Tests one failing watcher does not hold back another.
#[tokio::test]
async fn watchers_advance_independently() {
    let fx = fixture();
    fx.service.watch("e1", HOOK_A).unwrap();
    fx.service.watch("e1", HOOK_B).unwrap();
    let notifier: Arc<dyn Notifier> = Arc::new(CallbackNotifier::new(|delivery| {
        if delivery.url.as_str() == HOOK_B {
            Err(SinkError::DeliveryFailed("http status 500".to_string()))
        } else {
            Ok(())
        }
    }));
    let dispatcher = fx.dispatcher(notifier, DispatcherConfig::default());
    fx.service.store_json("e1", &json!({"a": 1}), None).unwrap();

    let report = dispatcher.run_cycle().await.unwrap().unwrap();
    assert_eq!(report.trailing, 2);
    assert_eq!(report.delivered, 1);
    assert_eq!(report.failed, 1);
    assert_eq!(fx.cursor("e1", HOOK_A), Version::new(1));
    assert_eq!(fx.cursor("e1", HOOK_B), Version::ZERO);
}

/// Tests a slow watcher is cut off by the delivery timeout.
#[tokio::test]
async fn slow_watcher_times_out() {
    let fx = fixture();
    fx.service.watch("e1", HOOK_A).unwrap();
    fx.service.store_json("e1", &json!({"a": 1}), None).unwrap();
    let notifier = Arc::new(HangingNotifier {
        entered: Arc::new(Notify::new()),
    });
    let config = DispatcherConfig {
        delivery_timeout: Duration::from_millis(50),
        ..DispatcherConfig::default()
    };
    let dispatcher = fx.dispatcher(notifier, config);

    let report = dispatcher.run_cycle().await.unwrap().unwrap();
    assert_eq!(report.failed, 1);
    assert_eq!(fx.cursor("e1", HOOK_A), Version::ZERO);
    let deliveries = fx.audit.deliveries.lock().unwrap();
    assert_eq!(deliveries.len(), 1);
    assert_eq!(deliveries[0].outcome, DeliveryOutcome::TimedOut);
}

/// Tests a storage failure leaves the signal unacknowledged for redelivery.
#[tokio::test]
async fn storage_failure_skips_acknowledgement() {
    let fx = fixture();
    fx.service.watch("e1", HOOK_A).unwrap();
    fx.service.store_json("e1", &json!({"a": 1}), None).unwrap();
    let backend = Backend::from_parts(
        Arc::new(fx.memory.clone()),
        Arc::new(fx.memory.clone()),
        Arc::new(BrokenAdvance {
            inner: fx.memory.clone(),
        }),
    );
    let config = DispatcherConfig {
        signal_lease: Duration::from_millis(20),
        ..DispatcherConfig::default()
    };
    let notifier: Arc<dyn Notifier> = Arc::new(CallbackNotifier::new(|_| Ok(())));
    let dispatcher = NotificationDispatcher::new(backend, notifier, config).with_audit(fx.audit.clone());

    let err = dispatcher.run_cycle().await.unwrap_err();
    assert!(matches!(err, DispatchError::Storage(_)));
    assert_eq!(fx.memory.pending().unwrap(), 1);
    {
        let cycles = fx.audit.cycles.lock().unwrap();
        assert_eq!(cycles.len(), 1);
        assert!(!cycles[0].acknowledged);
        assert!(cycles[0].error.is_some());
    }

    tokio::time::sleep(Duration::from_millis(40)).await;
    assert!(dispatcher.run_cycle().await.is_err());
    assert_eq!(fx.audit.cycles.lock().unwrap()[1].attempts, 2);
}

/// Tests a queue outage on dequeue is audited and surfaced.
#[tokio::test]
async fn dequeue_failure_is_audited() {
    let fx = fixture();
    let backend = Backend {
        signals: Arc::new(OfflineQueue),
        ..Backend::from_store(fx.memory.clone())
    };
    let notifier: Arc<dyn Notifier> = Arc::new(CallbackNotifier::new(|_| Ok(())));
    let dispatcher = NotificationDispatcher::new(backend, notifier, DispatcherConfig::default())
        .with_audit(fx.audit.clone());

    let err = dispatcher.run_cycle().await.unwrap_err();
    assert!(matches!(err, DispatchError::Storage(_)));
    assert_eq!(fx.audit.phases(), vec!["dequeue_failed"]);
    let lifecycle = fx.audit.lifecycle.lock().unwrap();
    assert!(lifecycle[0].detail.as_deref().unwrap().contains("queue offline"));
    assert!(fx.audit.cycles.lock().unwrap().is_empty());
}

// ============================================================================
// SECTION: Sweep Tests
// ============================================================================

/// Tests the sweep re-enqueues only entities with trailing watches.
#[tokio::test]
async fn sweep_requeues_trailing_entities() {
    let fx = fixture();
    fx.service.watch("quiet", HOOK_A).unwrap();
    fx.service.watch("caught-up", HOOK_A).unwrap();
    fx.service.store_json("quiet", &json!({"a": 1}), None).unwrap();
    let failing = Arc::new(AtomicBool::new(true));
    let dispatcher = fx.dispatcher(toggled_notifier(failing.clone()), DispatcherConfig::default());
    dispatcher.run_cycle().await.unwrap().unwrap();
    assert_eq!(fx.memory.pending().unwrap(), 0);

    let report = dispatcher.sweep().await.unwrap();
    assert_eq!(report.scanned, 2);
    assert_eq!(report.enqueued, 1);
    assert_eq!(fx.memory.pending().unwrap(), 1);

    failing.store(false, Ordering::SeqCst);
    let cycle = dispatcher.run_cycle().await.unwrap().unwrap();
    assert_eq!(cycle.entity, EntityId::new("quiet"));
    assert_eq!(fx.cursor("quiet", HOOK_A), Version::new(1));
    assert_eq!(dispatcher.sweep().await.unwrap().enqueued, 0);
    assert_eq!(fx.audit.sweeps.lock().unwrap().len(), 2);
}

// ============================================================================
// SECTION: Lifecycle Tests
// ============================================================================

/// Tests the spawned loop delivers and stops cleanly.
#[tokio::test]
async fn spawned_loop_delivers_and_stops() {
    let fx = fixture();
    fx.service.watch("e1", HOOK_A).unwrap();
    let (tx, mut rx) = mpsc::channel(16);
    let config = DispatcherConfig {
        poll_interval: Duration::from_millis(10),
        sweep_interval: None,
        ..DispatcherConfig::default()
    };
    let handle = fx.dispatcher(Arc::new(ChannelNotifier::new(tx)), config).spawn();
    fx.service.store_json("e1", &json!({"a": 1}), None).unwrap();

    let delivery = tokio::time::timeout(Duration::from_secs(5), rx.recv()).await.unwrap().unwrap();
    assert_eq!(delivery.version, Version::new(1));
    handle.shutdown().await;
    assert_eq!(fx.audit.phases(), vec!["started", "stopped"]);
}

/// Tests shutdown aborts a cycle that outlives the grace period and keeps
/// its signal for redelivery.
#[tokio::test]
async fn shutdown_aborts_stuck_cycle() {
    let fx = fixture();
    fx.service.watch("e1", HOOK_A).unwrap();
    let entered = Arc::new(Notify::new());
    let notifier = Arc::new(HangingNotifier {
        entered: entered.clone(),
    });
    let config = DispatcherConfig {
        delivery_timeout: Duration::from_secs(60),
        signal_lease: Duration::from_secs(120),
        poll_interval: Duration::from_millis(10),
        shutdown_grace: Duration::from_millis(50),
        sweep_interval: None,
    };
    let handle = fx.dispatcher(notifier, config).spawn();
    fx.service.store_json("e1", &json!({"a": 1}), None).unwrap();
    tokio::time::timeout(Duration::from_secs(5), entered.notified()).await.unwrap();

    tokio::time::timeout(Duration::from_secs(5), handle.shutdown()).await.unwrap();
    assert_eq!(fx.audit.phases(), vec!["started", "aborted"]);
    assert_eq!(fx.memory.pending().unwrap(), 1);
    assert_eq!(fx.cursor("e1", HOOK_A), Version::ZERO);
}
