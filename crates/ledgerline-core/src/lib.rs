// ledgerline-core/src/lib.rs
// ============================================================================
// Module: Ledgerline Core Library
// Description: Public API surface for the Ledgerline core.
// Purpose: Expose core types, storage interfaces, and runtime services.
// Dependencies: crate::{core, interfaces, runtime}
// ============================================================================

//! ## Overview
//! Ledgerline core provides content-addressed payload storage, an append-only
//! per-entity version ledger, a watch registry with monotonic cursors, and the
//! reconciler that decides which watchers trail an entity. It is
//! backend-agnostic and integrates through explicit interfaces; concrete
//! storage engines and delivery transports live in sibling crates.

// ============================================================================
// SECTION: Modules
// ============================================================================

pub mod audit;
pub mod core;
pub mod interfaces;
pub mod runtime;

// ============================================================================
// SECTION: Re-Exports
// ============================================================================

pub use crate::core::*;

pub use audit::AuditSink;
pub use audit::DeliveryAuditEvent;
pub use audit::DeliveryOutcome;
pub use audit::DispatchCycleEvent;
pub use audit::DispatchCycleParams;
pub use audit::FileAuditSink;
pub use audit::IngestAuditEvent;
pub use audit::LifecycleAuditEvent;
pub use audit::NoopAuditSink;
pub use audit::StderrAuditSink;
pub use audit::SweepAuditEvent;
pub use audit::WatchAction;
pub use audit::WatchAuditEvent;
pub use interfaces::AppendPlan;
pub use interfaces::ContentStore;
pub use interfaces::SignalQueue;
pub use interfaces::StoreError;
pub use interfaces::VersionLedger;
pub use interfaces::WatchRegistry;
pub use interfaces::plan_append;
pub use runtime::Backend;
pub use runtime::DEFAULT_HISTORY_LIMIT;
pub use runtime::InMemoryBackend;
pub use runtime::IngestService;
pub use runtime::IngestServiceConfig;
pub use runtime::MAX_HISTORY_LIMIT;
pub use runtime::ReadResult;
pub use runtime::Reconciler;
pub use runtime::ServiceError;
pub use runtime::StoreReceipt;
pub use runtime::TrailingWatch;
pub use runtime::WatchRequest;
