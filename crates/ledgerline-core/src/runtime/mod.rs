// ledgerline-core/src/runtime/mod.rs
// ============================================================================
// Module: Ledgerline Runtime
// Description: Ingest service, reconciler, and backend handles.
// Purpose: Execute Ledgerline operations against pluggable storage.
// Dependencies: crate::{audit, core, interfaces}
// ============================================================================

//! ## Overview
//! Runtime modules implement the synchronous ingest/read path, trailing-watch
//! reconciliation, and the in-memory backend. Every API surface calls into
//! the same service so validation and ordering stay identical.

// ============================================================================
// SECTION: Submodules
// ============================================================================

pub mod memory;
pub mod reconciler;
pub mod service;
pub mod shared;

// ============================================================================
// SECTION: Re-Exports
// ============================================================================

pub use memory::InMemoryBackend;
pub use reconciler::Reconciler;
pub use reconciler::TrailingWatch;
pub use service::DEFAULT_HISTORY_LIMIT;
pub use service::IngestService;
pub use service::IngestServiceConfig;
pub use service::MAX_HISTORY_LIMIT;
pub use service::ReadResult;
pub use service::ServiceError;
pub use service::StoreReceipt;
pub use service::WatchRequest;
pub use shared::Backend;
