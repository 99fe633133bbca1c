// ledgerline-server/src/lib.rs
// ============================================================================
// Module: Ledgerline Server Library
// Description: HTTP surface and process lifecycle for Ledgerline.
// Purpose: Wire configuration, storage, the ingest service, and the dispatcher.
// Dependencies: ledgerline-core, ledgerline-broker, ledgerline-config, axum, tokio
// ============================================================================

//! ## Overview
//! [`LedgerlineServer`] builds every component from a validated
//! [`ledgerline_config::LedgerlineConfig`], serves the JSON HTTP API, and owns
//! the dispatcher lifecycle. Handlers never wait on watcher delivery.

// ============================================================================
// SECTION: Modules
// ============================================================================

pub mod routes;
pub mod server;

// ============================================================================
// SECTION: Re-Exports
// ============================================================================

pub use routes::router;
pub use server::LedgerlineServer;
pub use server::ServerError;
