// ledgerline-store-sqlite/src/lib.rs
// ============================================================================
// Module: SQLite Ledgerline Store
// Description: Durable Ledgerline backend using SQLite.
// Purpose: Provide production persistence for content, versions, watches, and signals.
// Dependencies: ledgerline-core, rusqlite
// ============================================================================

//! ## Overview
//! This crate provides [`SqliteBackend`], a `SQLite` implementation of every
//! Ledgerline storage interface. All invariants are enforced with
//! transactions and conditional statements inside the database, so several
//! service processes may share one database file.

// ============================================================================
// SECTION: Modules
// ============================================================================

pub mod store;

// ============================================================================
// SECTION: Re-Exports
// ============================================================================

pub use store::SqliteBackend;
pub use store::SqliteStoreConfig;
pub use store::SqliteStoreError;
pub use store::SqliteStoreMode;
pub use store::SqliteSyncMode;
