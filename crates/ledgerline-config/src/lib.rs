// ledgerline-config/src/lib.rs
// ============================================================================
// Module: Ledgerline Config Library
// Description: Canonical config model, validation, and examples.
// Purpose: Single source of truth for ledgerline.toml semantics.
// Dependencies: ledgerline-core, ledgerline-store-sqlite, serde, toml
// ============================================================================

//! ## Overview
//! `ledgerline-config` defines the configuration model for the Ledgerline
//! service. Every field has a default, so an empty file is valid; anything
//! present is validated strictly and fails closed.

// ============================================================================
// SECTION: Modules
// ============================================================================

pub mod config;
pub mod examples;

// ============================================================================
// SECTION: Re-Exports
// ============================================================================

pub use config::*;
pub use examples::config_toml_example;
