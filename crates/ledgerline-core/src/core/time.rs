// ledgerline-core/src/core/time.rs
// ============================================================================
// Module: Ledgerline Time
// Description: Wall-clock helpers.
// Purpose: Provide the millisecond timestamps used by ledgers, queues, and audit.
// Dependencies: std
// ============================================================================

//! ## Overview
//! Timestamps are Unix epoch milliseconds. A clock before the epoch reads as
//! zero rather than failing.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::time::SystemTime;
use std::time::UNIX_EPOCH;

// ============================================================================
// SECTION: Clock
// ============================================================================

/// Returns the current Unix timestamp in milliseconds.
#[must_use]
pub fn unix_millis() -> u64 {
    let now = SystemTime::now().duration_since(UNIX_EPOCH).unwrap_or_default();
    u64::try_from(now.as_millis()).unwrap_or(u64::MAX)
}
