// ledgerline-config/src/examples.rs
// ============================================================================
// Module: Config Examples
// Description: Canonical example configuration payload.
// Purpose: Deterministic example for docs and the CLI.
// Dependencies: std
// ============================================================================

//! ## Overview
//! Canonical example `ledgerline.toml`. It spells out every default so
//! operators can see the full surface in one place.

/// Returns a canonical example `ledgerline.toml` configuration.
#[must_use]
pub fn config_toml_example() -> String {
    String::from(
        r#"[server]
bind = "127.0.0.1:8080"
max_body_bytes = 10485760

[storage]
backend = "sqlite"
path = "ledgerline.db"
busy_timeout_ms = 5000
journal_mode = "wal"
sync_mode = "full"

[ledger]
version_strategy = "sequence"
default_history_limit = 100
max_history_limit = 1000

[dispatch]
enabled = true
transport = "webhook"
delivery_timeout_ms = 5000
signal_lease_ms = 30000
poll_interval_ms = 250
shutdown_grace_ms = 7000
sweep_interval_ms = 30000

[audit]
sink = "stderr"
# sink = "file"
# path = "ledgerline-audit.log"
"#,
    )
}
