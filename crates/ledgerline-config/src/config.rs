// ledgerline-config/src/config.rs
// ============================================================================
// Module: Ledgerline Configuration
// Description: Configuration loading and validation for Ledgerline.
// Purpose: Provide strict, fail-closed config parsing with hard limits.
// Dependencies: ledgerline-core, ledgerline-store-sqlite, serde, toml
// ============================================================================

//! ## Overview
//! Configuration is loaded from a TOML file with strict size and path limits.
//! The path comes from the caller, the `LEDGERLINE_CONFIG` environment
//! variable, or `ledgerline.toml` in the working directory, in that order.
//! Invalid configuration fails closed.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::env;
use std::fs;
use std::net::SocketAddr;
use std::path::Path;
use std::path::PathBuf;
use std::time::Duration;

use ledgerline_core::DEFAULT_HASH_ALGORITHM;
use ledgerline_core::DEFAULT_HISTORY_LIMIT;
use ledgerline_core::IngestServiceConfig;
use ledgerline_core::MAX_HISTORY_LIMIT;
use ledgerline_core::VersionStrategy;
use ledgerline_store_sqlite::SqliteStoreConfig;
use ledgerline_store_sqlite::SqliteStoreMode;
use ledgerline_store_sqlite::SqliteSyncMode;
use serde::Deserialize;
use serde::Serialize;
use thiserror::Error;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Default configuration filename when no path is specified.
const DEFAULT_CONFIG_NAME: &str = "ledgerline.toml";
/// Environment variable used to override the config path.
pub const CONFIG_ENV_VAR: &str = "LEDGERLINE_CONFIG";
/// Maximum configuration file size in bytes.
pub(crate) const MAX_CONFIG_FILE_SIZE: usize = 1024 * 1024;
/// Maximum length of a single path component.
pub(crate) const MAX_PATH_COMPONENT_LENGTH: usize = 255;
/// Maximum total path length.
pub(crate) const MAX_TOTAL_PATH_LENGTH: usize = 4096;
/// Default bind address for the HTTP server.
pub(crate) const DEFAULT_BIND: &str = "127.0.0.1:8080";
/// Default maximum request body size in bytes.
pub(crate) const DEFAULT_MAX_BODY_BYTES: usize = 10 * 1024 * 1024;
/// Maximum allowed request body size in bytes.
pub(crate) const MAX_MAX_BODY_BYTES: usize = 256 * 1024 * 1024;
/// Default `SQLite` busy timeout in milliseconds.
pub(crate) const DEFAULT_BUSY_TIMEOUT_MS: u64 = 5_000;
/// Default watcher delivery timeout in milliseconds.
pub(crate) const DEFAULT_DELIVERY_TIMEOUT_MS: u64 = 5_000;
/// Default change-signal lease in milliseconds.
pub(crate) const DEFAULT_SIGNAL_LEASE_MS: u64 = 30_000;
/// Default idle poll interval in milliseconds.
pub(crate) const DEFAULT_POLL_INTERVAL_MS: u64 = 250;
/// Default shutdown grace period in milliseconds.
pub(crate) const DEFAULT_SHUTDOWN_GRACE_MS: u64 = 7_000;
/// Default sweep interval in milliseconds.
pub(crate) const DEFAULT_SWEEP_INTERVAL_MS: u64 = 30_000;
/// Maximum allowed value for any dispatch timing knob in milliseconds.
pub(crate) const MAX_DISPATCH_MS: u64 = 24 * 60 * 60 * 1000;

// ============================================================================
// SECTION: Configuration Types
// ============================================================================

/// Ledgerline service configuration.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct LedgerlineConfig {
    /// HTTP server configuration.
    #[serde(default)]
    pub server: ServerConfig,
    /// Storage backend configuration.
    #[serde(default)]
    pub storage: StorageConfig,
    /// Version ledger configuration.
    #[serde(default)]
    pub ledger: LedgerConfig,
    /// Notification dispatcher configuration.
    #[serde(default)]
    pub dispatch: DispatchConfig,
    /// Audit logging configuration.
    #[serde(default)]
    pub audit: AuditConfig,
}

impl LedgerlineConfig {
    /// Loads configuration from disk using the default resolution rules.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when loading or validation fails.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let resolved = resolve_path(path)?;
        validate_path(&resolved)?;
        let bytes = fs::read(&resolved).map_err(|err| ConfigError::Io(err.to_string()))?;
        if bytes.len() > MAX_CONFIG_FILE_SIZE {
            return Err(ConfigError::Invalid("config file exceeds size limit".to_string()));
        }
        let content = std::str::from_utf8(&bytes)
            .map_err(|_| ConfigError::Invalid("config file must be utf-8".to_string()))?;
        Self::from_toml(content)
    }

    /// Parses and validates configuration from TOML text.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when parsing or validation fails.
    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        let config: Self =
            toml::from_str(content).map_err(|err| ConfigError::Parse(err.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Validates the configuration for internal consistency.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when configuration is invalid.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.server.validate()?;
        self.storage.validate()?;
        self.ledger.validate()?;
        self.dispatch.validate()?;
        self.audit.validate()?;
        Ok(())
    }
}

// ============================================================================
// SECTION: Server
// ============================================================================

/// HTTP server configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    /// Socket address to bind.
    #[serde(default = "default_bind")]
    pub bind: String,
    /// Maximum request body size in bytes.
    #[serde(default = "default_max_body_bytes")]
    pub max_body_bytes: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
            max_body_bytes: default_max_body_bytes(),
        }
    }
}

impl ServerConfig {
    /// Returns the parsed bind address.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] when the address does not parse.
    pub fn bind_addr(&self) -> Result<SocketAddr, ConfigError> {
        self.bind
            .trim()
            .parse()
            .map_err(|_| ConfigError::Invalid(format!("server.bind is not a socket address: {}", self.bind)))
    }

    /// Validates server configuration.
    fn validate(&self) -> Result<(), ConfigError> {
        self.bind_addr()?;
        if self.max_body_bytes == 0 {
            return Err(ConfigError::Invalid(
                "server.max_body_bytes must be greater than zero".to_string(),
            ));
        }
        if self.max_body_bytes > MAX_MAX_BODY_BYTES {
            return Err(ConfigError::Invalid("server.max_body_bytes exceeds limit".to_string()));
        }
        Ok(())
    }
}

// ============================================================================
// SECTION: Storage
// ============================================================================

/// Storage backend selector.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum StorageBackend {
    /// Process-local memory; nothing survives restart.
    #[default]
    Memory,
    /// `SQLite` database file.
    Sqlite,
}

/// Storage backend configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct StorageConfig {
    /// Backend selector.
    #[serde(default)]
    pub backend: StorageBackend,
    /// Database path for the `SQLite` backend.
    #[serde(default)]
    pub path: Option<String>,
    /// `SQLite` busy timeout in milliseconds.
    #[serde(default = "default_busy_timeout_ms")]
    pub busy_timeout_ms: u64,
    /// `SQLite` journal mode.
    #[serde(default)]
    pub journal_mode: SqliteStoreMode,
    /// `SQLite` sync mode.
    #[serde(default)]
    pub sync_mode: SqliteSyncMode,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            backend: StorageBackend::Memory,
            path: None,
            busy_timeout_ms: default_busy_timeout_ms(),
            journal_mode: SqliteStoreMode::default(),
            sync_mode: SqliteSyncMode::default(),
        }
    }
}

impl StorageConfig {
    /// Returns the `SQLite` store config when the `SQLite` backend is selected.
    #[must_use]
    pub fn sqlite_config(&self) -> Option<SqliteStoreConfig> {
        match self.backend {
            StorageBackend::Memory => None,
            StorageBackend::Sqlite => self.path.as_ref().map(|path| SqliteStoreConfig {
                path: PathBuf::from(path.trim()),
                busy_timeout_ms: self.busy_timeout_ms,
                journal_mode: self.journal_mode,
                sync_mode: self.sync_mode,
            }),
        }
    }

    /// Validates storage configuration.
    fn validate(&self) -> Result<(), ConfigError> {
        match self.backend {
            StorageBackend::Memory => {
                if self.path.is_some() {
                    return Err(ConfigError::Invalid(
                        "storage.path is only valid with the sqlite backend".to_string(),
                    ));
                }
            }
            StorageBackend::Sqlite => {
                let Some(path) = &self.path else {
                    return Err(ConfigError::Invalid(
                        "storage.path is required for the sqlite backend".to_string(),
                    ));
                };
                validate_path_string("storage.path", path)?;
            }
        }
        if self.busy_timeout_ms == 0 {
            return Err(ConfigError::Invalid(
                "storage.busy_timeout_ms must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }
}

// ============================================================================
// SECTION: Ledger
// ============================================================================

/// Version ledger configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct LedgerConfig {
    /// Version assignment policy.
    #[serde(default)]
    pub version_strategy: VersionStrategy,
    /// History entries returned when a request gives no limit.
    #[serde(default = "default_history_limit")]
    pub default_history_limit: usize,
    /// Largest history limit a request may ask for.
    #[serde(default = "max_history_limit")]
    pub max_history_limit: usize,
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self {
            version_strategy: VersionStrategy::default(),
            default_history_limit: default_history_limit(),
            max_history_limit: max_history_limit(),
        }
    }
}

impl LedgerConfig {
    /// Returns the ingest service configuration derived from this section.
    #[must_use]
    pub const fn service_config(&self) -> IngestServiceConfig {
        IngestServiceConfig {
            hash_algorithm: DEFAULT_HASH_ALGORITHM,
            default_history_limit: self.default_history_limit,
            max_history_limit: self.max_history_limit,
        }
    }

    /// Validates ledger configuration.
    fn validate(&self) -> Result<(), ConfigError> {
        if self.max_history_limit == 0 || self.max_history_limit > MAX_HISTORY_LIMIT {
            return Err(ConfigError::Invalid(format!(
                "ledger.max_history_limit must be between 1 and {MAX_HISTORY_LIMIT}"
            )));
        }
        if self.default_history_limit == 0 || self.default_history_limit > self.max_history_limit
        {
            return Err(ConfigError::Invalid(
                "ledger.default_history_limit must be between 1 and max_history_limit"
                    .to_string(),
            ));
        }
        Ok(())
    }
}

// ============================================================================
// SECTION: Dispatch
// ============================================================================

/// Watcher notification transport.
///
/// Only transports that need nothing beyond the watcher URL are selectable
/// here. The in-process `ChannelNotifier` and `CallbackNotifier` from
/// `ledgerline-broker` are library-only: embedders pass them to
/// `NotificationDispatcher::new` directly because their receivers live in
/// the embedding program.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum DispatchTransport {
    /// HTTP POST to the watcher URL.
    #[default]
    Webhook,
    /// Write notices as JSON lines to stderr and report success.
    Log,
}

/// Notification dispatcher configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct DispatchConfig {
    /// Run the dispatcher in this process.
    #[serde(default = "default_dispatch_enabled")]
    pub enabled: bool,
    /// Notification transport.
    #[serde(default)]
    pub transport: DispatchTransport,
    /// Per-delivery timeout in milliseconds.
    #[serde(default = "default_delivery_timeout_ms")]
    pub delivery_timeout_ms: u64,
    /// Visibility lease for a dequeued signal in milliseconds.
    #[serde(default = "default_signal_lease_ms")]
    pub signal_lease_ms: u64,
    /// Sleep between polls of an empty queue in milliseconds.
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,
    /// Grace period for the in-flight cycle at shutdown in milliseconds.
    #[serde(default = "default_shutdown_grace_ms")]
    pub shutdown_grace_ms: u64,
    /// Interval between trailing-watch sweeps in milliseconds; zero disables.
    #[serde(default = "default_sweep_interval_ms")]
    pub sweep_interval_ms: u64,
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            enabled: default_dispatch_enabled(),
            transport: DispatchTransport::default(),
            delivery_timeout_ms: default_delivery_timeout_ms(),
            signal_lease_ms: default_signal_lease_ms(),
            poll_interval_ms: default_poll_interval_ms(),
            shutdown_grace_ms: default_shutdown_grace_ms(),
            sweep_interval_ms: default_sweep_interval_ms(),
        }
    }
}

impl DispatchConfig {
    /// Returns the delivery timeout.
    #[must_use]
    pub const fn delivery_timeout(&self) -> Duration {
        Duration::from_millis(self.delivery_timeout_ms)
    }

    /// Returns the signal lease.
    #[must_use]
    pub const fn signal_lease(&self) -> Duration {
        Duration::from_millis(self.signal_lease_ms)
    }

    /// Returns the idle poll interval.
    #[must_use]
    pub const fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    /// Returns the shutdown grace period.
    #[must_use]
    pub const fn shutdown_grace(&self) -> Duration {
        Duration::from_millis(self.shutdown_grace_ms)
    }

    /// Returns the sweep interval, or `None` when sweeping is disabled.
    #[must_use]
    pub const fn sweep_interval(&self) -> Option<Duration> {
        if self.sweep_interval_ms == 0 {
            None
        } else {
            Some(Duration::from_millis(self.sweep_interval_ms))
        }
    }

    /// Validates dispatch configuration.
    fn validate(&self) -> Result<(), ConfigError> {
        for (field, value) in [
            ("dispatch.delivery_timeout_ms", self.delivery_timeout_ms),
            ("dispatch.signal_lease_ms", self.signal_lease_ms),
            ("dispatch.poll_interval_ms", self.poll_interval_ms),
            ("dispatch.shutdown_grace_ms", self.shutdown_grace_ms),
        ] {
            if value == 0 {
                return Err(ConfigError::Invalid(format!("{field} must be greater than zero")));
            }
            if value > MAX_DISPATCH_MS {
                return Err(ConfigError::Invalid(format!("{field} exceeds limit")));
            }
        }
        if self.sweep_interval_ms > MAX_DISPATCH_MS {
            return Err(ConfigError::Invalid("dispatch.sweep_interval_ms exceeds limit".to_string()));
        }
        if self.signal_lease_ms <= self.delivery_timeout_ms {
            return Err(ConfigError::Invalid(
                "dispatch.signal_lease_ms must exceed dispatch.delivery_timeout_ms".to_string(),
            ));
        }
        Ok(())
    }
}

// ============================================================================
// SECTION: Audit
// ============================================================================

/// Audit sink selector.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum AuditSinkKind {
    /// JSON lines on stderr.
    #[default]
    Stderr,
    /// JSON lines appended to a file.
    File,
    /// Discard audit events.
    Noop,
}

/// Audit logging configuration.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AuditConfig {
    /// Sink selector.
    #[serde(default)]
    pub sink: AuditSinkKind,
    /// Log path for the file sink.
    #[serde(default)]
    pub path: Option<String>,
}

impl AuditConfig {
    /// Validates audit configuration.
    fn validate(&self) -> Result<(), ConfigError> {
        match (self.sink, &self.path) {
            (AuditSinkKind::File, Some(path)) => validate_path_string("audit.path", path),
            (AuditSinkKind::File, None) => {
                Err(ConfigError::Invalid("audit.path is required for the file sink".to_string()))
            }
            (_, Some(_)) => {
                Err(ConfigError::Invalid("audit.path is only valid with the file sink".to_string()))
            }
            (_, None) => Ok(()),
        }
    }
}

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// I/O failure while reading configuration.
    #[error("config io error: {0}")]
    Io(String),
    /// TOML parsing error.
    #[error("config parse error: {0}")]
    Parse(String),
    /// Invalid configuration data.
    #[error("invalid config: {0}")]
    Invalid(String),
}

// ============================================================================
// SECTION: Helpers
// ============================================================================

/// Resolves the config path from CLI or environment defaults.
fn resolve_path(path: Option<&Path>) -> Result<PathBuf, ConfigError> {
    if let Some(path) = path {
        return Ok(path.to_path_buf());
    }
    if let Ok(env_path) = env::var(CONFIG_ENV_VAR) {
        if env_path.len() > MAX_TOTAL_PATH_LENGTH {
            return Err(ConfigError::Invalid("config path exceeds max length".to_string()));
        }
        return Ok(PathBuf::from(env_path));
    }
    Ok(PathBuf::from(DEFAULT_CONFIG_NAME))
}

/// Validates the resolved path against security limits.
fn validate_path(path: &Path) -> Result<(), ConfigError> {
    let text = path.to_string_lossy();
    if text.len() > MAX_TOTAL_PATH_LENGTH {
        return Err(ConfigError::Invalid("config path exceeds max length".to_string()));
    }
    for component in path.components() {
        let value = component.as_os_str().to_string_lossy();
        if value.len() > MAX_PATH_COMPONENT_LENGTH {
            return Err(ConfigError::Invalid("config path component too long".to_string()));
        }
    }
    Ok(())
}

/// Validates a path string against length constraints.
fn validate_path_string(field: &str, value: &str) -> Result<(), ConfigError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(ConfigError::Invalid(format!("{field} must be non-empty")));
    }
    if trimmed.len() > MAX_TOTAL_PATH_LENGTH {
        return Err(ConfigError::Invalid(format!("{field} exceeds max length")));
    }
    for component in Path::new(trimmed).components() {
        let component_value = component.as_os_str().to_string_lossy();
        if component_value.len() > MAX_PATH_COMPONENT_LENGTH {
            return Err(ConfigError::Invalid(format!("{field} path component too long")));
        }
    }
    Ok(())
}

/// Default bind address.
fn default_bind() -> String {
    DEFAULT_BIND.to_string()
}

/// Default maximum request body size.
const fn default_max_body_bytes() -> usize {
    DEFAULT_MAX_BODY_BYTES
}

/// Default `SQLite` busy timeout.
const fn default_busy_timeout_ms() -> u64 {
    DEFAULT_BUSY_TIMEOUT_MS
}

/// Default history limit.
const fn default_history_limit() -> usize {
    DEFAULT_HISTORY_LIMIT
}

/// Default maximum history limit.
const fn max_history_limit() -> usize {
    MAX_HISTORY_LIMIT
}

/// Dispatcher runs by default.
const fn default_dispatch_enabled() -> bool {
    true
}

/// Default delivery timeout.
const fn default_delivery_timeout_ms() -> u64 {
    DEFAULT_DELIVERY_TIMEOUT_MS
}

/// Default signal lease.
const fn default_signal_lease_ms() -> u64 {
    DEFAULT_SIGNAL_LEASE_MS
}

/// Default idle poll interval.
const fn default_poll_interval_ms() -> u64 {
    DEFAULT_POLL_INTERVAL_MS
}

/// Default shutdown grace period.
const fn default_shutdown_grace_ms() -> u64 {
    DEFAULT_SHUTDOWN_GRACE_MS
}

/// Default sweep interval.
const fn default_sweep_interval_ms() -> u64 {
    DEFAULT_SWEEP_INTERVAL_MS
}
