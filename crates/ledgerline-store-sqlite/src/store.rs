// ledgerline-store-sqlite/src/store.rs
// ============================================================================
// Module: SQLite Ledgerline Store
// Description: Durable Ledgerline storage backed by SQLite WAL.
// Purpose: Persist content, versions, watch cursors, and change signals.
// Dependencies: ledgerline-core, rusqlite, serde, thiserror
// ============================================================================

//! ## Overview
//! This module implements [`ContentStore`], [`VersionLedger`],
//! [`WatchRegistry`], and [`SignalQueue`] over one `SQLite` database. Version
//! assignment and signal leasing run inside `IMMEDIATE` transactions so
//! racing writers serialize on the database lock, and a ledger append
//! inserts its change signal in the same transaction; cursor advances are
//! conditional updates that can never regress. Database contents are treated
//! as untrusted and fail closed on malformed rows.

// ============================================================================//
// SECTION: Imports
// ============================================================================//

use std::path::Path;
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::Mutex;
use std::sync::MutexGuard;
use std::time::Duration;

use ledgerline_core::AppendPlan;
use ledgerline_core::ChangeSignal;
use ledgerline_core::ContentStore;
use ledgerline_core::EntityId;
use ledgerline_core::Fingerprint;
use ledgerline_core::LedgerEntry;
use ledgerline_core::SignalId;
use ledgerline_core::SignalLease;
use ledgerline_core::SignalQueue;
use ledgerline_core::StoreError;
use ledgerline_core::Version;
use ledgerline_core::VersionLedger;
use ledgerline_core::VersionRequest;
use ledgerline_core::VersionStrategy;
use ledgerline_core::WatchRecord;
use ledgerline_core::WatchRegistry;
use ledgerline_core::WatcherUrl;
use ledgerline_core::plan_append;
use ledgerline_core::unix_millis;
use rusqlite::Connection;
use rusqlite::OpenFlags;
use rusqlite::OptionalExtension;
use rusqlite::TransactionBehavior;
use rusqlite::params;
use serde::Deserialize;
use thiserror::Error;

// ============================================================================//
// SECTION: Constants
// ============================================================================//

/// `SQLite` schema version for the store.
const SCHEMA_VERSION: i64 = 1;
/// Default busy timeout (ms).
const DEFAULT_BUSY_TIMEOUT_MS: u64 = 5_000;
/// Maximum length of a single path component.
const MAX_PATH_COMPONENT_LENGTH: usize = 255;
/// Maximum total path length.
const MAX_TOTAL_PATH_LENGTH: usize = 4096;

// ============================================================================//
// SECTION: Config
// ============================================================================//

/// `SQLite` journal mode configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum SqliteStoreMode {
    /// WAL journal mode (recommended).
    #[default]
    Wal,
    /// Delete journal mode (legacy).
    Delete,
}

impl SqliteStoreMode {
    /// Returns the `SQLite` pragma value.
    #[must_use]
    pub const fn pragma_value(self) -> &'static str {
        match self {
            Self::Wal => "wal",
            Self::Delete => "delete",
        }
    }
}

/// `SQLite` sync mode configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum SqliteSyncMode {
    /// Full synchronous mode (safest).
    #[default]
    Full,
    /// Normal synchronous mode (balanced).
    Normal,
}

impl SqliteSyncMode {
    /// Returns the `SQLite` pragma value.
    #[must_use]
    pub const fn pragma_value(self) -> &'static str {
        match self {
            Self::Full => "full",
            Self::Normal => "normal",
        }
    }
}

/// Configuration for the `SQLite` backend.
#[derive(Debug, Clone, Deserialize)]
pub struct SqliteStoreConfig {
    /// Path to the `SQLite` database file.
    pub path: PathBuf,
    /// Busy timeout in milliseconds.
    #[serde(default = "default_busy_timeout_ms")]
    pub busy_timeout_ms: u64,
    /// `SQLite` journal mode.
    #[serde(default)]
    pub journal_mode: SqliteStoreMode,
    /// `SQLite` sync mode.
    #[serde(default)]
    pub sync_mode: SqliteSyncMode,
}

impl SqliteStoreConfig {
    /// Creates a configuration with default pragmas for `path`.
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            busy_timeout_ms: DEFAULT_BUSY_TIMEOUT_MS,
            journal_mode: SqliteStoreMode::default(),
            sync_mode: SqliteSyncMode::default(),
        }
    }
}

/// Returns the default busy timeout for `SQLite` connections.
const fn default_busy_timeout_ms() -> u64 {
    DEFAULT_BUSY_TIMEOUT_MS
}

// ============================================================================//
// SECTION: Errors
// ============================================================================//

/// `SQLite` store errors.
#[derive(Debug, Error)]
pub enum SqliteStoreError {
    /// Store I/O error.
    #[error("sqlite store io error: {0}")]
    Io(String),
    /// `SQLite` engine error.
    #[error("sqlite store db error: {0}")]
    Db(String),
    /// Store corruption.
    #[error("sqlite store corruption: {0}")]
    Corrupt(String),
    /// Store schema version mismatch.
    #[error("sqlite store version mismatch: {0}")]
    VersionMismatch(String),
    /// Invalid store data or request.
    #[error("sqlite store invalid data: {0}")]
    Invalid(String),
    /// Ledger rejected the write.
    #[error("sqlite store rejected write: {0}")]
    Rejected(StoreError),
}

impl From<SqliteStoreError> for StoreError {
    fn from(error: SqliteStoreError) -> Self {
        match error {
            SqliteStoreError::Io(message) => Self::Io(message),
            SqliteStoreError::Db(message) => Self::Store(message),
            SqliteStoreError::Corrupt(message) => Self::Corrupt(message),
            SqliteStoreError::VersionMismatch(message) => Self::VersionMismatch(message),
            SqliteStoreError::Invalid(message) => Self::Invalid(message),
            SqliteStoreError::Rejected(inner) => inner,
        }
    }
}

/// Maps a `rusqlite` error into a store error.
#[allow(clippy::needless_pass_by_value, reason = "Used as a map_err callback.")]
fn db_err(err: rusqlite::Error) -> SqliteStoreError {
    SqliteStoreError::Db(err.to_string())
}

// ============================================================================//
// SECTION: Store
// ============================================================================//

/// `SQLite`-backed Ledgerline storage.
#[derive(Clone)]
pub struct SqliteBackend {
    /// Version assignment policy.
    strategy: VersionStrategy,
    /// Shared `SQLite` connection guarded by a mutex.
    connection: Arc<Mutex<Connection>>,
}

impl SqliteBackend {
    /// Opens an `SQLite` backend using sequential versions.
    ///
    /// # Errors
    ///
    /// Returns [`SqliteStoreError`] when the database cannot be opened or
    /// initialized.
    pub fn new(config: &SqliteStoreConfig) -> Result<Self, SqliteStoreError> {
        validate_store_path(&config.path)?;
        ensure_parent_dir(&config.path)?;
        let mut connection = open_connection(config)?;
        initialize_schema(&mut connection)?;
        Ok(Self {
            strategy: VersionStrategy::default(),
            connection: Arc::new(Mutex::new(connection)),
        })
    }

    /// Replaces the version assignment policy.
    #[must_use]
    pub const fn with_strategy(mut self, strategy: VersionStrategy) -> Self {
        self.strategy = strategy;
        self
    }

    /// Locks the shared connection.
    fn lock(&self) -> Result<MutexGuard<'_, Connection>, SqliteStoreError> {
        self.connection.lock().map_err(|_| SqliteStoreError::Db("mutex poisoned".to_string()))
    }

    /// Inserts content unless already present, detecting collisions.
    fn insert_content(&self, fingerprint: &Fingerprint, bytes: &[u8]) -> Result<(), SqliteStoreError> {
        let mut guard = self.lock()?;
        let tx = guard.transaction_with_behavior(TransactionBehavior::Immediate).map_err(db_err)?;
        let inserted = tx
            .execute(
                "INSERT OR IGNORE INTO content (fingerprint, bytes) VALUES (?1, ?2)",
                params![fingerprint.as_bytes(), bytes],
            )
            .map_err(db_err)?;
        if inserted == 0 {
            let existing: Vec<u8> = tx
                .query_row(
                    "SELECT bytes FROM content WHERE fingerprint = ?1",
                    params![fingerprint.as_bytes()],
                    |row| row.get(0),
                )
                .map_err(db_err)?;
            if existing != bytes {
                return Err(SqliteStoreError::Rejected(StoreError::Conflict(format!(
                    "fingerprint {fingerprint} already holds different bytes"
                ))));
            }
        }
        tx.commit().map_err(db_err)?;
        drop(guard);
        Ok(())
    }

    /// Loads content bytes.
    fn load_content(&self, fingerprint: &Fingerprint) -> Result<Option<Vec<u8>>, SqliteStoreError> {
        let guard = self.lock()?;
        guard
            .query_row(
                "SELECT bytes FROM content WHERE fingerprint = ?1",
                params![fingerprint.as_bytes()],
                |row| row.get(0),
            )
            .optional()
            .map_err(db_err)
    }

    /// Appends a ledger record and its change signal inside one immediate
    /// transaction.
    fn append_version(
        &self,
        entity: &EntityId,
        request: VersionRequest,
        fingerprint: &Fingerprint,
    ) -> Result<Version, SqliteStoreError> {
        let mut guard = self.lock()?;
        let tx = guard.transaction_with_behavior(TransactionBehavior::Immediate).map_err(db_err)?;
        let latest: Option<i64> = tx
            .query_row(
                "SELECT MAX(version) FROM version WHERE entity = ?1",
                params![entity.as_str()],
                |row| row.get(0),
            )
            .map_err(db_err)?;
        let latest = latest.map(version_from_sql).transpose()?;
        let plan = plan_append(
            self.strategy,
            request,
            latest,
            |version| {
                let version = version_to_sql(version).map_err(StoreError::from)?;
                tx.query_row(
                    "SELECT 1 FROM version WHERE entity = ?1 AND version = ?2",
                    params![entity.as_str(), version],
                    |_| Ok(()),
                )
                .optional()
                .map(|row| row.is_some())
                .map_err(|err| StoreError::Store(err.to_string()))
            },
            unix_millis(),
        )
        .map_err(SqliteStoreError::Rejected)?;
        if let AppendPlan::Insert(version) = plan {
            let recorded_at = i64::try_from(unix_millis()).unwrap_or(i64::MAX);
            tx.execute(
                "INSERT OR IGNORE INTO version (entity, version, fingerprint, recorded_at) VALUES \
                 (?1, ?2, ?3, ?4)",
                params![entity.as_str(), version_to_sql(version)?, fingerprint.as_bytes(), recorded_at],
            )
            .map_err(db_err)?;
            insert_signal(&tx, &ChangeSignal::new(entity.clone(), Some(version)))?;
        }
        tx.commit().map_err(db_err)?;
        drop(guard);
        Ok(plan.version())
    }

    /// Loads up to `limit` ledger entries, newest first.
    fn load_history(&self, entity: &EntityId, limit: usize) -> Result<Vec<LedgerEntry>, SqliteStoreError> {
        let limit = i64::try_from(limit).unwrap_or(i64::MAX);
        let guard = self.lock()?;
        let mut stmt = guard
            .prepare(
                "SELECT version, fingerprint FROM version WHERE entity = ?1 ORDER BY version DESC \
                 LIMIT ?2",
            )
            .map_err(db_err)?;
        let rows = stmt
            .query_map(params![entity.as_str(), limit], |row| {
                let version: i64 = row.get(0)?;
                let fingerprint: Vec<u8> = row.get(1)?;
                Ok((version, fingerprint))
            })
            .map_err(db_err)?;
        let mut entries = Vec::new();
        for row in rows {
            let (version, fingerprint) = row.map_err(db_err)?;
            entries.push(LedgerEntry {
                version: version_from_sql(version)?,
                fingerprint: Fingerprint::from_bytes(fingerprint),
            });
        }
        Ok(entries)
    }

    /// Registers a watcher without touching an existing cursor.
    fn add_watch(&self, entity: &EntityId, url: &WatcherUrl) -> Result<(), SqliteStoreError> {
        let guard = self.lock()?;
        guard
            .execute(
                "INSERT OR IGNORE INTO watch (entity, url, last_notified_version) VALUES (?1, ?2, 0)",
                params![entity.as_str(), url.as_str()],
            )
            .map_err(db_err)?;
        Ok(())
    }

    /// Removes a watcher.
    fn remove_watch(&self, entity: &EntityId, url: &WatcherUrl) -> Result<(), SqliteStoreError> {
        let guard = self.lock()?;
        guard
            .execute(
                "DELETE FROM watch WHERE entity = ?1 AND url = ?2",
                params![entity.as_str(), url.as_str()],
            )
            .map_err(db_err)?;
        Ok(())
    }

    /// Loads a watcher cursor.
    fn load_cursor(&self, entity: &EntityId, url: &WatcherUrl) -> Result<Version, SqliteStoreError> {
        let guard = self.lock()?;
        let cursor: Option<i64> = guard
            .query_row(
                "SELECT last_notified_version FROM watch WHERE entity = ?1 AND url = ?2",
                params![entity.as_str(), url.as_str()],
                |row| row.get(0),
            )
            .optional()
            .map_err(db_err)?;
        cursor.map_or(Ok(Version::ZERO), version_from_sql)
    }

    /// Advances a cursor with a conditional update.
    fn advance_cursor(
        &self,
        entity: &EntityId,
        url: &WatcherUrl,
        version: Version,
    ) -> Result<bool, SqliteStoreError> {
        let version = version_to_sql(version)?;
        let guard = self.lock()?;
        let updated = guard
            .execute(
                "UPDATE watch SET last_notified_version = ?3 WHERE entity = ?1 AND url = ?2 AND \
                 last_notified_version < ?3",
                params![entity.as_str(), url.as_str(), version],
            )
            .map_err(db_err)?;
        Ok(updated > 0)
    }

    /// Loads every watch record on an entity.
    fn load_watchers(&self, entity: &EntityId) -> Result<Vec<WatchRecord>, SqliteStoreError> {
        let guard = self.lock()?;
        let mut stmt = guard
            .prepare(
                "SELECT url, last_notified_version FROM watch WHERE entity = ?1 ORDER BY url",
            )
            .map_err(db_err)?;
        let rows = stmt
            .query_map(params![entity.as_str()], |row| {
                let url: String = row.get(0)?;
                let cursor: i64 = row.get(1)?;
                Ok((url, cursor))
            })
            .map_err(db_err)?;
        let mut records = Vec::new();
        for row in rows {
            let (url, cursor) = row.map_err(db_err)?;
            records.push(WatchRecord {
                entity: entity.clone(),
                url: WatcherUrl::new(url),
                last_notified_version: version_from_sql(cursor)?,
            });
        }
        Ok(records)
    }

    /// Loads every watched entity.
    fn load_watched_entities(&self) -> Result<Vec<EntityId>, SqliteStoreError> {
        let guard = self.lock()?;
        let mut stmt =
            guard.prepare("SELECT DISTINCT entity FROM watch ORDER BY entity").map_err(db_err)?;
        let rows = stmt.query_map(params![], |row| row.get::<_, String>(0)).map_err(db_err)?;
        let mut entities = Vec::new();
        for row in rows {
            entities.push(EntityId::new(row.map_err(db_err)?));
        }
        Ok(entities)
    }

    /// Enqueues a change signal.
    fn enqueue_signal(&self, signal: &ChangeSignal) -> Result<SignalId, SqliteStoreError> {
        let guard = self.lock()?;
        insert_signal(&guard, signal)
    }

    /// Leases the oldest visible signal inside an immediate transaction.
    fn lease_signal(&self, lease: Duration) -> Result<Option<SignalLease>, SqliteStoreError> {
        let now = i64::try_from(unix_millis()).unwrap_or(i64::MAX);
        let lease_ms = i64::try_from(lease.as_millis()).unwrap_or(i64::MAX);
        let mut guard = self.lock()?;
        let tx = guard.transaction_with_behavior(TransactionBehavior::Immediate).map_err(db_err)?;
        let row: Option<(i64, String, Option<i64>, i64)> = tx
            .query_row(
                "SELECT id, entity, version, attempts FROM change_signal WHERE visible_at <= ?1 \
                 ORDER BY id LIMIT 1",
                params![now],
                |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?, row.get(3)?)),
            )
            .optional()
            .map_err(db_err)?;
        let Some((id, entity, version, attempts)) = row else {
            tx.commit().map_err(db_err)?;
            return Ok(None);
        };
        let attempts = attempts.saturating_add(1);
        tx.execute(
            "UPDATE change_signal SET visible_at = ?2, attempts = ?3 WHERE id = ?1",
            params![id, now.saturating_add(lease_ms), attempts],
        )
        .map_err(db_err)?;
        tx.commit().map_err(db_err)?;
        drop(guard);
        Ok(Some(SignalLease {
            id: signal_id_from_sql(id)?,
            signal: ChangeSignal::new(
                EntityId::new(entity),
                version.map(version_from_sql).transpose()?,
            ),
            attempts: u32::try_from(attempts).unwrap_or(u32::MAX),
        }))
    }

    /// Deletes an acknowledged signal.
    fn delete_signal(&self, id: SignalId) -> Result<(), SqliteStoreError> {
        let id = i64::try_from(id.get())
            .map_err(|_| SqliteStoreError::Invalid("signal id out of range".to_string()))?;
        let guard = self.lock()?;
        guard.execute("DELETE FROM change_signal WHERE id = ?1", params![id]).map_err(db_err)?;
        Ok(())
    }

    /// Counts queued signals.
    fn count_signals(&self) -> Result<usize, SqliteStoreError> {
        let guard = self.lock()?;
        let count: i64 = guard
            .query_row("SELECT COUNT(*) FROM change_signal", params![], |row| row.get(0))
            .map_err(db_err)?;
        usize::try_from(count).map_err(|_| SqliteStoreError::Corrupt("negative signal count".to_string()))
    }
}

// ============================================================================//
// SECTION: Interface Implementations
// ============================================================================//

impl ContentStore for SqliteBackend {
    fn insert(&self, fingerprint: &Fingerprint, bytes: &[u8]) -> Result<(), StoreError> {
        self.insert_content(fingerprint, bytes).map_err(StoreError::from)
    }

    fn get(&self, fingerprint: &Fingerprint) -> Result<Option<Vec<u8>>, StoreError> {
        self.load_content(fingerprint).map_err(StoreError::from)
    }
}

impl VersionLedger for SqliteBackend {
    fn append(
        &self,
        entity: &EntityId,
        request: VersionRequest,
        fingerprint: &Fingerprint,
    ) -> Result<Version, StoreError> {
        self.append_version(entity, request, fingerprint).map_err(StoreError::from)
    }

    fn latest(&self, entity: &EntityId) -> Result<Option<LedgerEntry>, StoreError> {
        Ok(self.load_history(entity, 1)?.into_iter().next())
    }

    fn history(&self, entity: &EntityId, limit: usize) -> Result<Vec<LedgerEntry>, StoreError> {
        self.load_history(entity, limit).map_err(StoreError::from)
    }
}

impl WatchRegistry for SqliteBackend {
    fn add(&self, entity: &EntityId, url: &WatcherUrl) -> Result<(), StoreError> {
        self.add_watch(entity, url).map_err(StoreError::from)
    }

    fn remove(&self, entity: &EntityId, url: &WatcherUrl) -> Result<(), StoreError> {
        self.remove_watch(entity, url).map_err(StoreError::from)
    }

    fn cursor(&self, entity: &EntityId, url: &WatcherUrl) -> Result<Version, StoreError> {
        self.load_cursor(entity, url).map_err(StoreError::from)
    }

    fn advance(
        &self,
        entity: &EntityId,
        url: &WatcherUrl,
        version: Version,
    ) -> Result<bool, StoreError> {
        self.advance_cursor(entity, url, version).map_err(StoreError::from)
    }

    fn watchers(&self, entity: &EntityId) -> Result<Vec<WatchRecord>, StoreError> {
        self.load_watchers(entity).map_err(StoreError::from)
    }

    fn watched_entities(&self) -> Result<Vec<EntityId>, StoreError> {
        self.load_watched_entities().map_err(StoreError::from)
    }
}

impl SignalQueue for SqliteBackend {
    fn enqueue(&self, signal: &ChangeSignal) -> Result<SignalId, StoreError> {
        self.enqueue_signal(signal).map_err(StoreError::from)
    }

    fn dequeue(&self, lease: Duration) -> Result<Option<SignalLease>, StoreError> {
        self.lease_signal(lease).map_err(StoreError::from)
    }

    fn ack(&self, id: SignalId) -> Result<(), StoreError> {
        self.delete_signal(id).map_err(StoreError::from)
    }

    fn pending(&self) -> Result<usize, StoreError> {
        self.count_signals().map_err(StoreError::from)
    }
}

// ============================================================================//
// SECTION: Helpers
// ============================================================================//

/// Inserts a visible change-signal row on `connection`.
fn insert_signal(connection: &Connection, signal: &ChangeSignal) -> Result<SignalId, SqliteStoreError> {
    let version = signal.version.map(version_to_sql).transpose()?;
    let now = i64::try_from(unix_millis()).unwrap_or(i64::MAX);
    connection
        .execute(
            "INSERT INTO change_signal (entity, version, enqueued_at, visible_at, attempts) VALUES \
             (?1, ?2, ?3, ?3, 0)",
            params![signal.entity.as_str(), version, now],
        )
        .map_err(db_err)?;
    signal_id_from_sql(connection.last_insert_rowid())
}

/// Converts a version into its `SQLite` integer form.
fn version_to_sql(version: Version) -> Result<i64, SqliteStoreError> {
    i64::try_from(version.get())
        .map_err(|_| SqliteStoreError::Invalid(format!("version {version} out of range")))
}

/// Converts a stored integer into a version, rejecting negatives.
fn version_from_sql(value: i64) -> Result<Version, SqliteStoreError> {
    u64::try_from(value)
        .map(Version::new)
        .map_err(|_| SqliteStoreError::Corrupt(format!("negative version {value}")))
}

/// Converts a stored row id into a signal id.
fn signal_id_from_sql(value: i64) -> Result<SignalId, SqliteStoreError> {
    u64::try_from(value)
        .map(SignalId::new)
        .map_err(|_| SqliteStoreError::Corrupt(format!("negative signal id {value}")))
}

/// Ensures the parent directory for the store exists.
fn ensure_parent_dir(path: &Path) -> Result<(), SqliteStoreError> {
    let Some(parent) = path.parent() else {
        return Err(SqliteStoreError::Io("store path missing parent directory".to_string()));
    };
    if parent.as_os_str().is_empty() {
        return Ok(());
    }
    std::fs::create_dir_all(parent).map_err(|err| SqliteStoreError::Io(err.to_string()))
}

/// Validates store paths for safety limits.
fn validate_store_path(path: &Path) -> Result<(), SqliteStoreError> {
    let path_string = path.display().to_string();
    if path_string.len() > MAX_TOTAL_PATH_LENGTH {
        return Err(SqliteStoreError::Invalid("store path exceeds length limit".to_string()));
    }
    for component in path.components() {
        let name = component.as_os_str().to_string_lossy();
        if name.len() > MAX_PATH_COMPONENT_LENGTH {
            return Err(SqliteStoreError::Invalid(
                "store path contains an overlong component".to_string(),
            ));
        }
    }
    if path.exists() && path.is_dir() {
        return Err(SqliteStoreError::Invalid(
            "store path must be a file, not a directory".to_string(),
        ));
    }
    Ok(())
}

/// Opens an `SQLite` connection with secure defaults.
fn open_connection(config: &SqliteStoreConfig) -> Result<Connection, SqliteStoreError> {
    let flags = OpenFlags::SQLITE_OPEN_READ_WRITE
        | OpenFlags::SQLITE_OPEN_CREATE
        | OpenFlags::SQLITE_OPEN_FULL_MUTEX;
    let connection = Connection::open_with_flags(&config.path, flags).map_err(db_err)?;
    apply_pragmas(&connection, config)?;
    Ok(connection)
}

/// Applies `SQLite` pragmas required for durability.
fn apply_pragmas(
    connection: &Connection,
    config: &SqliteStoreConfig,
) -> Result<(), SqliteStoreError> {
    connection.busy_timeout(Duration::from_millis(config.busy_timeout_ms)).map_err(db_err)?;
    connection.execute_batch("PRAGMA foreign_keys = ON;").map_err(db_err)?;
    connection
        .execute_batch(&format!("PRAGMA journal_mode = {};", config.journal_mode.pragma_value()))
        .map_err(db_err)?;
    connection
        .execute_batch(&format!("PRAGMA synchronous = {};", config.sync_mode.pragma_value()))
        .map_err(db_err)?;
    Ok(())
}

/// Initializes the `SQLite` schema or validates the existing version.
fn initialize_schema(connection: &mut Connection) -> Result<(), SqliteStoreError> {
    let tx = connection.transaction_with_behavior(TransactionBehavior::Immediate).map_err(db_err)?;
    tx.execute_batch("CREATE TABLE IF NOT EXISTS store_meta (version INTEGER NOT NULL);")
        .map_err(db_err)?;
    let version: Option<i64> = tx
        .query_row("SELECT version FROM store_meta LIMIT 1", params![], |row| row.get(0))
        .optional()
        .map_err(db_err)?;
    match version {
        None => {
            tx.execute("INSERT INTO store_meta (version) VALUES (?1)", params![SCHEMA_VERSION])
                .map_err(db_err)?;
            tx.execute_batch(
                "CREATE TABLE IF NOT EXISTS content (
                    fingerprint BLOB PRIMARY KEY,
                    bytes BLOB NOT NULL
                );
                CREATE TABLE IF NOT EXISTS version (
                    entity TEXT NOT NULL,
                    version INTEGER NOT NULL,
                    fingerprint BLOB NOT NULL,
                    recorded_at INTEGER NOT NULL,
                    PRIMARY KEY (entity, version)
                );
                CREATE TABLE IF NOT EXISTS watch (
                    entity TEXT NOT NULL,
                    url TEXT NOT NULL,
                    last_notified_version INTEGER NOT NULL DEFAULT 0,
                    PRIMARY KEY (entity, url)
                );
                CREATE TABLE IF NOT EXISTS change_signal (
                    id INTEGER PRIMARY KEY AUTOINCREMENT,
                    entity TEXT NOT NULL,
                    version INTEGER,
                    enqueued_at INTEGER NOT NULL,
                    visible_at INTEGER NOT NULL,
                    attempts INTEGER NOT NULL DEFAULT 0
                );
                CREATE INDEX IF NOT EXISTS idx_change_signal_visible
                    ON change_signal (visible_at, id);",
            )
            .map_err(db_err)?;
        }
        Some(value) if value == SCHEMA_VERSION => {}
        Some(value) => {
            return Err(SqliteStoreError::VersionMismatch(format!(
                "unsupported schema version: {value}"
            )));
        }
    }
    tx.commit().map_err(db_err)?;
    Ok(())
}
