// ledgerline-server/src/server.rs
// ============================================================================
// Module: Ledgerline Server
// Description: Component wiring and HTTP serve loop.
// Purpose: Build storage, audit, service, and dispatcher from configuration.
// Dependencies: ledgerline-core, ledgerline-broker, ledgerline-config, axum, tokio
// ============================================================================

//! ## Overview
//! [`LedgerlineServer::from_config`] constructs every component explicitly
//! from a validated configuration. [`LedgerlineServer::serve`] starts the
//! dispatcher, serves HTTP until ctrl-c, then shuts the dispatcher down
//! within its grace period.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::future::Future;
use std::net::SocketAddr;
use std::path::Path;
use std::sync::Arc;

use axum::Router;
use ledgerline_broker::DispatcherConfig;
use ledgerline_broker::LogNotifier;
use ledgerline_broker::NotificationDispatcher;
use ledgerline_broker::Notifier;
use ledgerline_broker::WebhookNotifier;
use ledgerline_config::AuditConfig;
use ledgerline_config::AuditSinkKind;
use ledgerline_config::DispatchConfig;
use ledgerline_config::DispatchTransport;
use ledgerline_config::LedgerlineConfig;
use ledgerline_config::StorageBackend;
use ledgerline_config::StorageConfig;
use ledgerline_core::AuditSink;
use ledgerline_core::Backend;
use ledgerline_core::FileAuditSink;
use ledgerline_core::InMemoryBackend;
use ledgerline_core::IngestService;
use ledgerline_core::LifecycleAuditEvent;
use ledgerline_core::NoopAuditSink;
use ledgerline_core::StderrAuditSink;
use ledgerline_core::VersionStrategy;
use ledgerline_store_sqlite::SqliteBackend;
use tokio::net::TcpListener;

use crate::routes::router;

// ============================================================================
// SECTION: Ledgerline Server
// ============================================================================

/// Fully wired Ledgerline process.
pub struct LedgerlineServer {
    /// Validated configuration.
    config: LedgerlineConfig,
    /// Ingest, read, and watch operations.
    service: IngestService,
    /// Notification dispatcher, absent when dispatch is disabled.
    dispatcher: Option<NotificationDispatcher>,
    /// Audit sink shared by every component.
    audit: Arc<dyn AuditSink>,
}

impl LedgerlineServer {
    /// Builds a server from configuration.
    ///
    /// # Errors
    ///
    /// Returns [`ServerError`] when validation or initialization fails.
    pub fn from_config(config: LedgerlineConfig) -> Result<Self, ServerError> {
        config.validate().map_err(|err| ServerError::Config(err.to_string()))?;
        let backend = build_backend(&config.storage, config.ledger.version_strategy)?;
        let audit = build_audit_sink(&config.audit)?;
        let service = IngestService::new(backend.clone(), config.ledger.service_config())
            .with_audit(Arc::clone(&audit));
        let dispatcher = if config.dispatch.enabled {
            let notifier = build_notifier(&config.dispatch)?;
            Some(
                NotificationDispatcher::new(backend, notifier, dispatcher_config(&config.dispatch))
                    .with_audit(Arc::clone(&audit)),
            )
        } else {
            None
        };
        Ok(Self {
            config,
            service,
            dispatcher,
            audit,
        })
    }

    /// Returns the ingest service.
    #[must_use]
    pub const fn service(&self) -> &IngestService {
        &self.service
    }

    /// Returns the dispatcher, when enabled.
    #[must_use]
    pub const fn dispatcher(&self) -> Option<&NotificationDispatcher> {
        self.dispatcher.as_ref()
    }

    /// Returns the HTTP router for this server.
    #[must_use]
    pub fn router(&self) -> Router {
        router(self.service.clone(), self.config.server.max_body_bytes)
    }

    /// Binds the configured address and serves until ctrl-c.
    ///
    /// # Errors
    ///
    /// Returns [`ServerError`] when binding or serving fails.
    pub async fn serve(self) -> Result<(), ServerError> {
        let addr: SocketAddr =
            self.config.server.bind_addr().map_err(|err| ServerError::Config(err.to_string()))?;
        let listener = TcpListener::bind(addr)
            .await
            .map_err(|err| ServerError::Transport(format!("http bind failed: {err}")))?;
        self.serve_with_shutdown(listener, async {
            let _ = tokio::signal::ctrl_c().await;
        })
        .await
    }

    /// Serves on `listener` until `shutdown` resolves, then stops the
    /// dispatcher.
    ///
    /// # Errors
    ///
    /// Returns [`ServerError`] when the HTTP server fails.
    pub async fn serve_with_shutdown<F>(
        self,
        listener: TcpListener,
        shutdown: F,
    ) -> Result<(), ServerError>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let app = self.router();
        let local = listener.local_addr().map(|addr| addr.to_string()).ok();
        self.audit.record_lifecycle(&LifecycleAuditEvent::new("listening", local));
        let handle = self.dispatcher.map(NotificationDispatcher::spawn);
        let served = axum::serve(listener, app)
            .with_graceful_shutdown(shutdown)
            .await
            .map_err(|err| ServerError::Transport(format!("http server failed: {err}")));
        if let Some(handle) = handle {
            handle.shutdown().await;
        }
        served
    }
}

// ============================================================================
// SECTION: Component Builders
// ============================================================================

/// Builds the storage backend selected by configuration.
fn build_backend(
    storage: &StorageConfig,
    strategy: VersionStrategy,
) -> Result<Backend, ServerError> {
    match storage.backend {
        StorageBackend::Memory => {
            Ok(Backend::from_store(InMemoryBackend::with_strategy(strategy)))
        }
        StorageBackend::Sqlite => {
            let sqlite_config = storage.sqlite_config().ok_or_else(|| {
                ServerError::Config("sqlite storage requires path".to_string())
            })?;
            let store = SqliteBackend::new(&sqlite_config)
                .map_err(|err| ServerError::Init(err.to_string()))?
                .with_strategy(strategy);
            Ok(Backend::from_store(store))
        }
    }
}

/// Builds the audit sink selected by configuration.
fn build_audit_sink(audit: &AuditConfig) -> Result<Arc<dyn AuditSink>, ServerError> {
    match (audit.sink, audit.path.as_deref()) {
        (AuditSinkKind::Stderr, _) => Ok(Arc::new(StderrAuditSink)),
        (AuditSinkKind::Noop, _) => Ok(Arc::new(NoopAuditSink)),
        (AuditSinkKind::File, Some(path)) => {
            let sink = FileAuditSink::new(Path::new(path))
                .map_err(|err| ServerError::Init(format!("audit log open failed: {err}")))?;
            Ok(Arc::new(sink))
        }
        (AuditSinkKind::File, None) => {
            Err(ServerError::Config("file audit sink requires path".to_string()))
        }
    }
}

/// Builds the watcher notifier selected by configuration.
fn build_notifier(dispatch: &DispatchConfig) -> Result<Arc<dyn Notifier>, ServerError> {
    match dispatch.transport {
        DispatchTransport::Webhook => {
            let notifier = WebhookNotifier::new(dispatch.delivery_timeout())
                .map_err(|err| ServerError::Init(err.to_string()))?;
            Ok(Arc::new(notifier))
        }
        DispatchTransport::Log => Ok(Arc::new(LogNotifier::stderr())),
    }
}

/// Maps dispatch configuration onto dispatcher timings.
fn dispatcher_config(dispatch: &DispatchConfig) -> DispatcherConfig {
    DispatcherConfig {
        delivery_timeout: dispatch.delivery_timeout(),
        signal_lease: dispatch.signal_lease(),
        poll_interval: dispatch.poll_interval(),
        shutdown_grace: dispatch.shutdown_grace(),
        sweep_interval: dispatch.sweep_interval(),
    }
}

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Ledgerline server errors.
#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    /// Configuration errors.
    #[error("config error: {0}")]
    Config(String),
    /// Initialization errors.
    #[error("init error: {0}")]
    Init(String),
    /// Transport errors.
    #[error("transport error: {0}")]
    Transport(String),
}
