// ledgerline-broker/src/notifier/mod.rs
// ============================================================================
// Module: Ledgerline Notifiers
// Description: Notifier trait and reference transports for watcher delivery.
// Purpose: Tell one watcher that an entity advanced.
// Dependencies: ledgerline-core, async-trait, thiserror
// ============================================================================

//! ## Overview
//! A [`Notifier`] performs one delivery attempt for one trailing watcher.
//! Success is transport-defined: an HTTP 2xx for [`WebhookNotifier`], an
//! accepted send for [`ChannelNotifier`]. Implementations must return an
//! error rather than report success when delivery did not happen, because
//! the dispatcher advances the watcher cursor on `Ok`.

// ============================================================================
// SECTION: Imports
// ============================================================================

use async_trait::async_trait;
use ledgerline_core::ChangeNotice;
use ledgerline_core::EntityId;
use ledgerline_core::Version;
use ledgerline_core::WatcherUrl;
use serde::Serialize;
use thiserror::Error;

// ============================================================================
// SECTION: Sink Errors
// ============================================================================

/// Errors emitted by notifiers.
///
/// # Invariants
/// - Variants are stable for programmatic handling.
#[derive(Debug, Error)]
pub enum SinkError {
    /// Delivery failed or the watcher rejected the notice.
    #[error("delivery failed: {0}")]
    DeliveryFailed(String),
    /// Notifier could not be constructed.
    #[error("notifier setup failed: {0}")]
    Setup(String),
    /// Log notifier failed to write.
    #[error("log write failed: {0}")]
    LogWriteFailed(String),
}

// ============================================================================
// SECTION: Delivery
// ============================================================================

/// One delivery attempt: tell `url` that `entity` reached `version`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Delivery {
    /// Entity that advanced.
    pub entity: EntityId,
    /// Watcher endpoint.
    pub url: WatcherUrl,
    /// Latest version being announced.
    pub version: Version,
}

impl Delivery {
    /// Returns the notice body sent to the watcher.
    #[must_use]
    pub fn notice(&self) -> ChangeNotice {
        ChangeNotice {
            entity: self.entity.clone(),
        }
    }
}

// ============================================================================
// SECTION: Notifier Trait
// ============================================================================

/// Delivers a change notice to one watcher.
#[async_trait]
pub trait Notifier: Send + Sync {
    /// Performs one delivery attempt.
    ///
    /// # Errors
    ///
    /// Returns [`SinkError`] when the watcher was not notified.
    async fn notify(&self, delivery: &Delivery) -> Result<(), SinkError>;
}

// ============================================================================
// SECTION: Implementations
// ============================================================================

pub mod callback;
pub mod channel;
pub mod log;
pub mod webhook;

pub use callback::CallbackNotifier;
pub use channel::ChannelNotifier;
pub use log::LogNotifier;
pub use webhook::WebhookNotifier;
