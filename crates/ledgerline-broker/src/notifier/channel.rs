// ledgerline-broker/src/notifier/channel.rs
// ============================================================================
// Module: Channel Notifier
// Description: Publishes deliveries into an in-process tokio channel.
// Purpose: Stand in for a message broker topic.
// Dependencies: tokio
// ============================================================================

//! ## Overview
//! [`ChannelNotifier`] publishes every delivery to a bounded
//! `tokio::sync::mpsc` channel. A full or closed channel is a failed delivery,
//! so the watcher cursor stays put and the signal is retried later.

// ============================================================================
// SECTION: Imports
// ============================================================================

use async_trait::async_trait;
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;

use crate::notifier::Delivery;
use crate::notifier::Notifier;
use crate::notifier::SinkError;

// ============================================================================
// SECTION: Channel Notifier
// ============================================================================

/// Notifier that publishes deliveries to an mpsc channel.
#[derive(Debug, Clone)]
pub struct ChannelNotifier {
    /// Channel sender.
    sender: mpsc::Sender<Delivery>,
}

impl ChannelNotifier {
    /// Creates a notifier publishing to `sender`.
    #[must_use]
    pub const fn new(sender: mpsc::Sender<Delivery>) -> Self {
        Self {
            sender,
        }
    }
}

#[async_trait]
impl Notifier for ChannelNotifier {
    async fn notify(&self, delivery: &Delivery) -> Result<(), SinkError> {
        self.sender.try_send(delivery.clone()).map_err(|err| match err {
            TrySendError::Full(_) => SinkError::DeliveryFailed("channel full".to_string()),
            TrySendError::Closed(_) => SinkError::DeliveryFailed("channel closed".to_string()),
        })
    }
}
