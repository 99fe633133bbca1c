// ledgerline-broker/src/notifier/webhook.rs
// ============================================================================
// Module: Webhook Notifier
// Description: HTTP POST delivery of change notices.
// Purpose: Notify watcher endpoints over HTTP.
// Dependencies: reqwest
// ============================================================================

//! ## Overview
//! [`WebhookNotifier`] POSTs `{"entity": <entity>}` as JSON to the watcher
//! URL. Any 2xx status is success; every other status, connection failure,
//! or client timeout is a failed delivery. Redirects are not followed.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use reqwest::redirect::Policy;

use crate::notifier::Delivery;
use crate::notifier::Notifier;
use crate::notifier::SinkError;

// ============================================================================
// SECTION: Webhook Notifier
// ============================================================================

/// Notifier that POSTs change notices to watcher URLs.
#[derive(Debug, Clone)]
pub struct WebhookNotifier {
    /// HTTP client configured with timeouts.
    client: Client,
}

impl WebhookNotifier {
    /// Builds a webhook notifier whose requests time out after `timeout`.
    ///
    /// # Errors
    ///
    /// Returns [`SinkError::Setup`] when the HTTP client cannot be built.
    pub fn new(timeout: Duration) -> Result<Self, SinkError> {
        let client = Client::builder()
            .connect_timeout(timeout)
            .timeout(timeout)
            .redirect(Policy::none())
            .build()
            .map_err(|err| SinkError::Setup(err.to_string()))?;
        Ok(Self {
            client,
        })
    }
}

#[async_trait]
impl Notifier for WebhookNotifier {
    async fn notify(&self, delivery: &Delivery) -> Result<(), SinkError> {
        let response = self
            .client
            .post(delivery.url.as_str())
            .json(&delivery.notice())
            .send()
            .await
            .map_err(|err| SinkError::DeliveryFailed(err.to_string()))?;
        let status = response.status();
        if !status.is_success() {
            return Err(SinkError::DeliveryFailed(format!("http status {status}")));
        }
        Ok(())
    }
}
