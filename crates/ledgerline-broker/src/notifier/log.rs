// ledgerline-broker/src/notifier/log.rs
// ============================================================================
// Module: Log Notifier
// Description: Writes deliveries as JSON lines.
// Purpose: Provide a transport for local runs without watcher endpoints.
// Dependencies: serde_json
// ============================================================================

//! ## Overview
//! [`LogNotifier`] serializes each [`Delivery`] as one JSON line into a
//! writer. Write failures are delivery failures.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::io;
use std::io::Write;
use std::sync::Mutex;

use async_trait::async_trait;

use crate::notifier::Delivery;
use crate::notifier::Notifier;
use crate::notifier::SinkError;

// ============================================================================
// SECTION: Log Notifier
// ============================================================================

/// Notifier that records deliveries as JSON lines.
pub struct LogNotifier {
    /// Output writer.
    writer: Mutex<Box<dyn Write + Send>>,
}

impl LogNotifier {
    /// Creates a notifier writing to `writer`.
    #[must_use]
    pub fn new<W>(writer: W) -> Self
    where
        W: Write + Send + 'static,
    {
        Self {
            writer: Mutex::new(Box::new(writer)),
        }
    }

    /// Creates a notifier writing to stderr.
    #[must_use]
    pub fn stderr() -> Self {
        Self::new(io::stderr())
    }
}

#[async_trait]
impl Notifier for LogNotifier {
    async fn notify(&self, delivery: &Delivery) -> Result<(), SinkError> {
        let mut line = serde_json::to_vec(delivery)
            .map_err(|err| SinkError::LogWriteFailed(err.to_string()))?;
        line.push(b'\n');
        let mut writer = self
            .writer
            .lock()
            .map_err(|_| SinkError::LogWriteFailed("log writer poisoned".to_string()))?;
        writer.write_all(&line).map_err(|err| SinkError::LogWriteFailed(err.to_string()))?;
        writer.flush().map_err(|err| SinkError::LogWriteFailed(err.to_string()))
    }
}
