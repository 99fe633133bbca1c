// ledgerline-broker/src/notifier/callback.rs
// ============================================================================
// Module: Callback Notifier
// Description: Closure-backed notifier for in-process consumers and tests.
// Purpose: Hand deliveries to caller-supplied code.
// Dependencies: async-trait
// ============================================================================

//! ## Overview
//! [`CallbackNotifier`] invokes a synchronous closure per delivery. The
//! closure's result is the delivery outcome.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::sync::Arc;

use async_trait::async_trait;

use crate::notifier::Delivery;
use crate::notifier::Notifier;
use crate::notifier::SinkError;

// ============================================================================
// SECTION: Callback Notifier
// ============================================================================

/// Closure signature accepted by [`CallbackNotifier`].
type Callback = dyn Fn(&Delivery) -> Result<(), SinkError> + Send + Sync;

/// Notifier that delegates each delivery to a closure.
#[derive(Clone)]
pub struct CallbackNotifier {
    /// Delivery handler.
    handler: Arc<Callback>,
}

impl CallbackNotifier {
    /// Creates a notifier from a closure.
    #[must_use]
    pub fn new<F>(handler: F) -> Self
    where
        F: Fn(&Delivery) -> Result<(), SinkError> + Send + Sync + 'static,
    {
        Self {
            handler: Arc::new(handler),
        }
    }
}

#[async_trait]
impl Notifier for CallbackNotifier {
    async fn notify(&self, delivery: &Delivery) -> Result<(), SinkError> {
        (self.handler)(delivery)
    }
}
