// ledgerline-broker/src/lib.rs
// ============================================================================
// Module: Ledgerline Broker Library
// Description: Watcher notifiers and the notification dispatcher loop.
// Purpose: Deliver change notices to trailing watchers with at-least-once semantics.
// Dependencies: ledgerline-core, reqwest, tokio
// ============================================================================

//! ## Overview
//! Ledgerline Broker provides ready-made [`Notifier`] implementations plus the
//! [`NotificationDispatcher`] that drains the change-signal queue and fans
//! deliveries out to trailing watchers.
//! Invariants:
//! - A signal is acknowledged only after every delivery attempt has joined.
//! - A watcher cursor advances only after a successful delivery.
//! - A failing cycle never stops the dispatch loop.

// ============================================================================
// SECTION: Modules
// ============================================================================

pub mod dispatcher;
pub mod notifier;

// ============================================================================
// SECTION: Re-Exports
// ============================================================================

pub use dispatcher::CycleReport;
pub use dispatcher::DispatchError;
pub use dispatcher::DispatcherConfig;
pub use dispatcher::DispatcherHandle;
pub use dispatcher::NotificationDispatcher;
pub use dispatcher::SweepReport;
pub use notifier::CallbackNotifier;
pub use notifier::ChannelNotifier;
pub use notifier::Delivery;
pub use notifier::LogNotifier;
pub use notifier::Notifier;
pub use notifier::SinkError;
pub use notifier::WebhookNotifier;
