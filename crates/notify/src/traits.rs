//! Receiver trait definition and shared error types.

use monster_core::Notification;

/// Errors that can occur during notification delivery.
#[derive(Debug, thiserror::Error)]
pub enum ReceiveError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("delivery failed: {0}")]
    Delivery(String),
}

/// A sink for rule-emitted notifications.
///
/// Receivers have no identity requirement; they are registered with the
/// notifier and invoked in registration order.
pub trait Receive: Send + Sync {
    /// Deliver one notification through this receiver.
    fn receive(&self, notification: &Notification) -> Result<(), ReceiveError>;

    /// Human-readable name used in delivery logs.
    fn name(&self) -> &str {
        "receiver"
    }
}
