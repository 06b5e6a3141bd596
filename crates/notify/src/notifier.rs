//! Fans notifications out to every registered receiver.

use std::sync::{Arc, RwLock};

use monster_core::Notification;
use monster_rules::{ReceiverDocument, SourceRegistry};
use tracing::{debug, warn};

use crate::traits::Receive;

/// Broadcasts a notification to every currently-registered receiver.
///
/// Receivers come from two places: the hot-reloaded receiver registry
/// (plug-in files) and receivers registered in-process by identity. Delivery
/// is synchronous, in registry order then registration order; a failing
/// receiver is logged and skipped.
pub struct Notifier {
    registry: Option<Arc<SourceRegistry<ReceiverDocument>>>,
    direct: RwLock<Vec<Arc<dyn Receive>>>,
}

impl Notifier {
    /// A notifier fed by the receiver plug-in registry.
    pub fn new(registry: Arc<SourceRegistry<ReceiverDocument>>) -> Self {
        Self {
            registry: Some(registry),
            direct: RwLock::new(Vec::new()),
        }
    }

    /// A notifier with only in-process receivers.
    pub fn empty() -> Self {
        Self {
            registry: None,
            direct: RwLock::new(Vec::new()),
        }
    }

    /// Register an in-process receiver.
    pub fn register(&self, receiver: Arc<dyn Receive>) {
        self.direct.write().expect("receiver list poisoned").push(receiver);
    }

    /// Deliver `notification` to every receiver, best-effort.
    pub fn broadcast(&self, notification: &Notification) {
        let mut delivered = 0usize;

        if let Some(registry) = &self.registry {
            for doc in registry.snapshot() {
                self.deliver(doc.as_ref(), notification);
                delivered += 1;
            }
        }
        for receiver in self.direct.read().expect("receiver list poisoned").iter() {
            self.deliver(receiver.as_ref(), notification);
            delivered += 1;
        }

        debug!(topic = %notification.topic, receivers = delivered, "broadcast notification");
    }

    fn deliver(&self, receiver: &dyn Receive, notification: &Notification) {
        if let Err(e) = receiver.receive(notification) {
            warn!(
                receiver = receiver.name(),
                topic = %notification.topic,
                error = %e,
                "notification delivery failed"
            );
        }
    }
}
