//! Notification broadcast to registered receivers.
//!
//! The [`Notifier`] fans a [`monster_core::Notification`] out to every
//! receiver currently registered: hot-reloaded receiver documents from the
//! plug-in registry plus any receivers registered in-process. Delivery is
//! best-effort and synchronous in the caller's thread; one failing receiver
//! never blocks the rest.

mod notifier;
mod receivers;
mod traits;

pub use notifier::Notifier;
pub use traits::{Receive, ReceiveError};
