//! YAML document schema for plug-in items.
//!
//! Every plug-in file holds one or more YAML documents sharing the
//! `apiVersion` / `kind` / `metadata` envelope. Parsing is two-pass: the
//! envelope is read first to check the `kind`, then the full document is
//! deserialized into the kind-specific type.

mod envelope;
mod loader;
mod metadata;
mod predicate;
mod receiver;
mod rule;

pub use envelope::SourceEnvelope;
pub use loader::{EnrichmentSpec, LoaderDocument};
pub use metadata::ItemMetadata;
pub use predicate::Predicate;
pub use receiver::{ReceiverDocument, ReceiverKind};
pub use rule::{ActionSpec, NotificationSpec, RuleDocument};

/// A plug-in document a [`crate::registry::SourceRegistry`] can hold.
pub trait SourceItem: Clone + serde::de::DeserializeOwned + Send + Sync + 'static {
    /// Expected envelope `kind` for this item type.
    const KIND: &'static str;
    /// Whether documents of this kind must carry `metadata.id`.
    ///
    /// Items with an id are unique within their registry: re-registering an
    /// id replaces the prior item.
    const REQUIRES_ID: bool;

    fn metadata(&self) -> &ItemMetadata;

    fn id(&self) -> Option<&str> {
        self.metadata().id.as_deref()
    }

    fn priority(&self) -> i64 {
        self.metadata().priority
    }
}
