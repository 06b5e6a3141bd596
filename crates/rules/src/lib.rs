//! Plug-in documents and the priority-ordered source registry.
//!
//! Rules, enrichment loaders, and notification receivers are declarative YAML
//! documents discovered in watched directory trees. A [`registry::SourceRegistry`]
//! keeps a live, priority-sorted view of the items registered by each file and
//! hot-swaps a file's items atomically when the file changes.

pub mod evaluator;
pub mod registry;
pub mod schema;

pub use registry::{FilePattern, LoadOutcome, LoadStatus, RegistryError, SourceRegistry};
pub use schema::{
    ActionSpec, EnrichmentSpec, ItemMetadata, LoaderDocument, NotificationSpec, Predicate,
    ReceiverDocument, ReceiverKind, RuleDocument, SourceItem,
};
