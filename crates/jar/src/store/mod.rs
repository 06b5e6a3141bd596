//! Durable cookie storage behind the jar.
//!
//! The jar only sees this trait; the document database wire protocol is the
//! backend's business. Writes use optimistic concurrency: a caller passes back
//! the revision it read and the store rejects the write with
//! [`StoreError::Conflict`] if someone else committed in between.

mod fs;
mod memory;

pub use fs::FsCookieStore;
pub use memory::InMemoryCookieStore;

use monster_core::{Cookie, Enrichment, ProcessingState};
use serde::{Deserialize, Serialize};

/// Errors from a cookie store backend.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("document not found: {id}")]
    NotFound { id: String },

    #[error("revision conflict on {id}: wrote against {expected}, store has {found}")]
    Conflict { id: String, expected: u64, found: u64 },

    /// Transport-level failure; retried by the jar's retry policy.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("corrupt document for {id}: {reason}")]
    Corrupt { id: String, reason: String },
}

impl StoreError {
    /// Whether the jar's unbounded retry policy should keep trying.
    /// Domain errors (not-found, conflict, corrupt documents) surface to the
    /// caller instead.
    pub fn is_transient(&self) -> bool {
        matches!(self, StoreError::Io(_))
    }
}

/// The persisted per-object document.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoredCookie {
    pub id: String,
    #[serde(default)]
    pub enrichments: Vec<Enrichment>,
    pub processing_state: ProcessingState,
    /// Monotonic revision maintained by the store. `0` means "not yet
    /// persisted"; a successful put returns the committed revision.
    #[serde(default)]
    pub revision: u64,
}

impl StoredCookie {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            enrichments: Vec::new(),
            processing_state: ProcessingState::Dirty,
            revision: 0,
        }
    }

    pub fn into_cookie(self) -> Cookie {
        Cookie {
            identifier: self.id,
            enrichments: self.enrichments,
        }
    }
}

/// A document store for cookies.
///
/// Implementations must be safe for concurrent use; the jar additionally
/// serializes same-id writers through its per-object lock table.
pub trait CookieStore: Send + Sync {
    /// Read a document. Absence is `Ok(None)`, not an error.
    fn get(&self, id: &str) -> Result<Option<StoredCookie>, StoreError>;

    /// Commit a document. `doc.revision` must equal the currently stored
    /// revision (0 for a new document); returns the committed revision.
    fn put(&self, doc: &StoredCookie) -> Result<u64, StoreError>;

    /// Remove a document. Absence is [`StoreError::NotFound`].
    fn delete(&self, id: &str) -> Result<(), StoreError>;

    /// All known ids with their persisted processing state (boot recovery).
    fn scan(&self) -> Result<Vec<(String, ProcessingState)>, StoreError>;

    /// Stamp a document's processing state, last writer wins. A no-op for
    /// unknown ids.
    fn set_state(&self, id: &str, state: ProcessingState) -> Result<(), StoreError>;
}
