use crate::store::StoreError;

/// Errors surfaced by [`crate::CookieJar`] operations.
#[derive(Debug, thiserror::Error)]
pub enum JarError {
    /// The object has no durable document.
    #[error("cookie not found: {id}")]
    NotFound { id: String },

    /// A release was attempted for an id no worker holds.
    #[error("cookie not reserved: {id}")]
    NotReserved { id: String },

    /// A non-retried backing store error.
    #[error(transparent)]
    Store(#[from] StoreError),
}
