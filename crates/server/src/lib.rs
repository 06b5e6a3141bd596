//! HTTP façade over the cookie jar and processor manager.

pub mod api;
pub mod router;
pub mod startup;
pub mod state;

pub use router::build_router;
pub use state::AppState;
