use std::sync::Arc;

use monster_jar::CookieJar;
use monster_processor::ProcessorManager;

/// Shared handles for the HTTP handlers.
pub struct AppState {
    pub jar: Arc<CookieJar>,
    pub manager: Arc<ProcessorManager>,
}
