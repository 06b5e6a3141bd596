//! Wires the jar, registries, notifier, and worker pool together.

use std::sync::Arc;

use monster_core::Config;
use monster_jar::store::FsCookieStore;
use monster_jar::{CookieJar, RetryPolicy};
use monster_notify::Notifier;
use monster_processor::{ManagerConfig, ProcessorManager};
use monster_rules::{FilePattern, LoaderDocument, ReceiverDocument, RuleDocument, SourceRegistry};

use crate::state::AppState;

/// Build all components and start the worker pool.
pub fn build_app_state(config: &Config) -> anyhow::Result<Arc<AppState>> {
    let store = Arc::new(FsCookieStore::open(&config.store.data_dir)?);
    let retry = if config.store.retry {
        RetryPolicy::default()
    } else {
        RetryPolicy::disabled()
    };
    let jar = Arc::new(CookieJar::open(store, retry)?);

    let mut rules = SourceRegistry::<RuleDocument>::new(config.sources.rules_dir.clone(), FilePattern::dot_suffix("rule"));
    rules.start()?;
    let mut loaders =
        SourceRegistry::<LoaderDocument>::new(config.sources.loaders_dir.clone(), FilePattern::dot_suffix("loader"));
    loaders.start()?;
    let mut receivers = SourceRegistry::<ReceiverDocument>::new(
        config.sources.receivers_dir.clone(),
        FilePattern::dot_suffix("receiver"),
    );
    receivers.start()?;

    let notifier = Arc::new(Notifier::new(Arc::new(receivers)));

    let manager = ProcessorManager::start(
        Arc::clone(&jar),
        Arc::new(rules),
        Arc::new(loaders),
        notifier,
        ManagerConfig::from(&config.processor),
    );

    Ok(Arc::new(AppState { jar, manager }))
}
