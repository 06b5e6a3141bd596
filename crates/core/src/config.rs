use std::env;
use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Load .env file (silently ignores if missing).
pub fn load_dotenv() {
    dotenvy::dotenv().ok();
}

fn env_or(key: &str, default: &str) -> String {
    env::var(key).unwrap_or_else(|_| default.to_string())
}

fn env_u16(key: &str, default: u16) -> u16 {
    env::var(key).ok().and_then(|v| v.parse().ok()).unwrap_or(default)
}

fn env_u64(key: &str, default: u64) -> u64 {
    env::var(key).ok().and_then(|v| v.parse().ok()).unwrap_or(default)
}

fn env_usize(key: &str, default: usize) -> usize {
    env::var(key).ok().and_then(|v| v.parse().ok()).unwrap_or(default)
}

fn env_bool(key: &str, default: bool) -> bool {
    env::var(key)
        .map(|v| v == "true" || v == "1")
        .unwrap_or(default)
}

// ── Top-level config ──────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub server: ServerConfig,
    pub store: StoreConfig,
    pub sources: SourcesConfig,
    pub processor: ProcessorConfig,
}

impl Config {
    /// Build config from environment variables (call `load_dotenv()` first).
    pub fn from_env() -> Self {
        Self {
            server: ServerConfig::from_env(),
            store: StoreConfig::from_env(),
            sources: SourcesConfig::from_env(),
            processor: ProcessorConfig::from_env(),
        }
    }

    /// Print a summary for startup logs.
    pub fn log_summary(&self) {
        tracing::info!("Config loaded:");
        tracing::info!("  server:    {}:{}", self.server.host, self.server.port);
        tracing::info!("  store:     data_dir={}, retry={}", self.store.data_dir.display(), self.store.retry);
        tracing::info!(
            "  sources:   rules={}, loaders={}, receivers={}",
            self.sources.rules_dir.display(),
            self.sources.loaders_dir.display(),
            self.sources.receivers_dir.display()
        );
        tracing::info!(
            "  processor: workers={}, dequeue_timeout={}ms",
            self.processor.workers,
            self.processor.dequeue_timeout.as_millis()
        );
    }
}

// ── Server ────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

impl ServerConfig {
    fn from_env() -> Self {
        Self {
            host: env_or("MONSTER_HOST", "0.0.0.0"),
            port: env_u16("MONSTER_PORT", 5000),
        }
    }
}

// ── Cookie store ──────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreConfig {
    /// Root directory for persisted cookie documents.
    pub data_dir: PathBuf,
    /// Unbounded retry on transient store errors. Off by default in debug
    /// builds so real errors surface during development.
    pub retry: bool,
}

impl StoreConfig {
    fn from_env() -> Self {
        Self {
            data_dir: PathBuf::from(env_or("MONSTER_DATA_DIR", "data/cookies")),
            retry: env_bool("MONSTER_STORE_RETRY", !cfg!(debug_assertions)),
        }
    }
}

// ── Plug-in sources ───────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourcesConfig {
    pub rules_dir: PathBuf,
    pub loaders_dir: PathBuf,
    pub receivers_dir: PathBuf,
}

impl SourcesConfig {
    fn from_env() -> Self {
        Self {
            rules_dir: PathBuf::from(env_or("MONSTER_RULES_DIR", "plugins/rules")),
            loaders_dir: PathBuf::from(env_or("MONSTER_LOADERS_DIR", "plugins/loaders")),
            receivers_dir: PathBuf::from(env_or("MONSTER_RECEIVERS_DIR", "plugins/receivers")),
        }
    }
}

// ── Processor ─────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProcessorConfig {
    /// Number of worker threads draining the dirty queue.
    pub workers: usize,
    /// How long a worker blocks on an empty queue before a benign wakeup.
    /// Bounds shutdown latency.
    #[serde(with = "duration_millis")]
    pub dequeue_timeout: Duration,
}

impl ProcessorConfig {
    fn from_env() -> Self {
        Self {
            workers: env_usize("MONSTER_WORKERS", 16).max(1),
            dequeue_timeout: Duration::from_millis(env_u64("MONSTER_DEQUEUE_TIMEOUT_MS", 500)),
        }
    }
}

mod duration_millis {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_u64(d.as_millis() as u64)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
        Ok(Duration::from_millis(u64::deserialize(d)?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_without_env() {
        // Only asserts keys unlikely to be set in a test environment.
        let config = Config::from_env();
        assert!(config.processor.workers >= 1);
        assert!(config.processor.dequeue_timeout >= Duration::from_millis(1));
    }

    #[test]
    fn workers_never_zero() {
        std::env::set_var("MONSTER_WORKERS", "0");
        let config = ProcessorConfig::from_env();
        std::env::remove_var("MONSTER_WORKERS");
        assert_eq!(config.workers, 1);
    }
}
