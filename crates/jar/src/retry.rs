//! Unbounded exponential-backoff retry for transient store errors.

use std::thread;
use std::time::Duration;

use tracing::warn;

use crate::store::StoreError;

/// Retry policy wrapped around every store traversal.
///
/// Transient errors are retried without bound; there is no per-cookie latency
/// SLA to violate. Domain errors (not-found, conflict, corrupt) pass straight
/// through. Use [`RetryPolicy::disabled`] in debug runs to surface real
/// errors.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    pub enabled: bool,
    pub base_delay: Duration,
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            enabled: true,
            base_delay: Duration::from_millis(100),
            max_delay: Duration::from_secs(30),
        }
    }
}

impl RetryPolicy {
    pub fn disabled() -> Self {
        Self {
            enabled: false,
            ..Self::default()
        }
    }

    /// Run `op` until it returns a non-transient result.
    pub fn run<T>(&self, name: &str, mut op: impl FnMut() -> Result<T, StoreError>) -> Result<T, StoreError> {
        let mut delay = self.base_delay;
        let mut attempt: u64 = 0;
        loop {
            match op() {
                Ok(value) => return Ok(value),
                Err(e) if self.enabled && e.is_transient() => {
                    attempt += 1;
                    warn!(op = name, attempt, error = %e, delay_ms = delay.as_millis() as u64, "transient store error, retrying");
                    thread::sleep(delay);
                    delay = (delay * 2).min(self.max_delay);
                }
                Err(e) => return Err(e),
            }
        }
    }
}
