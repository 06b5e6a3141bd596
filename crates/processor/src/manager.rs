//! The worker pool draining the jar's dirty queue.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use chrono::{DateTime, Utc};
use monster_core::config::ProcessorConfig;
use monster_jar::{CookieJar, JarError};
use monster_notify::Notifier;
use monster_rules::{LoaderDocument, RuleDocument, SourceRegistry};
use serde::Serialize;
use tracing::{debug, error, info};

use crate::processor::{Outcome, Processor};

/// Worker pool sizing and dequeue behaviour.
#[derive(Debug, Clone)]
pub struct ManagerConfig {
    pub workers: usize,
    /// Benign-wakeup period for blocked workers; bounds `stop()` latency.
    pub dequeue_timeout: Duration,
}

impl Default for ManagerConfig {
    fn default() -> Self {
        Self {
            workers: 16,
            dequeue_timeout: Duration::from_millis(500),
        }
    }
}

impl From<&ProcessorConfig> for ManagerConfig {
    fn from(config: &ProcessorConfig) -> Self {
        Self {
            workers: config.workers,
            dequeue_timeout: config.dequeue_timeout,
        }
    }
}

/// What a worker is doing right now.
#[derive(Debug, Clone)]
enum WorkerStatus {
    Idle,
    AwaitingCookie,
    Processing { id: String, since: DateTime<Utc> },
}

struct WorkerState {
    status: WorkerStatus,
    last_cookie: Option<String>,
}

/// Snapshot of one worker for `/debug/threads`.
#[derive(Debug, Clone, Serialize)]
pub struct WorkerDump {
    pub worker_id: usize,
    pub state: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cookie: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub since: Option<DateTime<Utc>>,
    pub last_cookie: Option<String>,
    pub stack_sketch: Vec<&'static str>,
}

struct ManagerInner {
    jar: Arc<CookieJar>,
    rules: Arc<SourceRegistry<RuleDocument>>,
    loaders: Arc<SourceRegistry<LoaderDocument>>,
    notifier: Arc<Notifier>,
    dequeue_timeout: Duration,
    shutdown: AtomicBool,
    /// Gauge: workers currently blocked waiting for a cookie.
    awaiting: AtomicUsize,
    workers: Vec<Mutex<WorkerState>>,
}

impl ManagerInner {
    fn set_status(&self, index: usize, status: WorkerStatus) {
        self.workers[index].lock().expect("worker state poisoned").status = status;
    }

    fn record_processed(&self, index: usize, id: &str) {
        let mut state = self.workers[index].lock().expect("worker state poisoned");
        state.last_cookie = Some(id.to_string());
        state.status = WorkerStatus::Idle;
    }
}

/// Coordinates N worker threads against the jar's dirty queue.
///
/// The manager's jar listener only signals the jar's waiter set; all real
/// work happens on the worker threads. Shutdown is cooperative: workers
/// finish their current cookie before exiting.
pub struct ProcessorManager {
    inner: Arc<ManagerInner>,
    handles: Mutex<Vec<JoinHandle<()>>>,
}

impl ProcessorManager {
    /// Spawn the worker pool and hook the manager's listener onto the jar.
    pub fn start(
        jar: Arc<CookieJar>,
        rules: Arc<SourceRegistry<RuleDocument>>,
        loaders: Arc<SourceRegistry<LoaderDocument>>,
        notifier: Arc<Notifier>,
        config: ManagerConfig,
    ) -> Arc<Self> {
        let worker_count = config.workers.max(1);
        let workers = (0..worker_count)
            .map(|_| {
                Mutex::new(WorkerState {
                    status: WorkerStatus::Idle,
                    last_cookie: None,
                })
            })
            .collect();

        let inner = Arc::new(ManagerInner {
            jar: Arc::clone(&jar),
            rules,
            loaders,
            notifier,
            dequeue_timeout: config.dequeue_timeout,
            shutdown: AtomicBool::new(false),
            awaiting: AtomicUsize::new(0),
            workers,
        });

        // Wake workers promptly on every dirty transition. No work happens on
        // the producer side of this callback. Weak, or the jar would hold a
        // listener that holds the jar.
        let waker = Arc::downgrade(&jar);
        jar.add_listener(Box::new(move |_id| {
            if let Some(jar) = waker.upgrade() {
                jar.signal_waiters();
            }
        }));

        let mut handles = Vec::with_capacity(worker_count);
        for index in 0..worker_count {
            let inner = Arc::clone(&inner);
            let handle = thread::Builder::new()
                .name(format!("worker-{index}"))
                .spawn(move || worker_loop(inner, index))
                .expect("failed to spawn worker thread");
            handles.push(handle);
        }
        info!(workers = worker_count, "processor manager started");

        Arc::new(Self {
            inner,
            handles: Mutex::new(handles),
        })
    }

    /// Cooperative shutdown: flag, broadcast the jar's waiters, join.
    pub fn stop(&self) {
        self.inner.shutdown.store(true, Ordering::SeqCst);
        self.inner.jar.signal_waiters();
        let handles: Vec<_> = self.handles.lock().expect("handle list poisoned").drain(..).collect();
        for handle in handles {
            let _ = handle.join();
        }
        info!("processor manager stopped");
    }

    /// Per-worker state for debug introspection.
    pub fn dump_workers(&self) -> Vec<WorkerDump> {
        self.inner
            .workers
            .iter()
            .enumerate()
            .map(|(worker_id, state)| {
                let state = state.lock().expect("worker state poisoned");
                let (label, cookie, since, stack_sketch) = match &state.status {
                    WorkerStatus::Idle => ("idle", None, None, vec![]),
                    WorkerStatus::AwaitingCookie => (
                        "awaiting_cookie",
                        None,
                        None,
                        vec!["cookie_jar::next_for_processing"],
                    ),
                    WorkerStatus::Processing { id, since } => (
                        "processing",
                        Some(id.clone()),
                        Some(*since),
                        vec!["cookie_jar::fetch", "processor::process"],
                    ),
                };
                WorkerDump {
                    worker_id,
                    state: label,
                    cookie,
                    since,
                    last_cookie: state.last_cookie.clone(),
                    stack_sketch,
                }
            })
            .collect()
    }

    /// How many workers are currently blocked waiting for a cookie.
    pub fn awaiting_cookie(&self) -> usize {
        self.inner.awaiting.load(Ordering::SeqCst)
    }
}

fn worker_loop(inner: Arc<ManagerInner>, index: usize) {
    debug!(worker = index, "worker started");
    while !inner.shutdown.load(Ordering::SeqCst) {
        inner.set_status(index, WorkerStatus::AwaitingCookie);
        inner.awaiting.fetch_add(1, Ordering::SeqCst);
        let next = inner.jar.next_for_processing(Some(inner.dequeue_timeout));
        inner.awaiting.fetch_sub(1, Ordering::SeqCst);

        let Some(id) = next else {
            // Benign wakeup: timeout or shutdown broadcast.
            inner.set_status(index, WorkerStatus::Idle);
            continue;
        };

        inner.set_status(
            index,
            WorkerStatus::Processing {
                id: id.clone(),
                since: Utc::now(),
            },
        );

        if let Err(e) = process_one(&inner, &id) {
            error!(worker = index, cookie = %id, error = %e, "processing failed, requeueing");
            if let Err(e) = inner.jar.mark_failed(&id, true) {
                error!(worker = index, cookie = %id, error = %e, "failed to release reservation");
            }
        }

        inner.record_processed(index, &id);
    }
    debug!(worker = index, "worker stopped");
}

/// One reservation's worth of work. Any error propagates to the worker loop,
/// which requeues the cookie.
fn process_one(inner: &ManagerInner, id: &str) -> Result<(), JarError> {
    let Some(mut cookie) = inner.jar.fetch(id)? else {
        // Deleted while queued or in flight; nothing left to do.
        debug!(cookie = %id, "reserved cookie is gone");
        return inner.jar.mark_complete(id);
    };

    let rules = inner.rules.snapshot();
    let loaders = inner.loaders.snapshot();
    let processor = Processor::new(&inner.jar, &inner.notifier, &rules, &loaders);
    let outcome = processor.process(&mut cookie)?;

    match &outcome {
        Outcome::Completed => debug!(cookie = %id, "pass terminated by rule"),
        Outcome::NeedsEnrichment { loader_id } => {
            // The loader's append already re-dirtied the id; releasing the
            // reservation promotes it back into the queue.
            debug!(cookie = %id, loader = %loader_id, "pass enriched, will reprocess")
        }
        Outcome::Unprocessable => debug!(cookie = %id, "pass exhausted rules and loaders"),
    }

    inner.jar.mark_complete(id)
}
