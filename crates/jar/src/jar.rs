//! The [`CookieJar`] itself.

use std::sync::{Arc, Condvar, Mutex};
use std::time::{Duration, Instant};

use monster_core::{Cookie, Enrichment, ProcessingState};
use tracing::{debug, info, warn};

use crate::error::JarError;
use crate::listeners::{Listener, ListenerHub};
use crate::lock_table::LockTable;
use crate::queue::{DirtyOutcome, QueueState};
use crate::retry::RetryPolicy;
use crate::store::{CookieStore, StoreError, StoredCookie};

/// Knowledge store plus dirty queue.
///
/// Durable state lives in the backing [`CookieStore`]; queue membership
/// (`dirty`, `in_flight`, `redirty`) is in-memory and rebuilt on boot from
/// each document's persisted `processing_state`.
pub struct CookieJar {
    store: Arc<dyn CookieStore>,
    retry: RetryPolicy,
    locks: LockTable,
    state: Mutex<QueueState>,
    available: Condvar,
    listeners: ListenerHub,
}

impl CookieJar {
    /// Open a jar over `store`, seeding the dirty queue with every object
    /// whose persisted state is not complete (crash recovery).
    pub fn open(store: Arc<dyn CookieStore>, retry: RetryPolicy) -> Result<Self, JarError> {
        let jar = Self {
            store,
            retry,
            locks: LockTable::new(),
            state: Mutex::new(QueueState::default()),
            available: Condvar::new(),
            listeners: ListenerHub::new(),
        };

        let mut unprocessed: Vec<String> = jar
            .retry
            .run("scan", || jar.store.scan())?
            .into_iter()
            .filter(|(_, state)| *state != ProcessingState::Complete)
            .map(|(id, _)| id)
            .collect();
        unprocessed.sort();

        if !unprocessed.is_empty() {
            info!(count = unprocessed.len(), "recovered unprocessed cookies into the dirty queue");
            for id in unprocessed {
                jar.mark_dirty(&id);
            }
        }

        Ok(jar)
    }

    // ── Durable knowledge ─────────────────────────────────────

    /// Append an enrichment and queue the object for (re)processing.
    pub fn enrich(&self, id: &str, enrichment: Enrichment) -> Result<(), JarError> {
        self.append(id, enrichment, Some(ProcessingState::Dirty))?;
        self.mark_dirty(id);
        Ok(())
    }

    /// Append an enrichment without queueing, for internally generated
    /// records (rule-application logs) that must not trigger reprocessing.
    pub fn append_quietly(&self, id: &str, enrichment: Enrichment) -> Result<(), JarError> {
        self.append(id, enrichment, None)
    }

    /// Read the full durable log. Pure; `None` when the object is unknown.
    pub fn fetch(&self, id: &str) -> Result<Option<Cookie>, JarError> {
        let doc = self.retry.run("fetch", || self.store.get(id))?;
        Ok(doc.map(StoredCookie::into_cookie))
    }

    /// Remove the durable log and any queue membership. A reservation held by
    /// a worker stays with that worker; its next `fetch` sees absence.
    pub fn delete(&self, id: &str) -> Result<(), JarError> {
        self.state.lock().expect("jar state poisoned").forget(id);
        self.locks
            .with_lock(id, || self.retry.run("delete", || self.store.delete(id)))
            .map_err(|e| match e {
                StoreError::NotFound { id } => JarError::NotFound { id },
                other => JarError::Store(other),
            })?;
        debug!(id = %id, "deleted cookie");
        Ok(())
    }

    /// Serialize an append through the per-object lock with optimistic
    /// concurrency: a conflicting committer just means re-reading and
    /// re-appending.
    fn append(&self, id: &str, enrichment: Enrichment, state: Option<ProcessingState>) -> Result<(), JarError> {
        self.locks.with_lock(id, || {
            self.retry.run("append", || loop {
                let mut doc = self
                    .store
                    .get(id)?
                    .unwrap_or_else(|| StoredCookie::new(id));
                doc.enrichments.push(enrichment.clone());
                if let Some(state) = state {
                    doc.processing_state = state;
                }
                match self.store.put(&doc) {
                    Ok(_) => return Ok(()),
                    Err(StoreError::Conflict { .. }) => continue,
                    Err(e) => return Err(e),
                }
            })
        })?;
        Ok(())
    }

    // ── Dirty queue ───────────────────────────────────────────

    /// Queue the object for processing. A no-op if already waiting; if the
    /// object is reserved it is re-queued when the reservation is released.
    pub fn mark_dirty(&self, id: &str) {
        let outcome = {
            let mut state = self.state.lock().expect("jar state poisoned");
            let outcome = state.mark_dirty(id);
            if outcome == DirtyOutcome::Queued {
                // Listeners fire strictly after the dirty set is updated, and
                // in mark_dirty order: the emit happens under the queue lock.
                self.available.notify_one();
                self.listeners.emit(id);
            }
            outcome
        };

        match outcome {
            DirtyOutcome::Queued | DirtyOutcome::Redirtied => {
                self.stamp_state(id, ProcessingState::Dirty);
            }
            DirtyOutcome::AlreadyQueued => {}
        }
    }

    /// Block until an object is available (or the timeout elapses), reserving
    /// it for the caller. FIFO by the `mark_dirty` that queued each id.
    ///
    /// `None` is a benign wakeup: the timeout elapsed or the waiter set was
    /// broadcast (e.g. during shutdown); callers just try again.
    pub fn next_for_processing(&self, timeout: Option<Duration>) -> Option<String> {
        let deadline = timeout.map(|t| Instant::now() + t);
        let mut state = self.state.lock().expect("jar state poisoned");
        loop {
            if let Some(id) = state.reserve() {
                drop(state);
                self.stamp_state(&id, ProcessingState::InFlight);
                return Some(id);
            }
            match deadline {
                Some(deadline) => {
                    let now = Instant::now();
                    if now >= deadline {
                        return None;
                    }
                    let (guard, _) = self
                        .available
                        .wait_timeout(state, deadline - now)
                        .expect("jar state poisoned");
                    state = guard;
                }
                None => {
                    state = self.available.wait(state).expect("jar state poisoned");
                }
            }
        }
    }

    /// Release a reservation after successful processing. A redirty recorded
    /// while in flight moves the id back into `dirty` in the same transition.
    pub fn mark_complete(&self, id: &str) -> Result<(), JarError> {
        self.release(id, false)
    }

    /// Release a reservation after failed processing, optionally re-queueing
    /// the object for another attempt.
    pub fn mark_failed(&self, id: &str, requeue: bool) -> Result<(), JarError> {
        self.release(id, requeue)
    }

    fn release(&self, id: &str, requeue: bool) -> Result<(), JarError> {
        let requeued = {
            let mut state = self.state.lock().expect("jar state poisoned");
            let was_redirtied = state
                .release(id)
                .map_err(|()| JarError::NotReserved { id: id.to_string() })?;
            if was_redirtied || requeue {
                if state.mark_dirty(id) == DirtyOutcome::Queued {
                    self.available.notify_one();
                    self.listeners.emit(id);
                }
                true
            } else {
                false
            }
        };

        if requeued {
            self.stamp_state(id, ProcessingState::Dirty);
        } else {
            self.stamp_state(id, ProcessingState::Complete);
        }
        Ok(())
    }

    /// `(dirty, in_flight)` counts.
    pub fn length(&self) -> (usize, usize) {
        self.state.lock().expect("jar state poisoned").counts()
    }

    /// Total queue occupancy: waiting plus reserved.
    pub fn queue_length(&self) -> usize {
        let (dirty, in_flight) = self.length();
        dirty + in_flight
    }

    /// Register a callback invoked (on the jar's listener thread) after every
    /// transition of an id into `dirty`.
    pub fn add_listener(&self, listener: Listener) {
        self.listeners.add(listener);
    }

    /// Wake every blocked `next_for_processing` caller.
    pub fn signal_waiters(&self) {
        self.available.notify_all();
    }

    /// Best-effort crash-recovery stamp; failures are logged, never surfaced.
    fn stamp_state(&self, id: &str, state: ProcessingState) {
        if let Err(e) = self.store.set_state(id, state) {
            warn!(id = %id, ?state, error = %e, "failed to stamp processing state");
        }
    }
}
