//! Ephemeral dirty-queue state: membership sets and transitions.
//!
//! Pure state machine; the jar wraps it in a mutex/condvar pair and drives
//! listener fan-out around it.

use std::collections::{HashMap, HashSet, VecDeque};

use chrono::{DateTime, Utc};

/// Result of a `mark_dirty` transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum DirtyOutcome {
    /// The id entered `dirty` (and listeners must be told).
    Queued,
    /// Already waiting; FIFO position unchanged.
    AlreadyQueued,
    /// Reserved by a worker; re-queued on release.
    Redirtied,
}

#[derive(Default)]
pub(crate) struct QueueState {
    /// FIFO of ids awaiting processing, ordered by the mark that queued them.
    dirty: VecDeque<String>,
    /// Set view of `dirty` for O(1) membership checks.
    dirty_set: HashSet<String>,
    /// Ids reserved by a worker, with the reservation instant.
    in_flight: HashMap<String, DateTime<Utc>>,
    /// Ids re-marked while reserved; moved into `dirty` on release.
    redirty: HashSet<String>,
}

impl QueueState {
    pub(crate) fn mark_dirty(&mut self, id: &str) -> DirtyOutcome {
        if self.in_flight.contains_key(id) {
            self.redirty.insert(id.to_string());
            return DirtyOutcome::Redirtied;
        }
        if self.dirty_set.contains(id) {
            return DirtyOutcome::AlreadyQueued;
        }
        self.dirty_set.insert(id.to_string());
        self.dirty.push_back(id.to_string());
        DirtyOutcome::Queued
    }

    /// Move the oldest dirty id into `in_flight`.
    pub(crate) fn reserve(&mut self) -> Option<String> {
        let id = self.dirty.pop_front()?;
        self.dirty_set.remove(&id);
        self.in_flight.insert(id.clone(), Utc::now());
        Some(id)
    }

    /// Drop a reservation. `Ok(true)` when the id had been re-dirtied while
    /// in flight (the caller must queue it again).
    pub(crate) fn release(&mut self, id: &str) -> Result<bool, ()> {
        if self.in_flight.remove(id).is_none() {
            return Err(());
        }
        Ok(self.redirty.remove(id))
    }

    /// Forget queue membership on delete. An existing reservation stays with
    /// its holder.
    pub(crate) fn forget(&mut self, id: &str) {
        if self.dirty_set.remove(id) {
            self.dirty.retain(|queued| queued != id);
        }
        self.redirty.remove(id);
    }

    pub(crate) fn counts(&self) -> (usize, usize) {
        (self.dirty.len(), self.in_flight.len())
    }
}
