//! Per-object lock table.
//!
//! Serializes concurrent writers for the same cookie id. Entry creation, use,
//! and garbage collection are all indivisible with respect to the table
//! mutex: an entry is only removed while the table lock is held and no other
//! clone of it exists, so two holders can never end up locking different
//! mutexes for the same id.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

#[derive(Default)]
pub struct LockTable {
    entries: Mutex<HashMap<String, Arc<Mutex<()>>>>,
}

impl LockTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Run `op` while holding the lock for `id`.
    pub fn with_lock<R>(&self, id: &str, op: impl FnOnce() -> R) -> R {
        let slot = {
            let mut entries = self.entries.lock().expect("lock table poisoned");
            Arc::clone(entries.entry(id.to_string()).or_default())
        };

        let guard = slot.lock().expect("per-object lock poisoned");
        let result = op();
        drop(guard);

        // GC: with the table locked no one can take a new clone, so a strong
        // count of 2 (the map's + ours) proves we were the last holder.
        let mut entries = self.entries.lock().expect("lock table poisoned");
        if let Some(current) = entries.get(id) {
            if Arc::ptr_eq(current, &slot) && Arc::strong_count(current) == 2 {
                entries.remove(id);
            }
        }

        result
    }

    #[cfg(test)]
    fn len(&self) -> usize {
        self.entries.lock().expect("lock table poisoned").len()
    }
}
