//! Concurrency and queue-semantics tests for the cookie jar.

use std::io;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::{Duration, Instant};

use chrono::Utc;
use monster_core::{Enrichment, ProcessingState};
use monster_jar::store::{CookieStore, InMemoryCookieStore, StoreError, StoredCookie};
use monster_jar::{CookieJar, RetryPolicy};
use serde_json::Map;

fn enrichment(source: &str) -> Enrichment {
    Enrichment::new(source, Utc::now(), Map::new())
}

fn jar() -> Arc<CookieJar> {
    Arc::new(CookieJar::open(Arc::new(InMemoryCookieStore::new()), RetryPolicy::disabled()).unwrap())
}

fn wait_for(what: &str, condition: impl Fn() -> bool) {
    let deadline = Instant::now() + Duration::from_secs(5);
    while !condition() {
        assert!(Instant::now() < deadline, "timed out waiting for {what}");
        thread::sleep(Duration::from_millis(5));
    }
}

#[test]
fn dequeue_order_is_fifo_by_first_mark() {
    let jar = jar();
    jar.mark_dirty("/a");
    jar.mark_dirty("/b");
    jar.mark_dirty("/c");
    // Re-marking /a must not move it behind /c.
    jar.mark_dirty("/a");
    assert_eq!(jar.length(), (3, 0));

    assert_eq!(jar.next_for_processing(None).as_deref(), Some("/a"));
    assert_eq!(jar.next_for_processing(None).as_deref(), Some("/b"));
    assert_eq!(jar.next_for_processing(None).as_deref(), Some("/c"));
}

#[test]
fn redirty_while_in_flight_requeues_on_completion() {
    let jar = jar();
    jar.enrich("/a", enrichment("seed")).unwrap();
    let id = jar.next_for_processing(None).unwrap();
    assert_eq!(jar.length(), (0, 1));

    // Another producer re-marks while the worker holds the reservation.
    jar.mark_dirty(&id);
    assert_eq!(jar.length(), (0, 1));

    jar.mark_complete(&id).unwrap();
    assert_eq!(jar.length(), (1, 0));
    assert_eq!(jar.next_for_processing(None).as_deref(), Some("/a"));
}

#[test]
fn enrich_while_in_flight_behaves_like_redirty() {
    let jar = jar();
    jar.enrich("/a", enrichment("seed")).unwrap();
    let id = jar.next_for_processing(None).unwrap();

    jar.enrich(&id, enrichment("loader")).unwrap();
    assert_eq!(jar.length(), (0, 1));

    jar.mark_complete(&id).unwrap();
    assert_eq!(jar.length(), (1, 0));
    assert_eq!(jar.fetch("/a").unwrap().unwrap().enrichments.len(), 2);
}

#[test]
fn mark_failed_with_requeue_always_requeues() {
    let jar = jar();
    jar.enrich("/a", enrichment("seed")).unwrap();
    let id = jar.next_for_processing(None).unwrap();
    jar.mark_failed(&id, true).unwrap();
    assert_eq!(jar.length(), (1, 0));

    // Without requeue it behaves like completion.
    let id = jar.next_for_processing(None).unwrap();
    jar.mark_failed(&id, false).unwrap();
    assert_eq!(jar.length(), (0, 0));
}

#[test]
fn concurrent_enriches_all_append() {
    let jar = jar();
    let threads = 8;
    let per_thread = 25;

    let mut handles = Vec::new();
    for t in 0..threads {
        let jar = Arc::clone(&jar);
        handles.push(thread::spawn(move || {
            for i in 0..per_thread {
                jar.enrich("/same", enrichment(&format!("src-{t}-{i}"))).unwrap();
            }
        }));
    }
    for handle in handles {
        handle.join().unwrap();
    }

    let cookie = jar.fetch("/same").unwrap().unwrap();
    assert_eq!(cookie.enrichments.len(), threads * per_thread);
    // All appends landed exactly once.
    let distinct: std::collections::HashSet<_> =
        cookie.enrichments.iter().map(|e| e.source.clone()).collect();
    assert_eq!(distinct.len(), threads * per_thread);
    // Dirty-set semantics: one queue entry no matter how many enriches.
    assert_eq!(jar.length(), (1, 0));
}

#[test]
fn blocked_consumer_is_woken_by_enrich() {
    let jar = jar();
    let consumer = {
        let jar = Arc::clone(&jar);
        thread::spawn(move || jar.next_for_processing(Some(Duration::from_secs(5))))
    };

    thread::sleep(Duration::from_millis(50));
    jar.enrich("/woken", enrichment("seed")).unwrap();

    assert_eq!(consumer.join().unwrap().as_deref(), Some("/woken"));
}

#[test]
fn listeners_fire_after_dirty_is_updated() {
    let jar = jar();
    let observed = Arc::new(Mutex::new(Vec::new()));

    let jar_for_listener = Arc::clone(&jar);
    let observed_clone = Arc::clone(&observed);
    jar.add_listener(Box::new(move |id| {
        // By the time a listener runs the id must already be visible in the
        // queue (it may have been reserved, but never "not yet added").
        let (dirty, in_flight) = jar_for_listener.length();
        observed_clone.lock().unwrap().push((id.to_string(), dirty + in_flight));
    }));

    jar.mark_dirty("/a");
    jar.mark_dirty("/b");

    wait_for("listener callbacks", || observed.lock().unwrap().len() == 2);
    let observed = observed.lock().unwrap();
    assert_eq!(observed[0].0, "/a");
    assert_eq!(observed[1].0, "/b");
    assert!(observed.iter().all(|(_, occupancy)| *occupancy >= 1));
}

#[test]
fn listener_fires_once_per_dirty_transition() {
    let jar = jar();
    let count = Arc::new(AtomicUsize::new(0));
    let count_clone = Arc::clone(&count);
    jar.add_listener(Box::new(move |_| {
        count_clone.fetch_add(1, Ordering::SeqCst);
    }));

    jar.mark_dirty("/a");
    jar.mark_dirty("/a"); // no-op re-mark, no event
    let id = jar.next_for_processing(None).unwrap();
    jar.mark_dirty(&id); // redirty, no event yet
    jar.mark_complete(&id).unwrap(); // redirty promotes to dirty: one event

    wait_for("dirty events", || count.load(Ordering::SeqCst) == 2);
    thread::sleep(Duration::from_millis(50));
    assert_eq!(count.load(Ordering::SeqCst), 2);
}

// ── Retry behaviour over a flaky backend ──────────────────────

/// Store wrapper that fails reads with transient errors until `failures`
/// have been consumed.
struct FlakyStore {
    inner: InMemoryCookieStore,
    failures: AtomicUsize,
}

impl FlakyStore {
    fn new(failures: usize) -> Self {
        Self {
            inner: InMemoryCookieStore::new(),
            failures: AtomicUsize::new(failures),
        }
    }

    fn trip(&self) -> Result<(), StoreError> {
        let remaining = self.failures.load(Ordering::SeqCst);
        if remaining > 0 {
            self.failures.store(remaining - 1, Ordering::SeqCst);
            return Err(StoreError::Io(io::Error::new(io::ErrorKind::ConnectionReset, "flaky")));
        }
        Ok(())
    }
}

impl CookieStore for FlakyStore {
    fn get(&self, id: &str) -> Result<Option<StoredCookie>, StoreError> {
        self.trip()?;
        self.inner.get(id)
    }

    fn put(&self, doc: &StoredCookie) -> Result<u64, StoreError> {
        self.trip()?;
        self.inner.put(doc)
    }

    fn delete(&self, id: &str) -> Result<(), StoreError> {
        self.inner.delete(id)
    }

    fn scan(&self) -> Result<Vec<(String, ProcessingState)>, StoreError> {
        self.inner.scan()
    }

    fn set_state(&self, id: &str, state: ProcessingState) -> Result<(), StoreError> {
        self.inner.set_state(id, state)
    }
}

#[test]
fn transient_store_errors_are_retried_to_success() {
    let retry = RetryPolicy {
        enabled: true,
        base_delay: Duration::from_millis(1),
        max_delay: Duration::from_millis(4),
    };
    let jar = CookieJar::open(Arc::new(FlakyStore::new(3)), retry).unwrap();

    jar.enrich("/a", enrichment("seed")).unwrap();
    assert_eq!(jar.fetch("/a").unwrap().unwrap().enrichments.len(), 1);
}

#[test]
fn disabled_retry_surfaces_transient_errors() {
    let jar = CookieJar::open(Arc::new(FlakyStore::new(1)), RetryPolicy::disabled()).unwrap();
    assert!(jar.enrich("/a", enrichment("seed")).is_err());
}
