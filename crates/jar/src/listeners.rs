//! Listener fan-out on a dedicated dispatch thread.
//!
//! Producers enqueue ids on an in-order channel so `mark_dirty` never blocks
//! on listener work; the dispatch thread invokes every callback serially.

use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::mpsc::{self, Sender};
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};

use tracing::error;

pub type Listener = Box<dyn Fn(&str) + Send + 'static>;

pub(crate) struct ListenerHub {
    tx: Option<Sender<String>>,
    callbacks: Arc<Mutex<Vec<Listener>>>,
    handle: Option<JoinHandle<()>>,
}

impl ListenerHub {
    pub(crate) fn new() -> Self {
        let (tx, rx) = mpsc::channel::<String>();
        let callbacks: Arc<Mutex<Vec<Listener>>> = Arc::new(Mutex::new(Vec::new()));

        let dispatch_callbacks = Arc::clone(&callbacks);
        let handle = thread::Builder::new()
            .name("jar-listeners".to_string())
            .spawn(move || {
                for id in rx {
                    let callbacks = dispatch_callbacks.lock().expect("listener list poisoned");
                    for (index, callback) in callbacks.iter().enumerate() {
                        if catch_unwind(AssertUnwindSafe(|| callback(&id))).is_err() {
                            error!(listener = index, id = %id, "jar listener panicked");
                        }
                    }
                }
            })
            .expect("failed to spawn listener thread");

        Self {
            tx: Some(tx),
            callbacks,
            handle: Some(handle),
        }
    }

    pub(crate) fn add(&self, listener: Listener) {
        self.callbacks.lock().expect("listener list poisoned").push(listener);
    }

    /// Queue a dirty event. Cheap and non-blocking; safe to call while the
    /// jar's queue lock is held, which keeps event order consistent with
    /// `mark_dirty` order.
    pub(crate) fn emit(&self, id: &str) {
        if let Some(tx) = &self.tx {
            let _ = tx.send(id.to_string());
        }
    }
}

impl Drop for ListenerHub {
    fn drop(&mut self) {
        // Close the channel so the dispatch thread drains and exits.
        self.tx = None;
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}
