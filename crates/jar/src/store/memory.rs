//! In-memory cookie store, the default for tests and ephemeral runs.

use std::collections::HashMap;
use std::sync::RwLock;

use monster_core::ProcessingState;

use super::{CookieStore, StoreError, StoredCookie};

#[derive(Default)]
pub struct InMemoryCookieStore {
    documents: RwLock<HashMap<String, StoredCookie>>,
}

impl InMemoryCookieStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl CookieStore for InMemoryCookieStore {
    fn get(&self, id: &str) -> Result<Option<StoredCookie>, StoreError> {
        Ok(self.documents.read().expect("store lock poisoned").get(id).cloned())
    }

    fn put(&self, doc: &StoredCookie) -> Result<u64, StoreError> {
        let mut documents = self.documents.write().expect("store lock poisoned");
        let current = documents.get(&doc.id).map(|d| d.revision).unwrap_or(0);
        if current != doc.revision {
            return Err(StoreError::Conflict {
                id: doc.id.clone(),
                expected: doc.revision,
                found: current,
            });
        }
        let mut committed = doc.clone();
        committed.revision = current + 1;
        let revision = committed.revision;
        documents.insert(doc.id.clone(), committed);
        Ok(revision)
    }

    fn delete(&self, id: &str) -> Result<(), StoreError> {
        self.documents
            .write()
            .expect("store lock poisoned")
            .remove(id)
            .map(|_| ())
            .ok_or_else(|| StoreError::NotFound { id: id.to_string() })
    }

    fn scan(&self) -> Result<Vec<(String, ProcessingState)>, StoreError> {
        Ok(self
            .documents
            .read()
            .expect("store lock poisoned")
            .values()
            .map(|d| (d.id.clone(), d.processing_state))
            .collect())
    }

    fn set_state(&self, id: &str, state: ProcessingState) -> Result<(), StoreError> {
        let mut documents = self.documents.write().expect("store lock poisoned");
        if let Some(doc) = documents.get_mut(id) {
            doc.processing_state = state;
            doc.revision += 1;
        }
        Ok(())
    }
}
