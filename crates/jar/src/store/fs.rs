//! Filesystem-backed cookie store: one JSON document per object.
//!
//! Identifiers are arbitrary strings (usually slash-prefixed paths), so the
//! on-disk filename is the hex SHA-256 of the id; the id itself lives inside
//! the document. Writes go to a dot-tmpfile first and are renamed into place
//! to avoid partial documents on crash.

use std::fs;
use std::path::{Path, PathBuf};

use monster_core::ProcessingState;
use sha2::{Digest, Sha256};
use tracing::warn;

use super::{CookieStore, StoreError, StoredCookie};

pub struct FsCookieStore {
    data_dir: PathBuf,
}

impl FsCookieStore {
    /// Open a store rooted at `data_dir`, creating it if missing.
    pub fn open(data_dir: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let data_dir = data_dir.into();
        fs::create_dir_all(&data_dir)?;
        Ok(Self { data_dir })
    }

    fn document_path(&self, id: &str) -> PathBuf {
        let digest = Sha256::digest(id.as_bytes());
        self.data_dir.join(format!("{}.json", hex::encode(digest)))
    }

    fn read_document(&self, path: &Path, id_hint: &str) -> Result<StoredCookie, StoreError> {
        let contents = fs::read_to_string(path)?;
        serde_json::from_str(&contents).map_err(|e| StoreError::Corrupt {
            id: id_hint.to_string(),
            reason: e.to_string(),
        })
    }

    fn write_document(&self, doc: &StoredCookie) -> Result<(), StoreError> {
        let final_path = self.document_path(&doc.id);
        let file_name = final_path
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or("document.json");
        let tmp_path = self.data_dir.join(format!(".{file_name}.tmp"));

        let json = serde_json::to_string(doc).map_err(|e| StoreError::Corrupt {
            id: doc.id.clone(),
            reason: e.to_string(),
        })?;
        fs::write(&tmp_path, json)?;
        fs::rename(&tmp_path, &final_path)?;
        Ok(())
    }
}

impl CookieStore for FsCookieStore {
    fn get(&self, id: &str) -> Result<Option<StoredCookie>, StoreError> {
        let path = self.document_path(id);
        if !path.exists() {
            return Ok(None);
        }
        self.read_document(&path, id).map(Some)
    }

    fn put(&self, doc: &StoredCookie) -> Result<u64, StoreError> {
        let current = self.get(&doc.id)?.map(|d| d.revision).unwrap_or(0);
        if current != doc.revision {
            return Err(StoreError::Conflict {
                id: doc.id.clone(),
                expected: doc.revision,
                found: current,
            });
        }
        let mut committed = doc.clone();
        committed.revision = current + 1;
        self.write_document(&committed)?;
        Ok(committed.revision)
    }

    fn delete(&self, id: &str) -> Result<(), StoreError> {
        let path = self.document_path(id);
        if !path.exists() {
            return Err(StoreError::NotFound { id: id.to_string() });
        }
        fs::remove_file(&path)?;
        Ok(())
    }

    fn scan(&self) -> Result<Vec<(String, ProcessingState)>, StoreError> {
        let mut known = Vec::new();
        for entry in fs::read_dir(&self.data_dir)? {
            let entry = entry?;
            let path = entry.path();
            let name = path.file_name().and_then(|n| n.to_str()).unwrap_or("");
            if !path.is_file() || name.starts_with('.') || !name.ends_with(".json") {
                continue;
            }
            match self.read_document(&path, name) {
                Ok(doc) => known.push((doc.id, doc.processing_state)),
                Err(e) => {
                    // One bad document must not block recovery of the rest.
                    warn!(path = %path.display(), error = %e, "skipping unreadable cookie document");
                }
            }
        }
        Ok(known)
    }

    fn set_state(&self, id: &str, state: ProcessingState) -> Result<(), StoreError> {
        let Some(mut doc) = self.get(id)? else {
            return Ok(());
        };
        doc.processing_state = state;
        doc.revision += 1;
        self.write_document(&doc)
    }
}
