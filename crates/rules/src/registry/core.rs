//! Core [`SourceRegistry`]: discovery, attribution, snapshots, hot-reload.

use std::cmp::Reverse;
use std::collections::{HashMap, HashSet};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, RwLock};

use notify::{RecommendedWatcher, RecursiveMode, Watcher};
use serde::de::Deserialize;
use tracing::{info, warn};

use crate::schema::{SourceEnvelope, SourceItem};

use super::error::{LoadOutcome, LoadStatus, RegistryError, Result};
use super::watcher::handle_fs_event;

/// Filename predicate: a set of accepted dot-suffixes.
#[derive(Debug, Clone)]
pub struct FilePattern {
    suffixes: Vec<String>,
}

impl FilePattern {
    /// Pattern matching `*.<tag>.yml` and `*.<tag>.yaml` (e.g. `rule` →
    /// `*.rule.yml`).
    pub fn dot_suffix(tag: &str) -> Self {
        Self {
            suffixes: vec![format!(".{tag}.yml"), format!(".{tag}.yaml")],
        }
    }

    pub fn matches(&self, path: &Path) -> bool {
        let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
            return false;
        };
        if name.starts_with('.') {
            return false;
        }
        self.suffixes.iter().any(|s| name.ends_with(s.as_str()))
    }
}

/// One registered item, tagged with its registration sequence number.
pub(super) struct Registered<T> {
    pub(super) item: Arc<T>,
    pub(super) seq: u64,
}

/// Mutable registry state: per-file attribution of registered items.
pub(super) struct RegistryState<T> {
    pub(super) by_file: HashMap<PathBuf, Vec<Registered<T>>>,
    next_seq: u64,
}

impl<T> Default for RegistryState<T> {
    fn default() -> Self {
        Self {
            by_file: HashMap::new(),
            next_seq: 0,
        }
    }
}

impl<T: SourceItem> RegistryState<T> {
    /// Swap a file's items in one transition. Items carrying an id displace
    /// any prior item with the same id, wherever it was registered from.
    pub(super) fn replace_file(&mut self, path: &Path, items: Vec<T>) {
        self.by_file.remove(path);

        let ids: HashSet<String> = items.iter().filter_map(|i| i.id().map(str::to_string)).collect();
        if !ids.is_empty() {
            for entries in self.by_file.values_mut() {
                entries.retain(|r| r.item.id().map_or(true, |id| !ids.contains(id)));
            }
        }

        let mut registered = Vec::with_capacity(items.len());
        for item in items {
            registered.push(Registered {
                item: Arc::new(item),
                seq: self.next_seq,
            });
            self.next_seq += 1;
        }
        self.by_file.insert(path.to_path_buf(), registered);
    }

    pub(super) fn remove_file(&mut self, path: &Path) -> usize {
        self.by_file.remove(path).map_or(0, |items| items.len())
    }

    /// Point-in-time view: enabled items sorted by descending priority,
    /// ties broken by registration order.
    pub(super) fn snapshot(&self) -> Vec<Arc<T>> {
        let mut entries: Vec<(&Registered<T>, i64)> = self
            .by_file
            .values()
            .flatten()
            .filter(|r| r.item.metadata().enabled)
            .map(|r| (r, r.item.priority()))
            .collect();
        entries.sort_by_key(|(r, priority)| (Reverse(*priority), r.seq));
        entries.into_iter().map(|(r, _)| Arc::clone(&r.item)).collect()
    }
}

/// Parse every YAML document in a plug-in file into items of one kind.
///
/// All-or-nothing: any bad document fails the whole file, which then
/// contributes no items.
pub(super) fn parse_file<T: SourceItem>(path: &Path) -> Result<Vec<T>> {
    let contents = fs::read_to_string(path)?;
    let mut items = Vec::new();

    for (index, doc) in serde_yaml::Deserializer::from_str(&contents).enumerate() {
        let value = serde_yaml::Value::deserialize(doc)
            .map_err(|e| RegistryError::Parse(format!("document {index}: {e}")))?;
        // Empty documents (e.g. a trailing `---`) register nothing.
        if value.is_null() {
            continue;
        }

        let envelope: SourceEnvelope = serde_yaml::from_value(value.clone())
            .map_err(|e| RegistryError::Parse(format!("document {index}: {e}")))?;
        if envelope.kind != T::KIND {
            return Err(RegistryError::Validation(format!(
                "document {index}: expected kind {}, found {}",
                T::KIND,
                envelope.kind
            )));
        }
        if T::REQUIRES_ID && envelope.metadata.id.as_deref().unwrap_or("").is_empty() {
            return Err(RegistryError::Validation(format!(
                "document {index}: metadata.id must not be empty"
            )));
        }

        let item: T = serde_yaml::from_value(value)
            .map_err(|e| RegistryError::Parse(format!("document {index}: {e}")))?;
        items.push(item);
    }

    Ok(items)
}

/// A live, priority-sorted view of plug-in items loaded from a directory tree.
pub struct SourceRegistry<T: SourceItem> {
    root: PathBuf,
    pattern: FilePattern,
    state: Arc<RwLock<RegistryState<T>>>,
    /// Active filesystem watcher (held to keep it alive).
    _watcher: Option<RecommendedWatcher>,
}

impl<T: SourceItem> SourceRegistry<T> {
    /// Create a registry over `root` for files matching `pattern`.
    ///
    /// Creates the directory (and parents) if it does not exist.
    pub fn new(root: PathBuf, pattern: FilePattern) -> Self {
        if !root.exists() {
            if let Err(e) = fs::create_dir_all(&root) {
                warn!(path = %root.display(), error = %e, "failed to create plug-in directory");
            }
        }
        Self {
            root,
            pattern,
            state: Arc::new(RwLock::new(RegistryState::default())),
            _watcher: None,
        }
    }

    /// Discover and load all matching files, then start watching for changes.
    pub fn start(&mut self) -> Result<Vec<LoadOutcome>> {
        let outcomes = self.rescan()?;
        self.watch()?;
        Ok(outcomes)
    }

    /// Release the watcher and drop all registered items.
    pub fn stop(&mut self) {
        self._watcher = None;
        self.state.write().expect("registry lock poisoned").by_file.clear();
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Point-in-time snapshot, priority descending. Concurrent reloads do not
    /// invalidate an in-flight iteration.
    pub fn snapshot(&self) -> Vec<Arc<T>> {
        self.state.read().expect("registry lock poisoned").snapshot()
    }

    /// Walk the tree: (re)load every matching file and unregister files that
    /// no longer exist (a watcher may have missed delete events).
    pub fn rescan(&self) -> Result<Vec<LoadOutcome>> {
        let mut outcomes = Vec::new();
        let mut found = HashSet::new();
        self.scan_dir(&self.root, &mut outcomes, &mut found)?;

        let stale: Vec<PathBuf> = {
            let state = self.state.read().expect("registry lock poisoned");
            state.by_file.keys().filter(|p| !found.contains(*p)).cloned().collect()
        };
        for path in stale {
            info!(path = %path.display(), "unregistering items of missing file");
            self.remove_file(&path);
        }

        Ok(outcomes)
    }

    fn scan_dir(&self, dir: &Path, outcomes: &mut Vec<LoadOutcome>, found: &mut HashSet<PathBuf>) -> Result<()> {
        let entries = match fs::read_dir(dir) {
            Ok(e) => e,
            Err(e) => {
                warn!(path = %dir.display(), error = %e, "failed to read directory");
                return Ok(());
            }
        };

        for entry in entries {
            let entry = entry?;
            let path = entry.path();

            if path.is_dir() {
                // Skip dotdirs, recurse into the rest.
                let hidden = path
                    .file_name()
                    .and_then(|n| n.to_str())
                    .map(|n| n.starts_with('.'))
                    .unwrap_or(false);
                if !hidden {
                    self.scan_dir(&path, outcomes, found)?;
                }
                continue;
            }

            if !self.pattern.matches(&path) {
                continue;
            }

            found.insert(path.clone());
            outcomes.push(self.reload_file(&path));
        }

        Ok(())
    }

    /// (Re)load one file, swapping its items atomically. A failed parse
    /// unregisters the file's previous items.
    pub fn reload_file(&self, path: &Path) -> LoadOutcome {
        match parse_file::<T>(path) {
            Ok(items) => {
                let count = items.len();
                self.state
                    .write()
                    .expect("registry lock poisoned")
                    .replace_file(path, items);
                info!(path = %path.display(), items = count, kind = T::KIND, "loaded plug-in file");
                LoadOutcome {
                    path: path.to_path_buf(),
                    status: LoadStatus::Loaded { items: count },
                }
            }
            Err(e) => {
                warn!(path = %path.display(), error = %e, "failed to load plug-in file");
                self.state.write().expect("registry lock poisoned").remove_file(path);
                LoadOutcome {
                    path: path.to_path_buf(),
                    status: LoadStatus::Failed { error: e.to_string() },
                }
            }
        }
    }

    /// Unregister all items attributed to a file.
    pub fn remove_file(&self, path: &Path) {
        let removed = self.state.write().expect("registry lock poisoned").remove_file(path);
        if removed > 0 {
            info!(path = %path.display(), items = removed, "unregistered plug-in file");
        }
    }

    /// Subscribe to create/modify/delete events under the root.
    fn watch(&mut self) -> Result<()> {
        let state = Arc::clone(&self.state);
        let pattern = self.pattern.clone();

        let mut watcher =
            notify::recommended_watcher(move |res: std::result::Result<notify::Event, notify::Error>| match res {
                Ok(event) => handle_fs_event::<T>(&event, &pattern, &state),
                Err(e) => warn!(error = %e, "filesystem watcher error"),
            })?;
        watcher.watch(&self.root, RecursiveMode::Recursive)?;

        info!(path = %self.root.display(), kind = T::KIND, "watching plug-in directory (recursive)");
        self._watcher = Some(watcher);
        Ok(())
    }
}
