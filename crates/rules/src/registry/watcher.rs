//! Filesystem event handler for the notify watcher (hot-reload).

use std::sync::{Arc, RwLock};

use notify::event::{CreateKind, ModifyKind, RemoveKind};
use notify::{Event, EventKind};
use tracing::{info, warn};

use crate::schema::SourceItem;

use super::core::{parse_file, FilePattern, RegistryState};

/// Handle a single filesystem event from the notify watcher.
///
/// Create/modify re-parses the file and swaps its items in one write-lock
/// transition; remove unregisters them. A file that cannot be read on a
/// modify event is treated as deleted (watchers can misreport rapid
/// replace-by-rename sequences).
pub(super) fn handle_fs_event<T: SourceItem>(
    event: &Event,
    pattern: &FilePattern,
    state: &Arc<RwLock<RegistryState<T>>>,
) {
    for path in &event.paths {
        if !pattern.matches(path) {
            continue;
        }

        match &event.kind {
            EventKind::Create(CreateKind::File)
            | EventKind::Modify(ModifyKind::Data(_))
            | EventKind::Modify(ModifyKind::Name(_)) => {
                if !path.exists() {
                    state.write().expect("registry lock poisoned").remove_file(path);
                    info!(path = %path.display(), "unregistered plug-in file after rename/removal");
                    continue;
                }
                match parse_file::<T>(path) {
                    Ok(items) => {
                        let count = items.len();
                        state.write().expect("registry lock poisoned").replace_file(path, items);
                        info!(path = %path.display(), items = count, kind = T::KIND, "hot-reloaded plug-in file");
                    }
                    Err(e) => {
                        // A broken file's items are treated as unregistered
                        // until a later modification loads cleanly.
                        warn!(path = %path.display(), error = %e, "failed to reload plug-in file");
                        state.write().expect("registry lock poisoned").remove_file(path);
                    }
                }
            }
            EventKind::Remove(RemoveKind::File) | EventKind::Remove(RemoveKind::Any) => {
                state.write().expect("registry lock poisoned").remove_file(path);
                info!(path = %path.display(), "unregistered plug-in file after deletion");
            }
            _ => {}
        }
    }
}
