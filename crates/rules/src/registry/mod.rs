//! Priority-ordered plug-in registry with filesystem hot-reload.
//!
//! A registry watches a directory tree for files matching a filename pattern
//! (e.g. `*.rule.yml`), parses every matching file into plug-in items, and
//! exposes a live snapshot sorted by descending priority. A file's items are
//! attributed to that file: modifying it swaps them atomically, deleting it
//! (or finding it gone on rescan) unregisters them.

mod core;
mod error;
mod watcher;


pub use self::core::{FilePattern, SourceRegistry};
pub use self::error::{LoadOutcome, LoadStatus, RegistryError, Result};
