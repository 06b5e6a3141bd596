//! Boolean predicate tree evaluated against a cookie.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A condition tree over a cookie's identifier and enrichment log.
///
/// Leaves inspect the identifier, the set of sources seen, or metadata
/// values; `all` / `any` / `not` compose them recursively.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "snake_case")]
pub enum Predicate {
    All(Vec<Predicate>),
    Any(Vec<Predicate>),
    Not(Box<Predicate>),
    /// Constant result, useful for catch-all rules.
    Always(bool),
    IdEquals(String),
    IdContains(String),
    IdStartsWith(String),
    IdEndsWith(String),
    /// At least one enrichment was recorded by this source.
    HasSource(String),
    /// A metadata key exists, scanning newest enrichment first.
    MetadataExists {
        key: String,
        #[serde(default)]
        source: Option<String>,
    },
    /// The newest value for a metadata key equals `value`.
    MetadataEquals {
        key: String,
        value: Value,
        #[serde(default)]
        source: Option<String>,
    },
    EnrichmentCountAtLeast(usize),
}
