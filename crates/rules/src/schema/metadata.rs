//! Common metadata shared across all plug-in document kinds.

use serde::{Deserialize, Serialize};

/// Shared metadata for all plug-in kinds (rules, loaders, receivers).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct ItemMetadata {
    /// Item identifier. Required for rules and enrichment loaders; optional
    /// for notification receivers.
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    /// Higher priorities are consulted first. Ties keep registration order.
    #[serde(default)]
    pub priority: i64,
    #[serde(default = "default_true")]
    pub enabled: bool,
}

pub(crate) fn default_true() -> bool {
    true
}
