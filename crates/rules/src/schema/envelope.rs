//! Lightweight first-pass deserializer for plug-in documents.

use serde::{Deserialize, Serialize};

use super::ItemMetadata;

/// First-pass view of a plug-in document: just the header fields.
///
/// Used during two-pass loading: the `kind` decides the concrete type, then
/// the full document is deserialized into it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceEnvelope {
    #[serde(rename = "apiVersion")]
    pub api_version: String,
    pub kind: String,
    pub metadata: ItemMetadata,
    /// Remaining fields, kept raw for the second pass.
    #[serde(flatten)]
    pub rest: serde_yaml::Value,
}
