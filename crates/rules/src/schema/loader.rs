//! Enrichment loader documents.

use chrono::{DateTime, Utc};
use monster_core::Enrichment;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::{ItemMetadata, Predicate, SourceItem};

/// An enrichment loader from a `*.loader.yml` file.
///
/// When no rule terminated a processing pass, the first loader whose
/// `can_enrich` matches supplies the next enrichment. A loader's predicate
/// should exclude cookies it already enriched (typically
/// `not: { has_source: <its source> }`) or the cookie will cycle.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoaderDocument {
    #[serde(rename = "apiVersion")]
    pub api_version: String,
    pub kind: String,
    pub metadata: ItemMetadata,
    pub can_enrich: Predicate,
    pub enrichment: EnrichmentSpec,
}

impl SourceItem for LoaderDocument {
    const KIND: &'static str = "EnrichmentLoader";
    const REQUIRES_ID: bool = true;

    fn metadata(&self) -> &ItemMetadata {
        &self.metadata
    }
}

impl LoaderDocument {
    /// The loader id. Guaranteed present by registry validation.
    pub fn loader_id(&self) -> &str {
        self.metadata.id.as_deref().unwrap_or_default()
    }

    /// Build the enrichment this loader contributes.
    pub fn load(&self, now: DateTime<Utc>) -> Enrichment {
        Enrichment::new(self.enrichment.source.clone(), now, self.enrichment.metadata.clone())
    }
}

/// The enrichment a loader produces.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct EnrichmentSpec {
    /// Source name recorded on the produced enrichment.
    pub source: String,
    #[serde(default)]
    pub metadata: Map<String, Value>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    const LOADER_YAML: &str = r#"
apiVersion: v1
kind: EnrichmentLoader
metadata:
  id: header-loader
  priority: 10
can_enrich:
  not:
    has_source: fileheader
enrichment:
  source: fileheader
  metadata:
    format: bam
"#;

    #[test]
    fn parses_and_loads() {
        let loader: LoaderDocument = serde_yaml::from_str(LOADER_YAML).unwrap();
        assert_eq!(loader.loader_id(), "header-loader");

        let now = Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap();
        let enrichment = loader.load(now);
        assert_eq!(enrichment.source, "fileheader");
        assert_eq!(enrichment.timestamp, now);
        assert_eq!(enrichment.metadata["format"], "bam");
    }
}
