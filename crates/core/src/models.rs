//! Core data model: enrichments, cookies, notifications.

use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Reserved enrichment source recording a rule firing.
pub const RULE_APPLICATION: &str = "RULE_APPLICATION";

/// Metadata keys used inside a rule-application enrichment.
pub const RULE_APPLICATION_RULE_ID: &str = "rule_id";
pub const RULE_APPLICATION_TERMINATED: &str = "terminated";

/// One unit of knowledge about a data object, immutable once recorded.
///
/// Two enrichments are equal iff source, timestamp, and metadata all match.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Enrichment {
    /// Where this knowledge came from (e.g. an update feed or a loader id).
    pub source: String,
    pub timestamp: DateTime<Utc>,
    /// JSON-shaped metadata map.
    pub metadata: Map<String, Value>,
}

impl Enrichment {
    pub fn new(source: impl Into<String>, timestamp: DateTime<Utc>, metadata: Map<String, Value>) -> Self {
        Self {
            source: source.into(),
            timestamp,
            metadata,
        }
    }

    /// Build the enrichment recorded whenever a rule fires.
    pub fn rule_application(rule_id: &str, timestamp: DateTime<Utc>, terminated: bool) -> Self {
        let mut metadata = Map::new();
        metadata.insert(RULE_APPLICATION_RULE_ID.to_string(), Value::String(rule_id.to_string()));
        metadata.insert(RULE_APPLICATION_TERMINATED.to_string(), Value::Bool(terminated));
        Self::new(RULE_APPLICATION, timestamp, metadata)
    }
}

/// All accumulated knowledge about one data object.
///
/// The enrichment list is append-only and preserves insertion order;
/// everything else (sources seen, latest values) is derived from it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Cookie {
    pub identifier: String,
    #[serde(default)]
    pub enrichments: Vec<Enrichment>,
}

impl Cookie {
    pub fn new(identifier: impl Into<String>) -> Self {
        Self {
            identifier: identifier.into(),
            enrichments: Vec::new(),
        }
    }

    /// Append an enrichment.
    pub fn enrich(&mut self, enrichment: Enrichment) {
        self.enrichments.push(enrichment);
    }

    /// Iterate enrichments recorded by the given source, oldest first.
    pub fn enrichments_from_source<'a>(&'a self, source: &'a str) -> impl Iterator<Item = &'a Enrichment> {
        self.enrichments.iter().filter(move |e| e.source == source)
    }

    /// The most recently appended enrichment from the given source.
    pub fn latest_from_source(&self, source: &str) -> Option<&Enrichment> {
        self.enrichments.iter().rev().find(|e| e.source == source)
    }

    /// Distinct sources for which knowledge exists.
    pub fn sources(&self) -> BTreeSet<&str> {
        self.enrichments.iter().map(|e| e.source.as_str()).collect()
    }

    /// Fetch a metadata value by key, newest enrichment first.
    ///
    /// When `source` is given only that source's enrichments are consulted.
    pub fn metadata_value(&self, key: &str, source: Option<&str>) -> Option<&Value> {
        self.enrichments
            .iter()
            .rev()
            .filter(|e| source.map_or(true, |s| e.source == s))
            .find_map(|e| e.metadata.get(key))
    }

    /// Enrichments present here but not in `prior`, keyed by enrichment
    /// equality. Order follows this cookie's log.
    pub fn diff<'a>(&'a self, prior: &[Enrichment]) -> Vec<&'a Enrichment> {
        self.enrichments.iter().filter(|e| !prior.contains(*e)).collect()
    }
}

/// A message for an external process, emitted by a fired rule.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Notification {
    pub topic: String,
    #[serde(default)]
    pub payload: Value,
    pub sender: String,
}

impl Notification {
    pub fn new(topic: impl Into<String>, payload: Value, sender: impl Into<String>) -> Self {
        Self {
            topic: topic.into(),
            payload,
            sender: sender.into(),
        }
    }
}

/// Persisted per-object processing state, used only for crash recovery.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProcessingState {
    Complete,
    Dirty,
    InFlight,
}
