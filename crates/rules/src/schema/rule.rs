//! Rule documents: a predicate plus the action taken when it matches.

use monster_core::Notification;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::{ItemMetadata, Predicate, SourceItem};

/// A production rule loaded from a `*.rule.yml` file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RuleDocument {
    #[serde(rename = "apiVersion")]
    pub api_version: String,
    pub kind: String,
    pub metadata: ItemMetadata,
    /// When this matches the cookie, the action fires.
    pub when: Predicate,
    pub action: ActionSpec,
}

impl SourceItem for RuleDocument {
    const KIND: &'static str = "Rule";
    const REQUIRES_ID: bool = true;

    fn metadata(&self) -> &ItemMetadata {
        &self.metadata
    }
}

impl RuleDocument {
    /// The rule id. Guaranteed present by registry validation.
    pub fn rule_id(&self) -> &str {
        self.metadata.id.as_deref().unwrap_or_default()
    }

    /// Materialize the notifications this rule emits for a firing.
    pub fn notifications(&self) -> Vec<Notification> {
        self.action
            .notifications
            .iter()
            .map(|spec| spec.to_notification(self.rule_id()))
            .collect()
    }
}

/// The outcome of a matched rule.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct ActionSpec {
    /// Stop rule evaluation for this pass after firing.
    #[serde(default)]
    pub terminate: bool,
    #[serde(default)]
    pub notifications: Vec<NotificationSpec>,
}

/// One notification emitted by a rule action.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct NotificationSpec {
    pub topic: String,
    #[serde(default)]
    pub payload: Value,
    /// Defaults to the emitting rule's id.
    #[serde(default)]
    pub sender: Option<String>,
}

impl NotificationSpec {
    pub fn to_notification(&self, rule_id: &str) -> Notification {
        Notification::new(
            self.topic.clone(),
            self.payload.clone(),
            self.sender.clone().unwrap_or_else(|| rule_id.to_string()),
        )
    }
}
