//! Notification receiver documents.

use std::collections::HashMap;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use super::{ItemMetadata, SourceItem};

/// A notification receiver from a `*.receiver.yml` file.
///
/// Unlike rules and loaders, receivers don't need an id; a document without
/// one is registered by identity (file and position).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReceiverDocument {
    #[serde(rename = "apiVersion")]
    pub api_version: String,
    pub kind: String,
    #[serde(default = "default_metadata")]
    pub metadata: ItemMetadata,
    pub receiver: ReceiverKind,
}

fn default_metadata() -> ItemMetadata {
    ItemMetadata {
        id: None,
        name: None,
        description: None,
        priority: 0,
        enabled: true,
    }
}

impl SourceItem for ReceiverDocument {
    const KIND: &'static str = "NotificationReceiver";
    const REQUIRES_ID: bool = false;

    fn metadata(&self) -> &ItemMetadata {
        &self.metadata
    }
}

/// Delivery mechanism for a receiver.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "snake_case")]
pub enum ReceiverKind {
    /// Emit the notification to the process log.
    Log,
    /// Append the notification as a JSON line to a file.
    File { path: PathBuf },
    /// POST the notification as JSON to a URL.
    Webhook {
        url: String,
        #[serde(default)]
        headers: HashMap<String, String>,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn log_receiver_without_metadata() {
        let yaml = r#"
apiVersion: v1
kind: NotificationReceiver
receiver: log
"#;
        let doc: ReceiverDocument = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(doc.receiver, ReceiverKind::Log);
        assert!(doc.id().is_none());
    }

    #[test]
    fn webhook_receiver_with_headers() {
        let yaml = r#"
apiVersion: v1
kind: NotificationReceiver
metadata:
  id: downstream
receiver:
  webhook:
    url: http://localhost:9000/hook
    headers:
      X-Api-Key: abc
"#;
        let doc: ReceiverDocument = serde_yaml::from_str(yaml).unwrap();
        match &doc.receiver {
            ReceiverKind::Webhook { url, headers } => {
                assert_eq!(url, "http://localhost:9000/hook");
                assert_eq!(headers["X-Api-Key"], "abc");
            }
            other => panic!("expected webhook, got: {other:?}"),
        }
    }
}
