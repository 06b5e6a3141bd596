//! Built-in receiver kinds behind the [`Receive`] trait.

use std::fs::OpenOptions;
use std::io::Write;
use std::sync::OnceLock;
use std::time::Duration;

use monster_core::Notification;
use monster_rules::{ReceiverDocument, ReceiverKind};
use tracing::info;

use crate::traits::{Receive, ReceiveError};

/// Shared blocking HTTP client for webhook deliveries (connection pooling).
/// Broadcasts run on processor worker threads, never on the async runtime.
fn http_client() -> &'static reqwest::blocking::Client {
    static CLIENT: OnceLock<reqwest::blocking::Client> = OnceLock::new();
    CLIENT.get_or_init(|| {
        reqwest::blocking::Client::builder()
            .timeout(Duration::from_secs(10))
            .build()
            .unwrap_or_default()
    })
}

impl Receive for ReceiverDocument {
    fn receive(&self, notification: &Notification) -> Result<(), ReceiveError> {
        match &self.receiver {
            ReceiverKind::Log => {
                info!(
                    topic = %notification.topic,
                    sender = %notification.sender,
                    payload = %notification.payload,
                    "notification"
                );
                Ok(())
            }
            ReceiverKind::File { path } => {
                let line = serde_json::to_string(notification)
                    .map_err(|e| ReceiveError::Delivery(e.to_string()))?;
                let mut file = OpenOptions::new().create(true).append(true).open(path)?;
                writeln!(file, "{line}")?;
                Ok(())
            }
            ReceiverKind::Webhook { url, headers } => {
                let mut request = http_client().post(url).json(notification);
                for (key, value) in headers {
                    request = request.header(key.as_str(), value.as_str());
                }
                let response = request.send()?;
                let status = response.status();
                if !status.is_success() {
                    return Err(ReceiveError::Delivery(format!("webhook returned {status}")));
                }
                Ok(())
            }
        }
    }

    fn name(&self) -> &str {
        self.metadata
            .id
            .as_deref()
            .unwrap_or(match &self.receiver {
                ReceiverKind::Log => "log",
                ReceiverKind::File { .. } => "file",
                ReceiverKind::Webhook { .. } => "webhook",
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::TempDir;

    fn notification() -> Notification {
        Notification::new("topic-a", json!({"k": 1}), "rule-1")
    }

    fn receiver_doc(yaml: &str) -> ReceiverDocument {
        serde_yaml::from_str(yaml).unwrap()
    }

    #[test]
    fn file_receiver_appends_json_lines() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("out.jsonl");
        let doc = receiver_doc(&format!(
            "apiVersion: v1\nkind: NotificationReceiver\nreceiver:\n  file:\n    path: {}\n",
            path.display()
        ));

        doc.receive(&notification()).unwrap();
        doc.receive(&notification()).unwrap();

        let contents = std::fs::read_to_string(&path).unwrap();
        let lines: Vec<_> = contents.lines().collect();
        assert_eq!(lines.len(), 2);
        let parsed: Notification = serde_json::from_str(lines[0]).unwrap();
        assert_eq!(parsed, notification());
    }

    #[test]
    fn log_receiver_always_delivers() {
        let doc = receiver_doc("apiVersion: v1\nkind: NotificationReceiver\nreceiver: log\n");
        doc.receive(&notification()).unwrap();
        assert_eq!(doc.name(), "log");
    }

    #[test]
    fn name_prefers_the_document_id() {
        let doc = receiver_doc(
            "apiVersion: v1\nkind: NotificationReceiver\nmetadata:\n  id: downstream\nreceiver: log\n",
        );
        assert_eq!(doc.name(), "downstream");
    }
}
