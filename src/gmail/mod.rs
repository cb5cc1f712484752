//! Gmail REST API integration: wire types and conversion into [`RawMessage`].

mod client;

pub use client::{GmailClient, MessageFormat};

use regex::Regex;
use std::sync::OnceLock;

use crate::error::{Result, TriageError};
use crate::message::{Header, Part, RawMessage};

/// Gmail API response types
pub mod api {
    use serde::{Deserialize, Serialize};

    #[derive(Debug, Deserialize, Default)]
    #[serde(rename_all = "camelCase")]
    pub struct ListMessagesResponse {
        pub messages: Option<Vec<MessageRef>>,
        pub next_page_token: Option<String>,
        pub result_size_estimate: Option<u32>,
    }

    #[derive(Debug, Deserialize)]
    #[serde(rename_all = "camelCase")]
    pub struct MessageRef {
        pub id: String,
        pub thread_id: Option<String>,
    }

    #[derive(Debug, Deserialize, Serialize)]
    #[serde(rename_all = "camelCase")]
    pub struct GmailMessage {
        pub id: String,
        #[serde(default)]
        pub thread_id: String,
        #[serde(default)]
        pub label_ids: Vec<String>,
        #[serde(default)]
        pub snippet: String,
        pub payload: Option<MessagePart>,
    }

    #[derive(Debug, Deserialize, Serialize, Clone)]
    pub struct Header {
        pub name: String,
        pub value: String,
    }

    #[derive(Debug, Deserialize, Serialize, Default)]
    pub struct MessageBody {
        pub size: Option<u64>,
        pub data: Option<String>,
    }

    /// Message part; the top-level payload has the same shape.
    #[derive(Debug, Deserialize, Serialize, Default)]
    #[serde(rename_all = "camelCase")]
    pub struct MessagePart {
        pub part_id: Option<String>,
        pub mime_type: Option<String>,
        pub filename: Option<String>,
        #[serde(default)]
        pub headers: Vec<Header>,
        pub body: Option<MessageBody>,
        pub parts: Option<Vec<MessagePart>>,
    }
}

impl From<api::MessagePart> for Part {
    fn from(part: api::MessagePart) -> Self {
        let mime_type = part.mime_type.unwrap_or_default();
        match part.parts {
            Some(children) if !children.is_empty() => {
                Part::multipart(mime_type, children.into_iter().map(Part::from).collect())
            }
            _ => Part::leaf(mime_type, part.body.and_then(|b| b.data)),
        }
    }
}

impl From<api::GmailMessage> for RawMessage {
    fn from(message: api::GmailMessage) -> Self {
        let mut payload = message.payload.unwrap_or_default();
        let headers = std::mem::take(&mut payload.headers)
            .into_iter()
            .map(|h| Header::new(h.name, h.value))
            .collect();

        RawMessage {
            id: message.id,
            thread_id: message.thread_id,
            label_ids: message.label_ids,
            snippet: message.snippet,
            headers,
            root: Part::from(payload),
        }
    }
}

/// Reject identifiers that could not have come from the provider before they
/// are spliced into a request path.
pub fn validate_message_id(id: &str) -> Result<()> {
    static MESSAGE_ID: OnceLock<Regex> = OnceLock::new();
    let pattern = MESSAGE_ID.get_or_init(|| {
        Regex::new(r"^[A-Za-z0-9_-]{1,128}$").expect("message id pattern is valid")
    });
    if pattern.is_match(id) {
        Ok(())
    } else {
        Err(TriageError::Validation(format!(
            "Malformed message identifier: {id:?}"
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_converts_nested_payload() {
        let json = r#"{
            "id": "18c2a",
            "threadId": "18c2a",
            "labelIds": ["INBOX", "UNREAD"],
            "snippet": "Hi there",
            "payload": {
                "mimeType": "multipart/alternative",
                "headers": [{"name": "Subject", "value": "Hello"}],
                "body": {"size": 0},
                "parts": [
                    {"partId": "0", "mimeType": "text/plain", "body": {"size": 5, "data": "SGVsbG8"}},
                    {"partId": "1", "mimeType": "text/html", "body": {"size": 12, "data": "PGI-SGk8L2I-"}}
                ]
            }
        }"#;
        let message: api::GmailMessage = serde_json::from_str(json).unwrap();
        let raw = RawMessage::from(message);
        assert_eq!(raw.header("subject"), Some("Hello"));
        assert_eq!(raw.label_ids, vec!["INBOX", "UNREAD"]);
        assert_eq!(raw.root.children().len(), 2);
        assert_eq!(raw.root.children()[0].payload(), Some("SGVsbG8"));
    }

    #[test]
    fn test_metadata_message_without_payload_body() {
        let json = r#"{"id": "abc", "snippet": "s", "payload": {"mimeType": "text/plain", "headers": []}}"#;
        let message: api::GmailMessage = serde_json::from_str(json).unwrap();
        let raw = RawMessage::from(message);
        assert_eq!(raw.root.payload(), None);
        assert!(raw.headers.is_empty());
    }

    #[test]
    fn test_validate_message_id() {
        assert!(validate_message_id("18c2a9f0e1b3d4c5").is_ok());
        assert!(validate_message_id("a_b-C").is_ok());
        assert!(validate_message_id("").is_err());
        assert!(validate_message_id("../labels").is_err());
        assert!(validate_message_id("id?format=raw").is_err());
    }
}
