use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::classifier::Classification;
use crate::decoding::{truncate_chars, ContentDecoder, DEFAULT_DETAIL_OUTPUT_CHARS};
use crate::extraction::{BodyExtractor, ExtractionPolicy};
use crate::message::RawMessage;

pub const DEFAULT_PREVIEW_CHARS: usize = 500;
pub const UNKNOWN_SENDER: &str = "Unknown Sender";
pub const NO_SUBJECT: &str = "No Subject";
pub const INVALID_DATE: &str = "Invalid Date";

const DATE_DISPLAY_FORMAT: &str = "%-m/%-d/%Y, %-I:%M:%S %p";

/// Flattened, decoded view of one message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CanonicalRecord {
    pub id: String,
    #[serde(alias = "from")]
    pub sender: String,
    pub subject: String,
    #[serde(default)]
    pub snippet: String,
    #[serde(default)]
    pub body_preview: String,
    #[serde(default)]
    pub date: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub classification: Option<Classification>,
}

/// Full single-message view used by the detail endpoint. `body` is HTML.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MessageDetail {
    pub id: String,
    pub sender: String,
    pub subject: String,
    pub date: String,
    pub body: String,
}

pub struct MessageNormalizer {
    extractor: BodyExtractor,
    detail_extractor: BodyExtractor,
    preview_chars: usize,
}

impl Default for MessageNormalizer {
    fn default() -> Self {
        Self::new(BodyExtractor::default(), DEFAULT_PREVIEW_CHARS)
    }
}

impl MessageNormalizer {
    /// The detail view gets a decoder widened to
    /// [`DEFAULT_DETAIL_OUTPUT_CHARS`] unless replaced with
    /// [`with_detail_extractor`](Self::with_detail_extractor).
    pub fn new(extractor: BodyExtractor, preview_chars: usize) -> Self {
        let detail_limits = extractor
            .decoder()
            .limits()
            .widened(DEFAULT_DETAIL_OUTPUT_CHARS);
        Self {
            extractor,
            detail_extractor: BodyExtractor::new(ContentDecoder::new(detail_limits)),
            preview_chars,
        }
    }

    pub fn with_detail_extractor(mut self, extractor: BodyExtractor) -> Self {
        self.detail_extractor = extractor;
        self
    }

    pub fn normalize(&self, raw: &RawMessage) -> CanonicalRecord {
        let body = self.extractor.extract(&raw.root, ExtractionPolicy::PlainFirst);
        let date = match raw.header("Date") {
            Some(value) => render_date(value),
            None => String::new(),
        };

        CanonicalRecord {
            id: raw.id.clone(),
            sender: sender_of(raw),
            subject: subject_of(raw),
            snippet: raw.snippet.clone(),
            body_preview: truncate_chars(&body, self.preview_chars),
            date,
            classification: None,
        }
    }

    pub fn detail(&self, raw: &RawMessage) -> MessageDetail {
        MessageDetail {
            id: raw.id.clone(),
            sender: sender_of(raw),
            subject: subject_of(raw),
            date: raw.header("Date").unwrap_or_default().to_string(),
            body: self
                .detail_extractor
                .extract(&raw.root, ExtractionPolicy::HtmlFirst),
        }
    }
}

fn sender_of(raw: &RawMessage) -> String {
    non_empty_header(raw, "From").unwrap_or(UNKNOWN_SENDER).to_string()
}

fn subject_of(raw: &RawMessage) -> String {
    non_empty_header(raw, "Subject").unwrap_or(NO_SUBJECT).to_string()
}

/// Blank header values count as absent.
fn non_empty_header<'a>(raw: &'a RawMessage, name: &str) -> Option<&'a str> {
    raw.header(name).map(str::trim).filter(|v| !v.is_empty())
}

/// Render a `Date` header as a human-readable UTC timestamp. Never fails:
/// unparseable values become [`INVALID_DATE`].
pub fn render_date(header: &str) -> String {
    match parse_date(header) {
        Some(date) => date.format(DATE_DISPLAY_FORMAT).to_string(),
        None => {
            log::debug!("Unparseable Date header: {header}");
            INVALID_DATE.to_string()
        }
    }
}

fn parse_date(header: &str) -> Option<DateTime<Utc>> {
    let trimmed = header.trim();
    if let Ok(date) = DateTime::parse_from_rfc2822(trimmed) {
        return Some(date.with_timezone(&Utc));
    }
    // Strip a trailing comment such as "(UTC)" or "(PST)"
    if let Some(idx) = trimmed.rfind('(') {
        if trimmed.ends_with(')') {
            if let Ok(date) = DateTime::parse_from_rfc2822(trimmed[..idx].trim_end()) {
                return Some(date.with_timezone(&Utc));
            }
        }
    }
    DateTime::parse_from_rfc3339(trimmed)
        .ok()
        .map(|date| date.with_timezone(&Utc))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::message::{Header, Part};
    use base64::engine::general_purpose::URL_SAFE_NO_PAD;
    use base64::Engine as _;

    fn message(headers: Vec<Header>, root: Part) -> RawMessage {
        RawMessage {
            id: "m1".to_string(),
            thread_id: "t1".to_string(),
            label_ids: vec!["INBOX".to_string()],
            snippet: "Hello there".to_string(),
            headers,
            root,
        }
    }

    fn plain(text: &str) -> Part {
        Part::leaf("text/plain", Some(URL_SAFE_NO_PAD.encode(text)))
    }

    #[test]
    fn test_missing_subject_gets_fallback() {
        let raw = message(vec![Header::new("From", "Alice <a@x.com>")], plain("Hello"));
        let record = MessageNormalizer::default().normalize(&raw);
        assert_eq!(record.subject, "No Subject");
        assert_eq!(record.sender, "Alice <a@x.com>");
    }

    #[test]
    fn test_empty_subject_header_gets_fallback() {
        let raw = message(
            vec![Header::new("Subject", ""), Header::new("From", "  ")],
            plain("Hello"),
        );
        let normalizer = MessageNormalizer::default();
        let record = normalizer.normalize(&raw);
        assert_eq!(record.subject, "No Subject");
        assert_eq!(record.sender, "Unknown Sender");

        let detail = normalizer.detail(&raw);
        assert_eq!(detail.subject, "No Subject");
        assert_eq!(detail.sender, "Unknown Sender");
    }

    #[test]
    fn test_detail_body_is_not_cut_at_preview_bounds() {
        let html = format!("<div>{}</div>", "word ".repeat(1000));
        let root = Part::leaf("text/html", Some(URL_SAFE_NO_PAD.encode(&html)));
        let raw = message(vec![], root);
        let normalizer = MessageNormalizer::default();

        assert_eq!(normalizer.detail(&raw).body, html);
        assert_eq!(normalizer.normalize(&raw).body_preview.chars().count(), 500);
    }

    #[test]
    fn test_missing_sender_and_date() {
        let raw = message(vec![], plain("Hello"));
        let record = MessageNormalizer::default().normalize(&raw);
        assert_eq!(record.sender, "Unknown Sender");
        assert_eq!(record.date, "");
        assert!(record.classification.is_none());
    }

    #[test]
    fn test_headers_are_case_insensitive() {
        let raw = message(
            vec![Header::new("subject", "Hi"), Header::new("from", "bob@y.org")],
            plain("Hello"),
        );
        let record = MessageNormalizer::default().normalize(&raw);
        assert_eq!(record.subject, "Hi");
        assert_eq!(record.sender, "bob@y.org");
        assert_eq!(record.body_preview, "Hello");
    }

    #[test]
    fn test_body_preview_is_bounded() {
        let raw = message(vec![], plain(&"z".repeat(1500)));
        let record = MessageNormalizer::default().normalize(&raw);
        assert_eq!(record.body_preview.chars().count(), 500);
    }

    #[test]
    fn test_date_rendering() {
        assert_eq!(
            render_date("Tue, 1 Jul 2025 14:05:09 +0000"),
            "7/1/2025, 2:05:09 PM"
        );
        assert_eq!(
            render_date("Wed, 2 Jul 2025 01:00:00 +0200 (CEST)"),
            "7/1/2025, 11:00:00 PM"
        );
        assert_eq!(render_date("sometime last week"), "Invalid Date");
    }

    #[test]
    fn test_detail_uses_html_first() {
        let root = Part::multipart(
            "multipart/alternative",
            vec![
                plain("plain text"),
                Part::leaf("text/html", Some(URL_SAFE_NO_PAD.encode("<p>rich</p>"))),
            ],
        );
        let raw = message(
            vec![Header::new("Date", "Tue, 1 Jul 2025 14:05:09 +0000")],
            root,
        );
        let detail = MessageNormalizer::default().detail(&raw);
        assert_eq!(detail.body, "<p>rich</p>");
        assert_eq!(detail.date, "Tue, 1 Jul 2025 14:05:09 +0000");
        assert_eq!(detail.subject, "No Subject");
    }

    #[test]
    fn test_record_serializes_camel_case() {
        let raw = message(vec![], plain("Hello"));
        let record = MessageNormalizer::default().normalize(&raw);
        let json = serde_json::to_value(&record).unwrap();
        assert_eq!(json["bodyPreview"], "Hello");
        assert!(json.get("classification").is_none());
    }

    #[test]
    fn test_record_accepts_from_alias() {
        let json = r#"{"id":"m9","from":"c@z.io","subject":"S","snippet":"s"}"#;
        let record: CanonicalRecord = serde_json::from_str(json).unwrap();
        assert_eq!(record.sender, "c@z.io");
        assert_eq!(record.body_preview, "");
    }
}
