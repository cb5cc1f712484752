use reqwest::{Client, Response};
use serde_json::Value;
use std::time::Duration;
use url::Url;

use super::api::{GmailMessage, ListMessagesResponse};
use super::validate_message_id;
use crate::config::MailConfig;
use crate::error::{Result, TriageError};
use crate::message::RawMessage;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageFormat {
    Full,
    Metadata,
}

impl MessageFormat {
    fn as_str(self) -> &'static str {
        match self {
            MessageFormat::Full => "full",
            MessageFormat::Metadata => "metadata",
        }
    }
}

/// Thin async client for the messages endpoints. The bearer credential is
/// passed on every call; the client holds no session state.
#[derive(Debug, Clone)]
pub struct GmailClient {
    client: Client,
    api_base: Url,
}

impl GmailClient {
    pub fn new(config: &MailConfig) -> Result<Self> {
        let api_base = Url::parse(&config.api_base)
            .map_err(|e| TriageError::Validation(format!("Invalid mail API base: {e}")))?;
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_seconds))
            .user_agent(concat!("inbox-triage/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| TriageError::from_reqwest("building mail client", e))?;
        Ok(Self { client, api_base })
    }

    fn messages_url(&self, id: Option<&str>) -> Result<Url> {
        let mut url = self.api_base.clone();
        {
            let mut segments = url
                .path_segments_mut()
                .map_err(|_| TriageError::Validation("Mail API base cannot be a base URL".into()))?;
            segments.pop_if_empty().push("messages");
            if let Some(id) = id {
                segments.push(id);
            }
        }
        Ok(url)
    }

    /// List up to `max_results` message identifiers, newest first.
    pub async fn list_message_ids(&self, token: &str, max_results: u32) -> Result<Vec<String>> {
        let mut url = self.messages_url(None)?;
        url.query_pairs_mut()
            .append_pair("maxResults", &max_results.to_string());

        log::debug!("Listing up to {max_results} messages");
        let response = self
            .client
            .get(url)
            .bearer_auth(token)
            .send()
            .await
            .map_err(|e| TriageError::from_reqwest("listing messages", e))?;
        let response = check_status(response, "list").await?;

        let listing: ListMessagesResponse = response
            .json()
            .await
            .map_err(|e| TriageError::from_reqwest("reading message list", e))?;
        Ok(listing
            .messages
            .unwrap_or_default()
            .into_iter()
            .map(|m| m.id)
            .collect())
    }

    pub async fn get_message(
        &self,
        token: &str,
        id: &str,
        format: MessageFormat,
    ) -> Result<RawMessage> {
        validate_message_id(id)?;
        let mut url = self.messages_url(Some(id))?;
        url.query_pairs_mut().append_pair("format", format.as_str());

        let response = self
            .client
            .get(url)
            .bearer_auth(token)
            .send()
            .await
            .map_err(|e| TriageError::from_reqwest("fetching message", e))?;
        let response = check_status(response, "get").await?;

        let message: GmailMessage = response
            .json()
            .await
            .map_err(|e| TriageError::from_reqwest("reading message", e))?;
        Ok(RawMessage::from(message))
    }
}

/// Turn a non-success response into [`TriageError::Upstream`], keeping the
/// provider's error body as JSON when it parses, as text otherwise.
async fn check_status(response: Response, operation: &str) -> Result<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let details = match response.text().await {
        Ok(body) => serde_json::from_str::<Value>(&body).unwrap_or(Value::String(body)),
        Err(e) => Value::String(format!("Could not read error body: {e}")),
    };
    log::error!("Mail provider {operation} failed with HTTP {status}: {details}");
    Err(TriageError::Upstream {
        status: status.as_u16(),
        details,
    })
}
