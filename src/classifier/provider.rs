use reqwest::Client;
use serde::Deserialize;
use serde_json::{json, Value};
use std::time::Duration;

use super::Prompt;
use crate::config::ClassifierConfig;
use crate::error::{Result, SchemaIssue, TriageError};

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatMessage,
}

#[derive(Deserialize)]
struct ChatMessage {
    content: Option<String>,
}

/// Client for an OpenAI-compatible `/chat/completions` endpoint that asks for
/// a JSON object response.
#[derive(Debug, Clone)]
pub struct ChatCompletionsClient {
    client: Client,
    endpoint: String,
    model: String,
    temperature: Option<f32>,
}

impl ChatCompletionsClient {
    pub fn new(config: &ClassifierConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_seconds))
            .build()
            .map_err(|e| TriageError::from_reqwest("building model client", e))?;
        Ok(Self {
            client,
            endpoint: format!("{}/chat/completions", config.api_base.trim_end_matches('/')),
            model: config.model.clone(),
            temperature: config.temperature,
        })
    }

    /// Send one completion request and return the raw message content.
    pub async fn complete(&self, credential: &str, prompt: &Prompt) -> Result<String> {
        let mut body = json!({
            "model": self.model,
            "messages": [
                { "role": "system", "content": prompt.system },
                { "role": "user", "content": prompt.user }
            ],
            "response_format": { "type": "json_object" }
        });
        if let Some(temperature) = self.temperature {
            body["temperature"] = json!(temperature);
        }

        let response = self
            .client
            .post(&self.endpoint)
            .bearer_auth(credential)
            .json(&body)
            .send()
            .await
            .map_err(|e| TriageError::from_reqwest("language model request", e))?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            let message = provider_message(&text)
                .unwrap_or_else(|| status.canonical_reason().unwrap_or("error").to_string());
            log::error!("Language model provider returned HTTP {status}: {message}");
            return Err(TriageError::Provider {
                status: status.as_u16(),
                message,
            });
        }

        let body = response
            .text()
            .await
            .map_err(|e| TriageError::from_reqwest("reading language model response", e))?;
        let parsed: ChatResponse = serde_json::from_str(&body).map_err(|e| {
            log::error!("Language model response is not a chat completion: {e}");
            TriageError::Schema {
                issues: vec![SchemaIssue {
                    path: String::new(),
                    message: format!("response is not a chat completion: {e}"),
                }],
            }
        })?;

        Ok(parsed
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .unwrap_or_default())
    }
}

/// Pull a human-readable message out of a provider error body,
/// e.g. `{"error": {"message": "Incorrect API key provided"}}`.
fn provider_message(body: &str) -> Option<String> {
    let value: Value = serde_json::from_str(body).ok()?;
    let error = value.get("error")?;
    match error {
        Value::String(s) => Some(s.clone()),
        Value::Object(map) => map.get("message").and_then(Value::as_str).map(str::to_string),
        _ => None,
    }
    .or_else(|| {
        let trimmed = body.trim();
        (!trimmed.is_empty()).then(|| trimmed.to_string())
    })
}
