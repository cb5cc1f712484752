use axum::extract::rejection::JsonRejection;
use axum::extract::{DefaultBodyLimit, Path, Query, State};
use axum::http::{header, HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::collections::HashMap;
use std::sync::Arc;

use crate::batch::BatchFetcher;
use crate::classifier::{Classification, ClassificationOrchestrator};
use crate::config::{Config, MailConfig};
use crate::decoding::ContentDecoder;
use crate::error::TriageError;
use crate::extraction::BodyExtractor;
use crate::gmail::{GmailClient, MessageFormat};
use crate::normalization::{CanonicalRecord, MessageDetail, MessageNormalizer};

/// Error envelope: `{ "error": ..., "details"?: ..., "remediation"?: ... }`.
pub struct ApiError(TriageError);

impl From<TriageError> for ApiError {
    fn from(err: TriageError) -> Self {
        ApiError(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let err = self.0;
        let status =
            StatusCode::from_u16(err.status_code()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        if status.is_server_error() {
            log::error!("Request failed: {err}");
        } else {
            log::debug!("Request rejected: {err}");
        }

        let mut body = json!({ "error": err.to_string() });
        if let Some(details) = err.details() {
            body["details"] = details;
        }
        if let Some(remediation) = err.remediation() {
            body["remediation"] = json!(remediation);
        }
        (status, Json(body)).into_response()
    }
}

/// Shared, cheaply cloneable handler state.
#[derive(Clone)]
pub struct AppState {
    gmail: GmailClient,
    fetcher: Arc<BatchFetcher>,
    normalizer: Arc<MessageNormalizer>,
    orchestrator: ClassificationOrchestrator,
    mail: Arc<MailConfig>,
}

impl AppState {
    pub fn from_config(config: &Config) -> crate::error::Result<Self> {
        let decoder = ContentDecoder::new(config.limits.decode_limits());
        let normalizer = Arc::new(
            MessageNormalizer::new(BodyExtractor::new(decoder), config.limits.preview_chars)
                .with_detail_extractor(BodyExtractor::new(ContentDecoder::new(
                    config.limits.detail_decode_limits(),
                ))),
        );
        Ok(Self {
            gmail: GmailClient::new(&config.mail)?,
            fetcher: Arc::new(BatchFetcher::new(Arc::clone(&normalizer))),
            normalizer,
            orchestrator: ClassificationOrchestrator::new(&config.classifier)?,
            mail: Arc::new(config.mail.clone()),
        })
    }
}

#[derive(Debug, Serialize)]
pub struct EmailsResponse {
    pub emails: Vec<CanonicalRecord>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClassifyRequest {
    #[serde(default)]
    pub emails: Vec<CanonicalRecord>,
    #[serde(default, alias = "apiKey")]
    pub credential: String,
}

#[derive(Debug, Serialize)]
pub struct ClassifyResponse {
    pub classifications: Vec<Classification>,
}

pub fn build_router(state: AppState, max_body_bytes: usize) -> Router {
    Router::new()
        .route("/api/emails", get(list_emails))
        .route("/api/email/:id", get(email_detail).post(email_detail))
        .route("/api/classify", post(classify))
        .with_state(state)
        .layer(DefaultBodyLimit::max(max_body_bytes))
}

pub async fn run_server(config: Config) -> anyhow::Result<()> {
    let state = AppState::from_config(&config)?;
    let app = build_router(state, config.server.max_body_bytes);

    let listener = tokio::net::TcpListener::bind(&config.server.bind_address).await?;
    log::info!("Inbox triage server listening on {}", listener.local_addr()?);
    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            log::info!("Shutdown signal received");
        })
        .await?;
    Ok(())
}

fn bearer_token(headers: &HeaderMap) -> Result<&str, ApiError> {
    headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .ok_or_else(|| TriageError::Unauthorized("Unauthorized".to_string()).into())
}

async fn list_emails(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(query): Query<HashMap<String, String>>,
) -> Result<Json<EmailsResponse>, ApiError> {
    let token = bearer_token(&headers)?;
    let max_results = state
        .mail
        .clamp_max_results(query.get("maxResults").map(String::as_str));

    let ids = state.gmail.list_message_ids(token, max_results).await?;
    let emails = state
        .fetcher
        .fetch_from_gmail(&state.gmail, token, &ids, MessageFormat::Full)
        .await;
    log::info!("Listed {} of {} messages", emails.len(), ids.len());
    Ok(Json(EmailsResponse { emails }))
}

async fn email_detail(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> Result<Json<MessageDetail>, ApiError> {
    let token = bearer_token(&headers)?;
    let raw = state.gmail.get_message(token, &id, MessageFormat::Full).await?;
    Ok(Json(state.normalizer.detail(&raw)))
}

async fn classify(
    State(state): State<AppState>,
    payload: Result<Json<ClassifyRequest>, JsonRejection>,
) -> Result<Json<ClassifyResponse>, ApiError> {
    let Json(request) =
        payload.map_err(|e| TriageError::Validation(format!("Invalid request body: {e}")))?;
    let classifications = state
        .orchestrator
        .classify(&request.emails, &request.credential)
        .await?;
    Ok(Json(ClassifyResponse { classifications }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::spawn_fake;
    use axum::body::{to_bytes, Body};
    use axum::http::Request;
    use base64::engine::general_purpose::URL_SAFE_NO_PAD;
    use base64::Engine as _;
    use serde_json::Value;
    use tower::ServiceExt;

    fn fake_mail_api() -> Router {
        Router::new()
            .route(
                "/messages",
                get(|Query(q): Query<HashMap<String, String>>| async move {
                    let n: usize = q.get("maxResults").and_then(|v| v.parse().ok()).unwrap_or(0);
                    let ids: Vec<Value> = ["m1", "m2", "broken"]
                        .iter()
                        .take(n)
                        .map(|id| json!({"id": id, "threadId": "t"}))
                        .collect();
                    Json(json!({ "messages": ids }))
                }),
            )
            .route(
                "/messages/:id",
                get(|Path(id): Path<String>| async move {
                    if id == "broken" {
                        return (StatusCode::INTERNAL_SERVER_ERROR, Json(json!({"error": "boom"})));
                    }
                    let plain = URL_SAFE_NO_PAD.encode(format!("plain {id}\nline two"));
                    let html = URL_SAFE_NO_PAD.encode(long_or_short_html(&id));
                    (
                        StatusCode::OK,
                        Json(json!({
                            "id": id,
                            "threadId": "t",
                            "snippet": format!("snippet {id}"),
                            "payload": {
                                "mimeType": "multipart/alternative",
                                "headers": [
                                    {"name": "From", "value": "Alice <a@x.com>"},
                                    {"name": "Subject", "value": format!("About {id}")},
                                    {"name": "Date", "value": "Tue, 14 Nov 2023 09:05:00 +0000"}
                                ],
                                "parts": [
                                    {"mimeType": "text/plain", "body": {"data": plain}},
                                    {"mimeType": "text/html", "body": {"data": html}}
                                ]
                            }
                        })),
                    )
                }),
            )
    }

    fn long_or_short_html(id: &str) -> String {
        if id == "long" {
            format!("<p>{}</p>", "x".repeat(3000))
        } else {
            format!("<p>html {id}</p>")
        }
    }

    fn fake_model_api() -> Router {
        Router::new().route(
            "/chat/completions",
            post(|headers: HeaderMap| async move {
                if headers.get("authorization").and_then(|v| v.to_str().ok()) != Some("Bearer sk-good") {
                    return (
                        StatusCode::UNAUTHORIZED,
                        Json(json!({"error": {"message": "Incorrect API key provided"}})),
                    );
                }
                let content = json!({"classifications": [
                    {"id": "m1", "category": "Important", "confidence": 0.9, "reasoning": "colleague"}
                ]});
                (
                    StatusCode::OK,
                    Json(json!({"choices": [{"message": {"content": content.to_string()}}]})),
                )
            }),
        )
    }

    async fn app() -> Router {
        let mut config = Config::default();
        config.mail.api_base = spawn_fake(fake_mail_api()).await;
        config.classifier.api_base = spawn_fake(fake_model_api()).await;
        build_router(AppState::from_config(&config).unwrap(), config.server.max_body_bytes)
    }

    async fn send(app: Router, request: Request<Body>) -> (StatusCode, Value) {
        let response = app.oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, serde_json::from_slice(&bytes).unwrap_or(Value::Null))
    }

    fn get_with_token(uri: &str) -> Request<Body> {
        Request::builder()
            .uri(uri)
            .header("authorization", "Bearer mail-token")
            .body(Body::empty())
            .unwrap()
    }

    fn classify_request(body: Value) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri("/api/classify")
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    #[tokio::test]
    async fn test_list_requires_bearer() {
        let request = Request::builder().uri("/api/emails").body(Body::empty()).unwrap();
        let (status, body) = send(app().await, request).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body["error"], "Unauthorized");
    }

    #[tokio::test]
    async fn test_list_normalises_and_drops_failures() {
        let (status, body) = send(app().await, get_with_token("/api/emails?maxResults=3")).await;
        assert_eq!(status, StatusCode::OK);
        let emails = body["emails"].as_array().unwrap();
        assert_eq!(emails.len(), 2);
        assert_eq!(emails[0]["id"], "m1");
        assert_eq!(emails[1]["id"], "m2");
        assert_eq!(emails[0]["sender"], "Alice <a@x.com>");
        assert_eq!(emails[0]["bodyPreview"], "plain m1\nline two");
        assert_eq!(emails[0]["date"], "11/14/2023, 9:05:00 AM");
        assert!(emails[0].get("classification").is_none());
    }

    #[tokio::test]
    async fn test_detail_prefers_html() {
        let (status, body) = send(app().await, get_with_token("/api/email/m2")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["id"], "m2");
        assert_eq!(body["body"], "<p>html m2</p>");
        assert_eq!(body["date"], "Tue, 14 Nov 2023 09:05:00 +0000");
    }

    #[tokio::test]
    async fn test_detail_returns_whole_long_html() {
        let (status, body) = send(app().await, get_with_token("/api/email/long")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["body"], long_or_short_html("long"));
    }

    #[tokio::test]
    async fn test_detail_surfaces_upstream_status() {
        let (status, body) = send(app().await, get_with_token("/api/email/broken")).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body["details"]["error"], "boom");
    }

    #[tokio::test]
    async fn test_classify_round_trip() {
        let request = classify_request(json!({
            "emails": [{"id": "m1", "from": "a@x.com", "subject": "Hi", "snippet": "", "bodyPreview": "", "date": ""}],
            "apiKey": "sk-good"
        }));
        let (status, body) = send(app().await, request).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["classifications"][0]["id"], "m1");
        assert_eq!(body["classifications"][0]["category"], "Important");
    }

    #[tokio::test]
    async fn test_classify_input_errors() {
        let (status, _) = send(
            app().await,
            classify_request(json!({"emails": [], "credential": "sk-good"})),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let (status, body) = send(
            app().await,
            classify_request(json!({"emails": [{"id": "m1", "sender": "s", "subject": "x"}]})),
        )
        .await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert!(body["remediation"].is_string());
    }

    #[tokio::test]
    async fn test_classify_provider_error_keeps_status() {
        let request = classify_request(json!({
            "emails": [{"id": "m1", "sender": "s", "subject": "x"}],
            "credential": "sk-bad"
        }));
        let (status, body) = send(app().await, request).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body["details"], "Incorrect API key provided");
    }

    #[tokio::test]
    async fn test_malformed_body_is_bad_request() {
        let request = Request::builder()
            .method("POST")
            .uri("/api/classify")
            .header("content-type", "application/json")
            .body(Body::from("{not json"))
            .unwrap();
        let (status, body) = send(app().await, request).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(body["error"].as_str().unwrap().starts_with("Invalid request body"));
    }
}
