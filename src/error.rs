use serde::Serialize;
use serde_json::Value;

/// One failed check from strict response validation. `path` is a JSON
/// pointer-ish location such as `[2].category`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SchemaIssue {
    pub path: String,
    pub message: String,
}

impl std::fmt::Display for SchemaIssue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.path.is_empty() {
            write!(f, "{}", self.message)
        } else {
            write!(f, "{}: {}", self.path, self.message)
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum TriageError {
    #[error("{0}")]
    Validation(String),
    #[error("{0}")]
    Unauthorized(String),
    #[error("Mail provider returned HTTP {status}")]
    Upstream { status: u16, details: Value },
    #[error("Language model provider error ({status}): {message}")]
    Provider { status: u16, message: String },
    #[error("Invalid classification format from language model ({} issue(s))", issues.len())]
    Schema { issues: Vec<SchemaIssue> },
    #[error("Language model returned an empty response")]
    EmptyResponse,
    #[error("Request timed out: {0}")]
    Timeout(String),
    #[error("Network error: {0}")]
    Transport(String),
}

impl TriageError {
    pub fn status_code(&self) -> u16 {
        match self {
            TriageError::Validation(_) => 400,
            TriageError::Unauthorized(_) => 401,
            TriageError::Upstream { status, .. } => *status,
            TriageError::Provider { status, .. } => *status,
            TriageError::Schema { .. } | TriageError::EmptyResponse => 500,
            TriageError::Timeout(_) => 504,
            TriageError::Transport(_) => 502,
        }
    }

    /// Machine-readable payload accompanying the summary, when one exists.
    pub fn details(&self) -> Option<Value> {
        match self {
            TriageError::Upstream { details, .. } => Some(details.clone()),
            TriageError::Provider { message, .. } => Some(Value::String(message.clone())),
            TriageError::Schema { issues } => serde_json::to_value(issues).ok(),
            _ => None,
        }
    }

    /// Hint for the caller on what to do next. Provider auth failures and
    /// format problems need different remediation.
    pub fn remediation(&self) -> Option<&'static str> {
        match self {
            TriageError::Unauthorized(_) => Some("Sign in again to obtain a fresh access token."),
            TriageError::Provider { status: 401 | 403, .. } => {
                Some("Check that your language model API key is valid.")
            }
            TriageError::Provider { status: 429, .. } => {
                Some("The language model provider is rate limiting requests; try again shortly.")
            }
            TriageError::Schema { .. } | TriageError::EmptyResponse => {
                Some("The model returned an unexpected response format; try again.")
            }
            TriageError::Timeout(_) => Some("The request timed out; try again."),
            _ => None,
        }
    }

    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            TriageError::Timeout(_)
                | TriageError::Transport(_)
                | TriageError::Provider { status: 429, .. }
        ) || matches!(self, TriageError::Provider { status, .. } if *status >= 500)
    }

    pub(crate) fn from_reqwest(context: &str, err: reqwest::Error) -> Self {
        if err.is_timeout() {
            TriageError::Timeout(format!("{context}: {err}"))
        } else {
            TriageError::Transport(format!("{context}: {err}"))
        }
    }
}

pub type Result<T> = std::result::Result<T, TriageError>;
