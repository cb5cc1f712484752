use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::classifier::SchemaVariant;
use crate::decoding::DecodeLimits;

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub mail: MailConfig,
    #[serde(default)]
    pub classifier: ClassifierConfig,
    #[serde(default)]
    pub limits: LimitsConfig,
    pub logging: Option<LoggingConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub bind_address: String,
    #[serde(default = "default_max_body_bytes")]
    pub max_body_bytes: usize,
}

fn default_max_body_bytes() -> usize {
    1024 * 1024
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_address: "127.0.0.1:3000".to_string(),
            max_body_bytes: default_max_body_bytes(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MailConfig {
    pub api_base: String,
    #[serde(default = "default_max_results")]
    pub default_max_results: u32,
    #[serde(default = "default_max_results_cap")]
    pub max_results_cap: u32,
    #[serde(default = "default_mail_timeout")]
    pub timeout_seconds: u64,
}

fn default_max_results() -> u32 {
    15
}

fn default_max_results_cap() -> u32 {
    50
}

fn default_mail_timeout() -> u64 {
    20
}

impl Default for MailConfig {
    fn default() -> Self {
        Self {
            api_base: "https://gmail.googleapis.com/gmail/v1/users/me".to_string(),
            default_max_results: default_max_results(),
            max_results_cap: default_max_results_cap(),
            timeout_seconds: default_mail_timeout(),
        }
    }
}

impl MailConfig {
    /// Clamp a requested result count to `[1, max_results_cap]`. Anything that
    /// does not parse as an integer falls back to the default.
    pub fn clamp_max_results(&self, requested: Option<&str>) -> u32 {
        let cap = self.max_results_cap.max(1);
        match requested.map(|r| r.trim().parse::<i64>()) {
            Some(Ok(n)) => n.clamp(1, cap as i64) as u32,
            Some(Err(_)) | None => self.default_max_results.clamp(1, cap),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClassifierConfig {
    pub api_base: String,
    pub model: String,
    #[serde(default)]
    pub schema: SchemaVariant,
    #[serde(default = "default_classifier_timeout")]
    pub timeout_seconds: u64,
    pub temperature: Option<f32>,
}

fn default_classifier_timeout() -> u64 {
    60
}

impl Default for ClassifierConfig {
    fn default() -> Self {
        Self {
            api_base: "https://api.openai.com/v1".to_string(),
            model: "gpt-3.5-turbo".to_string(),
            schema: SchemaVariant::default(),
            timeout_seconds: default_classifier_timeout(),
            temperature: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LimitsConfig {
    pub max_encoded_length: usize,
    pub safe_output_chars: usize,
    pub truncation_marker: String,
    pub preview_chars: usize,
    #[serde(default = "default_detail_output_chars")]
    pub detail_output_chars: usize,
}

fn default_detail_output_chars() -> usize {
    crate::decoding::DEFAULT_DETAIL_OUTPUT_CHARS
}

impl Default for LimitsConfig {
    fn default() -> Self {
        let decode = DecodeLimits::default();
        Self {
            max_encoded_length: decode.max_encoded_length,
            safe_output_chars: decode.safe_output_chars,
            truncation_marker: decode.truncation_marker,
            preview_chars: crate::normalization::DEFAULT_PREVIEW_CHARS,
            detail_output_chars: default_detail_output_chars(),
        }
    }
}

impl LimitsConfig {
    pub fn decode_limits(&self) -> DecodeLimits {
        DecodeLimits {
            max_encoded_length: self.max_encoded_length,
            safe_output_chars: self.safe_output_chars,
            truncation_marker: self.truncation_marker.clone(),
        }
    }

    /// Limits for the single-message detail body.
    pub fn detail_decode_limits(&self) -> DecodeLimits {
        self.decode_limits().widened(self.detail_output_chars)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    pub level: String,
}

impl Config {
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        let config: Config = serde_yaml::from_str(&content)
            .with_context(|| format!("Failed to parse YAML config: {}", path.display()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let path = path.as_ref();
        let content = serde_yaml::to_string(self)?;
        std::fs::write(path, content)
            .with_context(|| format!("Failed to write config file: {}", path.display()))?;
        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        if self.mail.max_results_cap == 0 {
            anyhow::bail!("mail.max_results_cap must be at least 1");
        }
        if self.limits.safe_output_chars == 0 {
            anyhow::bail!("limits.safe_output_chars must be positive");
        }
        // Oversized payloads are cut to a whole number of 4-character groups
        if self.limits.max_encoded_length < 4 {
            anyhow::bail!(
                "limits.max_encoded_length must be at least 4, got {}",
                self.limits.max_encoded_length
            );
        }
        url::Url::parse(&self.mail.api_base)
            .with_context(|| format!("Invalid mail.api_base: {}", self.mail.api_base))?;
        url::Url::parse(&self.classifier.api_base)
            .with_context(|| format!("Invalid classifier.api_base: {}", self.classifier.api_base))?;
        self.server
            .bind_address
            .parse::<std::net::SocketAddr>()
            .with_context(|| format!("Invalid server.bind_address: {}", self.server.bind_address))?;
        Ok(())
    }
}
