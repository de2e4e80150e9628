use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::config::CompletionConfig;

#[derive(Debug, thiserror::Error)]
pub enum ProviderError {
    #[error("provider returned status {status}: {body}")]
    Status { status: u16, body: String },
    #[error("request timeout while waiting for the provider")]
    Timeout,
    #[error("transport error: {0}")]
    Transport(String),
    #[error("undecodable provider response: {0}")]
    Decode(String),
    #[error("completion provider is not configured")]
    NotConfigured,
}

impl From<reqwest::Error> for ProviderError {
    fn from(e: reqwest::Error) -> Self {
        // Classification must never see the request URL.
        if e.is_timeout() {
            ProviderError::Timeout
        } else if let Some(status) = e.status() {
            ProviderError::Status {
                status: status.as_u16(),
                body: String::new(),
            }
        } else if e.is_decode() {
            ProviderError::Decode(e.without_url().to_string())
        } else {
            ProviderError::Transport(e.without_url().to_string())
        }
    }
}

/// Coarse class of a provider failure; decides which fallback reply is used.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    RateLimited,
    BadRequest,
    Unavailable,
    Timeout,
    Unknown,
}

impl ProviderError {
    pub fn kind(&self) -> FailureKind {
        match self {
            ProviderError::Status { status: 429, .. } => FailureKind::RateLimited,
            ProviderError::Status { status: 400, .. } => FailureKind::BadRequest,
            ProviderError::Status { status: 503, .. } => FailureKind::Unavailable,
            ProviderError::Timeout => FailureKind::Timeout,
            ProviderError::NotConfigured => FailureKind::Unknown,
            other => classify_message(&other.to_string()),
        }
    }
}

/// Substring classification of a provider error text. Earlier classes win.
pub fn classify_message(message: &str) -> FailureKind {
    let text = message.to_lowercase();
    let has = |needles: &[&str]| needles.iter().any(|n| text.contains(n));
    if has(&["429", "quota", "rate limit"]) {
        FailureKind::RateLimited
    } else if has(&["400", "invalid"]) {
        FailureKind::BadRequest
    } else if has(&["503", "unavailable"]) {
        FailureKind::Unavailable
    } else if has(&["timeout"]) {
        FailureKind::Timeout
    } else {
        FailureKind::Unknown
    }
}

/// A single-turn text completion backend.
#[async_trait]
pub trait CompletionProvider: Send + Sync {
    /// `Ok(None)` means the provider answered without any content.
    async fn complete(&self, prompt: &str) -> Result<Option<String>, ProviderError>;
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Debug, Serialize)]
struct CompletionRequest<'a> {
    model: &'a str,
    messages: [ChatMessage<'a>; 1],
    max_tokens: u32,
    temperature: f32,
}

#[derive(Debug, Deserialize)]
struct CompletionResponse {
    #[serde(default)]
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: Option<ChoiceMessage>,
}

#[derive(Debug, Deserialize)]
struct ChoiceMessage {
    content: Option<String>,
}

impl CompletionResponse {
    fn into_text(self) -> Option<String> {
        self.choices
            .into_iter()
            .next()
            .and_then(|c| c.message)
            .and_then(|m| m.content)
    }
}

/// OpenRouter (OpenAI-compatible) `chat/completions` client.
pub struct OpenRouterProvider {
    client: reqwest::Client,
    config: CompletionConfig,
}

impl OpenRouterProvider {
    pub fn new(config: CompletionConfig) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .connect_timeout(Duration::from_secs(10))
            .build()?;
        Ok(Self { client, config })
    }

    fn endpoint(&self) -> String {
        format!("{}/chat/completions", self.config.base_url.trim_end_matches('/'))
    }
}

#[async_trait]
impl CompletionProvider for OpenRouterProvider {
    async fn complete(&self, prompt: &str) -> Result<Option<String>, ProviderError> {
        let api_key = self
            .config
            .api_key
            .as_deref()
            .ok_or(ProviderError::NotConfigured)?;

        let body = CompletionRequest {
            model: &self.config.model,
            messages: [ChatMessage {
                role: "user",
                content: prompt,
            }],
            max_tokens: self.config.max_tokens,
            temperature: self.config.temperature,
        };

        let mut req = self.client.post(self.endpoint()).bearer_auth(api_key).json(&body);
        if let Some(site_url) = &self.config.site_url {
            req = req.header("HTTP-Referer", site_url);
        }
        if let Some(site_name) = &self.config.site_name {
            req = req.header("X-Title", site_name);
        }

        let res = req.send().await?;
        let status = res.status();
        if !status.is_success() {
            let body = res.text().await.unwrap_or_default();
            return Err(ProviderError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let parsed: CompletionResponse = res.json().await?;
        debug!(model = %self.config.model, "completion received");
        Ok(parsed.into_text())
    }
}
