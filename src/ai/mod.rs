// =============================================================================
// AI adapter — provider-agnostic HTTP completion client
// =============================================================================

use anyhow::{Context, Result};
use async_trait::async_trait;
use thiserror::Error;
use tracing::{debug, instrument, warn};

#[derive(Debug, Error)]
pub enum AiError {
    #[error("AI provider request timed out after {0:?}")]
    Timeout(std::time::Duration),
    #[error("AI provider returned an error: {0}")]
    Provider(String),
}

#[async_trait]
pub trait AiAdapter: Send + Sync {
    async fn call(&self, system_prompt: &str, user_prompt: &str) -> Result<String>;
}

/// Identifies which upstream model a request targets; the committee (§4.3)
/// addresses each of these independently.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ModelProvider {
    Qwen,
    DeepSeek,
    Claude,
    Gpt,
}

impl ModelProvider {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Qwen => "qwen",
            Self::DeepSeek => "deepseek",
            Self::Claude => "claude",
            Self::Gpt => "gpt",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "qwen" => Some(Self::Qwen),
            "deepseek" => Some(Self::DeepSeek),
            "claude" => Some(Self::Claude),
            "gpt" => Some(Self::Gpt),
            _ => None,
        }
    }
}

/// HTTP-backed AI client. One instance per provider identity; each points at
/// that provider's OpenAI-compatible chat-completions endpoint.
pub struct HttpAiClient {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
    model: String,
    timeout: std::time::Duration,
}

impl HttpAiClient {
    pub fn new(base_url: impl Into<String>, api_key: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::builder()
                .timeout(std::time::Duration::from_secs(30))
                .build()
                .expect("failed to build reqwest client for HttpAiClient"),
            base_url: base_url.into(),
            api_key: api_key.into(),
            model: model.into(),
            timeout: std::time::Duration::from_secs(30),
        }
    }

    pub fn with_timeout(mut self, timeout: std::time::Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

#[async_trait]
impl AiAdapter for HttpAiClient {
    #[instrument(skip(self, system_prompt, user_prompt), name = "ai::call")]
    async fn call(&self, system_prompt: &str, user_prompt: &str) -> Result<String> {
        let url = format!("{}/chat/completions", self.base_url);
        let payload = serde_json::json!({
            "model": self.model,
            "messages": [
                {"role": "system", "content": system_prompt},
                {"role": "user", "content": user_prompt},
            ],
        });

        let fut = self
            .client
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(&payload)
            .send();

        let resp = tokio::time::timeout(self.timeout, fut)
            .await
            .map_err(|_| AiError::Timeout(self.timeout))?
            .context("AI provider request failed")?;

        let status = resp.status();
        let body: serde_json::Value = resp.json().await.context("failed to parse AI provider response")?;

        if !status.is_success() {
            let msg = body["error"]["message"]
                .as_str()
                .unwrap_or("unknown error")
                .to_string();
            warn!(status = %status, "AI provider returned an error");
            return Err(AiError::Provider(msg).into());
        }

        let text = body["choices"][0]["message"]["content"]
            .as_str()
            .context("AI provider response missing choices[0].message.content")?
            .to_string();

        debug!(model = %self.model, response_len = text.len(), "AI call completed");
        Ok(text)
    }
}
