use crate::client::parse_base;
use crate::error::{FetchError, Result};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::debug;
use url::Url;

pub const DEFAULT_COMPLETIONS_BASE: &str = "https://api.openai.com/v1";
pub const DEFAULT_MODEL: &str = "gpt-4o-mini";

#[derive(Debug, Clone, Serialize)]
pub struct ChatMessage {
    pub role: &'static str,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: "system",
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: "user",
            content: content.into(),
        }
    }
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: &'a [ChatMessage],
    temperature: f32,
}

#[derive(Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatReply,
}

#[derive(Deserialize)]
struct ChatReply {
    content: Option<String>,
}

/// Minimal client for an OpenAI-compatible `/chat/completions` endpoint.
pub struct CompletionClient {
    client: Client,
    base: Url,
    api_key: String,
    model: String,
}

impl CompletionClient {
    pub fn new(base: &str, api_key: impl Into<String>, model: impl Into<String>) -> Result<Self> {
        let client = Client::builder()
            .user_agent(concat!("tmplsync/", env!("CARGO_PKG_VERSION")))
            .timeout(Duration::from_secs(120))
            .build()?;

        Ok(Self {
            client,
            base: parse_base(base)?,
            api_key: api_key.into(),
            model: model.into(),
        })
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    /// Send one deterministic (temperature 0) completion and return the
    /// first choice's text. A null content comes back as `"[]"`; a response
    /// without any choice is a `ParseError`.
    pub async fn complete(&self, messages: &[ChatMessage]) -> Result<String> {
        let url = self
            .base
            .join("chat/completions")
            .map_err(|e| FetchError::InvalidUrl(e.to_string()))?;

        let body = ChatRequest {
            model: &self.model,
            messages,
            temperature: 0.0,
        };

        debug!("Requesting completion from {} ({})", url, self.model);
        let response = self
            .client
            .post(url.clone())
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Status {
                status: status.as_u16(),
                url: url.to_string(),
            });
        }

        let parsed: ChatResponse = response
            .json()
            .await
            .map_err(|e| FetchError::ParseError(format!("completion response: {}", e)))?;

        let choice = parsed.choices.into_iter().next().ok_or_else(|| {
            FetchError::ParseError("completion response has no choices".to_string())
        })?;
        Ok(choice.message.content.unwrap_or_else(|| "[]".to_string()))
    }
}
