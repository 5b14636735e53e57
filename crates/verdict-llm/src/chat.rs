//! OpenAI-compatible `/chat/completions` client.

use std::time::Duration;

use reqwest::StatusCode;
use reqwest::header::{HeaderMap, RETRY_AFTER};
use serde::{Deserialize, Serialize};
use verdict_config::LlmConfig;

use crate::Generator;
use crate::error::GenerationError;

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: [ChatMessage<'a>; 2],
    temperature: f32,
    max_tokens: u32,
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChoiceMessage {
    #[serde(default)]
    content: Option<String>,
}

/// Generator backed by an OpenAI-compatible chat completions endpoint.
pub struct HttpGenerator {
    http: reqwest::Client,
    endpoint: String,
    api_key: String,
    model: String,
    temperature: f32,
    max_tokens: u32,
}

impl HttpGenerator {
    /// Build a client from the `[llm]` config section.
    ///
    /// # Errors
    ///
    /// Returns [`GenerationError::NotConfigured`] if the URL, key, or model is
    /// missing, or [`GenerationError::Http`] if the HTTP client fails to build.
    pub fn from_config(config: &LlmConfig) -> Result<Self, GenerationError> {
        if !config.is_configured() {
            return Err(GenerationError::NotConfigured(
                "llm.base_url, llm.api_key and llm.model are required".to_string(),
            ));
        }
        let http = reqwest::Client::builder()
            .user_agent(concat!("verdict/", env!("CARGO_PKG_VERSION")))
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;
        Ok(Self {
            http,
            endpoint: format!("{}/chat/completions", config.base_url.trim_end_matches('/')),
            api_key: config.api_key.clone(),
            model: config.model.clone(),
            temperature: config.temperature,
            max_tokens: config.max_tokens,
        })
    }

    #[must_use]
    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

impl Generator for HttpGenerator {
    async fn generate(
        &self,
        system_prompt: &str,
        user_context: &str,
    ) -> Result<String, GenerationError> {
        let body = ChatRequest {
            model: &self.model,
            messages: [
                ChatMessage {
                    role: "system",
                    content: system_prompt,
                },
                ChatMessage {
                    role: "user",
                    content: user_context,
                },
            ],
            temperature: self.temperature,
            max_tokens: self.max_tokens,
        };

        let resp = self
            .http
            .post(&self.endpoint)
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await?;
        let status = resp.status();
        if !status.is_success() {
            let retry_after = retry_after(resp.headers());
            let body = resp.text().await.unwrap_or_default();
            tracing::debug!(model = %self.model, %status, "generation failed");
            return Err(failed_generation(status, retry_after, body));
        }

        let text = resp.text().await?;
        let content = parse_completion(&text)?;
        tracing::debug!(model = %self.model, chars = content.len(), "generation completed");
        Ok(content)
    }
}

/// Overload and server faults are worth another attempt; anything else the
/// endpoint refused outright.
fn failed_generation(status: StatusCode, retry_after: Option<Duration>, body: String) -> GenerationError {
    if status.is_server_error()
        || status == StatusCode::TOO_MANY_REQUESTS
        || status == StatusCode::REQUEST_TIMEOUT
    {
        GenerationError::Unavailable {
            status: status.as_u16(),
            retry_after,
            body,
        }
    } else {
        GenerationError::Rejected {
            status: status.as_u16(),
            body,
        }
    }
}

/// `Retry-After` in delay-seconds form. HTTP dates are ignored.
fn retry_after(headers: &HeaderMap) -> Option<Duration> {
    headers
        .get(RETRY_AFTER)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.trim().parse::<u64>().ok())
        .map(Duration::from_secs)
}

/// Extract the first choice's message content from a completion body.
fn parse_completion(body: &str) -> Result<String, GenerationError> {
    let parsed: ChatResponse =
        serde_json::from_str(body).map_err(|e| GenerationError::Parse(e.to_string()))?;
    parsed
        .choices
        .into_iter()
        .next()
        .and_then(|c| c.message.content)
        .filter(|c| !c.trim().is_empty())
        .ok_or(GenerationError::EmptyCompletion)
}
