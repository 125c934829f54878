//! Extraction client: one conversation in, one [`ExtractionBatch`] out.
//!
//! The remote call goes through the [`MessagesApi`] trait so tests can
//! script failures; the production implementation is [`AnthropicTransport`].
//! Delays between attempts go through [`Sleeper`] for the same reason.
//!
//! # Retry Strategy
//!
//! - Retryable transport failure (HTTP 429, 5xx, network error) → sleep
//!   `retry_delay * attempt` and try again, up to `retry_attempts` calls.
//! - Any other transport failure → fail immediately.
//! - Response text that is not a JSON object → fail immediately; the text
//!   is never repaired or unwrapped from code fences.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, warn};

use crate::config::ExtractionConfig;
use crate::models::ExtractionBatch;
use crate::prompt::{build_extraction_prompt, EXTRACTION_SYSTEM_PROMPT};

const ANTHROPIC_VERSION: &str = "2023-06-01";

/// Failure of a single call to the remote service.
#[derive(Debug, Error)]
pub enum TransportError {
    /// Rate limiting, overload, server error or lost connection.
    #[error("service unavailable: {0}")]
    Service(String),

    /// The service refused the request (bad key, bad request, ...).
    #[error("request rejected with status {status}: {body}")]
    Rejected { status: u16, body: String },

    /// The response envelope could not be read.
    #[error("could not decode response: {0}")]
    Decode(String),
}

impl TransportError {
    pub fn is_retryable(&self) -> bool {
        matches!(self, TransportError::Service(_))
    }
}

/// Terminal outcome of [`ExtractionClient::extract`] when no batch was produced.
#[derive(Debug, Error)]
pub enum ExtractionError {
    #[error("API error after retries ({attempts} attempts): {last}")]
    RetriesExhausted { attempts: u32, last: String },

    #[error("JSON decode error: {0}")]
    MalformedResponse(String),

    #[error("Unexpected error: {0}")]
    Unexpected(String),
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Message {
    pub role: String,
    pub content: String,
}

/// Body of a messages-API call.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MessageRequest {
    pub model: String,
    pub max_tokens: u32,
    pub system: String,
    pub messages: Vec<Message>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ContentBlock {
    #[serde(rename = "type", default)]
    pub block_type: String,
    #[serde(default)]
    pub text: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct MessageResponse {
    #[serde(default)]
    pub content: Vec<ContentBlock>,
}

impl MessageResponse {
    /// A response whose single content block is `text`.
    pub fn from_text(text: impl Into<String>) -> Self {
        Self {
            content: vec![ContentBlock {
                block_type: "text".to_string(),
                text: Some(text.into()),
            }],
        }
    }
}

/// The remote structured-extraction service.
#[async_trait]
pub trait MessagesApi: Send + Sync {
    async fn create_message(
        &self,
        request: &MessageRequest,
    ) -> Result<MessageResponse, TransportError>;
}

/// Suspension between retry attempts.
#[async_trait]
pub trait Sleeper: Send + Sync {
    async fn sleep(&self, duration: Duration);
}

pub struct TokioSleeper;

#[async_trait]
impl Sleeper for TokioSleeper {
    async fn sleep(&self, duration: Duration) {
        tokio::time::sleep(duration).await;
    }
}

/// Messages API over HTTPS.
pub struct AnthropicTransport {
    client: reqwest::Client,
    endpoint: String,
    api_key: String,
}

impl AnthropicTransport {
    pub fn new(config: &ExtractionConfig, api_key: impl Into<String>) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;
        Ok(Self {
            client,
            endpoint: format!("{}/v1/messages", config.base_url.trim_end_matches('/')),
            api_key: api_key.into(),
        })
    }

    /// Reads the credential from the variable named by `api_key_env`.
    pub fn from_env(config: &ExtractionConfig) -> anyhow::Result<Self> {
        let api_key = std::env::var(&config.api_key_env)
            .ok()
            .filter(|k| !k.trim().is_empty())
            .ok_or_else(|| {
                anyhow::anyhow!("{} environment variable not set", config.api_key_env)
            })?;
        Self::new(config, api_key)
    }
}

#[async_trait]
impl MessagesApi for AnthropicTransport {
    async fn create_message(
        &self,
        request: &MessageRequest,
    ) -> Result<MessageResponse, TransportError> {
        let response = self
            .client
            .post(&self.endpoint)
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", ANTHROPIC_VERSION)
            .header("Content-Type", "application/json")
            .json(request)
            .send()
            .await
            .map_err(|e| TransportError::Service(e.to_string()))?;

        let status = response.status();
        if status.is_success() {
            return response
                .json::<MessageResponse>()
                .await
                .map_err(|e| TransportError::Decode(e.to_string()));
        }

        let body = response.text().await.unwrap_or_default();
        // 529 is the service's "overloaded" status.
        if status.as_u16() == 429 || status.is_server_error() || status.as_u16() == 529 {
            return Err(TransportError::Service(format!("{}: {}", status, body)));
        }
        Err(TransportError::Rejected {
            status: status.as_u16(),
            body,
        })
    }
}

/// Retry-governed wrapper around a [`MessagesApi`].
pub struct ExtractionClient {
    api: Box<dyn MessagesApi>,
    sleeper: Box<dyn Sleeper>,
    model: String,
    max_tokens: u32,
    retry_attempts: u32,
    retry_delay: Duration,
}

impl ExtractionClient {
    pub fn new(config: &ExtractionConfig, api: Box<dyn MessagesApi>) -> Self {
        Self::with_sleeper(config, api, Box::new(TokioSleeper))
    }

    pub fn with_sleeper(
        config: &ExtractionConfig,
        api: Box<dyn MessagesApi>,
        sleeper: Box<dyn Sleeper>,
    ) -> Self {
        Self {
            api,
            sleeper,
            model: config.model.clone(),
            max_tokens: config.max_tokens,
            retry_attempts: config.retry_attempts.max(1),
            retry_delay: Duration::from_secs(config.retry_delay_secs),
        }
    }

    pub fn build_request(
        &self,
        conversation_text: &str,
        source: &str,
        source_date: &str,
        context: &str,
    ) -> MessageRequest {
        MessageRequest {
            model: self.model.clone(),
            max_tokens: self.max_tokens,
            system: EXTRACTION_SYSTEM_PROMPT.to_string(),
            messages: vec![Message {
                role: "user".to_string(),
                content: build_extraction_prompt(conversation_text, source, source_date, context),
            }],
        }
    }

    /// Sends one conversation for extraction.
    ///
    /// Returns the parsed batch exactly as the service produced it; a batch
    /// may still carry its own `error` member, which callers must check.
    pub async fn extract(
        &self,
        conversation_text: &str,
        source: &str,
        source_date: &str,
        context: &str,
    ) -> Result<ExtractionBatch, ExtractionError> {
        let request = self.build_request(conversation_text, source, source_date, context);

        let mut attempt = 1u32;
        let response = loop {
            match self.api.create_message(&request).await {
                Ok(response) => break response,
                Err(e) if e.is_retryable() => {
                    if attempt >= self.retry_attempts {
                        return Err(ExtractionError::RetriesExhausted {
                            attempts: attempt,
                            last: e.to_string(),
                        });
                    }
                    let delay = self.retry_delay * attempt;
                    warn!(
                        "extraction attempt {}/{} failed: {}; retrying in {:?}",
                        attempt, self.retry_attempts, e, delay
                    );
                    self.sleeper.sleep(delay).await;
                    attempt += 1;
                }
                Err(e) => return Err(ExtractionError::Unexpected(e.to_string())),
            }
        };

        let text = response
            .content
            .first()
            .and_then(|block| block.text.as_deref())
            .ok_or_else(|| ExtractionError::Unexpected("response had no text content".into()))?;

        debug!("extraction response: {} chars", text.len());
        parse_batch(text)
    }
}

/// Parses the service's text payload. Only a JSON object is accepted.
pub fn parse_batch(text: &str) -> Result<ExtractionBatch, ExtractionError> {
    match serde_json::from_str::<Value>(text) {
        Ok(Value::Object(map)) => Ok(ExtractionBatch::from_map(map)),
        Ok(other) => Err(ExtractionError::MalformedResponse(format!(
            "expected a JSON object, got {}",
            json_kind(&other)
        ))),
        Err(e) => {
            let preview: String = text.chars().take(200).collect();
            warn!("could not parse extraction response: {} ({:?})", e, preview);
            Err(ExtractionError::MalformedResponse(e.to_string()))
        }
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}
