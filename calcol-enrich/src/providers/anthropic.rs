//! Anthropic messages client
//!
//! # API Reference
//! - Endpoint: `POST https://api.anthropic.com/v1/messages`
//! - Auth: `x-api-key` header plus `anthropic-version: 2023-06-01`

use super::openai::{generative_result, HISTORIAN_SYSTEM_PROMPT, MAX_TOKENS};
use super::{decode_json, non_empty, GenerativeProvider, ProviderError};
use crate::config::{HttpSettings, ProviderConfig};
use crate::types::GenerativeResult;
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, warn};

/// Messages endpoint
pub const ANTHROPIC_API_URL: &str = "https://api.anthropic.com/v1/messages";

pub const ANTHROPIC_MODEL: &str = "claude-3-haiku-20240307";
pub const ANTHROPIC_VERSION: &str = "2023-06-01";

/// Anthropic client
pub struct AnthropicClient {
    http: Client,
    endpoint: String,
    api_key: String,
    timeout: Duration,
    max_body_bytes: usize,
}

#[derive(Debug, Serialize)]
struct Message<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Debug, Serialize)]
struct MessagesRequest<'a> {
    model: &'a str,
    max_tokens: u32,
    system: &'a str,
    messages: Vec<Message<'a>>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct MessagesResponse {
    #[serde(default)]
    content: Vec<ContentBlock>,
}

#[derive(Debug, Deserialize)]
struct ContentBlock {
    #[serde(default)]
    text: Option<String>,
}

impl MessagesResponse {
    pub(crate) fn into_text(self) -> Option<String> {
        self.content.into_iter().next().and_then(|block| block.text)
    }
}

impl AnthropicClient {
    /// None without an API key
    pub fn new(http: Client, config: &ProviderConfig, settings: &HttpSettings) -> Option<Self> {
        Some(Self {
            http,
            endpoint: config.base_url.clone(),
            api_key: non_empty(config.api_key.clone())?,
            timeout: settings.timeout,
            max_body_bytes: settings.max_body_bytes,
        })
    }
}

#[async_trait]
impl GenerativeProvider for AnthropicClient {
    fn name(&self) -> &'static str {
        "anthropic"
    }

    async fn query_generative(
        &self,
        prompt: &str,
    ) -> Result<Option<GenerativeResult>, ProviderError> {
        let request = MessagesRequest {
            model: ANTHROPIC_MODEL,
            max_tokens: MAX_TOKENS,
            system: HISTORIAN_SYSTEM_PROMPT,
            messages: vec![Message {
                role: "user",
                content: prompt,
            }],
        };

        debug!(prompt_chars = prompt.len(), "Calling Anthropic");
        let response = self
            .http
            .post(&self.endpoint)
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", ANTHROPIC_VERSION)
            .json(&request)
            .timeout(self.timeout)
            .send()
            .await?;
        let response: MessagesResponse = decode_json(response, self.max_body_bytes).await?;

        let result = response.into_text().and_then(generative_result);
        if result.is_none() {
            warn!("Anthropic response carried no text");
        }
        Ok(result)
    }
}
