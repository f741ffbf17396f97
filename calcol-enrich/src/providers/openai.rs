//! OpenAI chat-completions client
//!
//! # API Reference
//! - Endpoint: `POST https://api.openai.com/v1/chat/completions`
//! - Auth: `Authorization: Bearer <key>`

use super::{decode_json, non_empty, GenerativeProvider, ProviderError};
use crate::config::{HttpSettings, ProviderConfig};
use crate::types::GenerativeResult;
use async_trait::async_trait;
use once_cell::sync::Lazy;
use regex::Regex;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, warn};

/// Chat-completions endpoint
pub const OPENAI_API_URL: &str = "https://api.openai.com/v1/chat/completions";

pub const OPENAI_MODEL: &str = "gpt-4o-mini";

/// System message shared by both generative backends
pub const HISTORIAN_SYSTEM_PROMPT: &str = "You are a calculator historian and expert. Provide detailed, accurate information about vintage calculators.";

pub(crate) const MAX_TOKENS: u32 = 1000;
const TEMPERATURE: f32 = 0.7;

static URL_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"https?://\S+").expect("valid url pattern"));

/// Wrap generated prose, collecting every URL it mentions
pub fn generative_result(content: String) -> Option<GenerativeResult> {
    if content.trim().is_empty() {
        return None;
    }
    let extracted_urls = URL_RE
        .find_iter(&content)
        .map(|m| m.as_str().to_string())
        .collect();
    Some(GenerativeResult {
        content,
        extracted_urls,
    })
}

/// OpenAI client
pub struct OpenAiClient {
    http: Client,
    endpoint: String,
    api_key: String,
    timeout: Duration,
    max_body_bytes: usize,
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    max_tokens: u32,
    temperature: f32,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ChatResponse {
    #[serde(default)]
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    #[serde(default)]
    message: Option<ChatChoiceMessage>,
}

#[derive(Debug, Deserialize)]
struct ChatChoiceMessage {
    #[serde(default)]
    content: Option<String>,
}

impl ChatResponse {
    pub(crate) fn into_content(self) -> Option<String> {
        self.choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message)
            .and_then(|message| message.content)
    }
}

impl OpenAiClient {
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
impl GenerativeProvider for OpenAiClient {
    fn name(&self) -> &'static str {
        "openai"
    }

    async fn query_generative(
        &self,
        prompt: &str,
    ) -> Result<Option<GenerativeResult>, ProviderError> {
        let request = ChatRequest {
            model: OPENAI_MODEL,
            messages: vec![
                ChatMessage {
                    role: "system",
                    content: HISTORIAN_SYSTEM_PROMPT,
                },
                ChatMessage {
                    role: "user",
                    content: prompt,
                },
            ],
            max_tokens: MAX_TOKENS,
            temperature: TEMPERATURE,
        };

        debug!(prompt_chars = prompt.len(), "Calling OpenAI");
        let response = self
            .http
            .post(&self.endpoint)
            .bearer_auth(&self.api_key)
            .json(&request)
            .timeout(self.timeout)
            .send()
            .await?;
        let response: ChatResponse = decode_json(response, self.max_body_bytes).await?;

        let result = response.into_content().and_then(generative_result);
        if result.is_none() {
            warn!("OpenAI response carried no content");
        }
        Ok(result)
    }
}
