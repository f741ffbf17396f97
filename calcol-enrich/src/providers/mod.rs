//! External search and generative providers
//!
//! Each adapter maps a typed query onto one upstream endpoint and normalises
//! the response. Adapters report failures as [`ProviderError`]; [`guarded`]
//! applies the shared call contract (quota admission, failure logging, usage
//! recording) and turns every failure into `None`.
//!
//! # Adapters
//! | Provider  | Capabilities            | Quota bucket |
//! |-----------|-------------------------|--------------|
//! | google    | web, image              | google       |
//! | bing      | web, image              | bing         |
//! | brave     | web, image, structured  | brave        |
//! | openai    | generative              | ai           |
//! | anthropic | generative              | ai           |
//! | museum    | site scrape             | (none)       |

pub mod anthropic;
pub mod bing;
pub mod brave;
pub mod google;
pub mod museum;
pub mod openai;

use crate::config::{AiProviderKind, EnrichConfig};
use crate::quota::{QuotaGuard, QuotaKey};
use crate::types::{GenerativeResult, ImageResult, MuseumResult, StructuredResult, WebResult};
use async_trait::async_trait;
use serde::de::DeserializeOwned;
use std::future::Future;
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, error, info, warn};

/// User-Agent sent with every outbound request
pub const USER_AGENT: &str = concat!("calcol-enrich/", env!("CARGO_PKG_VERSION"));

// ============================================================================
// Errors
// ============================================================================

/// Provider call failure
///
/// Never leaves the provider layer: [`guarded`] logs it and yields `None`.
#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("Network error: {0}")]
    Network(String),

    #[error("Request timed out")]
    Timeout,

    #[error("HTTP {status}: {body}")]
    Status { status: u16, body: String },

    #[error("Decode error: {0}")]
    Decode(String),

    #[error("Response body exceeds {0} bytes")]
    BodyTooLarge(usize),

    #[error("HTTP client error: {0}")]
    Client(String),
}

impl ProviderError {
    /// Timeouts and 429s are expected under load and logged at warn
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            ProviderError::Timeout | ProviderError::Status { status: 429, .. }
        )
    }
}

impl From<reqwest::Error> for ProviderError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            ProviderError::Timeout
        } else if err.is_decode() {
            ProviderError::Decode(err.to_string())
        } else if err.is_builder() {
            ProviderError::Client(err.to_string())
        } else {
            ProviderError::Network(err.to_string())
        }
    }
}

// ============================================================================
// Capabilities
// ============================================================================

/// Web and image search
#[async_trait]
pub trait SearchProvider: Send + Sync {
    /// Provider name for logs
    fn name(&self) -> &'static str;

    fn quota_key(&self) -> QuotaKey;

    async fn query_web(&self, query: &str, count: usize) -> Result<Vec<WebResult>, ProviderError>;

    async fn query_image(&self, query: &str, count: usize)
        -> Result<Vec<ImageResult>, ProviderError>;
}

/// Keyword/label table lookup (Brave only)
#[async_trait]
pub trait StructuredProvider: Send + Sync {
    fn name(&self) -> &'static str;

    fn quota_key(&self) -> QuotaKey;

    /// `Ok(None)` when the upstream answered without usable text
    async fn query_structured(
        &self,
        manufacturer: &str,
        model: &str,
    ) -> Result<Option<StructuredResult>, ProviderError>;
}

/// Generative prose (OpenAI or Anthropic)
#[async_trait]
pub trait GenerativeProvider: Send + Sync {
    fn name(&self) -> &'static str;

    fn quota_key(&self) -> QuotaKey {
        QuotaKey::Ai
    }

    /// `Ok(None)` when the upstream answered without content
    async fn query_generative(&self, prompt: &str)
        -> Result<Option<GenerativeResult>, ProviderError>;
}

/// Museum site scrape; failures are isolated per site inside the call
#[async_trait]
pub trait MuseumSearch: Send + Sync {
    /// Only sites where the query was found
    async fn search(&self, query: &str) -> Vec<MuseumResult>;
}

// ============================================================================
// Shared Call Contract
// ============================================================================

/// Run one provider call under the quota guard
///
/// Denied calls are never issued. Failed calls are logged by severity and
/// not counted. Successful calls are counted.
pub async fn guarded<T, F>(
    quota: &QuotaGuard,
    key: QuotaKey,
    provider: &str,
    operation: &str,
    call: F,
) -> Option<T>
where
    F: Future<Output = Result<T, ProviderError>>,
{
    if !quota.can_make_request(key) {
        warn!(
            provider,
            operation,
            remaining = quota.remaining(key),
            "Request blocked by rate limit or monthly quota"
        );
        return None;
    }

    match call.await {
        Ok(value) => {
            quota.record_request(key);
            debug!(provider, operation, "Provider call succeeded");
            Some(value)
        }
        Err(err) if err.is_transient() => {
            warn!(provider, operation, error = %err, "Provider call failed");
            None
        }
        Err(err) => {
            error!(provider, operation, error = %err, "Provider call failed");
            None
        }
    }
}

// ============================================================================
// HTTP Helpers
// ============================================================================

/// Shared outbound client
pub fn build_http_client(timeout: std::time::Duration) -> Result<reqwest::Client, ProviderError> {
    reqwest::Client::builder()
        .timeout(timeout)
        .user_agent(USER_AGENT)
        .build()
        .map_err(|e| ProviderError::Client(e.to_string()))
}

/// Read a body, refusing anything over `max_bytes`
pub async fn read_body_capped(
    mut response: reqwest::Response,
    max_bytes: usize,
) -> Result<Vec<u8>, ProviderError> {
    if let Some(length) = response.content_length() {
        if length > max_bytes as u64 {
            return Err(ProviderError::BodyTooLarge(max_bytes));
        }
    }

    let mut body = Vec::new();
    while let Some(chunk) = response.chunk().await? {
        if body.len() + chunk.len() > max_bytes {
            return Err(ProviderError::BodyTooLarge(max_bytes));
        }
        body.extend_from_slice(&chunk);
    }
    Ok(body)
}

/// Fail on non-2xx, keeping a short prefix of the error body
async fn ensure_success(response: reqwest::Response) -> Result<reqwest::Response, ProviderError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = read_body_capped(response, 64 * 1024)
        .await
        .map(|bytes| String::from_utf8_lossy(&bytes).chars().take(200).collect())
        .unwrap_or_default();
    Err(ProviderError::Status {
        status: status.as_u16(),
        body,
    })
}

/// Check status, read capped, decode JSON
pub async fn decode_json<T: DeserializeOwned>(
    response: reqwest::Response,
    max_bytes: usize,
) -> Result<T, ProviderError> {
    let response = ensure_success(response).await?;
    let body = read_body_capped(response, max_bytes).await?;
    serde_json::from_slice(&body).map_err(|e| ProviderError::Decode(e.to_string()))
}

/// Check status, read capped, decode lossy UTF-8
pub async fn decode_text(
    response: reqwest::Response,
    max_bytes: usize,
) -> Result<String, ProviderError> {
    let response = ensure_success(response).await?;
    let body = read_body_capped(response, max_bytes).await?;
    Ok(String::from_utf8_lossy(&body).into_owned())
}

/// Blank strings count as missing
pub(crate) fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

// ============================================================================
// Provider Set
// ============================================================================

/// Providers enabled for this process
///
/// Providers without credentials are simply absent.
#[derive(Clone, Default)]
pub struct Providers {
    /// In fan-in order: google, bing, brave
    pub search: Vec<Arc<dyn SearchProvider>>,
    pub structured: Option<Arc<dyn StructuredProvider>>,
    pub generative: Option<Arc<dyn GenerativeProvider>>,
    pub museum: Option<Arc<dyn MuseumSearch>>,
}

impl Providers {
    /// No providers at all
    pub fn none() -> Self {
        Self::default()
    }

    /// Build every provider whose credentials are configured
    pub fn from_config(config: &EnrichConfig) -> Result<Self, ProviderError> {
        let http = build_http_client(config.http.timeout)?;
        let mut providers = Self::none();

        if let Some(google) = google::GoogleSearch::new(http.clone(), &config.google, &config.http) {
            providers.search.push(Arc::new(google));
        } else {
            info!("Google search disabled (api-key or search-engine-id missing)");
        }

        if let Some(bing) = bing::BingSearch::new(http.clone(), &config.bing, &config.http) {
            providers.search.push(Arc::new(bing));
        } else {
            info!("Bing search disabled (api-key missing)");
        }

        if let Some(brave) = brave::BraveSearch::new(http.clone(), &config.brave, &config.http) {
            let brave = Arc::new(brave);
            providers.search.push(brave.clone());
            providers.structured = Some(brave);
        } else {
            info!("Brave search disabled (api-key missing)");
        }

        providers.generative = match config.ai_provider {
            AiProviderKind::OpenAi => openai::OpenAiClient::new(http.clone(), &config.ai, &config.http)
                .map(|c| Arc::new(c) as Arc<dyn GenerativeProvider>),
            AiProviderKind::Anthropic => {
                anthropic::AnthropicClient::new(http.clone(), &config.ai, &config.http)
                    .map(|c| Arc::new(c) as Arc<dyn GenerativeProvider>)
            }
        };
        if providers.generative.is_none() {
            info!("Generative provider disabled (api-key missing)");
        }

        if config.museum.enabled {
            providers.museum = Some(Arc::new(museum::MuseumScraper::new(
                http,
                &config.museum,
                config.http.max_body_bytes,
            )));
        }

        Ok(providers)
    }
}
