//! In-process provider doubles
//!
//! Each mock counts its calls so tests can assert that quota denial skips
//! the upstream entirely.

use async_trait::async_trait;
use calcol_enrich::providers::{
    GenerativeProvider, MuseumSearch, ProviderError, SearchProvider, StructuredProvider,
};
use calcol_enrich::quota::QuotaKey;
use calcol_enrich::types::{
    GenerativeResult, ImageResult, MuseumResult, StructuredResult, WebResult,
};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

/// How a mock answers
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Behavior {
    Succeed,
    /// HTTP 500
    Fail,
    /// HTTP 429
    RateLimited,
    Panic,
}

impl Behavior {
    fn outcome<T>(self, value: T) -> Result<T, ProviderError> {
        match self {
            Behavior::Succeed => Ok(value),
            Behavior::Fail => Err(ProviderError::Status {
                status: 500,
                body: "upstream exploded".to_string(),
            }),
            Behavior::RateLimited => Err(ProviderError::Status {
                status: 429,
                body: "slow down".to_string(),
            }),
            Behavior::Panic => panic!("mock provider panicked"),
        }
    }
}

// ============================================================================
// Search
// ============================================================================

pub struct MockSearch {
    pub name: &'static str,
    pub key: QuotaKey,
    pub web: Vec<WebResult>,
    pub images: Vec<ImageResult>,
    pub behavior: Behavior,
    pub delay: Duration,
    pub calls: AtomicUsize,
}

impl MockSearch {
    pub fn new(name: &'static str, key: QuotaKey) -> Self {
        Self {
            name,
            key,
            web: Vec::new(),
            images: Vec::new(),
            behavior: Behavior::Succeed,
            delay: Duration::ZERO,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn with_web(mut self, web: Vec<WebResult>) -> Self {
        self.web = web;
        self
    }

    pub fn with_images(mut self, images: Vec<ImageResult>) -> Self {
        self.images = images;
        self
    }

    pub fn with_behavior(mut self, behavior: Behavior) -> Self {
        self.behavior = behavior;
        self
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    async fn answer(&self) {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
    }
}

#[async_trait]
impl SearchProvider for MockSearch {
    fn name(&self) -> &'static str {
        self.name
    }

    fn quota_key(&self) -> QuotaKey {
        self.key
    }

    async fn query_web(&self, _query: &str, count: usize) -> Result<Vec<WebResult>, ProviderError> {
        self.answer().await;
        self.behavior
            .outcome(self.web.iter().take(count).cloned().collect())
    }

    async fn query_image(
        &self,
        _query: &str,
        count: usize,
    ) -> Result<Vec<ImageResult>, ProviderError> {
        self.answer().await;
        self.behavior
            .outcome(self.images.iter().take(count).cloned().collect())
    }
}

// ============================================================================
// Structured / Generative / Museum
// ============================================================================

pub struct MockStructured {
    pub raw_text: String,
    pub behavior: Behavior,
}

#[async_trait]
impl StructuredProvider for MockStructured {
    fn name(&self) -> &'static str {
        "brave"
    }

    fn quota_key(&self) -> QuotaKey {
        QuotaKey::Brave
    }

    async fn query_structured(
        &self,
        manufacturer: &str,
        model: &str,
    ) -> Result<Option<StructuredResult>, ProviderError> {
        self.behavior.outcome(Some(StructuredResult {
            manufacturer: manufacturer.to_string(),
            model: model.to_string(),
            structured_table: calcol_enrich::services::parse_structured_table(&self.raw_text),
            raw_text: self.raw_text.clone(),
            source_url: Some("https://search.example/structured".to_string()),
        }))
    }
}

pub struct MockGenerative {
    pub content: String,
    pub behavior: Behavior,
    pub calls: AtomicUsize,
}

impl MockGenerative {
    pub fn new(content: &str) -> Self {
        Self {
            content: content.to_string(),
            behavior: Behavior::Succeed,
            calls: AtomicUsize::new(0),
        }
    }
}

#[async_trait]
impl GenerativeProvider for MockGenerative {
    fn name(&self) -> &'static str {
        "openai"
    }

    async fn query_generative(
        &self,
        _prompt: &str,
    ) -> Result<Option<GenerativeResult>, ProviderError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.behavior.outcome(Some(GenerativeResult {
            content: self.content.clone(),
            extracted_urls: Vec::new(),
        }))
    }
}

pub struct MockMuseum {
    pub results: Vec<MuseumResult>,
}

#[async_trait]
impl MuseumSearch for MockMuseum {
    async fn search(&self, _query: &str) -> Vec<MuseumResult> {
        self.results.clone()
    }
}
