//! Google Custom Search client
//!
//! # API Reference
//! - Endpoint: `GET https://www.googleapis.com/customsearch/v1?key=..&cx=..&q=..&num=..`
//! - Image variant adds `searchType=image`
//! - `num` is capped at 10 by the API

use super::{decode_json, non_empty, ProviderError, SearchProvider};
use crate::config::{HttpSettings, ProviderConfig};
use crate::quota::QuotaKey;
use crate::types::{ImageResult, WebResult};
use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use std::time::Duration;
use tracing::debug;

/// Google Custom Search base URL
pub const GOOGLE_API_URL: &str = "https://www.googleapis.com/customsearch/v1";

const MAX_RESULTS: usize = 10;

/// Google Custom Search client
pub struct GoogleSearch {
    http: Client,
    base_url: String,
    api_key: String,
    engine_id: String,
    timeout: Duration,
    max_body_bytes: usize,
}

impl GoogleSearch {
    /// None unless both the API key and the search engine id are set
    pub fn new(http: Client, config: &ProviderConfig, settings: &HttpSettings) -> Option<Self> {
        let api_key = non_empty(config.api_key.clone())?;
        let engine_id = non_empty(config.secondary_key.clone())?;
        Some(Self {
            http,
            base_url: config.base_url.clone(),
            api_key,
            engine_id,
            timeout: settings.timeout,
            max_body_bytes: settings.max_body_bytes,
        })
    }

    async fn search(
        &self,
        query: &str,
        count: usize,
        image: bool,
    ) -> Result<GoogleResponse, ProviderError> {
        let num = count.clamp(1, MAX_RESULTS).to_string();
        let mut params = vec![
            ("key", self.api_key.as_str()),
            ("cx", self.engine_id.as_str()),
            ("q", query),
            ("num", num.as_str()),
        ];
        if image {
            params.push(("searchType", "image"));
        }

        debug!(query, image, "Querying Google Custom Search");
        let response = self
            .http
            .get(&self.base_url)
            .query(&params)
            .timeout(self.timeout)
            .send()
            .await?;
        decode_json(response, self.max_body_bytes).await
    }
}

#[async_trait]
impl SearchProvider for GoogleSearch {
    fn name(&self) -> &'static str {
        "google"
    }

    fn quota_key(&self) -> QuotaKey {
        QuotaKey::Google
    }

    async fn query_web(&self, query: &str, count: usize) -> Result<Vec<WebResult>, ProviderError> {
        Ok(self.search(query, count, false).await?.into_web_results())
    }

    async fn query_image(
        &self,
        query: &str,
        count: usize,
    ) -> Result<Vec<ImageResult>, ProviderError> {
        Ok(self.search(query, count, true).await?.into_image_results())
    }
}

// ============================================================================
// Response Types
// ============================================================================

#[derive(Debug, Deserialize)]
pub(crate) struct GoogleResponse {
    #[serde(default)]
    items: Vec<GoogleItem>,
}

#[derive(Debug, Deserialize)]
struct GoogleItem {
    #[serde(default)]
    title: Option<String>,
    #[serde(default)]
    link: Option<String>,
    #[serde(default)]
    snippet: Option<String>,
    #[serde(rename = "displayLink", default)]
    display_link: Option<String>,
    #[serde(default)]
    image: Option<GoogleImage>,
}

#[derive(Debug, Deserialize)]
struct GoogleImage {
    #[serde(rename = "thumbnailLink", default)]
    thumbnail_link: Option<String>,
    #[serde(rename = "contextLink", default)]
    context_link: Option<String>,
    #[serde(default)]
    width: Option<u32>,
    #[serde(default)]
    height: Option<u32>,
}

impl GoogleResponse {
    pub(crate) fn into_web_results(self) -> Vec<WebResult> {
        self.items
            .into_iter()
            .filter_map(|item| {
                let url = non_empty(item.link)?;
                Some(WebResult {
                    title: item.title.unwrap_or_default(),
                    url,
                    snippet: item.snippet.unwrap_or_default(),
                })
            })
            .collect()
    }

    pub(crate) fn into_image_results(self) -> Vec<ImageResult> {
        self.items
            .into_iter()
            .filter_map(|item| {
                let image_url = non_empty(item.link)?;
                let (thumbnail_url, source_url, width, height) = match item.image {
                    Some(image) => (
                        image.thumbnail_link.unwrap_or_default(),
                        image.context_link.unwrap_or_default(),
                        image.width,
                        image.height,
                    ),
                    // Without image metadata the link doubles as thumbnail
                    None => (
                        image_url.clone(),
                        item.display_link.unwrap_or_default(),
                        None,
                        None,
                    ),
                };
                Some(ImageResult {
                    image_url,
                    thumbnail_url,
                    title: item.title.unwrap_or_default(),
                    source_url,
                    width,
                    height,
                    provider_tag: "Google".to_string(),
                })
            })
            .collect()
    }
}
