//! Bing Web Search v7 client
//!
//! # API Reference
//! - Web: `GET https://api.bing.microsoft.com/v7.0/search?q=..&count=..`
//! - Images: `GET https://api.bing.microsoft.com/v7.0/images/search?q=..&count=..`
//! - Auth: `Ocp-Apim-Subscription-Key` header

use super::{decode_json, non_empty, ProviderError, SearchProvider};
use crate::config::{HttpSettings, ProviderConfig};
use crate::quota::QuotaKey;
use crate::types::{ImageResult, WebResult};
use async_trait::async_trait;
use reqwest::Client;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::time::Duration;
use tracing::debug;

/// Bing API base URL
pub const BING_API_URL: &str = "https://api.bing.microsoft.com/v7.0";

const SUBSCRIPTION_HEADER: &str = "Ocp-Apim-Subscription-Key";

/// Bing search client
pub struct BingSearch {
    http: Client,
    base_url: String,
    api_key: String,
    timeout: Duration,
    max_body_bytes: usize,
}

impl BingSearch {
    /// None without an API key
    pub fn new(http: Client, config: &ProviderConfig, settings: &HttpSettings) -> Option<Self> {
        Some(Self {
            http,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            api_key: non_empty(config.api_key.clone())?,
            timeout: settings.timeout,
            max_body_bytes: settings.max_body_bytes,
        })
    }

    async fn get<T: DeserializeOwned>(
        &self,
        path: &str,
        query: &str,
        count: usize,
    ) -> Result<T, ProviderError> {
        let url = format!("{}/{}", self.base_url, path);
        debug!(query, path, "Querying Bing");
        let response = self
            .http
            .get(&url)
            .query(&[("q", query), ("count", count.to_string().as_str())])
            .header(SUBSCRIPTION_HEADER, &self.api_key)
            .timeout(self.timeout)
            .send()
            .await?;
        decode_json(response, self.max_body_bytes).await
    }
}

#[async_trait]
impl SearchProvider for BingSearch {
    fn name(&self) -> &'static str {
        "bing"
    }

    fn quota_key(&self) -> QuotaKey {
        QuotaKey::Bing
    }

    async fn query_web(&self, query: &str, count: usize) -> Result<Vec<WebResult>, ProviderError> {
        let response: BingWebResponse = self.get("search", query, count).await?;
        Ok(response.into_web_results())
    }

    async fn query_image(
        &self,
        query: &str,
        count: usize,
    ) -> Result<Vec<ImageResult>, ProviderError> {
        let response: BingImageResponse = self.get("images/search", query, count).await?;
        Ok(response.into_image_results())
    }
}

// ============================================================================
// Response Types
// ============================================================================

#[derive(Debug, Deserialize)]
pub(crate) struct BingWebResponse {
    #[serde(rename = "webPages", default)]
    web_pages: Option<BingWebPages>,
}

#[derive(Debug, Deserialize)]
struct BingWebPages {
    #[serde(default)]
    value: Vec<BingWebPage>,
}

#[derive(Debug, Deserialize)]
struct BingWebPage {
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    url: Option<String>,
    #[serde(default)]
    snippet: Option<String>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct BingImageResponse {
    #[serde(default)]
    value: Vec<BingImage>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct BingImage {
    #[serde(default)]
    content_url: Option<String>,
    #[serde(default)]
    thumbnail_url: Option<String>,
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    host_page_url: Option<String>,
    #[serde(default)]
    width: Option<u32>,
    #[serde(default)]
    height: Option<u32>,
}

impl BingWebResponse {
    pub(crate) fn into_web_results(self) -> Vec<WebResult> {
        self.web_pages
            .map(|pages| pages.value)
            .unwrap_or_default()
            .into_iter()
            .filter_map(|page| {
                Some(WebResult {
                    url: non_empty(page.url)?,
                    title: page.name.unwrap_or_default(),
                    snippet: page.snippet.unwrap_or_default(),
                })
            })
            .collect()
    }
}

impl BingImageResponse {
    pub(crate) fn into_image_results(self) -> Vec<ImageResult> {
        self.value
            .into_iter()
            .filter_map(|image| {
                Some(ImageResult {
                    image_url: non_empty(image.content_url)?,
                    thumbnail_url: image.thumbnail_url.unwrap_or_default(),
                    title: image.name.unwrap_or_default(),
                    source_url: image.host_page_url.unwrap_or_default(),
                    width: image.width,
                    height: image.height,
                    provider_tag: "Bing".to_string(),
                })
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_web_pages() {
        let response: BingWebResponse = serde_json::from_str(
            r#"{"_type":"SearchResponse","webPages":{"value":[
                {"name":"Casio fx-19","url":"https://b.example/fx19","snippet":"Casio fx-19 calculator"}
            ]}}"#,
        )
        .unwrap();

        let results = response.into_web_results();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].title, "Casio fx-19");
    }

    #[test]
    fn test_response_without_web_pages() {
        let response: BingWebResponse = serde_json::from_str(r#"{"_type":"SearchResponse"}"#).unwrap();
        assert!(response.into_web_results().is_empty());
    }

    #[test]
    fn test_parse_images_drops_missing_content_url() {
        let response: BingImageResponse = serde_json::from_str(
            r#"{"value":[
                {"contentUrl":"https://img.example/a.jpg","thumbnailUrl":"https://tse.example/a","name":"Casio calculator",
                 "hostPageUrl":"https://b.example/page","width":1024,"height":768},
                {"name":"no content url"}
            ]}"#,
        )
        .unwrap();

        let results = response.into_image_results();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].source_url, "https://b.example/page");
        assert_eq!(results[0].height, Some(768));
        assert_eq!(results[0].provider_tag, "Bing");
    }
}
