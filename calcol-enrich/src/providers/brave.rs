//! Brave Search client
//!
//! Web, image and structured lookups. The structured lookup sends a
//! keyword/label table prompt to the web endpoint and parses the most
//! table-like result description.
//!
//! # API Reference
//! - Web: `GET https://api.search.brave.com/res/v1/web/search?q=..&count=..`
//! - Images: `GET https://api.search.brave.com/res/v1/images/search?q=..&count=..`
//! - Auth: `X-Subscription-Token` header

use super::{decode_json, non_empty, ProviderError, SearchProvider, StructuredProvider};
use crate::config::{HttpSettings, ProviderConfig};
use crate::quota::QuotaKey;
use crate::services::query_builder::structured_prompt;
use crate::services::spec_extractor::parse_structured_table;
use crate::types::{ImageResult, StructuredResult, WebResult};
use async_trait::async_trait;
use reqwest::{header, Client};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::time::Duration;
use tracing::debug;

/// Brave Search API base URL
pub const BRAVE_API_URL: &str = "https://api.search.brave.com/res/v1";

const TOKEN_HEADER: &str = "X-Subscription-Token";

/// Brave search client
pub struct BraveSearch {
    http: Client,
    base_url: String,
    api_key: String,
    timeout: Duration,
    max_body_bytes: usize,
}

impl BraveSearch {
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
        count: Option<usize>,
    ) -> Result<T, ProviderError> {
        let url = format!("{}/{}", self.base_url, path);
        let mut params = vec![("q", query.to_string())];
        if let Some(count) = count {
            params.push(("count", count.to_string()));
        }

        debug!(query, path, "Querying Brave");
        let response = self
            .http
            .get(&url)
            .query(&params)
            .header(header::ACCEPT, "application/json")
            .header(TOKEN_HEADER, &self.api_key)
            .timeout(self.timeout)
            .send()
            .await?;
        decode_json(response, self.max_body_bytes).await
    }
}

#[async_trait]
impl SearchProvider for BraveSearch {
    fn name(&self) -> &'static str {
        "brave"
    }

    fn quota_key(&self) -> QuotaKey {
        QuotaKey::Brave
    }

    async fn query_web(&self, query: &str, count: usize) -> Result<Vec<WebResult>, ProviderError> {
        let response: BraveWebResponse = self.get("web/search", query, Some(count)).await?;
        Ok(response.into_web_results())
    }

    async fn query_image(
        &self,
        query: &str,
        count: usize,
    ) -> Result<Vec<ImageResult>, ProviderError> {
        let response: BraveImageResponse = self.get("images/search", query, Some(count)).await?;
        Ok(response.into_image_results())
    }
}

#[async_trait]
impl StructuredProvider for BraveSearch {
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
        let prompt = structured_prompt(manufacturer, model);
        let response: BraveWebResponse = self.get("web/search", &prompt, None).await?;
        Ok(response.into_structured(manufacturer, model))
    }
}

// ============================================================================
// Response Types
// ============================================================================

#[derive(Debug, Deserialize)]
pub(crate) struct BraveWebResponse {
    #[serde(default)]
    web: Option<BraveWebSection>,
}

#[derive(Debug, Deserialize)]
struct BraveWebSection {
    #[serde(default)]
    results: Vec<BraveWebItem>,
}

#[derive(Debug, Deserialize)]
struct BraveWebItem {
    #[serde(default)]
    title: Option<String>,
    #[serde(default)]
    url: Option<String>,
    #[serde(default)]
    description: Option<String>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct BraveImageResponse {
    #[serde(default)]
    results: Vec<BraveImageItem>,
}

#[derive(Debug, Deserialize)]
struct BraveImageItem {
    #[serde(default)]
    url: Option<String>,
    #[serde(default)]
    thumbnail: Option<BraveThumbnail>,
    #[serde(default)]
    title: Option<String>,
    #[serde(default)]
    source: Option<String>,
    #[serde(default)]
    width: Option<u32>,
    #[serde(default)]
    height: Option<u32>,
}

/// Thumbnail arrives either as a bare URL or as `{"src": ..}`
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum BraveThumbnail {
    Url(String),
    Object {
        #[serde(default)]
        src: Option<String>,
    },
}

impl BraveThumbnail {
    fn into_url(self) -> Option<String> {
        match self {
            BraveThumbnail::Url(url) => Some(url),
            BraveThumbnail::Object { src } => src,
        }
    }
}

/// Markers of a table-like description
const STRUCTURE_MARKERS: [&str; 5] = ["keywords", "labels", "\t", "model", "manufacturer"];

impl BraveWebResponse {
    fn items(self) -> Vec<BraveWebItem> {
        self.web.map(|w| w.results).unwrap_or_default()
    }

    pub(crate) fn into_web_results(self) -> Vec<WebResult> {
        self.items()
            .into_iter()
            .filter_map(|item| {
                Some(WebResult {
                    url: non_empty(item.url)?,
                    title: item.title.unwrap_or_default(),
                    snippet: item.description.unwrap_or_default(),
                })
            })
            .collect()
    }

    /// Pick the first table-like description, else the first description
    pub(crate) fn into_structured(self, manufacturer: &str, model: &str) -> Option<StructuredResult> {
        let items: Vec<BraveWebItem> = self
            .items()
            .into_iter()
            .filter(|item| {
                item.description
                    .as_deref()
                    .map_or(false, |d| !d.trim().is_empty())
            })
            .collect();

        let chosen_index = items
            .iter()
            .position(|item| {
                let lower = item.description.as_deref().unwrap_or_default().to_lowercase();
                STRUCTURE_MARKERS.iter().any(|m| lower.contains(m))
            })
            .unwrap_or(0);

        let chosen = items.into_iter().nth(chosen_index)?;
        let raw_text = chosen.description.unwrap_or_default();
        debug!(
            source_url = chosen.url.as_deref().unwrap_or(""),
            "Selected structured result"
        );

        Some(StructuredResult {
            manufacturer: manufacturer.to_string(),
            model: model.to_string(),
            structured_table: parse_structured_table(&raw_text),
            raw_text,
            source_url: non_empty(chosen.url),
        })
    }
}

impl BraveImageResponse {
    pub(crate) fn into_image_results(self) -> Vec<ImageResult> {
        self.results
            .into_iter()
            .filter_map(|item| {
                Some(ImageResult {
                    image_url: non_empty(item.url)?,
                    thumbnail_url: item
                        .thumbnail
                        .and_then(BraveThumbnail::into_url)
                        .unwrap_or_default(),
                    title: item.title.unwrap_or_default(),
                    source_url: item.source.unwrap_or_default(),
                    width: item.width,
                    height: item.height,
                    provider_tag: "Brave".to_string(),
                })
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_web_results() {
        let response: BraveWebResponse = serde_json::from_str(
            r#"{"type":"search","web":{"results":[
                {"title":"Sharp EL-8","url":"https://c.example/el8","description":"Sharp EL-8 calculator"}
            ]}}"#,
        )
        .unwrap();
        let results = response.into_web_results();
        assert_eq!(results[0].snippet, "Sharp EL-8 calculator");
    }

    #[test]
    fn test_parse_images_with_both_thumbnail_shapes() {
        let response: BraveImageResponse = serde_json::from_str(
            r#"{"results":[
                {"url":"https://img.example/a.jpg","thumbnail":"https://t.example/a","title":"A","source":"c.example"},
                {"url":"https://img.example/b.jpg","thumbnail":{"src":"https://t.example/b"},"title":"B"},
                {"title":"no url"}
            ]}"#,
        )
        .unwrap();
        let results = response.into_image_results();
        assert_eq!(results.len(), 2);
        assert_eq!(results[0].thumbnail_url, "https://t.example/a");
        assert_eq!(results[1].thumbnail_url, "https://t.example/b");
        assert_eq!(results[1].provider_tag, "Brave");
    }

    #[test]
    fn test_structured_prefers_table_like_description() {
        let response: BraveWebResponse = serde_json::from_str(
            r#"{"web":{"results":[
                {"title":"News","url":"https://n.example","description":"An unrelated article"},
                {"title":"Table","url":"https://t.example","description":"Model: HP-35\nYear: 1972"}
            ]}}"#,
        )
        .unwrap();

        let result = response.into_structured("HP", "35").unwrap();
        assert_eq!(result.source_url.as_deref(), Some("https://t.example"));
        assert_eq!(result.structured_table["Model"], "HP-35");
        assert_eq!(result.structured_table["Year"], "1972");
        assert_eq!(result.manufacturer, "HP");
    }

    #[test]
    fn test_structured_falls_back_to_first_description() {
        let response: BraveWebResponse = serde_json::from_str(
            r#"{"web":{"results":[
                {"title":"Empty","url":"https://e.example","description":"  "},
                {"title":"Plain","url":"https://p.example","description":"A famous pocket calculator"}
            ]}}"#,
        )
        .unwrap();

        let result = response.into_structured("HP", "35").unwrap();
        assert_eq!(result.raw_text, "A famous pocket calculator");
        assert!(result.structured_table.is_empty());
    }

    #[test]
    fn test_structured_none_without_descriptions() {
        let response: BraveWebResponse = serde_json::from_str(r#"{"web":{"results":[]}}"#).unwrap();
        assert!(response.into_structured("HP", "35").is_none());

        let response: BraveWebResponse = serde_json::from_str(r#"{}"#).unwrap();
        assert!(response.into_structured("HP", "35").is_none());
    }
}
