//! Core types for the enrichment pipeline
//!
//! Catalog-side inputs (`Entry`, `Label`, `CalculatorInfo`) and the merged
//! `EnrichmentRecord` persisted as `enriched_data`.
//!
//! # Persisted layout
//! `EnrichmentRecord` serializes to a JSON object with the optional keys
//! `webResults`, `imageResults`, `museumResults`, `braveAIResult`, `aiContent`,
//! `specTable`, `extractedFacts`, `addedLinkUrls`. Missing keys decode as empty
//! and unknown keys are ignored.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

// ============================================================================
// Catalog Types
// ============================================================================

/// Label attached to an entry
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Label {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

impl Label {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: None,
        }
    }

    pub fn with_description(name: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: Some(description.into()),
        }
    }
}

/// Catalog entry, loaded eagerly with its labels and approved images
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Entry {
    pub id: i64,
    pub manufacturer_name: String,
    pub model: String,
    pub sold_from: Option<i32>,
    pub sold_to: Option<i32>,
    /// Free-form description entered by the collector
    pub raw_text: Option<String>,
    pub labels: Vec<Label>,
    /// Absolute URLs, in display order
    pub approved_image_urls: Vec<String>,
    /// Enrichment-owned description
    pub description: Option<String>,
    /// Enrichment-owned JSON document
    pub enriched_data: Option<String>,
}

impl Entry {
    /// Case-insensitive label presence check
    pub fn has_label(&self, name: &str) -> bool {
        self.labels.iter().any(|l| l.name.eq_ignore_ascii_case(name))
    }
}

/// Link created on an entry
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Link {
    pub id: i64,
    pub entry_id: i64,
    pub url: String,
    pub title: String,
    pub description: Option<String>,
    pub added_by: String,
}

/// Link waiting to be written with an enrichment result
#[derive(Debug, Clone, PartialEq)]
pub struct NewLink {
    pub url: String,
    pub title: String,
    pub description: Option<String>,
}

/// Post-formatter view of an entry
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CalculatorInfo {
    pub manufacturer: String,
    pub model: String,
    pub description: Option<String>,
    pub labels: Vec<String>,
    pub label_descriptions: Vec<String>,
    pub image_urls: Vec<String>,
}

impl From<&Entry> for CalculatorInfo {
    fn from(entry: &Entry) -> Self {
        Self {
            manufacturer: entry.manufacturer_name.clone(),
            model: entry.model.clone(),
            description: entry.raw_text.clone(),
            labels: entry.labels.iter().map(|l| l.name.clone()).collect(),
            label_descriptions: entry
                .labels
                .iter()
                .map(|l| l.description.clone().unwrap_or_default())
                .collect(),
            image_urls: entry.approved_image_urls.clone(),
        }
    }
}

// ============================================================================
// Provider Results
// ============================================================================

/// Normalised web search hit
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct WebResult {
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub url: String,
    #[serde(default)]
    pub snippet: String,
}

/// Normalised image search hit
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImageResult {
    pub image_url: String,
    #[serde(default)]
    pub thumbnail_url: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub source_url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub width: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub height: Option<u32>,
    /// "Google", "Bing" or "Brave"
    #[serde(rename = "source", default)]
    pub provider_tag: String,
}

/// Museum site probe outcome
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MuseumResult {
    pub site_url: String,
    pub search_url: String,
    pub found: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub snippet: Option<String>,
}

/// Structured answer from the Brave keyword/label prompt
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StructuredResult {
    #[serde(default)]
    pub manufacturer: String,
    #[serde(default)]
    pub model: String,
    #[serde(rename = "structuredData", default)]
    pub structured_table: BTreeMap<String, String>,
    #[serde(rename = "rawResponse", default)]
    pub raw_text: String,
    #[serde(rename = "sourceUrl", default, skip_serializing_if = "Option::is_none")]
    pub source_url: Option<String>,
}

/// Generative prose plus the URLs found in it
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GenerativeResult {
    #[serde(default)]
    pub content: String,
    #[serde(rename = "links", default)]
    pub extracted_urls: Vec<String>,
}

// ============================================================================
// Enrichment Record
// ============================================================================

/// Merged output of one enrichment call
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EnrichmentRecord {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub web_results: Vec<WebResult>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub image_results: Vec<ImageResult>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub museum_results: Vec<MuseumResult>,
    #[serde(rename = "braveAIResult", default, skip_serializing_if = "Option::is_none")]
    pub structured_ai: Option<StructuredResult>,
    #[serde(rename = "aiContent", default, skip_serializing_if = "Option::is_none")]
    pub ai_prose: Option<GenerativeResult>,
    /// First-wins specification keys
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub spec_table: BTreeMap<String, String>,
    /// Distinct facts in discovery order
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub extracted_facts: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub added_link_urls: Vec<String>,
}

impl EnrichmentRecord {
    /// True when no section carries data
    pub fn is_empty(&self) -> bool {
        self.web_results.is_empty()
            && self.image_results.is_empty()
            && self.museum_results.is_empty()
            && self.structured_ai.is_none()
            && self.ai_prose.is_none()
            && self.spec_table.is_empty()
            && self.extracted_facts.is_empty()
            && self.added_link_urls.is_empty()
    }

    /// Decode a persisted document; missing keys are empty
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    /// Museum hits that actually matched
    pub fn found_museum_urls(&self) -> impl Iterator<Item = &str> {
        self.museum_results
            .iter()
            .filter(|m| m.found)
            .map(|m| m.search_url.as_str())
    }
}
