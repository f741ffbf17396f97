//! Enrichment orchestrator
//!
//! Drives one enrichment call through its phases:
//!
//! READY → FETCHING → MERGING → EXTRACTING → PERSISTING → DONE | NO_DATA
//!
//! Only FETCHING is concurrent: every provider task (web and image per search
//! provider, structured, generative, museum) runs at once and the call waits
//! for all of them. A task that fails, is denied by the quota guard, or panics
//! contributes an empty result. Results are merged in provider order
//! (google, bing, brave) regardless of completion order.

use crate::providers::{guarded, Providers};
use crate::quota::QuotaGuard;
use crate::services::query_builder::build_queries;
use crate::services::relevance_filter::{filter_images, filter_web};
use crate::services::spec_extractor::extract_specs;
use crate::services::text::{clean_html, truncate_with_ellipsis};
use crate::storage::Storage;
use crate::types::{
    Entry, EnrichmentRecord, GenerativeResult, ImageResult, MuseumResult, NewLink,
    StructuredResult, WebResult,
};
use futures::future::join_all;
use futures::FutureExt;
use serde::Serialize;
use std::collections::HashSet;
use std::fmt;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, error, info, warn};

/// Web results requested per search provider
pub const WEB_RESULT_COUNT: usize = 5;
/// Image results requested per search provider
pub const IMAGE_RESULT_COUNT: usize = 10;

const LINK_TITLE_MAX: usize = 200;
const LINK_DESCRIPTION_MAX: usize = 500;
const FALLBACK_SNIPPETS: usize = 3;
const FALLBACK_SNIPPET_MAX: usize = 200;

// ============================================================================
// Outcome Types
// ============================================================================

/// Phase of one enrichment call
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnrichPhase {
    Ready,
    Fetching,
    Merging,
    Extracting,
    Persisting,
    Done,
    NoData,
}

impl fmt::Display for EnrichPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            EnrichPhase::Ready => "READY",
            EnrichPhase::Fetching => "FETCHING",
            EnrichPhase::Merging => "MERGING",
            EnrichPhase::Extracting => "EXTRACTING",
            EnrichPhase::Persisting => "PERSISTING",
            EnrichPhase::Done => "DONE",
            EnrichPhase::NoData => "NO_DATA",
        };
        f.write_str(name)
    }
}

/// Caller-visible result class
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EnrichStatus {
    /// At least one section populated; persisted
    Partial,
    /// Nothing found; entry left unchanged
    NoData,
}

/// Completed enrichment call
#[derive(Debug, Clone, Serialize)]
pub struct EnrichOutcome {
    pub entry_id: i64,
    pub status: EnrichStatus,
    pub links_added: usize,
    pub description: String,
    pub record: EnrichmentRecord,
}

/// Enrichment failure
#[derive(Debug, Error)]
pub enum EnrichError {
    #[error("Entry not found: {0}")]
    NotFound(i64),

    #[error("Enrichment failed: {0}")]
    Internal(String),
}

impl From<calcol_common::Error> for EnrichError {
    fn from(err: calcol_common::Error) -> Self {
        EnrichError::Internal(err.to_string())
    }
}

impl From<serde_json::Error> for EnrichError {
    fn from(err: serde_json::Error) -> Self {
        EnrichError::Internal(format!("Failed to encode enrichment record: {}", err))
    }
}

/// Unfiltered provider output, already in provider order
#[derive(Debug, Default)]
pub struct FetchedResults {
    pub web: Vec<WebResult>,
    pub images: Vec<ImageResult>,
    pub museum: Vec<MuseumResult>,
    pub structured: Option<StructuredResult>,
    pub prose: Option<GenerativeResult>,
}

// ============================================================================
// Orchestrator
// ============================================================================

/// Fan-out enrichment over the configured providers
pub struct Orchestrator {
    storage: Arc<dyn Storage>,
    providers: Providers,
    quota: Arc<QuotaGuard>,
    added_by: String,
}

impl Orchestrator {
    pub fn new(storage: Arc<dyn Storage>, providers: Providers, quota: Arc<QuotaGuard>) -> Self {
        Self {
            storage,
            providers,
            quota,
            added_by: crate::config::DEFAULT_ADDED_BY.to_string(),
        }
    }

    /// `added_by` recorded on links created by enrichment
    pub fn with_added_by(mut self, added_by: impl Into<String>) -> Self {
        self.added_by = added_by.into();
        self
    }

    pub fn quota(&self) -> &Arc<QuotaGuard> {
        &self.quota
    }

    pub fn storage(&self) -> &Arc<dyn Storage> {
        &self.storage
    }

    /// Enrich one entry and persist the result
    pub async fn enrich(&self, entry_id: i64) -> Result<EnrichOutcome, EnrichError> {
        let mut entry = self
            .storage
            .get_entry(entry_id)
            .await?
            .ok_or(EnrichError::NotFound(entry_id))?;
        transition(entry_id, EnrichPhase::Ready);
        info!(
            entry_id,
            manufacturer = %entry.manufacturer_name,
            model = %entry.model,
            "Starting enrichment"
        );

        transition(entry_id, EnrichPhase::Fetching);
        let fetched = self.fetch(&entry).await;

        transition(entry_id, EnrichPhase::Merging);
        let mut record = merge(&entry, fetched);
        let links = self.plan_links(entry_id, &mut record).await?;

        transition(entry_id, EnrichPhase::Extracting);
        apply_extraction(&mut record);
        let description = build_description(&record);

        transition(entry_id, EnrichPhase::Persisting);
        let json = record.to_json()?;

        if description.is_empty() && record.is_empty() {
            transition(entry_id, EnrichPhase::NoData);
            warn!(entry_id, "Enrichment found no data");
            return Ok(EnrichOutcome {
                entry_id,
                status: EnrichStatus::NoData,
                links_added: 0,
                description,
                record,
            });
        }

        if !description.is_empty() {
            entry.description = Some(description.clone());
        }
        if json != "{}" {
            entry.enriched_data = Some(json);
        }
        let created = self
            .storage
            .save_enrichment(&entry, &links, &self.added_by)
            .await?;
        let links_added = created.len();
        if links_added != links.len() {
            debug!(
                entry_id,
                planned = links.len(),
                links_added,
                "Some links were added concurrently"
            );
        }

        transition(entry_id, EnrichPhase::Done);
        info!(
            entry_id,
            web = record.web_results.len(),
            images = record.image_results.len(),
            museum = record.museum_results.len(),
            specs = record.spec_table.len(),
            facts = record.extracted_facts.len(),
            links_added,
            "Enrichment complete"
        );

        Ok(EnrichOutcome {
            entry_id,
            status: EnrichStatus::Partial,
            links_added,
            description,
            record,
        })
    }

    /// Fetch, filter and extract without touching storage
    pub async fn preview(&self, entry: &Entry) -> EnrichmentRecord {
        let fetched = self.fetch(entry).await;
        let mut record = merge(entry, fetched);
        apply_extraction(&mut record);
        record
    }

    /// Run every provider task concurrently and wait for all of them
    pub async fn fetch(&self, entry: &Entry) -> FetchedResults {
        let queries = build_queries(entry);
        let quota = self.quota.as_ref();

        let web = join_all(self.providers.search.iter().map(|provider| {
            isolated(
                provider.name(),
                "web",
                guarded(
                    quota,
                    provider.quota_key(),
                    provider.name(),
                    "web",
                    provider.query_web(&queries.web, WEB_RESULT_COUNT),
                ),
            )
        }));

        let images = join_all(self.providers.search.iter().map(|provider| {
            isolated(
                provider.name(),
                "image",
                guarded(
                    quota,
                    provider.quota_key(),
                    provider.name(),
                    "image",
                    provider.query_image(&queries.image, IMAGE_RESULT_COUNT),
                ),
            )
        }));

        let structured = async {
            match &self.providers.structured {
                Some(provider) => isolated(
                    provider.name(),
                    "structured",
                    guarded(
                        quota,
                        provider.quota_key(),
                        provider.name(),
                        "structured",
                        provider.query_structured(&entry.manufacturer_name, &entry.model),
                    ),
                )
                .await
                .flatten(),
                None => None,
            }
        };

        let prose = async {
            match &self.providers.generative {
                Some(provider) => isolated(
                    provider.name(),
                    "generative",
                    guarded(
                        quota,
                        provider.quota_key(),
                        provider.name(),
                        "generative",
                        provider.query_generative(&queries.generative_prompt),
                    ),
                )
                .await
                .flatten(),
                None => None,
            }
        };

        let museum = async {
            match &self.providers.museum {
                Some(scraper) => isolated("museum", "scrape", async {
                    Some(scraper.search(&queries.museum).await)
                })
                .await
                .unwrap_or_default(),
                None => Vec::new(),
            }
        };

        let (web, images, structured, prose, museum) =
            tokio::join!(web, images, structured, prose, museum);

        FetchedResults {
            web: web.into_iter().flatten().flatten().collect(),
            images: images.into_iter().flatten().flatten().collect(),
            museum,
            structured,
            prose,
        }
    }

    /// Links for filtered web results not yet on the entry
    ///
    /// Nothing is written here; the links are saved with the entry.
    async fn plan_links(
        &self,
        entry_id: i64,
        record: &mut EnrichmentRecord,
    ) -> Result<Vec<NewLink>, EnrichError> {
        let existing: HashSet<String> = self
            .storage
            .get_link_urls(entry_id)
            .await?
            .into_iter()
            .collect();

        let mut links = Vec::new();
        for result in &record.web_results {
            if existing.contains(&result.url) || record.added_link_urls.contains(&result.url) {
                continue;
            }
            let title = if result.title.trim().is_empty() {
                truncate_with_ellipsis(&result.url, LINK_TITLE_MAX)
            } else {
                truncate_with_ellipsis(result.title.trim(), LINK_TITLE_MAX)
            };
            let description =
                truncate_with_ellipsis(&clean_html(&result.snippet), LINK_DESCRIPTION_MAX);

            debug!(entry_id, url = %result.url, "Planned link");
            record.added_link_urls.push(result.url.clone());
            links.push(NewLink {
                url: result.url.clone(),
                title,
                description: (!description.is_empty()).then_some(description),
            });
        }
        Ok(links)
    }
}

/// Convert a panic inside a provider task into an empty result
async fn isolated<T, F>(provider: &str, operation: &str, task: F) -> Option<T>
where
    F: Future<Output = Option<T>>,
{
    match AssertUnwindSafe(task).catch_unwind().await {
        Ok(value) => value,
        Err(_) => {
            error!(provider, operation, "Provider task panicked");
            None
        }
    }
}

fn transition(entry_id: i64, phase: EnrichPhase) {
    debug!(entry_id, phase = %phase, "Enrichment phase");
}

/// Apply relevance filters and assemble the record sections
fn merge(entry: &Entry, fetched: FetchedResults) -> EnrichmentRecord {
    EnrichmentRecord {
        web_results: filter_web(fetched.web, &entry.manufacturer_name, &entry.model),
        image_results: filter_images(fetched.images, &entry.manufacturer_name, &entry.model),
        museum_results: fetched.museum,
        structured_ai: fetched.structured,
        ai_prose: fetched.prose,
        ..Default::default()
    }
}

/// Extraction corpus in precedence order
///
/// Unlinked web snippets, generative prose, structured raw text, museum
/// snippets.
fn corpus(record: &EnrichmentRecord) -> Vec<&str> {
    let linked: HashSet<&str> = record.added_link_urls.iter().map(String::as_str).collect();

    let mut sources: Vec<&str> = record
        .web_results
        .iter()
        .filter(|r| !linked.contains(r.url.as_str()))
        .map(|r| r.snippet.as_str())
        .collect();
    if let Some(prose) = &record.ai_prose {
        sources.push(&prose.content);
    }
    if let Some(structured) = &record.structured_ai {
        sources.push(&structured.raw_text);
    }
    sources.extend(record.museum_results.iter().filter_map(|m| m.snippet.as_deref()));
    sources
}

fn apply_extraction(record: &mut EnrichmentRecord) {
    let extraction = extract_specs(&corpus(record));
    record.spec_table = extraction.spec_table;
    record.extracted_facts = extraction.facts;
}

/// Plain-text description from the populated record sections
///
/// Falls back to the first three web snippets when no section has text.
pub fn build_description(record: &EnrichmentRecord) -> String {
    let mut sections: Vec<String> = Vec::new();

    if let Some(structured) = &record.structured_ai {
        if !structured.structured_table.is_empty() {
            let mut section = String::from("Structured Information:\n");
            for (key, value) in &structured.structured_table {
                section.push_str(&format!("{}: {}\n", key, value));
            }
            sections.push(section);
        }
        let raw = structured.raw_text.trim();
        if !raw.is_empty() {
            sections.push(format!("Additional Information:\n{}\n", raw));
        }
    }

    if let Some(prose) = &record.ai_prose {
        let content = prose.content.trim();
        if !content.is_empty() {
            sections.push(format!("{}\n", content));
        }
    }

    if !record.spec_table.is_empty() {
        let mut section = String::from("Technical Specifications:\n");
        for (key, value) in &record.spec_table {
            section.push_str(&format!("- {}: {}\n", key, value));
        }
        sections.push(section);
    }

    if !record.extracted_facts.is_empty() {
        let mut section = String::from("Additional Information:\n");
        for fact in &record.extracted_facts {
            section.push_str(&format!("- {}\n", fact));
        }
        sections.push(section);
    }

    if sections.is_empty() {
        let bullets: String = record
            .web_results
            .iter()
            .map(|r| clean_html(&r.snippet))
            .filter(|s| !s.is_empty())
            .take(FALLBACK_SNIPPETS)
            .map(|s| format!("- {}\n", truncate_with_ellipsis(&s, FALLBACK_SNIPPET_MAX)))
            .collect();
        if !bullets.is_empty() {
            sections.push(bullets);
        }
    }

    sections.join("\n").trim_end().to_string()
}
