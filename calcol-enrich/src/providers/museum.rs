//! Calculator museum site scraper
//!
//! Fetches each configured museum page concurrently and looks for the
//! "manufacturer model" query in the returned text. Only sites where the
//! query appears are reported, with a short window of surrounding text.
//!
//! A site URL ending in an empty query parameter (`?s=`) receives the
//! URL-encoded query there; any other URL is fetched as-is.

use super::{decode_text, MuseumSearch, ProviderError};
use crate::config::MuseumConfig;
use crate::services::text::collapse_whitespace;
use crate::types::MuseumResult;
use async_trait::async_trait;
use futures::future::join_all;
use reqwest::{Client, Url};
use std::time::Duration;
use tracing::{debug, info, warn};

/// Built-in museum sites
pub const DEFAULT_MUSEUM_SITES: [&str; 8] = [
    "https://calculator-museum.nl/?s=",
    "http://www.calcuseum.com/",
    "https://www.hpmuseum.org/search.php?q=",
    "http://www.vintagecalculators.com/",
    "https://www.calculators.de/",
    "http://www.datamath.org/",
    "http://www.arithmomuseum.com/",
    "https://www.oldcalculatormuseum.com/",
];

/// Characters of context kept on each side of a match
const SNIPPET_CONTEXT: usize = 100;

/// Resolved search target for one site
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SiteTarget {
    pub site_url: String,
    pub search_url: String,
}

/// Build the site root and the search URL for a query
pub fn site_target(site: &str, query: &str) -> Option<SiteTarget> {
    let mut url = Url::parse(site).ok()?;
    let site_url = format!("{}/", url.origin().ascii_serialization());

    let pairs: Vec<(String, String)> = url.query_pairs().into_owned().collect();
    if let Some(slot) = pairs.iter().position(|(_, value)| value.is_empty()) {
        let mut serializer = url.query_pairs_mut();
        serializer.clear();
        for (i, (name, value)) in pairs.iter().enumerate() {
            if i == slot {
                serializer.append_pair(name, query);
            } else {
                serializer.append_pair(name, value);
            }
        }
    }

    Some(SiteTarget {
        site_url,
        search_url: url.to_string(),
    })
}

/// Case-insensitive (ASCII) search for `query`, returning surrounding text
pub fn find_snippet(page: &str, query: &str) -> Option<String> {
    if query.is_empty() {
        return None;
    }
    // ASCII lowering keeps byte offsets aligned with `page`
    let index = page
        .to_ascii_lowercase()
        .find(&query.to_ascii_lowercase())?;

    let mut start = index.saturating_sub(SNIPPET_CONTEXT);
    while !page.is_char_boundary(start) {
        start -= 1;
    }
    let mut end = (index + query.len() + SNIPPET_CONTEXT).min(page.len());
    while !page.is_char_boundary(end) {
        end += 1;
    }

    Some(collapse_whitespace(&page[start..end]))
}

/// Museum scraper over a fixed site list
pub struct MuseumScraper {
    http: Client,
    sites: Vec<String>,
    timeout: Duration,
    max_body_bytes: usize,
}

impl MuseumScraper {
    pub fn new(http: Client, config: &MuseumConfig, max_body_bytes: usize) -> Self {
        Self {
            http,
            sites: config.sites.clone(),
            timeout: config.timeout,
            max_body_bytes,
        }
    }

    async fn probe(&self, target: &SiteTarget, query: &str) -> Result<MuseumResult, ProviderError> {
        let response = self
            .http
            .get(&target.search_url)
            .timeout(self.timeout)
            .send()
            .await?;
        let page = decode_text(response, self.max_body_bytes).await?;
        let snippet = find_snippet(&page, query);

        Ok(MuseumResult {
            site_url: target.site_url.clone(),
            search_url: target.search_url.clone(),
            found: snippet.is_some(),
            snippet,
        })
    }
}

#[async_trait]
impl MuseumSearch for MuseumScraper {
    async fn search(&self, query: &str) -> Vec<MuseumResult> {
        let query = query.trim();
        if query.is_empty() {
            return Vec::new();
        }

        let targets: Vec<SiteTarget> = self
            .sites
            .iter()
            .filter_map(|site| {
                let target = site_target(site, query);
                if target.is_none() {
                    warn!(site = %site, "Skipping invalid museum site URL");
                }
                target
            })
            .collect();

        let outcomes = join_all(targets.iter().map(|t| self.probe(t, query))).await;

        let mut found = Vec::new();
        for (target, outcome) in targets.iter().zip(outcomes) {
            match outcome {
                Ok(result) if result.found => found.push(result),
                Ok(_) => debug!(site = %target.site_url, "Query not found on museum site"),
                Err(err) => warn!(site = %target.site_url, error = %err, "Museum site fetch failed"),
            }
        }

        info!(query, sites = targets.len(), hits = found.len(), "Museum search finished");
        found
    }
}
