//! Query construction for the enrichment fan-out
//!
//! Every query is derived from the entry alone, so the same entry always
//! produces the same strings.

use crate::types::Entry;
use std::collections::HashSet;

/// Characters replaced by a space during canonicalisation
const FORBIDDEN: &[char] = &[
    ',', ';', ':', '!', '@', '#', '$', '%', '^', '&', '*', '(', ')', '[', ']', '{', '}', '_', '+',
    '=', '<', '>', '?', '/', '\\', '|', '"', '`', '~',
];

/// Entries sold after this year are not called "vintage"
const VINTAGE_CUTOFF_YEAR: i32 = 2000;

/// All query strings for one enrichment call
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EnrichmentQueries {
    pub web: String,
    pub image: String,
    pub structured_prompt: String,
    pub generative_prompt: String,
    pub museum: String,
}

/// Build every query for an entry
pub fn build_queries(entry: &Entry) -> EnrichmentQueries {
    EnrichmentQueries {
        web: web_query(entry),
        image: image_query(entry),
        structured_prompt: structured_prompt(&entry.manufacturer_name, &entry.model),
        generative_prompt: generative_prompt(entry),
        museum: format!("{} {}", entry.manufacturer_name.trim(), entry.model.trim())
            .trim()
            .to_string(),
    }
}

/// Mechanical > Electromechanical > electronic
fn calculator_kind(entry: &Entry) -> &'static str {
    if entry.has_label("Mechanical") {
        "mechanical"
    } else if entry.has_label("Electromechanical") {
        "electromechanical"
    } else {
        "electronic"
    }
}

/// Web search query
pub fn web_query(entry: &Entry) -> String {
    let mut terms: Vec<String> = vec![entry.manufacturer_name.clone(), entry.model.clone()];
    if let Some(from) = entry.sold_from {
        terms.push(from.to_string());
    }
    if let Some(to) = entry.sold_to {
        terms.push(to.to_string());
    }
    terms.push(calculator_kind(entry).to_string());
    terms.push("calculator".to_string());
    if entry.sold_from.map_or(true, |year| year <= VINTAGE_CUTOFF_YEAR) {
        terms.push("vintage".to_string());
    }
    if let Some(raw) = &entry.raw_text {
        terms.push(raw.clone());
    }

    canonicalize(&terms.join(" "))
}

/// Image search query: the web query plus "image"
pub fn image_query(entry: &Entry) -> String {
    canonicalize(&format!("{} image", web_query(entry)))
}

/// Prompt sent to the structured provider
pub fn structured_prompt(manufacturer: &str, model: &str) -> String {
    format!(
        "In a table of keywords and labels describe the vintage calculator {} {}",
        manufacturer, model
    )
}

/// Replace forbidden punctuation, collapse whitespace, drop repeated terms
///
/// Terms compare case-insensitively; the first spelling wins.
pub fn canonicalize(text: &str) -> String {
    let replaced: String = text
        .chars()
        .map(|c| if FORBIDDEN.contains(&c) { ' ' } else { c })
        .collect();

    let mut seen = HashSet::new();
    replaced
        .split_whitespace()
        .filter(|term| seen.insert(term.to_lowercase()))
        .collect::<Vec<_>>()
        .join(" ")
}

/// User prompt for the generative provider
pub fn generative_prompt(entry: &Entry) -> String {
    let mut prompt = String::from("I have a calculator with the following information:\n\n");

    prompt.push_str(&format!(
        "Calculator: {} {}\n",
        entry.manufacturer_name, entry.model
    ));
    if let Some(raw) = entry.raw_text.as_deref().filter(|r| !r.trim().is_empty()) {
        prompt.push_str(&format!("Description: {}\n", raw));
    }
    prompt.push('\n');

    if !entry.labels.is_empty() {
        let names: Vec<&str> = entry.labels.iter().map(|l| l.name.as_str()).collect();
        prompt.push_str(&format!("Labels: {}\n", names.join(", ")));

        let described: Vec<_> = entry
            .labels
            .iter()
            .filter_map(|l| {
                l.description
                    .as_deref()
                    .filter(|d| !d.trim().is_empty())
                    .map(|d| (l.name.as_str(), d))
            })
            .collect();
        if !described.is_empty() {
            prompt.push_str("Label descriptions:\n");
            for (name, description) in described {
                prompt.push_str(&format!("- {}: {}\n", name, description));
            }
        }
        prompt.push('\n');
    }

    if !entry.approved_image_urls.is_empty() {
        prompt.push_str(&format!(
            "Images available: {} image(s)\n",
            entry.approved_image_urls.len()
        ));
        prompt.push_str(&format!(
            "Image URLs: {}\n\n",
            entry.approved_image_urls.join(", ")
        ));
    }

    prompt.push_str("Please provide:\n");
    prompt.push_str("1. Historical context about this calculator\n");
    prompt.push_str("2. Technical specifications if known\n");
    prompt.push_str("3. Interesting facts or trivia\n");
    prompt.push_str("4. Links to relevant resources or museum pages\n");
    prompt.push_str("5. Any notable features or innovations\n");
    prompt
}
