//! Relevance filtering of provider results
//!
//! Web results must mention "calculator", the manufacturer and the model.
//! Image metadata is noisier, so images only need "calculator" plus one of
//! manufacturer or model. An empty manufacturer or model disables filtering.

use crate::types::{ImageResult, WebResult};

const REQUIRED_TERM: &str = "calculator";

/// Lowercased, trimmed filter terms; None when filtering is bypassed
fn terms(manufacturer: &str, model: &str) -> Option<(String, String)> {
    let manufacturer = manufacturer.trim().to_lowercase();
    let model = model.trim().to_lowercase();
    if manufacturer.is_empty() || model.is_empty() {
        return None;
    }
    Some((manufacturer, model))
}

/// Strict predicate for a single web result
pub fn is_relevant_web(result: &WebResult, manufacturer: &str, model: &str) -> bool {
    let Some((manufacturer, model)) = terms(manufacturer, model) else {
        return true;
    };
    let haystack = format!("{} {} {}", result.title, result.snippet, result.url).to_lowercase();
    haystack.contains(REQUIRED_TERM) && haystack.contains(&manufacturer) && haystack.contains(&model)
}

/// Relaxed predicate for a single image result
pub fn is_relevant_image(result: &ImageResult, manufacturer: &str, model: &str) -> bool {
    let Some((manufacturer, model)) = terms(manufacturer, model) else {
        return true;
    };
    let haystack =
        format!("{} {} {}", result.title, result.source_url, result.image_url).to_lowercase();
    haystack.contains(REQUIRED_TERM) && (haystack.contains(&manufacturer) || haystack.contains(&model))
}

/// Keep web results that pass the strict predicate, preserving order
pub fn filter_web(results: Vec<WebResult>, manufacturer: &str, model: &str) -> Vec<WebResult> {
    let before = results.len();
    let kept: Vec<WebResult> = results
        .into_iter()
        .filter(|r| is_relevant_web(r, manufacturer, model))
        .collect();
    tracing::debug!(before, after = kept.len(), "Filtered web results");
    kept
}

/// Keep image results that pass the relaxed predicate, preserving order
pub fn filter_images(
    results: Vec<ImageResult>,
    manufacturer: &str,
    model: &str,
) -> Vec<ImageResult> {
    let before = results.len();
    let kept: Vec<ImageResult> = results
        .into_iter()
        .filter(|r| is_relevant_image(r, manufacturer, model))
        .collect();
    tracing::debug!(before, after = kept.len(), "Filtered image results");
    kept
}
