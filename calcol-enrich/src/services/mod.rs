//! Pure pipeline stages
//!
//! None of these modules perform I/O; the orchestrator feeds them provider
//! results and persists what they produce.

pub mod post_formatter;
pub mod query_builder;
pub mod relevance_filter;
pub mod spec_extractor;
pub mod text;

pub use post_formatter::{format_post, Platform, SocialPost};
pub use query_builder::{build_queries, EnrichmentQueries};
pub use relevance_filter::{filter_images, filter_web};
pub use spec_extractor::{extract_specs, parse_structured_table, SpecExtraction};
