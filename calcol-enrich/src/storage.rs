//! Catalog storage interface consumed by the enrichment pipeline
//!
//! Each call is atomic on its own; the pipeline never nests transactions.
//! [`crate::db::SqliteStorage`] is the bundled implementation.

use crate::types::{Entry, Label, Link, NewLink};
use async_trait::async_trait;
use calcol_common::Result;

#[async_trait]
pub trait Storage: Send + Sync {
    /// Entry with labels and approved image URLs loaded
    async fn get_entry(&self, id: i64) -> Result<Option<Entry>>;

    async fn get_labels(&self, entry_id: i64) -> Result<Vec<Label>>;

    /// Absolute URLs of approved images, in upload order
    async fn get_approved_images(&self, entry_id: i64) -> Result<Vec<String>>;

    /// URLs already linked to an entry
    async fn get_link_urls(&self, entry_id: i64) -> Result<Vec<String>>;

    /// Persist `description` and `enriched_data`
    async fn save_entry(&self, entry: &Entry) -> Result<()>;

    /// Insert a link unless `(entry_id, url)` already exists
    ///
    /// Returns None for a duplicate.
    async fn add_link_if_absent(
        &self,
        entry_id: i64,
        url: &str,
        title: &str,
        description: Option<&str>,
        added_by: &str,
    ) -> Result<Option<Link>>;

    /// Insert `links` (duplicates skipped) and save `entry` as one unit
    ///
    /// On error nothing is written. Returns the links actually created.
    async fn save_enrichment(
        &self,
        entry: &Entry,
        links: &[NewLink],
        added_by: &str,
    ) -> Result<Vec<Link>>;
}
