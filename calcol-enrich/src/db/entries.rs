//! Entry, label, image and link persistence

use crate::storage::Storage;
use crate::types::{Entry, Label, Link, NewLink};
use async_trait::async_trait;
use calcol_common::{Error, Result};
use sqlx::{SqliteConnection, SqlitePool};
use tracing::debug;

type EntryRow = (
    i64,
    String,
    String,
    Option<i32>,
    Option<i32>,
    Option<String>,
    Option<String>,
    Option<String>,
);

type LinkRow = (i64, i64, String, String, Option<String>, String);

/// [`Storage`] over the local SQLite catalog
#[derive(Clone)]
pub struct SqliteStorage {
    pool: SqlitePool,
    base_url: Option<String>,
}

impl SqliteStorage {
    /// `base_url` prefixes stored image paths (`{base}/uploads/{path}`)
    pub fn new(pool: SqlitePool, base_url: Option<String>) -> Self {
        Self {
            pool,
            base_url: base_url.map(|url| url.trim_end_matches('/').to_string()),
        }
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Absolute URL for a stored image path
    pub fn image_url(&self, path: &str) -> String {
        if path.starts_with("http://") || path.starts_with("https://") {
            return path.to_string();
        }
        format!(
            "{}/uploads/{}",
            self.base_url.as_deref().unwrap_or(""),
            path.trim_start_matches('/')
        )
    }

    /// Insert an entry with its labels, returning the new id
    ///
    /// `id`, `description` and `enriched_data` on the input are ignored.
    pub async fn insert_entry(&self, entry: &Entry) -> Result<i64> {
        if let (Some(from), Some(to)) = (entry.sold_from, entry.sold_to) {
            if from > to {
                return Err(Error::InvalidInput(format!(
                    "sold_from {} is after sold_to {}",
                    from, to
                )));
            }
        }

        let id = sqlx::query(
            r#"
            INSERT INTO entries (manufacturer_name, model, sold_from, sold_to, raw_text)
            VALUES (?, ?, ?, ?, ?)
            "#,
        )
        .bind(&entry.manufacturer_name)
        .bind(&entry.model)
        .bind(entry.sold_from)
        .bind(entry.sold_to)
        .bind(&entry.raw_text)
        .execute(&self.pool)
        .await?
        .last_insert_rowid();

        for label in &entry.labels {
            self.add_label(id, &label.name, label.description.as_deref())
                .await?;
        }

        debug!(entry_id = id, "Inserted entry");
        Ok(id)
    }

    /// Attach a label, creating it on first use
    pub async fn add_label(
        &self,
        entry_id: i64,
        name: &str,
        description: Option<&str>,
    ) -> Result<()> {
        sqlx::query("INSERT INTO labels (name, description) VALUES (?, ?) ON CONFLICT(name) DO NOTHING")
            .bind(name)
            .bind(description)
            .execute(&self.pool)
            .await?;

        sqlx::query(
            r#"
            INSERT OR IGNORE INTO entry_labels (entry_id, label_id)
            SELECT ?, id FROM labels WHERE name = ?
            "#,
        )
        .bind(entry_id)
        .bind(name)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Record an uploaded image path
    pub async fn add_image(&self, entry_id: i64, image_path: &str, approved: bool) -> Result<i64> {
        let id = sqlx::query("INSERT INTO entry_images (entry_id, image_path, is_approved) VALUES (?, ?, ?)")
            .bind(entry_id)
            .bind(image_path)
            .bind(approved)
            .execute(&self.pool)
            .await?
            .last_insert_rowid();
        Ok(id)
    }

    /// Links on an entry, oldest first
    pub async fn get_links(&self, entry_id: i64) -> Result<Vec<Link>> {
        let rows: Vec<LinkRow> = sqlx::query_as(
            r#"
            SELECT id, entry_id, url, title, description, added_by
            FROM entry_links
            WHERE entry_id = ?
            ORDER BY id
            "#,
        )
        .bind(entry_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .into_iter()
            .map(|(id, entry_id, url, title, description, added_by)| Link {
                id,
                entry_id,
                url,
                title,
                description,
                added_by,
            })
            .collect())
    }
}

#[async_trait]
impl Storage for SqliteStorage {
    async fn get_entry(&self, id: i64) -> Result<Option<Entry>> {
        let row: Option<EntryRow> = sqlx::query_as(
            r#"
            SELECT id, manufacturer_name, model, sold_from, sold_to, raw_text, description, enriched_data
            FROM entries
            WHERE id = ?
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        let Some((id, manufacturer_name, model, sold_from, sold_to, raw_text, description, enriched_data)) = row
        else {
            return Ok(None);
        };

        Ok(Some(Entry {
            id,
            manufacturer_name,
            model,
            sold_from,
            sold_to,
            raw_text,
            labels: self.get_labels(id).await?,
            approved_image_urls: self.get_approved_images(id).await?,
            description,
            enriched_data,
        }))
    }

    async fn get_labels(&self, entry_id: i64) -> Result<Vec<Label>> {
        let rows: Vec<(String, Option<String>)> = sqlx::query_as(
            r#"
            SELECT l.name, l.description
            FROM labels l
            JOIN entry_labels el ON el.label_id = l.id
            WHERE el.entry_id = ?
            ORDER BY el.rowid
            "#,
        )
        .bind(entry_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .into_iter()
            .map(|(name, description)| Label { name, description })
            .collect())
    }

    async fn get_approved_images(&self, entry_id: i64) -> Result<Vec<String>> {
        let paths: Vec<String> = sqlx::query_scalar(
            "SELECT image_path FROM entry_images WHERE entry_id = ? AND is_approved = 1 ORDER BY id",
        )
        .bind(entry_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(paths.iter().map(|p| self.image_url(p)).collect())
    }

    async fn get_link_urls(&self, entry_id: i64) -> Result<Vec<String>> {
        let urls: Vec<String> =
            sqlx::query_scalar("SELECT url FROM entry_links WHERE entry_id = ? ORDER BY id")
                .bind(entry_id)
                .fetch_all(&self.pool)
                .await?;
        Ok(urls)
    }

    async fn save_entry(&self, entry: &Entry) -> Result<()> {
        let mut conn = self.pool.acquire().await?;
        update_entry(&mut conn, entry).await
    }

    async fn add_link_if_absent(
        &self,
        entry_id: i64,
        url: &str,
        title: &str,
        description: Option<&str>,
        added_by: &str,
    ) -> Result<Option<Link>> {
        let mut conn = self.pool.acquire().await?;
        insert_link(&mut conn, entry_id, url, title, description, added_by).await
    }

    async fn save_enrichment(
        &self,
        entry: &Entry,
        links: &[NewLink],
        added_by: &str,
    ) -> Result<Vec<Link>> {
        let mut tx = self.pool.begin().await?;

        let mut created = Vec::with_capacity(links.len());
        for link in links {
            if let Some(link) = insert_link(
                &mut tx,
                entry.id,
                &link.url,
                &link.title,
                link.description.as_deref(),
                added_by,
            )
            .await?
            {
                created.push(link);
            }
        }
        update_entry(&mut tx, entry).await?;

        tx.commit().await?;
        debug!(entry_id = entry.id, links = created.len(), "Saved enrichment");
        Ok(created)
    }
}

async fn update_entry(conn: &mut SqliteConnection, entry: &Entry) -> Result<()> {
    let result = sqlx::query("UPDATE entries SET description = ?, enriched_data = ? WHERE id = ?")
        .bind(&entry.description)
        .bind(&entry.enriched_data)
        .bind(entry.id)
        .execute(&mut *conn)
        .await?;

    if result.rows_affected() == 0 {
        return Err(Error::NotFound(format!("entry {}", entry.id)));
    }
    Ok(())
}

async fn insert_link(
    conn: &mut SqliteConnection,
    entry_id: i64,
    url: &str,
    title: &str,
    description: Option<&str>,
    added_by: &str,
) -> Result<Option<Link>> {
    let result = sqlx::query(
        r#"
        INSERT INTO entry_links (entry_id, url, title, description, added_by)
        VALUES (?, ?, ?, ?, ?)
        ON CONFLICT(entry_id, url) DO NOTHING
        "#,
    )
    .bind(entry_id)
    .bind(url)
    .bind(title)
    .bind(description)
    .bind(added_by)
    .execute(&mut *conn)
    .await?;

    if result.rows_affected() == 0 {
        debug!(entry_id, url, "Link already present");
        return Ok(None);
    }

    Ok(Some(Link {
        id: result.last_insert_rowid(),
        entry_id,
        url: url.to_string(),
        title: title.to_string(),
        description: description.map(str::to_string),
        added_by: added_by.to_string(),
    }))
}
