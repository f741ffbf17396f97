//! Database Test Utilities

use calcol_enrich::db::{init_tables, SqliteStorage};
use calcol_enrich::types::{Entry, Label};
use sqlx::sqlite::SqlitePoolOptions;

/// In-memory catalog with the schema applied
///
/// One connection only: every new connection to `sqlite::memory:` is a
/// fresh, empty database.
pub async fn create_test_storage() -> SqliteStorage {
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .connect("sqlite::memory:")
        .await
        .expect("in-memory database");
    init_tables(&pool).await.expect("schema");
    SqliteStorage::new(pool, Some("https://calcol.example".to_string()))
}

/// Insert a catalog entry and return its id
pub async fn seed_entry(
    storage: &SqliteStorage,
    manufacturer: &str,
    model: &str,
    sold_from: Option<i32>,
    labels: &[&str],
) -> i64 {
    let entry = Entry {
        manufacturer_name: manufacturer.to_string(),
        model: model.to_string(),
        sold_from,
        labels: labels.iter().map(|l| Label::new(*l)).collect(),
        ..Default::default()
    };
    storage.insert_entry(&entry).await.expect("seed entry")
}
