//! calcol-enrich library interface
//!
//! Multi-source enrichment for vintage calculator catalog entries: quota
//! admission, provider adapters, query building, relevance filtering,
//! spec extraction, the fan-out orchestrator and the social post formatter.
//! The HTTP API and CLI in `main.rs` are thin layers over [`Orchestrator`].

pub mod api;
pub mod config;
pub mod db;
pub mod error;
pub mod orchestrator;
pub mod providers;
pub mod quota;
pub mod services;
pub mod storage;
pub mod types;

pub use crate::error::{ApiError, ApiResult};
pub use crate::orchestrator::{EnrichError, EnrichOutcome, EnrichStatus, Orchestrator};
pub use crate::quota::{QuotaGuard, QuotaKey};
pub use crate::storage::Storage;

use axum::Router;
use chrono::{DateTime, Utc};
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub storage: Arc<dyn Storage>,
    pub orchestrator: Arc<Orchestrator>,
    pub quota: Arc<QuotaGuard>,
    /// Service startup timestamp for uptime tracking
    pub startup_time: DateTime<Utc>,
}

impl AppState {
    pub fn new(orchestrator: Arc<Orchestrator>) -> Self {
        Self {
            storage: Arc::clone(orchestrator.storage()),
            quota: Arc::clone(orchestrator.quota()),
            orchestrator,
            startup_time: Utc::now(),
        }
    }
}

/// Build application router
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .merge(api::health_routes())
        .merge(api::quota_routes())
        .merge(api::enrich_routes())
        .merge(api::social_routes())
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}
