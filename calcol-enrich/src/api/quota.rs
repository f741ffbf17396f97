//! Quota status endpoint
//!
//! GET /api/quota/status

use axum::{extract::State, routing::get, Json, Router};
use std::collections::BTreeMap;

use crate::quota::QuotaStatus;
use crate::AppState;

/// GET /api/quota/status
///
/// Usage snapshot keyed by provider name.
pub async fn quota_status(State(state): State<AppState>) -> Json<BTreeMap<String, QuotaStatus>> {
    Json(state.quota.status_all())
}

pub fn quota_routes() -> Router<AppState> {
    Router::new().route("/api/quota/status", get(quota_status))
}
