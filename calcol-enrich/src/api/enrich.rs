//! Enrichment endpoint
//!
//! POST /api/calculators/:id/enrich

use axum::{
    extract::{Path, State},
    routing::post,
    Json, Router,
};

use crate::error::ApiResult;
use crate::orchestrator::EnrichOutcome;
use crate::AppState;

/// POST /api/calculators/:id/enrich
///
/// Runs the full pipeline and persists the result. A no-data outcome is
/// still a 200; the status field tells the caller.
pub async fn enrich_calculator(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> ApiResult<Json<EnrichOutcome>> {
    tracing::info!(entry_id = id, "Enrichment requested");
    let outcome = state.orchestrator.enrich(id).await?;
    Ok(Json(outcome))
}

pub fn enrich_routes() -> Router<AppState> {
    Router::new().route("/api/calculators/:id/enrich", post(enrich_calculator))
}
