//! Social share endpoint
//!
//! POST /api/calculators/:id/social-share/generate?platform=..&enableEnrichment=..

use axum::{
    extract::{Path, Query, State},
    routing::post,
    Json, Router,
};
use serde::{Deserialize, Serialize};

use crate::error::{ApiError, ApiResult};
use crate::services::post_formatter::{format_post, SocialPost};
use crate::storage::Storage;
use crate::types::{CalculatorInfo, EnrichmentRecord};
use crate::AppState;

/// Query parameters
#[derive(Debug, Deserialize)]
pub struct SocialShareParams {
    pub platform: Option<String>,
    #[serde(rename = "enableEnrichment", default)]
    pub enable_enrichment: bool,
}

/// Generated post plus the enrichment used (empty object when disabled)
#[derive(Debug, Serialize)]
pub struct SocialShareResponse {
    pub post: SocialPost,
    pub enrichment: EnrichmentRecord,
}

/// POST /api/calculators/:id/social-share/generate
///
/// Enrichment here is a preview: nothing is written back to the entry.
pub async fn generate_post(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Query(params): Query<SocialShareParams>,
) -> ApiResult<Json<SocialShareResponse>> {
    let platform = params
        .platform
        .filter(|p| !p.trim().is_empty())
        .ok_or_else(|| ApiError::BadRequest("platform is required".to_string()))?;

    let entry = state
        .storage
        .get_entry(id)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("calculator {}", id)))?;

    let enrichment = if params.enable_enrichment {
        state.orchestrator.preview(&entry).await
    } else {
        EnrichmentRecord::default()
    };

    let info = CalculatorInfo::from(&entry);
    let post = format_post(
        &platform,
        &info,
        params.enable_enrichment.then_some(&enrichment),
    );
    tracing::info!(entry_id = id, platform = %post.platform, chars = post.content.chars().count(), "Generated social post");

    Ok(Json(SocialShareResponse { post, enrichment }))
}

pub fn social_routes() -> Router<AppState> {
    Router::new().route(
        "/api/calculators/:id/social-share/generate",
        post(generate_post),
    )
}
