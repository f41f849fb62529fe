use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{Extension, Path},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
};
use serde::Deserialize;

use renqing_gifts::GiftId;

use crate::app::routes::common;
use crate::app::services::AppServices;
use crate::app::{dto, errors};
use crate::context::LedgerContext;

pub fn router() -> Router {
    Router::new()
        .route("/recommendations/:gift_id", get(scored_recommendations))
        .route("/ai/recommend", post(package_recommendations))
}

/// Deterministic rule-scorer ranking for a gift's reply.
///
/// An empty list means no suitable recommendation exists (for example a
/// zero-value gift, whose price band admits nothing) — that is a normal
/// answer, not an error.
pub async fn scored_recommendations(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(ledger): Extension<LedgerContext>,
    Path(gift_id): Path<String>,
) -> axum::response::Response {
    let agg = match common::parse_id(&gift_id, "gift") {
        Ok(v) => v,
        Err(resp) => return resp,
    };

    match services.score_reply_candidates(ledger.ledger_id(), &GiftId::new(agg)) {
        Ok(scored) => {
            let recommendations: Vec<_> =
                scored.iter().map(dto::scored_candidate_to_json).collect();
            (
                StatusCode::OK,
                Json(serde_json::json!({
                    "gift_id": gift_id,
                    "count": recommendations.len(),
                    "recommendations": recommendations,
                })),
            )
                .into_response()
        }
        Err(e) => errors::dispatch_error_to_response(e),
    }
}

#[derive(Debug, Deserialize)]
pub struct AiRecommendRequest {
    pub gift_id: String,
}

/// Generative package recommendations; falls back to the rule scorer when
/// the model is unavailable or its output fails validation.
pub async fn package_recommendations(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(ledger): Extension<LedgerContext>,
    Json(body): Json<AiRecommendRequest>,
) -> axum::response::Response {
    let agg = match common::parse_id(&body.gift_id, "gift") {
        Ok(v) => v,
        Err(resp) => return resp,
    };

    match services
        .recommend_packages(ledger.ledger_id(), &GiftId::new(agg))
        .await
    {
        Ok(packages) => {
            let recommendations: Vec<_> = packages.iter().map(dto::package_to_json).collect();
            (
                StatusCode::OK,
                Json(serde_json::json!({
                    "gift_id": body.gift_id,
                    "recommendations": recommendations,
                })),
            )
                .into_response()
        }
        Err(e) => errors::dispatch_error_to_response(e),
    }
}
