use std::sync::Arc;

use axum::{
    Json, Router, extract::Extension, http::StatusCode, response::IntoResponse, routing::get,
};

use crate::app::dto;
use crate::app::services::AppServices;
use crate::context::LedgerContext;

pub fn router() -> Router {
    Router::new().route("/stats", get(stats))
}

/// Dashboard totals for the ledger.
pub async fn stats(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(ledger): Extension<LedgerContext>,
) -> axum::response::Response {
    let summary = services.stats(ledger.ledger_id());
    (StatusCode::OK, Json(dto::stats_to_json(&summary))).into_response()
}
