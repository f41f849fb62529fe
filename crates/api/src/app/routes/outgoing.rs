use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{Extension, Path},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
};

use renqing_outgoing::OutgoingGiftId;

use crate::app::routes::common;
use crate::app::services::AppServices;
use crate::app::{dto, errors};
use crate::context::{LedgerContext, PrincipalContext};

pub fn router() -> Router {
    Router::new()
        .route("/", get(list_outgoing).post(create_outgoing))
        .route("/batch-delete", post(batch_delete))
        .route("/:id", axum::routing::delete(delete_outgoing))
}

pub async fn list_outgoing(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(ledger): Extension<LedgerContext>,
) -> axum::response::Response {
    let gifts: Vec<_> = services
        .list_outgoing(ledger.ledger_id())
        .iter()
        .map(dto::outgoing_to_json)
        .collect();

    (
        StatusCode::OK,
        Json(serde_json::json!({ "outgoing_gifts": gifts })),
    )
        .into_response()
}

pub async fn create_outgoing(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(ledger): Extension<LedgerContext>,
    Extension(principal): Extension<PrincipalContext>,
    Json(body): Json<dto::CreateOutgoingRequest>,
) -> axum::response::Response {
    if let Err(resp) = common::guard(&ledger, &principal, "outgoing.create") {
        return resp;
    }

    let input = match body.into_new_outgoing() {
        Ok(input) => input,
        Err(bad_id) => {
            return errors::json_error(
                StatusCode::BAD_REQUEST,
                "invalid_id",
                format!("invalid inventory id '{bad_id}'"),
            );
        }
    };

    match services.record_outgoing(ledger.ledger_id(), input) {
        Ok(outgoing_id) => (
            StatusCode::CREATED,
            Json(serde_json::json!({ "id": outgoing_id.to_string() })),
        )
            .into_response(),
        Err(e) => errors::dispatch_error_to_response(e),
    }
}

pub async fn delete_outgoing(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(ledger): Extension<LedgerContext>,
    Extension(principal): Extension<PrincipalContext>,
    Path(id): Path<String>,
) -> axum::response::Response {
    if let Err(resp) = common::guard(&ledger, &principal, "outgoing.delete") {
        return resp;
    }

    let agg = match common::parse_id(&id, "outgoing gift") {
        Ok(v) => v,
        Err(resp) => return resp,
    };

    match services.delete_outgoing(ledger.ledger_id(), OutgoingGiftId::new(agg)) {
        Ok(()) => StatusCode::NO_CONTENT.into_response(),
        Err(e) => errors::dispatch_error_to_response(e),
    }
}

pub async fn batch_delete(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(ledger): Extension<LedgerContext>,
    Extension(principal): Extension<PrincipalContext>,
    Json(body): Json<dto::BatchIdsRequest>,
) -> axum::response::Response {
    if let Err(resp) = common::guard(&ledger, &principal, "outgoing.delete") {
        return resp;
    }

    let mut ids = Vec::with_capacity(body.ids.len());
    for raw in &body.ids {
        match common::parse_id(raw, "outgoing gift") {
            Ok(agg) => ids.push(OutgoingGiftId::new(agg)),
            Err(resp) => return resp,
        }
    }

    match services.delete_outgoing_gifts(ledger.ledger_id(), &ids) {
        Ok(()) => (
            StatusCode::OK,
            Json(serde_json::json!({ "deleted": ids.len() })),
        )
            .into_response(),
        Err(e) => errors::dispatch_error_to_response(e),
    }
}
