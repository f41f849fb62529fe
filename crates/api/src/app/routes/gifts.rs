use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{Extension, Path},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
};

use renqing_gifts::{GiftId, UpdateGiftDetails};

use crate::app::services::AppServices;
use crate::app::{dto, errors};
use crate::app::routes::common;
use crate::context::{LedgerContext, PrincipalContext};

pub fn router() -> Router {
    Router::new()
        .route("/", get(list_gifts).post(create_gift))
        .route("/batch-delete", post(batch_delete))
        .route("/:id", get(get_gift).put(update_gift).delete(delete_gift))
        .route("/:id/reply", post(reply))
        .route("/:id/cancel-reply", post(cancel_reply))
        .route("/:id/convert-line", post(convert_line))
}

pub async fn list_gifts(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(ledger): Extension<LedgerContext>,
) -> axum::response::Response {
    let gifts: Vec<_> = services
        .list_gifts(ledger.ledger_id())
        .iter()
        .map(dto::gift_to_json)
        .collect();

    (StatusCode::OK, Json(serde_json::json!({ "gifts": gifts }))).into_response()
}

pub async fn get_gift(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(ledger): Extension<LedgerContext>,
    Path(id): Path<String>,
) -> axum::response::Response {
    let agg = match common::parse_id(&id, "gift") {
        Ok(v) => v,
        Err(resp) => return resp,
    };

    match services.get_gift(ledger.ledger_id(), &GiftId::new(agg)) {
        Some(gift) => (StatusCode::OK, Json(dto::gift_to_json(&gift))).into_response(),
        None => errors::json_error(StatusCode::NOT_FOUND, "not_found", "gift not found"),
    }
}

pub async fn create_gift(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(ledger): Extension<LedgerContext>,
    Extension(principal): Extension<PrincipalContext>,
    Json(body): Json<dto::CreateGiftRequest>,
) -> axum::response::Response {
    if let Err(resp) = common::guard(&ledger, &principal, "gifts.create") {
        return resp;
    }

    match services.record_gift(ledger.ledger_id(), body.into_new_gift()) {
        Ok(gift_id) => (
            StatusCode::CREATED,
            Json(serde_json::json!({ "id": gift_id.to_string() })),
        )
            .into_response(),
        Err(e) => errors::dispatch_error_to_response(e),
    }
}

pub async fn update_gift(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(ledger): Extension<LedgerContext>,
    Extension(principal): Extension<PrincipalContext>,
    Path(id): Path<String>,
    Json(body): Json<dto::UpdateGiftRequest>,
) -> axum::response::Response {
    if let Err(resp) = common::guard(&ledger, &principal, "gifts.update") {
        return resp;
    }

    let agg = match common::parse_id(&id, "gift") {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    let gift_id = GiftId::new(agg);

    let patch = UpdateGiftDetails {
        ledger_id: ledger.ledger_id(),
        gift_id,
        from_person: body.from_person,
        from_company: body.from_company,
        received_date: body.received_date,
        notes: body.notes,
        photos: body.photos,
        occurred_at: chrono::Utc::now(),
    };

    match services.update_gift(ledger.ledger_id(), gift_id, patch) {
        Ok(()) => (StatusCode::OK, Json(serde_json::json!({ "id": id }))).into_response(),
        Err(e) => errors::dispatch_error_to_response(e),
    }
}

pub async fn delete_gift(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(ledger): Extension<LedgerContext>,
    Extension(principal): Extension<PrincipalContext>,
    Path(id): Path<String>,
) -> axum::response::Response {
    if let Err(resp) = common::guard(&ledger, &principal, "gifts.delete") {
        return resp;
    }

    let agg = match common::parse_id(&id, "gift") {
        Ok(v) => v,
        Err(resp) => return resp,
    };

    match services.delete_gift(ledger.ledger_id(), GiftId::new(agg)) {
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
    if let Err(resp) = common::guard(&ledger, &principal, "gifts.delete") {
        return resp;
    }

    let mut ids = Vec::with_capacity(body.ids.len());
    for raw in &body.ids {
        match common::parse_id(raw, "gift") {
            Ok(agg) => ids.push(GiftId::new(agg)),
            Err(resp) => return resp,
        }
    }

    match services.delete_gifts(ledger.ledger_id(), &ids) {
        Ok(()) => (
            StatusCode::OK,
            Json(serde_json::json!({ "deleted": ids.len() })),
        )
            .into_response(),
        Err(e) => errors::dispatch_error_to_response(e),
    }
}

pub async fn reply(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(ledger): Extension<LedgerContext>,
    Extension(principal): Extension<PrincipalContext>,
    Path(id): Path<String>,
    Json(body): Json<dto::ReplyRequest>,
) -> axum::response::Response {
    if let Err(resp) = common::guard(&ledger, &principal, "gifts.reply") {
        return resp;
    }

    let agg = match common::parse_id(&id, "gift") {
        Ok(v) => v,
        Err(resp) => return resp,
    };

    let reply_date = body.reply_date;
    let items = match body.into_reply_lines() {
        Ok(items) => items,
        Err(bad_id) => {
            return errors::json_error(
                StatusCode::BAD_REQUEST,
                "invalid_id",
                format!("invalid inventory id '{bad_id}'"),
            );
        }
    };

    match services.reply_to_gift(ledger.ledger_id(), GiftId::new(agg), reply_date, items) {
        Ok(()) => (StatusCode::OK, Json(serde_json::json!({ "id": id }))).into_response(),
        Err(e) => errors::dispatch_error_to_response(e),
    }
}

pub async fn cancel_reply(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(ledger): Extension<LedgerContext>,
    Extension(principal): Extension<PrincipalContext>,
    Path(id): Path<String>,
) -> axum::response::Response {
    if let Err(resp) = common::guard(&ledger, &principal, "gifts.reply") {
        return resp;
    }

    let agg = match common::parse_id(&id, "gift") {
        Ok(v) => v,
        Err(resp) => return resp,
    };

    match services.cancel_reply(ledger.ledger_id(), GiftId::new(agg)) {
        Ok(()) => (StatusCode::OK, Json(serde_json::json!({ "id": id }))).into_response(),
        Err(e) => errors::dispatch_error_to_response(e),
    }
}

/// Convert one received line into provenance-linked stock.
pub async fn convert_line(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(ledger): Extension<LedgerContext>,
    Extension(principal): Extension<PrincipalContext>,
    Path(id): Path<String>,
    Json(body): Json<dto::CreateInventoryRequest>,
) -> axum::response::Response {
    if let Err(resp) = common::guard(&ledger, &principal, "inventory.create") {
        return resp;
    }

    let agg = match common::parse_id(&id, "gift") {
        Ok(v) => v,
        Err(resp) => return resp,
    };

    match services.convert_gift_line(ledger.ledger_id(), GiftId::new(agg), body.into_new_item()) {
        Ok(item_id) => (
            StatusCode::CREATED,
            Json(serde_json::json!({ "id": item_id.to_string() })),
        )
            .into_response(),
        Err(e) => errors::dispatch_error_to_response(e),
    }
}
