use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{Extension, Path},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
};

use renqing_inventory::{InventoryItemId, UpdateItemDetails};

use crate::app::routes::common;
use crate::app::services::AppServices;
use crate::app::{dto, errors};
use crate::context::{LedgerContext, PrincipalContext};

pub fn router() -> Router {
    Router::new()
        .route("/", get(list_items).post(create_item))
        .route("/batch-delete", post(batch_delete))
        .route("/:id", get(get_item).put(update_item).delete(delete_item))
        .route("/:id/adjust", post(adjust_stock))
}

pub async fn list_items(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(ledger): Extension<LedgerContext>,
) -> axum::response::Response {
    let items: Vec<_> = services
        .list_inventory(ledger.ledger_id())
        .iter()
        .map(dto::inventory_to_json)
        .collect();

    (StatusCode::OK, Json(serde_json::json!({ "items": items }))).into_response()
}

pub async fn get_item(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(ledger): Extension<LedgerContext>,
    Path(id): Path<String>,
) -> axum::response::Response {
    let agg = match common::parse_id(&id, "item") {
        Ok(v) => v,
        Err(resp) => return resp,
    };

    match services.get_inventory(ledger.ledger_id(), &InventoryItemId::new(agg)) {
        Some(item) => (StatusCode::OK, Json(dto::inventory_to_json(&item))).into_response(),
        None => errors::json_error(StatusCode::NOT_FOUND, "not_found", "item not found"),
    }
}

pub async fn create_item(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(ledger): Extension<LedgerContext>,
    Extension(principal): Extension<PrincipalContext>,
    Json(body): Json<dto::CreateInventoryRequest>,
) -> axum::response::Response {
    if let Err(resp) = common::guard(&ledger, &principal, "inventory.create") {
        return resp;
    }

    match services.add_inventory(ledger.ledger_id(), body.into_new_item()) {
        Ok(item_id) => (
            StatusCode::CREATED,
            Json(serde_json::json!({ "id": item_id.to_string() })),
        )
            .into_response(),
        Err(e) => errors::dispatch_error_to_response(e),
    }
}

pub async fn update_item(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(ledger): Extension<LedgerContext>,
    Extension(principal): Extension<PrincipalContext>,
    Path(id): Path<String>,
    Json(body): Json<dto::UpdateInventoryRequest>,
) -> axum::response::Response {
    if let Err(resp) = common::guard(&ledger, &principal, "inventory.update") {
        return resp;
    }

    let agg = match common::parse_id(&id, "item") {
        Ok(v) => v,
        Err(resp) => return resp,
    };

    let patch = UpdateItemDetails {
        ledger_id: ledger.ledger_id(),
        item_id: InventoryItemId::new(agg),
        name: body.name,
        category: body.category,
        unit_price: body.unit_price,
        description: body.description,
        photos: body.photos,
        occurred_at: chrono::Utc::now(),
    };

    match services.update_inventory(ledger.ledger_id(), patch) {
        Ok(()) => (StatusCode::OK, Json(serde_json::json!({ "id": id }))).into_response(),
        Err(e) => errors::dispatch_error_to_response(e),
    }
}

pub async fn adjust_stock(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(ledger): Extension<LedgerContext>,
    Extension(principal): Extension<PrincipalContext>,
    Path(id): Path<String>,
    Json(body): Json<dto::AdjustStockRequest>,
) -> axum::response::Response {
    if let Err(resp) = common::guard(&ledger, &principal, "inventory.adjust") {
        return resp;
    }

    let agg = match common::parse_id(&id, "item") {
        Ok(v) => v,
        Err(resp) => return resp,
    };

    match services.adjust_stock(ledger.ledger_id(), InventoryItemId::new(agg), body.delta) {
        Ok(()) => (StatusCode::OK, Json(serde_json::json!({ "id": id }))).into_response(),
        Err(e) => errors::dispatch_error_to_response(e),
    }
}

pub async fn delete_item(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(ledger): Extension<LedgerContext>,
    Extension(principal): Extension<PrincipalContext>,
    Path(id): Path<String>,
) -> axum::response::Response {
    if let Err(resp) = common::guard(&ledger, &principal, "inventory.delete") {
        return resp;
    }

    let agg = match common::parse_id(&id, "item") {
        Ok(v) => v,
        Err(resp) => return resp,
    };

    match services.delete_inventory(ledger.ledger_id(), InventoryItemId::new(agg)) {
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
    if let Err(resp) = common::guard(&ledger, &principal, "inventory.delete") {
        return resp;
    }

    let mut ids = Vec::with_capacity(body.ids.len());
    for raw in &body.ids {
        match common::parse_id(raw, "item") {
            Ok(agg) => ids.push(InventoryItemId::new(agg)),
            Err(resp) => return resp,
        }
    }

    match services.delete_inventory_items(ledger.ledger_id(), &ids) {
        Ok(()) => (
            StatusCode::OK,
            Json(serde_json::json!({ "deleted": ids.len() })),
        )
            .into_response(),
        Err(e) => errors::dispatch_error_to_response(e),
    }
}
