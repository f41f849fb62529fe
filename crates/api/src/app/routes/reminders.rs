use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{Extension, Path},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
};

use renqing_gifts::{GiftId, ReminderId};

use crate::app::routes::common;
use crate::app::services::{AppServices, NewReminder};
use crate::app::{dto, errors};
use crate::context::{LedgerContext, PrincipalContext};

pub fn router() -> Router {
    Router::new()
        .route("/", get(list_reminders).post(create_reminder))
        .route("/:id", axum::routing::delete(delete_reminder))
        .route("/:id/complete", post(complete_reminder))
}

pub async fn list_reminders(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(ledger): Extension<LedgerContext>,
) -> axum::response::Response {
    let reminders: Vec<_> = services
        .list_reminders(ledger.ledger_id())
        .iter()
        .map(dto::reminder_to_json)
        .collect();

    (
        StatusCode::OK,
        Json(serde_json::json!({ "reminders": reminders })),
    )
        .into_response()
}

pub async fn create_reminder(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(ledger): Extension<LedgerContext>,
    Extension(principal): Extension<PrincipalContext>,
    Json(body): Json<dto::CreateReminderRequest>,
) -> axum::response::Response {
    if let Err(resp) = common::guard(&ledger, &principal, "reminders.create") {
        return resp;
    }

    let gift_agg = match common::parse_id(&body.gift_id, "gift") {
        Ok(v) => v,
        Err(resp) => return resp,
    };

    let Some(kind) = dto::parse_reminder_kind(&body.reminder_type) else {
        return errors::json_error(
            StatusCode::BAD_REQUEST,
            "invalid_reminder_type",
            "reminder_type must be one of: 待回礼, 生日, 节日, 自定义",
        );
    };

    let input = NewReminder {
        gift_id: GiftId::new(gift_agg),
        kind,
        remind_on: body.reminder_date,
        message: body.message,
    };

    match services.add_reminder(ledger.ledger_id(), input) {
        Ok(reminder_id) => (
            StatusCode::CREATED,
            Json(serde_json::json!({ "id": reminder_id.to_string() })),
        )
            .into_response(),
        Err(e) => errors::dispatch_error_to_response(e),
    }
}

pub async fn complete_reminder(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(ledger): Extension<LedgerContext>,
    Extension(principal): Extension<PrincipalContext>,
    Path(id): Path<String>,
) -> axum::response::Response {
    if let Err(resp) = common::guard(&ledger, &principal, "reminders.update") {
        return resp;
    }

    let agg = match common::parse_id(&id, "reminder") {
        Ok(v) => v,
        Err(resp) => return resp,
    };

    match services.complete_reminder(ledger.ledger_id(), ReminderId::new(agg)) {
        Ok(()) => (StatusCode::OK, Json(serde_json::json!({ "id": id }))).into_response(),
        Err(e) => errors::dispatch_error_to_response(e),
    }
}

pub async fn delete_reminder(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(ledger): Extension<LedgerContext>,
    Extension(principal): Extension<PrincipalContext>,
    Path(id): Path<String>,
) -> axum::response::Response {
    if let Err(resp) = common::guard(&ledger, &principal, "reminders.delete") {
        return resp;
    }

    let agg = match common::parse_id(&id, "reminder") {
        Ok(v) => v,
        Err(resp) => return resp,
    };

    match services.delete_reminder(ledger.ledger_id(), ReminderId::new(agg)) {
        Ok(()) => StatusCode::NO_CONTENT.into_response(),
        Err(e) => errors::dispatch_error_to_response(e),
    }
}
