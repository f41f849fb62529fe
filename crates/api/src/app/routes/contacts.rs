use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{Extension, Path},
    http::StatusCode,
    response::IntoResponse,
    routing::get,
};

use renqing_contacts::{ContactId, ContactProfile, UpdateContact};

use crate::app::routes::common;
use crate::app::services::AppServices;
use crate::app::{dto, errors};
use crate::context::{LedgerContext, PrincipalContext};

pub fn router() -> Router {
    Router::new()
        .route("/", get(list_contacts).post(create_contact))
        .route("/:id", axum::routing::put(update_contact).delete(delete_contact))
}

pub async fn list_contacts(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(ledger): Extension<LedgerContext>,
) -> axum::response::Response {
    let contacts: Vec<_> = services
        .list_contacts(ledger.ledger_id())
        .iter()
        .map(dto::contact_to_json)
        .collect();

    (
        StatusCode::OK,
        Json(serde_json::json!({ "contacts": contacts })),
    )
        .into_response()
}

pub async fn create_contact(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(ledger): Extension<LedgerContext>,
    Extension(principal): Extension<PrincipalContext>,
    Json(body): Json<dto::CreateContactRequest>,
) -> axum::response::Response {
    if let Err(resp) = common::guard(&ledger, &principal, "contacts.create") {
        return resp;
    }

    let gender = match parse_optional_gender(body.gender.as_deref()) {
        Ok(g) => g,
        Err(resp) => return resp,
    };

    let profile = ContactProfile {
        phone: body.phone,
        email: body.email,
        address: body.address,
        company: body.company,
        notes: body.notes,
        age: body.age,
        gender,
    };

    match services.add_contact(ledger.ledger_id(), body.name, profile) {
        Ok(contact_id) => (
            StatusCode::CREATED,
            Json(serde_json::json!({ "id": contact_id.to_string() })),
        )
            .into_response(),
        Err(e) => errors::dispatch_error_to_response(e),
    }
}

pub async fn update_contact(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(ledger): Extension<LedgerContext>,
    Extension(principal): Extension<PrincipalContext>,
    Path(id): Path<String>,
    Json(body): Json<dto::UpdateContactRequest>,
) -> axum::response::Response {
    if let Err(resp) = common::guard(&ledger, &principal, "contacts.update") {
        return resp;
    }

    let agg = match common::parse_id(&id, "contact") {
        Ok(v) => v,
        Err(resp) => return resp,
    };

    let gender = match parse_optional_gender(body.gender.as_deref()) {
        Ok(g) => g,
        Err(resp) => return resp,
    };

    let patch = UpdateContact {
        ledger_id: ledger.ledger_id(),
        contact_id: ContactId::new(agg),
        name: body.name,
        phone: body.phone,
        email: body.email,
        address: body.address,
        company: body.company,
        notes: body.notes,
        age: body.age,
        gender,
        occurred_at: chrono::Utc::now(),
    };

    match services.update_contact(ledger.ledger_id(), patch) {
        Ok(()) => (StatusCode::OK, Json(serde_json::json!({ "id": id }))).into_response(),
        Err(e) => errors::dispatch_error_to_response(e),
    }
}

pub async fn delete_contact(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(ledger): Extension<LedgerContext>,
    Extension(principal): Extension<PrincipalContext>,
    Path(id): Path<String>,
) -> axum::response::Response {
    if let Err(resp) = common::guard(&ledger, &principal, "contacts.delete") {
        return resp;
    }

    let agg = match common::parse_id(&id, "contact") {
        Ok(v) => v,
        Err(resp) => return resp,
    };

    match services.delete_contact(ledger.ledger_id(), ContactId::new(agg)) {
        Ok(()) => StatusCode::NO_CONTENT.into_response(),
        Err(e) => errors::dispatch_error_to_response(e),
    }
}

fn parse_optional_gender(
    label: Option<&str>,
) -> Result<Option<renqing_contacts::Gender>, axum::response::Response> {
    match label {
        None => Ok(None),
        Some(raw) => dto::parse_gender(raw).map(Some).ok_or_else(|| {
            errors::json_error(
                StatusCode::BAD_REQUEST,
                "invalid_gender",
                "gender must be one of: 男, 女, 未知",
            )
        }),
    }
}
