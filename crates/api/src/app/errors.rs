use axum::http::StatusCode;
use axum::response::IntoResponse;
use serde_json::json;

use renqing_infra::command_dispatcher::DispatchError;

/// One mapping from pipeline errors to HTTP responses, used by every route.
///
/// Concurrency and state conflicts are both 409, but with distinct codes:
/// the first invites a retry, the second means the transition is illegal.
pub fn dispatch_error_to_response(err: DispatchError) -> axum::response::Response {
    match err {
        DispatchError::Concurrency(msg) => json_error(StatusCode::CONFLICT, "conflict_retry", msg),
        DispatchError::StateConflict(msg) => {
            json_error(StatusCode::CONFLICT, "state_conflict", msg)
        }
        DispatchError::Validation(msg) => {
            json_error(StatusCode::BAD_REQUEST, "validation_error", msg)
        }
        DispatchError::InvariantViolation(msg) => {
            json_error(StatusCode::UNPROCESSABLE_ENTITY, "invariant_violation", msg)
        }
        DispatchError::NotFound => json_error(StatusCode::NOT_FOUND, "not_found", "not found"),
        DispatchError::Deserialize(msg) => {
            json_error(StatusCode::INTERNAL_SERVER_ERROR, "deserialize_error", msg)
        }
        DispatchError::Store(e) => json_error(
            StatusCode::INTERNAL_SERVER_ERROR,
            "store_error",
            format!("{e:?}"),
        ),
        DispatchError::Publish(msg) => json_error(StatusCode::BAD_GATEWAY, "publish_error", msg),
        DispatchError::LedgerIsolation(msg) => {
            json_error(StatusCode::FORBIDDEN, "ledger_isolation", msg)
        }
    }
}

pub fn json_error(
    status: StatusCode,
    code: &'static str,
    message: impl Into<String>,
) -> axum::response::Response {
    (
        status,
        axum::Json(json!({
            "error": code,
            "message": message.into(),
        })),
    )
        .into_response()
}
