use std::sync::Arc;

use axum::{
    Json, Router,
    extract::Extension,
    http::StatusCode,
    response::IntoResponse,
    routing::post,
};

use renqing_ai::{ChatMessage, ChatRole};

use crate::app::dto;
use crate::app::services::AppServices;
use crate::context::LedgerContext;

pub fn router() -> Router {
    Router::new().route("/ai/chat", post(chat))
}

/// Ledger-aware assistant. Collaborator failures come back as a canned
/// apology with `success: false`, never as an error page.
pub async fn chat(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(ledger): Extension<LedgerContext>,
    Json(body): Json<dto::ChatRequest>,
) -> axum::response::Response {
    let history: Vec<ChatMessage> = body
        .conversation_history
        .iter()
        .filter_map(|m| {
            let role = match m.role.as_str() {
                "user" => ChatRole::User,
                "assistant" => ChatRole::Assistant,
                _ => return None,
            };
            Some(ChatMessage {
                role,
                content: m.content.clone(),
            })
        })
        .collect();

    let answer = services
        .chat(ledger.ledger_id(), &body.message, &history)
        .await;

    let success = answer != renqing_ai::FALLBACK_REPLY;

    (
        StatusCode::OK,
        Json(serde_json::json!({
            "response": answer,
            "success": success,
        })),
    )
        .into_response()
}
