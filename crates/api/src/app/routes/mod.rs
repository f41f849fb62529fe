use axum::Router;

pub mod chat;
pub mod common;
pub mod contacts;
pub mod gifts;
pub mod inventory;
pub mod outgoing;
pub mod recommendations;
pub mod reminders;
pub mod stats;
pub mod system;

pub fn router() -> Router {
    Router::new()
        .nest("/gifts", gifts::router())
        .nest("/inventory", inventory::router())
        .nest("/contacts", contacts::router())
        .nest("/outgoing-gifts", outgoing::router())
        .nest("/reminders", reminders::router())
        .merge(recommendations::router())
        .merge(chat::router())
        .merge(stats::router())
}
