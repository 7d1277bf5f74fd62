use axum::{
    extract::DefaultBodyLimit,
    routing::{get, post},
    Router,
};
use tower_http::trace::TraceLayer;

use crate::state::AppState;

pub mod conferences;
pub mod crm_webhook;
pub mod health;
pub mod telegram;

pub fn create_router(state: AppState) -> Router<()> {
    let conference_routes = Router::new()
        .route(
            "/",
            get(conferences::list_conferences).post(conferences::create_conference),
        )
        .route("/:id/registrations", post(conferences::register));

    Router::new()
        .route("/api/health", get(health::health_check))
        .route("/crm-webhook", post(crm_webhook::crm_webhook))
        .route("/telegram-webhook", post(telegram::telegram_webhook))
        .nest("/api/conferences", conference_routes)
        .with_state(state)
        .layer(TraceLayer::new_for_http())
        .layer(DefaultBodyLimit::max(1024 * 1024))
}
