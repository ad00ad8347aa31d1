use crate::handlers;
use crate::state::AppState;
use axum::{routing::{get, post}, Router};

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/api/snapshot", get(handlers::get_snapshot))
        .route("/api/summary", get(handlers::get_summary))
        .route("/api/settings", get(handlers::get_settings))
        .route("/api/settings/toggle", post(handlers::toggle_setting))
        .route("/api/reset", post(handlers::manual_reset))
        .route("/api/shutdown", post(handlers::request_shutdown))
        .with_state(state)
}
