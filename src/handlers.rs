use crate::errors::AppError;
use crate::models::{AggregateSnapshot, RangeSummary, SummaryQuery, ToggleRequest, ToggleResponse};
use crate::settings::DisplaySettings;
use crate::state::AppState;
use crate::stats::summarize_range;
use axum::{
    extract::{Query, State},
    http::StatusCode,
    Json,
};
use tracing::info;

pub async fn get_snapshot(State(state): State<AppState>) -> Json<AggregateSnapshot> {
    Json(state.store.snapshot().await)
}

pub async fn get_summary(
    State(state): State<AppState>,
    Query(query): Query<SummaryQuery>,
) -> Result<Json<RangeSummary>, AppError> {
    if query.end < query.start {
        return Err(AppError::bad_request("end must not be before start"));
    }
    let summary = summarize_range(state.store.records(), query.start, query.end).await?;
    Ok(Json(summary))
}

pub async fn get_settings(State(state): State<AppState>) -> Json<DisplaySettings> {
    Json(state.settings.current().await)
}

pub async fn toggle_setting(
    State(state): State<AppState>,
    Json(payload): Json<ToggleRequest>,
) -> Result<Json<ToggleResponse>, AppError> {
    let name = payload.name.trim();
    let enabled = state.settings.toggle(name).await?;
    Ok(Json(ToggleResponse {
        name: name.to_string(),
        enabled,
    }))
}

pub async fn manual_reset(State(state): State<AppState>) -> Result<Json<AggregateSnapshot>, AppError> {
    state.store.manual_reset().await?;
    info!("totals reset on request");
    Ok(Json(state.store.snapshot().await))
}

pub async fn request_shutdown(State(state): State<AppState>) -> StatusCode {
    info!("shutdown requested");
    state.shutdown.send_replace(true);
    StatusCode::ACCEPTED
}
