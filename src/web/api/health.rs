use axum::{extract::State, Json};
use serde::Serialize;
use utoipa::ToSchema;

use crate::hub::HubStatsSnapshot;
use crate::web::auth::AppState;

#[derive(Debug, Serialize, ToSchema)]
pub struct HealthResponse {
    pub status: String,
}

#[utoipa::path(
    get,
    path = "/api/health",
    responses(
        (status = 200, description = "Service is up", body = HealthResponse)
    ),
    tag = "service"
)]
pub async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
    })
}

#[utoipa::path(
    get,
    path = "/api/hub/stats",
    responses(
        (status = 200, description = "Broadcast hub counters", body = HubStatsSnapshot)
    ),
    tag = "service"
)]
pub async fn hub_stats(State(state): State<AppState>) -> Json<HubStatsSnapshot> {
    Json(state.hub.stats())
}
