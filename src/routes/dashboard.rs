use axum::{Json, Router, extract::State, routing::get};
use time::OffsetDateTime;

use crate::{dto::dashboard::DashboardResponse, services::league_service, state::SharedState};

#[utoipa::path(
    get,
    path = "/dashboard",
    tag = "league",
    responses((status = 200, description = "Season overview", body = DashboardResponse))
)]
/// Season record, next matches and recent results.
pub async fn dashboard(State(state): State<SharedState>) -> Json<DashboardResponse> {
    Json(league_service::dashboard(&state, OffsetDateTime::now_utc()).await)
}

/// Configure the dashboard route.
pub fn router() -> Router<SharedState> {
    Router::<SharedState>::new().route("/dashboard", get(dashboard))
}
