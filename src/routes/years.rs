use axum::{
    Json, Router,
    extract::State,
    routing::{get, put},
};
use axum_valid::Valid;
use time::OffsetDateTime;

use crate::{
    dto::year::{SwitchYearRequest, YearsResponse},
    error::AppError,
    services::league_service,
    state::SharedState,
};

#[utoipa::path(
    get,
    path = "/years",
    tag = "league",
    responses((status = 200, description = "Selectable years and the active one", body = YearsResponse))
)]
/// Years offered by the selector.
pub async fn list_years(State(state): State<SharedState>) -> Json<YearsResponse> {
    Json(league_service::years(&state, OffsetDateTime::now_utc()).await)
}

#[utoipa::path(
    put,
    path = "/year",
    tag = "league",
    request_body = SwitchYearRequest,
    responses(
        (status = 200, description = "Active year switched", body = YearsResponse),
        (status = 400, description = "Year not offered")
    )
)]
/// Mirror another year; the roster and schedule are reloaded from scratch.
pub async fn switch_year(
    State(state): State<SharedState>,
    Valid(Json(request)): Valid<Json<SwitchYearRequest>>,
) -> Result<Json<YearsResponse>, AppError> {
    let years = league_service::switch_year(&state, request, OffsetDateTime::now_utc()).await?;
    Ok(Json(years))
}

/// Configure the year selection routes.
pub fn router() -> Router<SharedState> {
    Router::<SharedState>::new()
        .route("/years", get(list_years))
        .route("/year", put(switch_year))
}
