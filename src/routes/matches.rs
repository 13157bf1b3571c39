use axum::{
    Json, Router,
    extract::{Path, State},
    http::StatusCode,
    routing::{get, post, put},
};
use axum_valid::Valid;
use time::OffsetDateTime;

use crate::{
    dto::{
        matches::{
            AvailabilityRequest, CreateMatchRequest, LineupRequest, MatchesResponse, MvpResponse,
            ResultRequest, UpdateMatchRequest,
        },
        player::CreatedResponse,
    },
    error::AppError,
    services::league_service,
    state::SharedState,
};

/// Schedule endpoints of the active year.
pub fn router() -> Router<SharedState> {
    Router::new()
        .route("/matches", get(list_matches).post(create_match))
        .route("/matches/{id}", put(update_match).delete(delete_match))
        .route(
            "/matches/{id}/availability/{player_id}",
            put(set_availability),
        )
        .route("/matches/{id}/lineup", put(set_lineup))
        .route("/matches/{id}/result", put(set_result))
        .route("/matches/{id}/mvp-votes/{player_id}", post(vote_mvp))
        .route("/matches/{id}/mvp", get(mvp_summary))
}

/// List matches split into upcoming and past.
#[utoipa::path(
    get,
    path = "/matches",
    tag = "matches",
    responses((status = 200, description = "Schedule of the active year", body = MatchesResponse))
)]
pub async fn list_matches(State(state): State<SharedState>) -> Json<MatchesResponse> {
    Json(league_service::list_matches(&state, OffsetDateTime::now_utc()).await)
}

/// Schedule a match with an empty availability, lineup, result and ballot.
#[utoipa::path(
    post,
    path = "/matches",
    tag = "matches",
    request_body = CreateMatchRequest,
    responses(
        (status = 201, description = "Match created", body = CreatedResponse),
        (status = 400, description = "Invalid payload"),
        (status = 503, description = "Storage unavailable")
    )
)]
pub async fn create_match(
    State(state): State<SharedState>,
    Valid(Json(request)): Valid<Json<CreateMatchRequest>>,
) -> Result<(StatusCode, Json<CreatedResponse>), AppError> {
    let created = league_service::create_match(&state, request).await?;
    Ok((StatusCode::CREATED, Json(created)))
}

/// Edit opponent, location, date or season.
#[utoipa::path(
    put,
    path = "/matches/{id}",
    tag = "matches",
    params(("id" = String, Path, description = "Identifier of the match")),
    request_body = UpdateMatchRequest,
    responses((status = 204, description = "Update written"))
)]
pub async fn update_match(
    State(state): State<SharedState>,
    Path(id): Path<String>,
    Valid(Json(request)): Valid<Json<UpdateMatchRequest>>,
) -> Result<StatusCode, AppError> {
    league_service::update_match(&state, id, request).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// Delete a match, past or upcoming.
#[utoipa::path(
    delete,
    path = "/matches/{id}",
    tag = "matches",
    params(("id" = String, Path, description = "Identifier of the match")),
    responses((status = 204, description = "Match deleted"))
)]
pub async fn delete_match(
    State(state): State<SharedState>,
    Path(id): Path<String>,
) -> Result<StatusCode, AppError> {
    league_service::delete_match(&state, id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// Record one player's availability for a match.
#[utoipa::path(
    put,
    path = "/matches/{id}/availability/{player_id}",
    tag = "matches",
    params(
        ("id" = String, Path, description = "Identifier of the match"),
        ("player_id" = String, Path, description = "Identifier of the player")
    ),
    request_body = AvailabilityRequest,
    responses((status = 204, description = "Availability written"))
)]
pub async fn set_availability(
    State(state): State<SharedState>,
    Path((id, player_id)): Path<(String, String)>,
    Json(request): Json<AvailabilityRequest>,
) -> Result<StatusCode, AppError> {
    league_service::set_availability(&state, id, player_id, request).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// Replace the lineup (six singles slots, three doubles pairs).
#[utoipa::path(
    put,
    path = "/matches/{id}/lineup",
    tag = "matches",
    params(("id" = String, Path, description = "Identifier of the match")),
    request_body = LineupRequest,
    responses(
        (status = 204, description = "Lineup written"),
        (status = 400, description = "Lineup has the wrong shape")
    )
)]
pub async fn set_lineup(
    State(state): State<SharedState>,
    Path(id): Path<String>,
    Valid(Json(request)): Valid<Json<LineupRequest>>,
) -> Result<StatusCode, AppError> {
    league_service::set_lineup(&state, id, request).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// Replace the score.
#[utoipa::path(
    put,
    path = "/matches/{id}/result",
    tag = "matches",
    params(("id" = String, Path, description = "Identifier of the match")),
    request_body = ResultRequest,
    responses((status = 204, description = "Result written"))
)]
pub async fn set_result(
    State(state): State<SharedState>,
    Path(id): Path<String>,
    Json(request): Json<ResultRequest>,
) -> Result<StatusCode, AppError> {
    league_service::set_result(&state, id, request).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// Cast one MVP vote.
#[utoipa::path(
    post,
    path = "/matches/{id}/mvp-votes/{player_id}",
    tag = "matches",
    params(
        ("id" = String, Path, description = "Identifier of the match"),
        ("player_id" = String, Path, description = "Player receiving the vote")
    ),
    responses(
        (status = 204, description = "Vote recorded"),
        (status = 404, description = "Match not in the active year")
    )
)]
pub async fn vote_mvp(
    State(state): State<SharedState>,
    Path((id, player_id)): Path<(String, String)>,
) -> Result<StatusCode, AppError> {
    league_service::vote_mvp(&state, id, player_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// MVP ballot and standings for a match.
#[utoipa::path(
    get,
    path = "/matches/{id}/mvp",
    tag = "matches",
    params(("id" = String, Path, description = "Identifier of the match")),
    responses(
        (status = 200, description = "Ballot and standings", body = MvpResponse),
        (status = 404, description = "Match not in the active year")
    )
)]
pub async fn mvp_summary(
    State(state): State<SharedState>,
    Path(id): Path<String>,
) -> Result<Json<MvpResponse>, AppError> {
    Ok(Json(league_service::mvp_summary(&state, id).await?))
}
