use axum::{
    Json, Router,
    extract::{Path, State},
    http::StatusCode,
    routing::{get, put},
};
use axum_valid::Valid;

use crate::{
    dto::player::{CreatePlayerRequest, CreatedResponse, PlayersResponse, UpdatePlayerRequest},
    error::AppError,
    services::league_service,
    state::SharedState,
};

/// Roster endpoints of the active year.
pub fn router() -> Router<SharedState> {
    Router::new()
        .route("/players", get(list_players).post(create_player))
        .route("/players/{id}", put(update_player).delete(delete_player))
}

/// List the roster in rank order.
#[utoipa::path(
    get,
    path = "/players",
    tag = "players",
    responses((status = 200, description = "Roster of the active year", body = PlayersResponse))
)]
pub async fn list_players(State(state): State<SharedState>) -> Json<PlayersResponse> {
    Json(league_service::list_players(&state).await)
}

/// Add a player to the roster.
#[utoipa::path(
    post,
    path = "/players",
    tag = "players",
    request_body = CreatePlayerRequest,
    responses(
        (status = 201, description = "Player created", body = CreatedResponse),
        (status = 400, description = "Invalid payload"),
        (status = 503, description = "Storage unavailable")
    )
)]
pub async fn create_player(
    State(state): State<SharedState>,
    Valid(Json(request)): Valid<Json<CreatePlayerRequest>>,
) -> Result<(StatusCode, Json<CreatedResponse>), AppError> {
    let created = league_service::create_player(&state, request).await?;
    Ok((StatusCode::CREATED, Json(created)))
}

/// Edit a player's name or rank.
#[utoipa::path(
    put,
    path = "/players/{id}",
    tag = "players",
    params(("id" = String, Path, description = "Identifier of the player")),
    request_body = UpdatePlayerRequest,
    responses((status = 204, description = "Update written"))
)]
pub async fn update_player(
    State(state): State<SharedState>,
    Path(id): Path<String>,
    Valid(Json(request)): Valid<Json<UpdatePlayerRequest>>,
) -> Result<StatusCode, AppError> {
    league_service::update_player(&state, id, request).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// Remove a player; lineups and votes referencing them are left untouched.
#[utoipa::path(
    delete,
    path = "/players/{id}",
    tag = "players",
    params(("id" = String, Path, description = "Identifier of the player")),
    responses((status = 204, description = "Player deleted"))
)]
pub async fn delete_player(
    State(state): State<SharedState>,
    Path(id): Path<String>,
) -> Result<StatusCode, AppError> {
    league_service::delete_player(&state, id).await?;
    Ok(StatusCode::NO_CONTENT)
}
