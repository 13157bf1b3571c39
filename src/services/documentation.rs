use utoipa::OpenApi;

#[derive(OpenApi)]
/// Aggregated OpenAPI specification for the league tracker backend.
#[openapi(
    paths(
        crate::routes::health::healthcheck,
        crate::routes::sse::league_stream,
        crate::routes::years::list_years,
        crate::routes::years::switch_year,
        crate::routes::players::list_players,
        crate::routes::players::create_player,
        crate::routes::players::update_player,
        crate::routes::players::delete_player,
        crate::routes::matches::list_matches,
        crate::routes::matches::create_match,
        crate::routes::matches::update_match,
        crate::routes::matches::delete_match,
        crate::routes::matches::set_availability,
        crate::routes::matches::set_lineup,
        crate::routes::matches::set_result,
        crate::routes::matches::vote_mvp,
        crate::routes::matches::mvp_summary,
        crate::routes::dashboard::dashboard,
    ),
    components(
        schemas(
            crate::dto::health::HealthResponse,
            crate::dto::sse::Handshake,
            crate::dto::sse::YearChangedEvent,
            crate::dto::sse::RosterChangedEvent,
            crate::dto::sse::ScheduleChangedEvent,
            crate::dto::sse::LoadingEvent,
            crate::state::league::Season,
            crate::state::league::AvailabilityStatus,
            crate::state::league::Outcome,
        )
    ),
    tags(
        (name = "health", description = "Health check endpoints"),
        (name = "sse", description = "Server-sent events stream"),
        (name = "league", description = "Year selection and dashboard"),
        (name = "players", description = "Roster management"),
        (name = "matches", description = "Schedule, availability, lineups, results and MVP votes"),
    )
)]
pub struct ApiDoc;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_route_is_documented() {
        let doc = ApiDoc::openapi();
        for path in [
            "/healthcheck",
            "/sse",
            "/years",
            "/year",
            "/players",
            "/players/{id}",
            "/matches",
            "/matches/{id}",
            "/matches/{id}/availability/{player_id}",
            "/matches/{id}/lineup",
            "/matches/{id}/result",
            "/matches/{id}/mvp-votes/{player_id}",
            "/matches/{id}/mvp",
            "/dashboard",
        ] {
            assert!(doc.paths.paths.contains_key(path), "{path} missing");
        }
    }
}
