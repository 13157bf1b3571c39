//! Request-level league operations used by the REST routes.

use time::OffsetDateTime;
use tracing::info;

use crate::{
    dto::{
        dashboard::DashboardResponse,
        matches::{
            AvailabilityRequest, CreateMatchRequest, LineupRequest, MatchSummary,
            MatchesResponse, MvpResponse, ResultRequest, UpdateMatchRequest,
        },
        player::{
            CreatePlayerRequest, CreatedResponse, PlayerSummary, PlayersResponse,
            UpdatePlayerRequest,
        },
        year::{SwitchYearRequest, YearsResponse},
    },
    error::ServiceError,
    services::views,
    state::{
        SharedState,
        league::{Lineup, Match, MatchId, PlayerId},
    },
};

pub async fn list_players(state: &SharedState) -> PlayersResponse {
    let snapshot = state.league().snapshot().await;
    PlayersResponse {
        year: snapshot.year,
        loading: snapshot.loading,
        players: snapshot.players.iter().map(PlayerSummary::from).collect(),
    }
}

pub async fn create_player(
    state: &SharedState,
    request: CreatePlayerRequest,
) -> Result<CreatedResponse, ServiceError> {
    let id = state.league().add_player(request.into()).await?;
    Ok(CreatedResponse { id: id.0 })
}

pub async fn update_player(
    state: &SharedState,
    id: String,
    request: UpdatePlayerRequest,
) -> Result<(), ServiceError> {
    state
        .league()
        .update_player(&PlayerId(id), request.into())
        .await
}

pub async fn delete_player(state: &SharedState, id: String) -> Result<(), ServiceError> {
    state.league().delete_player(&PlayerId(id)).await
}

/// Schedule split around `now`, every match resolved against the current roster.
pub async fn list_matches(state: &SharedState, now: OffsetDateTime) -> MatchesResponse {
    let snapshot = state.league().snapshot().await;
    let partition = views::partition_matches(&snapshot.matches, now);
    let summarize = |games: Vec<&Match>| -> Vec<MatchSummary> {
        games
            .into_iter()
            .map(|game| MatchSummary::build(game, &snapshot.players))
            .collect()
    };

    MatchesResponse {
        year: snapshot.year,
        loading: snapshot.loading,
        upcoming: summarize(partition.upcoming),
        past: summarize(partition.past),
    }
}

pub async fn create_match(
    state: &SharedState,
    request: CreateMatchRequest,
) -> Result<CreatedResponse, ServiceError> {
    let id = state.league().add_match(request.into()).await?;
    Ok(CreatedResponse { id: id.0 })
}

pub async fn update_match(
    state: &SharedState,
    id: String,
    request: UpdateMatchRequest,
) -> Result<(), ServiceError> {
    state
        .league()
        .update_match(&MatchId(id), request.into())
        .await
}

pub async fn delete_match(state: &SharedState, id: String) -> Result<(), ServiceError> {
    state.league().delete_match(&MatchId(id)).await
}

pub async fn set_availability(
    state: &SharedState,
    match_id: String,
    player_id: String,
    request: AvailabilityRequest,
) -> Result<(), ServiceError> {
    state
        .league()
        .update_player_availability(&MatchId(match_id), &PlayerId(player_id), request.status)
        .await
}

pub async fn set_lineup(
    state: &SharedState,
    match_id: String,
    request: LineupRequest,
) -> Result<(), ServiceError> {
    let lineup =
        Lineup::try_from(request).map_err(|err| ServiceError::InvalidInput(err.to_string()))?;
    state
        .league()
        .update_match_lineup(&MatchId(match_id), lineup)
        .await
}

pub async fn set_result(
    state: &SharedState,
    match_id: String,
    request: ResultRequest,
) -> Result<(), ServiceError> {
    state
        .league()
        .update_match_result(&MatchId(match_id), request.into())
        .await
}

pub async fn vote_mvp(
    state: &SharedState,
    match_id: String,
    player_id: String,
) -> Result<(), ServiceError> {
    state
        .league()
        .add_mvp_vote(&MatchId(match_id), &PlayerId(player_id))
        .await
}

/// MVP ballot (lineup participants) and current standings.
pub async fn mvp_summary(
    state: &SharedState,
    match_id: String,
) -> Result<MvpResponse, ServiceError> {
    let snapshot = state.league().snapshot().await;
    let id = MatchId(match_id);
    let game = snapshot
        .matches
        .iter()
        .find(|game| game.id == id)
        .ok_or_else(|| ServiceError::NotFound(format!("match `{id}`")))?;

    Ok(MvpResponse {
        match_id: id.to_string(),
        ballot: views::mvp_ballot(game, &snapshot.players)
            .into_iter()
            .map(PlayerSummary::from)
            .collect(),
        ranking: views::mvp_ranking(game, &snapshot.players),
        total_votes: game.mvp_votes.values().sum(),
    })
}

pub async fn dashboard(state: &SharedState, now: OffsetDateTime) -> DashboardResponse {
    let snapshot = state.league().snapshot().await;
    DashboardResponse::build(views::dashboard(&snapshot, now), snapshot.loading)
}

pub async fn years(state: &SharedState, now: OffsetDateTime) -> YearsResponse {
    YearsResponse {
        active: state.league().year().await,
        years: views::selectable_years(state.config().first_year(), now),
    }
}

/// Re-point the league mirror at another year offered by the selector.
pub async fn switch_year(
    state: &SharedState,
    request: SwitchYearRequest,
    now: OffsetDateTime,
) -> Result<YearsResponse, ServiceError> {
    let offered = views::selectable_years(state.config().first_year(), now);
    if !offered.contains(&request.year) {
        return Err(ServiceError::InvalidInput(format!(
            "year {} is not offered",
            request.year
        )));
    }

    if state.league().year().await != request.year {
        state.league().switch_year(request.year).await?;
        info!(year = request.year, "active year switched");
    }

    Ok(YearsResponse {
        active: request.year,
        years: offered,
    })
}

#[cfg(test)]
mod tests {
    use std::{sync::Arc, time::Duration};

    use time::macros::datetime;
    use tokio::time::timeout;

    use super::*;
    use crate::{
        config::AppConfig,
        dao::document_store::memory::MemoryDocumentStore,
        dto::matches::PairInput,
        state::{AppState, league::Season},
    };

    const NOW: OffsetDateTime = datetime!(2024-06-15 12:00 UTC);

    async fn state() -> SharedState {
        AppState::new(
            Arc::new(MemoryDocumentStore::new()),
            AppConfig::default(),
            2024,
        )
        .await
    }

    async fn until<T, F, Fut>(mut condition: F) -> T
    where
        F: FnMut() -> Fut,
        Fut: std::future::Future<Output = Option<T>>,
    {
        timeout(Duration::from_secs(2), async {
            loop {
                if let Some(value) = condition().await {
                    return value;
                }
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .expect("condition not reached")
    }

    #[tokio::test]
    async fn unknown_year_is_rejected() {
        let state = state().await;
        let err = switch_year(&state, SwitchYearRequest { year: 2019 }, NOW)
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::InvalidInput(_)));

        let years = switch_year(&state, SwitchYearRequest { year: 2025 }, NOW)
            .await
            .unwrap();
        assert_eq!(years.active, 2025);
        assert_eq!(state.league().year().await, 2025);
    }

    #[tokio::test]
    async fn lineup_and_votes_flow_into_mvp_summary() {
        let state = state().await;
        let alice = create_player(
            &state,
            CreatePlayerRequest {
                name: "Alice".into(),
                rank: 1,
            },
        )
        .await
        .unwrap()
        .id;
        let created = create_match(
            &state,
            CreateMatchRequest {
                opponent: "Oak Hill".into(),
                location: "Court 3".into(),
                date: datetime!(2024-05-01 10:00 UTC),
                season: Season::Spring,
            },
        )
        .await
        .unwrap()
        .id;

        let mut singles = vec![None; 6];
        singles[0] = Some(alice.clone());
        set_lineup(
            &state,
            created.clone(),
            LineupRequest {
                singles,
                doubles: vec![PairInput::default(); 3],
            },
        )
        .await
        .unwrap();

        until(|| {
            let state = state.clone();
            let created = created.clone();
            async move {
                let summary = mvp_summary(&state, created).await.ok()?;
                (!summary.ballot.is_empty()).then_some(())
            }
        })
        .await;
        vote_mvp(&state, created.clone(), alice.clone()).await.unwrap();

        let summary = until(|| {
            let state = state.clone();
            let created = created.clone();
            async move {
                let summary = mvp_summary(&state, created).await.ok()?;
                (summary.total_votes == 1).then_some(summary)
            }
        })
        .await;
        assert_eq!(summary.ballot[0].name, "Alice");
        assert_eq!(summary.ranking[0].share, 100.0);

        let listing = list_matches(&state, NOW).await;
        assert!(listing.upcoming.is_empty());
        assert_eq!(listing.past[0].lineup.singles[0].as_ref().unwrap().name, "Alice");
    }

    #[tokio::test]
    async fn mvp_summary_of_unknown_match_is_not_found() {
        let state = state().await;
        let err = mvp_summary(&state, "missing".into()).await.unwrap_err();
        assert!(matches!(err, ServiceError::NotFound(_)));
    }
}
