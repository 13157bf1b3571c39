use std::sync::Weak;

use serde::Serialize;
use tokio::{
    sync::broadcast::{self, error::RecvError},
    task::JoinHandle,
};
use tracing::{debug, warn};

use crate::{
    dto::{
        player::PlayerSummary,
        sse::{
            LoadingEvent, RosterChangedEvent, ScheduleChangedEvent, ServerEvent,
            YearChangedEvent,
        },
    },
    state::{AppState, store::LeagueChange},
};

const EVENT_PLAYERS: &str = "league.players";
const EVENT_MATCHES: &str = "league.matches";
const EVENT_YEAR: &str = "league.year";
const EVENT_LOADING: &str = "league.loading";

/// Forward every league change onto the SSE hub while the application state is alive.
pub fn spawn_league_relay(
    state: Weak<AppState>,
    mut changes: broadcast::Receiver<LeagueChange>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        loop {
            match changes.recv().await {
                Ok(change) => {
                    let Some(state) = state.upgrade() else {
                        break;
                    };
                    broadcast_change(&state, change).await;
                }
                Err(RecvError::Lagged(skipped)) => {
                    warn!(skipped, "SSE relay lagged behind league changes");
                }
                Err(RecvError::Closed) => break,
            }
        }
        debug!("league relay stopped");
    })
}

async fn broadcast_change(state: &AppState, change: LeagueChange) {
    match change {
        LeagueChange::YearChanged { year } => {
            send_event(state, EVENT_YEAR, &YearChangedEvent { year });
        }
        LeagueChange::Players { year } => {
            let snapshot = state.league().snapshot().await;
            if snapshot.year != year {
                debug!(year, active = snapshot.year, "dropping roster change of another year");
                return;
            }
            let payload = RosterChangedEvent {
                year,
                players: snapshot.players.iter().map(PlayerSummary::from).collect(),
            };
            send_event(state, EVENT_PLAYERS, &payload);
        }
        LeagueChange::Matches { year } => {
            let snapshot = state.league().snapshot().await;
            if snapshot.year != year {
                debug!(year, active = snapshot.year, "dropping schedule change of another year");
                return;
            }
            let match_count = snapshot.matches.len();
            send_event(state, EVENT_MATCHES, &ScheduleChangedEvent { year, match_count });
        }
        LeagueChange::Loading { year, loading } => {
            send_event(state, EVENT_LOADING, &LoadingEvent { year, loading });
        }
    }
}

fn send_event<T: Serialize>(state: &AppState, event: &str, payload: &T) {
    match ServerEvent::json(Some(event.to_string()), payload) {
        Ok(message) => state.sse().broadcast(message),
        Err(err) => warn!(event, error = %err, "failed to serialize SSE payload"),
    }
}

#[cfg(test)]
mod tests {
    use std::{sync::Arc, time::Duration};

    use tokio::time::timeout;

    use super::*;
    use crate::{
        config::AppConfig, dao::document_store::memory::MemoryDocumentStore, state::AppState,
        state::league::NewPlayer,
    };

    #[tokio::test]
    async fn roster_changes_reach_sse_subscribers() {
        let state = AppState::new(
            Arc::new(MemoryDocumentStore::new()),
            AppConfig::default(),
            2024,
        )
        .await;
        let mut events = state.sse().subscribe();

        state
            .league()
            .add_player(NewPlayer {
                name: "Alice".into(),
                rank: 1,
            })
            .await
            .unwrap();

        let wait = async {
            loop {
                let event = events.recv().await.unwrap();
                if event.event.as_deref() == Some(EVENT_PLAYERS) && event.data.contains("Alice") {
                    return event;
                }
            }
        };
        let event = timeout(Duration::from_secs(2), wait).await.unwrap();
        assert!(event.data.contains("\"year\":2024"));
    }

    #[tokio::test]
    async fn changes_of_a_previous_year_are_dropped() {
        let state = AppState::new(
            Arc::new(MemoryDocumentStore::new()),
            AppConfig::default(),
            2024,
        )
        .await;
        state.league().switch_year(2025).await.unwrap();
        let mut events = state.sse().subscribe();

        broadcast_change(&state, LeagueChange::Players { year: 2024 }).await;
        broadcast_change(&state, LeagueChange::Matches { year: 2024 }).await;
        broadcast_change(&state, LeagueChange::Matches { year: 2025 }).await;

        let mut delivered = Vec::new();
        while let Ok(event) = events.try_recv() {
            delivered.push(event);
        }
        assert!(
            delivered
                .iter()
                .all(|event| !event.data.contains("\"year\":2024"))
        );
        assert!(
            delivered
                .iter()
                .any(|event| event.event.as_deref() == Some(EVENT_MATCHES))
        );
    }
}
