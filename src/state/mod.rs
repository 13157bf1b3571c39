pub mod league;
mod sse;
pub mod store;

use std::sync::Arc;

use tokio::task::JoinHandle;

use crate::{
    config::AppConfig, dao::document_store::DocumentStore, services::sse_events,
    state::store::LeagueStore,
};

pub use self::sse::SseHub;

pub type SharedState = Arc<AppState>;

const SSE_CAPACITY: usize = 32;

/// Central application state: the league mirror, its storage handle and the SSE hub.
pub struct AppState {
    league: LeagueStore,
    documents: Arc<dyn DocumentStore>,
    sse: SseHub,
    config: AppConfig,
    relay: JoinHandle<()>,
}

impl AppState {
    /// Open the league store on `year` and start relaying its changes to SSE clients.
    pub async fn new(
        documents: Arc<dyn DocumentStore>,
        config: AppConfig,
        year: i32,
    ) -> SharedState {
        let league = LeagueStore::open(documents.clone(), year).await;
        let changes = league.changes();
        Arc::new_cyclic(|state| Self {
            relay: sse_events::spawn_league_relay(state.clone(), changes),
            league,
            documents,
            sse: SseHub::new(SSE_CAPACITY),
            config,
        })
    }

    /// Stop relaying changes and stop mirroring the league.
    pub async fn shutdown(&self) {
        self.relay.abort();
        self.league.close().await;
    }

    /// Live, year-scoped league mirror.
    pub fn league(&self) -> &LeagueStore {
        &self.league
    }

    /// Storage backend shared with the league store.
    pub fn documents(&self) -> &Arc<dyn DocumentStore> {
        &self.documents
    }

    /// Broadcast hub used for the SSE stream.
    pub fn sse(&self) -> &SseHub {
        &self.sse
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }
}

impl Drop for AppState {
    fn drop(&mut self) {
        self.relay.abort();
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use tokio::time::timeout;

    use super::*;
    use crate::{dao::document_store::memory::MemoryDocumentStore, state::league::NewPlayer};

    async fn state() -> SharedState {
        AppState::new(
            Arc::new(MemoryDocumentStore::new()),
            AppConfig::default(),
            2024,
        )
        .await
    }

    async fn finished(relay: tokio::task::AbortHandle) {
        timeout(Duration::from_secs(1), async {
            while !relay.is_finished() {
                tokio::task::yield_now().await;
            }
        })
        .await
        .expect("relay still running");
    }

    #[tokio::test]
    async fn dropping_the_state_stops_the_relay() {
        let state = state().await;
        let relay = state.relay.abort_handle();
        drop(state);
        finished(relay).await;
    }

    #[tokio::test]
    async fn shutdown_stops_relay_and_mirroring() {
        let state = state().await;
        let relay = state.relay.abort_handle();
        state.shutdown().await;
        finished(relay).await;

        let before = *state.league().revision().borrow();
        state
            .league()
            .add_player(NewPlayer {
                name: "Alice".into(),
                rank: 1,
            })
            .await
            .unwrap();
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(state.league().players().await.is_empty());
        assert_eq!(*state.league().revision().borrow(), before);
    }
}
