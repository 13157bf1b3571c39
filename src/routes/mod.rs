use axum::Router;

use crate::state::SharedState;

pub mod dashboard;
pub mod docs;
pub mod health;
pub mod matches;
pub mod players;
pub mod sse;
pub mod years;

/// Compose all route trees, wiring in shared state and documentation routes.
pub fn router(state: SharedState) -> Router<()> {
    let api_router = health::router()
        .merge(sse::router())
        .merge(years::router())
        .merge(players::router())
        .merge(matches::router())
        .merge(dashboard::router())
        .merge(docs::router());

    api_router.with_state(state)
}
