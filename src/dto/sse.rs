use serde::Serialize;
use utoipa::ToSchema;

use crate::dto::player::PlayerSummary;

#[derive(Clone, Debug)]
/// Dispatched payload carried across SSE channels.
pub struct ServerEvent {
    pub event: Option<String>,
    pub data: String,
}

impl ServerEvent {
    /// Convenience wrapper that serialises `payload` into the SSE data field.
    pub fn json<E, T>(event: E, payload: &T) -> serde_json::Result<Self>
    where
        E: Into<Option<String>>,
        T: Serialize,
    {
        Ok(Self {
            event: event.into(),
            data: serde_json::to_string(payload)?,
        })
    }
}

#[derive(Debug, Serialize, ToSchema)]
/// Initial metadata sent to an SSE client when it connects.
pub struct Handshake {
    /// Human-readable message confirming the subscription.
    pub message: String,
    /// Year currently mirrored.
    pub year: i32,
    /// Whether the first roster snapshot is still pending.
    pub loading: bool,
}

#[derive(Debug, Serialize, ToSchema)]
/// Broadcast after the active year was switched; clients should refetch everything.
pub struct YearChangedEvent {
    pub year: i32,
}

#[derive(Debug, Serialize, ToSchema)]
/// Broadcast with every roster snapshot.
pub struct RosterChangedEvent {
    pub year: i32,
    pub players: Vec<PlayerSummary>,
}

#[derive(Debug, Serialize, ToSchema)]
/// Broadcast with every match snapshot; clients refetch `/matches` for details.
pub struct ScheduleChangedEvent {
    pub year: i32,
    pub match_count: usize,
}

#[derive(Debug, Serialize, ToSchema)]
/// Broadcast when loading ends without data.
pub struct LoadingEvent {
    pub year: i32,
    pub loading: bool,
}
