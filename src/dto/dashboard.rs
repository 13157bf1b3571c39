//! Dashboard projection.

use serde::Serialize;
use serde_with::skip_serializing_none;
use time::OffsetDateTime;
use utoipa::ToSchema;

use crate::{
    dto::matches::ResultSummary,
    services::views::{Dashboard, LineupView, Record, UpcomingEntry},
    state::league::{Match, Season},
};

/// Season overview: record, counts and the two short match lists.
#[derive(Debug, Serialize, ToSchema)]
pub struct DashboardResponse {
    pub year: i32,
    pub loading: bool,
    /// Season derived from the current calendar month.
    pub season: Season,
    pub record: Record,
    pub upcoming_count: usize,
    pub played_count: u32,
    pub upcoming: Vec<UpcomingMatch>,
    pub recent_results: Vec<RecentResult>,
}

/// Next scheduled match, with its lineup once one is set.
#[skip_serializing_none]
#[derive(Debug, Serialize, ToSchema)]
pub struct UpcomingMatch {
    pub id: String,
    pub opponent: String,
    pub location: String,
    #[serde(with = "time::serde::rfc3339")]
    pub date: OffsetDateTime,
    pub lineup: Option<LineupView>,
}

/// A played match, newest first.
#[derive(Debug, Serialize, ToSchema)]
pub struct RecentResult {
    pub id: String,
    pub opponent: String,
    #[serde(with = "time::serde::rfc3339")]
    pub date: OffsetDateTime,
    pub result: ResultSummary,
}

impl From<UpcomingEntry<'_>> for UpcomingMatch {
    fn from(entry: UpcomingEntry<'_>) -> Self {
        Self {
            id: entry.game.id.to_string(),
            opponent: entry.game.opponent.clone(),
            location: entry.game.location.clone(),
            date: entry.game.date,
            lineup: entry.lineup,
        }
    }
}

impl From<&Match> for RecentResult {
    fn from(game: &Match) -> Self {
        Self {
            id: game.id.to_string(),
            opponent: game.opponent.clone(),
            date: game.date,
            result: game.result.into(),
        }
    }
}

impl DashboardResponse {
    pub fn build(dashboard: Dashboard<'_>, loading: bool) -> Self {
        Self {
            year: dashboard.year,
            loading,
            season: dashboard.season,
            record: dashboard.record,
            upcoming_count: dashboard.upcoming_count,
            played_count: dashboard.record.played,
            upcoming: dashboard.upcoming.into_iter().map(Into::into).collect(),
            recent_results: dashboard
                .recent_results
                .into_iter()
                .map(RecentResult::from)
                .collect(),
        }
    }
}
