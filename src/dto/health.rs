use serde::Serialize;
use utoipa::ToSchema;

/// Simple health response returned by the `/healthcheck` route.
#[derive(Debug, Serialize, ToSchema)]
pub struct HealthResponse {
    /// Health status ("ok" or "degraded").
    pub status: String,
    /// Year currently mirrored by the league store.
    pub year: i32,
}

impl HealthResponse {
    /// Storage answered the health probe.
    pub fn ok(year: i32) -> Self {
        Self {
            status: "ok".to_string(),
            year,
        }
    }

    /// Storage could not be reached.
    pub fn degraded(year: i32) -> Self {
        Self {
            status: "degraded".to_string(),
            year,
        }
    }
}
