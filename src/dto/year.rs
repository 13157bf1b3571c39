use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use validator::Validate;

/// Year partitions offered to clients and the one currently mirrored.
#[derive(Debug, Serialize, ToSchema)]
pub struct YearsResponse {
    pub active: i32,
    /// Newest first.
    pub years: Vec<i32>,
}

/// Request to mirror another year partition.
#[derive(Debug, Deserialize, ToSchema, Validate)]
pub struct SwitchYearRequest {
    #[validate(range(min = 1970, max = 9999))]
    pub year: i32,
}
