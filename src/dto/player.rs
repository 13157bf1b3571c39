//! DTOs for the roster endpoints.

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use validator::Validate;

use crate::{
    dto::validation::validate_not_blank,
    state::league::{NewPlayer, Player, PlayerPatch},
};

/// Payload used to add a player to the active year's roster.
#[derive(Debug, Deserialize, ToSchema, Validate)]
pub struct CreatePlayerRequest {
    #[validate(custom(function = "validate_not_blank"))]
    pub name: String,
    /// Lower ranks are listed first.
    pub rank: i64,
}

/// Partial roster edit; omitted fields keep their stored value.
#[derive(Debug, Default, Deserialize, ToSchema, Validate)]
pub struct UpdatePlayerRequest {
    #[serde(default)]
    #[validate(custom(function = "validate_not_blank"))]
    pub name: Option<String>,
    #[serde(default)]
    pub rank: Option<i64>,
}

/// Identifier assigned to a newly created roster entry or match.
#[derive(Debug, Serialize, ToSchema)]
pub struct CreatedResponse {
    pub id: String,
}

/// Roster entry as exposed to clients.
#[derive(Clone, Debug, Serialize, ToSchema)]
pub struct PlayerSummary {
    pub id: String,
    pub name: String,
    pub rank: i64,
}

/// Current roster of the active year.
#[derive(Debug, Serialize, ToSchema)]
pub struct PlayersResponse {
    pub year: i32,
    /// True until the first roster snapshot of the year has been received.
    pub loading: bool,
    pub players: Vec<PlayerSummary>,
}

impl From<CreatePlayerRequest> for NewPlayer {
    fn from(request: CreatePlayerRequest) -> Self {
        Self {
            name: request.name,
            rank: request.rank,
        }
    }
}

impl From<UpdatePlayerRequest> for PlayerPatch {
    fn from(request: UpdatePlayerRequest) -> Self {
        Self {
            name: request.name,
            rank: request.rank,
        }
    }
}

impl From<&Player> for PlayerSummary {
    fn from(player: &Player) -> Self {
        Self {
            id: player.id.to_string(),
            name: player.name.clone(),
            rank: player.rank,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blank_names_fail_validation() {
        let request = CreatePlayerRequest {
            name: " ".into(),
            rank: 1,
        };
        assert!(request.validate().is_err());

        let patch = UpdatePlayerRequest {
            name: Some(String::new()),
            rank: None,
        };
        assert!(patch.validate().is_err());
        assert!(UpdatePlayerRequest::default().validate().is_ok());
    }
}
