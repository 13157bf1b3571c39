//! DTOs for the match schedule endpoints.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_with::skip_serializing_none;
use thiserror::Error;
use time::OffsetDateTime;
use utoipa::ToSchema;
use validator::Validate;

use crate::{
    dto::{player::PlayerSummary, validation::validate_not_blank},
    services::views::{self, AvailabilityCounts, LineupView, MvpStanding},
    state::league::{
        AvailabilityStatus, DOUBLES_PAIRS, DoublesPair, Lineup, Match, MatchPatch, MatchResult,
        NewMatch, Outcome, Player, PlayerId, SINGLES_SLOTS, Season,
    },
};

/// Payload used to schedule a match in the active year.
#[derive(Debug, Deserialize, ToSchema, Validate)]
pub struct CreateMatchRequest {
    #[validate(custom(function = "validate_not_blank"))]
    pub opponent: String,
    #[validate(custom(function = "validate_not_blank"))]
    pub location: String,
    /// RFC 3339 timestamp.
    #[serde(with = "time::serde::rfc3339")]
    pub date: OffsetDateTime,
    pub season: Season,
}

/// Partial match edit; omitted fields keep their stored value.
#[derive(Debug, Default, Deserialize, ToSchema, Validate)]
pub struct UpdateMatchRequest {
    #[serde(default)]
    #[validate(custom(function = "validate_not_blank"))]
    pub opponent: Option<String>,
    #[serde(default)]
    #[validate(custom(function = "validate_not_blank"))]
    pub location: Option<String>,
    #[serde(default, with = "time::serde::rfc3339::option")]
    pub date: Option<OffsetDateTime>,
    #[serde(default)]
    pub season: Option<Season>,
}

/// A player's answer for one match.
#[derive(Debug, Deserialize, ToSchema)]
pub struct AvailabilityRequest {
    pub status: AvailabilityStatus,
}

/// Two doubles slots; `null` leaves a slot empty.
#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema)]
pub struct PairInput {
    #[serde(default)]
    pub player1: Option<String>,
    #[serde(default)]
    pub player2: Option<String>,
}

/// Full lineup replacement: exactly six singles slots and three doubles pairs.
#[derive(Debug, Deserialize, ToSchema, Validate)]
pub struct LineupRequest {
    #[validate(length(equal = 6))]
    pub singles: Vec<Option<String>>,
    #[validate(length(equal = 3))]
    pub doubles: Vec<PairInput>,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum LineupShapeError {
    #[error("lineup needs 6 singles slots, got {0}")]
    Singles(usize),
    #[error("lineup needs 3 doubles pairs, got {0}")]
    Doubles(usize),
}

impl TryFrom<LineupRequest> for Lineup {
    type Error = LineupShapeError;

    fn try_from(request: LineupRequest) -> Result<Self, Self::Error> {
        let slot = |id: Option<String>| id.map(PlayerId);

        let singles: Vec<Option<PlayerId>> = request.singles.into_iter().map(slot).collect();
        let singles = <[Option<PlayerId>; SINGLES_SLOTS]>::try_from(singles)
            .map_err(|rejected| LineupShapeError::Singles(rejected.len()))?;

        let doubles: Vec<DoublesPair> = request
            .doubles
            .into_iter()
            .map(|pair| DoublesPair {
                player1: slot(pair.player1),
                player2: slot(pair.player2),
            })
            .collect();
        let doubles = <[DoublesPair; DOUBLES_PAIRS]>::try_from(doubles)
            .map_err(|rejected| LineupShapeError::Doubles(rejected.len()))?;

        Ok(Lineup { singles, doubles })
    }
}

/// Score entry; either side may be `null` until known.
#[derive(Debug, Clone, Copy, Default, Deserialize, ToSchema)]
pub struct ResultRequest {
    pub our_score: Option<u32>,
    pub opponent_score: Option<u32>,
}

impl From<ResultRequest> for MatchResult {
    fn from(request: ResultRequest) -> Self {
        MatchResult::new(request.our_score, request.opponent_score)
    }
}

impl From<CreateMatchRequest> for NewMatch {
    fn from(request: CreateMatchRequest) -> Self {
        Self {
            opponent: request.opponent,
            location: request.location,
            date: request.date,
            season: request.season,
        }
    }
}

impl From<UpdateMatchRequest> for MatchPatch {
    fn from(request: UpdateMatchRequest) -> Self {
        Self {
            opponent: request.opponent,
            location: request.location,
            date: request.date,
            season: request.season,
        }
    }
}

/// Score of a match with its derived outcome.
#[skip_serializing_none]
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct ResultSummary {
    pub our_score: Option<u32>,
    pub opponent_score: Option<u32>,
    /// Present once both scores are entered.
    pub outcome: Option<Outcome>,
}

impl From<MatchResult> for ResultSummary {
    fn from(result: MatchResult) -> Self {
        Self {
            our_score: result.our_score,
            opponent_score: result.opponent_score,
            outcome: result.outcome(),
        }
    }
}

/// Match as exposed to clients, with lineup names resolved against the roster.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct MatchSummary {
    pub id: String,
    pub opponent: String,
    pub location: String,
    #[serde(with = "time::serde::rfc3339")]
    pub date: OffsetDateTime,
    pub season: Season,
    #[schema(value_type = Object)]
    pub availability: IndexMap<String, AvailabilityStatus>,
    pub availability_counts: AvailabilityCounts,
    pub lineup: LineupView,
    pub result: ResultSummary,
    #[schema(value_type = Object)]
    pub mvp_votes: IndexMap<String, u64>,
}

impl MatchSummary {
    pub fn build(game: &Match, roster: &[Player]) -> Self {
        Self {
            id: game.id.to_string(),
            opponent: game.opponent.clone(),
            location: game.location.clone(),
            date: game.date,
            season: game.season,
            availability: game
                .availability
                .iter()
                .map(|(id, status)| (id.to_string(), *status))
                .collect(),
            availability_counts: views::roster_availability_counts(game, roster),
            lineup: views::lineup_view(&game.lineup, roster),
            result: game.result.into(),
            mvp_votes: game
                .mvp_votes
                .iter()
                .map(|(id, votes)| (id.to_string(), *votes))
                .collect(),
        }
    }
}

/// Schedule of the active year split around the current instant.
#[derive(Debug, Serialize, ToSchema)]
pub struct MatchesResponse {
    pub year: i32,
    pub loading: bool,
    /// Matches dated after now, soonest first.
    pub upcoming: Vec<MatchSummary>,
    /// Matches dated now or earlier, oldest first.
    pub past: Vec<MatchSummary>,
}

/// MVP ballot and standings of one match.
#[derive(Debug, Serialize, ToSchema)]
pub struct MvpResponse {
    pub match_id: String,
    /// Players eligible for a vote: everyone who filled a lineup slot.
    pub ballot: Vec<PlayerSummary>,
    pub ranking: Vec<MvpStanding>,
    pub total_votes: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(singles: usize, doubles: usize) -> LineupRequest {
        LineupRequest {
            singles: vec![None; singles],
            doubles: vec![PairInput::default(); doubles],
        }
    }

    #[test]
    fn lineup_shape_is_enforced() {
        assert!(request(6, 3).validate().is_ok());
        assert!(request(5, 3).validate().is_err());
        assert!(request(6, 4).validate().is_err());

        assert_eq!(
            Lineup::try_from(request(7, 3)),
            Err(LineupShapeError::Singles(7))
        );
        assert_eq!(
            Lineup::try_from(request(6, 2)),
            Err(LineupShapeError::Doubles(2))
        );
    }

    #[test]
    fn short_doubles_list_is_reported_on_its_field() {
        let body: LineupRequest = serde_json::from_str(
            r#"{"singles": [null, null, null, null, null, null],
                "doubles": [{"player1": "p1", "player2": null}]}"#,
        )
        .unwrap();

        let errors = body.validate().unwrap_err();
        let fields = errors.field_errors();
        assert!(fields.contains_key("doubles"));
        assert!(!fields.contains_key("singles"));
        assert_eq!(fields["doubles"][0].code, "length");
    }

    #[test]
    fn lineup_request_keeps_slot_positions() {
        let mut body = request(6, 3);
        body.singles[2] = Some("p3".into());
        body.doubles[1].player2 = Some("p7".into());

        let lineup = Lineup::try_from(body).unwrap();
        assert_eq!(lineup.singles[2], Some(PlayerId::from("p3")));
        assert_eq!(lineup.singles[0], None);
        assert_eq!(lineup.doubles[1].player2, Some(PlayerId::from("p7")));
    }

    #[test]
    fn negative_scores_are_rejected_when_decoding() {
        let parsed: Result<ResultRequest, _> =
            serde_json::from_str(r#"{"our_score": -1, "opponent_score": null}"#);
        assert!(parsed.is_err());

        let parsed: ResultRequest =
            serde_json::from_str(r#"{"our_score": 6, "opponent_score": null}"#).unwrap();
        assert_eq!(
            MatchResult::from(parsed),
            MatchResult::new(Some(6), None)
        );
    }

    #[test]
    fn unplayed_result_omits_outcome() {
        let summary = ResultSummary::from(MatchResult::default());
        let json = serde_json::to_value(&summary).unwrap();
        assert!(json.get("outcome").is_none());

        let summary = ResultSummary::from(MatchResult::new(Some(6), Some(4)));
        assert_eq!(summary.outcome, Some(Outcome::Win));
    }
}
