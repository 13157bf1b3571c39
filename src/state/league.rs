//! Domain model of the league: roster entries, matches and their nested records.

use std::fmt;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use tracing::warn;
use utoipa::ToSchema;

use crate::dao::models::{
    LineupDocument, MatchDocument, PairDocument, PlayerDocument, ResultDocument,
};

/// Number of singles slots in every lineup.
pub const SINGLES_SLOTS: usize = 6;
/// Number of doubles pairs in every lineup.
pub const DOUBLES_PAIRS: usize = 3;

/// Store-assigned identifier of a roster entry.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, ToSchema)]
#[serde(transparent)]
pub struct PlayerId(pub String);

/// Store-assigned identifier of a match.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, ToSchema)]
#[serde(transparent)]
pub struct MatchId(pub String);

impl fmt::Display for PlayerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl fmt::Display for MatchId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for PlayerId {
    fn from(value: &str) -> Self {
        Self(value.to_owned())
    }
}

impl From<&str> for MatchId {
    fn from(value: &str) -> Self {
        Self(value.to_owned())
    }
}

/// Roster entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Player {
    pub id: PlayerId,
    pub name: String,
    /// Lower value sorts first in the roster and in lineup ordering.
    pub rank: i64,
}

/// Half of the competition year a match belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
pub enum Season {
    Spring,
    Fall,
}

impl Season {
    pub fn as_str(self) -> &'static str {
        match self {
            Season::Spring => "Spring",
            Season::Fall => "Fall",
        }
    }

    fn parse(value: &str) -> Option<Self> {
        match value {
            "Spring" => Some(Season::Spring),
            "Fall" => Some(Season::Fall),
            _ => None,
        }
    }
}

/// A player's answer to "can you play this match?".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
pub enum AvailabilityStatus {
    Yes,
    No,
    #[serde(rename = "If Needed")]
    IfNeeded,
}

impl AvailabilityStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            AvailabilityStatus::Yes => "Yes",
            AvailabilityStatus::No => "No",
            AvailabilityStatus::IfNeeded => "If Needed",
        }
    }

    fn parse(value: &str) -> Option<Self> {
        match value {
            "Yes" => Some(AvailabilityStatus::Yes),
            "No" => Some(AvailabilityStatus::No),
            "If Needed" => Some(AvailabilityStatus::IfNeeded),
            _ => None,
        }
    }
}

/// Two independent slots of a doubles line.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DoublesPair {
    pub player1: Option<PlayerId>,
    pub player2: Option<PlayerId>,
}

/// Fixed-shape lineup: six singles slots and three doubles pairs.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Lineup {
    pub singles: [Option<PlayerId>; SINGLES_SLOTS],
    pub doubles: [DoublesPair; DOUBLES_PAIRS],
}

impl Lineup {
    /// Every filled slot, singles first, in slot order (duplicates included).
    pub fn assigned(&self) -> impl Iterator<Item = &PlayerId> {
        self.singles.iter().flatten().chain(
            self.doubles
                .iter()
                .flat_map(|pair| pair.player1.iter().chain(pair.player2.iter())),
        )
    }

    pub fn is_empty(&self) -> bool {
        self.assigned().next().is_none()
    }
}

/// Score of a match; each side stays unset until entered.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MatchResult {
    pub our_score: Option<u32>,
    pub opponent_score: Option<u32>,
}

/// Outcome of a match whose score is complete.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum Outcome {
    Win,
    Loss,
}

impl MatchResult {
    pub fn new(our_score: Option<u32>, opponent_score: Option<u32>) -> Self {
        Self {
            our_score,
            opponent_score,
        }
    }

    /// Both scores, when both are set.
    pub fn scores(&self) -> Option<(u32, u32)> {
        self.our_score.zip(self.opponent_score)
    }

    /// Win iff our score is strictly greater; `None` unless both scores are set.
    pub fn outcome(&self) -> Option<Outcome> {
        self.scores().map(|(ours, theirs)| {
            if ours > theirs {
                Outcome::Win
            } else {
                Outcome::Loss
            }
        })
    }
}

/// A scheduled match with its availability, lineup, score and MVP ballot.
#[derive(Debug, Clone, PartialEq)]
pub struct Match {
    pub id: MatchId,
    pub opponent: String,
    pub location: String,
    pub date: OffsetDateTime,
    pub season: Season,
    /// Absent entries mean the player has not responded yet.
    pub availability: IndexMap<PlayerId, AvailabilityStatus>,
    pub lineup: Lineup,
    pub result: MatchResult,
    pub mvp_votes: IndexMap<PlayerId, u64>,
}

/// Input for a new roster entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewPlayer {
    pub name: String,
    pub rank: i64,
}

/// Partial roster edit; `None` fields are left as stored.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PlayerPatch {
    pub name: Option<String>,
    pub rank: Option<i64>,
}

/// Input for a new match.
#[derive(Debug, Clone, PartialEq)]
pub struct NewMatch {
    pub opponent: String,
    pub location: String,
    pub date: OffsetDateTime,
    pub season: Season,
}

/// Partial match edit; `None` fields are left as stored.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MatchPatch {
    pub opponent: Option<String>,
    pub location: Option<String>,
    pub date: Option<OffsetDateTime>,
    pub season: Option<Season>,
}

pub fn to_epoch_millis(date: OffsetDateTime) -> i64 {
    (date.unix_timestamp_nanos() / 1_000_000) as i64
}

pub fn from_epoch_millis(millis: i64) -> Option<OffsetDateTime> {
    OffsetDateTime::from_unix_timestamp_nanos(i128::from(millis) * 1_000_000).ok()
}

impl Player {
    pub fn from_document(id: String, document: PlayerDocument) -> Self {
        Self {
            id: PlayerId(id),
            name: document.name,
            rank: document.rank,
        }
    }
}

impl From<NewPlayer> for PlayerDocument {
    fn from(value: NewPlayer) -> Self {
        Self {
            name: value.name,
            rank: value.rank,
        }
    }
}

impl Match {
    /// Build the domain view of a stored match, or `None` when its core fields are unusable.
    ///
    /// Unknown availability values and negative counters are dropped; the lineup is
    /// padded or truncated to its fixed shape.
    pub fn from_document(id: String, document: MatchDocument) -> Option<Self> {
        let Some(date) = from_epoch_millis(document.date) else {
            warn!(match_id = %id, date = document.date, "match date out of range");
            return None;
        };
        let Some(season) = Season::parse(&document.season) else {
            warn!(match_id = %id, season = %document.season, "unknown match season");
            return None;
        };

        let availability = document
            .availability
            .into_iter()
            .filter_map(|(player, status)| {
                AvailabilityStatus::parse(&status).map(|status| (PlayerId(player), status))
            })
            .collect();

        let mvp_votes = document
            .mvp_votes
            .into_iter()
            .map(|(player, votes)| (PlayerId(player), u64::try_from(votes).unwrap_or(0)))
            .collect();

        Some(Self {
            id: MatchId(id),
            opponent: document.opponent,
            location: document.location,
            date,
            season,
            availability,
            lineup: document.lineup.into(),
            result: document.result.into(),
            mvp_votes,
        })
    }
}

impl From<NewMatch> for MatchDocument {
    /// A fresh match starts with no responses, an empty lineup, no score and no votes.
    fn from(value: NewMatch) -> Self {
        Self {
            opponent: value.opponent,
            location: value.location,
            date: to_epoch_millis(value.date),
            season: value.season.as_str().to_owned(),
            availability: IndexMap::new(),
            lineup: Lineup::default().into(),
            result: MatchResult::default().into(),
            mvp_votes: IndexMap::new(),
        }
    }
}

impl From<LineupDocument> for Lineup {
    fn from(value: LineupDocument) -> Self {
        let mut lineup = Lineup::default();
        for (slot, player) in lineup.singles.iter_mut().zip(value.singles) {
            *slot = player.map(PlayerId);
        }
        for (pair, stored) in lineup.doubles.iter_mut().zip(value.doubles) {
            pair.player1 = stored.player1.map(PlayerId);
            pair.player2 = stored.player2.map(PlayerId);
        }
        lineup
    }
}

impl From<Lineup> for LineupDocument {
    fn from(value: Lineup) -> Self {
        Self {
            singles: value
                .singles
                .into_iter()
                .map(|slot| slot.map(|player| player.0))
                .collect(),
            doubles: value
                .doubles
                .into_iter()
                .map(|pair| PairDocument {
                    player1: pair.player1.map(|player| player.0),
                    player2: pair.player2.map(|player| player.0),
                })
                .collect(),
        }
    }
}

impl From<ResultDocument> for MatchResult {
    fn from(value: ResultDocument) -> Self {
        Self {
            our_score: value.our_score.and_then(|score| u32::try_from(score).ok()),
            opponent_score: value.opponent_score.and_then(|score| u32::try_from(score).ok()),
        }
    }
}

impl From<MatchResult> for ResultDocument {
    fn from(value: MatchResult) -> Self {
        Self {
            our_score: value.our_score.map(i64::from),
            opponent_score: value.opponent_score.map(i64::from),
        }
    }
}

#[cfg(test)]
mod tests {
    use time::macros::datetime;

    use super::*;

    #[test]
    fn new_match_document_has_default_skeleton() {
        let document: MatchDocument = NewMatch {
            opponent: "Oak Hill".into(),
            location: "Court 3".into(),
            date: datetime!(2024-05-01 10:00 UTC),
            season: Season::Spring,
        }
        .into();

        assert!(document.availability.is_empty());
        assert_eq!(document.lineup.singles, vec![None; SINGLES_SLOTS]);
        assert_eq!(document.lineup.doubles, vec![PairDocument::default(); DOUBLES_PAIRS]);
        assert_eq!(document.result, ResultDocument::default());
        assert!(document.mvp_votes.is_empty());
        assert_eq!(document.season, "Spring");
    }

    #[test]
    fn short_stored_lineup_is_padded_to_fixed_shape() {
        let stored = LineupDocument {
            singles: vec![Some("a".into()), None],
            doubles: vec![PairDocument {
                player1: Some("b".into()),
                player2: None,
            }],
        };

        let lineup = Lineup::from(stored);
        assert_eq!(lineup.singles[0], Some(PlayerId::from("a")));
        assert!(lineup.singles[1..].iter().all(Option::is_none));
        assert_eq!(lineup.doubles[0].player1, Some(PlayerId::from("b")));
        assert_eq!(lineup.doubles[2], DoublesPair::default());
    }

    #[test]
    fn result_outcome_requires_both_scores() {
        assert_eq!(MatchResult::new(Some(6), Some(4)).outcome(), Some(Outcome::Win));
        assert_eq!(MatchResult::new(Some(4), Some(6)).outcome(), Some(Outcome::Loss));
        assert_eq!(MatchResult::new(Some(5), Some(5)).outcome(), Some(Outcome::Loss));
        assert_eq!(MatchResult::new(Some(6), None).outcome(), None);
        assert_eq!(MatchResult::default().outcome(), None);
    }

    #[test]
    fn epoch_millis_round_trip_keeps_millisecond_precision() {
        let date = datetime!(2024-09-14 18:30:15.250 UTC);
        assert_eq!(from_epoch_millis(to_epoch_millis(date)), Some(date));
    }

    #[test]
    fn assigned_slots_list_singles_then_doubles() {
        let mut lineup = Lineup::default();
        assert!(lineup.is_empty());
        lineup.singles[3] = Some("s".into());
        lineup.doubles[1].player2 = Some("d".into());

        let assigned: Vec<_> = lineup.assigned().map(|id| id.0.as_str()).collect();
        assert_eq!(assigned, vec!["s", "d"]);
    }
}
