//! Read-only projections of the mirrored league state.
//!
//! Everything here is recomputed from a [`LeagueSnapshot`] and an explicit
//! `now`; nothing is cached.

use indexmap::IndexSet;
use serde::Serialize;
use time::{Month, OffsetDateTime};
use utoipa::ToSchema;

use crate::state::{
    league::{AvailabilityStatus, Lineup, Match, Outcome, Player, PlayerId, Season},
    store::LeagueSnapshot,
};

/// Label shown for lineup slots that reference a player missing from the roster.
pub const UNKNOWN_PLAYER: &str = "Unknown";
/// Label shown for MVP entries whose player is missing from the roster.
pub const UNKNOWN_MVP_CANDIDATE: &str = "Unknown Player";
/// Number of entries shown in each dashboard list.
pub const DASHBOARD_LIST_LEN: usize = 5;

/// A match is upcoming strictly after `now`; `date == now` counts as past.
pub fn is_upcoming(game: &Match, now: OffsetDateTime) -> bool {
    game.date > now
}

/// Both scores have been entered.
pub fn is_played(game: &Match) -> bool {
    game.result.scores().is_some()
}

/// Upcoming and past matches, each keeping the stored (date ascending) order.
#[derive(Debug, Default)]
pub struct MatchPartition<'a> {
    pub upcoming: Vec<&'a Match>,
    pub past: Vec<&'a Match>,
}

pub fn partition_matches(matches: &[Match], now: OffsetDateTime) -> MatchPartition<'_> {
    let (upcoming, past): (Vec<&Match>, Vec<&Match>) =
        matches.iter().partition(|game| is_upcoming(game, now));
    MatchPartition { upcoming, past }
}

/// Past matches with a complete score, newest first.
pub fn played_matches(matches: &[Match], now: OffsetDateTime) -> Vec<&Match> {
    let mut played: Vec<&Match> = matches
        .iter()
        .filter(|game| !is_upcoming(game, now) && is_played(game))
        .collect();
    played.sort_by(|a, b| b.date.cmp(&a.date));
    played
}

pub fn match_outcome(game: &Match) -> Option<Outcome> {
    game.result.outcome()
}

/// Season win/loss summary.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, ToSchema)]
pub struct Record {
    pub wins: u32,
    pub losses: u32,
    pub played: u32,
    /// Rounded percentage of wins; 0 when nothing was played.
    pub win_rate: u32,
}

pub fn record(matches: &[Match], now: OffsetDateTime) -> Record {
    let played = played_matches(matches, now);
    let wins = played
        .iter()
        .filter(|game| match_outcome(game) == Some(Outcome::Win))
        .count() as u32;
    let total = played.len() as u32;

    Record {
        wins,
        losses: total - wins,
        played: total,
        win_rate: percentage(u64::from(wins), u64::from(total)),
    }
}

fn percentage(part: u64, total: u64) -> u32 {
    if total == 0 {
        return 0;
    }
    (part as f64 * 100.0 / total as f64).round() as u32
}

/// February through July is the spring season, the rest of the year is fall.
pub fn season_for_month(month: Month) -> Season {
    match u8::from(month) {
        2..=7 => Season::Spring,
        _ => Season::Fall,
    }
}

pub fn current_season(now: OffsetDateTime) -> Season {
    season_for_month(now.month())
}

/// Years offered by the year selector, newest first.
pub fn selectable_years(first_year: i32, now: OffsetDateTime) -> Vec<i32> {
    (first_year..=now.year() + 1).rev().collect()
}

/// One row of the MVP standings.
#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
pub struct MvpStanding {
    #[schema(value_type = String)]
    pub player_id: PlayerId,
    pub name: String,
    pub votes: u64,
    /// Share of all votes cast in this match, in percent.
    pub share: f64,
}

/// Vote tallies ordered by count descending; ties keep their stored order.
pub fn mvp_ranking(game: &Match, roster: &[Player]) -> Vec<MvpStanding> {
    let total: u64 = game.mvp_votes.values().sum();
    let mut standings: Vec<MvpStanding> = game
        .mvp_votes
        .iter()
        .map(|(player_id, &votes)| MvpStanding {
            player_id: player_id.clone(),
            name: find_player(roster, player_id)
                .map(|player| player.name.clone())
                .unwrap_or_else(|| UNKNOWN_MVP_CANDIDATE.to_owned()),
            votes,
            share: if total == 0 {
                0.0
            } else {
                votes as f64 * 100.0 / total as f64
            },
        })
        .collect();
    // `sort_by` is stable.
    standings.sort_by(|a, b| b.votes.cmp(&a.votes));
    standings
}

/// Distinct players in filled lineup slots, in slot order.
pub fn lineup_participants(lineup: &Lineup) -> IndexSet<PlayerId> {
    lineup.assigned().cloned().collect()
}

/// Roster players eligible for the MVP vote: those who took part in the lineup.
pub fn mvp_ballot<'a>(game: &Match, roster: &'a [Player]) -> Vec<&'a Player> {
    let participants = lineup_participants(&game.lineup);
    roster
        .iter()
        .filter(|player| participants.contains(&player.id))
        .collect()
}

/// Availability tallies for one match.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, ToSchema)]
pub struct AvailabilityCounts {
    pub available: usize,
    pub if_needed: usize,
    pub unavailable: usize,
    /// Roster players without an entry; only known when a roster is supplied.
    pub not_responded: usize,
}

pub fn availability_counts(game: &Match) -> AvailabilityCounts {
    let mut counts = AvailabilityCounts::default();
    for status in game.availability.values() {
        match status {
            AvailabilityStatus::Yes => counts.available += 1,
            AvailabilityStatus::IfNeeded => counts.if_needed += 1,
            AvailabilityStatus::No => counts.unavailable += 1,
        }
    }
    counts
}

/// Same as [`availability_counts`], also counting roster players who have not answered.
pub fn roster_availability_counts(game: &Match, roster: &[Player]) -> AvailabilityCounts {
    AvailabilityCounts {
        not_responded: roster
            .iter()
            .filter(|player| !game.availability.contains_key(&player.id))
            .count(),
        ..availability_counts(game)
    }
}

/// Roster players who said Yes or If Needed; the pool offered for lineup slots.
pub fn selectable_players<'a>(game: &Match, roster: &'a [Player]) -> Vec<&'a Player> {
    roster
        .iter()
        .filter(|player| {
            matches!(
                game.availability.get(&player.id),
                Some(AvailabilityStatus::Yes | AvailabilityStatus::IfNeeded)
            )
        })
        .collect()
}

fn find_player<'a>(roster: &'a [Player], id: &PlayerId) -> Option<&'a Player> {
    roster.iter().find(|player| &player.id == id)
}

/// Display name of `id`, or [`UNKNOWN_PLAYER`] for a dangling reference.
pub fn resolve_player_name<'a>(roster: &'a [Player], id: &PlayerId) -> &'a str {
    find_player(roster, id)
        .map(|player| player.name.as_str())
        .unwrap_or(UNKNOWN_PLAYER)
}

/// A lineup slot resolved for display.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
pub struct SlotView {
    #[schema(value_type = String)]
    pub player_id: PlayerId,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
pub struct PairView {
    pub player1: Option<SlotView>,
    pub player2: Option<SlotView>,
}

/// Lineup with every filled slot resolved to a name; empty slots stay `None`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
pub struct LineupView {
    pub singles: Vec<Option<SlotView>>,
    pub doubles: Vec<PairView>,
}

pub fn lineup_view(lineup: &Lineup, roster: &[Player]) -> LineupView {
    let slot = |id: &Option<PlayerId>| {
        id.as_ref().map(|id| SlotView {
            player_id: id.clone(),
            name: resolve_player_name(roster, id).to_owned(),
        })
    };

    LineupView {
        singles: lineup.singles.iter().map(slot).collect(),
        doubles: lineup
            .doubles
            .iter()
            .map(|pair| PairView {
                player1: slot(&pair.player1),
                player2: slot(&pair.player2),
            })
            .collect(),
    }
}

pub fn has_lineup(game: &Match) -> bool {
    !game.lineup.is_empty()
}

/// Upcoming match as shown on the dashboard.
#[derive(Debug, Clone)]
pub struct UpcomingEntry<'a> {
    pub game: &'a Match,
    /// Resolved lineup, present once at least one slot is filled.
    pub lineup: Option<LineupView>,
}

/// Everything the dashboard page displays.
#[derive(Debug, Clone)]
pub struct Dashboard<'a> {
    pub year: i32,
    pub season: Season,
    pub record: Record,
    pub upcoming_count: usize,
    pub upcoming: Vec<UpcomingEntry<'a>>,
    pub recent_results: Vec<&'a Match>,
}

pub fn dashboard(snapshot: &LeagueSnapshot, now: OffsetDateTime) -> Dashboard<'_> {
    let partition = partition_matches(&snapshot.matches, now);
    let played = played_matches(&snapshot.matches, now);

    Dashboard {
        year: snapshot.year,
        season: current_season(now),
        record: record(&snapshot.matches, now),
        upcoming_count: partition.upcoming.len(),
        upcoming: partition
            .upcoming
            .iter()
            .take(DASHBOARD_LIST_LEN)
            .map(|&game| UpcomingEntry {
                game,
                lineup: has_lineup(game).then(|| lineup_view(&game.lineup, &snapshot.players)),
            })
            .collect(),
        recent_results: played.into_iter().take(DASHBOARD_LIST_LEN).collect(),
    }
}

#[cfg(test)]
mod tests {
    use indexmap::IndexMap;
    use time::{Duration, macros::datetime};

    use super::*;
    use crate::state::league::{MatchId, MatchResult};

    const NOW: OffsetDateTime = datetime!(2024-06-15 12:00 UTC);

    fn game(id: &str, date: OffsetDateTime, result: MatchResult) -> Match {
        Match {
            id: MatchId::from(id),
            opponent: format!("Opponent {id}"),
            location: "Court 1".into(),
            date,
            season: Season::Spring,
            availability: IndexMap::new(),
            lineup: Lineup::default(),
            result,
            mvp_votes: IndexMap::new(),
        }
    }

    fn player(id: &str, name: &str, rank: i64) -> Player {
        Player {
            id: PlayerId::from(id),
            name: name.into(),
            rank,
        }
    }

    fn scored(ours: u32, theirs: u32) -> MatchResult {
        MatchResult::new(Some(ours), Some(theirs))
    }

    #[test]
    fn match_at_now_is_past() {
        let at_now = game("m1", NOW, MatchResult::default());
        let later = game("m2", NOW + Duration::milliseconds(1), MatchResult::default());

        assert!(!is_upcoming(&at_now, NOW));
        assert!(is_upcoming(&later, NOW));

        let matches = vec![at_now, later];
        let partition = partition_matches(&matches, NOW);
        assert_eq!(partition.upcoming.len() + partition.past.len(), matches.len());
        assert_eq!(partition.past[0].id, MatchId::from("m1"));
        assert_eq!(partition.upcoming[0].id, MatchId::from("m2"));
    }

    #[test]
    fn outcomes_follow_scores() {
        assert_eq!(
            match_outcome(&game("w", NOW, scored(6, 4))),
            Some(Outcome::Win)
        );
        assert_eq!(
            match_outcome(&game("l", NOW, scored(4, 6))),
            Some(Outcome::Loss)
        );
        assert_eq!(
            match_outcome(&game("t", NOW, scored(4, 4))),
            Some(Outcome::Loss)
        );
        assert_eq!(match_outcome(&game("n", NOW, MatchResult::default())), None);
    }

    #[test]
    fn unplayed_matches_are_excluded_from_the_record() {
        let day = Duration::days(1);
        let matches = vec![
            game("a", NOW - day * 3, scored(6, 4)),
            game("b", NOW - day * 2, MatchResult::default()),
            game("c", NOW - day, scored(2, 7)),
            game("d", NOW - day, MatchResult::new(Some(5), None)),
            game("e", NOW + day, scored(9, 0)),
        ];

        let played: Vec<_> = played_matches(&matches, NOW)
            .iter()
            .map(|game| game.id.0.as_str())
            .collect();
        assert_eq!(played, vec!["c", "a"]);

        let summary = record(&matches, NOW);
        assert_eq!(
            summary,
            Record {
                wins: 1,
                losses: 1,
                played: 2,
                win_rate: 50,
            }
        );
    }

    #[test]
    fn win_rate_rounds_and_guards_empty_season() {
        let day = Duration::days(1);
        assert_eq!(record(&[], NOW).win_rate, 0);

        let matches = vec![
            game("a", NOW - day, scored(6, 4)),
            game("b", NOW - day * 2, scored(6, 4)),
            game("c", NOW - day * 3, scored(1, 4)),
        ];
        // 2 / 3 = 66.67%
        assert_eq!(record(&matches, NOW).win_rate, 67);
    }

    #[test]
    fn season_comes_from_the_calendar_month() {
        assert_eq!(season_for_month(Month::January), Season::Fall);
        assert_eq!(season_for_month(Month::February), Season::Spring);
        assert_eq!(season_for_month(Month::July), Season::Spring);
        assert_eq!(season_for_month(Month::August), Season::Fall);
        assert_eq!(season_for_month(Month::December), Season::Fall);
        assert_eq!(current_season(NOW), Season::Spring);
    }

    #[test]
    fn year_selector_runs_to_next_year() {
        assert_eq!(selectable_years(2023, NOW), vec![2025, 2024, 2023]);
    }

    #[test]
    fn mvp_ranking_is_stable_and_shares_sum_to_one_hundred() {
        let roster = vec![player("a", "Alice", 1), player("b", "Bob", 2)];
        let mut voted = game("m", NOW, MatchResult::default());
        voted.mvp_votes = [
            (PlayerId::from("b"), 1),
            (PlayerId::from("ghost"), 3),
            (PlayerId::from("a"), 1),
            (PlayerId::from("c"), 2),
        ]
        .into_iter()
        .collect();

        let ranking = mvp_ranking(&voted, &roster);
        let order: Vec<_> = ranking.iter().map(|s| s.player_id.0.as_str()).collect();
        assert_eq!(order, vec!["ghost", "c", "b", "a"]);
        assert_eq!(ranking[0].name, UNKNOWN_MVP_CANDIDATE);
        assert_eq!(ranking[2].name, "Bob");

        let total: f64 = ranking.iter().map(|s| s.share).sum();
        assert!((total - 100.0).abs() < 1e-9);
    }

    #[test]
    fn mvp_shares_are_zero_without_votes() {
        let mut voted = game("m", NOW, MatchResult::default());
        voted.mvp_votes = [(PlayerId::from("a"), 0)].into_iter().collect();
        let ranking = mvp_ranking(&voted, &[]);
        assert!(ranking.iter().all(|standing| standing.share == 0.0));
    }

    #[test]
    fn ballot_is_limited_to_lineup_participants() {
        let roster = vec![
            player("a", "Alice", 1),
            player("b", "Bob", 2),
            player("c", "Cara", 3),
        ];
        let mut played = game("m", NOW, MatchResult::default());
        played.lineup.singles[0] = Some(PlayerId::from("c"));
        played.lineup.singles[1] = Some(PlayerId::from("a"));
        played.lineup.doubles[0].player2 = Some(PlayerId::from("c"));
        played.lineup.doubles[1].player1 = Some(PlayerId::from("gone"));

        let participants: Vec<_> = lineup_participants(&played.lineup)
            .into_iter()
            .map(|id| id.0)
            .collect();
        assert_eq!(participants, vec!["c", "a", "gone"]);

        let ballot: Vec<_> = mvp_ballot(&played, &roster)
            .iter()
            .map(|p| p.name.as_str())
            .collect();
        assert_eq!(ballot, vec!["Alice", "Cara"]);
    }

    #[test]
    fn availability_scenario_counts_available_and_reserve() {
        let roster = vec![player("alice", "Alice", 1), player("bob", "Bob", 2)];
        let mut upcoming = game("m", NOW, MatchResult::default());
        upcoming.availability = [
            (PlayerId::from("alice"), AvailabilityStatus::Yes),
            (PlayerId::from("bob"), AvailabilityStatus::IfNeeded),
        ]
        .into_iter()
        .collect();

        let counts = availability_counts(&upcoming);
        assert_eq!(counts.available, 1);
        assert_eq!(counts.if_needed, 1);
        assert_eq!(counts.unavailable, 0);

        let names: Vec<_> = selectable_players(&upcoming, &roster)
            .iter()
            .map(|p| p.name.as_str())
            .collect();
        assert_eq!(names, vec!["Alice", "Bob"]);
    }

    #[test]
    fn roster_counts_include_players_who_have_not_answered() {
        let roster = vec![
            player("alice", "Alice", 1),
            player("bob", "Bob", 2),
            player("cara", "Cara", 3),
        ];
        let mut upcoming = game("m", NOW, MatchResult::default());
        upcoming.availability = [(PlayerId::from("bob"), AvailabilityStatus::No)]
            .into_iter()
            .collect();

        let counts = roster_availability_counts(&upcoming, &roster);
        assert_eq!(counts.unavailable, 1);
        assert_eq!(counts.not_responded, 2);
        assert!(selectable_players(&upcoming, &roster).is_empty());
    }

    #[test]
    fn dangling_lineup_reference_resolves_to_placeholder() {
        let roster = vec![player("a", "Alice", 1)];
        let mut lineup = Lineup::default();
        lineup.singles[0] = Some(PlayerId::from("a"));
        lineup.doubles[2].player1 = Some(PlayerId::from("deleted"));

        let view = lineup_view(&lineup, &roster);
        assert_eq!(view.singles.len(), 6);
        assert_eq!(view.doubles.len(), 3);
        assert_eq!(view.singles[0].as_ref().map(|s| s.name.as_str()), Some("Alice"));
        assert_eq!(view.singles[1], None);
        assert_eq!(
            view.doubles[2].player1.as_ref().map(|s| s.name.as_str()),
            Some(UNKNOWN_PLAYER)
        );
    }

    #[test]
    fn dashboard_limits_lists_and_resolves_lineups() {
        let day = Duration::days(1);
        let mut matches: Vec<Match> = (1..=7i32)
            .map(|n| game(&format!("past{n}"), NOW - day * (8 - n), scored(n as u32, 3)))
            .collect();
        matches.extend((1..=6i32).map(|n| {
            game(
                &format!("next{n}"),
                NOW + day * n,
                MatchResult::default(),
            )
        }));
        matches[7].lineup.singles[0] = Some(PlayerId::from("a"));

        let snapshot = LeagueSnapshot {
            year: 2024,
            players: vec![player("a", "Alice", 1)],
            matches,
            loading: false,
        };
        let view = dashboard(&snapshot, NOW);

        assert_eq!(view.year, 2024);
        assert_eq!(view.season, Season::Spring);
        assert_eq!(view.upcoming_count, 6);
        assert_eq!(view.upcoming.len(), DASHBOARD_LIST_LEN);
        assert_eq!(view.upcoming[0].game.id, MatchId::from("next1"));
        assert!(view.upcoming[0].lineup.is_some());
        assert!(view.upcoming[1].lineup.is_none());

        let recent: Vec<_> = view
            .recent_results
            .iter()
            .map(|game| game.id.0.as_str())
            .collect();
        assert_eq!(recent, vec!["past7", "past6", "past5", "past4", "past3"]);
        // Scores 1..=7 against 3: wins are 4, 5, 6, 7.
        assert_eq!(view.record.wins, 4);
        assert_eq!(view.record.played, 7);
        assert_eq!(view.record.win_rate, 57);
    }
}
