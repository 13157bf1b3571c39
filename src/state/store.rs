//! Live, year-scoped mirror of the roster and the match schedule.
//!
//! Every mutation issues exactly one document write and leaves the local lists
//! alone; lists only change when the subscription redelivers a snapshot that
//! includes the write.

use std::sync::Arc;

use serde_json::Value;
use tokio::{
    sync::{Mutex, RwLock, broadcast, watch},
    task::JoinHandle,
};
use tracing::{debug, error, info, warn};

use crate::{
    dao::{
        document_store::{
            CollectionKind, CollectionPath, DocumentPath, DocumentStore, FieldPath, FieldUpdate,
            RawDocument, SnapshotEvent, Subscription,
        },
        models::{
            self, FIELD_AVAILABILITY, FIELD_DATE, FIELD_LINEUP, FIELD_LOCATION, FIELD_MVP_VOTES,
            FIELD_NAME, FIELD_OPPONENT, FIELD_RANK, FIELD_RESULT, FIELD_SEASON, LineupDocument,
            MatchDocument, PlayerDocument, ResultDocument,
        },
        storage::StorageResult,
    },
    error::ServiceError,
    state::league::{
        AvailabilityStatus, Lineup, Match, MatchId, MatchPatch, MatchResult, NewMatch, NewPlayer,
        Player, PlayerId, PlayerPatch, to_epoch_millis,
    },
};

const CHANGE_CAPACITY: usize = 64;

/// Notification emitted whenever the observable league state changes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LeagueChange {
    /// The active year changed; lists were cleared and loading restarted.
    YearChanged { year: i32 },
    /// A new roster snapshot was applied.
    Players { year: i32 },
    /// A new match snapshot was applied.
    Matches { year: i32 },
    /// Loading ended without data (subscription failure).
    Loading { year: i32, loading: bool },
}

/// Consistent copy of the store's observable state.
#[derive(Debug, Clone, PartialEq)]
pub struct LeagueSnapshot {
    pub year: i32,
    /// Roster ordered by rank ascending.
    pub players: Vec<Player>,
    /// Matches ordered by date ascending.
    pub matches: Vec<Match>,
    /// True until the first roster snapshot for the active year arrives.
    pub loading: bool,
}

struct MirrorState {
    snapshot: LeagueSnapshot,
    generation: u64,
}

impl MirrorState {
    fn reset(&mut self, year: i32) -> u64 {
        self.generation += 1;
        self.snapshot = LeagueSnapshot {
            year,
            players: Vec::new(),
            matches: Vec::new(),
            loading: true,
        };
        self.generation
    }
}

/// Listener tasks of the active year; aborting them drops the backend subscriptions.
struct YearSubscriptions {
    players: JoinHandle<()>,
    matches: JoinHandle<()>,
}

impl YearSubscriptions {
    fn cancel(self) {
        self.players.abort();
        self.matches.abort();
    }
}

/// Domain store backed by an injected [`DocumentStore`].
#[derive(Clone)]
pub struct LeagueStore {
    inner: Arc<LeagueInner>,
}

struct LeagueInner {
    documents: Arc<dyn DocumentStore>,
    state: RwLock<MirrorState>,
    subscriptions: Mutex<Option<YearSubscriptions>>,
    changes: broadcast::Sender<LeagueChange>,
    revision: watch::Sender<u64>,
}

impl LeagueStore {
    /// Create the store and start mirroring `year`.
    ///
    /// A failed initial subscription is logged and ends loading; the store stays
    /// usable and a later [`switch_year`](Self::switch_year) subscribes again.
    pub async fn open(documents: Arc<dyn DocumentStore>, year: i32) -> Self {
        let (changes, _receiver) = broadcast::channel(CHANGE_CAPACITY);
        let (revision, _receiver) = watch::channel(0);
        let store = Self {
            inner: Arc::new(LeagueInner {
                documents,
                state: RwLock::new(MirrorState {
                    snapshot: LeagueSnapshot {
                        year,
                        players: Vec::new(),
                        matches: Vec::new(),
                        loading: true,
                    },
                    generation: 0,
                }),
                subscriptions: Mutex::new(None),
                changes,
                revision,
            }),
        };

        let _ = store.switch_year(year).await;
        store
    }

    /// Re-point both subscriptions at another year partition.
    ///
    /// Previous listeners are cancelled and the generation bumped before the new
    /// subscriptions exist, so a late snapshot from the old year is discarded.
    pub async fn switch_year(&self, year: i32) -> StorageResult<()> {
        let mut subscriptions = self.inner.subscriptions.lock().await;
        if let Some(previous) = subscriptions.take() {
            previous.cancel();
        }

        let generation = self.inner.state.write().await.reset(year);
        self.inner.publish(LeagueChange::YearChanged { year });
        info!(year, "mirroring league year");

        match self.subscribe_year(year, generation).await {
            Ok(listeners) => {
                *subscriptions = Some(listeners);
                Ok(())
            }
            Err(err) => {
                error!(year, error = %err, "failed to subscribe to league collections");
                self.inner.end_loading(generation).await;
                Err(err)
            }
        }
    }

    async fn subscribe_year(&self, year: i32, generation: u64) -> StorageResult<YearSubscriptions> {
        let documents = &self.inner.documents;
        let players = documents
            .subscribe(CollectionPath::new(year, CollectionKind::Players), FIELD_RANK)
            .await?;
        let matches = documents
            .subscribe(CollectionPath::new(year, CollectionKind::Matches), FIELD_DATE)
            .await?;

        Ok(YearSubscriptions {
            players: spawn_listener(self.inner.clone(), generation, CollectionKind::Players, players),
            matches: spawn_listener(self.inner.clone(), generation, CollectionKind::Matches, matches),
        })
    }

    /// Stop mirroring; no snapshot is applied afterwards.
    pub async fn close(&self) {
        if let Some(subscriptions) = self.inner.subscriptions.lock().await.take() {
            subscriptions.cancel();
        }
        // Invalidate anything a listener may be about to apply.
        self.inner.state.write().await.generation += 1;
        debug!("league store closed");
    }

    pub async fn snapshot(&self) -> LeagueSnapshot {
        self.inner.state.read().await.snapshot.clone()
    }

    pub async fn year(&self) -> i32 {
        self.inner.state.read().await.snapshot.year
    }

    pub async fn players(&self) -> Vec<Player> {
        self.inner.state.read().await.snapshot.players.clone()
    }

    pub async fn matches(&self) -> Vec<Match> {
        self.inner.state.read().await.snapshot.matches.clone()
    }

    pub async fn is_loading(&self) -> bool {
        self.inner.state.read().await.snapshot.loading
    }

    /// Subscribe to change notifications.
    pub fn changes(&self) -> broadcast::Receiver<LeagueChange> {
        self.inner.changes.subscribe()
    }

    /// Counter bumped after every observable change; useful to await convergence.
    pub fn revision(&self) -> watch::Receiver<u64> {
        self.inner.revision.subscribe()
    }

    pub async fn add_player(&self, player: NewPlayer) -> Result<PlayerId, ServiceError> {
        require_text("player name", &player.name)?;
        let fields = models::to_fields(&PlayerDocument::from(player))?;
        let collection = self.collection(CollectionKind::Players).await;
        let id = self.inner.documents.create(collection, fields).await?;
        info!(%collection, player_id = %id, "player added");
        Ok(PlayerId(id))
    }

    pub async fn update_player(&self, id: &PlayerId, patch: PlayerPatch) -> Result<(), ServiceError> {
        let mut updates = Vec::new();
        if let Some(name) = patch.name {
            require_text("player name", &name)?;
            updates.push(FieldUpdate::new(FieldPath::field(FIELD_NAME)?, name));
        }
        if let Some(rank) = patch.rank {
            updates.push(FieldUpdate::new(FieldPath::field(FIELD_RANK)?, rank));
        }
        if updates.is_empty() {
            debug!(player_id = %id, "empty player patch; nothing to write");
            return Ok(());
        }

        let document = self.document(CollectionKind::Players, &id.0).await;
        if !self.inner.documents.update_fields(document, updates).await? {
            warn!(player_id = %id, "player not found; update ignored");
        }
        Ok(())
    }

    /// Delete a roster entry. References held by matches are left dangling.
    pub async fn delete_player(&self, id: &PlayerId) -> Result<(), ServiceError> {
        let document = self.document(CollectionKind::Players, &id.0).await;
        if !self.inner.documents.delete(document).await? {
            warn!(player_id = %id, "player not found; delete ignored");
        }
        Ok(())
    }

    pub async fn add_match(&self, new_match: NewMatch) -> Result<MatchId, ServiceError> {
        require_text("opponent", &new_match.opponent)?;
        require_text("location", &new_match.location)?;
        let fields = models::to_fields(&MatchDocument::from(new_match))?;
        let collection = self.collection(CollectionKind::Matches).await;
        let id = self.inner.documents.create(collection, fields).await?;
        info!(%collection, match_id = %id, "match added");
        Ok(MatchId(id))
    }

    pub async fn update_match(&self, id: &MatchId, patch: MatchPatch) -> Result<(), ServiceError> {
        let mut updates = Vec::new();
        if let Some(opponent) = patch.opponent {
            require_text("opponent", &opponent)?;
            updates.push(FieldUpdate::new(FieldPath::field(FIELD_OPPONENT)?, opponent));
        }
        if let Some(location) = patch.location {
            require_text("location", &location)?;
            updates.push(FieldUpdate::new(FieldPath::field(FIELD_LOCATION)?, location));
        }
        if let Some(date) = patch.date {
            updates.push(FieldUpdate::new(
                FieldPath::field(FIELD_DATE)?,
                to_epoch_millis(date),
            ));
        }
        if let Some(season) = patch.season {
            updates.push(FieldUpdate::new(FieldPath::field(FIELD_SEASON)?, season.as_str()));
        }
        if updates.is_empty() {
            debug!(match_id = %id, "empty match patch; nothing to write");
            return Ok(());
        }

        self.update_match_fields(id, updates).await
    }

    /// Delete a match regardless of its date.
    pub async fn delete_match(&self, id: &MatchId) -> Result<(), ServiceError> {
        let document = self.document(CollectionKind::Matches, &id.0).await;
        if !self.inner.documents.delete(document).await? {
            warn!(match_id = %id, "match not found; delete ignored");
        }
        Ok(())
    }

    /// Set one player's availability without touching other players' entries.
    pub async fn update_player_availability(
        &self,
        match_id: &MatchId,
        player_id: &PlayerId,
        status: AvailabilityStatus,
    ) -> Result<(), ServiceError> {
        let path = MapField::Availability.entry(player_id)?;
        self.update_match_fields(match_id, vec![FieldUpdate::new(path, status.as_str())])
            .await
    }

    /// Replace the whole lineup.
    pub async fn update_match_lineup(
        &self,
        match_id: &MatchId,
        lineup: Lineup,
    ) -> Result<(), ServiceError> {
        let value = models::to_value(&LineupDocument::from(lineup))?;
        self.replace_match_field(match_id, FIELD_LINEUP, value).await
    }

    /// Replace the whole result.
    pub async fn update_match_result(
        &self,
        match_id: &MatchId,
        result: MatchResult,
    ) -> Result<(), ServiceError> {
        let value = models::to_value(&ResultDocument::from(result))?;
        self.replace_match_field(match_id, FIELD_RESULT, value).await
    }

    /// Record one MVP vote for `player_id`.
    ///
    /// The match must be known to the current snapshot. The counter is bumped
    /// with an atomic increment on the backend, so concurrent votes for the same
    /// player are all counted.
    pub async fn add_mvp_vote(
        &self,
        match_id: &MatchId,
        player_id: &PlayerId,
    ) -> Result<(), ServiceError> {
        let known = self
            .inner
            .state
            .read()
            .await
            .snapshot
            .matches
            .iter()
            .any(|m| &m.id == match_id);
        if !known {
            return Err(ServiceError::NotFound(format!("match `{match_id}`")));
        }

        let path = MapField::MvpVotes.entry(player_id)?;
        let document = self.document(CollectionKind::Matches, &match_id.0).await;
        if !self.inner.documents.increment_field(document, path, 1).await? {
            warn!(%match_id, "match not found; vote ignored");
        }
        Ok(())
    }

    async fn update_match_fields(
        &self,
        id: &MatchId,
        updates: Vec<FieldUpdate>,
    ) -> Result<(), ServiceError> {
        let document = self.document(CollectionKind::Matches, &id.0).await;
        if !self.inner.documents.update_fields(document, updates).await? {
            warn!(match_id = %id, "match not found; update ignored");
        }
        Ok(())
    }

    async fn replace_match_field(
        &self,
        id: &MatchId,
        field: &'static str,
        value: Value,
    ) -> Result<(), ServiceError> {
        let document = self.document(CollectionKind::Matches, &id.0).await;
        if !self.inner.documents.replace_field(document, field, value).await? {
            warn!(match_id = %id, field, "match not found; update ignored");
        }
        Ok(())
    }

    async fn collection(&self, kind: CollectionKind) -> CollectionPath {
        CollectionPath::new(self.year().await, kind)
    }

    async fn document(&self, kind: CollectionKind, id: &str) -> DocumentPath {
        self.collection(kind).await.document(id)
    }
}

/// Map-valued match fields written one key at a time.
#[derive(Debug, Clone, Copy)]
enum MapField {
    Availability,
    MvpVotes,
}

impl MapField {
    fn name(self) -> &'static str {
        match self {
            MapField::Availability => FIELD_AVAILABILITY,
            MapField::MvpVotes => FIELD_MVP_VOTES,
        }
    }

    fn entry(self, key: &PlayerId) -> StorageResult<FieldPath> {
        FieldPath::nested(self.name(), &key.0)
    }
}

impl LeagueInner {
    fn publish(&self, change: LeagueChange) {
        let _ = self.changes.send(change);
        self.revision.send_modify(|revision| *revision += 1);
    }

    async fn apply_players(&self, generation: u64, documents: Vec<RawDocument>) {
        let players = decode_players(documents);
        let year = {
            let mut state = self.state.write().await;
            if state.generation != generation {
                return;
            }
            if !state.snapshot.loading && state.snapshot.players == players {
                return;
            }
            state.snapshot.players = players;
            state.snapshot.loading = false;
            state.snapshot.year
        };
        self.publish(LeagueChange::Players { year });
    }

    async fn apply_matches(&self, generation: u64, documents: Vec<RawDocument>) {
        let matches = decode_matches(documents);
        let year = {
            let mut state = self.state.write().await;
            if state.generation != generation || state.snapshot.matches == matches {
                return;
            }
            state.snapshot.matches = matches;
            state.snapshot.year
        };
        self.publish(LeagueChange::Matches { year });
    }

    /// Force the loading flag off so observers do not wait forever.
    async fn end_loading(&self, generation: u64) {
        let year = {
            let mut state = self.state.write().await;
            if state.generation != generation || !state.snapshot.loading {
                return;
            }
            state.snapshot.loading = false;
            state.snapshot.year
        };
        self.publish(LeagueChange::Loading {
            year,
            loading: false,
        });
    }
}

fn spawn_listener(
    inner: Arc<LeagueInner>,
    generation: u64,
    kind: CollectionKind,
    mut subscription: Subscription,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        while let Some(event) = subscription.next().await {
            match event {
                SnapshotEvent::Snapshot(documents) => match kind {
                    CollectionKind::Players => inner.apply_players(generation, documents).await,
                    CollectionKind::Matches => inner.apply_matches(generation, documents).await,
                },
                SnapshotEvent::Error(err) => {
                    error!(collection = kind.name(), error = %err, "league subscription failed");
                    inner.end_loading(generation).await;
                    break;
                }
            }
        }
    })
}

fn decode_players(documents: Vec<RawDocument>) -> Vec<Player> {
    documents
        .into_iter()
        .filter_map(|document| match models::from_raw::<PlayerDocument>(document) {
            Ok((id, stored)) => Some(Player::from_document(id, stored)),
            Err(err) => {
                warn!(error = %err, "skipping malformed player document");
                None
            }
        })
        .collect()
}

fn decode_matches(documents: Vec<RawDocument>) -> Vec<Match> {
    documents
        .into_iter()
        .filter_map(|document| match models::from_raw::<MatchDocument>(document) {
            Ok((id, stored)) => Match::from_document(id, stored),
            Err(err) => {
                warn!(error = %err, "skipping malformed match document");
                None
            }
        })
        .collect()
}

fn require_text(field: &str, value: &str) -> Result<(), ServiceError> {
    if value.trim().is_empty() {
        return Err(ServiceError::InvalidInput(format!("{field} must not be empty")));
    }
    Ok(())
}
