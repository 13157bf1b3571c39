use std::{sync::Arc, time::Duration};

use dashmap::DashMap;
use futures::{TryStreamExt, future::BoxFuture};
use mongodb::{
    Client, Collection, Database,
    bson::{Bson, Document, doc},
    options::IndexOptions,
};
use serde_json::Value;
use tokio::{
    sync::{
        RwLock,
        broadcast::{self, error::RecvError},
        mpsc,
    },
    time::{MissedTickBehavior, interval},
};
use tracing::{debug, warn};
use uuid::Uuid;

use super::{
    config::MongoConfig,
    connection::establish_connection,
    convert::{ID_FIELD, YEAR_FIELD, document_to_raw, fields_to_document, value_to_bson},
    error::{MongoDaoError, MongoResult},
};
use crate::dao::{
    document_store::{
        CollectionKind, CollectionPath, DocumentPath, DocumentStore, FieldPath, FieldUpdate,
        Fields, LastSnapshot, RawDocument, SNAPSHOT_BUFFER, SnapshotEvent, Subscription,
    },
    storage::StorageResult,
};

const CHANGE_CAPACITY: usize = 32;

/// MongoDB backend. Each collection kind is one MongoDB collection; the year
/// partition is a `year` field present on every document.
#[derive(Clone)]
pub struct MongoDocumentStore {
    inner: Arc<MongoInner>,
}

struct MongoInner {
    state: RwLock<MongoState>,
    config: MongoConfig,
    changes: DashMap<CollectionPath, broadcast::Sender<()>>,
}

struct MongoState {
    #[allow(dead_code)]
    client: Client,
    database: Database,
}

impl MongoInner {
    async fn ping(&self) -> MongoResult<()> {
        let database = {
            let guard = self.state.read().await;
            guard.database.clone()
        };

        database
            .run_command(doc! { "ping": 1 })
            .await
            .map_err(|source| MongoDaoError::HealthPing { source })?;
        Ok(())
    }
}

impl MongoDocumentStore {
    /// Establish a connection to MongoDB and ensure indexes are present.
    pub async fn connect(config: MongoConfig) -> MongoResult<Self> {
        let (client, database) =
            establish_connection(&config.options, &config.database_name).await?;

        let inner = Arc::new(MongoInner {
            state: RwLock::new(MongoState { client, database }),
            config,
            changes: DashMap::new(),
        });

        let store = Self { inner };
        store.ensure_indexes().await?;
        Ok(store)
    }

    async fn ensure_indexes(&self) -> MongoResult<()> {
        let indexes = [
            (CollectionKind::Players, "rank", "players_year_rank_idx"),
            (CollectionKind::Matches, "date", "matches_year_date_idx"),
        ];

        for (kind, field, name) in indexes {
            let index = mongodb::IndexModel::builder()
                .keys(doc! { YEAR_FIELD: 1, field: 1 })
                .options(IndexOptions::builder().name(Some(name.to_owned())).build())
                .build();

            self.collection(kind)
                .await
                .create_index(index)
                .await
                .map_err(|source| MongoDaoError::EnsureIndex {
                    collection: kind.name(),
                    index: name,
                    source,
                })?;
        }

        Ok(())
    }

    async fn collection(&self, kind: CollectionKind) -> Collection<Document> {
        let guard = self.inner.state.read().await;
        guard.database.collection::<Document>(kind.name())
    }

    fn notifier(&self, collection: CollectionPath) -> broadcast::Sender<()> {
        self.inner
            .changes
            .entry(collection)
            .or_insert_with(|| broadcast::channel(CHANGE_CAPACITY).0)
            .clone()
    }

    /// Wake every local subscriber of `collection` so it re-queries.
    fn notify(&self, collection: CollectionPath) {
        let _ = self.notifier(collection).send(());
    }

    async fn query(&self, collection: CollectionPath, order_by: &str) -> MongoResult<Vec<RawDocument>> {
        let documents: Vec<Document> = self
            .collection(collection.kind)
            .await
            .find(doc! { YEAR_FIELD: collection.year })
            .sort(doc! { order_by: 1 })
            .await
            .map_err(|source| MongoDaoError::Query {
                collection: collection.to_string(),
                source,
            })?
            .try_collect()
            .await
            .map_err(|source| MongoDaoError::Query {
                collection: collection.to_string(),
                source,
            })?;

        Ok(documents
            .into_iter()
            .filter_map(|document| {
                let raw = document_to_raw(document);
                if raw.is_none() {
                    warn!(%collection, "skipping document without a usable `_id`");
                }
                raw
            })
            .collect())
    }

    async fn insert(&self, collection: CollectionPath, fields: Fields) -> MongoResult<String> {
        let id = Uuid::new_v4().simple().to_string();
        let mut document = fields_to_document(fields);
        document.insert(ID_FIELD, id.clone());
        document.insert(YEAR_FIELD, collection.year);

        self.collection(collection.kind)
            .await
            .insert_one(document)
            .await
            .map_err(|source| MongoDaoError::Insert {
                collection: collection.to_string(),
                source,
            })?;

        self.notify(collection);
        Ok(id)
    }

    async fn update(&self, document: &DocumentPath, modifications: Document) -> MongoResult<bool> {
        let result = self
            .collection(document.collection.kind)
            .await
            .update_one(document_filter(document), modifications)
            .await
            .map_err(|source| MongoDaoError::Update {
                document: document.to_string(),
                source,
            })?;

        let matched = result.matched_count > 0;
        if matched {
            self.notify(document.collection);
        }
        Ok(matched)
    }

    async fn remove(&self, document: &DocumentPath) -> MongoResult<bool> {
        let result = self
            .collection(document.collection.kind)
            .await
            .delete_one(document_filter(document))
            .await
            .map_err(|source| MongoDaoError::Delete {
                document: document.to_string(),
                source,
            })?;

        let existed = result.deleted_count > 0;
        if existed {
            self.notify(document.collection);
        }
        Ok(existed)
    }
}

fn document_filter(document: &DocumentPath) -> Document {
    doc! { ID_FIELD: document.id.as_str(), YEAR_FIELD: document.collection.year }
}

fn set_document(updates: Vec<FieldUpdate>) -> Document {
    let mut set = Document::new();
    for update in updates {
        set.insert(update.path.dotted(), value_to_bson(update.value));
    }
    doc! { "$set": set }
}

impl DocumentStore for MongoDocumentStore {
    fn subscribe(
        &self,
        collection: CollectionPath,
        order_by: &'static str,
    ) -> BoxFuture<'static, StorageResult<Subscription>> {
        let store = self.clone();
        Box::pin(async move {
            let mut changes = store.notifier(collection).subscribe();
            let (tx, rx) = mpsc::channel(SNAPSHOT_BUFFER);
            let refresh_every = store.inner.config.refresh_interval.max(Duration::from_millis(100));

            let forwarder = tokio::spawn(async move {
                let mut refresh = interval(refresh_every);
                refresh.set_missed_tick_behavior(MissedTickBehavior::Delay);
                let mut last = LastSnapshot::default();

                loop {
                    // The first tick completes immediately and yields the initial snapshot.
                    let wake = tokio::select! {
                        _ = tx.closed() => break,
                        _ = refresh.tick() => true,
                        notice = changes.recv() => !matches!(notice, Err(RecvError::Closed)),
                    };
                    if !wake {
                        break;
                    }

                    let event = match store.query(collection, order_by).await {
                        Ok(documents) if !last.update(&documents) => continue,
                        Ok(documents) => SnapshotEvent::Snapshot(documents),
                        Err(err) => {
                            let _ = tx.send(SnapshotEvent::Error(err.into())).await;
                            break;
                        }
                    };
                    if tx.send(event).await.is_err() {
                        break;
                    }
                }
                debug!(%collection, "MongoDB subscription closed");
            });

            Ok(Subscription::new(rx, forwarder))
        })
    }

    fn create(
        &self,
        collection: CollectionPath,
        fields: Fields,
    ) -> BoxFuture<'static, StorageResult<String>> {
        let store = self.clone();
        Box::pin(async move { store.insert(collection, fields).await.map_err(Into::into) })
    }

    fn update_fields(
        &self,
        document: DocumentPath,
        updates: Vec<FieldUpdate>,
    ) -> BoxFuture<'static, StorageResult<bool>> {
        let store = self.clone();
        Box::pin(async move {
            store
                .update(&document, set_document(updates))
                .await
                .map_err(Into::into)
        })
    }

    fn replace_field(
        &self,
        document: DocumentPath,
        field: &'static str,
        value: Value,
    ) -> BoxFuture<'static, StorageResult<bool>> {
        let store = self.clone();
        Box::pin(async move {
            let path = FieldPath::field(field)?;
            let update = set_document(vec![FieldUpdate::new(path, value)]);
            store.update(&document, update).await.map_err(Into::into)
        })
    }

    fn increment_field(
        &self,
        document: DocumentPath,
        path: FieldPath,
        by: i64,
    ) -> BoxFuture<'static, StorageResult<bool>> {
        let store = self.clone();
        Box::pin(async move {
            let update = doc! { "$inc": { path.dotted(): Bson::Int64(by) } };
            store.update(&document, update).await.map_err(Into::into)
        })
    }

    fn delete(&self, document: DocumentPath) -> BoxFuture<'static, StorageResult<bool>> {
        let store = self.clone();
        Box::pin(async move { store.remove(&document).await.map_err(Into::into) })
    }

    fn health_check(&self) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move { store.inner.ping().await.map_err(Into::into) })
    }
}
