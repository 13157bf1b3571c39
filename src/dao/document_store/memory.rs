//! In-process document store used for local development and the test suite.

use std::{
    cmp::Ordering,
    sync::{
        Arc,
        atomic::{AtomicBool, Ordering as AtomicOrdering},
    },
};

use dashmap::DashMap;
use futures::future::BoxFuture;
use indexmap::IndexMap;
use serde_json::{Map, Value};
use thiserror::Error;
use tokio::sync::{
    broadcast::{self, error::RecvError},
    mpsc,
};
use tracing::debug;
use uuid::Uuid;

use super::{
    CollectionPath, DocumentPath, DocumentStore, FieldPath, FieldUpdate, Fields, RawDocument,
    SNAPSHOT_BUFFER, SnapshotEvent, Subscription,
};
use crate::dao::storage::{StorageError, StorageResult};

const CHANGE_CAPACITY: usize = 32;

/// Failures raised by the in-memory backend.
#[derive(Debug, Error)]
pub enum MemoryStoreError {
    /// The store was switched offline.
    #[error("in-memory store is offline")]
    Offline,
    /// A subscription failure was injected for a collection.
    #[error("subscription failed: {0}")]
    SubscriptionFailed(String),
}

#[derive(Debug, Clone)]
enum ChangeNotice {
    Changed,
    Failed(String),
}

/// Documents of one collection in insertion order plus its change fan-out.
struct MemoryCollection {
    documents: IndexMap<String, Fields>,
    changes: broadcast::Sender<ChangeNotice>,
}

impl MemoryCollection {
    fn new() -> Self {
        let (changes, _receiver) = broadcast::channel(CHANGE_CAPACITY);
        Self {
            documents: IndexMap::new(),
            changes,
        }
    }
}

/// [`DocumentStore`] keeping every collection in memory.
#[derive(Clone, Default)]
pub struct MemoryDocumentStore {
    inner: Arc<MemoryInner>,
}

#[derive(Default)]
struct MemoryInner {
    collections: DashMap<CollectionPath, MemoryCollection>,
    rejected: DashMap<CollectionPath, String>,
    offline: AtomicBool,
}

impl MemoryDocumentStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every subsequent write and health check fail until switched back online.
    pub fn set_offline(&self, offline: bool) {
        self.inner.offline.store(offline, AtomicOrdering::SeqCst);
    }

    /// Push a failure to every live subscriber of `collection`.
    pub fn fail_subscriptions(&self, collection: CollectionPath, message: impl Into<String>) {
        let entry = self
            .inner
            .collections
            .entry(collection)
            .or_insert_with(MemoryCollection::new);
        let _ = entry.changes.send(ChangeNotice::Failed(message.into()));
    }

    /// Refuse every new subscription to `collection` until the rejection is lifted.
    pub fn reject_subscriptions(&self, collection: CollectionPath, message: impl Into<String>) {
        self.inner.rejected.insert(collection, message.into());
    }

    pub fn accept_subscriptions(&self, collection: CollectionPath) {
        self.inner.rejected.remove(&collection);
    }

    /// Read a single document directly, bypassing subscriptions.
    pub fn document(&self, document: &DocumentPath) -> Option<Fields> {
        self.inner
            .collections
            .get(&document.collection)
            .and_then(|collection| collection.documents.get(&document.id).cloned())
    }

    fn ensure_online(&self) -> StorageResult<()> {
        if self.inner.offline.load(AtomicOrdering::SeqCst) {
            return Err(StorageError::unavailable(
                "in-memory store is offline".into(),
                MemoryStoreError::Offline,
            ));
        }
        Ok(())
    }

    fn changes(&self, collection: CollectionPath) -> broadcast::Receiver<ChangeNotice> {
        self.inner
            .collections
            .entry(collection)
            .or_insert_with(MemoryCollection::new)
            .changes
            .subscribe()
    }

    fn snapshot(&self, collection: CollectionPath, order_by: &str) -> Vec<RawDocument> {
        let mut documents: Vec<RawDocument> = self
            .inner
            .collections
            .get(&collection)
            .map(|entry| {
                entry
                    .documents
                    .iter()
                    .map(|(id, fields)| RawDocument {
                        id: id.clone(),
                        fields: fields.clone(),
                    })
                    .collect()
            })
            .unwrap_or_default();

        documents.sort_by(|a, b| compare_values(a.fields.get(order_by), b.fields.get(order_by)));
        documents
    }

    /// Run `mutate` against an existing document and notify subscribers when it matched.
    fn with_document<F>(&self, document: &DocumentPath, mutate: F) -> StorageResult<bool>
    where
        F: FnOnce(&mut Fields) -> StorageResult<()>,
    {
        self.ensure_online()?;
        let Some(mut collection) = self.inner.collections.get_mut(&document.collection) else {
            return Ok(false);
        };
        let Some(fields) = collection.documents.get_mut(&document.id) else {
            return Ok(false);
        };
        mutate(fields)?;
        let _ = collection.changes.send(ChangeNotice::Changed);
        Ok(true)
    }

    fn create_now(&self, collection: CollectionPath, fields: Fields) -> StorageResult<String> {
        self.ensure_online()?;
        let id = Uuid::new_v4().simple().to_string();
        let mut entry = self
            .inner
            .collections
            .entry(collection)
            .or_insert_with(MemoryCollection::new);
        entry.documents.insert(id.clone(), fields);
        let _ = entry.changes.send(ChangeNotice::Changed);
        debug!(%collection, %id, "created in-memory document");
        Ok(id)
    }

    fn delete_now(&self, document: &DocumentPath) -> StorageResult<bool> {
        self.ensure_online()?;
        let Some(mut collection) = self.inner.collections.get_mut(&document.collection) else {
            return Ok(false);
        };
        let existed = collection.documents.shift_remove(&document.id).is_some();
        if existed {
            let _ = collection.changes.send(ChangeNotice::Changed);
        }
        Ok(existed)
    }
}

impl DocumentStore for MemoryDocumentStore {
    fn subscribe(
        &self,
        collection: CollectionPath,
        order_by: &'static str,
    ) -> BoxFuture<'static, StorageResult<Subscription>> {
        let store = self.clone();
        Box::pin(async move {
            if let Some(message) = store.inner.rejected.get(&collection) {
                return Err(StorageError::unavailable(
                    format!("subscription to `{collection}` refused"),
                    MemoryStoreError::SubscriptionFailed(message.clone()),
                ));
            }
            // Register for changes before the initial snapshot so no write is missed.
            let mut changes = store.changes(collection);
            let (tx, rx) = mpsc::channel(SNAPSHOT_BUFFER);

            let forwarder = tokio::spawn(async move {
                let initial = store.snapshot(collection, order_by);
                if tx.send(SnapshotEvent::Snapshot(initial)).await.is_err() {
                    return;
                }

                loop {
                    tokio::select! {
                        _ = tx.closed() => break,
                        notice = changes.recv() => {
                            let event = match notice {
                                // Lagged receivers still converge: the next snapshot is complete.
                                Ok(ChangeNotice::Changed) | Err(RecvError::Lagged(_)) => {
                                    SnapshotEvent::Snapshot(store.snapshot(collection, order_by))
                                }
                                Ok(ChangeNotice::Failed(message)) => {
                                    let _ = tx
                                        .send(SnapshotEvent::Error(StorageError::unavailable(
                                            format!("subscription to `{collection}` failed"),
                                            MemoryStoreError::SubscriptionFailed(message),
                                        )))
                                        .await;
                                    break;
                                }
                                Err(RecvError::Closed) => break,
                            };

                            if tx.send(event).await.is_err() {
                                break;
                            }
                        }
                    }
                }
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
        Box::pin(async move { store.create_now(collection, fields) })
    }

    fn update_fields(
        &self,
        document: DocumentPath,
        updates: Vec<FieldUpdate>,
    ) -> BoxFuture<'static, StorageResult<bool>> {
        let store = self.clone();
        Box::pin(async move {
            store.with_document(&document, |fields| {
                for update in updates {
                    set_path(fields, &update.path, update.value);
                }
                Ok(())
            })
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
            store.with_document(&document, |fields| {
                set_path(fields, &path, value);
                Ok(())
            })
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
            store.with_document(&document, |fields| {
                let current = get_path(fields, &path).and_then(Value::as_i64).unwrap_or(0);
                set_path(fields, &path, Value::from(current + by));
                Ok(())
            })
        })
    }

    fn delete(&self, document: DocumentPath) -> BoxFuture<'static, StorageResult<bool>> {
        let store = self.clone();
        Box::pin(async move { store.delete_now(&document) })
    }

    fn health_check(&self) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move { store.ensure_online() })
    }
}

fn get_path<'a>(fields: &'a Fields, path: &FieldPath) -> Option<&'a Value> {
    let (first, rest) = path.segments().split_first()?;
    rest.iter()
        .try_fold(fields.get(first)?, |value, segment| value.get(segment))
}

/// Set the value addressed by `path`, creating intermediate maps as needed.
fn set_path(fields: &mut Fields, path: &FieldPath, value: Value) {
    let Some((last, parents)) = path.segments().split_last() else {
        return;
    };

    let mut cursor = fields;
    for segment in parents {
        let entry = cursor
            .entry(segment.clone())
            .or_insert_with(|| Value::Object(Map::new()));
        if !entry.is_object() {
            *entry = Value::Object(Map::new());
        }
        let Some(map) = entry.as_object_mut() else {
            return;
        };
        cursor = map;
    }
    cursor.insert(last.clone(), value);
}

/// Ascending order used for snapshots: numbers, then strings, then anything else; missing last.
fn compare_values(a: Option<&Value>, b: Option<&Value>) -> Ordering {
    match (a, b) {
        (Some(Value::Number(a)), Some(Value::Number(b))) => {
            let (a, b) = (a.as_f64().unwrap_or(0.0), b.as_f64().unwrap_or(0.0));
            a.partial_cmp(&b).unwrap_or(Ordering::Equal)
        }
        (Some(Value::String(a)), Some(Value::String(b))) => a.cmp(b),
        (Some(a), Some(b)) => type_rank(a).cmp(&type_rank(b)),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    }
}

fn type_rank(value: &Value) -> u8 {
    match value {
        Value::Null => 0,
        Value::Bool(_) => 1,
        Value::Number(_) => 2,
        Value::String(_) => 3,
        Value::Array(_) => 4,
        Value::Object(_) => 5,
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use serde_json::json;
    use tokio::time::timeout;

    use super::*;
    use crate::dao::document_store::CollectionKind;

    fn players() -> CollectionPath {
        CollectionPath::new(2024, CollectionKind::Players)
    }

    fn fields(value: Value) -> Fields {
        match value {
            Value::Object(map) => map,
            other => panic!("expected object, got {other:?}"),
        }
    }

    async fn next_snapshot(subscription: &mut Subscription) -> Vec<RawDocument> {
        match timeout(Duration::from_secs(1), subscription.next()).await {
            Ok(Some(SnapshotEvent::Snapshot(documents))) => documents,
            other => panic!("expected snapshot, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn subscription_delivers_ordered_snapshots() {
        let store = MemoryDocumentStore::new();
        store
            .create(players(), fields(json!({"name": "Bob", "rank": 2})))
            .await
            .unwrap();
        store
            .create(players(), fields(json!({"name": "Alice", "rank": 1})))
            .await
            .unwrap();

        let mut subscription = store.subscribe(players(), "rank").await.unwrap();
        let names: Vec<_> = next_snapshot(&mut subscription)
            .await
            .into_iter()
            .map(|doc| doc.fields["name"].clone())
            .collect();
        assert_eq!(names, vec![json!("Alice"), json!("Bob")]);

        store
            .create(players(), fields(json!({"name": "Cara", "rank": 0})))
            .await
            .unwrap();
        let snapshot = next_snapshot(&mut subscription).await;
        assert_eq!(snapshot.len(), 3);
        assert_eq!(snapshot[0].fields["name"], json!("Cara"));
    }

    #[tokio::test]
    async fn nested_update_leaves_sibling_keys_untouched() {
        let store = MemoryDocumentStore::new();
        let matches = CollectionPath::new(2024, CollectionKind::Matches);
        let id = store
            .create(matches, fields(json!({"availability": {"a": "Yes", "b": "No"}})))
            .await
            .unwrap();
        let document = matches.document(id);

        let path = FieldPath::nested("availability", "a").unwrap();
        let updated = store
            .update_fields(document.clone(), vec![FieldUpdate::new(path, "If Needed")])
            .await
            .unwrap();
        assert!(updated);

        let stored = store.document(&document).unwrap();
        assert_eq!(stored["availability"], json!({"a": "If Needed", "b": "No"}));
    }

    #[tokio::test]
    async fn nested_update_replaces_scalar_parent_with_map() {
        let store = MemoryDocumentStore::new();
        let matches = CollectionPath::new(2024, CollectionKind::Matches);
        let id = store
            .create(matches, fields(json!({"availability": "none", "opponent": "Oak Hill"})))
            .await
            .unwrap();
        let document = matches.document(id);

        let path = FieldPath::nested("availability", "a").unwrap();
        store
            .update_fields(document.clone(), vec![FieldUpdate::new(path, "Yes")])
            .await
            .unwrap();

        let stored = store.document(&document).unwrap();
        assert_eq!(stored["availability"], json!({"a": "Yes"}));
        assert_eq!(stored["opponent"], json!("Oak Hill"));
    }

    #[tokio::test]
    async fn increment_starts_missing_counter_at_zero() {
        let store = MemoryDocumentStore::new();
        let matches = CollectionPath::new(2024, CollectionKind::Matches);
        let id = store
            .create(matches, fields(json!({"mvpVotes": {}})))
            .await
            .unwrap();
        let document = matches.document(id);
        let path = FieldPath::nested("mvpVotes", "p1").unwrap();

        store
            .increment_field(document.clone(), path.clone(), 1)
            .await
            .unwrap();
        store.increment_field(document.clone(), path, 1).await.unwrap();

        assert_eq!(store.document(&document).unwrap()["mvpVotes"], json!({"p1": 2}));
    }

    #[tokio::test]
    async fn writes_to_missing_documents_are_reported() {
        let store = MemoryDocumentStore::new();
        let document = players().document("missing");
        let path = FieldPath::field("name").unwrap();

        assert!(
            !store
                .update_fields(document.clone(), vec![FieldUpdate::new(path, "x")])
                .await
                .unwrap()
        );
        assert!(!store.delete(document).await.unwrap());
    }

    #[tokio::test]
    async fn offline_store_rejects_writes() {
        let store = MemoryDocumentStore::new();
        store.set_offline(true);
        assert!(store.create(players(), Fields::new()).await.is_err());
        assert!(store.health_check().await.is_err());

        store.set_offline(false);
        assert!(store.create(players(), Fields::new()).await.is_ok());
    }

    #[tokio::test]
    async fn injected_failure_ends_subscription() {
        let store = MemoryDocumentStore::new();
        let mut subscription = store.subscribe(players(), "rank").await.unwrap();
        next_snapshot(&mut subscription).await;

        store.fail_subscriptions(players(), "permission denied");
        match timeout(Duration::from_secs(1), subscription.next()).await {
            Ok(Some(SnapshotEvent::Error(_))) => {}
            other => panic!("expected error, got {other:?}"),
        }
        assert!(
            timeout(Duration::from_secs(1), subscription.next())
                .await
                .unwrap()
                .is_none()
        );
    }

    #[tokio::test]
    async fn rejected_collection_refuses_subscriptions() {
        let store = MemoryDocumentStore::new();
        store.reject_subscriptions(players(), "permission denied");
        assert!(store.subscribe(players(), "rank").await.is_err());

        store.accept_subscriptions(players());
        let mut subscription = store.subscribe(players(), "rank").await.unwrap();
        assert!(next_snapshot(&mut subscription).await.is_empty());
    }

    #[test]
    fn values_order_numbers_before_missing() {
        let one = json!(1);
        let two = json!(2.5);
        assert_eq!(compare_values(Some(&one), Some(&two)), Ordering::Less);
        assert_eq!(compare_values(None, Some(&one)), Ordering::Greater);
    }
}
