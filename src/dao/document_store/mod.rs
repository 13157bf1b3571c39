pub mod memory;
#[cfg(feature = "mongo-store")]
pub mod mongodb;

use std::fmt;

use futures::future::BoxFuture;
use serde_json::{Map, Value};
use tokio::{sync::mpsc, task::JoinHandle};

use crate::dao::storage::{StorageError, StorageResult};

/// Field map of a stored document, keyed by top-level field name.
pub type Fields = Map<String, Value>;

/// Number of snapshots buffered between a backend forwarder and its consumer.
pub(crate) const SNAPSHOT_BUFFER: usize = 8;

/// Collections living under each year partition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CollectionKind {
    Players,
    Matches,
}

impl CollectionKind {
    /// Name of the collection inside a year partition.
    pub fn name(self) -> &'static str {
        match self {
            CollectionKind::Players => "players",
            CollectionKind::Matches => "matches",
        }
    }
}

/// Address of a year-scoped collection (`years/<year>/<collection>`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CollectionPath {
    pub year: i32,
    pub kind: CollectionKind,
}

impl CollectionPath {
    pub fn new(year: i32, kind: CollectionKind) -> Self {
        Self { year, kind }
    }

    /// Address a single document of this collection.
    pub fn document(self, id: impl Into<String>) -> DocumentPath {
        DocumentPath {
            collection: self,
            id: id.into(),
        }
    }
}

impl fmt::Display for CollectionPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "years/{}/{}", self.year, self.kind.name())
    }
}

/// Address of a single document.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DocumentPath {
    pub collection: CollectionPath,
    pub id: String,
}

impl fmt::Display for DocumentPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.collection, self.id)
    }
}

/// A document as delivered in a collection snapshot.
#[derive(Debug, Clone, PartialEq)]
pub struct RawDocument {
    pub id: String,
    pub fields: Fields,
}

/// Path to a (possibly nested) field, e.g. `availability` → `<player id>`.
///
/// Segments are validated on construction so backends can render them as
/// dotted paths without escaping.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldPath(Vec<String>);

impl FieldPath {
    /// Path to a top-level field.
    pub fn field(name: &str) -> StorageResult<Self> {
        validate_segment(name)?;
        Ok(Self(vec![name.to_owned()]))
    }

    /// Path to a single key of a top-level map field.
    pub fn nested(field: &str, key: &str) -> StorageResult<Self> {
        validate_segment(field)?;
        validate_segment(key)?;
        Ok(Self(vec![field.to_owned(), key.to_owned()]))
    }

    pub fn segments(&self) -> &[String] {
        &self.0
    }

    /// Render the path in dotted notation (`mvpVotes.<id>`).
    pub fn dotted(&self) -> String {
        self.0.join(".")
    }
}

impl fmt::Display for FieldPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.dotted())
    }
}

fn validate_segment(segment: &str) -> StorageResult<()> {
    if segment.is_empty() || segment.contains('.') || segment.starts_with('$') {
        return Err(StorageError::InvalidFieldPath {
            segment: segment.to_owned(),
        });
    }
    Ok(())
}

/// A single field-path write; siblings of the addressed key are left untouched.
#[derive(Debug, Clone, PartialEq)]
pub struct FieldUpdate {
    pub path: FieldPath,
    pub value: Value,
}

impl FieldUpdate {
    pub fn new(path: FieldPath, value: impl Into<Value>) -> Self {
        Self {
            path,
            value: value.into(),
        }
    }
}

/// Last snapshot handed to a subscriber, so polling backends only deliver changes.
#[cfg_attr(not(feature = "mongo-store"), allow(dead_code))]
#[derive(Debug, Default)]
pub(crate) struct LastSnapshot(Option<Vec<RawDocument>>);

#[cfg_attr(not(feature = "mongo-store"), allow(dead_code))]
impl LastSnapshot {
    /// Remember `documents` and return whether they differ from the previous delivery.
    pub(crate) fn update(&mut self, documents: &[RawDocument]) -> bool {
        if self.0.as_deref() == Some(documents) {
            return false;
        }
        self.0 = Some(documents.to_vec());
        true
    }
}

/// Item delivered on a collection subscription.
#[derive(Debug)]
pub enum SnapshotEvent {
    /// Full, ordered materialization of the collection.
    Snapshot(Vec<RawDocument>),
    /// The subscription failed; no further events follow.
    Error(StorageError),
}

/// Live subscription to a collection.
///
/// Dropping the subscription (or calling [`Subscription::unsubscribe`]) stops the
/// backend forwarder, after which no further snapshot is delivered.
pub struct Subscription {
    receiver: mpsc::Receiver<SnapshotEvent>,
    forwarder: JoinHandle<()>,
}

impl Subscription {
    pub(crate) fn new(receiver: mpsc::Receiver<SnapshotEvent>, forwarder: JoinHandle<()>) -> Self {
        Self {
            receiver,
            forwarder,
        }
    }

    /// Wait for the next snapshot or error. `None` once the stream is closed.
    pub async fn next(&mut self) -> Option<SnapshotEvent> {
        self.receiver.recv().await
    }

    /// Close the subscription explicitly.
    pub fn unsubscribe(self) {
        drop(self);
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.receiver.close();
        self.forwarder.abort();
    }
}

/// Persistence capability consumed by the league store.
pub trait DocumentStore: Send + Sync {
    /// Subscribe to a collection ordered ascending by `order_by`.
    fn subscribe(
        &self,
        collection: CollectionPath,
        order_by: &'static str,
    ) -> BoxFuture<'static, StorageResult<Subscription>>;
    /// Insert a document and return the identifier assigned by the store.
    fn create(
        &self,
        collection: CollectionPath,
        fields: Fields,
    ) -> BoxFuture<'static, StorageResult<String>>;
    /// Apply field-path updates. Returns `false` when the document does not exist.
    fn update_fields(
        &self,
        document: DocumentPath,
        updates: Vec<FieldUpdate>,
    ) -> BoxFuture<'static, StorageResult<bool>>;
    /// Replace one top-level field wholesale. Returns `false` when the document does not exist.
    fn replace_field(
        &self,
        document: DocumentPath,
        field: &'static str,
        value: Value,
    ) -> BoxFuture<'static, StorageResult<bool>>;
    /// Atomically add `by` to a numeric field, treating a missing counter as zero.
    fn increment_field(
        &self,
        document: DocumentPath,
        path: FieldPath,
        by: i64,
    ) -> BoxFuture<'static, StorageResult<bool>>;
    /// Delete a document. Returns whether it existed.
    fn delete(&self, document: DocumentPath) -> BoxFuture<'static, StorageResult<bool>>;
    fn health_check(&self) -> BoxFuture<'static, StorageResult<()>>;
}
