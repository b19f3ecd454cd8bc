//! Document store seam.
//!
//! The sync engine talks to a schemaless document database through
//! [`DocumentStore`]: whole-document writes, single-field patches, deletes,
//! and live watches that deliver the full current state of a document or a
//! collection on every change. [`FileStore`] is the local implementation.

mod file;
mod hub;
mod path;

use async_trait::async_trait;
use serde_json::{Map, Value};
use tokio::sync::broadcast;

use crate::error::StoreError;

pub use file::FileStore;
pub use hub::SubscriptionHub;
pub use path::{CollectionPath, DocumentPath, Partition};

/// Body of a stored document.
pub type Document = Map<String, Value>;

/// Current state of one document. `data` is `None` when it does not exist.
#[derive(Debug, Clone)]
pub struct DocumentSnapshot {
    pub path: DocumentPath,
    pub data: Option<Document>,
}

/// Current state of every document in a collection, in no particular order.
#[derive(Debug, Clone)]
pub struct CollectionSnapshot {
    pub path: CollectionPath,
    pub documents: Vec<(String, Document)>,
}

/// A live watch: the state at subscription time plus every later state.
/// Dropping it unsubscribes.
#[derive(Debug)]
pub struct Subscription<T> {
    pub initial: T,
    pub updates: broadcast::Receiver<T>,
}

#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Reads a document.
    async fn get(&self, path: &DocumentPath) -> Result<Option<Document>, StoreError>;

    /// Creates or replaces a whole document.
    async fn set(&self, path: &DocumentPath, data: Document) -> Result<(), StoreError>;

    /// Merges `fields` into an existing document, leaving other keys as
    /// they are. Fails with [`StoreError::NotFound`] if the document is
    /// missing.
    async fn update(&self, path: &DocumentPath, fields: Document) -> Result<(), StoreError>;

    /// Deletes a document. Deleting a missing document succeeds.
    async fn delete(&self, path: &DocumentPath) -> Result<(), StoreError>;

    async fn watch_document(
        &self,
        path: &DocumentPath,
    ) -> Result<Subscription<DocumentSnapshot>, StoreError>;

    async fn watch_collection(
        &self,
        path: &CollectionPath,
    ) -> Result<Subscription<CollectionSnapshot>, StoreError>;
}
