//! Directory-backed document store.
//!
//! ```text
//! <ROOT>/
//!   users/<identity-id>/
//!     settings/columns.json
//!     entries/<entry-id>.json
//! ```
//!
//! Writes go through a temporary file and a rename so readers never see a
//! half-written document. All writes are serialised by one lock, which is
//! what keeps concurrent field patches on the same document from
//! overwriting each other.

use async_trait::async_trait;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use tokio::sync::Mutex;
use uuid::Uuid;

use super::hub::SubscriptionHub;
use super::{
    CollectionPath, CollectionSnapshot, Document, DocumentPath, DocumentSnapshot, DocumentStore,
    Subscription,
};
use crate::error::StoreError;

const EXTENSION: &str = "json";

pub struct FileStore {
    root: PathBuf,
    write_lock: Mutex<()>,
    documents: SubscriptionHub<DocumentPath, DocumentSnapshot>,
    collections: SubscriptionHub<CollectionPath, CollectionSnapshot>,
}

impl FileStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            write_lock: Mutex::new(()),
            documents: SubscriptionHub::new(),
            collections: SubscriptionHub::new(),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn collection_dir(&self, path: &CollectionPath) -> PathBuf {
        path.segments()
            .iter()
            .fold(self.root.clone(), |dir, segment| dir.join(segment))
    }

    fn document_file(&self, path: &DocumentPath) -> PathBuf {
        self.collection_dir(path.collection())
            .join(format!("{}.{}", path.id(), EXTENSION))
    }

    fn read_document(&self, path: &DocumentPath) -> Result<Option<Document>, StoreError> {
        let file = self.document_file(path);
        let bytes = match fs::read(&file) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(StoreError::Io { path: file, source: e }),
        };

        serde_json::from_slice(&bytes)
            .map(Some)
            .map_err(|e| StoreError::Malformed {
                path: path.to_string(),
                source: e,
            })
    }

    fn write_document(&self, path: &DocumentPath, data: &Document) -> Result<(), StoreError> {
        let dir = self.collection_dir(path.collection());
        fs::create_dir_all(&dir).map_err(|e| StoreError::Io {
            path: dir.clone(),
            source: e,
        })?;

        let bytes = serde_json::to_vec_pretty(data).map_err(|e| StoreError::Malformed {
            path: path.to_string(),
            source: e,
        })?;

        let file = self.document_file(path);
        let temp = dir.join(format!(".{}.{}.tmp", path.id(), Uuid::new_v4()));
        fs::write(&temp, &bytes).map_err(|e| StoreError::Io {
            path: temp.clone(),
            source: e,
        })?;
        fs::rename(&temp, &file).map_err(|e| {
            let _ = fs::remove_file(&temp);
            StoreError::Io {
                path: file.clone(),
                source: e,
            }
        })
    }

    fn remove_document(&self, path: &DocumentPath) -> Result<(), StoreError> {
        let file = self.document_file(path);
        match fs::remove_file(&file) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(StoreError::Io { path: file, source: e }),
        }
    }

    fn read_collection(&self, path: &CollectionPath) -> Result<Vec<(String, Document)>, StoreError> {
        let dir = self.collection_dir(path);
        let listing = match fs::read_dir(&dir) {
            Ok(listing) => listing,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(StoreError::Io { path: dir, source: e }),
        };

        let mut documents = Vec::new();
        for item in listing {
            let item = item.map_err(|e| StoreError::Io {
                path: dir.clone(),
                source: e,
            })?;
            let file = item.path();
            if file.extension().and_then(|ext| ext.to_str()) != Some(EXTENSION) {
                continue;
            }
            let Some(id) = file.file_stem().and_then(|stem| stem.to_str()) else {
                continue;
            };
            if id.starts_with('.') {
                continue;
            }

            let doc_path = path.doc(id)?;
            match self.read_document(&doc_path) {
                Ok(Some(data)) => documents.push((id.to_string(), data)),
                Ok(None) => {}
                Err(e) => tracing::warn!("Skipping unreadable document {}: {}", doc_path, e),
            }
        }

        Ok(documents)
    }

    /// Pushes fresh snapshots to whoever watches `path` or its collection.
    async fn announce(&self, path: &DocumentPath) {
        if self.documents.is_watched(path).await {
            match self.read_document(path) {
                Ok(data) => {
                    let snapshot = DocumentSnapshot {
                        path: path.clone(),
                        data,
                    };
                    self.documents.publish(path, snapshot).await;
                }
                Err(e) => tracing::warn!("Cannot announce {}: {}", path, e),
            }
        }

        let collection = path.collection();
        if self.collections.is_watched(collection).await {
            match self.read_collection(collection) {
                Ok(documents) => {
                    let snapshot = CollectionSnapshot {
                        path: collection.clone(),
                        documents,
                    };
                    self.collections.publish(collection, snapshot).await;
                }
                Err(e) => tracing::warn!("Cannot announce {}: {}", collection, e),
            }
        }
    }
}

#[async_trait]
impl DocumentStore for FileStore {
    async fn get(&self, path: &DocumentPath) -> Result<Option<Document>, StoreError> {
        self.read_document(path)
    }

    async fn set(&self, path: &DocumentPath, data: Document) -> Result<(), StoreError> {
        let _guard = self.write_lock.lock().await;
        self.write_document(path, &data)?;
        tracing::debug!("set {}", path);
        self.announce(path).await;
        Ok(())
    }

    async fn update(&self, path: &DocumentPath, fields: Document) -> Result<(), StoreError> {
        let _guard = self.write_lock.lock().await;
        let mut data = self
            .read_document(path)?
            .ok_or_else(|| StoreError::NotFound(path.to_string()))?;
        data.extend(fields);
        self.write_document(path, &data)?;
        tracing::debug!("update {}", path);
        self.announce(path).await;
        Ok(())
    }

    async fn delete(&self, path: &DocumentPath) -> Result<(), StoreError> {
        let _guard = self.write_lock.lock().await;
        self.remove_document(path)?;
        tracing::debug!("delete {}", path);
        self.announce(path).await;
        Ok(())
    }

    async fn watch_document(
        &self,
        path: &DocumentPath,
    ) -> Result<Subscription<DocumentSnapshot>, StoreError> {
        // Subscribe before reading so no write can fall between the two.
        let updates = self.documents.subscribe(path).await;
        let initial = DocumentSnapshot {
            path: path.clone(),
            data: self.read_document(path)?,
        };
        Ok(Subscription { initial, updates })
    }

    async fn watch_collection(
        &self,
        path: &CollectionPath,
    ) -> Result<Subscription<CollectionSnapshot>, StoreError> {
        let updates = self.collections.subscribe(path).await;
        let initial = CollectionSnapshot {
            path: path.clone(),
            documents: self.read_collection(path)?,
        };
        Ok(Subscription { initial, updates })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::Partition;
    use serde_json::{json, Value};
    use tempfile::TempDir;

    fn doc(value: Value) -> Document {
        match value {
            Value::Object(map) => map,
            _ => panic!("not an object"),
        }
    }

    fn setup() -> (FileStore, Partition, TempDir) {
        let temp_dir = TempDir::new().unwrap();
        let store = FileStore::new(temp_dir.path());
        let partition = Partition::new("user1").unwrap();
        (store, partition, temp_dir)
    }

    #[tokio::test]
    async fn test_set_and_get() {
        let (store, partition, temp) = setup();
        let path = partition.columns();

        store.set(&path, doc(json!({ "data": [] }))).await.unwrap();

        let loaded = store.get(&path).await.unwrap().unwrap();
        assert_eq!(loaded["data"], json!([]));
        assert!(temp
            .path()
            .join("users/user1/settings/columns.json")
            .exists());
    }

    #[tokio::test]
    async fn test_get_missing_is_none() {
        let (store, partition, _temp) = setup();
        assert!(store.get(&partition.columns()).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_update_merges_fields() {
        let (store, partition, _temp) = setup();
        let path = partition.entries().doc("1").unwrap();
        store
            .set(&path, doc(json!({ "page": "", "parentSign": false })))
            .await
            .unwrap();

        store
            .update(&path, doc(json!({ "page": "P.2" })))
            .await
            .unwrap();

        let loaded = store.get(&path).await.unwrap().unwrap();
        assert_eq!(loaded["page"], json!("P.2"));
        assert_eq!(loaded["parentSign"], json!(false));
    }

    #[tokio::test]
    async fn test_update_missing_fails() {
        let (store, partition, _temp) = setup();
        let path = partition.entries().doc("404").unwrap();
        let result = store.update(&path, doc(json!({ "page": "P.1" }))).await;
        assert!(matches!(result, Err(StoreError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_delete_is_idempotent() {
        let (store, partition, _temp) = setup();
        let path = partition.entries().doc("1").unwrap();
        store.set(&path, doc(json!({}))).await.unwrap();

        store.delete(&path).await.unwrap();
        store.delete(&path).await.unwrap();
        assert!(store.get(&path).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_watch_collection_delivers_full_state() {
        let (store, partition, _temp) = setup();
        let entries = partition.entries();
        store
            .set(&entries.doc("1").unwrap(), doc(json!({ "page": "" })))
            .await
            .unwrap();

        let mut subscription = store.watch_collection(&entries).await.unwrap();
        assert_eq!(subscription.initial.documents.len(), 1);

        store
            .set(&entries.doc("2").unwrap(), doc(json!({ "page": "" })))
            .await
            .unwrap();

        let snapshot = subscription.updates.recv().await.unwrap();
        let mut ids: Vec<String> = snapshot.documents.into_iter().map(|(id, _)| id).collect();
        ids.sort();
        assert_eq!(ids, vec!["1", "2"]);
    }

    #[tokio::test]
    async fn test_watch_document_sees_creation() {
        let (store, partition, _temp) = setup();
        let path = partition.columns();
        let mut subscription = store.watch_document(&path).await.unwrap();
        assert!(subscription.initial.data.is_none());

        store.set(&path, doc(json!({ "data": [] }))).await.unwrap();

        let snapshot = subscription.updates.recv().await.unwrap();
        assert!(snapshot.data.is_some());
    }

    #[tokio::test]
    async fn test_partitions_are_isolated() {
        let (store, partition, _temp) = setup();
        let other = Partition::new("user2").unwrap();
        let mut subscription = store.watch_collection(&other.entries()).await.unwrap();

        store
            .set(&partition.entries().doc("1").unwrap(), doc(json!({})))
            .await
            .unwrap();

        assert!(subscription.initial.documents.is_empty());
        assert!(subscription.updates.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_malformed_documents_skipped_in_collection() {
        let (store, partition, temp) = setup();
        let entries = partition.entries();
        store
            .set(&entries.doc("1").unwrap(), doc(json!({})))
            .await
            .unwrap();
        std::fs::write(temp.path().join("users/user1/entries/2.json"), b"{ nope").unwrap();

        let subscription = store.watch_collection(&entries).await.unwrap();
        assert_eq!(subscription.initial.documents.len(), 1);
    }
}
