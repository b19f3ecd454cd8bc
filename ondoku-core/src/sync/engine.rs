//! Live mirror of one identity's partition.
//!
//! The engine keeps the column schema and the entry list of the signed-in
//! identity in memory. Mutations apply locally first and hand the store
//! call to a spawned task; the next snapshot from the store always wins.

use serde_json::Value;
use std::future::Future;
use std::sync::Arc;
use tokio::sync::broadcast::{
    self,
    error::{RecvError, TryRecvError},
};
use tokio::sync::watch;
use tokio::task::JoinError;

use super::pending::{Collection, PendingKey, PendingWrites};
use super::session::{SessionContext, WriteReport};
use crate::access::AccessGrant;
use crate::error::{StoreError, SyncError, SyncResult, ValidationError};
use crate::identity::Identity;
use crate::models::{ColumnSchema, Entry, EntryField, EntryId, PageRange, SignField};
use crate::prompt::{Confirmation, Notice, Prompt, WriteAction};
use crate::store::{
    CollectionSnapshot, Document, DocumentPath, DocumentSnapshot, DocumentStore, Partition,
};

/// What [`SyncEngine::next_event`] just applied.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Delivery {
    Columns,
    Entries,
    Written(WriteAction),
    Failed(WriteAction),
    Lagged(Collection),
    Closed(Collection),
    /// A write task panicked or was cancelled.
    Aborted,
}

enum Event {
    Columns(Result<DocumentSnapshot, RecvError>),
    Entries(Result<CollectionSnapshot, RecvError>),
    Write(Result<WriteReport, JoinError>),
}

enum Wake {
    Identity(bool),
    Delivery(Option<Delivery>),
}

async fn recv<T: Clone>(receiver: &mut Option<broadcast::Receiver<T>>) -> Result<T, RecvError> {
    match receiver {
        Some(receiver) => receiver.recv().await,
        None => std::future::pending().await,
    }
}

fn try_recv<T: Clone>(
    receiver: &mut Option<broadcast::Receiver<T>>,
) -> Option<Result<T, RecvError>> {
    match receiver.as_mut()?.try_recv() {
        Ok(value) => Some(Ok(value)),
        Err(TryRecvError::Empty) => None,
        Err(TryRecvError::Lagged(skipped)) => Some(Err(RecvError::Lagged(skipped))),
        Err(TryRecvError::Closed) => Some(Err(RecvError::Closed)),
    }
}

pub struct SyncEngine {
    store: Arc<dyn DocumentStore>,
    prompt: Arc<dyn Prompt>,
    schema: ColumnSchema,
    entries: Vec<Entry>,
    pending: PendingWrites,
    session: Option<SessionContext>,
}

impl SyncEngine {
    pub fn new(store: Arc<dyn DocumentStore>, prompt: Arc<dyn Prompt>) -> Self {
        Self {
            store,
            prompt,
            schema: ColumnSchema::builtin(),
            entries: Vec::new(),
            pending: PendingWrites::new(),
            session: None,
        }
    }

    pub fn schema(&self) -> &ColumnSchema {
        &self.schema
    }

    /// Mirrored entries, newest id first.
    pub fn entries(&self) -> &[Entry] {
        &self.entries
    }

    pub fn entry(&self, id: &EntryId) -> Option<&Entry> {
        self.entries.iter().find(|entry| &entry.id == id)
    }

    pub fn identity(&self) -> Option<&Identity> {
        self.session.as_ref().map(|session| &session.identity)
    }

    pub fn is_active(&self) -> bool {
        self.session.is_some()
    }

    /// Store calls handed off but not yet completed.
    pub fn in_flight(&self) -> usize {
        self.session
            .as_ref()
            .map(|session| session.writes.len())
            .unwrap_or(0)
    }

    /// Whether a local change to this entry is still unconfirmed.
    pub fn is_saving(&self, id: &EntryId) -> bool {
        self.pending.touches_entry(id)
    }

    pub fn is_saving_schema(&self) -> bool {
        self.pending.is_pending(&PendingKey::Schema)
    }

    /// Starts, switches or ends the session. Announcing the identity that
    /// is already active does nothing.
    pub async fn on_identity_change(
        &mut self,
        _grant: &AccessGrant,
        identity: Option<Identity>,
    ) -> SyncResult<()> {
        let Some(identity) = identity else {
            if let Some(session) = self.session.take() {
                tracing::info!("Signed out {}", session.identity.email);
            }
            self.reset_local();
            return Ok(());
        };

        if self.identity().map(|current| current.id == identity.id) == Some(true) {
            return Ok(());
        }

        self.session = None;
        self.reset_local();

        let partition = Partition::new(identity.id.as_str())?;
        let columns = self.store.watch_document(&partition.columns()).await?;
        let entries = self.store.watch_collection(&partition.entries()).await?;

        tracing::info!("Signed in {} ({})", identity.email, identity.id);
        self.session = Some(SessionContext::new(
            identity,
            partition,
            columns.updates,
            entries.updates,
        ));
        self.apply_columns(columns.initial.data);
        self.apply_entries(entries.initial.documents);
        Ok(())
    }

    /// Applies a pending identity change without waiting for one.
    pub async fn follow_identity(
        &mut self,
        grant: &AccessGrant,
        changes: &mut watch::Receiver<Option<Identity>>,
    ) -> SyncResult<bool> {
        if !changes.has_changed().unwrap_or(false) {
            return Ok(false);
        }
        let identity = changes.borrow_and_update().clone();
        self.on_identity_change(grant, identity).await?;
        Ok(true)
    }

    /// Runs until the identity provider goes away, following sign-in and
    /// sign-out and applying every delivery in between.
    pub async fn drive(
        &mut self,
        grant: &AccessGrant,
        changes: &mut watch::Receiver<Option<Identity>>,
    ) -> SyncResult<()> {
        let identity = changes.borrow_and_update().clone();
        self.on_identity_change(grant, identity).await?;

        loop {
            let wake = tokio::select! {
                changed = changes.changed() => Wake::Identity(changed.is_ok()),
                delivery = self.next_event() => Wake::Delivery(delivery),
            };

            match wake {
                Wake::Identity(false) => return Ok(()),
                Wake::Delivery(Some(_)) => continue,
                Wake::Identity(true) => {}
                Wake::Delivery(None) => {
                    if changes.changed().await.is_err() {
                        return Ok(());
                    }
                }
            }

            let identity = changes.borrow_and_update().clone();
            self.on_identity_change(grant, identity).await?;
        }
    }

    /// Waits for the next snapshot or write completion and applies it.
    /// Returns `None` when signed out or when nothing can arrive any more.
    pub async fn next_event(&mut self) -> Option<Delivery> {
        let session = self.session.as_mut()?;
        if session.is_idle() {
            return None;
        }

        let event = tokio::select! {
            biased;
            result = recv(&mut session.columns), if session.columns.is_some() => Event::Columns(result),
            result = recv(&mut session.entries), if session.entries.is_some() => Event::Entries(result),
            Some(joined) = session.writes.join_next(), if !session.writes.is_empty() => Event::Write(joined),
            else => return None,
        };

        Some(self.apply(event))
    }

    /// Processes deliveries until no write is in flight and no snapshot is
    /// queued.
    pub async fn settle(&mut self) {
        loop {
            self.drain_snapshots();
            if self.in_flight() == 0 {
                return;
            }
            if self.next_event().await.is_none() {
                return;
            }
        }
    }

    fn drain_snapshots(&mut self) {
        loop {
            let Some(session) = self.session.as_mut() else {
                return;
            };
            let event = if let Some(result) = try_recv(&mut session.columns) {
                Event::Columns(result)
            } else if let Some(result) = try_recv(&mut session.entries) {
                Event::Entries(result)
            } else {
                return;
            };
            self.apply(event);
        }
    }

    fn apply(&mut self, event: Event) -> Delivery {
        match event {
            Event::Columns(Ok(snapshot)) => {
                self.apply_columns(snapshot.data);
                Delivery::Columns
            }
            Event::Entries(Ok(snapshot)) => {
                self.apply_entries(snapshot.documents);
                Delivery::Entries
            }
            Event::Columns(Err(e)) => self.interrupted(Collection::Columns, e),
            Event::Entries(Err(e)) => self.interrupted(Collection::Entries, e),
            Event::Write(joined) => self.apply_write(joined),
        }
    }

    fn interrupted(&mut self, collection: Collection, error: RecvError) -> Delivery {
        match error {
            RecvError::Lagged(skipped) => {
                tracing::warn!(
                    "{:?} subscription skipped {} snapshots, waiting for the next one",
                    collection,
                    skipped
                );
                Delivery::Lagged(collection)
            }
            RecvError::Closed => {
                tracing::warn!("{:?} subscription closed by the store", collection);
                if let Some(session) = self.session.as_mut() {
                    match collection {
                        Collection::Columns => session.columns = None,
                        Collection::Entries => session.entries = None,
                    }
                }
                Delivery::Closed(collection)
            }
        }
    }

    fn apply_columns(&mut self, data: Option<Document>) {
        self.pending.clear(Collection::Columns);

        let Some(document) = data else {
            self.schema = ColumnSchema::builtin();
            let first = self
                .session
                .as_mut()
                .map(|session| !std::mem::replace(&mut session.seeded, true))
                .unwrap_or(false);
            if first {
                tracing::info!("No columns document yet, writing the defaults");
                if let Err(e) = self.replace_schema(ColumnSchema::builtin()) {
                    tracing::warn!("Could not write default columns: {}", e);
                }
            }
            return;
        };

        match ColumnSchema::from_document(document) {
            Ok(schema) => self.schema = schema,
            Err(e) => tracing::warn!("Keeping current columns, stored document is unusable: {}", e),
        }
    }

    fn apply_entries(&mut self, documents: Vec<(String, Document)>) {
        self.pending.clear(Collection::Entries);

        self.entries = documents
            .into_iter()
            .map(|(id, document)| Entry::from_document(EntryId::new(id), document))
            .collect();
        self.sort_entries();
    }

    fn apply_write(&mut self, joined: Result<WriteReport, JoinError>) -> Delivery {
        let report = match joined {
            Ok(report) => report,
            Err(e) => {
                tracing::error!("Write task did not finish: {}", e);
                return Delivery::Aborted;
            }
        };

        for (key, id) in &report.writes {
            self.pending.finish(key, *id);
        }

        match report.result {
            Ok(()) => {
                tracing::debug!("Finished {}", report.action);
                Delivery::Written(report.action)
            }
            Err(e) => {
                tracing::error!("Failed while {}: {}", report.action, e);
                self.prompt.notify(&Notice::WriteFailed {
                    action: report.action.clone(),
                    error: e.to_string(),
                });
                Delivery::Failed(report.action)
            }
        }
    }

    fn reset_local(&mut self) {
        self.schema = ColumnSchema::builtin();
        self.entries.clear();
        self.pending.clear_all();
    }

    fn sort_entries(&mut self) {
        self.entries.sort_by(|a, b| b.id.cmp(&a.id));
    }

    fn active(&self) -> SyncResult<&SessionContext> {
        self.session.as_ref().ok_or(SyncError::NotSignedIn)
    }

    fn spawn_write<F, Fut>(&mut self, keys: Vec<PendingKey>, write: F) -> SyncResult<()>
    where
        F: FnOnce(Arc<dyn DocumentStore>) -> Fut,
        Fut: Future<Output = (WriteAction, Result<(), StoreError>)> + Send + 'static,
    {
        let session = self.session.as_mut().ok_or(SyncError::NotSignedIn)?;
        let writes: Vec<_> = keys
            .into_iter()
            .map(|key| {
                let id = self.pending.record(key.clone());
                (key, id)
            })
            .collect();

        let task = write(Arc::clone(&self.store));
        session.writes.spawn(async move {
            let (action, result) = task.await;
            WriteReport {
                writes,
                action,
                result,
            }
        });
        Ok(())
    }

    fn replace_schema(&mut self, schema: ColumnSchema) -> SyncResult<()> {
        let path = self.active()?.partition.columns();
        let document = schema.to_document();
        self.schema = schema;
        self.spawn_write(vec![PendingKey::Schema], move |store| async move {
            (WriteAction::SaveColumns, store.set(&path, document).await)
        })
    }

    /// Creates today's entry with a default value for every column.
    pub fn add_entry(&mut self) -> SyncResult<EntryId> {
        let partition = self.active()?.partition.clone();
        let entry = Entry::new(&self.schema);
        let id = entry.id.clone();
        let path = partition.entry(&id)?;
        let document = entry.to_document();

        self.entries.push(entry);
        self.sort_entries();

        let action = WriteAction::CreateEntry(id.clone());
        self.spawn_write(vec![PendingKey::Entry(id.clone())], move |store| async move {
            (action, store.set(&path, document).await)
        })?;
        tracing::info!("Created entry {}", id);
        Ok(id)
    }

    /// Patches a single field of an entry. Page text is stored in canonical
    /// form; column values must fit their column.
    pub fn update_entry(&mut self, id: &EntryId, mut field: EntryField) -> SyncResult<()> {
        let path = self.active()?.partition.entry(id)?;

        match &mut field {
            EntryField::Page(text) => *text = PageRange::decode(text).encode(),
            EntryField::Column(column_id, value) => {
                let column = self
                    .schema
                    .get(column_id)
                    .ok_or_else(|| ValidationError::invalid(column_id.as_str(), "no such column"))?;
                column.validate(value)?;
            }
            EntryField::Date(_) | EntryField::Sign(..) => {}
        }

        let entry = self
            .entries
            .iter_mut()
            .find(|entry| &entry.id == id)
            .ok_or_else(|| SyncError::UnknownEntry(id.clone()))?;
        entry.apply(&field);

        let key = field.key().to_string();
        let mut patch = Document::new();
        patch.insert(key.clone(), field.value());

        let action = WriteAction::UpdateEntry {
            id: id.clone(),
            field: key.clone(),
        };
        self.spawn_write(
            vec![PendingKey::EntryField(id.clone(), key)],
            move |store| async move { (action, store.update(&path, patch).await) },
        )
    }

    /// Flips a sign stamp relative to the value the caller last saw.
    pub fn toggle_sign(&mut self, id: &EntryId, sign: SignField, current: bool) -> SyncResult<()> {
        self.update_entry(id, EntryField::Sign(sign, !current))
    }

    /// Deletes one entry after confirmation. Returns `false` if declined.
    pub fn delete_entry(&mut self, id: &EntryId) -> SyncResult<bool> {
        let path = self.active()?.partition.entry(id)?;
        if !self.prompt.confirm(&Confirmation::DeleteEntry(id.clone())) {
            return Ok(false);
        }

        self.entries.retain(|entry| &entry.id != id);

        let action = WriteAction::DeleteEntry(id.clone());
        self.spawn_write(vec![PendingKey::Entry(id.clone())], move |store| async move {
            (action, store.delete(&path).await)
        })?;
        tracing::info!("Deleted entry {}", id);
        Ok(true)
    }

    /// Deletes every mirrored entry, one at a time, after confirmation.
    /// The first failure stops the run; entries already deleted stay
    /// deleted and nothing is retried.
    pub fn reset_all(&mut self) -> SyncResult<bool> {
        let partition = self.active()?.partition.clone();
        let targets = self
            .entries
            .iter()
            .map(|entry| Ok((entry.id.clone(), partition.entry(&entry.id)?)))
            .collect::<Result<Vec<(EntryId, DocumentPath)>, StoreError>>()?;

        let request = Confirmation::ResetAll {
            count: targets.len(),
        };
        if !self.prompt.confirm(&request) {
            return Ok(false);
        }

        self.entries.clear();

        let (ids, paths): (Vec<EntryId>, Vec<DocumentPath>) = targets.into_iter().unzip();
        let keys = ids.into_iter().map(PendingKey::Entry).collect();
        self.spawn_write(keys, move |store| async move {
            let total = paths.len();
            for (deleted, path) in paths.iter().enumerate() {
                if let Err(e) = store.delete(path).await {
                    return (WriteAction::ResetAll { deleted, total }, Err(e));
                }
            }
            (
                WriteAction::ResetAll {
                    deleted: total,
                    total,
                },
                Ok(()),
            )
        })?;
        Ok(true)
    }

    /// Appends a new select column and returns its id.
    pub fn add_column(&mut self) -> SyncResult<String> {
        self.active()?;
        let schema = self.schema.add_column();
        let id = schema
            .columns()
            .last()
            .map(|column| column.id.clone())
            .unwrap_or_default();
        self.replace_schema(schema)?;
        Ok(id)
    }

    /// Removes a column after confirmation. Removing the last column fails
    /// before the user is asked. Returns `false` if declined or unknown.
    pub fn remove_column(&mut self, id: &str) -> SyncResult<bool> {
        self.active()?;
        let Some(column) = self.schema.get(id) else {
            return Ok(false);
        };
        let request = Confirmation::RemoveColumn {
            id: column.id.clone(),
            title: column.title.clone(),
        };
        let schema = self.schema.remove_column(id)?;

        if !self.prompt.confirm(&request) {
            return Ok(false);
        }
        self.replace_schema(schema)?;
        Ok(true)
    }

    /// Sets one field of one column, e.g. `title` or `options.max`.
    pub fn update_column(&mut self, id: &str, path: &str, value: Value) -> SyncResult<()> {
        self.active()?;
        let schema = self.schema.update_field(id, path, value)?;
        if schema == self.schema {
            return Ok(());
        }
        self.replace_schema(schema)
    }
}
