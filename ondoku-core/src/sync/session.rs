//! Everything that belongs to one signed-in identity.

use tokio::sync::broadcast;
use tokio::task::JoinSet;

use super::pending::{PendingKey, WriteId};
use crate::error::StoreError;
use crate::identity::Identity;
use crate::prompt::WriteAction;
use crate::store::{CollectionSnapshot, DocumentSnapshot, Partition};

/// Outcome of one spawned store call.
#[derive(Debug)]
pub(crate) struct WriteReport {
    pub writes: Vec<(PendingKey, WriteId)>,
    pub action: WriteAction,
    pub result: Result<(), StoreError>,
}

/// The active identity with its two live subscriptions and its in-flight
/// writes. Dropping the context unsubscribes; writes already handed to the
/// store are detached and still land.
pub(crate) struct SessionContext {
    pub identity: Identity,
    pub partition: Partition,
    pub columns: Option<broadcast::Receiver<DocumentSnapshot>>,
    pub entries: Option<broadcast::Receiver<CollectionSnapshot>>,
    pub writes: JoinSet<WriteReport>,
    /// Set once the default schema has been written for this session.
    pub seeded: bool,
}

impl SessionContext {
    pub fn new(
        identity: Identity,
        partition: Partition,
        columns: broadcast::Receiver<DocumentSnapshot>,
        entries: broadcast::Receiver<CollectionSnapshot>,
    ) -> Self {
        Self {
            identity,
            partition,
            columns: Some(columns),
            entries: Some(entries),
            writes: JoinSet::new(),
            seeded: false,
        }
    }

    /// Nothing left that could ever produce a delivery.
    pub fn is_idle(&self) -> bool {
        self.columns.is_none() && self.entries.is_none() && self.writes.is_empty()
    }
}

impl Drop for SessionContext {
    fn drop(&mut self) {
        if !self.writes.is_empty() {
            tracing::debug!(
                "Detaching {} in-flight writes for {}",
                self.writes.len(),
                self.identity.id
            );
        }
        self.writes.detach_all();
    }
}
