//! Ondoku Core Library
//!
//! Data model and live synchronisation for a classroom reading-practice
//! log: page ranges, the evaluation column schema, entries, the passcode
//! gate and the engine that mirrors one identity's documents.

pub mod access;
pub mod error;
pub mod identity;
pub mod models;
pub mod prompt;
pub mod store;
pub mod sync;

pub use access::{AccessGate, AccessGrant, AccessState, MemorySessionStore, SessionStore};
pub use error::{AuthError, StoreError, SyncError, SyncResult, ValidationError};
pub use identity::{Credentials, Identity, IdentityProvider};
pub use models::{
    Column, ColumnSchema, ColumnType, Entry, EntryField, EntryId, FieldValue, Mark, PageRange,
    SignField,
};
pub use prompt::{Confirmation, Notice, Prompt, WriteAction};
pub use store::{DocumentStore, FileStore, Partition};
pub use sync::{Delivery, SyncEngine};

pub fn version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version() {
        assert!(!version().is_empty());
    }
}
