//! Keeps one identity's columns and entries mirrored from the document
//! store and pushes local edits back to it.

mod engine;
mod pending;
mod session;

pub use engine::{Delivery, SyncEngine};
pub use pending::{Collection, PendingKey, PendingWrites, WriteId};
