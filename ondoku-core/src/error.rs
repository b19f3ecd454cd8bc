//! Error taxonomy shared by the models, the store and the sync engine.

use std::path::PathBuf;

use thiserror::Error;

use crate::models::EntryId;

/// Sign-in, sign-out and passcode failures.
#[derive(Error, Debug)]
pub enum AuthError {
    #[error("The passcode does not match")]
    WrongPasscode,

    #[error("Access is locked. Enter the class passcode first.")]
    Locked,

    #[error("Sign-in failed: {0}")]
    SignIn(String),

    #[error("Sign-out failed: {0}")]
    SignOut(String),
}

/// Rejections raised before any store call is made.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("At least one evaluation column is required")]
    LastColumn,

    #[error("A column schema cannot be empty")]
    EmptySchema,

    #[error("Invalid value for '{field}': {reason}")]
    InvalidValue { field: String, reason: String },

    #[error("Minimum {min} is greater than maximum {max}")]
    InvalidRange { min: i64, max: i64 },
}

impl ValidationError {
    pub(crate) fn invalid(field: impl Into<String>, reason: impl Into<String>) -> Self {
        ValidationError::InvalidValue {
            field: field.into(),
            reason: reason.into(),
        }
    }
}

/// Failures reported by a [`DocumentStore`](crate::store::DocumentStore).
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("I/O error for {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Malformed document {path}: {source}")]
    Malformed {
        path: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("Invalid path segment: {0:?}")]
    InvalidPath(String),

    #[error("Document not found: {0}")]
    NotFound(String),

    #[error("Write rejected by store: {0}")]
    Rejected(String),
}

/// Errors returned synchronously by [`SyncEngine`](crate::sync::SyncEngine)
/// operations. Store failures of fire-and-forget writes never show up here;
/// they are reported through [`Prompt::notify`](crate::prompt::Prompt::notify).
#[derive(Error, Debug)]
pub enum SyncError {
    #[error("Not signed in")]
    NotSignedIn,

    #[error("Entry not found: {0}")]
    UnknownEntry(EntryId),

    #[error(transparent)]
    Auth(#[from] AuthError),

    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error(transparent)]
    Store(#[from] StoreError),
}

pub type SyncResult<T> = Result<T, SyncError>;
