//! User-facing side channel: yes/no confirmations before destructive
//! operations and notices for failures that happen after an operation has
//! already returned.

use std::fmt;

use crate::models::EntryId;

/// A destructive action waiting for the user's go-ahead.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Confirmation {
    DeleteEntry(EntryId),
    ResetAll { count: usize },
    RemoveColumn { id: String, title: String },
}

impl fmt::Display for Confirmation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Confirmation::DeleteEntry(id) => write!(f, "Delete entry {}?", id),
            Confirmation::ResetAll { count } => {
                write!(f, "Delete all {} entries? This cannot be undone.", count)
            }
            Confirmation::RemoveColumn { id, title } => {
                write!(f, "Remove column '{}' ({})? Existing values are kept but hidden.", title, id)
            }
        }
    }
}

/// Which mutation a write belonged to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WriteAction {
    SaveColumns,
    CreateEntry(EntryId),
    UpdateEntry { id: EntryId, field: String },
    DeleteEntry(EntryId),
    ResetAll { deleted: usize, total: usize },
}

impl fmt::Display for WriteAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WriteAction::SaveColumns => write!(f, "saving columns"),
            WriteAction::CreateEntry(id) => write!(f, "creating entry {}", id),
            WriteAction::UpdateEntry { id, field } => {
                write!(f, "updating '{}' on entry {}", field, id)
            }
            WriteAction::DeleteEntry(id) => write!(f, "deleting entry {}", id),
            WriteAction::ResetAll { deleted, total } => {
                write!(f, "resetting entries ({} of {} deleted)", deleted, total)
            }
        }
    }
}

/// Something the user should hear about.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Notice {
    WriteFailed { action: WriteAction, error: String },
}

impl fmt::Display for Notice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Notice::WriteFailed { action, error } => {
                write!(f, "Failed while {}: {}", action, error)
            }
        }
    }
}

pub trait Prompt: Send + Sync {
    /// Blocks until the user answers.
    fn confirm(&self, request: &Confirmation) -> bool;

    fn notify(&self, notice: &Notice);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_notice_message() {
        let notice = Notice::WriteFailed {
            action: WriteAction::ResetAll {
                deleted: 2,
                total: 5,
            },
            error: "disk full".to_string(),
        };
        assert_eq!(
            notice.to_string(),
            "Failed while resetting entries (2 of 5 deleted): disk full"
        );
    }

    #[test]
    fn test_confirmation_names_target() {
        let request = Confirmation::RemoveColumn {
            id: "eval2".to_string(),
            title: "気持ち".to_string(),
        };
        assert!(request.to_string().contains("気持ち"));
    }
}
