//! Change operations.

use serde::{Deserialize, Serialize};

/// The kind of change applied to a document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChangeOperation {
    /// Document was created.
    Create,
    /// Document was updated.
    Update,
    /// Document was deleted.
    Delete,
}

impl ChangeOperation {
    /// Returns true for create and update operations, which carry a
    /// document payload.
    pub fn carries_payload(&self) -> bool {
        matches!(self, ChangeOperation::Create | ChangeOperation::Update)
    }

    /// Returns true for delete operations.
    pub fn is_delete(&self) -> bool {
        matches!(self, ChangeOperation::Delete)
    }
}
