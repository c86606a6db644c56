//! Conflict types and resolution outcomes.

use crate::note::Note;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Marker substring carried in the title of every conflict copy.
pub const CONFLICT_COPY_MARKER: &str = "(conflict copy";

/// The kind of conflict between a local pending change and a remote change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ConflictKind {
    /// Both sides edited the document and the contents diverged.
    #[serde(rename = "edit")]
    Edit,
    /// Local edits are pending on a document deleted server-side.
    #[serde(rename = "delete-edit")]
    DeleteEdit,
}

/// A divergence between local and remote state that requires user action.
///
/// At most one conflict exists per document id at any time; recording a new
/// conflict for an id overwrites, never duplicates, the prior one.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Conflict {
    /// Document identifier.
    pub note_id: String,
    /// Kind of divergence.
    pub kind: ConflictKind,
    /// The local side, absent when the pending local change was a delete.
    pub local_note: Option<Note>,
    /// The remote side, absent when the remote change was a delete.
    pub remote_note: Option<Note>,
    /// Version the local side was based on.
    pub local_version: u64,
    /// Version held by the server.
    pub remote_version: u64,
    /// When the conflict was detected.
    pub detected_at: DateTime<Utc>,
}

/// Whole-document resolution strategy chosen by the user.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Resolution {
    /// The local version is re-affirmed as canonical and re-queued for push.
    KeepLocal,
    /// The remote version replaces local state; the pending entry is dropped.
    KeepRemote,
    /// The remote version becomes primary; the local version is preserved
    /// as a new document with a fresh identity.
    KeepBoth,
}

/// Outcome of resolving a conflict.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResolutionResult {
    /// The strategy that was applied.
    pub resolution: Resolution,
    /// The document now canonical under the original id, absent when a
    /// `KeepRemote` resolution of a delete-edit conflict removed it.
    pub resolved_note: Option<Note>,
    /// The conflict copy, present only for `KeepBoth`.
    pub copy_note: Option<Note>,
}

/// Derives the title of a conflict copy from the original title.
pub fn conflict_copy_title(original: &str, disambiguator: &str) -> String {
    format!("{original} {CONFLICT_COPY_MARKER} {disambiguator})")
}
