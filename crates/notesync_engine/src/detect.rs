//! Pure conflict classification.
//!
//! Given the queued local state for a document and an incoming remote
//! change, decides whether the remote change applies cleanly, is redundant,
//! or genuinely conflicts. Classification is content-addressed: two
//! byte-identical documents never conflict, whatever their version numbers.

use crate::queue::PendingChange;
use notesync_protocol::{content_hash, ConflictKind, RemoteChange};

/// The classified fate of one remote change.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RemoteOutcome {
    /// No local pending change; save the remote payload.
    ApplyUpdate,
    /// No local pending change (or none that matters); delete locally.
    ApplyDelete,
    /// Local and remote converged on identical content; accept the remote
    /// version number and discard the redundant queue entry.
    Converged {
        /// Version to stamp onto the local copy.
        remote_version: u64,
    },
    /// Genuine divergence requiring user resolution.
    Conflict(ConflictKind),
}

/// Classifies a remote change against the local pending change for the
/// same document id, if any.
pub fn classify(pending: Option<&PendingChange>, remote: &RemoteChange) -> RemoteOutcome {
    let Some(pending) = pending else {
        // Nothing queued locally: the remote change applies directly.
        return if remote.operation.is_delete() {
            RemoteOutcome::ApplyDelete
        } else {
            RemoteOutcome::ApplyUpdate
        };
    };

    if remote.operation.is_delete() {
        // Local edits pending on a document that no longer exists
        // server-side.
        return RemoteOutcome::Conflict(ConflictKind::DeleteEdit);
    }

    match (&pending.payload, &remote.note) {
        (Some(local), Some(remote_note)) if content_hash(local) == content_hash(remote_note) => {
            RemoteOutcome::Converged {
                remote_version: remote.version,
            }
        }
        // Differing content, or a pending local delete meeting a remote
        // edit: either way both sides claim the document.
        _ => RemoteOutcome::Conflict(ConflictKind::Edit),
    }
}
