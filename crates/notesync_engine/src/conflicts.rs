//! In-memory table of unresolved conflicts.

use notesync_protocol::Conflict;
use std::collections::BTreeMap;

/// Unresolved conflicts keyed by document id.
///
/// At most one conflict exists per id; recording a new conflict for an id
/// overwrites, never duplicates, the prior one.
#[derive(Default)]
pub struct ConflictStore {
    conflicts: BTreeMap<String, Conflict>,
}

impl ConflictStore {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Records a conflict, replacing any prior conflict for the same id.
    pub fn record(&mut self, conflict: Conflict) {
        if self.conflicts.contains_key(&conflict.note_id) {
            tracing::debug!(note_id = %conflict.note_id, "replacing previously recorded conflict");
        }
        self.conflicts.insert(conflict.note_id.clone(), conflict);
    }

    /// Removes and returns the conflict for an id.
    pub fn remove(&mut self, note_id: &str) -> Option<Conflict> {
        self.conflicts.remove(note_id)
    }

    /// Returns the conflict for an id.
    pub fn get(&self, note_id: &str) -> Option<&Conflict> {
        self.conflicts.get(note_id)
    }

    /// Returns true if a conflict is recorded for the id.
    pub fn contains(&self, note_id: &str) -> bool {
        self.conflicts.contains_key(note_id)
    }

    /// Returns all unresolved conflicts in id order.
    pub fn list(&self) -> Vec<Conflict> {
        self.conflicts.values().cloned().collect()
    }

    /// Number of unresolved conflicts.
    pub fn len(&self) -> usize {
        self.conflicts.len()
    }

    /// Returns true if no conflicts are recorded.
    pub fn is_empty(&self) -> bool {
        self.conflicts.is_empty()
    }
}
