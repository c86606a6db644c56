//! Storage collaborator boundary.
//!
//! The engine never touches note storage directly; it materializes resolved
//! or remotely-applied state through this trait, implemented by the host
//! application's storage layer.

use crate::error::SyncResult;
use notesync_protocol::Note;
use parking_lot::RwLock;
use std::collections::BTreeMap;

/// Callbacks into the external note store.
pub trait NoteStore: Send + Sync {
    /// Saves (creates or replaces) a note.
    fn save_note(&self, note: &Note) -> SyncResult<()>;

    /// Deletes a note; deleting an unknown id is not an error.
    fn delete_note(&self, note_id: &str) -> SyncResult<()>;

    /// Reads a note, `None` if it does not exist.
    fn read_note(&self, note_id: &str) -> SyncResult<Option<Note>>;
}

/// An in-memory note store for tests and simple hosts.
pub struct MemoryNoteStore {
    notes: RwLock<BTreeMap<String, Note>>,
    deleted: RwLock<Vec<String>>,
}

impl MemoryNoteStore {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self {
            notes: RwLock::new(BTreeMap::new()),
            deleted: RwLock::new(Vec::new()),
        }
    }

    /// Seeds a note directly, bypassing the collaborator interface.
    pub fn insert(&self, note: Note) {
        self.notes.write().insert(note.id.clone(), note);
    }

    /// Returns a note by id.
    pub fn get(&self, note_id: &str) -> Option<Note> {
        self.notes.read().get(note_id).cloned()
    }

    /// Returns all stored notes in id order.
    pub fn notes(&self) -> Vec<Note> {
        self.notes.read().values().cloned().collect()
    }

    /// Ids deleted through the collaborator interface, in order.
    pub fn deleted_ids(&self) -> Vec<String> {
        self.deleted.read().clone()
    }
}

impl Default for MemoryNoteStore {
    fn default() -> Self {
        Self::new()
    }
}

impl NoteStore for MemoryNoteStore {
    fn save_note(&self, note: &Note) -> SyncResult<()> {
        self.notes.write().insert(note.id.clone(), note.clone());
        Ok(())
    }

    fn delete_note(&self, note_id: &str) -> SyncResult<()> {
        self.notes.write().remove(note_id);
        self.deleted.write().push(note_id.to_string());
        Ok(())
    }

    fn read_note(&self, note_id: &str) -> SyncResult<Option<Note>> {
        Ok(self.notes.read().get(note_id).cloned())
    }
}
