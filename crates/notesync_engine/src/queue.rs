//! Durable, deduplicated queue of local changes awaiting upload.

use crate::config::write_atomic;
use crate::error::SyncResult;
use chrono::{DateTime, Utc};
use notesync_protocol::{ChangeOperation, Note};
use parking_lot::{Condvar, Mutex};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

/// Default debounce window for queue persistence.
pub(crate) const DEFAULT_DEBOUNCE: Duration = Duration::from_millis(500);

/// A local edit or delete waiting to be pushed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PendingChange {
    /// Document identifier.
    pub note_id: String,
    /// Kind of change.
    pub operation: ChangeOperation,
    /// Document snapshot, present for create and update.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payload: Option<Note>,
    /// When the change was queued.
    pub queued_at: DateTime<Utc>,
}

impl PendingChange {
    /// Creates a pending create or update carrying a document snapshot.
    pub fn upsert(note: Note, operation: ChangeOperation) -> Self {
        Self {
            note_id: note.id.clone(),
            operation,
            payload: Some(note),
            queued_at: Utc::now(),
        }
    }

    /// Creates a pending delete.
    pub fn delete(note_id: impl Into<String>) -> Self {
        Self {
            note_id: note_id.into(),
            operation: ChangeOperation::Delete,
            payload: None,
            queued_at: Utc::now(),
        }
    }

    /// Version the change is based on, `0` for never-synced documents.
    pub fn base_version(&self) -> u64 {
        self.payload.as_ref().map_or(0, |n| n.version)
    }
}

struct QueueState {
    entries: BTreeMap<String, PendingChange>,
    dirty: bool,
    stop: bool,
}

struct QueueInner {
    path: Option<PathBuf>,
    debounce: Duration,
    state: Mutex<QueueState>,
    wake: Condvar,
}

/// Queue of pending changes, one slot per document id.
///
/// A newer change for the same id replaces the previous entry (queue-level
/// last-write-wins; conflict logic operates on content, not queue order).
/// The queue persists itself to a JSON snapshot: a mutation schedules a
/// trailing write one debounce window later, so the crash-loss window for
/// any edit is bounded by the window and bursts coalesce into one write.
/// `flush` writes synchronously for shutdown.
pub struct ChangeQueue {
    inner: Arc<QueueInner>,
    flusher: Mutex<Option<JoinHandle<()>>>,
}

impl ChangeQueue {
    /// Creates an in-memory queue with no persistence.
    pub fn in_memory() -> Self {
        Self::with_parts(None, DEFAULT_DEBOUNCE, BTreeMap::new())
    }

    /// Creates a queue persisted at `path`, restoring any previous snapshot.
    pub fn load(path: impl Into<PathBuf>) -> SyncResult<Self> {
        let path = path.into();
        let entries = match std::fs::read(&path) {
            Ok(bytes) => {
                let changes: Vec<PendingChange> = serde_json::from_slice(&bytes)?;
                changes
                    .into_iter()
                    .map(|c| (c.note_id.clone(), c))
                    .collect()
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => BTreeMap::new(),
            Err(e) => return Err(e.into()),
        };

        Ok(Self::with_parts(Some(path), DEFAULT_DEBOUNCE, entries))
    }

    fn with_parts(
        path: Option<PathBuf>,
        debounce: Duration,
        entries: BTreeMap<String, PendingChange>,
    ) -> Self {
        Self {
            inner: Arc::new(QueueInner {
                path,
                debounce,
                state: Mutex::new(QueueState {
                    entries,
                    dirty: false,
                    stop: false,
                }),
                wake: Condvar::new(),
            }),
            flusher: Mutex::new(None),
        }
    }

    /// Overrides the debounce window. Only effective before the first
    /// mutation (the flusher thread reads the window once started).
    pub fn with_debounce(mut self, debounce: Duration) -> Self {
        if let Some(inner) = Arc::get_mut(&mut self.inner) {
            inner.debounce = debounce;
        }
        self
    }

    /// Upserts a change by document id; the most recent write wins the slot.
    pub fn enqueue(&self, change: PendingChange) {
        tracing::debug!(note_id = %change.note_id, operation = ?change.operation, "queueing change");
        self.inner
            .state
            .lock()
            .entries
            .insert(change.note_id.clone(), change);
        self.mark_dirty();
    }

    /// Removes and returns the entry for a document id.
    pub fn dequeue(&self, note_id: &str) -> Option<PendingChange> {
        let removed = self.inner.state.lock().entries.remove(note_id);
        if removed.is_some() {
            self.mark_dirty();
        }
        removed
    }

    /// Returns the entry for a document id.
    pub fn get(&self, note_id: &str) -> Option<PendingChange> {
        self.inner.state.lock().entries.get(note_id).cloned()
    }

    /// Returns all pending changes in document-id order.
    pub fn list(&self) -> Vec<PendingChange> {
        self.inner.state.lock().entries.values().cloned().collect()
    }

    /// Returns true if nothing is queued.
    pub fn is_empty(&self) -> bool {
        self.inner.state.lock().entries.is_empty()
    }

    /// Number of queued changes.
    pub fn len(&self) -> usize {
        self.inner.state.lock().entries.len()
    }

    /// Writes the snapshot synchronously, regardless of the debounce state.
    ///
    /// The engine calls this on shutdown to drain pending persistence.
    pub fn flush(&self) -> SyncResult<()> {
        let Some(path) = &self.inner.path else {
            self.inner.state.lock().dirty = false;
            return Ok(());
        };
        let entries: Vec<PendingChange> = {
            let mut state = self.inner.state.lock();
            state.dirty = false;
            state.entries.values().cloned().collect()
        };
        if let Err(e) = write_snapshot(path, &entries) {
            self.inner.state.lock().dirty = true;
            return Err(e);
        }
        Ok(())
    }

    fn mark_dirty(&self) {
        self.inner.state.lock().dirty = true;
        if self.inner.path.is_some() {
            self.ensure_flusher();
            self.inner.wake.notify_all();
        }
    }

    /// Starts the trailing-write thread on first use.
    fn ensure_flusher(&self) {
        let mut slot = self.flusher.lock();
        if slot.is_some() {
            return;
        }
        let inner = Arc::clone(&self.inner);
        let spawned = std::thread::Builder::new()
            .name("notesync-queue-flush".into())
            .spawn(move || flush_loop(&inner));
        match spawned {
            Ok(handle) => *slot = Some(handle),
            Err(e) => {
                // Mutations keep accumulating in memory; `flush` still works.
                tracing::warn!(error = %e, "failed to start queue flush thread");
            }
        }
    }

    fn stop_flusher(&self) {
        {
            self.inner.state.lock().stop = true;
        }
        self.inner.wake.notify_all();
        if let Some(handle) = self.flusher.lock().take() {
            if handle.join().is_err() {
                tracing::warn!("queue flush thread panicked");
            }
        }
    }
}

impl Drop for ChangeQueue {
    fn drop(&mut self) {
        self.stop_flusher();
        if let Err(e) = self.flush() {
            tracing::warn!(error = %e, "failed to persist change queue on drop");
        }
    }
}

fn flush_loop(inner: &QueueInner) {
    loop {
        {
            let mut state = inner.state.lock();
            while !state.dirty && !state.stop {
                inner.wake.wait(&mut state);
            }
            if state.stop {
                return;
            }
            // Trailing edge: wait out the window so a burst of mutations
            // coalesces into one write. The deadline is anchored to the
            // first mutation, bounding its time off disk.
            let deadline = Instant::now() + inner.debounce;
            loop {
                let now = Instant::now();
                if now >= deadline {
                    break;
                }
                let _ = inner.wake.wait_for(&mut state, deadline - now);
                if state.stop {
                    return;
                }
            }
        }
        if let Err(e) = write_pending(inner) {
            tracing::warn!(error = %e, "failed to persist change queue snapshot");
        }
    }
}

fn write_pending(inner: &QueueInner) -> SyncResult<()> {
    let Some(path) = &inner.path else {
        return Ok(());
    };
    let entries: Vec<PendingChange> = {
        let mut state = inner.state.lock();
        state.dirty = false;
        state.entries.values().cloned().collect()
    };
    if let Err(e) = write_snapshot(path, &entries) {
        // Leave dirty so the next window (or the shutdown flush) retries.
        inner.state.lock().dirty = true;
        return Err(e);
    }
    Ok(())
}

fn write_snapshot(path: &Path, entries: &[PendingChange]) -> SyncResult<()> {
    let bytes = serde_json::to_vec(entries)?;
    write_atomic(path, &bytes)
}
