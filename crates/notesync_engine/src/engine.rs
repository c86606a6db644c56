//! Sync engine orchestration.

use crate::config::SyncConfig;
use crate::conflicts::ConflictStore;
use crate::detect::{classify, RemoteOutcome};
use crate::error::{SyncError, SyncResult};
use crate::network::NetworkMonitor;
use crate::queue::{ChangeQueue, PendingChange};
use crate::status::{StatusBroadcaster, StatusListener, SubscriptionId, SyncState, SyncStatus};
use crate::storage::NoteStore;
use crate::transport::SyncTransport;
use chrono::{DateTime, Utc};
use notesync_protocol::{
    conflict_copy_title, ChangeOperation, Conflict, ConflictKind, Note, PullRequest, PushChange,
    PushConflict, PushRequest, RemoteChange, Resolution, ResolutionResult,
};
use parking_lot::{Condvar, Mutex, RwLock};
use std::collections::HashSet;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;
use uuid::Uuid;

/// Page size requested from the server during pulls.
const PULL_BATCH_SIZE: u32 = 100;

/// How long `shutdown` waits for an in-flight cycle before giving up.
const SHUTDOWN_GRACE: Duration = Duration::from_secs(10);

/// Result of one sync cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SyncSummary {
    /// Changes acknowledged by the server this cycle.
    pub pushed: u64,
    /// Remote changes downloaded and processed this cycle.
    pub pulled: u64,
    /// Distinct documents newly in conflict after this cycle.
    pub conflicts: u64,
}

/// Wakes the scheduler thread for shutdown or an out-of-cycle sync.
struct SchedulerSignal {
    state: Mutex<WakeState>,
    condvar: Condvar,
}

#[derive(Default)]
struct WakeState {
    stop: bool,
    kick: bool,
}

impl SchedulerSignal {
    fn new() -> Self {
        Self {
            state: Mutex::new(WakeState::default()),
            condvar: Condvar::new(),
        }
    }

    fn kick(&self) {
        self.state.lock().kick = true;
        self.condvar.notify_all();
    }

    fn stop(&self) {
        self.state.lock().stop = true;
        self.condvar.notify_all();
    }
}

/// The sync engine: drives push→pull→detect→apply cycles, surfaces
/// conflicts for explicit resolution, and publishes status.
///
/// The engine is single-writer with respect to its own state: exactly one
/// cycle is in flight at a time, and a [`trigger_sync`](Self::trigger_sync)
/// call made while a cycle runs waits for that cycle and returns its
/// summary instead of racing a second one.
pub struct SyncEngine<T, S, N>
where
    T: SyncTransport,
    S: NoteStore,
    N: NetworkMonitor,
{
    transport: Arc<T>,
    store: Arc<S>,
    network: Arc<N>,
    config: RwLock<SyncConfig>,
    config_path: Option<PathBuf>,
    queue: ChangeQueue,
    conflicts: Mutex<ConflictStore>,
    broadcaster: StatusBroadcaster,
    cycle_gate: Mutex<()>,
    last_summary: RwLock<SyncSummary>,
    state: RwLock<SyncState>,
    last_error: RwLock<Option<String>>,
    cycle_failed: AtomicBool,
    last_sync_at: RwLock<Option<DateTime<Utc>>>,
    signal: Arc<SchedulerSignal>,
    scheduler: Mutex<Option<JoinHandle<()>>>,
    net_subscription: Mutex<Option<SubscriptionId>>,
}

impl<T, S, N> SyncEngine<T, S, N>
where
    T: SyncTransport,
    S: NoteStore,
    N: NetworkMonitor,
{
    /// Creates an engine with an in-memory queue and no persistence.
    pub fn new(config: SyncConfig, transport: Arc<T>, store: Arc<S>, network: Arc<N>) -> Self {
        Self {
            transport,
            store,
            network,
            config: RwLock::new(config),
            config_path: None,
            queue: ChangeQueue::in_memory(),
            conflicts: Mutex::new(ConflictStore::new()),
            broadcaster: StatusBroadcaster::new(),
            cycle_gate: Mutex::new(()),
            last_summary: RwLock::new(SyncSummary::default()),
            state: RwLock::new(SyncState::Idle),
            last_error: RwLock::new(None),
            cycle_failed: AtomicBool::new(false),
            last_sync_at: RwLock::new(None),
            signal: Arc::new(SchedulerSignal::new()),
            scheduler: Mutex::new(None),
            net_subscription: Mutex::new(None),
        }
    }

    /// Persists the configuration document at `path`; `initialize` reloads
    /// from it and every watermark advance saves back to it.
    pub fn with_config_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.config_path = Some(path.into());
        self
    }

    /// Persists the change queue at `path`, restoring any prior snapshot.
    pub fn with_queue_path(mut self, path: impl Into<PathBuf>) -> SyncResult<Self> {
        self.queue = ChangeQueue::load(path)?;
        Ok(self)
    }

    /// Returns a copy of the current configuration.
    pub fn config(&self) -> SyncConfig {
        self.config.read().clone()
    }

    /// Queues a local create or update for upload.
    ///
    /// Delegates to the change queue; performs no network I/O.
    pub fn queue_change(&self, note: Note, operation: ChangeOperation) {
        let change = if operation.is_delete() {
            PendingChange::delete(note.id)
        } else {
            PendingChange::upsert(note, operation)
        };
        self.queue.enqueue(change);
    }

    /// Queues a local delete for upload.
    pub fn queue_delete(&self, note_id: impl Into<String>) {
        self.queue.enqueue(PendingChange::delete(note_id));
    }

    /// Returns all unresolved conflicts.
    pub fn get_conflicts(&self) -> Vec<Conflict> {
        self.conflicts.lock().list()
    }

    /// Returns a snapshot of the current status.
    ///
    /// Callable from any thread at any time; each count is read in its own
    /// statement so no two guards are ever held at once.
    pub fn status(&self) -> SyncStatus {
        let state = *self.state.read();
        let conflict_count = self.conflicts.lock().len();
        let pending_count = self.queue.len();
        let last_sync_at = *self.last_sync_at.read();
        let last_error = self.last_error.read().clone();
        SyncStatus {
            state,
            conflict_count,
            pending_count,
            last_sync_at,
            last_error,
        }
    }

    /// Registers a status listener; it receives a value snapshot after
    /// every cycle and every conflict resolution.
    pub fn on_status_change(&self, listener: StatusListener) -> SubscriptionId {
        self.broadcaster.subscribe(listener)
    }

    /// Removes a status listener.
    pub fn unsubscribe_status(&self, id: SubscriptionId) {
        self.broadcaster.unsubscribe(id);
    }

    /// Runs one full push→pull→detect→apply cycle.
    ///
    /// Offline, this performs no network calls and reports zero activity.
    /// If a cycle is already in flight the call waits for it and returns
    /// that cycle's summary.
    pub fn trigger_sync(&self) -> SyncResult<SyncSummary> {
        if !self.network.is_online() {
            tracing::debug!("offline, skipping sync cycle");
            return Ok(SyncSummary::default());
        }

        match self.cycle_gate.try_lock() {
            Some(_guard) => {
                let summary = self.run_cycle();
                *self.last_summary.write() = summary;
                Ok(summary)
            }
            None => {
                // Coalesce onto the in-flight cycle: once the gate is free
                // that cycle has completed and recorded its summary.
                let _wait = self.cycle_gate.lock();
                Ok(*self.last_summary.read())
            }
        }
    }

    /// Resolves a recorded conflict with the chosen strategy.
    ///
    /// Fails with [`SyncError::ConflictNotFound`] if no conflict is
    /// recorded for `note_id`.
    pub fn resolve_conflict(
        &self,
        note_id: &str,
        resolution: Resolution,
    ) -> SyncResult<ResolutionResult> {
        let conflict = self.conflicts.lock().remove(note_id).ok_or_else(|| {
            SyncError::ConflictNotFound {
                note_id: note_id.to_string(),
            }
        })?;
        tracing::info!(note_id, ?resolution, "resolving conflict");

        let outcome = match resolution {
            Resolution::KeepLocal => self.resolve_keep_local(&conflict),
            Resolution::KeepRemote => self.resolve_keep_remote(&conflict),
            Resolution::KeepBoth => self.resolve_keep_both(&conflict),
        };

        match outcome {
            Ok(result) => {
                self.recompute_state();
                self.publish_status();
                Ok(result)
            }
            Err(e) => {
                // Storage failed partway; keep the conflict recorded so the
                // user can retry instead of stranding it.
                self.conflicts.lock().record(conflict);
                Err(e)
            }
        }
    }

    fn resolve_keep_local(&self, conflict: &Conflict) -> SyncResult<ResolutionResult> {
        let Some(local) = conflict.local_note.clone() else {
            // The pending local change was a delete: re-affirm the deletion
            // and queue it so the next push removes the server copy.
            self.store.delete_note(&conflict.note_id)?;
            self.queue
                .enqueue(PendingChange::delete(conflict.note_id.clone()));
            return Ok(ResolutionResult {
                resolution: Resolution::KeepLocal,
                resolved_note: None,
                copy_note: None,
            });
        };

        let mut note = local;
        // Advance past the remote version so the next push overwrites
        // server state.
        note.version = note.version.max(conflict.remote_version) + 1;
        note.updated_at = Utc::now();
        self.store.save_note(&note)?;
        self.queue
            .enqueue(PendingChange::upsert(note.clone(), ChangeOperation::Update));

        Ok(ResolutionResult {
            resolution: Resolution::KeepLocal,
            resolved_note: Some(note),
            copy_note: None,
        })
    }

    fn resolve_keep_remote(&self, conflict: &Conflict) -> SyncResult<ResolutionResult> {
        self.queue.dequeue(&conflict.note_id);

        let resolved_note = match conflict.remote_note.clone() {
            Some(mut remote) => {
                remote.version = conflict.remote_version;
                self.store.save_note(&remote)?;
                Some(remote)
            }
            None => {
                // Delete-edit conflict resolved in the server's favor.
                self.store.delete_note(&conflict.note_id)?;
                None
            }
        };

        Ok(ResolutionResult {
            resolution: Resolution::KeepRemote,
            resolved_note,
            copy_note: None,
        })
    }

    fn resolve_keep_both(&self, conflict: &Conflict) -> SyncResult<ResolutionResult> {
        self.queue.dequeue(&conflict.note_id);

        // The remote side becomes primary under the original id.
        let resolved_note = match conflict.remote_note.clone() {
            Some(mut remote) => {
                remote.version = conflict.remote_version;
                self.store.save_note(&remote)?;
                Some(remote)
            }
            None => {
                self.store.delete_note(&conflict.note_id)?;
                None
            }
        };

        // The local side survives as a new document with a fresh identity
        // and no sync metadata, starting its own sync lifecycle.
        let copy_note = match conflict.local_note.clone() {
            Some(local) => {
                let stamp = Utc::now().format("%Y-%m-%d %H:%M").to_string();
                let copy = Note {
                    id: Uuid::new_v4().to_string(),
                    title: conflict_copy_title(&local.title, &stamp),
                    content: local.content,
                    version: 0,
                    updated_at: Utc::now(),
                };
                self.store.save_note(&copy)?;
                self.queue
                    .enqueue(PendingChange::upsert(copy.clone(), ChangeOperation::Create));
                Some(copy)
            }
            None => None,
        };

        Ok(ResolutionResult {
            resolution: Resolution::KeepBoth,
            resolved_note,
            copy_note,
        })
    }

    fn run_cycle(&self) -> SyncSummary {
        *self.state.write() = SyncState::Syncing;
        self.publish_status();

        let mut summary = SyncSummary::default();
        let mut failure: Option<String> = None;
        let mut new_conflicts: HashSet<String> = HashSet::new();

        if let Err(e) = self.push_phase(&mut summary, &mut new_conflicts) {
            tracing::warn!(error = %e, "push step failed, queue left untouched");
            failure = Some(e.to_string());
        }

        if let Err(e) = self.pull_phase(&mut summary, &mut new_conflicts) {
            tracing::warn!(error = %e, "pull step failed, watermark left untouched");
            failure = Some(e.to_string());
        }

        summary.conflicts = new_conflicts.len() as u64;

        if failure.is_none() {
            *self.last_sync_at.write() = Some(Utc::now());
        }
        self.cycle_failed.store(failure.is_some(), Ordering::SeqCst);
        *self.last_error.write() = failure;

        self.recompute_state();
        self.publish_status();

        tracing::debug!(
            pushed = summary.pushed,
            pulled = summary.pulled,
            conflicts = summary.conflicts,
            "sync cycle finished"
        );
        summary
    }

    /// Uploads queued changes not blocked by an unresolved conflict.
    fn push_phase(
        &self,
        summary: &mut SyncSummary,
        new_conflicts: &mut HashSet<String>,
    ) -> SyncResult<()> {
        let outgoing: Vec<PendingChange> = {
            let conflicts = self.conflicts.lock();
            self.queue
                .list()
                .into_iter()
                .filter(|change| !conflicts.contains(&change.note_id))
                .collect()
        };
        if outgoing.is_empty() {
            return Ok(());
        }

        let device_id = self.config.read().device_id.clone();
        let changes = outgoing
            .iter()
            .map(|pending| PushChange {
                note_id: pending.note_id.clone(),
                operation: pending.operation,
                version: pending.base_version(),
                payload: pending.payload.clone(),
            })
            .collect();
        let request = PushRequest::new(device_id, changes);

        let response = self.transport.push(&request)?;

        for accepted in &response.accepted {
            self.queue.dequeue(&accepted.note_id);
            summary.pushed += 1;
            self.restamp_version(&accepted.note_id, accepted.server_version);
        }
        for error in &response.errors {
            // Stays queued; the next cycle retries it.
            tracing::warn!(note_id = %error.note_id, message = %error.message, "server rejected change");
        }
        for push_conflict in response.conflicts {
            let note_id = push_conflict.note_id.clone();
            self.record_push_conflict(push_conflict);
            new_conflicts.insert(note_id);
        }

        Ok(())
    }

    /// Stamps the server-assigned version onto the local copy after an
    /// acknowledged push.
    fn restamp_version(&self, note_id: &str, server_version: u64) {
        let result = self.store.read_note(note_id).and_then(|found| {
            if let Some(mut note) = found {
                note.version = server_version;
                self.store.save_note(&note)?;
            }
            Ok(())
        });
        if let Err(e) = result {
            tracing::warn!(note_id, error = %e, "failed to stamp server version");
        }
    }

    /// A conflict the server reported inline in a push response; forwarded
    /// into the same pipeline as pull-detected conflicts and merged by
    /// document id.
    fn record_push_conflict(&self, push_conflict: PushConflict) {
        let pending = self.queue.get(&push_conflict.note_id);
        let kind = if push_conflict.note.is_some() {
            ConflictKind::Edit
        } else {
            ConflictKind::DeleteEdit
        };
        let conflict = Conflict {
            note_id: push_conflict.note_id,
            kind,
            local_note: pending.as_ref().and_then(|p| p.payload.clone()),
            remote_note: push_conflict.note,
            local_version: pending.as_ref().map_or(0, PendingChange::base_version),
            remote_version: push_conflict.server_version,
            detected_at: Utc::now(),
        };
        tracing::info!(note_id = %conflict.note_id, kind = ?conflict.kind, "conflict detected");
        self.conflicts.lock().record(conflict);
    }

    /// Downloads and applies all remote changes since the watermark.
    ///
    /// Every page is collected before anything is applied, so the watermark
    /// only advances once the whole batch has been processed.
    fn pull_phase(
        &self,
        summary: &mut SyncSummary,
        new_conflicts: &mut HashSet<String>,
    ) -> SyncResult<()> {
        let start_sequence = self.config.read().last_sync_sequence;
        let mut since = start_sequence;
        let mut batch: Vec<RemoteChange> = Vec::new();

        loop {
            let response = self
                .transport
                .pull(&PullRequest::new(since, PULL_BATCH_SIZE))?;
            batch.extend(response.changes);
            if !response.has_more {
                since = since.max(response.latest_sequence);
                break;
            }
            if response.latest_sequence <= since {
                return Err(SyncError::Protocol(
                    "server reported more pages without advancing the sequence".into(),
                ));
            }
            since = response.latest_sequence;
        }

        for change in &batch {
            self.apply_remote_change(change, new_conflicts)?;
            summary.pulled += 1;
        }

        if since > start_sequence {
            let mut config = self.config.write();
            config.last_sync_sequence = since;
            if let Some(path) = &self.config_path {
                config.save(path)?;
            }
        }

        Ok(())
    }

    fn apply_remote_change(
        &self,
        change: &RemoteChange,
        new_conflicts: &mut HashSet<String>,
    ) -> SyncResult<()> {
        let pending = self.queue.get(&change.note_id);

        match classify(pending.as_ref(), change) {
            RemoteOutcome::ApplyUpdate => {
                if let Some(note) = &change.note {
                    let mut note = note.clone();
                    note.version = change.version;
                    self.store.save_note(&note)?;
                } else {
                    tracing::warn!(note_id = %change.note_id, "remote update carried no payload, skipping");
                }
            }
            RemoteOutcome::ApplyDelete => {
                self.store.delete_note(&change.note_id)?;
            }
            RemoteOutcome::Converged { remote_version } => {
                // Both sides made the same edit independently; the queue
                // entry is redundant.
                self.queue.dequeue(&change.note_id);
                self.restamp_version(&change.note_id, remote_version);
            }
            RemoteOutcome::Conflict(kind) => {
                let conflict = Conflict {
                    note_id: change.note_id.clone(),
                    kind,
                    local_note: pending.as_ref().and_then(|p| p.payload.clone()),
                    remote_note: change.note.clone(),
                    local_version: pending.as_ref().map_or(0, PendingChange::base_version),
                    remote_version: change.version,
                    detected_at: Utc::now(),
                };
                tracing::info!(note_id = %conflict.note_id, kind = ?kind, "conflict detected");
                self.conflicts.lock().record(conflict);
                new_conflicts.insert(change.note_id.clone());
            }
        }
        Ok(())
    }

    /// `Error` iff conflicts remain or the last cycle failed to reach the
    /// server; `Idle` once both clear.
    fn recompute_state(&self) {
        let conflicted = !self.conflicts.lock().is_empty();
        let failed = self.cycle_failed.load(Ordering::SeqCst);
        *self.state.write() = if conflicted || failed {
            SyncState::Error
        } else {
            SyncState::Idle
        };
    }

    fn publish_status(&self) {
        let status = self.status();
        self.broadcaster.publish(&status);
    }
}

impl<T, S, N> SyncEngine<T, S, N>
where
    T: SyncTransport + 'static,
    S: NoteStore + 'static,
    N: NetworkMonitor + 'static,
{
    /// Loads persisted state, starts the periodic scheduler and subscribes
    /// to the network monitor.
    ///
    /// A transition to online wakes the scheduler for an immediate
    /// out-of-cycle sync attempt instead of waiting for the next tick.
    pub fn initialize(self: &Arc<Self>) -> SyncResult<()> {
        if let Some(path) = &self.config_path {
            if path.exists() {
                *self.config.write() = SyncConfig::load(path)?;
            }
        }

        if !self.config.read().enabled {
            tracing::info!("sync disabled, scheduler not started");
            self.publish_status();
            return Ok(());
        }

        let signal = Arc::clone(&self.signal);
        let subscription = self.network.on_change(Box::new(move |online| {
            if online {
                signal.kick();
            }
        }));
        *self.net_subscription.lock() = Some(subscription);

        let engine = Arc::clone(self);
        let signal = Arc::clone(&self.signal);
        let handle = std::thread::Builder::new()
            .name("notesync-scheduler".into())
            .spawn(move || loop {
                let interval = engine.config.read().clamped_interval();
                {
                    let mut state = signal.state.lock();
                    if !state.stop && !state.kick {
                        let _ = signal.condvar.wait_for(&mut state, interval);
                    }
                    if state.stop {
                        break;
                    }
                    state.kick = false;
                }
                if let Err(e) = engine.trigger_sync() {
                    tracing::warn!(error = %e, "scheduled sync cycle failed");
                }
            })?;
        *self.scheduler.lock() = Some(handle);

        self.publish_status();
        Ok(())
    }

    /// Stops the scheduler, unsubscribes from the network monitor, waits
    /// (bounded) for any in-flight cycle and drains pending persistence.
    pub fn shutdown(&self) -> SyncResult<()> {
        self.signal.stop();
        if let Some(handle) = self.scheduler.lock().take() {
            if handle.join().is_err() {
                tracing::warn!("scheduler thread panicked before shutdown");
            }
        }
        if let Some(id) = self.net_subscription.lock().take() {
            self.network.unsubscribe(id);
        }

        // Cycles triggered by other threads still hold the gate; wait for
        // the current one to finish rather than aborting it mid-write.
        let gate = self.cycle_gate.try_lock_for(SHUTDOWN_GRACE);
        if gate.is_none() {
            tracing::warn!("shutdown grace elapsed with a sync cycle still in flight");
        }

        self.queue.flush()?;
        if let Some(path) = &self.config_path {
            self.config.read().save(path)?;
        }
        self.broadcaster.clear();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::network::ToggleNetworkMonitor;
    use crate::storage::MemoryNoteStore;
    use crate::transport::MockTransport;
    use notesync_protocol::{PullResponse, PushResponse};

    type TestEngine = SyncEngine<MockTransport, MemoryNoteStore, ToggleNetworkMonitor>;

    struct Fixture {
        engine: Arc<TestEngine>,
        transport: Arc<MockTransport>,
        store: Arc<MemoryNoteStore>,
        network: Arc<ToggleNetworkMonitor>,
    }

    fn fixture() -> Fixture {
        let transport = Arc::new(MockTransport::new());
        let store = Arc::new(MemoryNoteStore::new());
        let network = Arc::new(ToggleNetworkMonitor::new(true));
        let engine = Arc::new(SyncEngine::new(
            SyncConfig::new("https://sync.example.com", "dev-1"),
            Arc::clone(&transport),
            Arc::clone(&store),
            Arc::clone(&network),
        ));
        Fixture {
            engine,
            transport,
            store,
            network,
        }
    }

    fn versioned_note(id: &str, title: &str, content: &str, version: u64) -> Note {
        let mut note = Note::new(id, title, content);
        note.version = version;
        note
    }

    #[test]
    fn initial_status_is_idle() {
        let f = fixture();
        let status = f.engine.status();
        assert_eq!(status.state, SyncState::Idle);
        assert_eq!(status.conflict_count, 0);
        assert_eq!(status.pending_count, 0);
    }

    #[test]
    fn queue_change_twice_collapses_to_one_entry() {
        let f = fixture();
        f.engine
            .queue_change(versioned_note("n1", "First", "a", 1), ChangeOperation::Update);
        f.engine
            .queue_change(versioned_note("n1", "Second", "b", 1), ChangeOperation::Update);
        assert_eq!(f.engine.status().pending_count, 1);
    }

    #[test]
    fn offline_cycle_makes_no_network_calls() {
        let f = fixture();
        f.network.set_online(false);
        f.engine
            .queue_change(versioned_note("n1", "T", "c", 1), ChangeOperation::Update);

        let summary = f.engine.trigger_sync().unwrap();

        assert_eq!(summary, SyncSummary::default());
        assert_eq!(f.transport.request_count(), 0);
        assert_eq!(f.engine.status().pending_count, 1);
    }

    #[test]
    fn accepted_push_dequeues_and_stamps_version() {
        let f = fixture();
        let note = versioned_note("n1", "T", "c", 1);
        f.store.insert(note.clone());
        f.engine.queue_change(note, ChangeOperation::Update);

        let summary = f.engine.trigger_sync().unwrap();

        assert_eq!(summary.pushed, 1);
        assert_eq!(f.engine.status().pending_count, 0);
        assert_eq!(f.store.get("n1").unwrap().version, 2);
        assert_eq!(f.engine.status().state, SyncState::Idle);
    }

    #[test]
    fn push_errors_stay_queued_while_accepted_dequeue() {
        let f = fixture();
        f.engine
            .queue_change(versioned_note("a", "A", "a", 1), ChangeOperation::Update);
        f.engine
            .queue_change(versioned_note("b", "B", "b", 1), ChangeOperation::Update);
        f.transport.enqueue_push_response(PushResponse {
            accepted: vec![notesync_protocol::AcceptedChange {
                note_id: "a".into(),
                server_version: 2,
                server_sequence: 1,
            }],
            conflicts: vec![],
            errors: vec![notesync_protocol::PushError {
                note_id: "b".into(),
                message: "storage quota exceeded".into(),
            }],
        });

        let summary = f.engine.trigger_sync().unwrap();

        assert_eq!(summary.pushed, 1);
        let queue_ids: Vec<String> = f
            .engine
            .queue
            .list()
            .into_iter()
            .map(|c| c.note_id)
            .collect();
        assert_eq!(queue_ids, vec!["b".to_string()]);
    }

    #[test]
    fn transport_failure_keeps_watermark_and_queue() {
        let f = fixture();
        f.engine
            .queue_change(versioned_note("n1", "T", "c", 1), ChangeOperation::Update);
        f.transport.fail_pushes("connection reset");
        f.transport.fail_pulls("connection reset");

        let summary = f.engine.trigger_sync().unwrap();

        assert_eq!(summary.pushed, 0);
        assert_eq!(f.engine.config().last_sync_sequence, 0);
        assert_eq!(f.engine.status().pending_count, 1);
        let status = f.engine.status();
        assert_eq!(status.state, SyncState::Error);
        assert!(status.last_error.unwrap().contains("connection reset"));

        // Next cycle retries from the same watermark and recovers.
        f.transport.heal();
        let summary = f.engine.trigger_sync().unwrap();
        assert_eq!(summary.pushed, 1);
        assert_eq!(f.engine.status().state, SyncState::Idle);
    }

    #[test]
    fn conflicted_id_is_withheld_from_push() {
        let f = fixture();
        // Record a conflict, then queue a change for the same id.
        f.transport.enqueue_push_response(PushResponse::default());
        f.engine
            .queue_change(versioned_note("n1", "Local", "local", 2), ChangeOperation::Update);
        f.transport.enqueue_pull_page(PullResponse::new(
            vec![RemoteChange {
                note_id: "n1".into(),
                operation: ChangeOperation::Update,
                version: 3,
                server_sequence: 1,
                note: Some(versioned_note("n1", "Remote", "remote", 3)),
                timestamp: Utc::now(),
            }],
            1,
            false,
        ));
        f.engine.trigger_sync().unwrap();
        assert_eq!(f.engine.get_conflicts().len(), 1);

        let pushes_before = f.transport.push_requests().len();
        f.engine.trigger_sync().unwrap();
        // The queued entry for the conflicted id must not have been pushed.
        assert_eq!(f.transport.push_requests().len(), pushes_before);
    }

    #[test]
    fn resolve_unknown_conflict_fails_with_note_id() {
        let f = fixture();
        let err = f
            .engine
            .resolve_conflict("missing-note", Resolution::KeepLocal)
            .unwrap_err();
        match err {
            SyncError::ConflictNotFound { note_id } => assert_eq!(note_id, "missing-note"),
            other => panic!("expected ConflictNotFound, got {other}"),
        }
    }
}
