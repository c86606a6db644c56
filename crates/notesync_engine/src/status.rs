//! Sync status publishing.

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Identifier of a registered listener.
pub type SubscriptionId = u64;

/// The externally visible state of the engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncState {
    /// No cycle in flight, no conflicts, last cycle reached the server.
    Idle,
    /// A cycle is in flight.
    Syncing,
    /// Unresolved conflicts exist or the last cycle failed to reach the
    /// server.
    Error,
}

/// Snapshot of engine status published to listeners.
///
/// Invariant: `state == Error` if and only if `conflict_count > 0` or the
/// last cycle failed at the transport level.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncStatus {
    /// Current engine state.
    pub state: SyncState,
    /// Number of unresolved conflicts.
    pub conflict_count: usize,
    /// Number of queued local changes.
    pub pending_count: usize,
    /// Completion time of the last successful cycle.
    pub last_sync_at: Option<DateTime<Utc>>,
    /// Message from the last transport-level failure, if any.
    pub last_error: Option<String>,
}

/// Callback receiving status snapshots; each listener gets its own clone,
/// never a live reference.
pub type StatusListener = Box<dyn Fn(SyncStatus) + Send + Sync>;

/// Owned list of status subscribers.
///
/// The broadcaster is owned by the engine instance (no process-wide
/// registration) and is cleared on shutdown. Callbacks are invoked with
/// the listener lock released, so a listener may subscribe or unsubscribe
/// from inside its own callback.
pub(crate) struct StatusBroadcaster {
    next_id: AtomicU64,
    listeners: Mutex<Vec<(SubscriptionId, Arc<dyn Fn(SyncStatus) + Send + Sync>)>>,
}

impl StatusBroadcaster {
    pub(crate) fn new() -> Self {
        Self {
            next_id: AtomicU64::new(1),
            listeners: Mutex::new(Vec::new()),
        }
    }

    pub(crate) fn subscribe(&self, listener: StatusListener) -> SubscriptionId {
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        self.listeners.lock().push((id, Arc::from(listener)));
        id
    }

    pub(crate) fn unsubscribe(&self, id: SubscriptionId) {
        self.listeners.lock().retain(|(entry, _)| *entry != id);
    }

    pub(crate) fn publish(&self, status: &SyncStatus) {
        // Snapshot under the lock, invoke outside it.
        let snapshot: Vec<Arc<dyn Fn(SyncStatus) + Send + Sync>> = self
            .listeners
            .lock()
            .iter()
            .map(|(_, listener)| Arc::clone(listener))
            .collect();
        for listener in snapshot {
            listener(status.clone());
        }
    }

    pub(crate) fn clear(&self) {
        self.listeners.lock().clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn idle_status() -> SyncStatus {
        SyncStatus {
            state: SyncState::Idle,
            conflict_count: 0,
            pending_count: 0,
            last_sync_at: None,
            last_error: None,
        }
    }

    #[test]
    fn listeners_receive_value_clones() {
        let broadcaster = StatusBroadcaster::new();
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        broadcaster.subscribe(Box::new(move |status| {
            sink.lock().push(status);
        }));

        broadcaster.publish(&idle_status());
        broadcaster.publish(&SyncStatus {
            state: SyncState::Error,
            conflict_count: 2,
            ..idle_status()
        });

        let seen = seen.lock();
        assert_eq!(seen.len(), 2);
        assert_eq!(seen[0].state, SyncState::Idle);
        assert_eq!(seen[1].conflict_count, 2);
    }

    #[test]
    fn unsubscribe_and_clear() {
        let broadcaster = StatusBroadcaster::new();
        let count = Arc::new(AtomicU64::new(0));

        let c1 = Arc::clone(&count);
        let id = broadcaster.subscribe(Box::new(move |_| {
            c1.fetch_add(1, Ordering::SeqCst);
        }));
        let c2 = Arc::clone(&count);
        broadcaster.subscribe(Box::new(move |_| {
            c2.fetch_add(1, Ordering::SeqCst);
        }));

        broadcaster.publish(&idle_status());
        assert_eq!(count.load(Ordering::SeqCst), 2);

        broadcaster.unsubscribe(id);
        broadcaster.publish(&idle_status());
        assert_eq!(count.load(Ordering::SeqCst), 3);

        broadcaster.clear();
        broadcaster.publish(&idle_status());
        assert_eq!(count.load(Ordering::SeqCst), 3);
    }

    #[test]
    fn listener_may_unsubscribe_itself_during_publish() {
        let broadcaster = Arc::new(StatusBroadcaster::new());
        let id_slot: Arc<Mutex<Option<SubscriptionId>>> = Arc::new(Mutex::new(None));
        let count = Arc::new(AtomicU64::new(0));

        let b = Arc::clone(&broadcaster);
        let slot = Arc::clone(&id_slot);
        let c = Arc::clone(&count);
        let id = broadcaster.subscribe(Box::new(move |_| {
            c.fetch_add(1, Ordering::SeqCst);
            if let Some(id) = *slot.lock() {
                b.unsubscribe(id);
            }
        }));
        *id_slot.lock() = Some(id);

        broadcaster.publish(&idle_status());
        broadcaster.publish(&idle_status());

        // Fired once, then removed itself without blocking the publish.
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn listener_may_subscribe_another_during_publish() {
        let broadcaster = Arc::new(StatusBroadcaster::new());
        let count = Arc::new(AtomicU64::new(0));

        let b = Arc::clone(&broadcaster);
        let c = Arc::clone(&count);
        broadcaster.subscribe(Box::new(move |_| {
            let inner = Arc::clone(&c);
            b.subscribe(Box::new(move |_| {
                inner.fetch_add(1, Ordering::SeqCst);
            }));
        }));

        broadcaster.publish(&idle_status());
        assert_eq!(count.load(Ordering::SeqCst), 0);
        broadcaster.publish(&idle_status());
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }
}
