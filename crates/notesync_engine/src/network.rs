//! Network availability monitoring.

use crate::status::SubscriptionId;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

/// Callback invoked with the new connectivity state on every transition.
pub type NetworkListener = Box<dyn Fn(bool) + Send + Sync>;

/// Reports current connectivity and notifies subscribers on change.
///
/// The engine subscribes once; a transition to online triggers an immediate
/// out-of-cycle sync attempt instead of waiting for the next timer tick.
pub trait NetworkMonitor: Send + Sync {
    /// Returns the current connectivity state.
    fn is_online(&self) -> bool;

    /// Registers a listener for connectivity transitions.
    fn on_change(&self, listener: NetworkListener) -> SubscriptionId;

    /// Removes a previously registered listener.
    fn unsubscribe(&self, id: SubscriptionId);
}

/// A monitor whose state is toggled by the host (or a test).
///
/// Listeners fire on transitions only, not on redundant sets, and are
/// invoked with the listener lock released so a callback may unsubscribe.
pub struct ToggleNetworkMonitor {
    online: AtomicBool,
    next_id: AtomicU64,
    listeners: Mutex<Vec<(SubscriptionId, Arc<dyn Fn(bool) + Send + Sync>)>>,
}

impl ToggleNetworkMonitor {
    /// Creates a monitor in the given initial state.
    pub fn new(online: bool) -> Self {
        Self {
            online: AtomicBool::new(online),
            next_id: AtomicU64::new(1),
            listeners: Mutex::new(Vec::new()),
        }
    }

    /// Sets the connectivity state, notifying listeners on a transition.
    pub fn set_online(&self, online: bool) {
        let previous = self.online.swap(online, Ordering::SeqCst);
        if previous == online {
            return;
        }
        tracing::debug!(online, "network state changed");
        // Snapshot under the lock, invoke outside it.
        let snapshot: Vec<Arc<dyn Fn(bool) + Send + Sync>> = self
            .listeners
            .lock()
            .iter()
            .map(|(_, listener)| Arc::clone(listener))
            .collect();
        for listener in snapshot {
            listener(online);
        }
    }
}

impl Default for ToggleNetworkMonitor {
    fn default() -> Self {
        Self::new(true)
    }
}

impl NetworkMonitor for ToggleNetworkMonitor {
    fn is_online(&self) -> bool {
        self.online.load(Ordering::SeqCst)
    }

    fn on_change(&self, listener: NetworkListener) -> SubscriptionId {
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        self.listeners.lock().push((id, Arc::from(listener)));
        id
    }

    fn unsubscribe(&self, id: SubscriptionId) {
        self.listeners.lock().retain(|(entry, _)| *entry != id);
    }
}
