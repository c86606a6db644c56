//! # NoteSync Engine
//!
//! Offline-first synchronization and conflict-resolution engine.
//!
//! This crate provides:
//! - Durable, deduplicated change queue with debounced persistence
//! - Push/pull protocol client over an abstract transport
//! - Pure conflict detection (content-hash based)
//! - Conflict store with whole-document resolution strategies
//! - Orchestrating engine with a periodic scheduler and network monitor
//!
//! ## Architecture
//!
//! The engine implements a **push-then-pull** synchronization cycle:
//! 1. Push queued local changes (skipping ids with unresolved conflicts)
//! 2. Pull remote changes from the last known server sequence
//! 3. Classify each remote change against the pending queue
//! 4. Apply clean outcomes through the storage collaborator, record
//!    conflicts for explicit user resolution
//!
//! ## Key invariants
//!
//! - No local edit is ever silently discarded
//! - Equal content hashes never produce a conflict, whatever the versions
//! - At most one conflict per document id
//! - The pull watermark advances only after a whole pulled batch applied
//! - Exactly one sync cycle is in flight at a time; concurrent triggers
//!   coalesce onto the in-flight cycle's result

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod config;
mod conflicts;
mod detect;
mod engine;
mod error;
mod http;
mod network;
mod queue;
mod status;
mod storage;
mod transport;

pub use config::{SyncConfig, MAX_SYNC_INTERVAL, MIN_SYNC_INTERVAL};
pub use conflicts::ConflictStore;
pub use detect::{classify, RemoteOutcome};
pub use engine::{SyncEngine, SyncSummary};
pub use error::{SyncError, SyncResult};
pub use http::{HttpClient, HttpTransport};
pub use network::{NetworkListener, NetworkMonitor, ToggleNetworkMonitor};
pub use queue::{ChangeQueue, PendingChange};
pub use status::{StatusListener, SubscriptionId, SyncState, SyncStatus};
pub use storage::{MemoryNoteStore, NoteStore};
pub use transport::{MockTransport, SyncTransport};
