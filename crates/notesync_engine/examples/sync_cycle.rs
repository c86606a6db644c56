//! Walks through a full sync lifecycle against a scripted in-memory server:
//! an offline edit, a conflicting remote edit, and a keep-both resolution.
//!
//! Run with `RUST_LOG=debug cargo run --example sync_cycle` to watch the
//! engine's internal logging.

use notesync_engine::{
    MemoryNoteStore, MockTransport, SyncConfig, SyncEngine, ToggleNetworkMonitor,
};
use notesync_protocol::{
    ChangeOperation, Note, PullResponse, PushResponse, RemoteChange, Resolution,
};
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let transport = Arc::new(MockTransport::new());
    let store = Arc::new(MemoryNoteStore::new());
    let network = Arc::new(ToggleNetworkMonitor::new(false));
    let engine = Arc::new(SyncEngine::new(
        SyncConfig::new("https://sync.example.com", "demo-device"),
        Arc::clone(&transport),
        Arc::clone(&store),
        Arc::clone(&network),
    ));

    engine.on_status_change(Box::new(|status| {
        println!(
            "status: {:?} ({} pending, {} conflicts)",
            status.state, status.pending_count, status.conflict_count
        );
    }));

    // Edit a note while offline; the change queues locally.
    let mut groceries = Note::new("groceries", "Groceries", "milk\neggs");
    groceries.version = 2;
    store.insert(groceries.clone());
    engine.queue_change(groceries, ChangeOperation::Update);

    println!("offline edit queued; triggering sync while offline:");
    let summary = engine.trigger_sync()?;
    println!("  pushed={} pulled={}", summary.pushed, summary.pulled);

    // Meanwhile another device rewrote the same note server-side.
    transport.enqueue_push_response(PushResponse::default());
    transport.enqueue_pull_page(PullResponse::new(
        vec![RemoteChange {
            note_id: "groceries".into(),
            operation: ChangeOperation::Update,
            version: 3,
            server_sequence: 1,
            note: Some({
                let mut n = Note::new("groceries", "Groceries", "milk\nbread\nbutter");
                n.version = 3;
                n
            }),
            timestamp: chrono::Utc::now(),
        }],
        1,
        false,
    ));

    network.set_online(true);
    println!("back online; syncing:");
    let summary = engine.trigger_sync()?;
    println!(
        "  pushed={} pulled={} conflicts={}",
        summary.pushed, summary.pulled, summary.conflicts
    );

    for conflict in engine.get_conflicts() {
        println!(
            "conflict on {:?}: local v{} vs remote v{}",
            conflict.note_id, conflict.local_version, conflict.remote_version
        );
    }

    // Keep both: the remote edit wins the original id, the local edit
    // survives as a new note.
    let result = engine.resolve_conflict("groceries", Resolution::KeepBoth)?;
    if let Some(copy) = &result.copy_note {
        println!("local edit preserved as {:?} ({:?})", copy.id, copy.title);
    }

    let summary = engine.trigger_sync()?;
    println!("after resolution: pushed={}", summary.pushed);
    println!("notes in store:");
    for note in store.notes() {
        println!("  {:>12} v{} {:?}", note.id, note.version, note.title);
    }

    engine.shutdown()?;
    Ok(())
}
