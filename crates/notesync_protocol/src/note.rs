//! Note document model and content hashing.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// A note document as exchanged with the sync server.
///
/// Notes are owned by the external storage layer; the engine holds
/// transient clones only. `version` is the server-assigned monotonically
/// increasing integer per document; `0` means the note has never been
/// accepted by the server (no sync metadata).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Note {
    /// Document identifier.
    pub id: String,
    /// Title shown in the note list.
    pub title: String,
    /// Body text.
    pub content: String,
    /// Server-assigned version, `0` if never synced.
    #[serde(default)]
    pub version: u64,
    /// Last local modification time.
    pub updated_at: DateTime<Utc>,
}

impl Note {
    /// Creates a fresh, never-synced note.
    pub fn new(id: impl Into<String>, title: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            title: title.into(),
            content: content.into(),
            version: 0,
            updated_at: Utc::now(),
        }
    }

    /// Returns true if the note carries sync metadata (was accepted by a
    /// server at least once).
    pub fn is_synced(&self) -> bool {
        self.version > 0
    }
}

/// Computes the stable content hash of a note.
///
/// The hash covers normalized title and body only, never version numbers
/// or timestamps, so two byte-identical documents always compare equal
/// regardless of server metadata. This is what distinguishes a true
/// conflict from version-only divergence (e.g. a metadata-only server
/// version bump).
///
/// Normalization folds CRLF and bare CR line endings to LF and strips
/// trailing whitespace from every line. Title and body are
/// domain-separated so moving text between them changes the hash.
pub fn content_hash(note: &Note) -> String {
    let mut hasher = Sha256::new();
    hasher.update(normalize(&note.title).as_bytes());
    hasher.update([0u8]);
    hasher.update(normalize(&note.content).as_bytes());
    let digest = hasher.finalize();
    let mut out = String::with_capacity(64);
    for byte in digest {
        out.push_str(&format!("{byte:02x}"));
    }
    out
}

fn normalize(text: &str) -> String {
    let unified = text.replace("\r\n", "\n").replace('\r', "\n");
    let mut lines: Vec<&str> = unified.split('\n').map(str::trim_end).collect();
    // Trailing blank lines do not change content identity.
    while lines.last() == Some(&"") {
        lines.pop();
    }
    lines.join("\n")
}
