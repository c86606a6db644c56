//! # NoteSync Protocol
//!
//! Sync protocol types and JSON codecs for NoteSync.
//!
//! This crate provides:
//! - `Note` document model and content hashing
//! - `ChangeOperation` for replicated edits
//! - Protocol messages (Push, Pull, Status) with their JSON wire shape
//! - `Conflict`, `Resolution` and `ResolutionResult` for conflict handling
//!
//! This is a pure protocol crate with no I/O operations. The wire shape is
//! document-level JSON with camelCase field names; messages round-trip
//! through [`encode`] / [`decode`].

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod codec;
mod conflict;
mod messages;
mod note;
mod operation;

pub use codec::{decode, encode, ProtocolError, ProtocolResult};
pub use conflict::{
    conflict_copy_title, Conflict, ConflictKind, Resolution, ResolutionResult,
    CONFLICT_COPY_MARKER,
};
pub use messages::{
    AcceptedChange, PullRequest, PullResponse, PushChange, PushConflict, PushError, PushRequest,
    PushResponse, RemoteChange, StatusResponse,
};
pub use note::{content_hash, Note};
pub use operation::ChangeOperation;
