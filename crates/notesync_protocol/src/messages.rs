//! Protocol messages for sync.
//!
//! All messages serialize to the document-level JSON wire shape with
//! camelCase field names.

use crate::note::Note;
use crate::operation::ChangeOperation;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A single change uploaded as part of a push request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PushChange {
    /// Document identifier.
    pub note_id: String,
    /// Kind of change.
    pub operation: ChangeOperation,
    /// Version the client last saw for this document.
    pub version: u64,
    /// Full document snapshot, present for create and update.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payload: Option<Note>,
}

/// Push request from client.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PushRequest {
    /// Identifier of the pushing device.
    pub device_id: String,
    /// Changes to upload.
    pub changes: Vec<PushChange>,
}

impl PushRequest {
    /// Creates a new push request.
    pub fn new(device_id: impl Into<String>, changes: Vec<PushChange>) -> Self {
        Self {
            device_id: device_id.into(),
            changes,
        }
    }
}

/// A change the server durably stored.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AcceptedChange {
    /// Document identifier.
    pub note_id: String,
    /// Version assigned by the server for this write.
    pub server_version: u64,
    /// Global sequence assigned by the server for this write.
    pub server_sequence: u64,
}

/// A conflict the server detected while applying a pushed change
/// (e.g. a stale version on write).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PushConflict {
    /// Document identifier.
    pub note_id: String,
    /// Version currently held by the server.
    pub server_version: u64,
    /// The server's copy of the document, absent if deleted server-side.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub note: Option<Note>,
}

/// A per-change failure reported by the server.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PushError {
    /// Document identifier.
    pub note_id: String,
    /// Human-readable failure description.
    pub message: String,
}

/// Push response from server.
///
/// Entries in `accepted` confirm durable storage; entries in `errors` must
/// remain queued for retry; entries in `conflicts` feed the same conflict
/// pipeline as pull-detected conflicts.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PushResponse {
    /// Changes durably stored server-side.
    #[serde(default)]
    pub accepted: Vec<AcceptedChange>,
    /// Server-detected conflicts.
    #[serde(default)]
    pub conflicts: Vec<PushConflict>,
    /// Per-change failures, left queued for retry.
    #[serde(default)]
    pub errors: Vec<PushError>,
}

impl PushResponse {
    /// Creates a response accepting every listed change.
    pub fn accepted(accepted: Vec<AcceptedChange>) -> Self {
        Self {
            accepted,
            conflicts: Vec::new(),
            errors: Vec::new(),
        }
    }
}

/// Pull request from client.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PullRequest {
    /// Server sequence to pull from (exclusive watermark).
    pub since_sequence: u64,
    /// Maximum number of changes to return.
    pub limit: u32,
}

impl PullRequest {
    /// Creates a new pull request.
    pub fn new(since_sequence: u64, limit: u32) -> Self {
        Self {
            since_sequence,
            limit,
        }
    }
}

/// A change downloaded from the server.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RemoteChange {
    /// Document identifier.
    pub note_id: String,
    /// Kind of change.
    pub operation: ChangeOperation,
    /// Server-assigned document version after this change.
    pub version: u64,
    /// Global server sequence of this change.
    pub server_sequence: u64,
    /// Full remote payload, present for create and update.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub note: Option<Note>,
    /// Server-side time of the change.
    pub timestamp: DateTime<Utc>,
}

/// Pull response from server.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PullResponse {
    /// Changes since the requested sequence.
    pub changes: Vec<RemoteChange>,
    /// Whether more pages remain; the client must keep pulling until this
    /// is false before advancing its watermark.
    pub has_more: bool,
    /// Highest sequence covered by this response.
    pub latest_sequence: u64,
    /// Server clock at response time.
    pub server_time: DateTime<Utc>,
}

impl PullResponse {
    /// Creates a new pull response.
    pub fn new(changes: Vec<RemoteChange>, latest_sequence: u64, has_more: bool) -> Self {
        Self {
            changes,
            has_more,
            latest_sequence,
            server_time: Utc::now(),
        }
    }

    /// Creates an empty final page at the given sequence.
    pub fn empty(latest_sequence: u64) -> Self {
        Self::new(Vec::new(), latest_sequence, false)
    }
}

/// Response to a reachability probe.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusResponse {
    /// Whether the server considers itself healthy.
    pub ok: bool,
    /// Server clock at response time.
    pub server_time: DateTime<Utc>,
}

impl StatusResponse {
    /// Creates a healthy status response.
    pub fn healthy() -> Self {
        Self {
            ok: true,
            server_time: Utc::now(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::{decode, encode};

    fn remote_update(note_id: &str, version: u64, sequence: u64) -> RemoteChange {
        RemoteChange {
            note_id: note_id.into(),
            operation: ChangeOperation::Update,
            version,
            server_sequence: sequence,
            note: Some(Note::new(note_id, "Remote", "remote body")),
            timestamp: Utc::now(),
        }
    }

    #[test]
    fn push_request_wire_shape() {
        let request = PushRequest::new(
            "device-1",
            vec![PushChange {
                note_id: "n1".into(),
                operation: ChangeOperation::Update,
                version: 2,
                payload: Some(Note::new("n1", "T", "c")),
            }],
        );

        let json: serde_json::Value = serde_json::to_value(&request).unwrap();
        assert_eq!(json["deviceId"], "device-1");
        assert_eq!(json["changes"][0]["noteId"], "n1");
        assert_eq!(json["changes"][0]["operation"], "update");
        assert_eq!(json["changes"][0]["version"], 2);
    }

    #[test]
    fn push_delete_omits_payload() {
        let change = PushChange {
            note_id: "n1".into(),
            operation: ChangeOperation::Delete,
            version: 3,
            payload: None,
        };
        let json = serde_json::to_value(&change).unwrap();
        assert!(json.get("payload").is_none());
    }

    #[test]
    fn push_response_roundtrip() {
        let response = PushResponse {
            accepted: vec![AcceptedChange {
                note_id: "n1".into(),
                server_version: 3,
                server_sequence: 17,
            }],
            conflicts: vec![PushConflict {
                note_id: "n2".into(),
                server_version: 5,
                note: Some(Note::new("n2", "Server", "server body")),
            }],
            errors: vec![PushError {
                note_id: "n3".into(),
                message: "quota exceeded".into(),
            }],
        };

        let bytes = encode(&response).unwrap();
        let decoded: PushResponse = decode(&bytes).unwrap();
        assert_eq!(decoded, response);

        let json: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(json["accepted"][0]["serverVersion"], 3);
        assert_eq!(json["accepted"][0]["serverSequence"], 17);
        assert_eq!(json["errors"][0]["message"], "quota exceeded");
    }

    #[test]
    fn push_response_defaults_missing_arrays() {
        let decoded: PushResponse = decode(b"{}").unwrap();
        assert!(decoded.accepted.is_empty());
        assert!(decoded.conflicts.is_empty());
        assert!(decoded.errors.is_empty());
    }

    #[test]
    fn pull_response_wire_shape() {
        let response = PullResponse::new(vec![remote_update("n1", 3, 42)], 42, true);
        let json = serde_json::to_value(&response).unwrap();
        assert_eq!(json["hasMore"], true);
        assert_eq!(json["latestSequence"], 42);
        assert!(json.get("serverTime").is_some());
        assert_eq!(json["changes"][0]["serverSequence"], 42);
        assert!(json["changes"][0].get("timestamp").is_some());
    }

    #[test]
    fn pull_response_roundtrip() {
        let response = PullResponse::new(vec![remote_update("n1", 1, 5)], 5, false);
        let bytes = encode(&response).unwrap();
        let decoded: PullResponse = decode(&bytes).unwrap();
        assert_eq!(decoded.changes.len(), 1);
        assert_eq!(decoded.latest_sequence, 5);
        assert!(!decoded.has_more);
    }

    #[test]
    fn status_response_wire_shape() {
        let json = serde_json::to_value(StatusResponse::healthy()).unwrap();
        assert_eq!(json["ok"], true);
        assert!(json.get("serverTime").is_some());
    }

    #[test]
    fn server_time_is_iso8601() {
        let bytes = encode(&StatusResponse::healthy()).unwrap();
        let json: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        let server_time = json["serverTime"].as_str().unwrap();
        assert!(server_time.contains('T'));
        assert!(chrono::DateTime::parse_from_rfc3339(server_time).is_ok());
    }
}
