//! Engine configuration, persisted as a small JSON document.

use crate::error::SyncResult;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use std::time::Duration;

/// Lower bound for the periodic sync interval.
pub const MIN_SYNC_INTERVAL: Duration = Duration::from_secs(5);

/// Upper bound for the periodic sync interval.
pub const MAX_SYNC_INTERVAL: Duration = Duration::from_secs(3600);

const DEFAULT_SYNC_INTERVAL_MS: u64 = 60_000;

/// Persisted sync configuration.
///
/// `last_sync_sequence` is the server-assigned watermark below which all
/// remote changes are known to be applied locally.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncConfig {
    /// Whether sync is enabled for this device.
    pub enabled: bool,
    /// Base URL of the sync server.
    pub server_url: String,
    /// Identifier of this device, unique per installation.
    pub device_id: String,
    /// When sync was first enabled on this device.
    #[serde(default)]
    pub enabled_at: Option<DateTime<Utc>>,
    /// Pull watermark: all server sequences up to and including this one
    /// have been applied locally.
    #[serde(default)]
    pub last_sync_sequence: u64,
    /// Periodic sync interval in milliseconds; clamped on use.
    #[serde(default = "default_interval_ms")]
    pub sync_interval_ms: u64,
}

fn default_interval_ms() -> u64 {
    DEFAULT_SYNC_INTERVAL_MS
}

impl SyncConfig {
    /// Creates an enabled configuration with the default interval.
    pub fn new(server_url: impl Into<String>, device_id: impl Into<String>) -> Self {
        Self {
            enabled: true,
            server_url: server_url.into(),
            device_id: device_id.into(),
            enabled_at: Some(Utc::now()),
            last_sync_sequence: 0,
            sync_interval_ms: DEFAULT_SYNC_INTERVAL_MS,
        }
    }

    /// Sets the sync interval.
    pub fn with_sync_interval(mut self, interval: Duration) -> Self {
        self.sync_interval_ms = interval.as_millis() as u64;
        self
    }

    /// Returns the configured interval clamped to
    /// [`MIN_SYNC_INTERVAL`, `MAX_SYNC_INTERVAL`].
    pub fn clamped_interval(&self) -> Duration {
        Duration::from_millis(self.sync_interval_ms)
            .clamp(MIN_SYNC_INTERVAL, MAX_SYNC_INTERVAL)
    }

    /// Loads the configuration from a JSON document.
    pub fn load(path: &Path) -> SyncResult<Self> {
        let bytes = fs::read(path)?;
        Ok(serde_json::from_slice(&bytes)?)
    }

    /// Persists the configuration as a JSON document.
    pub fn save(&self, path: &Path) -> SyncResult<()> {
        let bytes = serde_json::to_vec_pretty(self)?;
        write_atomic(path, &bytes)
    }
}

/// Writes a file via a temporary sibling and rename, so readers never
/// observe a half-written document.
pub(crate) fn write_atomic(path: &Path, bytes: &[u8]) -> SyncResult<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)?;
        }
    }
    let tmp = path.with_extension("tmp");
    fs::write(&tmp, bytes)?;
    fs::rename(&tmp, path)?;
    Ok(())
}
