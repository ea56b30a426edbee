use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// One debounced batch of vault changes.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct EventBatch {
    pub seq: u64,
    /// Affected markdown files, vault-relative, sorted and deduplicated.
    pub paths: Vec<String>,
    /// Set when events were dropped and the consumer should treat the whole
    /// vault as changed.
    pub rescan: bool,
    pub emitted_at_unix_ms: u64,
}

impl EventBatch {
    pub(crate) fn has_payload(&self) -> bool {
        self.rescan || !self.paths.is_empty()
    }
}

#[derive(Debug, Clone)]
pub struct WatchConfig {
    /// Trailing quiet period before a batch is emitted.
    pub debounce_ms: u64,
    pub channel_capacity: usize,
    pub recursive: bool,
}

impl Default for WatchConfig {
    fn default() -> Self {
        Self {
            debounce_ms: 2000,
            channel_capacity: 4096,
            recursive: true,
        }
    }
}

impl WatchConfig {
    pub(crate) fn normalized(&self) -> Self {
        Self {
            debounce_ms: self.debounce_ms.max(1),
            channel_capacity: self.channel_capacity.max(1),
            recursive: self.recursive,
        }
    }
}

#[derive(Debug, Error)]
pub enum VaultWatchError {
    #[error("watch root {path} is unusable: {reason}")]
    InvalidRoot { path: String, reason: String },
    #[error("failed to initialize watch backend: {0}")]
    WatcherInit(#[from] notify::Error),
    #[error("failed to subscribe to {path}: {source}")]
    Subscribe { path: String, source: notify::Error },
    #[error("debounce worker did not shut down cleanly")]
    WorkerJoin,
}

pub(crate) fn now_unix_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|duration| duration.as_millis() as u64)
        .unwrap_or(0)
}
