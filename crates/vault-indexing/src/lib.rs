//! Two-layer sync between the notes directory and the store.
//!
//! The structural pass is cheap and always safe: it mirrors every note into
//! the `note` table and rebuilds its `tagged_with`/`links_to` edges. The
//! semantic pass is expensive and incremental: it re-chunks and re-embeds
//! only notes whose content hash changed. The two layers merge on the note
//! `path`; structural sync owns the `note` hub and its edges, semantic sync
//! only ever touches `chunk` and `from_document`.

mod chunking;
mod scheduler;
mod semantic;
mod structural;

#[cfg(test)]
mod tests;

use serde::Serialize;

pub use chunking::{chunk_text, CHUNK_CHARS, CHUNK_OVERLAP};
pub use scheduler::SyncScheduler;
pub use semantic::semantic_sync;
pub use structural::{structural_sync, structural_sync_note};

/// What happened during one sync pass.
#[derive(Debug, Default, Clone, Serialize)]
pub struct SyncReport {
    /// Notes that were (re)written to the store this pass.
    pub processed: usize,
    /// Notes left untouched because nothing changed.
    pub skipped: usize,
    /// Notes that failed and were skipped; details go to the log.
    pub errored: usize,
    /// Chunk records written by the semantic pass.
    pub chunks_written: usize,
}

pub(crate) fn now_unix_ms() -> i64 {
    use std::time::{SystemTime, UNIX_EPOCH};

    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .ok()
        .and_then(|duration| i64::try_from(duration.as_millis()).ok())
        .unwrap_or(0)
}

pub(crate) fn file_modified_ms(path: &std::path::Path) -> i64 {
    use std::time::UNIX_EPOCH;

    std::fs::metadata(path)
        .and_then(|metadata| metadata.modified())
        .ok()
        .and_then(|time| time.duration_since(UNIX_EPOCH).ok())
        .and_then(|duration| i64::try_from(duration.as_millis()).ok())
        .unwrap_or_else(now_unix_ms)
}
