use std::path::PathBuf;

use graph_store::GraphStore;
use tokio::sync::mpsc;
use tracing::{debug, warn};

use crate::structural_sync;

/// Serialized structural-sync driver with latest-wins coalescing.
///
/// Requests land in a single-slot queue: while a pass is queued, further
/// requests are dropped because the queued pass will observe their
/// filesystem state anyway. At most one pass runs at a time and passes are
/// never cancelled; a request arriving mid-pass queues exactly one follow-up.
#[derive(Debug, Clone)]
pub struct SyncScheduler {
    tx: mpsc::Sender<()>,
}

impl SyncScheduler {
    /// Spawn the sync task. The scheduler refuses nothing here; degraded-mode
    /// checks belong to the caller, which should not start a scheduler
    /// without a working store.
    pub fn start(store: GraphStore, notes_root: PathBuf) -> Self {
        let (tx, mut rx) = mpsc::channel::<()>(1);

        tokio::spawn(async move {
            while rx.recv().await.is_some() {
                match structural_sync(&store, &notes_root).await {
                    Ok(report) => debug!(
                        processed = report.processed,
                        errored = report.errored,
                        "scheduled structural sync finished"
                    ),
                    Err(error) => warn!(%error, "scheduled structural sync failed"),
                }
            }
        });

        Self { tx }
    }

    /// Request a structural pass. Returns immediately; bursts coalesce into
    /// a single pass after the one in flight (if any) completes.
    pub fn request_sync(&self) {
        // A full queue means a pass is already pending for this state.
        let _ = self.tx.try_send(());
    }
}
