use vault_indexing::{SyncReport, SyncScheduler};
use vault_watch::{start_vault_watch, VaultWatcherHandle, WatchConfig};

use crate::{ApiContext, ApiError};

/// Run a full structural pass now.
pub async fn sync_structural(ctx: &ApiContext) -> Result<SyncReport, ApiError> {
    let store = ctx.store()?;
    vault_indexing::structural_sync(store, ctx.notes_root())
        .await
        .map_err(ApiError::from)
}

/// Run a full semantic pass now. Never triggered automatically; this is the
/// explicit entry point for (re-)embedding the corpus.
pub async fn sync_semantic(ctx: &ApiContext) -> Result<SyncReport, ApiError> {
    let store = ctx.store()?;
    vault_indexing::semantic_sync(store, ctx.notes_root(), ctx.encoder())
        .await
        .map_err(ApiError::from)
}

/// Watcher plus scheduler; dropping the handle stops auto-sync.
pub struct AutoSyncHandle {
    _watcher: VaultWatcherHandle,
    scheduler: SyncScheduler,
}

impl AutoSyncHandle {
    /// Queue a structural pass as if a filesystem batch had arrived.
    pub fn request_sync(&self) {
        self.scheduler.request_sync();
    }
}

/// Start the debounced watcher and wire its batches into the serialized
/// sync task. Refuses to start in degraded mode: without a store there is
/// nothing for a sync pass to write to.
pub fn start_auto_sync(ctx: &ApiContext) -> Result<AutoSyncHandle, ApiError> {
    let store = ctx.store()?.clone();
    let scheduler = SyncScheduler::start(store, ctx.notes_root().to_path_buf());

    let batch_scheduler = scheduler.clone();
    let watcher = start_vault_watch(ctx.notes_root(), WatchConfig::default(), move |_batch| {
        batch_scheduler.request_sync();
    })
    .map_err(|error| ApiError::Internal {
        message: format!("failed to start vault watcher: {error}"),
    })?;

    Ok(AutoSyncHandle {
        _watcher: watcher,
        scheduler,
    })
}
