use std::{
    path::{Path, PathBuf},
    sync::{
        atomic::{AtomicU64, Ordering},
        mpsc::{self, SyncSender},
        Arc,
    },
    thread::JoinHandle,
};

use notify::{Config, RecommendedWatcher, RecursiveMode, Watcher};

use crate::{
    types::{EventBatch, VaultWatchError, WatchConfig},
    worker::{spawn_worker, WorkerMessage},
};

/// Running watcher. Dropping the handle stops the watcher and joins the
/// debounce worker.
pub struct VaultWatcherHandle {
    inner: Option<WatcherParts>,
}

struct WatcherParts {
    watcher: RecommendedWatcher,
    control_tx: SyncSender<WorkerMessage>,
    worker: JoinHandle<()>,
}

impl VaultWatcherHandle {
    pub fn stop(mut self) -> Result<(), VaultWatchError> {
        self.shutdown()
    }

    fn shutdown(&mut self) -> Result<(), VaultWatchError> {
        let Some(parts) = self.inner.take() else {
            return Ok(());
        };

        // Tear down the backend before signalling the worker, so no event
        // can slip in behind the stop message.
        drop(parts.watcher);
        let _ = parts.control_tx.send(WorkerMessage::Stop);
        parts
            .worker
            .join()
            .map_err(|_| VaultWatchError::WorkerJoin)
    }
}

impl Drop for VaultWatcherHandle {
    fn drop(&mut self) {
        let _ = self.shutdown();
    }
}

/// Watch `vault_root` for markdown changes and deliver debounced batches to
/// `on_batch`. Events the bounded channel cannot absorb are counted rather
/// than lost; the worker folds that count into a `rescan` batch so the
/// consumer re-syncs the whole vault instead of missing changes.
pub fn start_vault_watch(
    vault_root: impl AsRef<Path>,
    config: WatchConfig,
    on_batch: impl FnMut(EventBatch) + Send + 'static,
) -> Result<VaultWatcherHandle, VaultWatchError> {
    let config = config.normalized();
    let vault_root = resolve_watch_root(vault_root.as_ref())?;

    let (event_tx, event_rx) = mpsc::sync_channel(config.channel_capacity);
    let dropped_events = Arc::new(AtomicU64::new(0));

    let worker = spawn_worker(
        vault_root.clone(),
        config.clone(),
        event_rx,
        Arc::clone(&dropped_events),
        Box::new(on_batch),
    );

    let forward_tx = event_tx.clone();
    let overflow = Arc::clone(&dropped_events);
    let mut watcher = RecommendedWatcher::new(
        move |outcome: Result<notify::Event, notify::Error>| {
            let accepted = match outcome {
                Ok(event) => forward_tx.try_send(WorkerMessage::RawEvent(event)).is_ok(),
                Err(_) => false,
            };
            if !accepted {
                overflow.fetch_add(1, Ordering::SeqCst);
            }
        },
        Config::default(),
    )?;

    let mode = if config.recursive {
        RecursiveMode::Recursive
    } else {
        RecursiveMode::NonRecursive
    };

    if let Err(source) = watcher.watch(&vault_root, mode) {
        drop(watcher);
        let _ = event_tx.send(WorkerMessage::Stop);
        let _ = worker.join();
        return Err(VaultWatchError::Subscribe {
            path: vault_root.display().to_string(),
            source,
        });
    }

    Ok(VaultWatcherHandle {
        inner: Some(WatcherParts {
            watcher,
            control_tx: event_tx,
            worker,
        }),
    })
}

fn resolve_watch_root(root: &Path) -> Result<PathBuf, VaultWatchError> {
    let invalid = |reason: String| VaultWatchError::InvalidRoot {
        path: root.display().to_string(),
        reason,
    };

    let metadata = std::fs::metadata(root).map_err(|source| invalid(source.to_string()))?;
    if !metadata.is_dir() {
        return Err(invalid("not a directory".to_string()));
    }

    root.canonicalize()
        .map_err(|source| invalid(format!("cannot canonicalize: {source}")))
}
