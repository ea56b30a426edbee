use std::{
    collections::BTreeSet,
    path::PathBuf,
    sync::{
        atomic::{AtomicU64, Ordering},
        mpsc::{Receiver, RecvTimeoutError},
        Arc,
    },
    thread::{self, JoinHandle},
    time::{Duration, Instant},
};

use tracing::warn;

use crate::{
    filter::watchable_note_path,
    types::{now_unix_ms, EventBatch, WatchConfig},
};

const IDLE_POLL_INTERVAL_MS: u64 = 200;

pub(crate) enum WorkerMessage {
    RawEvent(notify::Event),
    Stop,
}

#[derive(Debug, Default)]
struct PendingBatch {
    paths: BTreeSet<String>,
    rescan: bool,
}

impl PendingBatch {
    fn apply_notify_event(&mut self, vault_root: &PathBuf, event: &notify::Event) {
        use notify::EventKind;

        match event.kind {
            EventKind::Create(_) | EventKind::Modify(_) | EventKind::Remove(_) => {}
            EventKind::Any | EventKind::Other => {}
            EventKind::Access(_) => return,
        }

        for path in &event.paths {
            if let Some(rel) = watchable_note_path(vault_root, path) {
                self.paths.insert(rel);
            }
        }
    }

    /// Fold backend losses into the batch: any dropped event degrades to a
    /// full-vault rescan rather than a silently missed change.
    fn absorb_dropped(&mut self, dropped: u64) -> bool {
        if dropped == 0 {
            return false;
        }

        warn!(dropped, "event channel overflowed, scheduling full rescan");
        self.rescan = true;
        true
    }

    fn has_changes(&self) -> bool {
        self.rescan || !self.paths.is_empty()
    }

    fn take_batch(&mut self, seq: u64) -> Option<EventBatch> {
        let batch = EventBatch {
            seq,
            paths: std::mem::take(&mut self.paths).into_iter().collect(),
            rescan: std::mem::replace(&mut self.rescan, false),
            emitted_at_unix_ms: now_unix_ms(),
        };

        batch.has_payload().then_some(batch)
    }
}

pub(crate) fn spawn_worker(
    vault_root: PathBuf,
    config: WatchConfig,
    rx: Receiver<WorkerMessage>,
    dropped_events: Arc<AtomicU64>,
    mut on_batch: Box<dyn FnMut(EventBatch) + Send + 'static>,
) -> JoinHandle<()> {
    thread::spawn(move || {
        let debounce = Duration::from_millis(config.debounce_ms);
        let idle_poll = Duration::from_millis(IDLE_POLL_INTERVAL_MS);

        let mut pending = PendingBatch::default();
        let mut seq: u64 = 0;
        let mut last_input_at: Option<Instant> = None;

        loop {
            let now = Instant::now();
            if pending.absorb_dropped(dropped_events.swap(0, Ordering::SeqCst)) {
                last_input_at = Some(now);
            }

            if should_flush(&pending, last_input_at, debounce, now) {
                seq += 1;
                if let Some(batch) = pending.take_batch(seq) {
                    on_batch(batch);
                }
                last_input_at = None;
            }

            let timeout = next_timeout(&pending, last_input_at, debounce, now, idle_poll);
            match rx.recv_timeout(timeout) {
                Ok(WorkerMessage::RawEvent(event)) => {
                    pending.apply_notify_event(&vault_root, &event);
                    if pending.has_changes() {
                        last_input_at = Some(Instant::now());
                    }
                }
                Ok(WorkerMessage::Stop) => {
                    pending.absorb_dropped(dropped_events.swap(0, Ordering::SeqCst));
                    if pending.has_changes() {
                        seq += 1;
                        if let Some(batch) = pending.take_batch(seq) {
                            on_batch(batch);
                        }
                    }
                    break;
                }
                Err(RecvTimeoutError::Timeout) => continue,
                Err(RecvTimeoutError::Disconnected) => break,
            }
        }
    })
}

fn should_flush(
    pending: &PendingBatch,
    last_input_at: Option<Instant>,
    debounce: Duration,
    now: Instant,
) -> bool {
    if !pending.has_changes() {
        return false;
    }

    let Some(last_input_at) = last_input_at else {
        return true;
    };

    now.duration_since(last_input_at) >= debounce
}

fn next_timeout(
    pending: &PendingBatch,
    last_input_at: Option<Instant>,
    debounce: Duration,
    now: Instant,
    idle_poll: Duration,
) -> Duration {
    let mut timeout = idle_poll;

    if let Some(last_input_at) = last_input_at {
        if pending.has_changes() {
            let deadline = last_input_at + debounce;
            timeout = timeout.min(
                deadline
                    .checked_duration_since(now)
                    .unwrap_or_else(|| Duration::from_millis(0)),
            );
        }
    }

    timeout
}
