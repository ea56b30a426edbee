//! Debounced filesystem watcher for a notes vault.
//!
//! Observes the vault recursively and coalesces bursts of markdown changes
//! with a trailing debounce: a batch is delivered only after the configured
//! quiet period follows the last relevant event. Events under `.trash/` and
//! other dot-directories are ignored, as is anything that is not a `.md`
//! file. The consumer triggers a structural sync per batch; semantic sync is
//! never driven from here.

mod engine;
mod filter;
mod types;
mod worker;

pub use engine::{start_vault_watch, VaultWatcherHandle};
pub use types::{EventBatch, VaultWatchError, WatchConfig};
