//! Filesystem-driven refresh
//!
//! Watches a set of paths and turns debounced change events into transform
//! runs, so file-backed source plugins pick up edits without polling. The
//! engine's single-flight rule coalesces event bursts that outrun a run.

use std::path::PathBuf;
use std::sync::mpsc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use anyhow::{Context as _, Result};
use notify::RecursiveMode;
use notify_debouncer_mini::{new_debouncer, DebouncedEventKind, Debouncer};

use crate::engine::Engine;

/// A running watcher; dropping it stops the watch thread
pub struct RefreshWatcher {
    // Kept alive for its side effect; events stop when this drops.
    debouncer: Option<Debouncer<notify::RecommendedWatcher>>,
    thread: Option<JoinHandle<()>>,
}

impl Drop for RefreshWatcher {
    fn drop(&mut self) {
        // The debouncer must go before the join: it owns the channel
        // sender, and the receive loop only ends once that disconnects.
        drop(self.debouncer.take());
        if let Some(thread) = self.thread.take() {
            let _ = thread.join();
        }
    }
}

/// Starts watching `paths` recursively and triggers a transform run on the
/// engine after each debounced batch of changes.
pub fn watch_paths(
    engine: &Engine,
    paths: &[PathBuf],
    debounce: Duration,
) -> Result<RefreshWatcher> {
    let (tx, rx) = mpsc::channel();

    let mut debouncer = new_debouncer(debounce, tx).context("Failed to create file watcher")?;

    for path in paths {
        debouncer
            .watcher()
            .watch(path, RecursiveMode::Recursive)
            .with_context(|| format!("Failed to watch {}", path.display()))?;
    }

    let refresh = engine.refresh_handle();

    let thread = thread::spawn(move || {
        while let Ok(batch) = rx.recv() {
            match batch {
                Ok(events) => {
                    let relevant = events
                        .iter()
                        .any(|event| event.kind == DebouncedEventKind::Any);
                    if relevant {
                        tracing::debug!(count = events.len(), "file changes, refreshing");
                        refresh.trigger();
                    }
                }
                Err(error) => {
                    tracing::debug!(?error, "watch error");
                }
            }
        }
    });

    Ok(RefreshWatcher {
        debouncer: Some(debouncer),
        thread: Some(thread),
    })
}
