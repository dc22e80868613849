//! Watch mode: file events → debounce → delete-then-reindex.
//!
//! Events, the debounce timer and the indexing work all funnel into one
//! task; writes go through the same orchestrator mutex as a build, so a
//! search can never observe a half-replaced file.

use std::path::PathBuf;
use std::time::Duration;

use notify::RecursiveMode;
use notify_debouncer_mini::new_debouncer;
use notify_debouncer_mini::DebounceEventResult;
use tokio::sync::mpsc;
use tracing::debug;
use tracing::info;
use tracing::warn;

use crate::error::Result;
use crate::error::RetrievalErr;
use crate::indexing::walker::FileWalker;
use crate::indexing::Indexer;

/// Quiescence window before pending paths are processed.
const DEBOUNCE: Duration = Duration::from_millis(500);

/// Watch the project tree until the indexer's cancellation token fires.
///
/// Each debounced path is removed from the index if the file is gone, or
/// deleted-then-reindexed if it still exists.
pub async fn watch(indexer: &Indexer) -> Result<()> {
    let root = indexer.paths().root.clone();
    let walker = FileWalker::new(&root, &indexer.config().exclude);
    let cancel = indexer.cancel_token();

    let (tx, mut rx) = mpsc::channel::<Vec<PathBuf>>(64);

    // The debouncer delivers coalesced events on its own thread; bridge
    // them into the async world.
    let mut debouncer = new_debouncer(DEBOUNCE, move |result: DebounceEventResult| match result {
        Ok(events) => {
            let paths: Vec<PathBuf> = events.into_iter().map(|e| e.path).collect();
            if !paths.is_empty() {
                let _ = tx.blocking_send(paths);
            }
        }
        Err(e) => warn!(error = %e, "File watcher error"),
    })
    .map_err(|e| RetrievalErr::Watcher(e.to_string()))?;

    debouncer
        .watcher()
        .watch(&root, RecursiveMode::Recursive)
        .map_err(|e| RetrievalErr::Watcher(e.to_string()))?;

    info!(root = %root.display(), "Watching for changes");

    loop {
        tokio::select! {
            biased;

            _ = cancel.cancelled() => {
                info!("Watch cancelled");
                break;
            }

            batch = rx.recv() => {
                let Some(paths) = batch else { break };
                let mut touched = 0usize;
                for path in paths {
                    let Some(rel) = walker.indexable_rel(&path) else {
                        continue;
                    };
                    touched += 1;
                    if path.exists() {
                        match indexer.reindex_file(&rel, &path).await {
                            Ok(chunks) => debug!(file = rel, chunks, "Reindexed"),
                            Err(e) => warn!(file = rel, error = %e, "Reindex failed"),
                        }
                    } else {
                        match indexer.remove_file(&rel).await {
                            Ok(()) => debug!(file = rel, "Removed"),
                            Err(e) => warn!(file = rel, error = %e, "Remove failed"),
                        }
                    }
                }
                if touched > 0 {
                    if let Err(e) = indexer.finalize().await {
                        warn!(error = %e, "Savepoint after watch batch failed");
                    }
                }
            }
        }
    }

    // Final save so partial watch progress survives the process.
    indexer.finalize().await
}

#[cfg(test)]
#[path = "watcher.test.rs"]
mod tests;
