//! Indexer orchestrator: full builds, incremental updates, lifecycle.
//!
//! Owns the extractor pools, embedding provider, metadata store and ANN
//! index. File processing is sharded across workers; every paired metadata/vector
//! write happens under one orchestrator mutex so that a chunk row with a
//! vector slot always has a live vector behind it.

use std::collections::HashSet;
use std::path::PathBuf;
use std::sync::atomic::AtomicU64;
use std::sync::atomic::Ordering;
use std::sync::Arc;

use futures::stream;
use futures::StreamExt;
use tokio::sync::mpsc;
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;
use tracing::debug;
use tracing::info;
use tracing::warn;
use zrok_lsp::ClientPool;

use crate::chunking::ChunkExtractor;
use crate::config::IndexConfig;
use crate::config::StatePaths;
use crate::embeddings::create_provider;
use crate::embeddings::embed_batch_with_retry;
use crate::embeddings::EmbeddingProvider;
use crate::error::Result;
use crate::error::RetrievalErr;
use crate::indexing::memory;
use crate::indexing::walker::FileWalker;
use crate::storage::AnnIndex;
use crate::storage::ChunkStore;
use crate::storage::StoreStats;
use crate::types::content_hash;
use crate::types::Chunk;

/// File count at which the ANN index spills new vectors to disk.
const DISK_SPILL_THRESHOLD: usize = 50;

/// Outcome of a build or update pass.
#[derive(Debug, Clone, Default, serde::Serialize)]
pub struct BuildReport {
    pub files_seen: usize,
    pub files_indexed: usize,
    pub files_skipped: usize,
    pub files_removed: usize,
    pub chunks_indexed: usize,
}

/// Snapshot for `index status`.
#[derive(Debug, Clone, serde::Serialize)]
pub struct IndexStats {
    pub provider: String,
    pub model: String,
    pub dimension: usize,
    pub vectors: usize,
    #[serde(flatten)]
    pub store: StoreStats,
}

/// Shared state handed to worker tasks.
struct Shared {
    paths: StatePaths,
    config: IndexConfig,
    provider: Arc<dyn EmbeddingProvider>,
    store: Arc<ChunkStore>,
    ann: Arc<AnnIndex>,
    /// Serializes every paired metadata + vector write.
    write_lock: Mutex<()>,
}

/// The indexing core. One instance owns the index for the
/// process lifetime.
pub struct Indexer {
    shared: Arc<Shared>,
    cancel: CancellationToken,
}

impl Indexer {
    /// Open stores and construct the configured provider.
    ///
    /// A persisted ANN index whose dimension disagrees with the provider is
    /// a fatal configuration error.
    pub fn open(paths: StatePaths, config: IndexConfig) -> Result<Self> {
        let provider = create_provider(&config)?;
        Self::with_provider(paths, config, provider)
    }

    /// Open with an explicit provider (tests, embedded callers).
    pub fn with_provider(
        paths: StatePaths,
        config: IndexConfig,
        provider: Arc<dyn EmbeddingProvider>,
    ) -> Result<Self> {
        paths.ensure_dirs()?;

        let store = Arc::new(ChunkStore::open(&paths.chunks_db)?);
        let ann = if paths.vectors_bin.exists() {
            Arc::new(AnnIndex::load(&paths.vectors_bin, provider.dimension())?)
        } else {
            Arc::new(AnnIndex::new(provider.dimension()))
        };

        Ok(Self {
            shared: Arc::new(Shared {
                paths,
                config,
                provider,
                store,
                ann,
                write_lock: Mutex::new(()),
            }),
            cancel: CancellationToken::new(),
        })
    }

    /// Cancellation signal observed by build, update and watch.
    pub fn cancel_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Signal a running watch loop (or build) to stop. The final savepoint
    /// still runs before the operation returns.
    pub fn stop_watch(&self) {
        self.cancel.cancel();
    }

    pub fn provider(&self) -> &Arc<dyn EmbeddingProvider> {
        &self.shared.provider
    }

    pub fn store(&self) -> &Arc<ChunkStore> {
        &self.shared.store
    }

    pub fn ann(&self) -> &Arc<AnnIndex> {
        &self.shared.ann
    }

    pub fn paths(&self) -> &StatePaths {
        &self.shared.paths
    }

    pub fn config(&self) -> &IndexConfig {
        &self.shared.config
    }

    /// Full build. `force` clears both stores first.
    pub async fn build(&self, force: bool) -> Result<BuildReport> {
        if force {
            info!("Force build: clearing existing index");
            self.clear().await?;
        }

        let walker = FileWalker::new(&self.shared.paths.root, &self.shared.config.exclude);
        let files = walker.walk();
        info!(files = files.len(), "Starting index build");

        if files.len() >= DISK_SPILL_THRESHOLD {
            self.shared
                .ann
                .enable_disk_mode(&self.shared.paths.vectors_temp)?;
        }

        let report = self.index_files(files).await;

        // Final persistence happens even on cancellation: partial state on
        // disk must be valid.
        self.shared.ann.disable_disk_mode()?;
        self.finalize().await?;

        let report = report?;
        info!(
            indexed = report.files_indexed,
            skipped = report.files_skipped,
            chunks = report.chunks_indexed,
            "Index build finished"
        );
        Ok(report)
    }

    /// Incremental update: drop deleted files, index new ones, re-index
    /// files whose content hash changed.
    pub async fn update(&self) -> Result<BuildReport> {
        let walker = FileWalker::new(&self.shared.paths.root, &self.shared.config.exclude);
        let current: Vec<(String, PathBuf)> = walker.walk();
        let current_set: HashSet<&str> = current.iter().map(|(rel, _)| rel.as_str()).collect();

        let indexed = self.shared.store.files().await?;
        let mut report = BuildReport::default();

        // Removed files: delete rows, tombstone slots.
        for file in &indexed {
            if !current_set.contains(file.as_str()) {
                self.remove_file(file).await?;
                report.files_removed += 1;
            }
        }

        let indexed_set: HashSet<&str> = indexed.iter().map(String::as_str).collect();

        // New files index unconditionally; survivors re-index only when
        // the stored whole-file hash no longer matches the content.
        let mut to_index: Vec<(String, PathBuf)> = Vec::new();
        for (rel, abs) in current {
            if !indexed_set.contains(rel.as_str()) {
                to_index.push((rel, abs));
                continue;
            }
            match self.file_changed(&rel, &abs).await {
                Ok(true) => to_index.push((rel, abs)),
                Ok(false) => {}
                Err(e) => {
                    // Ambiguity re-indexes; better repeated work than a
                    // stale index.
                    debug!(file = rel, error = %e, "Change test failed, re-indexing");
                    to_index.push((rel, abs));
                }
            }
        }

        info!(
            new_or_changed = to_index.len(),
            removed = report.files_removed,
            "Incremental update"
        );

        let indexed_report = self.index_files(to_index).await;
        self.finalize().await?;
        let indexed_report = indexed_report?;

        report.files_seen = indexed_report.files_seen;
        report.files_indexed = indexed_report.files_indexed;
        report.files_skipped = indexed_report.files_skipped;
        report.chunks_indexed = indexed_report.chunks_indexed;
        Ok(report)
    }

    /// Delete one file from both stores, under the write mutex.
    pub async fn remove_file(&self, file: &str) -> Result<()> {
        remove_file(&self.shared, file).await
    }

    /// Re-index one file (watcher path): delete, extract, embed, insert.
    pub async fn reindex_file(&self, rel: &str, abs: &PathBuf) -> Result<usize> {
        let pool = make_pool(&self.shared);
        let extractor = ChunkExtractor::new(&self.shared.config, pool.clone());
        let result = index_one_file(&self.shared, &extractor, rel, abs).await;
        if let Some(pool) = pool {
            pool.shutdown().await;
        }
        result
    }

    /// Wipe the index entirely.
    pub async fn clear(&self) -> Result<()> {
        let _guard = self.shared.write_lock.lock().await;
        self.shared.store.clear().await?;
        self.shared.ann.clear();
        let _ = std::fs::remove_file(&self.shared.paths.vectors_bin);
        let _ = std::fs::remove_file(&self.shared.paths.vectors_temp);
        Ok(())
    }

    /// Aggregate statistics for `index status`.
    pub async fn stats(&self) -> Result<IndexStats> {
        let store = self.shared.store.stats().await?;
        Ok(IndexStats {
            provider: self.shared.provider.name().to_string(),
            model: self
                .shared
                .config
                .model
                .clone()
                .unwrap_or_else(|| "default".to_string()),
            dimension: self.shared.provider.dimension(),
            vectors: self.shared.ann.len(),
            store,
        })
    }

    /// Persist both stores.
    pub async fn finalize(&self) -> Result<()> {
        self.shared.ann.save(&self.shared.paths.vectors_bin)?;
        self.shared.store.checkpoint().await?;
        Ok(())
    }

    /// Final save and shutdown.
    pub async fn close(&self) -> Result<()> {
        self.cancel.cancel();
        self.finalize().await
    }

    // -- internal ----------------------------------------------------------

    /// Shard `files` across workers and index every one.
    async fn index_files(&self, files: Vec<(String, PathBuf)>) -> Result<BuildReport> {
        let total = files.len();
        if total == 0 {
            return Ok(BuildReport::default());
        }

        let workers = memory::auto_worker_count(self.shared.config.file_workers);
        // Shallow queue: back-pressure beats a long cancellation drain.
        let (tx, rx) = mpsc::channel::<(String, PathBuf)>(2 * workers);
        let rx = Arc::new(Mutex::new(rx));

        let indexed = Arc::new(AtomicU64::new(0));
        let skipped = Arc::new(AtomicU64::new(0));
        let chunks_total = Arc::new(AtomicU64::new(0));
        let processed = Arc::new(AtomicU64::new(0));

        info!(workers, files = total, "Spawning file workers");

        let mut handles = Vec::with_capacity(workers);
        for worker_id in 0..workers {
            let rx = Arc::clone(&rx);
            let indexed = Arc::clone(&indexed);
            let skipped = Arc::clone(&skipped);
            let chunks_total = Arc::clone(&chunks_total);
            let processed = Arc::clone(&processed);
            let cancel = self.cancel.clone();
            let shared = Arc::clone(&self.shared);
            let reset_interval = self.shared.config.lsp_reset_interval.max(1);
            let shrink_interval = self.shared.config.file_batch_size.max(1) as u64;

            handles.push(tokio::spawn(async move {
                let pool = make_pool(&shared);
                let extractor = ChunkExtractor::new(&shared.config, pool.clone());
                let mut since_reset = 0usize;

                loop {
                    if cancel.is_cancelled() {
                        break;
                    }
                    let next = { rx.lock().await.recv().await };
                    let Some((rel, abs)) = next else {
                        break;
                    };

                    match index_one_file(&shared, &extractor, &rel, &abs).await {
                        Ok(0) => {
                            skipped.fetch_add(1, Ordering::Relaxed);
                        }
                        Ok(count) => {
                            indexed.fetch_add(1, Ordering::Relaxed);
                            chunks_total.fetch_add(count as u64, Ordering::Relaxed);
                        }
                        Err(e) => {
                            warn!(file = rel, error = %e, "Skipping file");
                            skipped.fetch_add(1, Ordering::Relaxed);
                        }
                    }

                    // Periodic pool recycle bounds language-server memory.
                    since_reset += 1;
                    if since_reset >= reset_interval {
                        since_reset = 0;
                        if let Some(pool) = &pool {
                            debug!(worker_id, "Resetting LSP pool");
                            pool.reset().await;
                        }
                    }

                    let done = processed.fetch_add(1, Ordering::AcqRel) + 1;
                    if done % shrink_interval == 0 {
                        shrink_pass(&shared).await;
                    }
                    if done % (4 * shrink_interval) == 0 {
                        if let Err(e) = savepoint(&shared).await {
                            warn!(error = %e, "Savepoint failed");
                        }
                    }
                }

                if let Some(pool) = pool {
                    pool.shutdown().await;
                }
            }));
        }

        // Feed the channel; stop on cancellation so workers drain quickly.
        let mut cancelled = false;
        for file in files {
            if self.cancel.is_cancelled() {
                cancelled = true;
                break;
            }
            if tx.send(file).await.is_err() {
                break;
            }
        }
        drop(tx);

        for handle in handles {
            let _ = handle.await;
        }

        if cancelled || self.cancel.is_cancelled() {
            return Err(RetrievalErr::Cancelled);
        }

        Ok(BuildReport {
            files_seen: total,
            files_indexed: indexed.load(Ordering::Relaxed) as usize,
            files_skipped: skipped.load(Ordering::Relaxed) as usize,
            files_removed: 0,
            chunks_indexed: chunks_total.load(Ordering::Relaxed) as usize,
        })
    }

    /// Whole-file change test: stored hash vs freshly hashed content.
    async fn file_changed(&self, rel: &str, abs: &PathBuf) -> Result<bool> {
        let Some(stored) = self.shared.store.file_hash(rel).await? else {
            return Ok(true);
        };
        let raw = tokio::fs::read(abs).await?;
        let current = content_hash(&String::from_utf8_lossy(&raw));
        Ok(stored != current)
    }
}

fn make_pool(shared: &Shared) -> Option<Arc<ClientPool>> {
    match shared.config.extraction_mode.as_str() {
        "regex" | "regex-only" => None,
        _ => Some(Arc::new(ClientPool::new(&shared.paths.root))),
    }
}

async fn remove_file(shared: &Shared, file: &str) -> Result<()> {
    let _guard = shared.write_lock.lock().await;
    let freed = shared.store.delete_by_file(file).await?;
    for slot in &freed {
        shared.ann.delete(*slot);
    }
    debug!(file, slots = freed.len(), "Removed file from index");
    Ok(())
}

/// Extract, embed and store one file. Returns the chunk count.
///
/// Failures are per-file: the caller logs and moves on, and nothing partial
/// is left behind thanks to the write mutex plus the transactional batch
/// insert.
async fn index_one_file(
    shared: &Shared,
    extractor: &ChunkExtractor,
    rel: &str,
    abs: &PathBuf,
) -> Result<usize> {
    let raw = tokio::fs::read(abs).await?;
    if raw.contains(&0) {
        return Ok(0); // binary masquerading under a source extension
    }
    let content = String::from_utf8_lossy(&raw).into_owned();
    let file_hash = content_hash(&content);

    let chunks = extractor.extract(rel, abs, &content).await;
    if chunks.is_empty() {
        return Ok(0);
    }

    let vectors = embed_ordered(
        shared.provider.as_ref(),
        &chunks,
        shared.config.embedding_batch_size.max(1),
        shared.config.embedding_concurrency.max(1),
    )
    .await?;

    // Paired write under the orchestrator mutex: a row with a vector slot
    // always has a live vector behind it.
    let _guard = shared.write_lock.lock().await;

    let freed = shared.store.delete_by_file(rel).await?;
    for slot in &freed {
        shared.ann.delete(*slot);
    }

    let mut slots = Vec::with_capacity(vectors.len());
    for vector in vectors {
        slots.push(shared.ann.insert(vector)?);
    }

    match shared
        .store
        .insert_batch(chunks.clone(), slots.clone(), file_hash)
        .await
    {
        Ok(()) => Ok(chunks.len()),
        Err(e) => {
            // The transaction rolled back; take the ANN inserts back out so
            // no orphan vectors remain.
            for slot in slots {
                shared.ann.delete(slot);
            }
            Err(e)
        }
    }
}

/// Post-batch back-pressure: SQLite page cache, ANN map capacity, then the
/// allocator itself.
async fn shrink_pass(shared: &Shared) {
    if let Err(e) = shared.store.shrink_memory().await {
        debug!(error = %e, "shrink_memory failed");
    }
    shared.ann.release_memory();
    memory::release_to_os();
    memory::profile_point("post-batch shrink");
}

async fn savepoint(shared: &Shared) -> Result<()> {
    shared.ann.save(&shared.paths.vectors_bin)?;
    shared.store.checkpoint().await
}

/// Embed all chunk texts with bounded concurrency, preserving order.
///
/// Fan-out over sub-batches, fan-in by batch index so vector `i` pairs with
/// chunk `i`. Any batch failure aborts the file.
async fn embed_ordered(
    provider: &dyn EmbeddingProvider,
    chunks: &[Chunk],
    batch_size: usize,
    concurrency: usize,
) -> Result<Vec<Vec<f32>>> {
    let texts: Vec<String> = chunks.iter().map(Chunk::embedding_text).collect();

    let batches: Vec<(usize, Vec<String>)> = texts
        .chunks(batch_size)
        .enumerate()
        .map(|(i, b)| (i, b.to_vec()))
        .collect();

    let mut results: Vec<(usize, Vec<Vec<f32>>)> = stream::iter(batches)
        .map(|(i, batch)| async move {
            let vectors = embed_batch_with_retry(provider, &batch).await?;
            Ok::<_, RetrievalErr>((i, vectors))
        })
        .buffer_unordered(concurrency)
        .collect::<Vec<_>>()
        .await
        .into_iter()
        .collect::<Result<Vec<_>>>()?;

    results.sort_by_key(|(i, _)| *i);
    let vectors: Vec<Vec<f32>> = results.into_iter().flat_map(|(_, v)| v).collect();

    if vectors.len() != chunks.len() {
        return Err(RetrievalErr::Embedding(format!(
            "provider returned {} vectors for {} chunks",
            vectors.len(),
            chunks.len()
        )));
    }
    let expected = provider.dimension();
    for vector in &vectors {
        if vector.len() != expected {
            return Err(RetrievalErr::DimensionMismatch {
                stored: expected,
                actual: vector.len(),
            });
        }
    }
    Ok(vectors)
}

#[cfg(test)]
#[path = "indexer.test.rs"]
mod tests;
