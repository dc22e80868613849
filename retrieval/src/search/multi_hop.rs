//! Iterative multi-hop retrieval with convergence and a time budget.
//!
//! Each hop re-ranks the base candidates, then expands the best new chunks
//! through two neighborhoods: other chunks in the same file, and the ANN
//! neighbors of the chunk's own embedding. Every expanded candidate is
//! re-scored against the original query vector. The loop stops on hop
//! exhaustion, score convergence, or an expired time budget, in every
//! case returning the best results gathered so far.
//!
//! Expansion seeds the next hop, so the final hop skips it. That keeps a
//! one-hop run identical to single-hop search: same candidates, same
//! order, no sibling or neighbor traffic.

use std::collections::HashSet;
use std::time::Duration;
use std::time::Instant;

use tracing::debug;

use crate::embeddings::EmbeddingProvider;
use crate::error::Result;
use crate::storage::cosine_distance;
use crate::storage::AnnIndex;
use crate::storage::ChunkStore;
use crate::types::Chunk;
use crate::types::SearchResponse;
use crate::types::SearchResult;

/// Stop expanding when the best score improves by less than this.
pub const DEFAULT_CONVERGENCE_THRESHOLD: f32 = 0.15;
/// Default wall-clock budget.
pub const DEFAULT_TIME_LIMIT: Duration = Duration::from_secs(10);

/// Tuning for a multi-hop run.
#[derive(Debug, Clone)]
pub struct MultiHopParams {
    pub limit: usize,
    pub max_hops: u32,
    pub time_limit: Duration,
    pub convergence_threshold: f32,
}

impl Default for MultiHopParams {
    fn default() -> Self {
        Self {
            limit: 10,
            max_hops: 3,
            time_limit: DEFAULT_TIME_LIMIT,
            convergence_threshold: DEFAULT_CONVERGENCE_THRESHOLD,
        }
    }
}

/// Run the expansion loop. Never fails on budget expiry; partial results
/// carry the hop count actually achieved.
pub async fn run(
    provider: &dyn EmbeddingProvider,
    store: &ChunkStore,
    ann: &AnnIndex,
    query_vec: &[f32],
    slot_filter: Option<&HashSet<i64>>,
    params: &MultiHopParams,
) -> Result<SearchResponse> {
    let candidate_count = (params.limit * 3).max(20);
    let deadline = Instant::now() + params.time_limit;

    let mut seen: HashSet<String> = HashSet::new();
    let mut results: Vec<SearchResult> = Vec::new();
    let mut prev_best = 0.0f32;
    let mut hop = 0u32;

    'hops: while hop < params.max_hops && Instant::now() < deadline {
        hop += 1;

        // Base candidates for this hop.
        let hits = ann.search(query_vec, candidate_count, slot_filter);
        let mut new_this_hop: Vec<Chunk> = Vec::new();
        for hit in &hits {
            let Some(chunk) = store.get_by_slot(hit.slot).await? else {
                continue;
            };
            if !seen.insert(chunk.id.clone()) {
                continue;
            }
            new_this_hop.push(chunk.clone());
            results.push(SearchResult {
                chunk,
                score: hit.score,
                distance: hit.distance,
                hop,
            });
        }

        // Convergence check once enough candidates exist.
        if results.len() >= 2 * params.limit {
            let best = results
                .iter()
                .map(|r| r.score)
                .fold(f32::NEG_INFINITY, f32::max);
            if best - prev_best < params.convergence_threshold {
                debug!(hop, best, prev_best, "Multi-hop converged");
                break;
            }
            prev_best = best;
        }

        // Expansion feeds the next hop's re-ranking; on the last allowed
        // hop there is none, and skipping it keeps `max_hops = 1` equal to
        // a single-hop search.
        if hop >= params.max_hops {
            continue;
        }

        // Expand through the first `limit` chunks new to this hop.
        let seeds: Vec<Chunk> = new_this_hop.into_iter().take(params.limit).collect();
        for seed in seeds {
            if Instant::now() >= deadline {
                debug!(hop, "Multi-hop time budget exhausted during expansion");
                break 'hops;
            }

            // File siblings share context even when their embeddings drift.
            for sibling in store.get_by_file(&seed.file).await? {
                if seen.contains(&sibling.id) {
                    continue;
                }
                let result = rescore(provider, query_vec, sibling, hop).await?;
                seen.insert(result.chunk.id.clone());
                results.push(result);
            }

            // Embedding neighbors of the seed itself.
            let seed_vec = provider.embed(&seed.content).await?;
            for hit in ann.search(&seed_vec, params.limit, slot_filter) {
                let Some(chunk) = store.get_by_slot(hit.slot).await? else {
                    continue;
                };
                if seen.contains(&chunk.id) {
                    continue;
                }
                let result = rescore(provider, query_vec, chunk, hop).await?;
                seen.insert(result.chunk.id.clone());
                results.push(result);
            }
        }
    }

    results.sort_by(|a, b| {
        b.score
            .partial_cmp(&a.score)
            .unwrap_or(std::cmp::Ordering::Equal)
    });
    results.truncate(params.limit);

    debug!(hops = hop, results = results.len(), "Multi-hop finished");
    Ok(SearchResponse {
        results,
        total_hops: hop,
    })
}

/// Score an expanded candidate against the original query vector.
async fn rescore(
    provider: &dyn EmbeddingProvider,
    query_vec: &[f32],
    chunk: Chunk,
    hop: u32,
) -> Result<SearchResult> {
    let vec = provider.embed(&chunk.content).await?;
    let distance = cosine_distance(query_vec, &vec);
    Ok(SearchResult {
        chunk,
        score: (1.0 - distance).clamp(0.0, 1.0),
        distance,
        hop,
    })
}

#[cfg(test)]
#[path = "multi_hop.test.rs"]
mod tests;
