//! Single-hop search and related-by-file queries.

use std::collections::HashSet;
use std::sync::Arc;

use tracing::debug;

use crate::embeddings::EmbeddingProvider;
use crate::error::Result;
use crate::indexing::Indexer;
use crate::search::multi_hop;
use crate::search::MultiHopParams;
use crate::storage::AnnIndex;
use crate::storage::ChunkStore;
use crate::storage::Hit;
use crate::types::SearchFilter;
use crate::types::SearchResponse;
use crate::types::SearchResult;

/// Query engine over a built index.
pub struct Searcher {
    provider: Arc<dyn EmbeddingProvider>,
    store: Arc<ChunkStore>,
    ann: Arc<AnnIndex>,
    /// Default minimum score, from config; per-query thresholds override.
    default_threshold: Option<f32>,
}

impl Searcher {
    pub fn new(indexer: &Indexer) -> Self {
        Self {
            provider: Arc::clone(indexer.provider()),
            store: Arc::clone(indexer.store()),
            ann: Arc::clone(indexer.ann()),
            default_threshold: indexer.config().score_threshold,
        }
    }

    /// Embed the query, rank against the index, hydrate to chunks.
    ///
    /// An empty index yields an empty result set, not an error.
    pub async fn search(
        &self,
        query: &str,
        limit: usize,
        filter: &SearchFilter,
        threshold: Option<f32>,
    ) -> Result<SearchResponse> {
        if limit == 0 || self.ann.is_empty() {
            return Ok(SearchResponse {
                results: Vec::new(),
                total_hops: 1,
            });
        }

        let query_vec = self.provider.embed(query).await?;
        let slot_filter = self.slot_filter(filter).await?;
        let hits = self.ann.search(&query_vec, limit, slot_filter.as_ref());

        let threshold = threshold.or(self.default_threshold);
        let mut results = self.hydrate(&hits, 1).await?;
        if let Some(min) = threshold {
            results.retain(|r| r.score >= min);
        }

        debug!(query, hits = results.len(), "Single-hop search");
        Ok(SearchResponse {
            results,
            total_hops: 1,
        })
    }

    /// Multi-hop search per the iterative expansion strategy.
    pub async fn search_multi_hop(
        &self,
        query: &str,
        filter: &SearchFilter,
        params: &MultiHopParams,
        threshold: Option<f32>,
    ) -> Result<SearchResponse> {
        if params.limit == 0 || self.ann.is_empty() {
            return Ok(SearchResponse {
                results: Vec::new(),
                total_hops: 0,
            });
        }

        let query_vec = self.provider.embed(query).await?;
        let slot_filter = self.slot_filter(filter).await?;

        let mut response = multi_hop::run(
            self.provider.as_ref(),
            &self.store,
            &self.ann,
            &query_vec,
            slot_filter.as_ref(),
            params,
        )
        .await?;

        if let Some(min) = threshold.or(self.default_threshold) {
            response.results.retain(|r| r.score >= min);
        }
        Ok(response)
    }

    /// Chunks related to a whole file: concatenate its chunks, embed once,
    /// search, drop hits from the file itself.
    pub async fn related_by_file(&self, file: &str, limit: usize) -> Result<SearchResponse> {
        let chunks = self.store.get_by_file(file).await?;
        if chunks.is_empty() || self.ann.is_empty() {
            return Ok(SearchResponse {
                results: Vec::new(),
                total_hops: 1,
            });
        }

        let combined: String = chunks
            .iter()
            .map(|c| c.content.as_str())
            .collect::<Vec<_>>()
            .join("\n");
        let file_vec = self.provider.embed(&combined).await?;

        let hits = self.ann.search(&file_vec, limit + 1, None);
        let mut results = self.hydrate(&hits, 1).await?;
        results.retain(|r| r.chunk.file != file);
        results.truncate(limit);

        Ok(SearchResponse {
            results,
            total_hops: 1,
        })
    }

    async fn slot_filter(&self, filter: &SearchFilter) -> Result<Option<HashSet<i64>>> {
        if filter.is_empty() {
            return Ok(None);
        }
        Ok(Some(self.store.filtered_slots(filter).await?))
    }

    async fn hydrate(&self, hits: &[Hit], hop: u32) -> Result<Vec<SearchResult>> {
        let mut results = Vec::with_capacity(hits.len());
        for hit in hits {
            // A missing row means the chunk was deleted between the ANN
            // scan and hydration.
            if let Some(chunk) = self.store.get_by_slot(hit.slot).await? {
                results.push(SearchResult {
                    chunk,
                    score: hit.score,
                    distance: hit.distance,
                    hop,
                });
            }
        }
        Ok(results)
    }
}

#[cfg(test)]
#[path = "searcher.test.rs"]
mod tests;
