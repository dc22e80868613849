//! Test doubles shared across unit tests.

use std::sync::atomic::AtomicUsize;
use std::sync::atomic::Ordering;

use async_trait::async_trait;

use crate::embeddings::EmbeddingProvider;
use crate::error::Result;
use crate::error::RetrievalErr;

/// Deterministic bag-of-words embedding: texts sharing tokens land close
/// together, which is enough signal for ranking assertions.
pub fn hash_embed(text: &str, dimension: usize) -> Vec<f32> {
    let mut vector = vec![0.0f32; dimension];
    for token in text
        .split(|c: char| !c.is_alphanumeric() && c != '_')
        .filter(|t| !t.is_empty())
    {
        let mut h: u64 = 1469598103934665603; // FNV offset basis
        for b in token.to_lowercase().bytes() {
            h ^= b as u64;
            h = h.wrapping_mul(1099511628211);
        }
        vector[(h % dimension as u64) as usize] += 1.0;
    }
    let norm: f32 = vector.iter().map(|v| v * v).sum::<f32>().sqrt();
    if norm == 0.0 {
        vector[0] = 1.0;
    } else {
        for v in &mut vector {
            *v /= norm;
        }
    }
    vector
}

/// In-process provider for tests: no network, call counting, optional
/// poison token that fails any batch containing it.
#[derive(Debug)]
pub struct MockProvider {
    dimension: usize,
    pub batch_calls: AtomicUsize,
    poison: Option<String>,
}

impl MockProvider {
    pub fn new() -> Self {
        Self {
            dimension: 16,
            batch_calls: AtomicUsize::new(0),
            poison: None,
        }
    }

    pub fn with_poison(token: &str) -> Self {
        Self {
            poison: Some(token.to_string()),
            ..Self::new()
        }
    }

    pub fn calls(&self) -> usize {
        self.batch_calls.load(Ordering::SeqCst)
    }
}

impl Default for MockProvider {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl EmbeddingProvider for MockProvider {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        if let Some(poison) = &self.poison {
            if text.contains(poison.as_str()) {
                return Err(RetrievalErr::Embedding("poisoned text".to_string()));
            }
        }
        Ok(hash_embed(text, self.dimension))
    }

    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        self.batch_calls.fetch_add(1, Ordering::SeqCst);
        let mut out = Vec::with_capacity(texts.len());
        for text in texts {
            out.push(self.embed(text).await?);
        }
        Ok(out)
    }

    fn dimension(&self) -> usize {
        self.dimension
    }

    fn name(&self) -> &str {
        "mock"
    }
}
