//! Embedding providers.
//!
//! Three implementations ship: a local Ollama daemon, the OpenAI API, and
//! the HuggingFace inference API. All satisfy [`EmbeddingProvider`]; a
//! fourth provider only needs to implement the same contract and register
//! in [`create_provider`].

mod huggingface;
mod ollama;
mod openai;

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;

pub use huggingface::HuggingFaceEmbeddings;
pub use ollama::OllamaEmbeddings;
pub use openai::OpenAIEmbeddings;

use crate::config::IndexConfig;
use crate::error::Result;
use crate::error::RetrievalErr;

/// Maximum attempts for a batch embedding call.
const MAX_RETRIES: u32 = 3;
/// Base delay for exponential backoff between retries.
const RETRY_BASE_DELAY_MS: u64 = 100;

/// Contract every embedding backend satisfies.
///
/// `embed_batch` preserves order: the vector at index `i` corresponds to the
/// text at index `i`. Every output has length `dimension()`. An empty input
/// returns an empty output without any network call.
#[async_trait]
pub trait EmbeddingProvider: Send + Sync + std::fmt::Debug {
    /// Embed a single text.
    async fn embed(&self, text: &str) -> Result<Vec<f32>>;

    /// Embed a batch, chunking into provider-sized sub-batches internally.
    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>>;

    /// Output vector length.
    fn dimension(&self) -> usize;

    /// Provider name for logs and `index status`.
    fn name(&self) -> &str;
}

/// Build the configured provider.
///
/// Missing API keys and unknown provider names are configuration errors,
/// fatal at startup.
pub fn create_provider(config: &IndexConfig) -> Result<Arc<dyn EmbeddingProvider>> {
    let provider: Arc<dyn EmbeddingProvider> = match config.provider.as_str() {
        "ollama" => {
            let mut p = OllamaEmbeddings::new();
            if let Some(endpoint) = &config.endpoint {
                p = p.with_endpoint(endpoint);
            }
            p = apply_common(p, config, |p, m| p.with_model(m), |p, d| p.with_dimension(d));
            if let Some(batch) = config.provider_batch_size {
                p = p.with_batch_size(batch);
            }
            Arc::new(p)
        }
        "openai" => {
            let mut p = OpenAIEmbeddings::from_env()?;
            p = apply_common(p, config, |p, m| p.with_model(m), |p, d| p.with_dimension(d));
            if let Some(batch) = config.provider_batch_size {
                p = p.with_batch_size(batch);
            }
            Arc::new(p)
        }
        "huggingface" => {
            let mut p = HuggingFaceEmbeddings::from_env()?;
            p = apply_common(p, config, |p, m| p.with_model(m), |p, d| p.with_dimension(d));
            if let Some(batch) = config.provider_batch_size {
                p = p.with_batch_size(batch);
            }
            Arc::new(p)
        }
        other => {
            return Err(RetrievalErr::UnknownProvider {
                name: other.to_string(),
            })
        }
    };
    Ok(provider)
}

fn apply_common<P>(
    mut provider: P,
    config: &IndexConfig,
    with_model: impl Fn(P, &str) -> P,
    with_dimension: impl Fn(P, usize) -> P,
) -> P {
    if let Some(model) = &config.model {
        provider = with_model(provider, model);
    }
    if let Some(dim) = config.dimension {
        provider = with_dimension(provider, dim);
    }
    provider
}

/// Batch embedding with exponential backoff.
///
/// Retries transport-level failures before giving up; the caller treats the
/// final error as a per-file failure, not a build failure.
pub async fn embed_batch_with_retry(
    provider: &dyn EmbeddingProvider,
    texts: &[String],
) -> Result<Vec<Vec<f32>>> {
    let mut last_err = None;
    for attempt in 0..MAX_RETRIES {
        match provider.embed_batch(texts).await {
            Ok(vectors) => return Ok(vectors),
            Err(e) => {
                let delay = retry_delay(attempt);
                tracing::warn!(
                    provider = provider.name(),
                    attempt = attempt + 1,
                    max = MAX_RETRIES,
                    delay_ms = delay.as_millis() as u64,
                    error = %e,
                    batch = texts.len(),
                    "Batch embedding failed, retrying"
                );
                last_err = Some(e);
                if attempt + 1 < MAX_RETRIES {
                    tokio::time::sleep(delay).await;
                }
            }
        }
    }
    Err(last_err.unwrap_or_else(|| RetrievalErr::Embedding("no attempts made".to_string())))
}

/// `base * 2^attempt` backoff.
fn retry_delay(attempt: u32) -> Duration {
    Duration::from_millis(RETRY_BASE_DELAY_MS << attempt)
}

#[cfg(test)]
#[path = "mod.test.rs"]
mod tests;
