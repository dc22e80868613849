//! Ollama embedding provider.
//!
//! Ollama exposes no batch endpoint; batching is emulated by sequential
//! `/api/embeddings` calls, sub-batched for progress logging.

use async_trait::async_trait;
use serde::Deserialize;
use serde::Serialize;

use crate::embeddings::EmbeddingProvider;
use crate::error::Result;
use crate::error::RetrievalErr;

const DEFAULT_ENDPOINT: &str = "http://localhost:11434";
pub(crate) const DEFAULT_MODEL: &str = "nomic-embed-text";
const DEFAULT_DIMENSION: usize = 768;
const DEFAULT_BATCH_SIZE: usize = 64;

/// Local Ollama daemon backend.
#[derive(Debug)]
pub struct OllamaEmbeddings {
    client: reqwest::Client,
    pub(crate) endpoint: String,
    pub(crate) model: String,
    dimension: usize,
    pub(crate) batch_size: usize,
}

#[derive(Serialize)]
struct EmbedRequest<'a> {
    model: &'a str,
    prompt: &'a str,
}

#[derive(Deserialize)]
struct EmbedResponse {
    embedding: Vec<f32>,
}

impl OllamaEmbeddings {
    pub fn new() -> Self {
        Self {
            client: reqwest::Client::new(),
            endpoint: DEFAULT_ENDPOINT.to_string(),
            model: DEFAULT_MODEL.to_string(),
            dimension: DEFAULT_DIMENSION,
            batch_size: DEFAULT_BATCH_SIZE,
        }
    }

    pub fn with_endpoint(mut self, endpoint: &str) -> Self {
        self.endpoint = endpoint.trim_end_matches('/').to_string();
        self
    }

    pub fn with_model(mut self, model: &str) -> Self {
        self.model = model.to_string();
        self
    }

    pub fn with_dimension(mut self, dimension: usize) -> Self {
        self.dimension = dimension;
        self
    }

    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size.max(1);
        self
    }

    async fn embed_one(&self, text: &str) -> Result<Vec<f32>> {
        let request = EmbedRequest {
            model: &self.model,
            prompt: text,
        };

        let response = self
            .client
            .post(format!("{}/api/embeddings", self.endpoint))
            .json(&request)
            .send()
            .await
            .map_err(|e| RetrievalErr::Embedding(format!("ollama request failed: {e}")))?
            .error_for_status()
            .map_err(|e| RetrievalErr::Embedding(format!("ollama HTTP error: {e}")))?;

        let parsed: EmbedResponse = response
            .json()
            .await
            .map_err(|e| RetrievalErr::Embedding(format!("ollama response parse failed: {e}")))?;

        Ok(parsed.embedding)
    }
}

impl Default for OllamaEmbeddings {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl EmbeddingProvider for OllamaEmbeddings {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        self.embed_one(text).await
    }

    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        let mut vectors = Vec::with_capacity(texts.len());
        for sub_batch in texts.chunks(self.batch_size) {
            for text in sub_batch {
                vectors.push(self.embed_one(text).await?);
            }
            tracing::trace!(
                done = vectors.len(),
                total = texts.len(),
                "Ollama batch progress"
            );
        }
        Ok(vectors)
    }

    fn dimension(&self) -> usize {
        self.dimension
    }

    fn name(&self) -> &str {
        "ollama"
    }
}

#[cfg(test)]
#[path = "ollama.test.rs"]
mod tests;
