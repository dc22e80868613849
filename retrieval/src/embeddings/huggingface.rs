//! HuggingFace inference API embedding provider.
//!
//! The inference router is loose about response shapes. Depending on the
//! model and input arity it may return a 2-D array of sentence vectors, a
//! bare 1-D vector, a 3-D array of token-level embeddings, or a single 2-D
//! token-level matrix. All four shapes are tried in that order; token-level
//! shapes are mean-pooled.

use async_trait::async_trait;
use serde::Serialize;
use serde_json::Value;

use crate::embeddings::EmbeddingProvider;
use crate::error::Result;
use crate::error::RetrievalErr;

const DEFAULT_BASE_URL: &str = "https://router.huggingface.co/hf-inference/models";
pub(crate) const DEFAULT_MODEL: &str = "sentence-transformers/all-MiniLM-L6-v2";
const DEFAULT_DIMENSION: usize = 384;
const DEFAULT_BATCH_SIZE: usize = 64;

/// Environment variable holding the API key.
pub const API_KEY_ENV: &str = "HF_API_KEY";

/// HuggingFace free-tier inference backend.
#[derive(Debug)]
pub struct HuggingFaceEmbeddings {
    client: reqwest::Client,
    api_key: String,
    base_url: String,
    pub(crate) model: String,
    dimension: usize,
    pub(crate) batch_size: usize,
}

#[derive(Serialize)]
struct EmbedRequest<'a> {
    inputs: &'a [String],
    options: RequestOptions,
}

#[derive(Serialize)]
struct RequestOptions {
    wait_for_model: bool,
}

impl HuggingFaceEmbeddings {
    pub fn new(api_key: &str) -> Self {
        Self {
            client: reqwest::Client::new(),
            api_key: api_key.to_string(),
            base_url: DEFAULT_BASE_URL.to_string(),
            model: DEFAULT_MODEL.to_string(),
            dimension: DEFAULT_DIMENSION,
            batch_size: DEFAULT_BATCH_SIZE,
        }
    }

    /// Construct from `HF_API_KEY`; a missing key is fatal.
    pub fn from_env() -> Result<Self> {
        let key = std::env::var(API_KEY_ENV).map_err(|_| RetrievalErr::MissingApiKey {
            name: API_KEY_ENV.to_string(),
        })?;
        Ok(Self::new(&key))
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

    async fn embed_sub_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let request = EmbedRequest {
            inputs: texts,
            options: RequestOptions {
                wait_for_model: true,
            },
        };

        let response = self
            .client
            .post(format!("{}/{}", self.base_url, self.model))
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .await
            .map_err(|e| RetrievalErr::Embedding(format!("huggingface request failed: {e}")))?
            .error_for_status()
            .map_err(|e| RetrievalErr::Embedding(format!("huggingface HTTP error: {e}")))?;

        let value: Value = response.json().await.map_err(|e| {
            RetrievalErr::Embedding(format!("huggingface response parse failed: {e}"))
        })?;

        parse_response(value, texts.len())
    }
}

/// Normalize the four known response shapes into one vector per input.
pub(crate) fn parse_response(value: Value, input_count: usize) -> Result<Vec<Vec<f32>>> {
    // (a) 2-D array: one vector per input.
    if let Ok(vectors) = serde_json::from_value::<Vec<Vec<f32>>>(value.clone()) {
        if vectors.len() == input_count {
            return Ok(vectors);
        }
    }

    // (b) 1-D vector for a single input.
    if input_count == 1 {
        if let Ok(vector) = serde_json::from_value::<Vec<f32>>(value.clone()) {
            return Ok(vec![vector]);
        }
    }

    // (c) 3-D array: token-level embeddings per input; mean-pool tokens.
    if let Ok(token_level) = serde_json::from_value::<Vec<Vec<Vec<f32>>>>(value.clone()) {
        if token_level.len() == input_count {
            return Ok(token_level.iter().map(|tokens| mean_pool(tokens)).collect());
        }
    }

    // (d) single 2-D token-level matrix for a single input.
    if input_count == 1 {
        if let Ok(matrix) = serde_json::from_value::<Vec<Vec<f32>>>(value) {
            if !matrix.is_empty() {
                return Ok(vec![mean_pool(&matrix)]);
            }
        }
    }

    Err(RetrievalErr::Embedding(format!(
        "huggingface returned an unrecognized shape for {input_count} inputs"
    )))
}

fn mean_pool(tokens: &[Vec<f32>]) -> Vec<f32> {
    if tokens.is_empty() {
        return Vec::new();
    }
    let dim = tokens[0].len();
    let mut pooled = vec![0.0f32; dim];
    for token in tokens {
        for (i, v) in token.iter().enumerate().take(dim) {
            pooled[i] += v;
        }
    }
    let n = tokens.len() as f32;
    for v in &mut pooled {
        *v /= n;
    }
    pooled
}

#[async_trait]
impl EmbeddingProvider for HuggingFaceEmbeddings {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let batch = [text.to_string()];
        let mut vectors = self.embed_sub_batch(&batch).await?;
        vectors.pop().ok_or_else(|| {
            RetrievalErr::Embedding("huggingface returned no embedding".to_string())
        })
    }

    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        let mut vectors = Vec::with_capacity(texts.len());
        for sub_batch in texts.chunks(self.batch_size) {
            vectors.extend(self.embed_sub_batch(sub_batch).await?);
        }
        Ok(vectors)
    }

    fn dimension(&self) -> usize {
        self.dimension
    }

    fn name(&self) -> &str {
        "huggingface"
    }
}

#[cfg(test)]
#[path = "huggingface.test.rs"]
mod tests;
