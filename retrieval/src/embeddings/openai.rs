//! OpenAI embedding provider.

use async_trait::async_trait;
use serde::Deserialize;
use serde::Serialize;

use crate::embeddings::EmbeddingProvider;
use crate::error::Result;
use crate::error::RetrievalErr;

const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";
pub(crate) const DEFAULT_MODEL: &str = "text-embedding-3-small";
const DEFAULT_DIMENSION: usize = 1536;
const DEFAULT_BATCH_SIZE: usize = 100;

/// Environment variable holding the API key.
pub const API_KEY_ENV: &str = "OPENAI_API_KEY";

/// OpenAI `/v1/embeddings` backend.
#[derive(Debug)]
pub struct OpenAIEmbeddings {
    client: reqwest::Client,
    api_key: String,
    pub(crate) base_url: String,
    pub(crate) model: String,
    dimension: usize,
    pub(crate) batch_size: usize,
}

#[derive(Serialize)]
struct EmbedRequest<'a> {
    model: &'a str,
    input: &'a [String],
}

#[derive(Deserialize)]
struct EmbedResponse {
    data: Vec<EmbedDatum>,
}

#[derive(Deserialize)]
struct EmbedDatum {
    index: usize,
    embedding: Vec<f32>,
}

impl OpenAIEmbeddings {
    /// Construct with an explicit key (tests, alternate key sources).
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

    /// Construct from `OPENAI_API_KEY`; a missing key is fatal.
    pub fn from_env() -> Result<Self> {
        let key = std::env::var(API_KEY_ENV).map_err(|_| RetrievalErr::MissingApiKey {
            name: API_KEY_ENV.to_string(),
        })?;
        Ok(Self::new(&key))
    }

    pub fn with_base_url(mut self, base_url: &str) -> Self {
        self.base_url = base_url.trim_end_matches('/').to_string();
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

    async fn embed_sub_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let request = EmbedRequest {
            model: &self.model,
            input: texts,
        };

        let response = self
            .client
            .post(format!("{}/embeddings", self.base_url))
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .await
            .map_err(|e| RetrievalErr::Embedding(format!("openai request failed: {e}")))?
            .error_for_status()
            .map_err(|e| RetrievalErr::Embedding(format!("openai HTTP error: {e}")))?;

        let parsed: EmbedResponse = response
            .json()
            .await
            .map_err(|e| RetrievalErr::Embedding(format!("openai response parse failed: {e}")))?;

        if parsed.data.len() != texts.len() {
            return Err(RetrievalErr::Embedding(format!(
                "openai returned {} embeddings for {} inputs",
                parsed.data.len(),
                texts.len()
            )));
        }

        // The API documents order by `index`; enforce it rather than trust
        // response ordering.
        let mut data = parsed.data;
        data.sort_by_key(|d| d.index);
        Ok(data.into_iter().map(|d| d.embedding).collect())
    }
}

#[async_trait]
impl EmbeddingProvider for OpenAIEmbeddings {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let batch = [text.to_string()];
        let mut vectors = self.embed_sub_batch(&batch).await?;
        vectors
            .pop()
            .ok_or_else(|| RetrievalErr::Embedding("openai returned no embedding".to_string()))
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
        "openai"
    }
}

#[cfg(test)]
#[path = "openai.test.rs"]
mod tests;
