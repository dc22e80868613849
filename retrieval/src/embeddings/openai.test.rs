use super::*;
use crate::embeddings::EmbeddingProvider;
use pretty_assertions::assert_eq;

#[test]
fn defaults() {
    let provider = OpenAIEmbeddings::new("test-key");
    assert_eq!(provider.base_url, "https://api.openai.com/v1");
    assert_eq!(provider.model, DEFAULT_MODEL);
    assert_eq!(provider.dimension(), 1536);
    assert_eq!(provider.batch_size, 100);
    assert_eq!(provider.name(), "openai");
}

#[test]
fn builders() {
    let provider = OpenAIEmbeddings::new("test-key")
        .with_base_url("https://proxy.example.com/v1/")
        .with_model("text-embedding-3-large")
        .with_dimension(3072)
        .with_batch_size(10);

    assert_eq!(provider.base_url, "https://proxy.example.com/v1");
    assert_eq!(provider.model, "text-embedding-3-large");
    assert_eq!(provider.dimension(), 3072);
    assert_eq!(provider.batch_size, 10);
}

#[tokio::test]
async fn empty_batch_is_free() {
    let provider = OpenAIEmbeddings::new("test-key").with_base_url("http://127.0.0.1:1");
    let vectors = provider.embed_batch(&[]).await.unwrap();
    assert!(vectors.is_empty());
}
