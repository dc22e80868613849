use super::*;
use crate::embeddings::EmbeddingProvider;
use pretty_assertions::assert_eq;

#[test]
fn defaults() {
    let provider = OllamaEmbeddings::new();
    assert_eq!(provider.endpoint, "http://localhost:11434");
    assert_eq!(provider.model, DEFAULT_MODEL);
    assert_eq!(provider.dimension(), 768);
    assert_eq!(provider.batch_size, 64);
    assert_eq!(provider.name(), "ollama");
}

#[test]
fn builders() {
    let provider = OllamaEmbeddings::new()
        .with_endpoint("http://10.0.0.2:11434/")
        .with_model("mxbai-embed-large")
        .with_dimension(1024)
        .with_batch_size(16);

    assert_eq!(provider.endpoint, "http://10.0.0.2:11434");
    assert_eq!(provider.model, "mxbai-embed-large");
    assert_eq!(provider.dimension(), 1024);
    assert_eq!(provider.batch_size, 16);
}

#[test]
fn batch_size_floor_is_one() {
    let provider = OllamaEmbeddings::new().with_batch_size(0);
    assert_eq!(provider.batch_size, 1);
}

#[tokio::test]
async fn empty_batch_is_free() {
    // Endpoint is unroutable; an empty input must return before any
    // network activity.
    let provider = OllamaEmbeddings::new().with_endpoint("http://127.0.0.1:1");
    let vectors = provider.embed_batch(&[]).await.unwrap();
    assert!(vectors.is_empty());
}
