use super::*;
use crate::embeddings::EmbeddingProvider;
use pretty_assertions::assert_eq;
use serde_json::json;

#[test]
fn defaults() {
    let provider = HuggingFaceEmbeddings::new("hf-key");
    assert_eq!(provider.model, DEFAULT_MODEL);
    assert_eq!(provider.dimension(), 384);
    assert_eq!(provider.batch_size, 64);
    assert_eq!(provider.name(), "huggingface");
}

#[test]
fn parse_2d_sentence_vectors() {
    let value = json!([[1.0, 2.0], [3.0, 4.0]]);
    let vectors = parse_response(value, 2).unwrap();
    assert_eq!(vectors, vec![vec![1.0, 2.0], vec![3.0, 4.0]]);
}

#[test]
fn parse_1d_single_vector() {
    let value = json!([1.0, 2.0, 3.0]);
    let vectors = parse_response(value, 1).unwrap();
    assert_eq!(vectors, vec![vec![1.0, 2.0, 3.0]]);
}

#[test]
fn parse_3d_token_level_mean_pools() {
    // Two inputs, each with two tokens of dimension 2.
    let value = json!([
        [[1.0, 3.0], [3.0, 5.0]],
        [[0.0, 0.0], [2.0, 4.0]]
    ]);
    let vectors = parse_response(value, 2).unwrap();
    assert_eq!(vectors, vec![vec![2.0, 4.0], vec![1.0, 2.0]]);
}

#[test]
fn parse_single_2d_token_matrix_mean_pools() {
    // One input whose response is a token matrix (3 tokens × 2 dims).
    let value = json!([[3.0, 0.0], [0.0, 3.0], [3.0, 3.0]]);
    let vectors = parse_response(value, 1).unwrap();
    assert_eq!(vectors, vec![vec![2.0, 2.0]]);
}

#[test]
fn parse_rejects_garbage() {
    let value = json!({"error": "model loading"});
    assert!(parse_response(value, 1).is_err());
}

#[test]
fn parse_rejects_count_mismatch() {
    let value = json!([[1.0, 2.0]]);
    assert!(parse_response(value, 3).is_err());
}

#[tokio::test]
async fn empty_batch_is_free() {
    let provider = HuggingFaceEmbeddings::new("hf-key");
    let vectors = provider.embed_batch(&[]).await.unwrap();
    assert!(vectors.is_empty());
}
