use super::*;
use pretty_assertions::assert_eq;

#[test]
fn retry_delay_doubles() {
    assert_eq!(retry_delay(0), Duration::from_millis(100));
    assert_eq!(retry_delay(1), Duration::from_millis(200));
    assert_eq!(retry_delay(2), Duration::from_millis(400));
}

#[test]
fn unknown_provider_is_config_error() {
    let config = IndexConfig {
        provider: "acme-embeddings".to_string(),
        ..Default::default()
    };
    let err = create_provider(&config).unwrap_err();
    assert!(matches!(err, RetrievalErr::UnknownProvider { .. }));
}

#[test]
fn ollama_provider_builds_without_credentials() {
    let config = IndexConfig {
        provider: "ollama".to_string(),
        model: Some("mxbai-embed-large".to_string()),
        dimension: Some(1024),
        ..Default::default()
    };
    let provider = create_provider(&config).unwrap();
    assert_eq!(provider.name(), "ollama");
    assert_eq!(provider.dimension(), 1024);
}

/// A provider that fails a fixed number of times before succeeding,
/// for exercising the retry loop without a network.
#[derive(Debug)]
struct FlakyProvider {
    failures: std::sync::atomic::AtomicU32,
}

#[async_trait]
impl EmbeddingProvider for FlakyProvider {
    async fn embed(&self, _text: &str) -> Result<Vec<f32>> {
        Ok(vec![1.0, 0.0])
    }

    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        use std::sync::atomic::Ordering;
        if self.failures.fetch_update(Ordering::SeqCst, Ordering::SeqCst, |f| {
            if f > 0 { Some(f - 1) } else { None }
        }).is_ok()
        {
            return Err(RetrievalErr::Embedding("transient".to_string()));
        }
        Ok(texts.iter().map(|_| vec![1.0, 0.0]).collect())
    }

    fn dimension(&self) -> usize {
        2
    }

    fn name(&self) -> &str {
        "flaky"
    }
}

#[tokio::test(start_paused = true)]
async fn retry_recovers_from_transient_failures() {
    let provider = FlakyProvider {
        failures: std::sync::atomic::AtomicU32::new(2),
    };
    let texts = vec!["a".to_string(), "b".to_string()];

    let vectors = embed_batch_with_retry(&provider, &texts).await.unwrap();
    assert_eq!(vectors.len(), 2);
}

#[tokio::test(start_paused = true)]
async fn retry_gives_up_after_max_attempts() {
    let provider = FlakyProvider {
        failures: std::sync::atomic::AtomicU32::new(10),
    };
    let texts = vec!["a".to_string()];

    let err = embed_batch_with_retry(&provider, &texts).await.unwrap_err();
    assert!(matches!(err, RetrievalErr::Embedding(_)));
}
