use super::*;
use crate::config::IndexConfig;
use crate::config::StatePaths;
use crate::testing::MockProvider;
use std::sync::Arc;
use std::time::Duration;

fn write_file(root: &std::path::Path, rel: &str, content: &str) {
    let path = root.join(rel);
    std::fs::create_dir_all(path.parent().unwrap()).unwrap();
    std::fs::write(path, content).unwrap();
}

fn regex_config() -> IndexConfig {
    IndexConfig {
        extraction_mode: "regex".to_string(),
        file_workers: Some(1),
        ..Default::default()
    }
}

/// Burst of writes within the debounce window → exactly one reindex.
#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn watcher_debounces_rapid_writes() {
    let dir = tempfile::tempdir().unwrap();
    write_file(dir.path(), "a.go", "func A() {\n}\n");

    let provider = Arc::new(MockProvider::new());
    let indexer = Arc::new(
        crate::indexing::Indexer::with_provider(
            StatePaths::new(dir.path()),
            regex_config(),
            Arc::clone(&provider) as Arc<dyn crate::embeddings::EmbeddingProvider>,
        )
        .unwrap(),
    );
    indexer.build(false).await.unwrap();

    let calls_after_build = provider.calls();

    let watch_indexer = Arc::clone(&indexer);
    let watch_task = tokio::spawn(async move { watch(&watch_indexer).await });

    // Let the watcher register before generating events.
    tokio::time::sleep(Duration::from_millis(300)).await;

    // Three writes inside 300 ms collapse into one pending entry.
    for i in 0..3 {
        write_file(dir.path(), "a.go", &format!("func A() {{\n    // rev {i}\n}}\n"));
        tokio::time::sleep(Duration::from_millis(100)).await;
    }

    // Wait out the 500 ms quiescence window plus processing slack.
    tokio::time::sleep(Duration::from_millis(1500)).await;

    assert_eq!(
        provider.calls() - calls_after_build,
        1,
        "rapid writes must coalesce into a single reindex"
    );

    // The index holds the final revision.
    let chunks = indexer.store().get_by_file("a.go").await.unwrap();
    assert_eq!(chunks.len(), 1);
    assert!(chunks[0].content.contains("rev 2"));

    indexer.cancel_token().cancel();
    watch_task.await.unwrap().unwrap();
}

/// Deleting a watched file removes it from the index.
#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn watcher_removes_deleted_files() {
    let dir = tempfile::tempdir().unwrap();
    write_file(dir.path(), "a.go", "func A() {\n}\n");
    write_file(dir.path(), "b.go", "func B() {\n}\n");

    let indexer = Arc::new(
        crate::indexing::Indexer::with_provider(
            StatePaths::new(dir.path()),
            regex_config(),
            Arc::new(MockProvider::new()),
        )
        .unwrap(),
    );
    indexer.build(false).await.unwrap();
    assert_eq!(indexer.store().count().await.unwrap(), 2);

    let watch_indexer = Arc::clone(&indexer);
    let watch_task = tokio::spawn(async move { watch(&watch_indexer).await });
    tokio::time::sleep(Duration::from_millis(300)).await;

    std::fs::remove_file(dir.path().join("b.go")).unwrap();
    tokio::time::sleep(Duration::from_millis(1500)).await;

    assert_eq!(indexer.store().count().await.unwrap(), 1);
    assert_eq!(indexer.store().files().await.unwrap(), vec!["a.go".to_string()]);
    // The freed slot is reusable.
    assert_eq!(indexer.ann().free_slots().len(), 1);

    indexer.cancel_token().cancel();
    watch_task.await.unwrap().unwrap();
}
