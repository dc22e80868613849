use super::*;
use crate::config::IndexConfig;
use crate::config::StatePaths;
use crate::testing::MockProvider;
use crate::types::ChunkKind;
use crate::types::Language;
use pretty_assertions::assert_eq;

fn write_file(root: &std::path::Path, rel: &str, content: &str) {
    let path = root.join(rel);
    std::fs::create_dir_all(path.parent().unwrap()).unwrap();
    std::fs::write(path, content).unwrap();
}

async fn seeded_searcher(root: &std::path::Path) -> (Indexer, Searcher) {
    let config = IndexConfig {
        extraction_mode: "regex".to_string(),
        file_workers: Some(1),
        ..Default::default()
    };
    let indexer = Indexer::with_provider(
        StatePaths::new(root),
        config,
        Arc::new(MockProvider::new()),
    )
    .unwrap();
    indexer.build(false).await.unwrap();
    let searcher = Searcher::new(&indexer);
    (indexer, searcher)
}

#[tokio::test]
async fn basic_build_and_query() {
    let dir = tempfile::tempdir().unwrap();
    write_file(
        dir.path(),
        "a.go",
        "func HandleLogin(user string, password string) {\n    // user authentication entry\n}\n",
    );
    write_file(
        dir.path(),
        "b.go",
        "func ValidatePassword(password string) {\n    // password check\n}\n",
    );

    let (indexer, searcher) = seeded_searcher(dir.path()).await;
    assert_eq!(indexer.store().count().await.unwrap(), 2);

    let response = searcher
        .search("user authentication password", 2, &SearchFilter::default(), None)
        .await
        .unwrap();

    assert_eq!(response.results.len(), 2);
    assert_eq!(response.total_hops, 1);
    // Ordered by score, best first.
    assert!(response.results[0].score >= response.results[1].score);
    let names: Vec<&str> = response
        .results
        .iter()
        .map(|r| r.chunk.name.as_str())
        .collect();
    assert!(names.contains(&"HandleLogin"));
    assert!(names.contains(&"ValidatePassword"));
}

#[tokio::test]
async fn query_against_empty_index_returns_nothing() {
    let dir = tempfile::tempdir().unwrap();
    let (_indexer, searcher) = seeded_searcher(dir.path()).await;

    let response = searcher
        .search("anything", 5, &SearchFilter::default(), None)
        .await
        .unwrap();
    assert!(response.results.is_empty());
}

#[tokio::test]
async fn filters_narrow_the_candidate_set() {
    let dir = tempfile::tempdir().unwrap();
    write_file(dir.path(), "auth/login.go", "func Login() {\n}\n");
    write_file(dir.path(), "models/user.py", "class User:\n    pass\n");

    let (_indexer, searcher) = seeded_searcher(dir.path()).await;

    let response = searcher
        .search(
            "login user",
            10,
            &SearchFilter {
                languages: vec![Language::Python],
                ..Default::default()
            },
            None,
        )
        .await
        .unwrap();
    assert_eq!(response.results.len(), 1);
    assert_eq!(response.results[0].chunk.language, Language::Python);

    let response = searcher
        .search(
            "login user",
            10,
            &SearchFilter {
                file_glob: Some("auth/*".to_string()),
                kinds: vec![ChunkKind::Function],
                ..Default::default()
            },
            None,
        )
        .await
        .unwrap();
    assert_eq!(response.results.len(), 1);
    assert_eq!(response.results[0].chunk.file, "auth/login.go");
}

#[tokio::test]
async fn threshold_drops_weak_hits() {
    let dir = tempfile::tempdir().unwrap();
    write_file(dir.path(), "a.go", "func Alpha() {\n}\n");
    write_file(dir.path(), "b.go", "func CompletelyDifferent() {\n}\n");

    let (_indexer, searcher) = seeded_searcher(dir.path()).await;

    let all = searcher
        .search("Alpha", 10, &SearchFilter::default(), None)
        .await
        .unwrap();
    let strict = searcher
        .search("Alpha", 10, &SearchFilter::default(), Some(0.9))
        .await
        .unwrap();

    assert!(strict.results.len() <= all.results.len());
    for result in &strict.results {
        assert!(result.score >= 0.9);
    }
}

#[tokio::test]
async fn related_by_file_excludes_the_source() {
    let dir = tempfile::tempdir().unwrap();
    write_file(dir.path(), "a.go", "func SessionStore() {\n    // session cache\n}\n");
    write_file(dir.path(), "b.go", "func SessionCache() {\n    // session cache\n}\n");
    write_file(dir.path(), "c.go", "func Unrelated() {\n    // parser\n}\n");

    let (_indexer, searcher) = seeded_searcher(dir.path()).await;

    let response = searcher.related_by_file("a.go", 2).await.unwrap();
    assert!(!response.results.is_empty());
    for result in &response.results {
        assert_ne!(result.chunk.file, "a.go");
    }
}

#[tokio::test]
async fn related_by_unknown_file_is_empty() {
    let dir = tempfile::tempdir().unwrap();
    write_file(dir.path(), "a.go", "func A() {\n}\n");
    let (_indexer, searcher) = seeded_searcher(dir.path()).await;

    let response = searcher.related_by_file("ghost.go", 5).await.unwrap();
    assert!(response.results.is_empty());
}
