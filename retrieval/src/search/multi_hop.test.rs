use super::*;
use crate::config::IndexConfig;
use crate::config::StatePaths;
use crate::indexing::Indexer;
use crate::search::Searcher;
use crate::testing::MockProvider;
use crate::types::SearchFilter;
use pretty_assertions::assert_eq;
use std::sync::Arc;

fn write_file(root: &std::path::Path, rel: &str, content: &str) {
    let path = root.join(rel);
    std::fs::create_dir_all(path.parent().unwrap()).unwrap();
    std::fs::write(path, content).unwrap();
}

async fn seeded(root: &std::path::Path) -> (Indexer, Searcher) {
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

/// Three files of similar content, four chunks each.
fn seed_similar_corpus(root: &std::path::Path) {
    for (file, tag) in [("auth.go", "auth"), ("session.go", "session"), ("token.go", "token")] {
        let mut source = String::new();
        for i in 0..4 {
            source.push_str(&format!(
                "func Handle{tag}{i}(request string) {{\n    // session token authentication {tag}\n}}\n\n",
            ));
        }
        write_file(root, file, &source);
    }
}

#[tokio::test]
async fn single_hop_equals_multi_hop_with_one_hop() {
    let dir = tempfile::tempdir().unwrap();
    // Multiple chunks per file: if the one-hop run performed sibling or
    // neighbor expansion, low-scoring file-mates of the top hit would leak
    // into the result set and break the equality.
    write_file(
        dir.path(),
        "a.go",
        "func ParseHeader() {\n    // header parse\n}\n\nfunc UnrelatedHelper() {\n    // glue code\n}\n",
    );
    write_file(
        dir.path(),
        "b.go",
        "func WriteBody() {\n    // body write\n}\n\nfunc AnotherHelper() {\n    // more glue\n}\n",
    );
    write_file(dir.path(), "c.go", "func CloseStream() {\n    // stream close\n}\n");

    let (_indexer, searcher) = seeded(dir.path()).await;

    let single = searcher
        .search("parse header", 2, &SearchFilter::default(), None)
        .await
        .unwrap();
    let multi = searcher
        .search_multi_hop(
            "parse header",
            &SearchFilter::default(),
            &MultiHopParams {
                limit: 2,
                max_hops: 1,
                ..Default::default()
            },
            None,
        )
        .await
        .unwrap();

    assert_eq!(multi.total_hops, 1);
    let single_ids: Vec<&str> = single.results.iter().map(|r| r.chunk.id.as_str()).collect();
    let multi_ids: Vec<&str> = multi.results.iter().map(|r| r.chunk.id.as_str()).collect();
    assert_eq!(single_ids, multi_ids);

    // Scores match too: one hop means no rescoring pass ran.
    for (s, m) in single.results.iter().zip(&multi.results) {
        assert!((s.score - m.score).abs() < 1e-6);
    }
}

#[tokio::test]
async fn convergence_stops_early() {
    let dir = tempfile::tempdir().unwrap();
    seed_similar_corpus(dir.path());

    let (_indexer, searcher) = seeded(dir.path()).await;

    // 12 similar chunks: hop 1 already collects the full candidate pool,
    // so hop 2 cannot improve the best score and the engine must stop at 2
    // of the allowed 3 hops.
    let response = searcher
        .search_multi_hop(
            "session token authentication",
            &SearchFilter::default(),
            &MultiHopParams {
                limit: 5,
                max_hops: 3,
                convergence_threshold: 0.15,
                ..Default::default()
            },
            None,
        )
        .await
        .unwrap();

    assert_eq!(response.total_hops, 2);
    assert_eq!(response.results.len(), 5);
}

#[tokio::test]
async fn results_are_sorted_and_capped() {
    let dir = tempfile::tempdir().unwrap();
    seed_similar_corpus(dir.path());

    let (_indexer, searcher) = seeded(dir.path()).await;
    let response = searcher
        .search_multi_hop(
            "token",
            &SearchFilter::default(),
            &MultiHopParams {
                limit: 3,
                max_hops: 2,
                ..Default::default()
            },
            None,
        )
        .await
        .unwrap();

    assert!(response.results.len() <= 3);
    for pair in response.results.windows(2) {
        assert!(pair[0].score >= pair[1].score);
    }
}

#[tokio::test]
async fn sibling_expansion_reaches_chunks_outside_the_filter() {
    let dir = tempfile::tempdir().unwrap();
    // The struct shares a file with the matching function but is excluded
    // from the base candidate set by the kind filter; only file-sibling
    // expansion can surface it.
    write_file(
        dir.path(),
        "pair.go",
        "func MagneticAnchor() {\n    // zebra quartz flux\n}\n\ntype HiddenRecord struct {\n    field string\n}\n",
    );
    write_file(dir.path(), "noise.go", "func Filler() {\n    // lorem ipsum\n}\n");

    let (_indexer, searcher) = seeded(dir.path()).await;

    let filter = SearchFilter {
        kinds: vec![crate::types::ChunkKind::Function],
        ..Default::default()
    };
    let response = searcher
        .search_multi_hop(
            "zebra quartz flux",
            &filter,
            &MultiHopParams {
                limit: 5,
                max_hops: 2,
                ..Default::default()
            },
            None,
        )
        .await
        .unwrap();

    let names: Vec<&str> = response
        .results
        .iter()
        .map(|r| r.chunk.name.as_str())
        .collect();
    assert!(names.contains(&"MagneticAnchor"));
    assert!(names.contains(&"HiddenRecord"), "sibling expansion missing: {names:?}");
}

#[tokio::test]
async fn zero_time_budget_returns_partial_without_error() {
    let dir = tempfile::tempdir().unwrap();
    seed_similar_corpus(dir.path());

    let (_indexer, searcher) = seeded(dir.path()).await;
    let response = searcher
        .search_multi_hop(
            "session",
            &SearchFilter::default(),
            &MultiHopParams {
                limit: 5,
                max_hops: 3,
                time_limit: std::time::Duration::ZERO,
                ..Default::default()
            },
            None,
        )
        .await
        .unwrap();

    assert_eq!(response.total_hops, 0);
    assert!(response.results.is_empty());
}
