use super::*;
use crate::testing::MockProvider;
use pretty_assertions::assert_eq;

fn regex_config() -> IndexConfig {
    IndexConfig {
        extraction_mode: "regex".to_string(),
        file_workers: Some(2),
        ..Default::default()
    }
}

fn write_file(root: &std::path::Path, rel: &str, content: &str) {
    let path = root.join(rel);
    std::fs::create_dir_all(path.parent().unwrap()).unwrap();
    std::fs::write(path, content).unwrap();
}

fn open_indexer(root: &std::path::Path, config: IndexConfig) -> Indexer {
    Indexer::with_provider(
        StatePaths::new(root),
        config,
        Arc::new(MockProvider::new()),
    )
    .unwrap()
}

#[tokio::test]
async fn build_indexes_seeded_files() {
    let dir = tempfile::tempdir().unwrap();
    write_file(dir.path(), "a.go", "func HandleLogin() {\n}\n");
    write_file(dir.path(), "b.go", "func ValidatePassword() {\n}\n");

    let indexer = open_indexer(dir.path(), regex_config());
    let report = indexer.build(false).await.unwrap();

    assert_eq!(report.files_seen, 2);
    assert_eq!(report.files_indexed, 2);
    assert_eq!(report.chunks_indexed, 2);
    assert_eq!(indexer.store().count().await.unwrap(), 2);
    assert_eq!(indexer.ann().len(), 2);

    // Invariant: every persisted chunk with a slot has a live vector.
    for file in indexer.store().files().await.unwrap() {
        for chunk in indexer.store().get_by_file(&file).await.unwrap() {
            let slot = chunk.vector_slot.expect("chunk without vector slot");
            assert!(!indexer.ann().free_slots().contains(&slot));
        }
    }

    // Savepoint written at end of build.
    assert!(indexer.paths().vectors_bin.exists());
    assert!(!indexer.paths().vectors_temp.exists());
}

#[tokio::test]
async fn incremental_removal_and_slot_reuse() {
    let dir = tempfile::tempdir().unwrap();
    write_file(dir.path(), "a.go", "func HandleLogin() {\n}\n");
    write_file(dir.path(), "b.go", "func ValidatePassword() {\n}\n");

    let indexer = open_indexer(dir.path(), regex_config());
    indexer.build(false).await.unwrap();

    let freed_slot = indexer
        .store()
        .get_by_file("b.go")
        .await
        .unwrap()[0]
        .vector_slot
        .unwrap();

    // Remove b.go and update: one file left, slot on the free list.
    std::fs::remove_file(dir.path().join("b.go")).unwrap();
    let report = indexer.update().await.unwrap();
    assert_eq!(report.files_removed, 1);
    assert_eq!(indexer.store().count().await.unwrap(), 1);
    assert_eq!(
        indexer.store().files().await.unwrap(),
        vec!["a.go".to_string()]
    );
    assert_eq!(indexer.ann().free_slots(), vec![freed_slot]);

    // A new file reuses the freed slot before next_slot grows.
    write_file(dir.path(), "c.go", "func LogoutUser() {\n}\n");
    indexer.update().await.unwrap();
    let slot = indexer
        .store()
        .get_by_file("c.go")
        .await
        .unwrap()[0]
        .vector_slot
        .unwrap();
    assert_eq!(slot, freed_slot);
    assert!(indexer.ann().free_slots().is_empty());
}

#[tokio::test]
async fn update_skips_unchanged_and_reindexes_changed() {
    let dir = tempfile::tempdir().unwrap();
    write_file(dir.path(), "a.go", "func A() {\n}\n");
    write_file(dir.path(), "b.go", "func B() {\n}\n");

    let indexer = open_indexer(dir.path(), regex_config());
    indexer.build(false).await.unwrap();

    let old_id = indexer.store().get_by_file("a.go").await.unwrap()[0].id.clone();

    // Unchanged content: nothing to do.
    let report = indexer.update().await.unwrap();
    assert_eq!(report.files_indexed, 0);
    assert_eq!(report.files_removed, 0);

    // Changed content: a.go re-indexes with a new chunk id.
    write_file(dir.path(), "a.go", "func ARenamed() {\n}\n");
    let report = indexer.update().await.unwrap();
    assert_eq!(report.files_indexed, 1);

    let chunks = indexer.store().get_by_file("a.go").await.unwrap();
    assert_eq!(chunks.len(), 1);
    assert_ne!(chunks[0].id, old_id);
    assert_eq!(chunks[0].name, "ARenamed");
    assert_eq!(indexer.store().count().await.unwrap(), 2);
}

#[tokio::test]
async fn force_build_clears_first() {
    let dir = tempfile::tempdir().unwrap();
    write_file(dir.path(), "a.go", "func A() {\n}\n");

    let indexer = open_indexer(dir.path(), regex_config());
    indexer.build(false).await.unwrap();
    assert_eq!(indexer.store().count().await.unwrap(), 1);

    // Replace the tree; a force build must not keep stale rows.
    std::fs::remove_file(dir.path().join("a.go")).unwrap();
    write_file(dir.path(), "z.go", "func Z() {\n}\n");
    indexer.build(true).await.unwrap();

    assert_eq!(indexer.store().count().await.unwrap(), 1);
    assert_eq!(
        indexer.store().files().await.unwrap(),
        vec!["z.go".to_string()]
    );
}

#[tokio::test]
async fn large_build_uses_disk_spill_and_cleans_up() {
    let dir = tempfile::tempdir().unwrap();
    for i in 0..55 {
        write_file(
            dir.path(),
            &format!("src/f{i}.go"),
            &format!("func Handler{i}() {{\n}}\n"),
        );
    }

    let indexer = open_indexer(dir.path(), regex_config());
    let report = indexer.build(false).await.unwrap();

    assert_eq!(report.files_indexed, 55);
    assert_eq!(indexer.ann().len(), 55);
    // Spill file is deleted when the build completes.
    assert!(!indexer.paths().vectors_temp.exists());
    assert!(!indexer.ann().is_disk_mode());
}

#[tokio::test]
async fn poisoned_file_is_skipped_not_fatal() {
    let dir = tempfile::tempdir().unwrap();
    write_file(dir.path(), "good.go", "func Good() {\n}\n");
    write_file(dir.path(), "bad.go", "func PoisonPill() {\n}\n");

    let indexer = Indexer::with_provider(
        StatePaths::new(dir.path()),
        regex_config(),
        Arc::new(MockProvider::with_poison("PoisonPill")),
    )
    .unwrap();

    let report = indexer.build(false).await.unwrap();
    assert_eq!(report.files_indexed, 1);
    assert_eq!(report.files_skipped, 1);
    assert_eq!(indexer.store().count().await.unwrap(), 1);
    assert_eq!(indexer.ann().len(), 1);
    // No orphan slots from the failed file.
    assert_eq!(indexer.store().files().await.unwrap(), vec!["good.go".to_string()]);
}

#[tokio::test]
async fn cancelled_build_reports_cancellation() {
    let dir = tempfile::tempdir().unwrap();
    write_file(dir.path(), "a.go", "func A() {\n}\n");

    let indexer = open_indexer(dir.path(), regex_config());
    indexer.cancel_token().cancel();

    let err = indexer.build(false).await.unwrap_err();
    assert!(matches!(err, RetrievalErr::Cancelled));
}

#[tokio::test]
async fn reopen_preserves_index_state() {
    let dir = tempfile::tempdir().unwrap();
    write_file(dir.path(), "a.go", "func A() {\n}\n");

    {
        let indexer = open_indexer(dir.path(), regex_config());
        indexer.build(false).await.unwrap();
        indexer.close().await.unwrap();
    }

    let reopened = open_indexer(dir.path(), regex_config());
    assert_eq!(reopened.store().count().await.unwrap(), 1);
    assert_eq!(reopened.ann().len(), 1);
}

#[tokio::test]
async fn clear_empties_everything() {
    let dir = tempfile::tempdir().unwrap();
    write_file(dir.path(), "a.go", "func A() {\n}\n");

    let indexer = open_indexer(dir.path(), regex_config());
    indexer.build(false).await.unwrap();
    indexer.clear().await.unwrap();

    assert_eq!(indexer.store().count().await.unwrap(), 0);
    assert_eq!(indexer.ann().len(), 0);
    assert!(!indexer.paths().vectors_bin.exists());

    let stats = indexer.stats().await.unwrap();
    assert_eq!(stats.store.total_chunks, 0);
    assert_eq!(stats.vectors, 0);
    assert_eq!(stats.provider, "mock");
}
