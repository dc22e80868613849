use super::*;
use crate::types::ChunkKind;
use crate::types::Language;
use pretty_assertions::assert_eq;

fn open_store() -> (tempfile::TempDir, ChunkStore) {
    let dir = tempfile::tempdir().unwrap();
    let store = ChunkStore::open(&dir.path().join("chunks.db")).unwrap();
    (dir, store)
}

fn chunk(file: &str, name: &str, start: u32, end: u32) -> Chunk {
    Chunk::new(
        file,
        Language::Go,
        ChunkKind::Function,
        name,
        &format!("func {name}()"),
        &format!("func {name}() {{\n    // {start}..{end}\n}}"),
        start,
        end,
    )
}

#[tokio::test]
async fn insert_and_get_round_trip() {
    let (_dir, store) = open_store();
    let c = chunk("a.go", "HandleLogin", 1, 3);

    store.insert(c.clone(), 0, "fh".to_string()).await.unwrap();

    let got = store.get(&c.id).await.unwrap().unwrap();
    assert_eq!(got.file, "a.go");
    assert_eq!(got.name, "HandleLogin");
    assert_eq!(got.kind, ChunkKind::Function);
    assert_eq!(got.language, Language::Go);
    assert_eq!(got.vector_slot, Some(0));
    assert_eq!(got.content, c.content);

    let by_slot = store.get_by_slot(0).await.unwrap().unwrap();
    assert_eq!(by_slot.id, c.id);
}

#[tokio::test]
async fn reinsert_same_id_is_idempotent() {
    let (_dir, store) = open_store();
    let c = chunk("a.go", "HandleLogin", 1, 3);

    store.insert(c.clone(), 0, "fh".to_string()).await.unwrap();
    store.insert(c.clone(), 0, "fh".to_string()).await.unwrap();

    assert_eq!(store.count().await.unwrap(), 1);
}

#[tokio::test]
async fn get_by_file_orders_by_start_line() {
    let (_dir, store) = open_store();
    let chunks = vec![
        chunk("a.go", "Third", 30, 35),
        chunk("a.go", "First", 1, 5),
        chunk("a.go", "Second", 10, 20),
    ];
    store
        .insert_batch(chunks, vec![0, 1, 2], "fh".to_string())
        .await
        .unwrap();

    let ordered = store.get_by_file("a.go").await.unwrap();
    let names: Vec<&str> = ordered.iter().map(|c| c.name.as_str()).collect();
    assert_eq!(names, vec!["First", "Second", "Third"]);
}

#[tokio::test]
async fn batch_rollback_leaves_no_rows() {
    let (_dir, store) = open_store();

    // Middle chunk violates the line invariants; the whole batch must
    // roll back.
    let mut bad = chunk("a.go", "Broken", 5, 9);
    bad.start_line = 0;
    bad.end_line = 0;

    let batch = vec![chunk("a.go", "Ok1", 1, 3), bad, chunk("a.go", "Ok2", 11, 13)];
    let result = store.insert_batch(batch, vec![0, 1, 2], "fh".to_string()).await;

    assert!(result.is_err());
    assert_eq!(store.count().await.unwrap(), 0);
}

#[tokio::test]
async fn mismatched_slots_are_rejected() {
    let (_dir, store) = open_store();
    let result = store
        .insert_batch(vec![chunk("a.go", "F", 1, 2)], vec![], "fh".to_string())
        .await;
    assert!(result.is_err());
    assert_eq!(store.count().await.unwrap(), 0);
}

#[tokio::test]
async fn delete_by_file_returns_freed_slots() {
    let (_dir, store) = open_store();
    store
        .insert_batch(
            vec![chunk("a.go", "A", 1, 2), chunk("b.go", "B", 1, 2)],
            vec![7, 9],
            "fh".to_string(),
        )
        .await
        .unwrap();

    let freed = store.delete_by_file("a.go").await.unwrap();
    assert_eq!(freed, vec![7]);
    assert_eq!(store.count().await.unwrap(), 1);
    assert_eq!(store.files().await.unwrap(), vec!["b.go".to_string()]);
}

#[tokio::test]
async fn filtered_slots_combine_with_and() {
    let (_dir, store) = open_store();

    let mut py = Chunk::new(
        "src/models/user.py",
        Language::Python,
        ChunkKind::Class,
        "User",
        "class User",
        "class User: ...",
        1,
        1,
    );
    py.vector_slot = Some(1);
    let go_fn = chunk("src/auth/login.go", "HandleLogin", 1, 4);

    store
        .insert_batch(vec![py, go_fn], vec![1, 2], "fh".to_string())
        .await
        .unwrap();

    // Glob only.
    let slots = store
        .filtered_slots(&SearchFilter {
            file_glob: Some("src/auth/*".to_string()),
            ..Default::default()
        })
        .await
        .unwrap();
    assert_eq!(slots, HashSet::from([2i64]));

    // Kind + language.
    let slots = store
        .filtered_slots(&SearchFilter {
            kinds: vec![ChunkKind::Class],
            languages: vec![Language::Python],
            ..Default::default()
        })
        .await
        .unwrap();
    assert_eq!(slots, HashSet::from([1i64]));

    // AND semantics: kind matches, glob does not.
    let slots = store
        .filtered_slots(&SearchFilter {
            file_glob: Some("src/auth/*".to_string()),
            kinds: vec![ChunkKind::Class],
            ..Default::default()
        })
        .await
        .unwrap();
    assert!(slots.is_empty());

    // Empty filter matches everything with a slot.
    let slots = store.filtered_slots(&SearchFilter::default()).await.unwrap();
    assert_eq!(slots.len(), 2);
}

#[tokio::test]
async fn stats_group_by_kind_and_language() {
    let (_dir, store) = open_store();

    let mut class = Chunk::new(
        "m.py",
        Language::Python,
        ChunkKind::Class,
        "M",
        "class M",
        "class M: ...",
        1,
        1,
    );
    class.vector_slot = Some(2);

    store
        .insert_batch(
            vec![chunk("a.go", "A", 1, 2), chunk("b.go", "B", 1, 2), class],
            vec![0, 1, 2],
            "fh".to_string(),
        )
        .await
        .unwrap();

    let stats = store.stats().await.unwrap();
    assert_eq!(stats.total_chunks, 3);
    assert_eq!(stats.total_files, 3);
    assert_eq!(stats.by_kind[0], ("function".to_string(), 2));
    assert!(stats.by_kind.contains(&("class".to_string(), 1)));
    assert!(stats.by_language.contains(&("go".to_string(), 2)));
    assert!(stats.by_language.contains(&("python".to_string(), 1)));
}

#[tokio::test]
async fn file_hash_survives_for_change_detection() {
    let (_dir, store) = open_store();
    store
        .insert(chunk("a.go", "A", 1, 2), 0, "abcd1234".to_string())
        .await
        .unwrap();

    assert_eq!(
        store.file_hash("a.go").await.unwrap().as_deref(),
        Some("abcd1234")
    );
    assert_eq!(store.file_hash("missing.go").await.unwrap(), None);
}

#[tokio::test]
async fn clear_and_maintenance_ops() {
    let (_dir, store) = open_store();
    store
        .insert(chunk("a.go", "A", 1, 2), 0, "fh".to_string())
        .await
        .unwrap();

    store.checkpoint().await.unwrap();
    store.shrink_memory().await.unwrap();

    store.clear().await.unwrap();
    assert_eq!(store.count().await.unwrap(), 0);
    assert_eq!(store.count_by_file("a.go").await.unwrap(), 0);
}
