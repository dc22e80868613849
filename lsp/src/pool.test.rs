use super::*;

#[tokio::test]
async fn pool_starts_empty() {
    let dir = tempfile::tempdir().unwrap();
    let pool = ClientPool::new(dir.path());
    assert_eq!(pool.client_count().await, 0);
}

#[tokio::test]
async fn unknown_language_is_reported_not_spawned() {
    let dir = tempfile::tempdir().unwrap();
    let pool = ClientPool::new(dir.path());

    let err = pool
        .document_symbols(&dir.path().join("x.cob"), "cobol", "IDENTIFICATION DIVISION.")
        .await
        .unwrap_err();

    assert!(matches!(err, LspErr::ServerNotFound { .. }));
    assert_eq!(pool.client_count().await, 0);
}

#[tokio::test]
async fn missing_binary_fails_without_poisoning_the_pool() {
    let dir = tempfile::tempdir().unwrap();
    let pool = ClientPool::new(dir.path());

    // jdtls is vanishingly unlikely to be installed in CI. If it is, the
    // spawn may succeed and this test is silently a no-op for that arm.
    if pool.has_server("java") {
        return;
    }

    let result = pool
        .document_symbols(&dir.path().join("A.java"), "java", "class A {}")
        .await;
    assert!(result.is_err());
    assert_eq!(pool.client_count().await, 0);

    // A failed spawn must not prevent later reset/shutdown.
    pool.shutdown().await;
}

#[tokio::test]
async fn reset_empties_the_pool() {
    let dir = tempfile::tempdir().unwrap();
    let pool = ClientPool::new(dir.path());
    pool.reset().await;
    assert_eq!(pool.client_count().await, 0);
}
