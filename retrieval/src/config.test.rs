use super::*;
use pretty_assertions::assert_eq;

#[test]
fn state_paths_layout() {
    let paths = StatePaths::new(Path::new("/work/project"));
    assert_eq!(paths.state_dir, Path::new("/work/project/.zrok"));
    assert_eq!(paths.project_file, Path::new("/work/project/.zrok/project.yaml"));
    assert_eq!(paths.chunks_db, Path::new("/work/project/.zrok/index/chunks.db"));
    assert_eq!(paths.vectors_bin, Path::new("/work/project/.zrok/index/vectors.bin"));
    assert_eq!(
        paths.vectors_temp,
        Path::new("/work/project/.zrok/index/vectors_temp.bin")
    );
}

#[test]
fn defaults_match_documented_values() {
    let config = IndexConfig::default();
    assert_eq!(config.provider, "ollama");
    assert_eq!(config.embedding_concurrency, 4);
    assert_eq!(config.file_batch_size, 50);
    assert_eq!(config.lsp_reset_interval, 25);
    assert_eq!(config.max_chunk_lines, 100);
    assert_eq!(config.max_chunks_per_file, 500);
    assert_eq!(config.extraction_mode, "auto");
    assert!(config.file_workers.is_none());
}

#[test]
fn load_missing_file_gives_defaults() {
    let dir = tempfile::tempdir().unwrap();
    let paths = StatePaths::new(dir.path());
    let config = ProjectConfig::load(&paths).unwrap();
    assert_eq!(config.index, IndexConfig::default());
}

#[test]
fn save_then_load_round_trips() {
    let dir = tempfile::tempdir().unwrap();
    let paths = StatePaths::new(dir.path());

    let mut config = ProjectConfig {
        name: "demo".to_string(),
        stack: vec!["go".to_string()],
        ..Default::default()
    };
    config.index.provider = "openai".to_string();
    config.index.model = Some("text-embedding-3-small".to_string());
    config.index.exclude = vec!["generated/**".to_string()];
    config.save(&paths).unwrap();

    let loaded = ProjectConfig::load(&paths).unwrap();
    assert_eq!(loaded.name, "demo");
    assert_eq!(loaded.index.provider, "openai");
    assert_eq!(loaded.index.model.as_deref(), Some("text-embedding-3-small"));
    assert_eq!(loaded.index.exclude, vec!["generated/**".to_string()]);
}

#[test]
fn partial_yaml_fills_defaults() {
    let dir = tempfile::tempdir().unwrap();
    let paths = StatePaths::new(dir.path());
    paths.ensure_dirs().unwrap();
    std::fs::write(
        &paths.project_file,
        "name: partial\nindex:\n  provider: huggingface\n",
    )
    .unwrap();

    let config = ProjectConfig::load(&paths).unwrap();
    assert_eq!(config.index.provider, "huggingface");
    assert_eq!(config.index.max_chunk_lines, 100);
}
