//! Project configuration and on-disk layout.
//!
//! Everything lives under the project's `.zrok/` state directory:
//! `project.yaml` for config, `index/chunks.db` for chunk metadata,
//! `index/vectors.bin` for the persisted ANN index. Environment variables
//! override file values at load time.

use std::env;
use std::path::Path;
use std::path::PathBuf;

use serde::Deserialize;
use serde::Serialize;

use crate::error::Result;

/// Name of the tool state directory under the project root.
pub const STATE_DIR: &str = ".zrok";

/// Default extraction mode.
pub const DEFAULT_EXTRACTION_MODE: &str = "auto";

/// Resolved locations of everything the core touches on disk.
#[derive(Debug, Clone)]
pub struct StatePaths {
    pub root: PathBuf,
    pub state_dir: PathBuf,
    pub project_file: PathBuf,
    pub index_dir: PathBuf,
    pub chunks_db: PathBuf,
    pub vectors_bin: PathBuf,
    pub vectors_temp: PathBuf,
}

impl StatePaths {
    pub fn new(root: &Path) -> Self {
        let state_dir = root.join(STATE_DIR);
        let index_dir = state_dir.join("index");
        Self {
            root: root.to_path_buf(),
            project_file: state_dir.join("project.yaml"),
            chunks_db: index_dir.join("chunks.db"),
            vectors_bin: index_dir.join("vectors.bin"),
            vectors_temp: index_dir.join("vectors_temp.bin"),
            state_dir,
            index_dir,
        }
    }

    /// Create the state and index directories if missing.
    pub fn ensure_dirs(&self) -> Result<()> {
        std::fs::create_dir_all(&self.index_dir)?;
        Ok(())
    }
}

/// Top-level `project.yaml`.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct ProjectConfig {
    #[serde(default)]
    pub name: String,
    /// Detected technology stack, informational only.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub stack: Vec<String>,
    /// Free-form scope note written by collaborators.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scope: Option<String>,
    #[serde(default)]
    pub index: IndexConfig,
}

impl ProjectConfig {
    /// Load `project.yaml`, then apply environment overrides.
    ///
    /// A missing file yields defaults so that read-only commands work on
    /// never-enabled projects.
    pub fn load(paths: &StatePaths) -> Result<Self> {
        let mut config = if paths.project_file.exists() {
            let text = std::fs::read_to_string(&paths.project_file)?;
            serde_yaml::from_str(&text)?
        } else {
            Self::default()
        };
        config.index.apply_env_overrides();
        Ok(config)
    }

    /// Persist the config back to `project.yaml`.
    pub fn save(&self, paths: &StatePaths) -> Result<()> {
        paths.ensure_dirs()?;
        let text = serde_yaml::to_string(self)?;
        std::fs::write(&paths.project_file, text)?;
        Ok(())
    }
}

/// The `index:` section of `project.yaml`, plus runtime tuning knobs.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct IndexConfig {
    /// Embedding provider name: `ollama`, `openai`, or `huggingface`.
    pub provider: String,
    /// Model override; each provider has a default.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    /// Endpoint override (ollama only).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub endpoint: Option<String>,
    /// Vector dimension override.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dimension: Option<usize>,
    /// Provider-internal sub-batch size override.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub provider_batch_size: Option<usize>,

    /// Texts per embed-batch call submitted during indexing.
    pub embedding_batch_size: usize,
    /// Concurrent embedding requests per file (semaphore width).
    pub embedding_concurrency: usize,
    /// Files between memory shrink passes.
    pub file_batch_size: usize,
    /// Worker count override; `None` means auto-size from available RAM.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub file_workers: Option<usize>,
    /// Files a worker processes before recycling its LSP clients.
    pub lsp_reset_interval: usize,
    /// Spans longer than this split into overlapping `block` chunks.
    pub max_chunk_lines: usize,
    /// Hard cap on chunks from a single file.
    pub max_chunks_per_file: usize,
    /// `auto`, `lsp`, or `regex`.
    pub extraction_mode: String,
    /// Minimum score for search hits, if set.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub score_threshold: Option<f32>,
    /// User-supplied glob exclusions for the walker.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub exclude: Vec<String>,
}

impl Default for IndexConfig {
    fn default() -> Self {
        Self {
            provider: "ollama".to_string(),
            model: None,
            endpoint: None,
            dimension: None,
            provider_batch_size: None,
            embedding_batch_size: 32,
            embedding_concurrency: 4,
            file_batch_size: 50,
            file_workers: None,
            lsp_reset_interval: 25,
            max_chunk_lines: 100,
            max_chunks_per_file: 500,
            extraction_mode: DEFAULT_EXTRACTION_MODE.to_string(),
            score_threshold: None,
            exclude: Vec::new(),
        }
    }
}

impl IndexConfig {
    /// Apply `ZROK_*` environment overrides on top of the file values.
    pub fn apply_env_overrides(&mut self) {
        if let Some(v) = env_usize("ZROK_EMBEDDING_BATCH_SIZE") {
            self.embedding_batch_size = v;
        }
        if let Some(v) = env_usize("ZROK_FILE_BATCH_SIZE") {
            self.file_batch_size = v;
        }
        if let Some(v) = env_usize("ZROK_MAX_CHUNKS_PER_FILE") {
            self.max_chunks_per_file = v;
        }
        if let Some(v) = env_usize("ZROK_EMBEDDING_CONCURRENCY") {
            self.embedding_concurrency = v;
        }
        if let Some(v) = env_usize("ZROK_FILE_WORKERS") {
            self.file_workers = Some(v);
        }
        if let Some(v) = env_usize("ZROK_LSP_RESET_INTERVAL") {
            self.lsp_reset_interval = v;
        }
        if let Some(v) = env_usize("ZROK_PROVIDER_BATCH_SIZE") {
            self.provider_batch_size = Some(v);
        }
    }
}

/// `ZROK_DEBUG_VERBOSE=1` widens the default log filter.
pub fn debug_verbose() -> bool {
    env_flag("ZROK_DEBUG_VERBOSE")
}

/// `ZROK_PROFILE_MEMORY=1` logs memory stats after every shrink pass.
pub fn profile_memory() -> bool {
    env_flag("ZROK_PROFILE_MEMORY")
}

fn env_usize(name: &str) -> Option<usize> {
    env::var(name).ok()?.trim().parse().ok()
}

fn env_flag(name: &str) -> bool {
    matches!(
        env::var(name).ok().as_deref(),
        Some("1") | Some("true") | Some("yes")
    )
}

#[cfg(test)]
#[path = "config.test.rs"]
mod tests;
