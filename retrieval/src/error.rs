//! Error types for the retrieval core.

use std::path::PathBuf;

/// Errors produced by the indexing and retrieval core.
#[derive(Debug, thiserror::Error)]
pub enum RetrievalErr {
    /// Startup configuration problems: missing key, unknown provider,
    /// dimension mismatch against a persisted index. Always fatal.
    #[error("configuration error: {0}")]
    Config(String),

    #[error("environment variable {name} is not set")]
    MissingApiKey { name: String },

    #[error("unknown embedding provider '{name}'")]
    UnknownProvider { name: String },

    #[error("embedding dimension mismatch: index has {stored}, provider produces {actual}")]
    DimensionMismatch { stored: usize, actual: usize },

    /// Embedding call failures; per-file, never fatal to a build.
    #[error("embedding request failed: {0}")]
    Embedding(String),

    #[error("sqlite operation '{operation}' failed: {cause}")]
    SqliteFailed { operation: String, cause: String },

    #[error("cannot open store at {path}: {cause}")]
    StoreOpen { path: PathBuf, cause: String },

    #[error("vector index corrupt: {0}")]
    IndexCorrupt(String),

    #[error("chunk {id} not found")]
    ChunkNotFound { id: String },

    #[error("file watcher error: {0}")]
    Watcher(String),

    /// Distinguished cancellation condition; partial state on disk is
    /// valid after the final save.
    #[error("operation cancelled")]
    Cancelled,

    #[error("serialization error: {0}")]
    Serde(#[from] serde_json::Error),

    #[error("config file error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, RetrievalErr>;
