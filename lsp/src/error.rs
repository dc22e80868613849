//! Error types for the LSP client pool.

use std::path::PathBuf;

/// Errors produced by the LSP client pool.
#[derive(Debug, thiserror::Error)]
pub enum LspErr {
    /// The server binary is not installed or not on PATH.
    #[error("language server '{command}' not found for {language}")]
    ServerNotFound { command: String, language: String },

    /// Failed to spawn the server process.
    #[error("failed to spawn '{command}': {cause}")]
    Spawn { command: String, cause: String },

    /// A request did not complete within its deadline.
    #[error("request '{method}' timed out after {timeout_secs}s")]
    RequestTimeout { method: String, timeout_secs: u64 },

    /// The server closed its stdout or the reader task died.
    #[error("connection to language server closed")]
    ConnectionClosed,

    /// The server returned a JSON-RPC error object.
    #[error("JSON-RPC error {code}: {message}")]
    JsonRpc { code: i64, message: String },

    /// A frame or body could not be parsed.
    #[error("protocol error: {0}")]
    Protocol(String),

    /// The file to extract from could not be read.
    #[error("cannot read {path}: {cause}")]
    FileRead { path: PathBuf, cause: String },

    #[error("serialization error: {0}")]
    Serde(#[from] serde_json::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("{0}")]
    Internal(String),
}

pub type Result<T> = std::result::Result<T, LspErr>;
