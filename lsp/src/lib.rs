//! Language server client pool for semantic chunk extraction.
//!
//! Manages at most one language server subprocess per language and exposes a
//! single narrow query: document symbols with ranges for a file. Failures
//! here are never fatal to an index build; callers fall back to regex
//! extraction when a server is missing, times out, or misbehaves.

mod client;
mod error;
mod pool;
mod protocol;
mod servers;
mod symbols;

pub use client::LspClient;
pub use lsp_types::SymbolKind;
pub use error::LspErr;
pub use error::Result;
pub use pool::ClientPool;
pub use servers::ServerSpec;
pub use servers::server_for_language;
pub use symbols::SymbolNode;
