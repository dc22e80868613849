//! Pool of language server clients, at most one per server binary.

use std::collections::HashMap;
use std::path::Path;
use std::path::PathBuf;
use std::sync::Arc;

use tokio::sync::Mutex;
use tracing::debug;
use tracing::warn;

use crate::client::LspClient;
use crate::error::LspErr;
use crate::error::Result;
use crate::servers::server_for_language;
use crate::symbols::SymbolNode;

/// Lazily spawned clients keyed by server command.
///
/// TypeScript flavors and C/C++ map to the same binary and therefore share
/// one client. Clients live until [`ClientPool::reset`] or
/// [`ClientPool::shutdown`]; the orchestrator resets periodically to bound
/// memory growth inside long-running servers.
pub struct ClientPool {
    root: PathBuf,
    clients: Mutex<HashMap<String, Arc<LspClient>>>,
}

impl ClientPool {
    /// Create an empty pool rooted at the project directory.
    pub fn new(root: &Path) -> Self {
        Self {
            root: root.to_path_buf(),
            clients: Mutex::new(HashMap::new()),
        }
    }

    /// Whether a server is declared and installed for this language id.
    pub fn has_server(&self, language_id: &str) -> bool {
        server_for_language(language_id).is_some_and(|s| s.is_available())
    }

    /// Document symbols for one file, spawning the server on first use.
    ///
    /// Any failure is reported as an error after a warning; callers fall
    /// back to regex extraction. The pool itself never aborts a build.
    pub async fn document_symbols(
        &self,
        path: &Path,
        language_id: &str,
        content: &str,
    ) -> Result<Vec<SymbolNode>> {
        let client = self.get_or_spawn(language_id).await?;

        match client.document_symbols(path, language_id, content).await {
            Ok(symbols) => Ok(symbols),
            Err(e) => {
                warn!(
                    language = language_id,
                    path = %path.display(),
                    error = %e,
                    "LSP symbol extraction failed"
                );
                if !client.is_healthy() {
                    self.discard(client.server_id()).await;
                }
                Err(e)
            }
        }
    }

    async fn get_or_spawn(&self, language_id: &str) -> Result<Arc<LspClient>> {
        let spec = server_for_language(language_id).ok_or_else(|| LspErr::ServerNotFound {
            command: format!("<none for {language_id}>"),
            language: language_id.to_string(),
        })?;

        let mut clients = self.clients.lock().await;

        if let Some(existing) = clients.get(spec.command) {
            if existing.is_healthy() {
                return Ok(Arc::clone(existing));
            }
        }
        // Unhealthy client: tear it down and respawn below.
        if let Some(stale) = clients.remove(spec.command) {
            drop(clients);
            stale.shutdown().await;
            clients = self.clients.lock().await;
        }

        match LspClient::start(spec, &self.root).await {
            Ok(client) => {
                debug!(server = spec.command, "LSP client spawned");
                let client = Arc::new(client);
                clients.insert(spec.command.to_string(), Arc::clone(&client));
                Ok(client)
            }
            Err(e) => {
                warn!(server = spec.command, error = %e, "Failed to start language server");
                Err(e)
            }
        }
    }

    async fn discard(&self, server_id: &str) {
        let removed = self.clients.lock().await.remove(server_id);
        if let Some(client) = removed {
            client.shutdown().await;
            debug!(server = server_id, "Discarded unhealthy LSP client");
        }
    }

    /// Close all clients; lazy init recreates them on next demand.
    ///
    /// Called by the orchestrator every reset interval to keep server
    /// memory bounded on long builds.
    pub async fn reset(&self) {
        let drained: Vec<Arc<LspClient>> = {
            let mut clients = self.clients.lock().await;
            clients.drain().map(|(_, c)| c).collect()
        };
        for client in drained {
            client.shutdown().await;
        }
    }

    /// Final shutdown at end of build or process exit.
    pub async fn shutdown(&self) {
        self.reset().await;
    }

    /// Number of live clients, for stats and tests.
    pub async fn client_count(&self) -> usize {
        self.clients.lock().await.len()
    }
}

impl std::fmt::Debug for ClientPool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClientPool")
            .field("root", &self.root)
            .finish()
    }
}

#[cfg(test)]
#[path = "pool.test.rs"]
mod tests;
