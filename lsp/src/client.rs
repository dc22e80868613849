//! Client for a single language server subprocess.

use std::path::Path;
use std::process::Stdio;
use std::sync::atomic::AtomicBool;
use std::sync::atomic::Ordering;
use std::time::Duration;

use lsp_types::DidCloseTextDocumentParams;
use lsp_types::DidOpenTextDocumentParams;
use lsp_types::DocumentSymbolParams;
use lsp_types::DocumentSymbolResponse;
use lsp_types::InitializeParams;
use lsp_types::PartialResultParams;
use lsp_types::TextDocumentIdentifier;
use lsp_types::TextDocumentItem;
use lsp_types::Url;
use lsp_types::WorkDoneProgressParams;
use tokio::process::Child;
use tokio::process::Command;
use tokio::sync::Mutex;
use tracing::debug;
use tracing::info;
use tracing::warn;

use crate::error::LspErr;
use crate::error::Result;
use crate::protocol::JsonRpcConnection;
use crate::servers::ServerSpec;
use crate::symbols::to_symbol_tree;
use crate::symbols::SymbolNode;

/// Cold starts of some servers (jdtls, rust-analyzer) are slow.
const INIT_TIMEOUT_SECS: u64 = 60;
/// Ordinary per-file requests.
const REQUEST_TIMEOUT_SECS: u64 = 10;
/// Grace window between the exit notification and a hard kill.
const SHUTDOWN_GRACE: Duration = Duration::from_secs(5);

/// A running language server and its JSON-RPC connection.
pub struct LspClient {
    connection: JsonRpcConnection,
    child: Mutex<Child>,
    pid: Option<u32>,
    server_id: String,
    /// Cleared on timeout or protocol failure; the pool discards unhealthy
    /// clients instead of reusing them.
    healthy: AtomicBool,
}

impl LspClient {
    /// Spawn the server and run the initialize handshake.
    pub async fn start(spec: &ServerSpec, root: &Path) -> Result<Self> {
        if !spec.is_available() {
            return Err(LspErr::ServerNotFound {
                command: spec.command.to_string(),
                language: spec.language.to_string(),
            });
        }

        let mut command = Command::new(spec.command);
        command
            .args(spec.args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .kill_on_drop(true);

        // Own process group so a hard kill reaches forked helpers too.
        #[cfg(unix)]
        command.process_group(0);

        let mut child = command.spawn().map_err(|e| LspErr::Spawn {
            command: spec.command.to_string(),
            cause: e.to_string(),
        })?;

        let stdin = child
            .stdin
            .take()
            .ok_or_else(|| LspErr::Internal("child has no stdin".to_string()))?;
        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| LspErr::Internal("child has no stdout".to_string()))?;

        let pid = child.id();
        let connection = JsonRpcConnection::new(stdin, stdout);

        let client = Self {
            connection,
            child: Mutex::new(child),
            pid,
            server_id: spec.command.to_string(),
            healthy: AtomicBool::new(true),
        };

        client.initialize(root).await?;
        Ok(client)
    }

    /// Whether this client can still serve requests.
    pub fn is_healthy(&self) -> bool {
        self.healthy.load(Ordering::Acquire) && !self.connection.is_closed()
    }

    pub fn server_id(&self) -> &str {
        &self.server_id
    }

    #[allow(deprecated)] // root_uri is deprecated but still widely supported
    async fn initialize(&self, root: &Path) -> Result<()> {
        let root_uri = Url::from_file_path(root)
            .map_err(|_| LspErr::Internal(format!("invalid root path: {}", root.display())))?;

        let params = InitializeParams {
            root_uri: Some(root_uri),
            capabilities: lsp_types::ClientCapabilities {
                text_document: Some(lsp_types::TextDocumentClientCapabilities {
                    document_symbol: Some(lsp_types::DocumentSymbolClientCapabilities {
                        hierarchical_document_symbol_support: Some(true),
                        ..Default::default()
                    }),
                    ..Default::default()
                }),
                ..Default::default()
            },
            ..Default::default()
        };

        let result = self
            .connection
            .request("initialize", params, INIT_TIMEOUT_SECS)
            .await;

        match result {
            Ok(value) => {
                info!(
                    server = %self.server_id,
                    name = value
                        .pointer("/serverInfo/name")
                        .and_then(serde_json::Value::as_str)
                        .unwrap_or("?"),
                    "LSP server initialized"
                );
            }
            Err(e) => {
                self.healthy.store(false, Ordering::Release);
                return Err(e);
            }
        }

        self.connection
            .notify("initialized", serde_json::json!({}))
            .await?;
        Ok(())
    }

    /// Fetch the document symbol tree for one file.
    ///
    /// Runs the didOpen → documentSymbol → didClose sequence with the file
    /// content supplied by the caller, so the file is read exactly once per
    /// extraction. Line numbers in the result are zero-indexed.
    pub async fn document_symbols(
        &self,
        path: &Path,
        language_id: &str,
        content: &str,
    ) -> Result<Vec<SymbolNode>> {
        let uri = Url::from_file_path(path)
            .map_err(|_| LspErr::Internal(format!("invalid file path: {}", path.display())))?;

        let open = DidOpenTextDocumentParams {
            text_document: TextDocumentItem {
                uri: uri.clone(),
                language_id: language_id.to_string(),
                version: 1,
                text: content.to_string(),
            },
        };
        self.connection.notify("textDocument/didOpen", open).await?;

        let params = DocumentSymbolParams {
            text_document: TextDocumentIdentifier { uri: uri.clone() },
            work_done_progress_params: WorkDoneProgressParams::default(),
            partial_result_params: PartialResultParams::default(),
        };

        let result = self
            .connection
            .request("textDocument/documentSymbol", params, REQUEST_TIMEOUT_SECS)
            .await;

        // Always close, even after a failed request; servers keep per-file
        // state otherwise.
        let close = DidCloseTextDocumentParams {
            text_document: TextDocumentIdentifier { uri },
        };
        let _ = self.connection.notify("textDocument/didClose", close).await;

        let value = match result {
            Ok(v) => v,
            Err(e @ LspErr::RequestTimeout { .. }) => {
                self.healthy.store(false, Ordering::Release);
                return Err(e);
            }
            Err(e) => return Err(e),
        };

        if value.is_null() {
            return Ok(Vec::new());
        }

        let response: DocumentSymbolResponse = serde_json::from_value(value)?;
        let tree = to_symbol_tree(response);
        debug!(
            server = %self.server_id,
            path = %path.display(),
            symbols = tree.len(),
            "Document symbols retrieved"
        );
        Ok(tree)
    }

    /// Graceful shutdown: shutdown request, exit notification, close stdin,
    /// then wait with a grace window before killing the process group.
    pub async fn shutdown(&self) {
        debug!(server = %self.server_id, "Shutting down LSP server");

        match self
            .connection
            .request("shutdown", serde_json::Value::Null, SHUTDOWN_GRACE.as_secs())
            .await
        {
            Ok(_) => {}
            Err(e) => debug!(server = %self.server_id, error = %e, "Shutdown request failed"),
        }

        let _ = self
            .connection
            .notify("exit", serde_json::Value::Null)
            .await;
        self.connection.close_stdin().await;

        let mut child = self.child.lock().await;
        match tokio::time::timeout(SHUTDOWN_GRACE, child.wait()).await {
            Ok(Ok(status)) => {
                debug!(server = %self.server_id, %status, "LSP server exited");
            }
            Ok(Err(e)) => {
                warn!(server = %self.server_id, error = %e, "Wait on LSP server failed");
            }
            Err(_) => {
                warn!(
                    server = %self.server_id,
                    grace_secs = SHUTDOWN_GRACE.as_secs(),
                    "LSP server ignored exit, killing process group"
                );
                kill_process_group(&mut child, self.pid).await;
            }
        }

        self.connection.abort_reader().await;
    }
}

/// Hard-kill a server, reaching any helper processes it forked.
///
/// POSIX: signal the whole process group (the child was spawned as its own
/// group leader). Windows: terminate the spawned process directly.
async fn kill_process_group(child: &mut Child, pid: Option<u32>) {
    #[cfg(unix)]
    if let Some(pid) = pid {
        unsafe {
            libc::killpg(pid as libc::pid_t, libc::SIGKILL);
        }
        let _ = child.wait().await;
        return;
    }

    // Windows, or a child whose pid was never known.
    let _ = child.kill().await;
}

impl std::fmt::Debug for LspClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LspClient")
            .field("server_id", &self.server_id)
            .field("healthy", &self.is_healthy())
            .finish()
    }
}
