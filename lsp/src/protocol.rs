//! JSON-RPC 2.0 connection over LSP stdio framing.
//!
//! Frames are `Content-Length: N\r\n\r\n` followed by an N-byte JSON body.
//! Requests carry monotonically increasing integer ids; a background reader
//! task matches responses to pending requests by id. Server-originated
//! notifications and requests are logged and dropped; the indexing core
//! never acts on them.

use std::collections::HashMap;
use std::sync::atomic::AtomicBool;
use std::sync::atomic::AtomicI64;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use serde_json::Value;
use tokio::io::AsyncBufRead;
use tokio::io::AsyncBufReadExt;
use tokio::io::AsyncRead;
use tokio::io::AsyncReadExt;
use tokio::io::AsyncWriteExt;
use tokio::io::BufReader;
use tokio::process::ChildStdin;
use tokio::process::ChildStdout;
use tokio::sync::oneshot;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tracing::trace;
use tracing::warn;

use crate::error::LspErr;
use crate::error::Result;

/// Upper bound on a single header block; anything larger is a broken server.
const MAX_HEADER_BYTES: usize = 8 * 1024;

type PendingMap = Arc<Mutex<HashMap<i64, oneshot::Sender<Result<Value>>>>>;

/// A JSON-RPC connection to a single language server process.
pub struct JsonRpcConnection {
    writer: Mutex<ChildStdin>,
    pending: PendingMap,
    next_id: AtomicI64,
    closed: Arc<AtomicBool>,
    reader_handle: Mutex<Option<JoinHandle<()>>>,
}

impl JsonRpcConnection {
    /// Wrap the child's stdio and start the background reader task.
    pub fn new(stdin: ChildStdin, stdout: ChildStdout) -> Self {
        let pending: PendingMap = Arc::new(Mutex::new(HashMap::new()));
        let closed = Arc::new(AtomicBool::new(false));

        let reader_pending = Arc::clone(&pending);
        let reader_closed = Arc::clone(&closed);
        let reader_handle = tokio::spawn(async move {
            if let Err(e) = read_loop(stdout, Arc::clone(&reader_pending)).await {
                trace!(error = %e, "LSP reader task finished");
            }
            reader_closed.store(true, Ordering::Release);
            // Fail everything still waiting; the server is gone.
            let mut map = reader_pending.lock().await;
            for (_, tx) in map.drain() {
                let _ = tx.send(Err(LspErr::ConnectionClosed));
            }
        });

        Self {
            writer: Mutex::new(stdin),
            pending,
            next_id: AtomicI64::new(1),
            closed,
            reader_handle: Mutex::new(Some(reader_handle)),
        }
    }

    /// Whether the server side of the connection has gone away.
    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    /// Send a request and wait for the matching response.
    pub async fn request<P: Serialize>(
        &self,
        method: &str,
        params: P,
        timeout_secs: u64,
    ) -> Result<Value> {
        if self.is_closed() {
            return Err(LspErr::ConnectionClosed);
        }

        let id = self.next_id.fetch_add(1, Ordering::AcqRel);
        let (tx, rx) = oneshot::channel();
        self.pending.lock().await.insert(id, tx);

        let body = serde_json::json!({
            "jsonrpc": "2.0",
            "id": id,
            "method": method,
            "params": params,
        });

        if let Err(e) = self.write_frame(&body).await {
            self.pending.lock().await.remove(&id);
            return Err(e);
        }

        match tokio::time::timeout(Duration::from_secs(timeout_secs), rx).await {
            Ok(Ok(result)) => result,
            Ok(Err(_)) => Err(LspErr::ConnectionClosed),
            Err(_) => {
                self.pending.lock().await.remove(&id);
                Err(LspErr::RequestTimeout {
                    method: method.to_string(),
                    timeout_secs,
                })
            }
        }
    }

    /// Send a notification (no response expected).
    pub async fn notify<P: Serialize>(&self, method: &str, params: P) -> Result<()> {
        let body = serde_json::json!({
            "jsonrpc": "2.0",
            "method": method,
            "params": params,
        });
        self.write_frame(&body).await
    }

    /// Close stdin, signalling EOF to the server.
    pub async fn close_stdin(&self) {
        let mut writer = self.writer.lock().await;
        let _ = writer.shutdown().await;
    }

    /// Abort the reader task. Called as the final step of shutdown.
    pub async fn abort_reader(&self) {
        if let Some(handle) = self.reader_handle.lock().await.take() {
            handle.abort();
            let _ = tokio::time::timeout(Duration::from_millis(100), handle).await;
        }
    }

    async fn write_frame(&self, body: &Value) -> Result<()> {
        let payload = serde_json::to_vec(body)?;
        let header = format!("Content-Length: {}\r\n\r\n", payload.len());

        let mut writer = self.writer.lock().await;
        writer.write_all(header.as_bytes()).await?;
        writer.write_all(&payload).await?;
        writer.flush().await?;

        trace!(method = body.get("method").and_then(serde_json::Value::as_str).unwrap_or("<response>"), bytes = payload.len(), "LSP →");
        Ok(())
    }
}

/// Read frames from the server until EOF, routing responses to waiters.
async fn read_loop<R: AsyncRead + Unpin>(stdout: R, pending: PendingMap) -> Result<()> {
    let mut reader = BufReader::new(stdout);

    loop {
        let content_length = read_headers(&mut reader).await?;

        let mut body = vec![0u8; content_length];
        reader.read_exact(&mut body).await?;

        let message: Value = match serde_json::from_slice(&body) {
            Ok(v) => v,
            Err(e) => {
                warn!(error = %e, "Discarding unparseable LSP frame");
                continue;
            }
        };

        route_message(message, &pending).await;
    }
}

/// Read the header block and return the declared body length.
async fn read_headers<R: AsyncBufRead + Unpin>(reader: &mut R) -> Result<usize> {
    let mut content_length: Option<usize> = None;
    let mut total = 0usize;

    loop {
        let mut line = String::new();
        let n = reader.read_line(&mut line).await?;
        if n == 0 {
            return Err(LspErr::ConnectionClosed);
        }
        total += n;
        if total > MAX_HEADER_BYTES {
            return Err(LspErr::Protocol("header block too large".to_string()));
        }

        let line = line.trim_end();
        if line.is_empty() {
            return content_length
                .ok_or_else(|| LspErr::Protocol("missing Content-Length header".to_string()));
        }
        if let Some(value) = line.strip_prefix("Content-Length:") {
            content_length = value.trim().parse::<usize>().ok();
        }
        // Content-Type and any other headers are ignored.
    }
}

async fn route_message(message: Value, pending: &PendingMap) {
    let id = message.get("id").and_then(Value::as_i64);
    let has_result = message.get("result").is_some() || message.get("error").is_some();

    match (id, has_result) {
        (Some(id), true) => {
            let outcome = if let Some(err) = message.get("error") {
                Err(LspErr::JsonRpc {
                    code: err.get("code").and_then(Value::as_i64).unwrap_or(0),
                    message: err
                        .get("message")
                        .and_then(Value::as_str)
                        .unwrap_or("unknown")
                        .to_string(),
                })
            } else {
                Ok(message.get("result").cloned().unwrap_or(Value::Null))
            };

            if let Some(tx) = pending.lock().await.remove(&id) {
                let _ = tx.send(outcome);
            } else {
                trace!(id, "Response for unknown request id");
            }
        }
        _ => {
            // Server notification or server→client request. The pool never
            // answers these; progress and diagnostics are irrelevant to
            // symbol extraction.
            trace!(
                method = message.get("method").and_then(serde_json::Value::as_str).unwrap_or("?"),
                "Ignoring server-originated message"
            );
        }
    }
}

#[cfg(test)]
#[path = "protocol.test.rs"]
mod tests;
