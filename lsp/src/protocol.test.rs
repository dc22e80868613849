use super::*;
use pretty_assertions::assert_eq;

fn frame(body: &str) -> Vec<u8> {
    format!("Content-Length: {}\r\n\r\n{}", body.len(), body).into_bytes()
}

#[tokio::test]
async fn read_headers_parses_content_length() {
    let data = b"Content-Length: 42\r\nContent-Type: application/vscode-jsonrpc\r\n\r\n";
    let mut reader = BufReader::new(&data[..]);
    let len = read_headers(&mut reader).await.unwrap();
    assert_eq!(len, 42);
}

#[tokio::test]
async fn read_headers_rejects_missing_length() {
    let data = b"Content-Type: application/vscode-jsonrpc\r\n\r\n";
    let mut reader = BufReader::new(&data[..]);
    let err = read_headers(&mut reader).await.unwrap_err();
    assert!(matches!(err, LspErr::Protocol(_)));
}

#[tokio::test]
async fn read_headers_reports_eof_as_closed() {
    let data: &[u8] = b"";
    let mut reader = BufReader::new(data);
    let err = read_headers(&mut reader).await.unwrap_err();
    assert!(matches!(err, LspErr::ConnectionClosed));
}

#[tokio::test]
async fn read_loop_routes_response_by_id() {
    let body = r#"{"jsonrpc":"2.0","id":7,"result":{"ok":true}}"#;
    let data = frame(body);

    let pending: PendingMap = Arc::new(Mutex::new(HashMap::new()));
    let (tx, rx) = oneshot::channel();
    pending.lock().await.insert(7, tx);

    // EOF after the single frame ends the loop with ConnectionClosed.
    let _ = read_loop(&data[..], Arc::clone(&pending)).await;

    let result = rx.await.unwrap().unwrap();
    assert_eq!(result["ok"], serde_json::json!(true));
    assert!(pending.lock().await.is_empty());
}

#[tokio::test]
async fn read_loop_surfaces_jsonrpc_errors() {
    let body = r#"{"jsonrpc":"2.0","id":1,"error":{"code":-32601,"message":"method not found"}}"#;
    let data = frame(body);

    let pending: PendingMap = Arc::new(Mutex::new(HashMap::new()));
    let (tx, rx) = oneshot::channel();
    pending.lock().await.insert(1, tx);

    let _ = read_loop(&data[..], Arc::clone(&pending)).await;

    match rx.await.unwrap() {
        Err(LspErr::JsonRpc { code, message }) => {
            assert_eq!(code, -32601);
            assert_eq!(message, "method not found");
        }
        other => panic!("expected JsonRpc error, got {other:?}"),
    }
}

#[tokio::test]
async fn read_loop_ignores_notifications() {
    let notification = r#"{"jsonrpc":"2.0","method":"window/logMessage","params":{"message":"hi"}}"#;
    let response = r#"{"jsonrpc":"2.0","id":2,"result":null}"#;
    let mut data = frame(notification);
    data.extend(frame(response));

    let pending: PendingMap = Arc::new(Mutex::new(HashMap::new()));
    let (tx, rx) = oneshot::channel();
    pending.lock().await.insert(2, tx);

    let _ = read_loop(&data[..], Arc::clone(&pending)).await;

    assert_eq!(rx.await.unwrap().unwrap(), Value::Null);
}
