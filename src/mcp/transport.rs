// Transports for external tool servers
//
// Implements JSON-RPC 2.0 over three channels: subprocess stdio, HTTP +
// server-sent events, and streamable HTTP. Stdio and SSE are full-duplex:
// a background reader task routes responses to waiting callers by request
// id, so interleaved server notifications never corrupt a call. Streamable
// HTTP is request/response per POST.

use std::collections::HashMap;
use std::process::Stdio;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use futures::StreamExt;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::process::{Child, ChildStdin};
use tokio::sync::{oneshot, Mutex};
use tokio::task::JoinHandle;
use tokio::time::timeout;
use tracing::{debug, warn};

use super::config::{McpServerConfig, TransportKind};

/// JSON-RPC 2.0 request
#[derive(Debug, Serialize)]
struct JsonRpcRequest {
    jsonrpc: &'static str,
    id: u64,
    method: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    params: Option<Value>,
}

/// JSON-RPC 2.0 response
#[derive(Debug, Deserialize)]
struct JsonRpcResponse {
    #[allow(dead_code)]
    jsonrpc: String,
    #[serde(default)]
    id: Option<u64>,
    #[serde(default)]
    result: Option<Value>,
    #[serde(default)]
    error: Option<JsonRpcError>,
}

/// JSON-RPC 2.0 error
#[derive(Debug, Deserialize)]
struct JsonRpcError {
    code: i64,
    message: String,
    #[serde(default)]
    #[allow(dead_code)]
    data: Option<Value>,
}

/// Map of in-flight request id -> reply channel. Registered before the
/// request is written so a fast reply can never race past its waiter.
type PendingMap = Arc<Mutex<HashMap<u64, oneshot::Sender<Result<Value, String>>>>>;

/// One live channel to an external server.
pub enum Transport {
    Stdio(StdioTransport),
    Sse(SseTransport),
    StreamableHttp(HttpTransport),
}

impl Transport {
    /// Connect using the transport the config selects.
    pub async fn connect(server: &str, config: &McpServerConfig) -> Result<Self> {
        match config
            .select_transport(server)
            .map_err(|e| anyhow::anyhow!(e.to_string()))?
        {
            TransportKind::StreamableHttp => {
                Ok(Transport::StreamableHttp(HttpTransport::new(server, config)?))
            }
            TransportKind::Sse => Ok(Transport::Sse(SseTransport::connect(server, config).await?)),
            TransportKind::Stdio => {
                Ok(Transport::Stdio(StdioTransport::spawn(server, config).await?))
            }
        }
    }

    /// Send a request and wait for the matching response, bounded by
    /// `deadline`.
    pub async fn request(
        &self,
        method: &str,
        params: Option<Value>,
        deadline: Duration,
    ) -> Result<Value> {
        match self {
            Transport::Stdio(t) => t.request(method, params, deadline).await,
            Transport::Sse(t) => t.request(method, params, deadline).await,
            Transport::StreamableHttp(t) => t.request(method, params, deadline).await,
        }
    }

    /// Send a notification (no response expected).
    pub async fn notify(&self, method: &str, params: Option<Value>) -> Result<()> {
        match self {
            Transport::Stdio(t) => t.notify(method, params).await,
            Transport::Sse(t) => t.notify(method, params).await,
            Transport::StreamableHttp(t) => t.notify(method, params).await,
        }
    }

    /// Tear the channel down. Idempotent; close failures are the caller's
    /// to log, not to propagate.
    pub async fn close(&self) -> Result<()> {
        match self {
            Transport::Stdio(t) => t.close().await,
            Transport::Sse(t) => t.close().await,
            Transport::StreamableHttp(t) => t.close().await,
        }
    }
}

/// Route one JSON-RPC message (already parsed) from the wire to its waiter.
async fn route_message(raw: &str, server: &str, pending: &PendingMap) {
    let value: Value = match serde_json::from_str(raw) {
        Ok(v) => v,
        Err(e) => {
            warn!("Unparseable message from '{}': {} ({})", server, raw.trim(), e);
            return;
        }
    };

    // Server-initiated requests and notifications carry a method; we do not
    // serve any, so they are observed and dropped.
    if value.get("method").is_some() {
        debug!(
            "Notification from '{}': {}",
            server,
            value.get("method").and_then(|m| m.as_str()).unwrap_or("?")
        );
        return;
    }

    let response: JsonRpcResponse = match serde_json::from_value(value) {
        Ok(r) => r,
        Err(e) => {
            warn!("Malformed response from '{}': {}", server, e);
            return;
        }
    };

    let Some(id) = response.id else {
        debug!("Response without id from '{}'", server);
        return;
    };

    let sender = pending.lock().await.remove(&id);
    let Some(sender) = sender else {
        debug!("No waiter for response id {} from '{}'", id, server);
        return;
    };

    let outcome = match (response.result, response.error) {
        (_, Some(err)) => Err(format!("server error {}: {}", err.code, err.message)),
        (Some(result), None) => Ok(result),
        (None, None) => Ok(Value::Null),
    };
    let _ = sender.send(outcome);
}

/// Fail every in-flight request, e.g. when the stream closes underneath us.
async fn fail_pending(pending: &PendingMap, reason: &str) {
    let mut guard = pending.lock().await;
    for (_, sender) in guard.drain() {
        let _ = sender.send(Err(reason.to_string()));
    }
}

async fn await_reply(
    rx: oneshot::Receiver<Result<Value, String>>,
    id: u64,
    pending: &PendingMap,
    server: &str,
    method: &str,
    deadline: Duration,
) -> Result<Value> {
    match timeout(deadline, rx).await {
        Ok(Ok(Ok(result))) => Ok(result),
        Ok(Ok(Err(message))) => {
            bail!("'{}' failed on server '{}': {}", method, server, message)
        }
        Ok(Err(_)) => bail!("connection to '{}' closed before reply", server),
        Err(_) => {
            pending.lock().await.remove(&id);
            bail!(
                "'{}' on server '{}' timed out after {:?}",
                method,
                server,
                deadline
            )
        }
    }
}

// ---------------------------------------------------------------------------
// Stdio
// ---------------------------------------------------------------------------

/// Line-delimited JSON-RPC over a spawned child process.
pub struct StdioTransport {
    server: String,
    child: Mutex<Option<Child>>,
    stdin: Mutex<Option<ChildStdin>>,
    reader: Mutex<Option<JoinHandle<()>>>,
    pending: PendingMap,
    next_id: AtomicU64,
}

impl StdioTransport {
    pub async fn spawn(server: &str, config: &McpServerConfig) -> Result<Self> {
        let command = config
            .command
            .as_ref()
            .context("stdio transport requires 'command'")?;

        tracing::info!("Spawning tool server '{}': {}", server, command);

        let mut cmd = tokio::process::Command::new(command);
        cmd.args(&config.args)
            .envs(&config.env)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::inherit())
            .kill_on_drop(true);
        if let Some(cwd) = &config.cwd {
            cmd.current_dir(cwd);
        }

        let mut child = cmd
            .spawn()
            .with_context(|| format!("failed to spawn server '{}'", server))?;

        let stdin = child
            .stdin
            .take()
            .context("failed to open stdin for spawned server")?;
        let stdout = child
            .stdout
            .take()
            .context("failed to open stdout for spawned server")?;

        let pending: PendingMap = Arc::new(Mutex::new(HashMap::new()));
        let reader = tokio::spawn(Self::read_loop(
            server.to_string(),
            stdout,
            Arc::clone(&pending),
        ));

        Ok(Self {
            server: server.to_string(),
            child: Mutex::new(Some(child)),
            stdin: Mutex::new(Some(stdin)),
            reader: Mutex::new(Some(reader)),
            pending,
            next_id: AtomicU64::new(1),
        })
    }

    async fn read_loop(server: String, stdout: tokio::process::ChildStdout, pending: PendingMap) {
        let mut lines = BufReader::new(stdout).lines();
        loop {
            match lines.next_line().await {
                Ok(Some(line)) if line.trim().is_empty() => continue,
                Ok(Some(line)) => route_message(&line, &server, &pending).await,
                Ok(None) => break,
                Err(e) => {
                    warn!("Read error from '{}': {}", server, e);
                    break;
                }
            }
        }
        debug!("Server '{}' closed its stdout", server);
        fail_pending(&pending, "server process closed the pipe").await;
    }

    async fn write_line(&self, payload: &str) -> Result<()> {
        let mut guard = self.stdin.lock().await;
        let stdin = guard
            .as_mut()
            .with_context(|| format!("connection to '{}' is closed", self.server))?;
        stdin.write_all(payload.as_bytes()).await?;
        stdin.write_all(b"\n").await?;
        stdin.flush().await?;
        Ok(())
    }

    pub async fn request(
        &self,
        method: &str,
        params: Option<Value>,
        deadline: Duration,
    ) -> Result<Value> {
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        let request = JsonRpcRequest {
            jsonrpc: "2.0",
            id,
            method: method.to_string(),
            params,
        };
        let payload = serde_json::to_string(&request)?;
        debug!("-> '{}': {}", self.server, payload);

        let (tx, rx) = oneshot::channel();
        self.pending.lock().await.insert(id, tx);

        if let Err(e) = self.write_line(&payload).await {
            self.pending.lock().await.remove(&id);
            return Err(e);
        }

        await_reply(rx, id, &self.pending, &self.server, method, deadline).await
    }

    pub async fn notify(&self, method: &str, params: Option<Value>) -> Result<()> {
        let notification = serde_json::json!({
            "jsonrpc": "2.0",
            "method": method,
            "params": params,
        });
        self.write_line(&serde_json::to_string(&notification)?).await
    }

    pub async fn close(&self) -> Result<()> {
        if let Some(reader) = self.reader.lock().await.take() {
            reader.abort();
        }
        self.stdin.lock().await.take();
        fail_pending(&self.pending, "connection closed").await;

        if let Some(mut child) = self.child.lock().await.take() {
            child
                .kill()
                .await
                .with_context(|| format!("failed to kill server '{}'", self.server))?;
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// SSE
// ---------------------------------------------------------------------------

/// One parsed server-sent event.
#[derive(Debug, PartialEq)]
struct SseEvent {
    event: String,
    data: String,
}

/// Parse one event block (the text between blank-line separators).
fn parse_sse_block(block: &str) -> Option<SseEvent> {
    let mut event = "message".to_string();
    let mut data_lines = Vec::new();

    for line in block.lines() {
        if let Some(rest) = line.strip_prefix("event:") {
            event = rest.trim().to_string();
        } else if let Some(rest) = line.strip_prefix("data:") {
            data_lines.push(rest.strip_prefix(' ').unwrap_or(rest));
        }
        // Comments (":...") and other fields (id:, retry:) are ignored.
    }

    if data_lines.is_empty() {
        return None;
    }
    Some(SseEvent {
        event,
        data: data_lines.join("\n"),
    })
}

/// HTTP + server-sent events: a long-lived GET stream delivers responses,
/// requests go out as POSTs to an endpoint the server announces in its
/// first event.
pub struct SseTransport {
    server: String,
    client: reqwest::Client,
    endpoint: String,
    reader: Mutex<Option<JoinHandle<()>>>,
    pending: PendingMap,
    next_id: AtomicU64,
}

impl SseTransport {
    pub async fn connect(server: &str, config: &McpServerConfig) -> Result<Self> {
        let url = config.url.as_ref().context("SSE transport requires 'url'")?;
        let client = reqwest::Client::new();

        let response = client
            .get(url)
            .header("Accept", "text/event-stream")
            .send()
            .await
            .with_context(|| format!("failed to open event stream to '{}'", server))?;

        if !response.status().is_success() {
            bail!(
                "server '{}' rejected the event stream: HTTP {}",
                server,
                response.status()
            );
        }

        let base = reqwest::Url::parse(url)
            .with_context(|| format!("invalid SSE url for server '{}'", server))?;

        let pending: PendingMap = Arc::new(Mutex::new(HashMap::new()));
        let (endpoint_tx, endpoint_rx) = oneshot::channel();
        let reader = tokio::spawn(Self::read_loop(
            server.to_string(),
            response,
            Arc::clone(&pending),
            endpoint_tx,
        ));

        // The server must announce its message endpoint before anything else.
        let endpoint_path = match timeout(config.timeout(), endpoint_rx).await {
            Ok(Ok(path)) => path,
            Ok(Err(_)) => {
                reader.abort();
                bail!("event stream from '{}' closed before announcing an endpoint", server)
            }
            Err(_) => {
                reader.abort();
                bail!("server '{}' never announced a message endpoint", server)
            }
        };

        let endpoint = base
            .join(&endpoint_path)
            .with_context(|| format!("invalid endpoint '{}' from server '{}'", endpoint_path, server))?
            .to_string();
        debug!("Server '{}' announced endpoint {}", server, endpoint);

        Ok(Self {
            server: server.to_string(),
            client,
            endpoint,
            reader: Mutex::new(Some(reader)),
            pending,
            next_id: AtomicU64::new(1),
        })
    }

    async fn read_loop(
        server: String,
        response: reqwest::Response,
        pending: PendingMap,
        endpoint_tx: oneshot::Sender<String>,
    ) {
        let mut endpoint_tx = Some(endpoint_tx);
        let mut buffer = String::new();
        let mut stream = response.bytes_stream();

        while let Some(chunk) = stream.next().await {
            let chunk = match chunk {
                Ok(c) => c,
                Err(e) => {
                    warn!("Event stream error from '{}': {}", server, e);
                    break;
                }
            };
            buffer.push_str(&String::from_utf8_lossy(&chunk).replace("\r\n", "\n"));

            while let Some(pos) = buffer.find("\n\n") {
                let block: String = buffer.drain(..pos + 2).collect();
                let Some(event) = parse_sse_block(&block) else {
                    continue;
                };
                match event.event.as_str() {
                    "endpoint" => {
                        if let Some(tx) = endpoint_tx.take() {
                            let _ = tx.send(event.data);
                        }
                    }
                    _ => route_message(&event.data, &server, &pending).await,
                }
            }
        }

        debug!("Event stream from '{}' ended", server);
        fail_pending(&pending, "event stream closed").await;
    }

    pub async fn request(
        &self,
        method: &str,
        params: Option<Value>,
        deadline: Duration,
    ) -> Result<Value> {
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        let request = JsonRpcRequest {
            jsonrpc: "2.0",
            id,
            method: method.to_string(),
            params,
        };

        let (tx, rx) = oneshot::channel();
        self.pending.lock().await.insert(id, tx);

        let posted = self
            .client
            .post(&self.endpoint)
            .json(&request)
            .send()
            .await;
        match posted {
            Ok(response) if response.status().is_success() => {}
            Ok(response) => {
                self.pending.lock().await.remove(&id);
                bail!(
                    "server '{}' rejected request '{}': HTTP {}",
                    self.server,
                    method,
                    response.status()
                );
            }
            Err(e) => {
                self.pending.lock().await.remove(&id);
                return Err(e).with_context(|| {
                    format!("failed to post '{}' to server '{}'", method, self.server)
                });
            }
        }

        await_reply(rx, id, &self.pending, &self.server, method, deadline).await
    }

    pub async fn notify(&self, method: &str, params: Option<Value>) -> Result<()> {
        let notification = serde_json::json!({
            "jsonrpc": "2.0",
            "method": method,
            "params": params,
        });
        let response = self
            .client
            .post(&self.endpoint)
            .json(&notification)
            .send()
            .await
            .with_context(|| format!("failed to notify server '{}'", self.server))?;
        if !response.status().is_success() {
            bail!(
                "server '{}' rejected notification: HTTP {}",
                self.server,
                response.status()
            );
        }
        Ok(())
    }

    pub async fn close(&self) -> Result<()> {
        if let Some(reader) = self.reader.lock().await.take() {
            reader.abort();
        }
        fail_pending(&self.pending, "connection closed").await;
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Streamable HTTP
// ---------------------------------------------------------------------------

/// Streamable HTTP: every request is one POST. The reply body is either
/// plain JSON or a short event-stream carrying the response. A session id
/// issued by the server is echoed on subsequent requests.
pub struct HttpTransport {
    server: String,
    client: reqwest::Client,
    url: String,
    session: std::sync::Mutex<Option<String>>,
    next_id: AtomicU64,
}

impl HttpTransport {
    pub fn new(server: &str, config: &McpServerConfig) -> Result<Self> {
        let url = config
            .http_url
            .as_ref()
            .context("streamable HTTP transport requires 'http_url'")?;
        Ok(Self {
            server: server.to_string(),
            client: reqwest::Client::new(),
            url: url.clone(),
            session: std::sync::Mutex::new(None),
            next_id: AtomicU64::new(1),
        })
    }

    fn session_id(&self) -> Option<String> {
        self.session.lock().expect("session lock poisoned").clone()
    }

    fn remember_session(&self, response: &reqwest::Response) {
        if let Some(id) = response
            .headers()
            .get("mcp-session-id")
            .and_then(|v| v.to_str().ok())
        {
            *self.session.lock().expect("session lock poisoned") = Some(id.to_string());
        }
    }

    async fn post(&self, body: &impl Serialize) -> Result<reqwest::Response> {
        let mut builder = self
            .client
            .post(&self.url)
            .header("Accept", "application/json, text/event-stream")
            .json(body);
        if let Some(session) = self.session_id() {
            builder = builder.header("Mcp-Session-Id", session);
        }
        builder
            .send()
            .await
            .with_context(|| format!("failed to reach server '{}'", self.server))
    }

    pub async fn request(
        &self,
        method: &str,
        params: Option<Value>,
        deadline: Duration,
    ) -> Result<Value> {
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        let request = JsonRpcRequest {
            jsonrpc: "2.0",
            id,
            method: method.to_string(),
            params,
        };

        let response = timeout(deadline, self.post(&request))
            .await
            .map_err(|_| {
                anyhow::anyhow!(
                    "'{}' on server '{}' timed out after {:?}",
                    method,
                    self.server,
                    deadline
                )
            })??;

        if !response.status().is_success() {
            bail!(
                "server '{}' rejected '{}': HTTP {}",
                self.server,
                method,
                response.status()
            );
        }
        self.remember_session(&response);

        let is_event_stream = response
            .headers()
            .get("content-type")
            .and_then(|v| v.to_str().ok())
            .map(|ct| ct.starts_with("text/event-stream"))
            .unwrap_or(false);

        let body = timeout(deadline, response.text())
            .await
            .map_err(|_| anyhow::anyhow!("reading reply from '{}' timed out", self.server))??;

        let raw = if is_event_stream {
            Self::first_data_block(&body).with_context(|| {
                format!("event-stream reply from '{}' carried no data", self.server)
            })?
        } else {
            body
        };

        let parsed: JsonRpcResponse = serde_json::from_str(&raw)
            .with_context(|| format!("unparseable reply from server '{}'", self.server))?;

        if let Some(err) = parsed.error {
            bail!(
                "'{}' failed on server '{}': server error {}: {}",
                method,
                self.server,
                err.code,
                err.message
            );
        }
        Ok(parsed.result.unwrap_or(Value::Null))
    }

    fn first_data_block(body: &str) -> Option<String> {
        let normalized = body.replace("\r\n", "\n");
        normalized
            .split("\n\n")
            .filter_map(parse_sse_block)
            .map(|event| event.data)
            .next()
    }

    pub async fn notify(&self, method: &str, params: Option<Value>) -> Result<()> {
        let notification = serde_json::json!({
            "jsonrpc": "2.0",
            "method": method,
            "params": params,
        });
        let response = self.post(&notification).await?;
        if !response.status().is_success() {
            bail!(
                "server '{}' rejected notification: HTTP {}",
                self.server,
                response.status()
            );
        }
        Ok(())
    }

    pub async fn close(&self) -> Result<()> {
        *self.session.lock().expect("session lock poisoned") = None;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_json_rpc_request_serialization() {
        let request = JsonRpcRequest {
            jsonrpc: "2.0",
            id: 1,
            method: "tools/list".to_string(),
            params: None,
        };
        let serialized = serde_json::to_string(&request).unwrap();
        assert!(serialized.contains("\"jsonrpc\":\"2.0\""));
        assert!(serialized.contains("\"method\":\"tools/list\""));
        assert!(!serialized.contains("params"));
    }

    #[test]
    fn test_json_rpc_response_parsing() {
        let response: JsonRpcResponse =
            serde_json::from_str(r#"{"jsonrpc":"2.0","id":1,"result":{"foo":"bar"}}"#).unwrap();
        assert_eq!(response.id, Some(1));
        assert!(response.result.is_some());
        assert!(response.error.is_none());
    }

    #[test]
    fn test_json_rpc_error_parsing() {
        let response: JsonRpcResponse = serde_json::from_str(
            r#"{"jsonrpc":"2.0","id":1,"error":{"code":-32600,"message":"Invalid request"}}"#,
        )
        .unwrap();
        let error = response.error.unwrap();
        assert_eq!(error.code, -32600);
        assert_eq!(error.message, "Invalid request");
    }

    #[test]
    fn test_sse_block_parsing() {
        let event = parse_sse_block("event: endpoint\ndata: /messages?session=abc").unwrap();
        assert_eq!(event.event, "endpoint");
        assert_eq!(event.data, "/messages?session=abc");

        // Default event type is "message"; multiple data lines join.
        let event = parse_sse_block("data: {\"a\":\ndata: 1}").unwrap();
        assert_eq!(event.event, "message");
        assert_eq!(event.data, "{\"a\":\n1}");

        // Comment-only blocks produce nothing.
        assert!(parse_sse_block(": keepalive").is_none());
    }

    #[test]
    fn test_first_data_block_skips_keepalives() {
        let body = ": ping\n\nevent: message\ndata: {\"id\":1}\n\n";
        assert_eq!(
            HttpTransport::first_data_block(body).unwrap(),
            "{\"id\":1}"
        );
    }

    #[tokio::test]
    async fn test_route_message_dispatches_by_id() {
        let pending: PendingMap = Arc::new(Mutex::new(HashMap::new()));
        let (tx, rx) = oneshot::channel();
        pending.lock().await.insert(7, tx);

        route_message(
            r#"{"jsonrpc":"2.0","id":7,"result":{"ok":true}}"#,
            "test",
            &pending,
        )
        .await;

        let result = rx.await.unwrap().unwrap();
        assert_eq!(result, json!({"ok": true}));
        assert!(pending.lock().await.is_empty());
    }

    #[tokio::test]
    async fn test_route_message_ignores_notifications_and_garbage() {
        let pending: PendingMap = Arc::new(Mutex::new(HashMap::new()));
        let (tx, mut rx) = oneshot::channel();
        pending.lock().await.insert(1, tx);

        route_message(
            r#"{"jsonrpc":"2.0","method":"notifications/progress","params":{}}"#,
            "test",
            &pending,
        )
        .await;
        route_message("not json at all", "test", &pending).await;

        // The waiter is still waiting; nothing consumed it.
        assert!(rx.try_recv().is_err());
        assert_eq!(pending.lock().await.len(), 1);
    }

    #[tokio::test]
    async fn test_route_message_delivers_server_errors() {
        let pending: PendingMap = Arc::new(Mutex::new(HashMap::new()));
        let (tx, rx) = oneshot::channel();
        pending.lock().await.insert(3, tx);

        route_message(
            r#"{"jsonrpc":"2.0","id":3,"error":{"code":-32601,"message":"no such method"}}"#,
            "test",
            &pending,
        )
        .await;

        let err = rx.await.unwrap().unwrap_err();
        assert!(err.contains("no such method"));
    }

    #[tokio::test]
    async fn test_stdio_spawn_failure() {
        let config = McpServerConfig {
            command: Some("nonexistent_command_12345".to_string()),
            ..Default::default()
        };
        let result = StdioTransport::spawn("broken", &config).await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_http_transport_request_round_trip() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/mcp")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_header("mcp-session-id", "sess-42")
            .with_body(r#"{"jsonrpc":"2.0","id":1,"result":{"tools":[]}}"#)
            .create_async()
            .await;

        let config = McpServerConfig {
            http_url: Some(format!("{}/mcp", server.url())),
            ..Default::default()
        };
        let transport = HttpTransport::new("mocked", &config).unwrap();

        let result = transport
            .request("tools/list", None, Duration::from_secs(5))
            .await
            .unwrap();
        assert_eq!(result, json!({"tools": []}));
        assert_eq!(transport.session_id().as_deref(), Some("sess-42"));
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_http_transport_event_stream_reply() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/mcp")
            .with_status(200)
            .with_header("content-type", "text/event-stream")
            .with_body(
                "event: message\ndata: {\"jsonrpc\":\"2.0\",\"id\":1,\"result\":{\"ok\":1}}\n\n",
            )
            .create_async()
            .await;

        let config = McpServerConfig {
            http_url: Some(format!("{}/mcp", server.url())),
            ..Default::default()
        };
        let transport = HttpTransport::new("mocked", &config).unwrap();

        let result = transport
            .request("initialize", Some(json!({})), Duration::from_secs(5))
            .await
            .unwrap();
        assert_eq!(result, json!({"ok": 1}));
    }

    #[tokio::test]
    async fn test_http_transport_server_error() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/mcp")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(r#"{"jsonrpc":"2.0","id":1,"error":{"code":-32000,"message":"boom"}}"#)
            .create_async()
            .await;

        let config = McpServerConfig {
            http_url: Some(format!("{}/mcp", server.url())),
            ..Default::default()
        };
        let transport = HttpTransport::new("mocked", &config).unwrap();

        let err = transport
            .request("tools/call", None, Duration::from_secs(5))
            .await
            .unwrap_err();
        assert!(err.to_string().contains("boom"));
    }

    #[tokio::test]
    async fn test_http_transport_unreachable() {
        // Nothing listens on this port.
        let config = McpServerConfig {
            http_url: Some("http://127.0.0.1:1/mcp".to_string()),
            ..Default::default()
        };
        let transport = HttpTransport::new("dead", &config).unwrap();
        let err = transport
            .request("initialize", None, Duration::from_secs(2))
            .await
            .unwrap_err();
        assert!(err.to_string().contains("dead"));
    }

    #[tokio::test]
    async fn test_sse_connect_resolves_endpoint() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/sse")
            .with_status(200)
            .with_header("content-type", "text/event-stream")
            .with_body("event: endpoint\ndata: /messages?session=xyz\n\n")
            .create_async()
            .await;

        let config = McpServerConfig {
            url: Some(format!("{}/sse", server.url())),
            timeout_ms: Some(2_000),
            ..Default::default()
        };
        let transport = SseTransport::connect("mocked", &config).await.unwrap();
        assert!(transport.endpoint.ends_with("/messages?session=xyz"));
        transport.close().await.unwrap();
    }

    #[tokio::test]
    async fn test_sse_connect_fails_without_endpoint() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/sse")
            .with_status(200)
            .with_header("content-type", "text/event-stream")
            .with_body(": just a comment\n\n")
            .create_async()
            .await;

        let config = McpServerConfig {
            url: Some(format!("{}/sse", server.url())),
            timeout_ms: Some(300),
            ..Default::default()
        };
        let result = SseTransport::connect("mocked", &config).await;
        assert!(result.is_err());
    }
}
