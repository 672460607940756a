// Connection to a single external tool server
//
// Wraps one transport with the protocol handshake, tool listing and tool
// invocation. Every remote operation is bounded by the server's configured
// timeout; nothing here can hang indefinitely.

use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, info, warn};

use super::config::McpServerConfig;
use super::transport::Transport;

const PROTOCOL_VERSION: &str = "2024-11-05";

/// Lifecycle state of one configured server.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ServerStatus {
    Disconnected,
    Connecting,
    Connected,
}

/// Tool definition as listed by a server
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct McpTool {
    pub name: String,
    pub description: Option<String>,
    #[serde(rename = "inputSchema", default)]
    pub input_schema: Value,
}

/// Server implementation info from the handshake
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct McpServerInfo {
    pub name: String,
    pub version: String,
}

/// One live server connection: transport handle plus protocol state.
pub struct McpConnection {
    name: String,
    timeout: Duration,
    transport: Transport,
    server_info: Option<McpServerInfo>,
}

impl McpConnection {
    /// Connect, run the protocol handshake and capture server info.
    pub async fn connect(name: &str, config: &McpServerConfig) -> Result<Self> {
        let transport = Transport::connect(name, config).await?;
        let timeout = config.timeout();

        let mut conn = Self {
            name: name.to_string(),
            timeout,
            transport,
            server_info: None,
        };

        if let Err(e) = conn.initialize().await {
            // A half-open transport would leak the child process.
            let _ = conn.transport.close().await;
            return Err(e);
        }

        info!(
            "Connected to server '{}'{}",
            name,
            conn.server_info
                .as_ref()
                .map(|i| format!(" ({} {})", i.name, i.version))
                .unwrap_or_default()
        );
        Ok(conn)
    }

    async fn initialize(&mut self) -> Result<()> {
        let response = self
            .transport
            .request(
                "initialize",
                Some(serde_json::json!({
                    "protocolVersion": PROTOCOL_VERSION,
                    "capabilities": {
                        "roots": { "listChanged": false }
                    },
                    "clientInfo": {
                        "name": "palisade",
                        "version": env!("CARGO_PKG_VERSION")
                    }
                })),
                self.timeout,
            )
            .await
            .with_context(|| format!("handshake with server '{}' failed", self.name))?;

        if let Some(info) = response.get("serverInfo") {
            self.server_info = serde_json::from_value(info.clone()).ok();
        }

        self.transport
            .notify("notifications/initialized", None)
            .await?;
        Ok(())
    }

    /// List the tools this server offers.
    pub async fn list_tools(&self) -> Result<Vec<McpTool>> {
        let response = self
            .transport
            .request("tools/list", None, self.timeout)
            .await?;

        let tools = response
            .get("tools")
            .cloned()
            .unwrap_or(Value::Array(Vec::new()));
        let tools: Vec<McpTool> =
            serde_json::from_value(tools).context("failed to parse tools list")?;

        debug!("Server '{}' listed {} tool(s)", self.name, tools.len());
        Ok(tools)
    }

    /// Invoke a tool by its original (server-side) name, returning the raw
    /// protocol reply.
    pub async fn call_tool(&self, tool_name: &str, arguments: Value) -> Result<Value> {
        self.transport
            .request(
                "tools/call",
                Some(serde_json::json!({
                    "name": tool_name,
                    "arguments": arguments,
                })),
                self.timeout,
            )
            .await
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    pub fn server_info(&self) -> Option<&McpServerInfo> {
        self.server_info.as_ref()
    }

    /// Close the transport. Failures are logged, not propagated; after this
    /// the connection is dead either way.
    pub async fn shutdown(&self) {
        debug!("Shutting down connection to '{}'", self.name);
        if let Err(e) = self.transport.close().await {
            warn!("Closing connection to '{}' failed: {:#}", self.name, e);
        }
    }
}
