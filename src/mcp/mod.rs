// Discovery client for external tool servers
//
// Connects to independently-configured servers over stdio, SSE or
// streamable HTTP, lists their tools and bridges them into the registry as
// proxy tools.

pub mod client;
pub mod config;
pub mod connection;
pub mod proxy;
pub mod sanitize;
pub mod transport;

pub use client::{DiscoveryState, ListenerId, McpClient};
pub use config::{McpServerConfig, TransportKind, DEFAULT_TIMEOUT_MS};
pub use connection::{McpConnection, McpServerInfo, McpTool, ServerStatus};
pub use proxy::ProxyTool;
pub use sanitize::{normalize_tool_name, sanitize_schema};
