// MCP server configuration
//
// Supplied externally (settings file or host application) and read-only to
// the discovery client.

use std::collections::HashMap;
use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::errors::ToolError;

/// Default per-server timeout. Generous, because subprocess servers can be
/// slow to start (npx downloads, Python venv warmup).
pub const DEFAULT_TIMEOUT_MS: u64 = 600_000;

/// Configuration for one external tool server.
///
/// The transport is chosen by field precedence, not an explicit tag:
/// `http_url` (streamable HTTP) wins over `url` (SSE) wins over `command`
/// (subprocess stdio). A config with none of the three is unusable.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct McpServerConfig {
    /// Command to spawn (stdio transport)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub command: Option<String>,

    /// Command arguments (stdio transport)
    #[serde(default)]
    pub args: Vec<String>,

    /// Working directory for the spawned process
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cwd: Option<PathBuf>,

    /// SSE endpoint URL
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,

    /// Streamable HTTP endpoint URL
    #[serde(alias = "httpUrl", skip_serializing_if = "Option::is_none")]
    pub http_url: Option<String>,

    /// Per-server timeout applied to connection, listing and tool calls
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timeout_ms: Option<u64>,

    /// Trusted servers get low-risk proxy tools (no confirmation gate);
    /// untrusted servers get high-risk ones.
    #[serde(default)]
    pub trust: bool,

    /// Whether this server participates in discovery
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Environment variables for the spawned process. Kept last so TOML
    /// serialization emits plain values before the table.
    #[serde(default)]
    pub env: HashMap<String, String>,
}

fn default_true() -> bool {
    true
}

impl Default for McpServerConfig {
    fn default() -> Self {
        Self {
            command: None,
            args: Vec::new(),
            env: HashMap::new(),
            cwd: None,
            url: None,
            http_url: None,
            timeout_ms: None,
            trust: false,
            enabled: true,
        }
    }
}

/// Which transport a server config selects.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportKind {
    StreamableHttp,
    Sse,
    Stdio,
}

impl McpServerConfig {
    /// Select the transport by fixed precedence.
    pub fn select_transport(&self, name: &str) -> Result<TransportKind, ToolError> {
        if self.http_url.is_some() {
            Ok(TransportKind::StreamableHttp)
        } else if self.url.is_some() {
            Ok(TransportKind::Sse)
        } else if self.command.is_some() {
            Ok(TransportKind::Stdio)
        } else {
            Err(ToolError::configuration(
                name,
                "server config needs one of 'command', 'url' or 'http_url'",
            ))
        }
    }

    /// Effective timeout for every remote operation on this server.
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms.unwrap_or(DEFAULT_TIMEOUT_MS))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transport_precedence() {
        let config = McpServerConfig {
            command: Some("npx".to_string()),
            url: Some("http://localhost:3000/sse".to_string()),
            http_url: Some("http://localhost:3000/mcp".to_string()),
            ..Default::default()
        };
        assert_eq!(
            config.select_transport("all").unwrap(),
            TransportKind::StreamableHttp
        );

        let config = McpServerConfig {
            command: Some("npx".to_string()),
            url: Some("http://localhost:3000/sse".to_string()),
            ..Default::default()
        };
        assert_eq!(config.select_transport("sse").unwrap(), TransportKind::Sse);

        let config = McpServerConfig {
            command: Some("npx".to_string()),
            ..Default::default()
        };
        assert_eq!(
            config.select_transport("stdio").unwrap(),
            TransportKind::Stdio
        );
    }

    #[test]
    fn test_empty_config_is_rejected() {
        let config = McpServerConfig::default();
        let err = config.select_transport("empty").unwrap_err();
        assert!(matches!(err, ToolError::Configuration { .. }));
        assert!(err.to_string().contains("empty"));
    }

    #[test]
    fn test_default_timeout() {
        let config = McpServerConfig::default();
        assert_eq!(config.timeout(), Duration::from_millis(DEFAULT_TIMEOUT_MS));

        let config = McpServerConfig {
            timeout_ms: Some(5_000),
            ..Default::default()
        };
        assert_eq!(config.timeout(), Duration::from_secs(5));
    }

    #[test]
    fn test_config_toml_round_trip() {
        let toml_src = r#"
            command = "npx"
            args = ["-y", "@modelcontextprotocol/server-filesystem"]
            trust = true

            [env]
            API_TOKEN = "secret"
        "#;

        let config: McpServerConfig = toml::from_str(toml_src).unwrap();
        assert_eq!(config.command.as_deref(), Some("npx"));
        assert_eq!(config.args.len(), 2);
        assert!(config.trust);
        assert!(config.enabled);
        assert_eq!(config.env.get("API_TOKEN"), Some(&"secret".to_string()));

        let serialized = toml::to_string(&config).unwrap();
        assert!(serialized.contains("command = \"npx\""));
        let back: McpServerConfig = toml::from_str(&serialized).unwrap();
        assert_eq!(back.args, config.args);
    }

    #[test]
    fn test_http_url_alias() {
        let config: McpServerConfig =
            serde_json::from_str(r#"{"httpUrl": "http://localhost:9000/mcp"}"#).unwrap();
        assert_eq!(config.http_url.as_deref(), Some("http://localhost:9000/mcp"));
    }

    #[test]
    fn test_disabled_server_config_parses() {
        let config: McpServerConfig = toml::from_str("enabled = false").unwrap();
        assert!(!config.enabled);
        // Still structurally unusable, but discovery skips it before
        // transport selection matters.
        assert!(config.select_transport("off").is_err());
    }
}
