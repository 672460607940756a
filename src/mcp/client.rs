// Discovery client - turns server configurations into live connections and
// registered proxy tools
//
// All configured servers are attempted concurrently and independently; one
// server being down, slow or hostile never blocks the others. A discovery
// run always settles: the global state reaches Completed even when every
// server fails.

use std::collections::HashMap;
use std::panic::AssertUnwindSafe;
use std::sync::{Arc, Mutex};

use dashmap::DashMap;
use futures::future::join_all;
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::config::McpServerConfig;
use super::connection::{McpConnection, McpServerInfo, ServerStatus};
use super::proxy::ProxyTool;
use super::sanitize::{clamp_charset, fit_name_length, sanitize_schema};
use crate::errors::ToolError;
use crate::tools::registry::ToolRegistry;
use crate::tools::types::ToolInputSchema;

/// Global state of the discovery process. Monotonic within a run; only a
/// new `discover_all` call re-enters `InProgress`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DiscoveryState {
    NotStarted,
    InProgress,
    Completed,
}

/// Handle returned by `add_status_listener`, used to unsubscribe.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ListenerId(Uuid);

type StatusListener = Arc<dyn Fn(&str, ServerStatus) + Send + Sync>;

/// Client that manages every configured external tool server.
pub struct McpClient {
    /// Live connections (name -> connection)
    connections: DashMap<String, Arc<McpConnection>>,
    /// Last observed status per configured server
    statuses: DashMap<String, ServerStatus>,
    discovery_state: Mutex<DiscoveryState>,
    listeners: Mutex<Vec<(Uuid, StatusListener)>>,
}

impl McpClient {
    pub fn new() -> Self {
        Self {
            connections: DashMap::new(),
            statuses: DashMap::new(),
            discovery_state: Mutex::new(DiscoveryState::NotStarted),
            listeners: Mutex::new(Vec::new()),
        }
    }

    pub fn discovery_state(&self) -> DiscoveryState {
        *self
            .discovery_state
            .lock()
            .expect("discovery state lock poisoned")
    }

    fn set_discovery_state(&self, state: DiscoveryState) {
        *self
            .discovery_state
            .lock()
            .expect("discovery state lock poisoned") = state;
    }

    /// Status of one configured server; unknown names read as disconnected.
    pub fn server_status(&self, name: &str) -> ServerStatus {
        self.statuses
            .get(name)
            .map(|s| *s.value())
            .unwrap_or(ServerStatus::Disconnected)
    }

    pub fn is_connected(&self, name: &str) -> bool {
        self.connections.contains_key(name)
    }

    /// Names of currently connected servers
    pub fn list_servers(&self) -> Vec<String> {
        self.connections.iter().map(|e| e.key().clone()).collect()
    }

    pub fn server_info(&self, name: &str) -> Option<McpServerInfo> {
        self.connections
            .get(name)
            .and_then(|conn| conn.server_info().cloned())
    }

    /// Subscribe to per-server status changes. Listener panics are caught
    /// and logged; they never break the status update or other listeners.
    pub fn add_status_listener(
        &self,
        listener: impl Fn(&str, ServerStatus) + Send + Sync + 'static,
    ) -> ListenerId {
        let id = Uuid::new_v4();
        self.listeners
            .lock()
            .expect("listener lock poisoned")
            .push((id, Arc::new(listener)));
        ListenerId(id)
    }

    pub fn remove_status_listener(&self, id: ListenerId) -> bool {
        let mut listeners = self.listeners.lock().expect("listener lock poisoned");
        let before = listeners.len();
        listeners.retain(|(lid, _)| *lid != id.0);
        listeners.len() != before
    }

    /// Update one server's status and notify listeners. Listeners run
    /// outside the lock so a reentrant call cannot deadlock.
    fn set_status(&self, server: &str, status: ServerStatus) {
        self.statuses.insert(server.to_string(), status);

        let snapshot: Vec<StatusListener> = self
            .listeners
            .lock()
            .expect("listener lock poisoned")
            .iter()
            .map(|(_, l)| Arc::clone(l))
            .collect();

        for listener in snapshot {
            let result =
                std::panic::catch_unwind(AssertUnwindSafe(|| listener(server, status)));
            if result.is_err() {
                warn!("Status listener panicked on '{}' -> {:?}", server, status);
            }
        }
    }

    /// Connect to every enabled server and register their tools.
    ///
    /// Attempts fan out concurrently and are joined only to decide when the
    /// run is settled. Per-server failures (bad config, unreachable
    /// endpoint, listing error) downgrade to a Disconnected status plus a
    /// log line.
    pub async fn discover_all(
        self: &Arc<Self>,
        servers: &HashMap<String, McpServerConfig>,
        registry: &Arc<ToolRegistry>,
    ) {
        self.set_discovery_state(DiscoveryState::InProgress);
        info!("Starting discovery across {} server(s)", servers.len());

        let attempts: Vec<_> = servers
            .iter()
            .map(|(name, config)| {
                let client = Arc::clone(self);
                let registry = Arc::clone(registry);
                let name = name.clone();
                let config = config.clone();
                tokio::spawn(async move {
                    client.discover_server(name, config, registry).await;
                })
            })
            .collect();

        for outcome in join_all(attempts).await {
            if let Err(e) = outcome {
                // A panicking attempt counts as settled; the run goes on.
                warn!("Discovery task aborted: {}", e);
            }
        }

        self.set_discovery_state(DiscoveryState::Completed);
        info!(
            "Discovery completed: {}/{} server(s) connected",
            self.connections.len(),
            servers.len()
        );
    }

    async fn discover_server(
        self: Arc<Self>,
        name: String,
        config: McpServerConfig,
        registry: Arc<ToolRegistry>,
    ) {
        // Drop remnants of a previous run before attempting anew.
        if let Some((_, old)) = self.connections.remove(&name) {
            old.shutdown().await;
        }
        registry.unregister_server(&name);

        if !config.enabled {
            debug!("Skipping disabled server '{}'", name);
            self.set_status(&name, ServerStatus::Disconnected);
            return;
        }

        if let Err(e) = config.select_transport(&name) {
            warn!("Skipping server '{}': {}", name, e);
            self.set_status(&name, ServerStatus::Disconnected);
            return;
        }

        self.set_status(&name, ServerStatus::Connecting);

        let connection =
            match tokio::time::timeout(config.timeout(), McpConnection::connect(&name, &config))
                .await
            {
                Ok(Ok(conn)) => Arc::new(conn),
                Ok(Err(e)) => {
                    warn!("{}", ToolError::connection(&name, format!("{:#}", e)));
                    self.set_status(&name, ServerStatus::Disconnected);
                    return;
                }
                Err(_) => {
                    let reason = format!("timed out after {:?}", config.timeout());
                    warn!("{}", ToolError::connection(&name, reason));
                    self.set_status(&name, ServerStatus::Disconnected);
                    return;
                }
            };

        let tools = match connection.list_tools().await {
            Ok(tools) => tools,
            Err(e) => {
                warn!("{}", ToolError::discovery(&name, format!("{:#}", e)));
                connection.shutdown().await;
                self.set_status(&name, ServerStatus::Disconnected);
                return;
            }
        };

        let mut registered = 0usize;
        for tool in tools {
            let display_name = resolve_display_name(&registry, &name, &tool.name);
            let schema = sanitize_schema(&tool.input_schema);
            let description = tool
                .description
                .clone()
                .unwrap_or_else(|| format!("Tool from server '{}'", name));

            let proxy = ProxyTool::new(
                Arc::clone(&connection),
                name.clone(),
                tool.name.clone(),
                display_name.clone(),
                description,
                ToolInputSchema::from_value(&schema),
                config.trust,
            );

            match registry.register(Arc::new(proxy)) {
                Ok(()) => registered += 1,
                Err(e) => warn!(
                    "Skipping tool '{}' from server '{}': {}",
                    display_name, name, e
                ),
            }
        }

        // A server that listed zero tools stays connected.
        info!("Registered {} tool(s) from server '{}'", registered, name);
        self.connections.insert(name.clone(), connection);
        self.set_status(&name, ServerStatus::Connected);
    }

    /// Close every live transport and mark every known server
    /// disconnected. Individual close failures are logged, never
    /// propagated.
    pub async fn cleanup(&self) {
        let names: Vec<String> = self.connections.iter().map(|e| e.key().clone()).collect();
        for name in names {
            if let Some((_, connection)) = self.connections.remove(&name) {
                connection.shutdown().await;
            }
        }

        let known: Vec<String> = self.statuses.iter().map(|e| e.key().clone()).collect();
        for name in known {
            self.set_status(&name, ServerStatus::Disconnected);
        }
        info!("Disconnected from all servers");
    }
}

impl Default for McpClient {
    fn default() -> Self {
        Self::new()
    }
}

/// LLM-facing name for a discovered tool: charset clamp, then a server
/// prefix if the name is already taken, then the length fit.
fn resolve_display_name(registry: &ToolRegistry, server: &str, raw_name: &str) -> String {
    let base = fit_name_length(clamp_charset(raw_name));
    if !registry.contains(&base) {
        return base;
    }
    fit_name_length(format!("{}__{}", clamp_charset(server), clamp_charset(raw_name)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tools::registry::Tool;
    use crate::tools::types::{ExecutionContext, RiskLevel, ToolOutput};
    use async_trait::async_trait;
    use serde_json::Value;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct StubTool {
        name: String,
    }

    #[async_trait]
    impl Tool for StubTool {
        fn name(&self) -> &str {
            &self.name
        }

        fn description(&self) -> &str {
            "stub"
        }

        fn input_schema(&self) -> ToolInputSchema {
            ToolInputSchema::simple(vec![])
        }

        fn risk_level(&self) -> RiskLevel {
            RiskLevel::Low
        }

        async fn execute(
            &self,
            _params: Value,
            _ctx: &ExecutionContext,
        ) -> anyhow::Result<ToolOutput> {
            Ok(ToolOutput::text("stub"))
        }
    }

    #[test]
    fn test_resolve_display_name_prefixes_on_collision() {
        let registry = ToolRegistry::new();
        assert_eq!(resolve_display_name(&registry, "github", "search"), "search");

        registry
            .register(Arc::new(StubTool {
                name: "search".to_string(),
            }))
            .unwrap();
        assert_eq!(
            resolve_display_name(&registry, "github", "search"),
            "github__search"
        );
    }

    #[test]
    fn test_resolve_display_name_clamps_charset_and_length() {
        let registry = ToolRegistry::new();
        assert_eq!(
            resolve_display_name(&registry, "srv", "search notes!"),
            "search_notes_"
        );

        let long = "x".repeat(100);
        let resolved = resolve_display_name(&registry, "srv", &long);
        assert_eq!(resolved.len(), 63);
        assert!(resolved.contains("___"));
    }

    #[test]
    fn test_prefix_survives_length_fit() {
        let registry = ToolRegistry::new();
        let raw = "t".repeat(80);
        registry
            .register(Arc::new(StubTool {
                name: fit_name_length(clamp_charset(&raw)),
            }))
            .unwrap();

        let resolved = resolve_display_name(&registry, "myserver", &raw);
        assert_eq!(resolved.len(), 63);
        assert!(resolved.starts_with("myserver__"));
    }

    #[test]
    fn test_status_defaults_to_disconnected() {
        let client = McpClient::new();
        assert_eq!(client.server_status("unknown"), ServerStatus::Disconnected);
        assert_eq!(client.discovery_state(), DiscoveryState::NotStarted);
    }

    #[test]
    fn test_status_listener_add_remove() {
        let client = McpClient::new();
        let seen = Arc::new(AtomicUsize::new(0));

        let counter = Arc::clone(&seen);
        let id = client.add_status_listener(move |_, _| {
            counter.fetch_add(1, Ordering::SeqCst);
        });

        client.set_status("a", ServerStatus::Connecting);
        assert_eq!(seen.load(Ordering::SeqCst), 1);

        assert!(client.remove_status_listener(id));
        client.set_status("a", ServerStatus::Disconnected);
        assert_eq!(seen.load(Ordering::SeqCst), 1);

        // Removing twice is a no-op.
        assert!(!client.remove_status_listener(id));
    }

    #[test]
    fn test_panicking_listener_does_not_break_updates() {
        let client = McpClient::new();
        let seen = Arc::new(AtomicUsize::new(0));

        client.add_status_listener(|_, _| panic!("listener bug"));
        let counter = Arc::clone(&seen);
        client.add_status_listener(move |_, _| {
            counter.fetch_add(1, Ordering::SeqCst);
        });

        client.set_status("a", ServerStatus::Connecting);

        // Second listener still ran and the status was recorded.
        assert_eq!(seen.load(Ordering::SeqCst), 1);
        assert_eq!(client.server_status("a"), ServerStatus::Connecting);
    }

    #[tokio::test]
    async fn test_discovery_with_empty_config_completes() {
        let client = Arc::new(McpClient::new());
        let registry = Arc::new(ToolRegistry::new());

        client.discover_all(&HashMap::new(), &registry).await;

        assert_eq!(client.discovery_state(), DiscoveryState::Completed);
        assert!(client.list_servers().is_empty());
        assert!(registry.is_empty());
    }

    #[tokio::test]
    async fn test_discovery_completes_when_every_server_fails() {
        let client = Arc::new(McpClient::new());
        let registry = Arc::new(ToolRegistry::new());

        let mut servers = HashMap::new();
        servers.insert(
            "bad_command".to_string(),
            McpServerConfig {
                command: Some("nonexistent_command_12345".to_string()),
                timeout_ms: Some(2_000),
                ..Default::default()
            },
        );
        servers.insert(
            "bad_http".to_string(),
            McpServerConfig {
                http_url: Some("http://127.0.0.1:1/mcp".to_string()),
                timeout_ms: Some(2_000),
                ..Default::default()
            },
        );
        servers.insert(
            "no_transport".to_string(),
            McpServerConfig::default(),
        );

        client.discover_all(&servers, &registry).await;

        assert_eq!(client.discovery_state(), DiscoveryState::Completed);
        for name in ["bad_command", "bad_http", "no_transport"] {
            assert_eq!(client.server_status(name), ServerStatus::Disconnected);
            assert!(!client.is_connected(name));
        }
        assert!(registry.is_empty());
    }

    #[tokio::test]
    async fn test_disabled_server_is_skipped() {
        let client = Arc::new(McpClient::new());
        let registry = Arc::new(ToolRegistry::new());

        let mut servers = HashMap::new();
        servers.insert(
            "off".to_string(),
            McpServerConfig {
                command: Some("echo".to_string()),
                enabled: false,
                ..Default::default()
            },
        );

        client.discover_all(&servers, &registry).await;

        assert_eq!(client.discovery_state(), DiscoveryState::Completed);
        assert!(!client.is_connected("off"));
        assert_eq!(client.server_status("off"), ServerStatus::Disconnected);
    }

    #[tokio::test]
    async fn test_cleanup_marks_everything_disconnected() {
        let client = Arc::new(McpClient::new());
        client.set_status("a", ServerStatus::Connected);
        client.set_status("b", ServerStatus::Connecting);

        client.cleanup().await;

        assert_eq!(client.server_status("a"), ServerStatus::Disconnected);
        assert_eq!(client.server_status("b"), ServerStatus::Disconnected);
        assert!(client.list_servers().is_empty());
    }
}
