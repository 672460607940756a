// Configuration structs

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::mcp::McpServerConfig;

/// Top-level settings for a host embedding the framework.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Settings {
    /// External tool servers, keyed by server name.
    #[serde(default)]
    pub mcp_servers: HashMap<String, McpServerConfig>,
}

impl Settings {
    /// Servers that will participate in discovery.
    pub fn enabled_servers(&self) -> impl Iterator<Item = (&String, &McpServerConfig)> {
        self.mcp_servers.iter().filter(|(_, c)| c.enabled)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_settings_default_is_empty() {
        let settings = Settings::default();
        assert!(settings.mcp_servers.is_empty());
        assert_eq!(settings.enabled_servers().count(), 0);
    }

    #[test]
    fn test_enabled_servers_filter() {
        let toml_src = r#"
            [mcp_servers.on]
            command = "echo"

            [mcp_servers.off]
            command = "echo"
            enabled = false
        "#;

        let settings: Settings = toml::from_str(toml_src).unwrap();
        assert_eq!(settings.mcp_servers.len(), 2);
        let enabled: Vec<_> = settings.enabled_servers().map(|(n, _)| n.clone()).collect();
        assert_eq!(enabled, vec!["on".to_string()]);
    }
}
