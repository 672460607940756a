// Tool registry and trait definition
//
// Manages available tools and provides the uniform contract every tool,
// local or proxied, must satisfy.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use dashmap::DashMap;
use serde_json::Value;

use crate::errors::ToolError;
use crate::tools::types::{
    ExecutionContext, RiskLevel, ToolCategory, ToolDefinition, ToolDescriptor, ToolInputSchema,
    ToolOutput, ToolSource,
};

/// Tool trait - all tools must implement this
#[async_trait]
pub trait Tool: Send + Sync {
    /// Stable identifier used by the LLM (e.g. "read_note", "github__search")
    fn name(&self) -> &str;

    /// Human-readable description of what the tool does
    fn description(&self) -> &str;

    /// JSON Schema defining expected input parameters
    fn input_schema(&self) -> ToolInputSchema;

    /// Risk classification controlling the confirmation gate
    fn risk_level(&self) -> RiskLevel;

    fn category(&self) -> ToolCategory {
        ToolCategory::Other
    }

    fn source(&self) -> ToolSource {
        ToolSource::Builtin
    }

    /// Whether this particular call looks destructive. Only consulted for
    /// medium-risk tools. The default heuristic scans the serialized params
    /// for destructive verbs; tools may override with parameter-aware logic.
    fn is_destructive(&self, params: &Value) -> bool {
        crate::tools::executor::params_look_destructive(params)
    }

    /// Execute the tool with validated input and host context
    async fn execute(&self, params: Value, ctx: &ExecutionContext) -> anyhow::Result<ToolOutput>;

    /// Immutable metadata snapshot taken at registration time
    fn descriptor(&self) -> ToolDescriptor {
        ToolDescriptor {
            name: self.name().to_string(),
            description: self.description().to_string(),
            input_schema: self.input_schema(),
            risk_level: self.risk_level(),
            category: self.category(),
        }
    }
}

/// One registry entry: descriptor plus the executable tool behind it.
pub struct RegisteredEntry {
    descriptor: ToolDescriptor,
    tool: Arc<dyn Tool>,
    enabled: AtomicBool,
}

impl RegisteredEntry {
    pub fn descriptor(&self) -> &ToolDescriptor {
        &self.descriptor
    }

    pub fn tool(&self) -> &Arc<dyn Tool> {
        &self.tool
    }

    pub fn enabled(&self) -> bool {
        self.enabled.load(Ordering::Relaxed)
    }

    pub fn definition(&self) -> ToolDefinition {
        ToolDefinition {
            name: self.descriptor.name.clone(),
            description: self.descriptor.description.clone(),
            parameters: self.descriptor.input_schema.clone(),
        }
    }
}

/// Registry of available tools.
///
/// Registration and dispatch may interleave: lookups hand out an `Arc` to
/// the entry, so a call that started against an entry completes against that
/// same entry even if the name is re-registered concurrently.
pub struct ToolRegistry {
    tools: DashMap<String, Arc<RegisteredEntry>>,
}

impl ToolRegistry {
    /// Create empty registry
    pub fn new() -> Self {
        Self {
            tools: DashMap::new(),
        }
    }

    /// Register a tool under its own name.
    ///
    /// A name that is already taken is rejected rather than silently
    /// overwritten; shadowing a trusted tool is exactly what a buggy or
    /// malicious server would want. Callers that can rename (the MCP
    /// client) check `contains` first and register under a prefixed name.
    pub fn register(&self, tool: Arc<dyn Tool>) -> Result<(), ToolError> {
        let descriptor = tool.descriptor();
        let name = descriptor.name.clone();

        let entry = Arc::new(RegisteredEntry {
            descriptor,
            tool,
            enabled: AtomicBool::new(true),
        });

        match self.tools.entry(name.clone()) {
            dashmap::mapref::entry::Entry::Vacant(slot) => {
                slot.insert(entry);
                tracing::debug!("Registered tool '{}'", name);
                Ok(())
            }
            dashmap::mapref::entry::Entry::Occupied(_) => {
                tracing::error!("Refusing to overwrite already-registered tool '{}'", name);
                Err(ToolError::configuration(
                    name,
                    "a tool with this name is already registered",
                ))
            }
        }
    }

    /// Get tool entry by name (snapshot-at-call-time)
    pub fn lookup(&self, name: &str) -> Option<Arc<RegisteredEntry>> {
        self.tools.get(name).map(|e| Arc::clone(e.value()))
    }

    /// Check if a name is taken
    pub fn contains(&self, name: &str) -> bool {
        self.tools.contains_key(name)
    }

    /// Enable or disable a tool without unregistering it. Disabled tools are
    /// dropped from `definitions()` and refuse dispatch.
    pub fn set_enabled(&self, name: &str, enabled: bool) -> bool {
        match self.tools.get(name) {
            Some(entry) => {
                entry.enabled.store(enabled, Ordering::Relaxed);
                true
            }
            None => false,
        }
    }

    /// Remove a single tool
    pub fn unregister(&self, name: &str) -> bool {
        self.tools.remove(name).is_some()
    }

    /// Remove every tool bridged from the given server. Used before
    /// re-discovery and on teardown.
    pub fn unregister_server(&self, server: &str) -> usize {
        let before = self.tools.len();
        self.tools
            .retain(|_, entry| entry.tool.source() != ToolSource::Server(server.to_string()));
        before - self.tools.len()
    }

    /// List all tool names
    pub fn tool_names(&self) -> Vec<String> {
        self.tools.iter().map(|e| e.key().clone()).collect()
    }

    /// Get definitions for all enabled tools (for the LLM function-calling
    /// interface)
    pub fn definitions(&self) -> Vec<ToolDefinition> {
        self.tools
            .iter()
            .filter(|e| e.value().enabled())
            .map(|e| e.value().definition())
            .collect()
    }

    /// Number of registered tools
    pub fn len(&self) -> usize {
        self.tools.len()
    }

    /// Check if registry is empty
    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }
}

impl Default for ToolRegistry {
    fn default() -> Self {
        Self::new()
    }
}
