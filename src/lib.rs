// Palisade - risk-gated tool execution and discovery framework
// Library exports

pub mod config;
pub mod errors;
pub mod mcp; // Discovery client for external tool servers
pub mod tools; // Tool contract, registry and execution pipeline

pub use errors::ToolError;
pub use tools::{
    AllowList, ExecutionContext, RiskLevel, Tool, ToolExecutor, ToolRegistry, ToolResult,
};
