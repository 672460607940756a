// Tool execution system
//
// Uniform contract for every tool the agent can invoke, plus the registry
// and the risk-gated execution pipeline they dispatch through.

pub mod audit;
pub mod confirm;
pub mod executor;
pub mod registry;
pub mod schema;
pub mod types;

pub use audit::{AuditRecord, AuditSink, TracingAuditSink};
pub use confirm::{ConfirmationDecision, ConfirmationProvider, ConfirmationRequest, StaticConfirmer};
pub use executor::{AllowList, ToolExecutor};
pub use registry::{RegisteredEntry, Tool, ToolRegistry};
pub use schema::validate_params;
pub use types::{
    ExecutionContext, ProgressFn, ProgressStage, RiskLevel, ToolCall, ToolCategory,
    ToolDefinition, ToolDescriptor, ToolInputSchema, ToolOutput, ToolResult, ToolSource,
    ValidationResult,
};
