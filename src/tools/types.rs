// Core types for the tool execution system
//
// The result and definition shapes are what the calling LLM sees; they stay
// stable even as tools come and go at runtime.

use std::any::Any;
use std::path::PathBuf;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Risk classification controlling whether human confirmation is required.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RiskLevel {
    /// Never requires confirmation.
    Low,
    /// Requires confirmation only when the call looks destructive.
    Medium,
    /// Always requires confirmation.
    High,
}

/// Coarse grouping of tools, used for display and filtering.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ToolCategory {
    Notes,
    Filesystem,
    Shell,
    Web,
    External,
    Other,
}

/// Where a tool comes from: built in, or bridged from an external server.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ToolSource {
    Builtin,
    Server(String),
}

impl ToolSource {
    /// Server name used for allowlist keys and confirmation prompts.
    /// Builtin tools share the pseudo-server "builtin".
    pub fn server_name(&self) -> &str {
        match self {
            ToolSource::Builtin => "builtin",
            ToolSource::Server(name) => name,
        }
    }
}

/// JSON Schema for tool input parameters
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolInputSchema {
    #[serde(rename = "type")]
    pub schema_type: String, // Usually "object"
    pub properties: Value,
    #[serde(default)]
    pub required: Vec<String>,
}

impl ToolInputSchema {
    /// Create a simple schema with required string parameters
    pub fn simple(params: Vec<(&str, &str)>) -> Self {
        let mut properties = serde_json::Map::new();
        let mut required = Vec::new();

        for (param_name, param_desc) in params.iter() {
            properties.insert(
                param_name.to_string(),
                serde_json::json!({
                    "type": "string",
                    "description": param_desc
                }),
            );
            required.push(param_name.to_string());
        }

        Self {
            schema_type: "object".to_string(),
            properties: Value::Object(properties),
            required,
        }
    }

    /// Build a schema from a raw JSON Schema value, e.g. one listed by an
    /// external server. Unknown top-level keys are dropped; `properties`
    /// keeps whatever nested structure the server declared.
    pub fn from_value(schema: &Value) -> Self {
        let properties = schema
            .get("properties")
            .cloned()
            .unwrap_or_else(|| serde_json::json!({}));

        let required = schema
            .get("required")
            .and_then(|r| r.as_array())
            .map(|arr| {
                arr.iter()
                    .filter_map(|v| v.as_str().map(String::from))
                    .collect()
            })
            .unwrap_or_default();

        Self {
            schema_type: schema
                .get("type")
                .and_then(|t| t.as_str())
                .unwrap_or("object")
                .to_string(),
            properties,
            required,
        }
    }
}

/// Immutable metadata describing one registered tool.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolDescriptor {
    pub name: String,
    pub description: String,
    pub input_schema: ToolInputSchema,
    pub risk_level: RiskLevel,
    pub category: ToolCategory,
}

/// Tool definition advertised to the calling LLM.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolDefinition {
    pub name: String,
    pub description: String,
    pub parameters: ToolInputSchema,
}

/// One requested tool invocation (from the LLM or a test harness).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolCall {
    pub id: String,
    pub name: String,
    pub params: Value,
}

impl ToolCall {
    pub fn new(name: impl Into<String>, params: Value) -> Self {
        Self {
            id: format!("call_{}", uuid::Uuid::new_v4().simple()),
            name: name.into(),
            params,
        }
    }
}

/// Outcome of parameter validation. Created and discarded per call.
#[derive(Debug, Clone, Default)]
pub struct ValidationResult {
    pub valid: bool,
    pub errors: Vec<String>,
    pub message: Option<String>,
}

impl ValidationResult {
    pub fn ok() -> Self {
        Self {
            valid: true,
            errors: Vec::new(),
            message: None,
        }
    }

    pub fn invalid(errors: Vec<String>) -> Self {
        let message = Some(errors.join("; "));
        Self {
            valid: false,
            errors,
            message,
        }
    }
}

/// What a tool body hands back on success.
#[derive(Debug, Clone)]
pub struct ToolOutput {
    /// Primary human-readable content.
    pub message: String,
    /// Optional structured payload.
    pub data: Option<Value>,
}

impl ToolOutput {
    pub fn text(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            data: None,
        }
    }

    pub fn with_data(message: impl Into<String>, data: Value) -> Self {
        Self {
            message: message.into(),
            data: Some(data),
        }
    }
}

/// Uniform result returned to the caller for every invocation outcome.
///
/// Callers distinguish outcomes via the `error` and `user_cancelled` fields
/// only; the shape never varies by error kind.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolResult {
    pub success: bool,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(
        default,
        rename = "userCancelled",
        skip_serializing_if = "std::ops::Not::not"
    )]
    pub user_cancelled: bool,
}

impl ToolResult {
    pub fn success(message: impl Into<String>) -> Self {
        Self {
            success: true,
            message: message.into(),
            data: None,
            error: None,
            user_cancelled: false,
        }
    }

    pub fn success_with_data(message: impl Into<String>, data: Value) -> Self {
        Self {
            data: Some(data),
            ..Self::success(message)
        }
    }

    pub fn failure(message: impl Into<String>, error: impl Into<String>) -> Self {
        Self {
            success: false,
            message: message.into(),
            data: None,
            error: Some(error.into()),
            user_cancelled: false,
        }
    }

    /// A cancelled call is neither a success nor a true failure; UIs render
    /// it neutrally.
    pub fn cancelled() -> Self {
        Self {
            success: false,
            message: "Cancelled by user".to_string(),
            data: None,
            error: None,
            user_cancelled: true,
        }
    }
}

/// Opaque per-call context supplied by the host. The framework forwards it
/// to tools without inspecting anything beyond `reference` (used in audit
/// records).
#[derive(Clone, Default)]
pub struct ExecutionContext {
    /// Opaque reference recorded in audit entries.
    pub reference: Option<String>,
    /// Root of the workspace or vault the call operates in.
    pub vault_root: Option<PathBuf>,
    /// File the host currently has focused, if any.
    pub active_file: Option<String>,
    /// Arbitrary host state, passed through untouched.
    pub state: Option<Arc<dyn Any + Send + Sync>>,
}

/// Fixed checkpoints at which execution progress is reported.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProgressStage {
    Validation,
    RiskAssessment,
    ExecutionStart,
    Completion,
}

/// Optional best-effort progress callback. Failures are logged and ignored;
/// they never abort the invocation.
pub type ProgressFn = dyn Fn(ProgressStage) -> anyhow::Result<()> + Send + Sync;
