// Proxy tools: registry entries that forward to an external server
//
// A proxy carries the original (server-side) tool name separately from the
// LLM-facing name, so renaming and collision prefixes never leak onto the
// wire. Trusted servers get low-risk proxies; everything else is high risk
// and passes through the confirmation gate.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{json, Value};

use super::connection::McpConnection;
use crate::tools::registry::Tool;
use crate::tools::types::{
    ExecutionContext, RiskLevel, ToolCategory, ToolInputSchema, ToolOutput, ToolSource,
};

/// Registry-compatible tool whose execution forwards over a live server
/// connection.
pub struct ProxyTool {
    connection: Arc<McpConnection>,
    server_name: String,
    /// Name as the server knows it; used on the wire.
    original_name: String,
    /// Name as the LLM sees it; normalized, possibly prefixed.
    display_name: String,
    description: String,
    input_schema: ToolInputSchema,
    trusted: bool,
}

impl ProxyTool {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        connection: Arc<McpConnection>,
        server_name: impl Into<String>,
        original_name: impl Into<String>,
        display_name: impl Into<String>,
        description: impl Into<String>,
        input_schema: ToolInputSchema,
        trusted: bool,
    ) -> Self {
        Self {
            connection,
            server_name: server_name.into(),
            original_name: original_name.into(),
            display_name: display_name.into(),
            description: description.into(),
            input_schema,
            trusted,
        }
    }

    pub fn original_name(&self) -> &str {
        &self.original_name
    }
}

#[async_trait]
impl Tool for ProxyTool {
    fn name(&self) -> &str {
        &self.display_name
    }

    fn description(&self) -> &str {
        &self.description
    }

    fn input_schema(&self) -> ToolInputSchema {
        self.input_schema.clone()
    }

    fn risk_level(&self) -> RiskLevel {
        if self.trusted {
            RiskLevel::Low
        } else {
            RiskLevel::High
        }
    }

    fn category(&self) -> ToolCategory {
        ToolCategory::External
    }

    fn source(&self) -> ToolSource {
        ToolSource::Server(self.server_name.clone())
    }

    async fn execute(&self, params: Value, _ctx: &ExecutionContext) -> anyhow::Result<ToolOutput> {
        let reply = self
            .connection
            .call_tool(&self.original_name, params)
            .await?;
        Ok(project_reply(&self.display_name, &reply))
    }
}

/// Map a raw protocol reply into the uniform output shape.
///
/// Content made entirely of text parts is joined and reported as text;
/// mixed part kinds pass through verbatim; non-array content is reported as
/// structured; anything else is raw. An empty reply is reported as such
/// rather than invented.
pub fn project_reply(display_name: &str, reply: &Value) -> ToolOutput {
    if is_empty_reply(reply) {
        return ToolOutput::with_data("(empty result)", json!({"content": "(empty result)"}));
    }

    match reply.get("content") {
        Some(Value::Array(parts)) => {
            let texts: Option<Vec<&str>> = parts.iter().map(text_part).collect();
            match texts {
                Some(texts) => {
                    let joined = texts.concat();
                    ToolOutput::with_data(
                        joined.clone(),
                        json!({"type": "text", "content": joined}),
                    )
                }
                None => ToolOutput::with_data(
                    format!("Tool '{}' returned mixed content", display_name),
                    json!({"type": "mixed", "content": parts}),
                ),
            }
        }
        Some(content) => ToolOutput::with_data(
            format!("Tool '{}' returned structured content", display_name),
            json!({"type": "structured", "content": content}),
        ),
        None => ToolOutput::with_data(
            format!("Tool '{}' returned an untyped reply", display_name),
            json!({"type": "raw", "content": reply}),
        ),
    }
}

fn is_empty_reply(reply: &Value) -> bool {
    match reply {
        Value::Null => true,
        Value::Object(map) if map.is_empty() => true,
        _ => matches!(
            reply.get("content"),
            Some(Value::Array(parts)) if parts.is_empty()
        ),
    }
}

/// A part counts as plain text when its `text` field is a string and it does
/// not declare some other kind.
fn text_part(part: &Value) -> Option<&str> {
    match part.get("type").and_then(|t| t.as_str()) {
        Some("text") | None => part.get("text").and_then(|t| t.as_str()),
        Some(_) => None,
    }
}
