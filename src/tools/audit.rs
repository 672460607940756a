// Audit trail for tool invocations
//
// Every pipeline run emits one structured record, fire-and-forget. Sinks
// must not be able to fail the call that produced the record.

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value;

use crate::tools::types::{ExecutionContext, ToolCall, ToolResult};

/// One structured audit entry per tool invocation.
#[derive(Debug, Clone, Serialize)]
pub struct AuditRecord {
    pub timestamp: DateTime<Utc>,
    pub tool_name: String,
    pub params: Value,
    pub outcome: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub context_ref: Option<String>,
}

impl AuditRecord {
    pub fn from_outcome(call: &ToolCall, result: &ToolResult, ctx: &ExecutionContext) -> Self {
        let outcome = if result.user_cancelled {
            "cancelled".to_string()
        } else if result.success {
            "success".to_string()
        } else {
            match &result.error {
                Some(err) => format!("error: {}", err),
                None => "error".to_string(),
            }
        };

        Self {
            timestamp: Utc::now(),
            tool_name: call.name.clone(),
            params: call.params.clone(),
            outcome,
            context_ref: ctx.reference.clone(),
        }
    }
}

/// Destination for audit records. Implementations swallow their own errors.
pub trait AuditSink: Send + Sync {
    fn record(&self, record: AuditRecord);
}

/// Default sink: structured tracing events.
pub struct TracingAuditSink;

impl AuditSink for TracingAuditSink {
    fn record(&self, record: AuditRecord) {
        tracing::info!(
            tool = %record.tool_name,
            outcome = %record.outcome,
            context = record.context_ref.as_deref().unwrap_or("-"),
            params = %record.params,
            "tool invocation"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_record_from_success() {
        let call = ToolCall::new("read_note", json!({"path": "a.md"}));
        let record = AuditRecord::from_outcome(
            &call,
            &ToolResult::success("ok"),
            &ExecutionContext::default(),
        );
        assert_eq!(record.outcome, "success");
        assert_eq!(record.tool_name, "read_note");
        assert!(record.context_ref.is_none());
    }

    #[test]
    fn test_record_from_cancel_and_error() {
        let call = ToolCall::new("delete_note", json!({"path": "a.md"}));
        let ctx = ExecutionContext {
            reference: Some("session-7".to_string()),
            ..Default::default()
        };

        let cancelled = AuditRecord::from_outcome(&call, &ToolResult::cancelled(), &ctx);
        assert_eq!(cancelled.outcome, "cancelled");
        assert_eq!(cancelled.context_ref.as_deref(), Some("session-7"));

        let failed =
            AuditRecord::from_outcome(&call, &ToolResult::failure("boom", "disk full"), &ctx);
        assert!(failed.outcome.contains("disk full"));
    }
}
