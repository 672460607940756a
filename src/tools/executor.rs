// Tool execution pipeline
//
// Every invocation, local or proxied, passes through the same fixed
// sequence: validate, assess risk, confirm if required, execute, record.
// Each step short-circuits on failure and every outcome folds into the one
// `ToolResult` shape; nothing past this boundary ever sees a raw error.

use std::sync::Arc;

use dashmap::DashSet;
use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::Value;
use tracing::{debug, info, instrument, warn};

use crate::errors::ToolError;
use crate::tools::audit::{AuditRecord, AuditSink, TracingAuditSink};
use crate::tools::confirm::{
    ConfirmationDecision, ConfirmationProvider, ConfirmationRequest, StaticConfirmer,
};
use crate::tools::registry::{RegisteredEntry, ToolRegistry};
use crate::tools::schema::validate_params;
use crate::tools::types::{
    ExecutionContext, ProgressFn, ProgressStage, RiskLevel, ToolCall, ToolResult,
};

static DESTRUCTIVE_VERBS: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)\b(delete|remove|clear|replace|overwrite|destroy|wipe|purge|erase|drop)\b")
        .expect("destructive verb pattern is valid")
});

/// Default destructive-call heuristic: does the serialized parameter blob
/// contain a destructive verb?
pub fn params_look_destructive(params: &Value) -> bool {
    DESTRUCTIVE_VERBS.is_match(&params.to_string())
}

/// Process-lifetime memory of approved confirmations.
///
/// Keys are either `server` or `server.tool`; the presence of either
/// suppresses future prompts for that tool. No expiry - cleared only when
/// the process restarts or `clear` is called. Safe under concurrent
/// read/insert, and cheap to clone into the MCP client or tests.
#[derive(Clone, Default)]
pub struct AllowList {
    keys: Arc<DashSet<String>>,
}

impl AllowList {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn allow_server(&self, server: &str) {
        self.keys.insert(server.to_string());
    }

    pub fn allow_tool(&self, server: &str, tool: &str) {
        self.keys.insert(format!("{}.{}", server, tool));
    }

    pub fn is_allowed(&self, server: &str, tool: &str) -> bool {
        self.keys.contains(server) || self.keys.contains(&format!("{}.{}", server, tool))
    }

    pub fn clear(&self) {
        self.keys.clear();
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }
}

/// Tool executor - runs the validate/confirm/execute/record pipeline.
pub struct ToolExecutor {
    registry: Arc<ToolRegistry>,
    allow_list: AllowList,
    confirmer: Arc<dyn ConfirmationProvider>,
    audit: Arc<dyn AuditSink>,
}

impl ToolExecutor {
    pub fn new(
        registry: Arc<ToolRegistry>,
        allow_list: AllowList,
        confirmer: Arc<dyn ConfirmationProvider>,
        audit: Arc<dyn AuditSink>,
    ) -> Self {
        Self {
            registry,
            allow_list,
            confirmer,
            audit,
        }
    }

    /// Executor with a deny-all confirmation gate and tracing audit. High
    /// and destructive medium calls fail closed until a real collaborator
    /// is wired up.
    pub fn with_defaults(registry: Arc<ToolRegistry>) -> Self {
        Self::new(
            registry,
            AllowList::new(),
            Arc::new(StaticConfirmer::deny()),
            Arc::new(TracingAuditSink),
        )
    }

    pub fn registry(&self) -> &Arc<ToolRegistry> {
        &self.registry
    }

    pub fn allow_list(&self) -> &AllowList {
        &self.allow_list
    }

    /// Execute a single tool call through the full pipeline.
    #[instrument(skip(self, call, ctx, progress), fields(tool = %call.name, id = %call.id))]
    pub async fn execute_tool(
        &self,
        call: &ToolCall,
        ctx: &ExecutionContext,
        progress: Option<&ProgressFn>,
    ) -> ToolResult {
        info!("Executing tool: {}", call.name);

        let entry = match self.registry.lookup(&call.name) {
            Some(entry) => entry,
            None => {
                let err = ToolError::Other(format!("Tool '{}' not found", call.name));
                return self.finish(call, ctx, progress, err.into());
            }
        };

        if !entry.enabled() {
            let err = ToolError::Other(format!("Tool '{}' is disabled", call.name));
            return self.finish(call, ctx, progress, err.into());
        }

        // 1. Validate. No side effects on failure; every violation reported.
        report_progress(progress, ProgressStage::Validation);
        let validation = validate_params(&entry.descriptor().input_schema, &call.params);
        if !validation.valid {
            let err = ToolError::Validation(validation.errors);
            return self.finish(call, ctx, progress, err.into());
        }

        // 2. Assess risk.
        report_progress(progress, ProgressStage::RiskAssessment);
        let tool = entry.tool();
        let needs_confirmation = match entry.descriptor().risk_level {
            RiskLevel::High => true,
            RiskLevel::Medium => tool.is_destructive(&call.params),
            RiskLevel::Low => false,
        };

        // 3. Confirm, allowlist first.
        if needs_confirmation {
            if let Some(result) = self.confirm(&entry, call).await {
                return self.finish(call, ctx, progress, result);
            }
        }

        // 4. Execute. Tool failures are caught here and never propagate.
        report_progress(progress, ProgressStage::ExecutionStart);
        let result = match tool.execute(call.params.clone(), ctx).await {
            Ok(output) => {
                debug!("Tool executed successfully");
                match output.data {
                    Some(data) => ToolResult::success_with_data(output.message, data),
                    None => ToolResult::success(output.message),
                }
            }
            Err(e) => {
                warn!("Tool execution failed: {:#}", e);
                ToolError::Execution(format!("{:#}", e)).into()
            }
        };

        self.finish(call, ctx, progress, result)
    }

    /// Returns `Some(result)` when the call must stop (user cancelled),
    /// `None` when execution may proceed.
    async fn confirm(
        &self,
        entry: &Arc<RegisteredEntry>,
        call: &ToolCall,
    ) -> Option<ToolResult> {
        let source = entry.tool().source();
        let server = source.server_name();
        let tool_name = &entry.descriptor().name;

        if self.allow_list.is_allowed(server, tool_name) {
            debug!("'{}' pre-approved via allowlist", tool_name);
            return None;
        }

        let request = ConfirmationRequest {
            server_name: server.to_string(),
            tool_name: tool_name.clone(),
            display_name: tool_name.clone(),
            params: call.params.clone(),
        };

        match self.confirmer.confirm(request).await {
            ConfirmationDecision::ProceedOnce => None,
            ConfirmationDecision::AlwaysAllowTool => {
                self.allow_list.allow_tool(server, tool_name);
                None
            }
            ConfirmationDecision::AlwaysAllowServer => {
                self.allow_list.allow_server(server);
                None
            }
            ConfirmationDecision::Cancel => {
                info!("User cancelled execution of '{}'", tool_name);
                Some(ToolError::UserCancelled.into())
            }
        }
    }

    /// 5. Record. Also reports the completion checkpoint. Cannot fail the
    /// overall call.
    fn finish(
        &self,
        call: &ToolCall,
        ctx: &ExecutionContext,
        progress: Option<&ProgressFn>,
        result: ToolResult,
    ) -> ToolResult {
        report_progress(progress, ProgressStage::Completion);
        self.audit
            .record(AuditRecord::from_outcome(call, &result, ctx));
        result
    }

    /// Execute multiple tool calls in sequence
    pub async fn execute_tool_loop(
        &self,
        calls: Vec<ToolCall>,
        ctx: &ExecutionContext,
    ) -> Vec<ToolResult> {
        info!("Executing {} tool(s)", calls.len());

        let mut results = Vec::with_capacity(calls.len());
        for call in &calls {
            results.push(self.execute_tool(call, ctx, None).await);
        }
        results
    }
}

fn report_progress(progress: Option<&ProgressFn>, stage: ProgressStage) {
    if let Some(callback) = progress {
        if let Err(e) = callback(stage) {
            warn!("Progress callback failed at {:?}: {:#}", stage, e);
        }
    }
}
