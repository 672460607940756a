// Confirmation collaborator interface
//
// The executor asks an external collaborator (modal dialog, CLI prompt)
// before running a risky tool. The collaborator may take arbitrarily long;
// the pending execution aborts cleanly if the surrounding call is dropped.

use async_trait::async_trait;
use serde_json::Value;

/// Decision returned by the human-facing confirmation collaborator.
/// Consumed once per prompt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfirmationDecision {
    /// Run this call, ask again next time.
    ProceedOnce,
    /// Run this call and remember "server.tool" in the allowlist.
    AlwaysAllowTool,
    /// Run this call and remember the whole server in the allowlist.
    AlwaysAllowServer,
    /// Do not run; the call reports `user_cancelled`.
    Cancel,
}

/// Everything a confirmation UI needs to render a meaningful prompt.
#[derive(Debug, Clone)]
pub struct ConfirmationRequest {
    pub server_name: String,
    pub tool_name: String,
    pub display_name: String,
    pub params: Value,
}

/// Human-in-the-loop gate consulted for risky tool calls.
#[async_trait]
pub trait ConfirmationProvider: Send + Sync {
    async fn confirm(&self, request: ConfirmationRequest) -> ConfirmationDecision;
}

/// Provider that always returns a fixed decision. `StaticConfirmer::deny()`
/// is the safe default when no interactive collaborator is wired up.
pub struct StaticConfirmer {
    decision: ConfirmationDecision,
}

impl StaticConfirmer {
    pub fn new(decision: ConfirmationDecision) -> Self {
        Self { decision }
    }

    pub fn deny() -> Self {
        Self::new(ConfirmationDecision::Cancel)
    }

    pub fn approve() -> Self {
        Self::new(ConfirmationDecision::ProceedOnce)
    }
}

#[async_trait]
impl ConfirmationProvider for StaticConfirmer {
    async fn confirm(&self, request: ConfirmationRequest) -> ConfirmationDecision {
        tracing::debug!(
            "Static confirmation for '{}' on '{}': {:?}",
            request.tool_name,
            request.server_name,
            self.decision
        );
        self.decision
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn test_static_confirmer() {
        let request = ConfirmationRequest {
            server_name: "builtin".to_string(),
            tool_name: "delete_note".to_string(),
            display_name: "delete_note".to_string(),
            params: json!({"path": "a.md"}),
        };

        assert_eq!(
            StaticConfirmer::deny().confirm(request.clone()).await,
            ConfirmationDecision::Cancel
        );
        assert_eq!(
            StaticConfirmer::approve().confirm(request).await,
            ConfirmationDecision::ProceedOnce
        );
    }
}
