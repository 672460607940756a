// Error taxonomy for tool execution and discovery
//
// Validation, cancellation and execution errors are always folded into a
// `ToolResult` at the pipeline boundary. Connection, discovery and
// configuration errors are recovered per server inside the MCP client and
// downgraded to a status change plus a log line.

use thiserror::Error;

/// Errors produced by the tool framework.
#[derive(Debug, Error)]
pub enum ToolError {
    /// Parameters failed schema validation. Carries every violation, not
    /// just the first.
    #[error("parameter validation failed: {}", .0.join("; "))]
    Validation(Vec<String>),

    /// The user declined the confirmation prompt.
    #[error("cancelled by user")]
    UserCancelled,

    /// The tool body itself failed.
    #[error("tool execution failed: {0}")]
    Execution(String),

    /// Transport-level failure talking to a server.
    #[error("connection to server '{server}' failed: {message}")]
    Connection { server: String, message: String },

    /// Tool listing failed on an otherwise-connected server.
    #[error("tool discovery on server '{server}' failed: {message}")]
    Discovery { server: String, message: String },

    /// A server or tool configuration is unusable.
    #[error("invalid configuration for '{name}': {message}")]
    Configuration { name: String, message: String },

    /// Anything that does not fit the buckets above.
    #[error("{0}")]
    Other(String),
}

/// Fold at the pipeline boundary: every error kind maps into the one
/// result shape callers see.
impl From<ToolError> for crate::tools::ToolResult {
    fn from(err: ToolError) -> Self {
        use crate::tools::ToolResult;
        match err {
            ToolError::UserCancelled => ToolResult::cancelled(),
            other => {
                let message = other.to_string();
                ToolResult::failure(message.clone(), message)
            }
        }
    }
}

impl ToolError {
    pub fn connection(server: impl Into<String>, message: impl ToString) -> Self {
        ToolError::Connection {
            server: server.into(),
            message: message.to_string(),
        }
    }

    pub fn discovery(server: impl Into<String>, message: impl ToString) -> Self {
        ToolError::Discovery {
            server: server.into(),
            message: message.to_string(),
        }
    }

    pub fn configuration(name: impl Into<String>, message: impl ToString) -> Self {
        ToolError::Configuration {
            name: name.into(),
            message: message.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validation_error_lists_all_violations() {
        let err = ToolError::Validation(vec![
            "missing required parameter 'path'".to_string(),
            "parameter 'depth' must be a number".to_string(),
        ]);
        let msg = err.to_string();
        assert!(msg.contains("missing required parameter 'path'"));
        assert!(msg.contains("parameter 'depth' must be a number"));
    }

    #[test]
    fn test_configuration_error_names_server() {
        let err = ToolError::configuration("broken", "no command, url or http_url");
        assert!(err.to_string().contains("broken"));
    }

    #[test]
    fn test_fold_into_tool_result() {
        let result: crate::tools::ToolResult = ToolError::UserCancelled.into();
        assert!(result.user_cancelled);
        assert!(result.error.is_none());

        let result: crate::tools::ToolResult =
            ToolError::Execution("disk full".to_string()).into();
        assert!(!result.success);
        assert!(!result.user_cancelled);
        assert!(result.error.unwrap().contains("disk full"));
    }
}
