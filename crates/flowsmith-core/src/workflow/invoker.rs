//! Collaborator interfaces the engine calls out to.
//!
//! Agents, tools, and the sub-workflow loader live outside the engine. The
//! traits are object-safe (boxed futures) so implementations can be chosen at
//! runtime and shared across spawned node tasks as `Arc<dyn ...>`.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use flowsmith_types::workflow::{Capability, Params, Template};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

/// Boxed future returned by collaborator calls.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Failure reported by an agent or tool.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum InvokeError {
    /// Worth retrying (rate limit, connection reset, ...).
    #[error("transient failure: {0}")]
    Transient(String),

    /// Retrying will not help.
    #[error("{0}")]
    Fatal(String),
}

impl InvokeError {
    pub fn is_transient(&self) -> bool {
        matches!(self, InvokeError::Transient(_))
    }
}

/// Failure to obtain a template by name.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LoadError {
    #[error("workflow '{0}' not found")]
    NotFound(String),

    #[error("workflow '{name}' is invalid: {reason}")]
    Invalid { name: String, reason: String },

    #[error("failed to read workflow '{name}': {message}")]
    Io { name: String, message: String },
}

// ---------------------------------------------------------------------------
// Requests
// ---------------------------------------------------------------------------

/// Everything a tool call receives after substitution.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolRequest {
    pub tool_name: String,
    pub instruction: String,
    #[serde(default)]
    pub params: Params,
}

// ---------------------------------------------------------------------------
// Traits
// ---------------------------------------------------------------------------

/// Runs agent-style capabilities (researcher, analyst, writer, custom tags).
pub trait AgentInvoker: Send + Sync {
    fn invoke<'a>(
        &'a self,
        capability: &'a Capability,
        instruction: &'a str,
    ) -> BoxFuture<'a, Result<String, InvokeError>>;
}

/// Calls external tools.
pub trait ToolInvoker: Send + Sync {
    fn invoke(&self, request: ToolRequest) -> BoxFuture<'_, Result<Value, InvokeError>>;
}

/// Resolves a sub-workflow name to a validated template.
pub trait SubWorkflowLoader: Send + Sync {
    fn load<'a>(&'a self, name: &'a str) -> BoxFuture<'a, Result<Arc<Template>, LoadError>>;
}

/// The set of collaborators handed to an engine at construction.
#[derive(Clone)]
pub struct Collaborators {
    pub agent: Arc<dyn AgentInvoker>,
    pub tool: Arc<dyn ToolInvoker>,
    pub loader: Arc<dyn SubWorkflowLoader>,
}

impl Collaborators {
    pub fn new(
        agent: Arc<dyn AgentInvoker>,
        tool: Arc<dyn ToolInvoker>,
        loader: Arc<dyn SubWorkflowLoader>,
    ) -> Self {
        Self { agent, tool, loader }
    }
}

impl std::fmt::Debug for Collaborators {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Collaborators").finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invoke_error_kinds() {
        assert!(InvokeError::Transient("429".into()).is_transient());
        assert!(!InvokeError::Fatal("bad prompt".into()).is_transient());
        assert_eq!(InvokeError::Fatal("bad prompt".into()).to_string(), "bad prompt");
    }

    #[test]
    fn test_tool_request_params_default() {
        let req: ToolRequest =
            serde_json::from_str(r#"{"tool_name": "search", "instruction": "find"}"#).unwrap();
        assert!(req.params.is_empty());
    }
}
