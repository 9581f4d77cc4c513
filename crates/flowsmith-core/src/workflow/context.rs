//! Variable scope for instruction resolution.
//!
//! A node's placeholders resolve against one flat map built from three layers:
//! template defaults, then runtime parameters, then outputs of nodes that have
//! already completed. A later layer overrides an earlier one on key clashes.

use flowsmith_types::execution::ExecutionState;
use flowsmith_types::workflow::{Node, Params};
use serde_json::Value;

use super::invoker::ToolRequest;
use super::substitution::{substitute_params, substitute_str};

/// Build the substitution scope for the current point of an execution.
pub fn build_scope(defaults: &Params, runtime: &Params, state: &ExecutionState) -> Params {
    let mut scope = defaults.clone();
    for (key, value) in runtime {
        scope.insert(key.clone(), value.clone());
    }
    for node_id in &state.completion_order {
        if let Some(output) = state.output(node_id) {
            scope.insert(node_id.clone(), output.clone());
        }
    }
    scope
}

/// A node's inputs after substitution.
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedInputs {
    pub instruction: String,
    pub params: Params,
    pub sub_workflow_params: Params,
}

impl ResolvedInputs {
    pub fn resolve(node: &Node, scope: &Params) -> Self {
        Self {
            instruction: substitute_str(&node.instruction, scope),
            params: node
                .params
                .as_ref()
                .map(|p| substitute_params(p, scope))
                .unwrap_or_default(),
            sub_workflow_params: node
                .sub_workflow_params
                .as_ref()
                .map(|p| substitute_params(p, scope))
                .unwrap_or_default(),
        }
    }

    /// The request handed to the tool invoker for a tool node.
    pub fn tool_request(&self, tool_name: &str) -> ToolRequest {
        ToolRequest {
            tool_name: tool_name.to_string(),
            instruction: self.instruction.clone(),
            params: self.params.clone(),
        }
    }
}

/// Output stored for a best-effort node that failed.
pub fn failure_placeholder(node_id: &str, error: &str) -> Value {
    serde_json::json!({
        "status": "failed",
        "node": node_id,
        "error": error,
    })
}
