//! Execution tracking types.
//!
//! `ExecutionState` is the private, per-call state of one workflow execution.
//! It is serializable so an external persistence layer can checkpoint and
//! resume it. `ExecutionTrace` is the per-node record returned to callers.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::StateError;
use crate::workflow::Capability;

// ---------------------------------------------------------------------------
// ExecutionState
// ---------------------------------------------------------------------------

/// Mutable state owned by a single execution.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ExecutionState {
    /// Name of the workflow being executed.
    pub workflow_name: String,
    /// Node outputs keyed by node id. Each id is written at most once.
    pub node_outputs: HashMap<String, Value>,
    /// Node ids in the order their output was recorded.
    pub completion_order: Vec<String>,
    /// Nodes that will never run because routing went elsewhere.
    pub skipped: Vec<String>,
    /// Routed targets selected so far, in selection order.
    pub selected_targets: Vec<String>,
    /// Nodes reached through conditional routing, sources included, in order.
    pub routed_path: Vec<String>,
    /// In-flight workflow names, outermost first; the current workflow is last.
    pub ancestors: Vec<String>,
    /// Nesting depth; the top-level execution is depth 0.
    pub depth: u32,
}

impl ExecutionState {
    /// State for a top-level execution.
    pub fn root(workflow_name: impl Into<String>) -> Self {
        let name = workflow_name.into();
        Self {
            ancestors: vec![name.clone()],
            workflow_name: name,
            ..Self::default()
        }
    }

    /// Fresh state for a nested execution of `workflow_name`.
    ///
    /// Node outputs do not carry over; the ancestor stack is extended and the
    /// depth incremented.
    pub fn child(&self, workflow_name: impl Into<String>) -> Self {
        let name = workflow_name.into();
        let mut ancestors = self.ancestors.clone();
        ancestors.push(name.clone());
        Self {
            workflow_name: name,
            ancestors,
            depth: self.depth + 1,
            ..Self::default()
        }
    }

    /// Store a node output. Fails if the node already has one.
    pub fn record_output(&mut self, node_id: &str, output: Value) -> Result<(), StateError> {
        if self.node_outputs.contains_key(node_id) {
            return Err(StateError::OutputAlreadyRecorded(node_id.to_string()));
        }
        self.node_outputs.insert(node_id.to_string(), output);
        self.completion_order.push(node_id.to_string());
        Ok(())
    }

    pub fn output(&self, node_id: &str) -> Option<&Value> {
        self.node_outputs.get(node_id)
    }

    pub fn is_completed(&self, node_id: &str) -> bool {
        self.node_outputs.contains_key(node_id)
    }

    pub fn is_skipped(&self, node_id: &str) -> bool {
        self.skipped.iter().any(|s| s == node_id)
    }

    pub fn is_selected(&self, node_id: &str) -> bool {
        self.selected_targets.iter().any(|s| s == node_id)
    }

    /// Mark a node as skipped. Returns `false` if it was already skipped.
    pub fn mark_skipped(&mut self, node_id: &str) -> bool {
        if self.is_skipped(node_id) {
            return false;
        }
        self.skipped.push(node_id.to_string());
        true
    }

    /// Record that routing selected `target` after `source` completed.
    pub fn select_target(&mut self, source: &str, target: &str) {
        if !self.routed_path.iter().any(|n| n == source) {
            self.routed_path.push(source.to_string());
        }
        if !self.is_selected(target) {
            self.selected_targets.push(target.to_string());
        }
        if !self.routed_path.iter().any(|n| n == target) {
            self.routed_path.push(target.to_string());
        }
    }
}

// ---------------------------------------------------------------------------
// Trace
// ---------------------------------------------------------------------------

/// Outcome of a single node in the trace.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeStatus {
    /// The node ran and produced output.
    Completed,
    /// The node failed under a best-effort policy; a placeholder was stored.
    BestEffort,
    /// The node was never run because routing went elsewhere.
    Skipped,
}

/// Per-node execution record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeTrace {
    pub node_id: String,
    pub capability: Capability,
    pub status: NodeStatus,
    /// Index of the wave the node ran in.
    pub wave: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parallel_group: Option<String>,
    /// Instruction after substitution.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resolved_instruction: Option<String>,
    /// Number of collaborator attempts (retries included).
    pub attempts: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub started_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub finished_at: Option<DateTime<Utc>>,
    pub duration_ms: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output: Option<Value>,
    /// Set when a best-effort node failed.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub warning: Option<String>,
    /// Trace of the nested execution for sub-workflow nodes.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sub_trace: Option<Box<ExecutionTrace>>,
}

impl NodeTrace {
    /// Trace entry for a node that routing skipped.
    pub fn skipped(node_id: impl Into<String>, capability: Capability, wave: usize) -> Self {
        Self {
            node_id: node_id.into(),
            capability,
            status: NodeStatus::Skipped,
            wave,
            parallel_group: None,
            resolved_instruction: None,
            attempts: 0,
            started_at: None,
            finished_at: None,
            duration_ms: 0,
            output: None,
            warning: None,
            sub_trace: None,
        }
    }
}

/// Ordered record of everything that happened in one execution.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ExecutionTrace {
    pub workflow_name: String,
    pub depth: u32,
    pub nodes: Vec<NodeTrace>,
}

impl ExecutionTrace {
    pub fn new(workflow_name: impl Into<String>, depth: u32) -> Self {
        Self {
            workflow_name: workflow_name.into(),
            depth,
            nodes: Vec::new(),
        }
    }

    pub fn node(&self, node_id: &str) -> Option<&NodeTrace> {
        self.nodes.iter().find(|n| n.node_id == node_id)
    }

    /// Warnings from best-effort failures, in trace order.
    pub fn warnings(&self) -> impl Iterator<Item = (&str, &str)> {
        self.nodes
            .iter()
            .filter_map(|n| n.warning.as_deref().map(|w| (n.node_id.as_str(), w)))
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
