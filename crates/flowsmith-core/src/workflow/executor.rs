//! Workflow execution engine: dynamic wave scheduling with conditional routing.
//!
//! The engine repeatedly collects every node that is ready to run and runs that
//! set concurrently as one wave via `tokio::task::JoinSet`, then rescans. A node
//! is ready when all its dependencies have completed and, if it is the target
//! of a conditional edge, when that edge selected it. Nodes that routing ruled
//! out are skipped, and skipping spreads to their dependents.
//!
//! # Execution flow
//!
//! 1. Validate the template; nothing runs if it has errors.
//! 2. Propagate skips, collect the ready set, fail if nothing is ready but
//!    nodes remain.
//! 3. Resolve each node's placeholders and spawn it with its timeout.
//! 4. Record outputs (write-once) in declaration order and evaluate routing.
//! 5. Checkpoint, then go back to 2 until no node is pending.
//! 6. Pick the terminal output.

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use flowsmith_types::config::EngineConfig;
use flowsmith_types::error::StateError;
use flowsmith_types::execution::{ExecutionState, ExecutionTrace, NodeStatus, NodeTrace};
use flowsmith_types::workflow::{ErrorPolicy, Node, Params, Template};
use futures_util::FutureExt;
use serde_json::Value;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use super::checkpoint::{Checkpoint, CheckpointError, CheckpointStatus, CheckpointStore};
use super::condition::select_target;
use super::context::{build_scope, failure_placeholder, ResolvedInputs};
use super::dispatch::{agent_output, CapabilityTable, Handler};
use super::invoker::{BoxFuture, Collaborators, LoadError};
use super::retry::RetryPolicy;
use super::validator::{TemplateValidator, ValidationError};

// ---------------------------------------------------------------------------
// EngineError
// ---------------------------------------------------------------------------

/// Errors that end an execution.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    /// The template failed validation; no node ran.
    #[error("template failed validation: {}", join_validation(.0))]
    Validation(Vec<ValidationError>),

    /// Nodes remain pending but none can become ready. Validation rejects
    /// such templates, so only the wave loop on an unvalidated template hits it.
    #[error("unresolved dependencies; stalled nodes: {}", .stalled.join(", "))]
    UnresolvedDependency { stalled: Vec<String> },

    /// A sub-workflow would re-enter a workflow already on the stack.
    #[error("sub-workflow cycle detected: {}", .stack.join(" -> "))]
    CycleDetected { stack: Vec<String> },

    /// A sub-workflow would nest deeper than allowed.
    #[error("sub-workflow depth limit {max_depth} exceeded: {}", .stack.join(" -> "))]
    RecursionLimitExceeded { stack: Vec<String>, max_depth: u32 },

    #[error("node '{node_id}' timed out after {timeout_secs}s")]
    NodeTimeout { node_id: String, timeout_secs: u64 },

    #[error("node '{node_id}' failed: {message}")]
    NodeExecution { node_id: String, message: String },

    #[error("node '{node_id}' uses capability '{capability}' with no registered handler")]
    UnknownCapability { node_id: String, capability: String },

    #[error("node '{node_id}' could not load sub-workflow '{name}': {source}")]
    SubWorkflowLoad {
        node_id: String,
        name: String,
        #[source]
        source: LoadError,
    },

    #[error("output for node '{0}' was already recorded")]
    OutputAlreadyRecorded(String),

    #[error("checkpoint error: {0}")]
    Checkpoint(#[from] CheckpointError),

    #[error("execution cancelled")]
    Cancelled,

    #[error("node task failed to join: {0}")]
    Join(String),
}

impl EngineError {
    /// Errors that abort the whole execution regardless of a node's error policy.
    pub fn aborts_execution(&self) -> bool {
        matches!(
            self,
            EngineError::CycleDetected { .. }
                | EngineError::RecursionLimitExceeded { .. }
                | EngineError::OutputAlreadyRecorded(_)
                | EngineError::Checkpoint(_)
                | EngineError::Cancelled
                | EngineError::Join(_)
        )
    }
}

impl From<StateError> for EngineError {
    fn from(err: StateError) -> Self {
        match err {
            StateError::OutputAlreadyRecorded(id) => EngineError::OutputAlreadyRecorded(id),
        }
    }
}

fn join_validation(errors: &[ValidationError]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

// ---------------------------------------------------------------------------
// Requests and results
// ---------------------------------------------------------------------------

/// Inputs for one top-level execution.
#[derive(Debug, Clone, Default)]
pub struct RunRequest {
    /// Runtime parameters; they override template defaults.
    pub params: Params,
    /// Checkpoint under this session when the engine has a checkpoint store.
    pub session_id: Option<Uuid>,
    pub cancel: CancellationToken,
}

impl RunRequest {
    pub fn new(params: Params) -> Self {
        Self {
            params,
            ..Self::default()
        }
    }

    pub fn with_session(mut self, session_id: Uuid) -> Self {
        self.session_id = Some(session_id);
        self
    }

    pub fn with_cancel(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }
}

/// Result of a successful execution.
#[derive(Debug, Clone)]
pub struct ExecutionOutcome {
    /// Output of the terminal node.
    pub output: Value,
    /// Which node the output came from.
    pub output_node: String,
    pub trace: ExecutionTrace,
    /// Final state, including every node output.
    pub state: ExecutionState,
}

// ---------------------------------------------------------------------------
// WorkflowEngine
// ---------------------------------------------------------------------------

#[derive(Clone)]
struct Session {
    id: Uuid,
    store: Arc<dyn CheckpointStore>,
}

/// One execution in progress (top-level or nested).
struct Execution {
    template: Arc<Template>,
    params: Params,
    state: ExecutionState,
    trace: ExecutionTrace,
    cancel: CancellationToken,
    session: Option<Session>,
}

/// Where a node sits in the sub-workflow nesting.
#[derive(Debug, Clone)]
struct Lineage {
    workflow_name: String,
    ancestors: Vec<String>,
    depth: u32,
}

/// Everything a spawned node task needs, owned.
struct NodeJob {
    index: usize,
    wave: usize,
    node: Node,
    inputs: ResolvedInputs,
    lineage: Lineage,
    cancel: CancellationToken,
    semaphore: Option<Arc<Semaphore>>,
}

struct NodeOutput {
    value: Value,
    sub_trace: Option<ExecutionTrace>,
}

/// What a node task hands back to the wave loop.
struct NodeReport {
    index: usize,
    result: Result<Value, EngineError>,
    trace: NodeTrace,
}

/// Executes templates against injected collaborators.
///
/// Cheap to clone; clones share collaborators, configuration and the
/// checkpoint store. Each call owns a private `ExecutionState`.
#[derive(Clone)]
pub struct WorkflowEngine {
    collaborators: Collaborators,
    config: Arc<EngineConfig>,
    capabilities: Arc<CapabilityTable>,
    validator: Arc<TemplateValidator>,
    checkpoints: Option<Arc<dyn CheckpointStore>>,
}

impl WorkflowEngine {
    /// Create an engine. Custom capability tags from `config` are routed to
    /// the agent invoker.
    pub fn new(collaborators: Collaborators, config: EngineConfig) -> Self {
        let capabilities = CapabilityTable::with_custom_agents(config.custom_capabilities.iter().cloned());
        let validator = TemplateValidator::with_capabilities(capabilities.custom_tags().map(str::to_string));
        Self {
            collaborators,
            config: Arc::new(config),
            capabilities: Arc::new(capabilities),
            validator: Arc::new(validator),
            checkpoints: None,
        }
    }

    /// Persist checkpoints for runs that carry a session id.
    pub fn with_checkpoints(mut self, store: Arc<dyn CheckpointStore>) -> Self {
        self.checkpoints = Some(store);
        self
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// The validator this engine applies before running a template.
    pub fn validator(&self) -> &TemplateValidator {
        &self.validator
    }

    /// Execute `template` with runtime `params`.
    pub async fn execute(
        &self,
        template: Arc<Template>,
        params: Params,
    ) -> Result<ExecutionOutcome, EngineError> {
        self.run(template, RunRequest::new(params)).await
    }

    /// Execute with a full request (session, cancellation).
    pub async fn run(
        &self,
        template: Arc<Template>,
        request: RunRequest,
    ) -> Result<ExecutionOutcome, EngineError> {
        let session = match (request.session_id, &self.checkpoints) {
            (Some(id), Some(store)) => Some(Session {
                id,
                store: Arc::clone(store),
            }),
            (Some(id), None) => {
                tracing::warn!(session_id = %id, "session id given but no checkpoint store configured");
                None
            }
            _ => None,
        };

        let execution = Execution {
            state: ExecutionState::root(template.name.clone()),
            trace: ExecutionTrace::new(template.name.clone(), 0),
            template,
            params: request.params,
            cancel: request.cancel,
            session,
        };
        self.drive(execution).await
    }

    /// Continue a checkpointed execution. Completed nodes are not run again.
    pub async fn resume(
        &self,
        session_id: Uuid,
        template: Arc<Template>,
    ) -> Result<ExecutionOutcome, EngineError> {
        let store = self.checkpoints.clone().ok_or_else(|| {
            CheckpointError::Storage("no checkpoint store configured".to_string())
        })?;
        let checkpoint = store
            .load(session_id)
            .await?
            .ok_or(CheckpointError::NotFound(session_id))?;
        if checkpoint.workflow_name != template.name {
            return Err(CheckpointError::WorkflowMismatch {
                expected: template.name.clone(),
                found: checkpoint.workflow_name,
            }
            .into());
        }

        tracing::info!(
            session_id = %session_id,
            workflow = template.name.as_str(),
            skipping = checkpoint.state.completion_order.len(),
            "resuming workflow execution"
        );

        let execution = Execution {
            template,
            params: checkpoint.params,
            state: checkpoint.state,
            trace: checkpoint.trace,
            cancel: CancellationToken::new(),
            session: Some(Session {
                id: session_id,
                store,
            }),
        };
        self.drive(execution).await
    }

    /// Boxed entry point used for nested executions.
    fn drive_boxed(&self, execution: Execution) -> BoxFuture<'static, Result<ExecutionOutcome, EngineError>> {
        let engine = self.clone();
        async move { engine.drive(execution).await }.boxed()
    }

    async fn drive(&self, mut execution: Execution) -> Result<ExecutionOutcome, EngineError> {
        let errors = self.validator.validate(&execution.template);
        if !errors.is_empty() {
            return Err(EngineError::Validation(errors));
        }

        tracing::info!(
            workflow = execution.template.name.as_str(),
            depth = execution.state.depth,
            nodes = execution.template.nodes.len(),
            "starting workflow execution"
        );
        let started = tokio::time::Instant::now();

        match self.run_waves(&mut execution).await {
            Ok(()) => {
                let (output_node, output) = terminal_output(&execution.template, &execution.state);
                self.checkpoint(&execution, CheckpointStatus::Completed, None)
                    .await?;
                tracing::info!(
                    workflow = execution.template.name.as_str(),
                    depth = execution.state.depth,
                    output_node = output_node.as_str(),
                    completed = execution.state.completion_order.len(),
                    skipped = execution.state.skipped.len(),
                    duration_ms = started.elapsed().as_millis() as u64,
                    "workflow execution finished"
                );
                Ok(ExecutionOutcome {
                    output,
                    output_node,
                    trace: execution.trace,
                    state: execution.state,
                })
            }
            Err(err) => {
                let status = if matches!(err, EngineError::Cancelled) {
                    CheckpointStatus::Cancelled
                } else {
                    CheckpointStatus::Failed
                };
                if let Err(cp_err) = self.checkpoint(&execution, status, Some(err.to_string())).await {
                    tracing::warn!(error = %cp_err, "failed to record final checkpoint");
                }
                tracing::info!(
                    workflow = execution.template.name.as_str(),
                    depth = execution.state.depth,
                    error = %err,
                    "workflow execution failed"
                );
                Err(err)
            }
        }
    }

    async fn checkpoint(
        &self,
        execution: &Execution,
        status: CheckpointStatus,
        error: Option<String>,
    ) -> Result<(), EngineError> {
        let Some(session) = &execution.session else {
            return Ok(());
        };
        let checkpoint = Checkpoint {
            session_id: session.id,
            workflow_name: execution.template.name.clone(),
            params: execution.params.clone(),
            state: execution.state.clone(),
            trace: execution.trace.clone(),
            status,
            error,
            updated_at: Utc::now(),
        };
        session.store.save(checkpoint).await?;
        Ok(())
    }

    async fn run_waves(&self, execution: &mut Execution) -> Result<(), EngineError> {
        let template = Arc::clone(&execution.template);
        let semaphore = self
            .config
            .max_concurrency
            .map(|n| Arc::new(Semaphore::new(n.max(1))));
        // Resumed executions continue the wave numbering.
        let mut wave = execution
            .trace
            .nodes
            .iter()
            .map(|n| n.wave + 1)
            .max()
            .unwrap_or(0);

        loop {
            if execution.cancel.is_cancelled() {
                return Err(EngineError::Cancelled);
            }

            for node_id in propagate_skips(&template, &mut execution.state) {
                if let Some(node) = template.node(&node_id) {
                    tracing::debug!(node_id = node_id.as_str(), "node skipped by routing");
                    execution
                        .trace
                        .nodes
                        .push(NodeTrace::skipped(node_id.as_str(), node.capability.clone(), wave));
                }
            }

            let state = &execution.state;
            let pending: Vec<&Node> = template
                .nodes
                .iter()
                .filter(|n| !state.is_completed(&n.id) && !state.is_skipped(&n.id))
                .collect();
            if pending.is_empty() {
                return Ok(());
            }
            let ready: Vec<(usize, &Node)> = template
                .nodes
                .iter()
                .enumerate()
                .filter(|(_, n)| pending.iter().any(|p| p.id == n.id) && is_ready(&template, state, n))
                .collect();
            if ready.is_empty() {
                return Err(EngineError::UnresolvedDependency {
                    stalled: pending.iter().map(|n| n.id.clone()).collect(),
                });
            }

            tracing::debug!(
                workflow = template.name.as_str(),
                wave,
                nodes = ready.len(),
                "processing wave"
            );

            let scope = build_scope(&template.default_params, &execution.params, state);
            let lineage = Lineage {
                workflow_name: template.name.clone(),
                ancestors: state.ancestors.clone(),
                depth: state.depth,
            };

            let mut join_set = JoinSet::new();
            for (index, node) in ready {
                let job = NodeJob {
                    index,
                    wave,
                    node: node.clone(),
                    inputs: ResolvedInputs::resolve(node, &scope),
                    lineage: lineage.clone(),
                    cancel: execution.cancel.clone(),
                    semaphore: semaphore.clone(),
                };
                let engine = self.clone();
                join_set.spawn(async move { engine.run_node(job).await });
            }

            let mut finished: Vec<(usize, Value, NodeTrace)> = Vec::new();
            loop {
                let joined = tokio::select! {
                    biased;
                    _ = execution.cancel.cancelled() => {
                        join_set.abort_all();
                        return Err(EngineError::Cancelled);
                    }
                    next = join_set.join_next() => next,
                };
                let Some(joined) = joined else {
                    break;
                };
                let NodeReport {
                    index,
                    result,
                    mut trace,
                } = joined.map_err(|e| EngineError::Join(e.to_string()))?;

                let output = match result {
                    Ok(value) => value,
                    Err(err) => {
                        let best_effort = template
                            .node(&trace.node_id)
                            .is_some_and(|n| n.on_error == ErrorPolicy::BestEffort);
                        if err.aborts_execution() || !best_effort {
                            join_set.abort_all();
                            tracing::warn!(
                                node_id = trace.node_id.as_str(),
                                error = %err,
                                "node failed; aborting remaining nodes"
                            );
                            return Err(err);
                        }

                        let message = err.to_string();
                        tracing::warn!(
                            node_id = trace.node_id.as_str(),
                            error = message.as_str(),
                            "node failed; continuing with placeholder output"
                        );
                        let placeholder = failure_placeholder(&trace.node_id, &message);
                        trace.status = NodeStatus::BestEffort;
                        trace.warning = Some(message);
                        trace.output = Some(placeholder.clone());
                        placeholder
                    }
                };
                finished.push((index, output, trace));
            }

            finished.sort_by_key(|(index, _, _)| *index);
            for (_, output, trace) in finished {
                if let Some(edge) = template.edge_from(&trace.node_id) {
                    let target = select_target(edge, &output);
                    tracing::debug!(from = trace.node_id.as_str(), to = target, "route selected");
                    execution.state.select_target(&trace.node_id, target);
                }
                execution.state.record_output(&trace.node_id, output)?;
                execution.trace.nodes.push(trace);
            }

            self.checkpoint(execution, CheckpointStatus::Running, None).await?;
            wave += 1;
        }
    }

    // -----------------------------------------------------------------------
    // Node execution
    // -----------------------------------------------------------------------

    async fn run_node(self, job: NodeJob) -> NodeReport {
        let _permit = match &job.semaphore {
            Some(semaphore) => Arc::clone(semaphore).acquire_owned().await.ok(),
            None => None,
        };

        let started_at = Utc::now();
        let clock = tokio::time::Instant::now();
        let attempts = AtomicU32::new(0);
        let timeout_secs = job.node.timeout_secs;

        let outcome = tokio::time::timeout(Duration::from_secs(timeout_secs), self.dispatch(&job, &attempts)).await;
        let (result, sub_trace) = match outcome {
            Ok(Ok(NodeOutput { value, sub_trace })) => (Ok(value), sub_trace),
            Ok(Err(err)) => (Err(err), None),
            Err(_elapsed) => (
                Err(EngineError::NodeTimeout {
                    node_id: job.node.id.clone(),
                    timeout_secs,
                }),
                None,
            ),
        };

        let trace = NodeTrace {
            node_id: job.node.id.clone(),
            capability: job.node.capability.clone(),
            status: NodeStatus::Completed,
            wave: job.wave,
            parallel_group: job.node.parallel_group.clone(),
            resolved_instruction: (!job.inputs.instruction.is_empty())
                .then(|| job.inputs.instruction.clone()),
            attempts: attempts.load(Ordering::SeqCst),
            started_at: Some(started_at),
            finished_at: Some(Utc::now()),
            duration_ms: clock.elapsed().as_millis() as u64,
            output: result.as_ref().ok().cloned(),
            warning: None,
            sub_trace: sub_trace.map(Box::new),
        };

        NodeReport {
            index: job.index,
            result,
            trace,
        }
    }

    async fn dispatch(&self, job: &NodeJob, attempts: &AtomicU32) -> Result<NodeOutput, EngineError> {
        let node = &job.node;
        let handler = self
            .capabilities
            .resolve(&node.capability)
            .ok_or_else(|| EngineError::UnknownCapability {
                node_id: node.id.clone(),
                capability: node.capability.to_string(),
            })?;
        let policy = RetryPolicy::new(node.retries, Duration::from_millis(self.config.retry_backoff_ms));
        let failed = |message: String| EngineError::NodeExecution {
            node_id: node.id.clone(),
            message,
        };

        match handler {
            Handler::Agent => {
                let agent = &self.collaborators.agent;
                let text = policy
                    .run(attempts, || agent.invoke(&node.capability, &job.inputs.instruction))
                    .await
                    .map_err(|e| failed(e.to_string()))?;
                Ok(NodeOutput {
                    value: agent_output(&node.id, text, self.config.max_output_bytes),
                    sub_trace: None,
                })
            }
            Handler::Tool => {
                let tool_name = node
                    .tool_name
                    .as_deref()
                    .ok_or_else(|| failed("tool node has no tool_name".to_string()))?;
                let request = job.inputs.tool_request(tool_name);
                let tool = &self.collaborators.tool;
                let value = policy
                    .run(attempts, || tool.invoke(request.clone()))
                    .await
                    .map_err(|e| failed(e.to_string()))?;
                Ok(NodeOutput {
                    value,
                    sub_trace: None,
                })
            }
            Handler::SubWorkflow => {
                attempts.fetch_add(1, Ordering::SeqCst);
                self.run_sub_workflow(job).await
            }
        }
    }

    async fn run_sub_workflow(&self, job: &NodeJob) -> Result<NodeOutput, EngineError> {
        let node = &job.node;
        let name = node
            .sub_workflow_name
            .clone()
            .ok_or_else(|| EngineError::NodeExecution {
                node_id: node.id.clone(),
                message: "sub-workflow node has no sub_workflow_name".to_string(),
            })?;

        let lineage = &job.lineage;
        if lineage.ancestors.iter().any(|a| a == &name) {
            let mut stack = lineage.ancestors.clone();
            stack.push(name);
            return Err(EngineError::CycleDetected { stack });
        }
        if lineage.depth + 1 > self.config.max_depth {
            let mut stack = lineage.ancestors.clone();
            stack.push(name);
            return Err(EngineError::RecursionLimitExceeded {
                stack,
                max_depth: self.config.max_depth,
            });
        }

        let template = self
            .collaborators
            .loader
            .load(&name)
            .await
            .map_err(|source| EngineError::SubWorkflowLoad {
                node_id: node.id.clone(),
                name: name.clone(),
                source,
            })?;

        let parent = ExecutionState {
            workflow_name: lineage.workflow_name.clone(),
            ancestors: lineage.ancestors.clone(),
            depth: lineage.depth,
            ..ExecutionState::default()
        };
        let state = parent.child(name.clone());
        let nested = Execution {
            trace: ExecutionTrace::new(name.clone(), state.depth),
            template,
            params: job.inputs.sub_workflow_params.clone(),
            state,
            cancel: job.cancel.child_token(),
            session: None,
        };

        tracing::debug!(
            node_id = node.id.as_str(),
            sub_workflow = name.as_str(),
            depth = lineage.depth + 1,
            "entering sub-workflow"
        );

        match self.drive_boxed(nested).await {
            Ok(outcome) => Ok(NodeOutput {
                value: outcome.output,
                sub_trace: Some(outcome.trace),
            }),
            Err(err) if err.aborts_execution() => Err(err),
            Err(err) => Err(EngineError::NodeExecution {
                node_id: node.id.clone(),
                message: format!("sub-workflow '{name}' failed: {err}"),
            }),
        }
    }
}

impl std::fmt::Debug for WorkflowEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WorkflowEngine")
            .field("config", &self.config)
            .field("checkpoints", &self.checkpoints.is_some())
            .finish_non_exhaustive()
    }
}

// ---------------------------------------------------------------------------
// Scheduling helpers
// ---------------------------------------------------------------------------

/// Whether a pending node can run now.
fn is_ready(template: &Template, state: &ExecutionState, node: &Node) -> bool {
    node.depends_on.iter().all(|d| state.is_completed(d))
        && (!template.is_routed_target(&node.id) || state.is_selected(&node.id))
}

/// Mark every node that can no longer run as skipped. Returns the newly
/// skipped ids in declaration order of discovery.
///
/// A node is skipped when one of its dependencies was skipped, or when it is a
/// routed target that no edge selected and every edge that could still select
/// it has a source that already finished or was skipped.
fn propagate_skips(template: &Template, state: &mut ExecutionState) -> Vec<String> {
    let mut newly = Vec::new();
    loop {
        let mut changed = false;
        for node in &template.nodes {
            if state.is_completed(&node.id) || state.is_skipped(&node.id) {
                continue;
            }
            let dependency_skipped = node.depends_on.iter().any(|d| state.is_skipped(d));
            let unrouted = template.is_routed_target(&node.id)
                && !state.is_selected(&node.id)
                && template
                    .conditions
                    .iter()
                    .filter(|e| e.targets().any(|t| t == node.id))
                    .all(|e| state.is_completed(&e.from) || state.is_skipped(&e.from));
            if (dependency_skipped || unrouted) && state.mark_skipped(&node.id) {
                newly.push(node.id.clone());
                changed = true;
            }
        }
        if !changed {
            return newly;
        }
    }
}

/// Pick the execution's result.
///
/// Without conditional edges this is the last declared node. With routing,
/// the last declared node still wins if it completed outside the routed
/// subgraph; otherwise the last node reached on the routed path, and failing
/// that the last completed node in declaration order.
fn terminal_output(template: &Template, state: &ExecutionState) -> (String, Value) {
    let pick = |id: &str| state.output(id).map(|v| (id.to_string(), v.clone()));
    let last = template.last_node();

    if template.conditions.is_empty() {
        if let Some(found) = last.and_then(|n| pick(&n.id)) {
            return found;
        }
    } else {
        if let Some(found) = last
            .filter(|n| !template.is_routed_member(&n.id))
            .and_then(|n| pick(&n.id))
        {
            return found;
        }
        if let Some(found) = state.routed_path.iter().rev().find_map(|id| pick(id)) {
            return found;
        }
    }

    template
        .nodes
        .iter()
        .rev()
        .find_map(|n| pick(&n.id))
        .unwrap_or_else(|| (last.map(|n| n.id.clone()).unwrap_or_default(), Value::Null))
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
