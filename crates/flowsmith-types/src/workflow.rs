//! Workflow template types for Flowsmith.
//!
//! Defines the canonical intermediate representation for workflows: the YAML
//! syntax parses into a `Template`, and the generator renders a `Template` back
//! into YAML. A validated template is immutable and shared read-only across
//! concurrent executions.

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Structured parameter map (template defaults, node params, invocation params).
///
/// Backed by `serde_json::Map`, so keys iterate in sorted order.
pub type Params = serde_json::Map<String, Value>;

/// Default per-node timeout in seconds (5 minutes).
pub const DEFAULT_NODE_TIMEOUT_SECS: u64 = 300;

// ---------------------------------------------------------------------------
// Template
// ---------------------------------------------------------------------------

/// The canonical workflow template.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Template {
    /// Workflow name, also the registry cache key.
    pub name: String,
    /// Free-form version string (e.g. "1.0").
    pub version: String,
    /// Human-readable description.
    pub description: String,
    /// Parameters available to every node unless overridden at runtime.
    #[serde(default)]
    pub default_params: Params,
    /// Patterns used to pick this workflow for an incoming request.
    #[serde(default)]
    pub triggers: Vec<TriggerPattern>,
    /// Nodes in declaration order.
    pub nodes: Vec<Node>,
    /// Conditional routing edges.
    #[serde(default)]
    pub conditions: Vec<ConditionalEdge>,
}

impl Template {
    /// Create an empty template with the given identity fields.
    pub fn new(
        name: impl Into<String>,
        version: impl Into<String>,
        description: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            version: version.into(),
            description: description.into(),
            default_params: Params::new(),
            triggers: Vec::new(),
            nodes: Vec::new(),
            conditions: Vec::new(),
        }
    }

    /// Look up a node by id.
    pub fn node(&self, id: &str) -> Option<&Node> {
        self.nodes.iter().find(|n| n.id == id)
    }

    /// The last node in declaration order.
    pub fn last_node(&self) -> Option<&Node> {
        self.nodes.last()
    }

    /// The conditional edge whose source is `id`, if any.
    pub fn edge_from(&self, id: &str) -> Option<&ConditionalEdge> {
        self.conditions.iter().find(|e| e.from == id)
    }

    /// Whether `id` is the target (rule target or default) of any edge.
    pub fn is_routed_target(&self, id: &str) -> bool {
        self.conditions.iter().any(|e| e.targets().any(|t| t == id))
    }

    /// Whether `id` takes part in conditional routing, as a source or a target.
    pub fn is_routed_member(&self, id: &str) -> bool {
        self.edge_from(id).is_some() || self.is_routed_target(id)
    }

    /// Whether any trigger pattern matches `text`.
    pub fn matches_trigger(&self, text: &str) -> bool {
        self.triggers.iter().any(|t| t.matches(text))
    }
}

// ---------------------------------------------------------------------------
// Node
// ---------------------------------------------------------------------------

/// A single unit of work in the workflow graph.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Node {
    /// Unique id within the template.
    pub id: String,
    /// Which executor kind handles this node.
    pub capability: Capability,
    /// Instruction template, resolved against the execution scope before dispatch.
    #[serde(default)]
    pub instruction: String,
    /// Ids of nodes that must complete before this one starts.
    #[serde(default)]
    pub depends_on: Vec<String>,
    /// Label marking nodes that are meant to run side by side.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parallel_group: Option<String>,
    /// Upper bound on the node's execution, in seconds.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    /// Tool to call for `tool` nodes.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_name: Option<String>,
    /// Structured parameters, substituted like the instruction.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub params: Option<Params>,
    /// Workflow to run for `sub_workflow` nodes.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sub_workflow_name: Option<String>,
    /// Runtime parameters handed to the nested workflow.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sub_workflow_params: Option<Params>,
    /// What to do when the node fails.
    #[serde(default)]
    pub on_error: ErrorPolicy,
    /// How many times a transient collaborator failure is retried.
    #[serde(default)]
    pub retries: u32,
}

fn default_timeout_secs() -> u64 {
    DEFAULT_NODE_TIMEOUT_SECS
}

impl Node {
    /// Create a node with default optional fields.
    pub fn new(id: impl Into<String>, capability: Capability, instruction: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            capability,
            instruction: instruction.into(),
            depends_on: Vec::new(),
            parallel_group: None,
            timeout_secs: DEFAULT_NODE_TIMEOUT_SECS,
            tool_name: None,
            params: None,
            sub_workflow_name: None,
            sub_workflow_params: None,
            on_error: ErrorPolicy::Fail,
            retries: 0,
        }
    }

    /// Set the dependency list.
    pub fn depends_on<I, S>(mut self, deps: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.depends_on = deps.into_iter().map(Into::into).collect();
        self
    }

    /// Set the parallel group label.
    pub fn in_group(mut self, group: impl Into<String>) -> Self {
        self.parallel_group = Some(group.into());
        self
    }

    /// Set the timeout in seconds.
    pub fn with_timeout(mut self, secs: u64) -> Self {
        self.timeout_secs = secs;
        self
    }
}

/// The executor kind that handles a node.
///
/// Built-in kinds cover agents, tools, and nested workflows. `Custom` carries
/// any other tag; it only dispatches if registered in the engine's capability
/// table.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum Capability {
    Researcher,
    Analyst,
    Writer,
    Tool,
    SubWorkflow,
    Custom(String),
}

impl Capability {
    /// Canonical token used in the YAML syntax.
    pub fn as_str(&self) -> &str {
        match self {
            Capability::Researcher => "researcher",
            Capability::Analyst => "analyst",
            Capability::Writer => "writer",
            Capability::Tool => "tool",
            Capability::SubWorkflow => "sub_workflow",
            Capability::Custom(tag) => tag,
        }
    }

    /// Whether this is one of the built-in agent kinds.
    pub fn is_builtin_agent(&self) -> bool {
        matches!(
            self,
            Capability::Researcher | Capability::Analyst | Capability::Writer
        )
    }
}

impl From<&str> for Capability {
    fn from(token: &str) -> Self {
        match token {
            "researcher" => Capability::Researcher,
            "analyst" => Capability::Analyst,
            "writer" => Capability::Writer,
            "tool" => Capability::Tool,
            "sub_workflow" | "sub-workflow" => Capability::SubWorkflow,
            other => Capability::Custom(other.to_string()),
        }
    }
}

impl From<String> for Capability {
    fn from(token: String) -> Self {
        Capability::from(token.as_str())
    }
}

impl From<Capability> for String {
    fn from(capability: Capability) -> Self {
        capability.as_str().to_string()
    }
}

impl fmt::Display for Capability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Failure policy for a node.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorPolicy {
    /// Any failure aborts the execution.
    #[default]
    Fail,
    /// Record a placeholder output and a warning, then continue.
    BestEffort,
}

impl ErrorPolicy {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorPolicy::Fail => "fail",
            ErrorPolicy::BestEffort => "best_effort",
        }
    }
}

// ---------------------------------------------------------------------------
// Conditional routing
// ---------------------------------------------------------------------------

/// Routes execution from `from` to exactly one target once `from` completes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConditionalEdge {
    /// Source node whose output is inspected.
    pub from: String,
    /// Rules evaluated in order; the first match wins.
    pub rules: Vec<Rule>,
    /// Target used when no rule matches.
    pub default: String,
}

impl ConditionalEdge {
    /// Every node this edge can route to: rule targets then the default.
    pub fn targets(&self) -> impl Iterator<Item = &str> {
        self.rules
            .iter()
            .map(|r| r.target.as_str())
            .chain(std::iter::once(self.default.as_str()))
    }
}

/// A single predicate over a field of the source node's output.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Rule {
    /// Dotted path into the source node's structured output.
    pub field: String,
    pub operator: Operator,
    /// Comparison value.
    pub value: Value,
    /// Node selected when the predicate holds.
    pub target: String,
}

/// Comparison operator used in routing rules.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Operator {
    #[serde(rename = ">")]
    Gt,
    #[serde(rename = "<")]
    Lt,
    #[serde(rename = ">=")]
    Ge,
    #[serde(rename = "<=")]
    Le,
    #[serde(rename = "==")]
    Eq,
    #[serde(rename = "!=")]
    Ne,
    #[serde(rename = "contains")]
    Contains,
    #[serde(rename = "not_contains")]
    NotContains,
    #[serde(rename = "in")]
    In,
    #[serde(rename = "not_in")]
    NotIn,
}

impl Operator {
    /// Every operator, in token order.
    pub const ALL: [Operator; 10] = [
        Operator::Gt,
        Operator::Lt,
        Operator::Ge,
        Operator::Le,
        Operator::Eq,
        Operator::Ne,
        Operator::Contains,
        Operator::NotContains,
        Operator::In,
        Operator::NotIn,
    ];

    /// Map a syntax token to an operator.
    pub fn from_token(token: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|op| op.token() == token)
    }

    /// The syntax token for this operator.
    pub fn token(&self) -> &'static str {
        match self {
            Operator::Gt => ">",
            Operator::Lt => "<",
            Operator::Ge => ">=",
            Operator::Le => "<=",
            Operator::Eq => "==",
            Operator::Ne => "!=",
            Operator::Contains => "contains",
            Operator::NotContains => "not_contains",
            Operator::In => "in",
            Operator::NotIn => "not_in",
        }
    }

    /// Ordering comparisons need numeric operands.
    pub fn is_ordering(&self) -> bool {
        matches!(self, Operator::Gt | Operator::Lt | Operator::Ge | Operator::Le)
    }

    /// Membership tests need a collection (or string) on the value side.
    pub fn is_membership(&self) -> bool {
        matches!(self, Operator::In | Operator::NotIn)
    }
}

impl fmt::Display for Operator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.token())
    }
}

// ---------------------------------------------------------------------------
// Triggers
// ---------------------------------------------------------------------------

/// Case-insensitive glob (`*` wildcard) matched against incoming request text.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TriggerPattern(pub String);

impl TriggerPattern {
    pub fn new(pattern: impl Into<String>) -> Self {
        Self(pattern.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Whether the whole of `text` matches the pattern.
    ///
    /// Only `*` is a wildcard; every other character, `?` and `[` included,
    /// matches literally.
    pub fn matches(&self, text: &str) -> bool {
        match self.compile() {
            Ok(pattern) => pattern.matches_with(text, TRIGGER_MATCH),
            Err(_) => false,
        }
    }

    /// Escape everything but `*`, collapsing runs of stars so `glob` never
    /// sees a recursive `**`.
    fn compile(&self) -> Result<glob::Pattern, glob::PatternError> {
        let mut pattern = String::with_capacity(self.0.len());
        for (i, literal) in self.0.split('*').enumerate() {
            if i > 0 && !pattern.ends_with('*') {
                pattern.push('*');
            }
            pattern.push_str(&glob::Pattern::escape(literal));
        }
        glob::Pattern::new(&pattern)
    }
}

const TRIGGER_MATCH: glob::MatchOptions = glob::MatchOptions {
    case_sensitive: false,
    require_literal_separator: false,
    require_literal_leading_dot: false,
};

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
