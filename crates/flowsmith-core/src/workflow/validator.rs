//! Structural validation of workflow templates.
//!
//! Validation is pure and reports every problem it finds rather than stopping
//! at the first one. An empty result means the template is safe to execute.

use std::collections::{HashMap, HashSet};

use flowsmith_types::workflow::{Capability, Operator, Template};
use serde_json::Value;

use super::dag::find_cycle;

/// A single structural problem in a template.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    #[error("workflow name must not be empty")]
    EmptyName,

    #[error("workflow must declare at least one node")]
    EmptyNodes,

    #[error("duplicate node id '{0}'")]
    DuplicateNodeId(String),

    #[error("node '{node}' depends on unknown node '{dependency}'")]
    UnknownDependency { node: String, dependency: String },

    #[error("node '{0}' depends on itself")]
    SelfDependency(String),

    #[error("conditional edge source '{0}' is not a node")]
    UnknownEdgeSource(String),

    #[error("conditional edge from '{from}' targets unknown node '{target}'")]
    UnknownEdgeTarget { from: String, target: String },

    #[error("node '{0}' has more than one conditional edge")]
    DuplicateEdgeSource(String),

    #[error("conditions from '{from}', rule {rule}: operator '{operator}' {reason}")]
    InvalidRuleValue {
        from: String,
        rule: usize,
        operator: Operator,
        reason: String,
    },

    #[error("node '{node}' uses unknown capability '{capability}'")]
    UnknownCapability { node: String, capability: String },

    #[error("tool node '{0}' is missing tool_name")]
    MissingToolName(String),

    #[error("sub-workflow node '{0}' is missing sub_workflow_name")]
    MissingSubWorkflowName(String),

    #[error("agent node '{0}' has an empty instruction")]
    EmptyInstruction(String),

    #[error("node '{0}' has a zero timeout")]
    ZeroTimeout(String),

    #[error("node '{node}' depends on '{dependency}' in the same parallel group '{group}'")]
    GroupMemberDependency {
        group: String,
        node: String,
        dependency: String,
    },

    #[error("cycle detected involving node '{0}'")]
    Cycle(String),
}

/// Validates templates against the built-in capabilities plus a set of
/// registered custom agent tags.
#[derive(Debug, Clone, Default)]
pub struct TemplateValidator {
    custom_capabilities: HashSet<String>,
}

impl TemplateValidator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Accept these custom capability tags in addition to the built-ins.
    pub fn with_capabilities<I, S>(tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            custom_capabilities: tags.into_iter().map(Into::into).collect(),
        }
    }

    fn is_recognized(&self, capability: &Capability) -> bool {
        match capability {
            Capability::Custom(tag) => self.custom_capabilities.contains(tag),
            _ => true,
        }
    }

    /// Collect every structural problem in `template`.
    pub fn validate(&self, template: &Template) -> Vec<ValidationError> {
        let mut errors = Vec::new();

        if template.name.trim().is_empty() {
            errors.push(ValidationError::EmptyName);
        }
        if template.nodes.is_empty() {
            errors.push(ValidationError::EmptyNodes);
            return errors;
        }

        let mut seen: HashSet<&str> = HashSet::new();
        for node in &template.nodes {
            if !seen.insert(node.id.as_str()) {
                errors.push(ValidationError::DuplicateNodeId(node.id.clone()));
            }
        }

        for node in &template.nodes {
            self.check_node_fields(template, node, &seen, &mut errors);
        }

        self.check_conditions(template, &seen, &mut errors);

        if let Some(node) = find_cycle(template) {
            errors.push(ValidationError::Cycle(node));
        }

        errors
    }

    fn check_node_fields(
        &self,
        template: &Template,
        node: &flowsmith_types::workflow::Node,
        ids: &HashSet<&str>,
        errors: &mut Vec<ValidationError>,
    ) {
        for dep in &node.depends_on {
            if dep == &node.id {
                errors.push(ValidationError::SelfDependency(node.id.clone()));
            } else if !ids.contains(dep.as_str()) {
                errors.push(ValidationError::UnknownDependency {
                    node: node.id.clone(),
                    dependency: dep.clone(),
                });
            }
        }

        if !self.is_recognized(&node.capability) {
            errors.push(ValidationError::UnknownCapability {
                node: node.id.clone(),
                capability: node.capability.to_string(),
            });
        }

        match &node.capability {
            Capability::Tool => {
                if node.tool_name.as_deref().is_none_or(|n| n.trim().is_empty()) {
                    errors.push(ValidationError::MissingToolName(node.id.clone()));
                }
            }
            Capability::SubWorkflow => {
                if node
                    .sub_workflow_name
                    .as_deref()
                    .is_none_or(|n| n.trim().is_empty())
                {
                    errors.push(ValidationError::MissingSubWorkflowName(node.id.clone()));
                }
            }
            _ => {
                if node.instruction.trim().is_empty() {
                    errors.push(ValidationError::EmptyInstruction(node.id.clone()));
                }
            }
        }

        if node.timeout_secs == 0 {
            errors.push(ValidationError::ZeroTimeout(node.id.clone()));
        }

        if let Some(group) = &node.parallel_group {
            for dep in &node.depends_on {
                let same_group = template
                    .node(dep)
                    .is_some_and(|d| d.id != node.id && d.parallel_group.as_ref() == Some(group));
                if same_group {
                    errors.push(ValidationError::GroupMemberDependency {
                        group: group.clone(),
                        node: node.id.clone(),
                        dependency: dep.clone(),
                    });
                }
            }
        }
    }

    fn check_conditions(
        &self,
        template: &Template,
        ids: &HashSet<&str>,
        errors: &mut Vec<ValidationError>,
    ) {
        let mut sources: HashMap<&str, usize> = HashMap::new();
        for edge in &template.conditions {
            if !ids.contains(edge.from.as_str()) {
                errors.push(ValidationError::UnknownEdgeSource(edge.from.clone()));
            }
            let count = sources.entry(edge.from.as_str()).or_insert(0);
            *count += 1;
            if *count == 2 {
                errors.push(ValidationError::DuplicateEdgeSource(edge.from.clone()));
            }

            for target in edge.targets() {
                if !ids.contains(target) {
                    errors.push(ValidationError::UnknownEdgeTarget {
                        from: edge.from.clone(),
                        target: target.to_string(),
                    });
                }
            }

            for (i, rule) in edge.rules.iter().enumerate() {
                if let Some(reason) = value_domain_problem(rule.operator, &rule.value) {
                    errors.push(ValidationError::InvalidRuleValue {
                        from: edge.from.clone(),
                        rule: i,
                        operator: rule.operator,
                        reason: reason.to_string(),
                    });
                }
            }
        }
    }
}

fn value_domain_problem(operator: Operator, value: &Value) -> Option<&'static str> {
    if operator.is_membership() && !matches!(value, Value::Array(_) | Value::String(_)) {
        return Some("requires a list or string value");
    }
    if operator.is_ordering() {
        let numeric = match value {
            Value::Number(_) => true,
            Value::String(s) => s.trim().parse::<f64>().is_ok(),
            _ => false,
        };
        if !numeric {
            return Some("requires a numeric value");
        }
    }
    None
}

/// Validate against the built-in capabilities only.
pub fn validate_template(template: &Template) -> Vec<ValidationError> {
    TemplateValidator::new().validate(template)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
