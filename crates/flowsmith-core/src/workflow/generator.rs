//! YAML workflow syntax generation.
//!
//! Renders a `Template` back into the authored syntax so that parsing the
//! result yields an equal template. Keys come out in a fixed order, fields at
//! their parse default are left out, and timeouts are always written as whole
//! seconds. Multi-line instructions are emitted as literal block scalars.

use flowsmith_types::workflow::{ConditionalEdge, ErrorPolicy, Node, Params, Rule, Template};
use serde_json::Value;
use serde_yaml_ng::{Mapping, Value as Yaml};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum GenerateError {
    #[error("cannot render {location}: {reason}")]
    Unrepresentable { location: String, reason: String },

    #[error("YAML emit error: {0}")]
    Emit(String),
}

/// Render `template` as workflow YAML.
pub fn generate_template(template: &Template) -> Result<String, GenerateError> {
    let mut root = Mapping::new();
    root.insert(key("name"), Yaml::String(template.name.clone()));
    root.insert(key("version"), Yaml::String(template.version.clone()));
    root.insert(key("description"), Yaml::String(template.description.clone()));

    if !template.triggers.is_empty() {
        let triggers = template
            .triggers
            .iter()
            .map(|t| Yaml::String(t.as_str().to_string()))
            .collect();
        root.insert(key("triggers"), Yaml::Sequence(triggers));
    }
    if !template.default_params.is_empty() {
        root.insert(
            key("default_params"),
            params_to_yaml(&template.default_params, "default_params")?,
        );
    }

    let nodes = template
        .nodes
        .iter()
        .map(node_entry)
        .collect::<Result<Vec<_>, _>>()?;
    root.insert(key("nodes"), Yaml::Sequence(nodes));

    if !template.conditions.is_empty() {
        let conditions = template
            .conditions
            .iter()
            .enumerate()
            .map(|(i, edge)| edge_entry(i, edge))
            .collect::<Result<Vec<_>, _>>()?;
        root.insert(key("conditions"), Yaml::Sequence(conditions));
    }

    serde_yaml_ng::to_string(&Yaml::Mapping(root)).map_err(|e| GenerateError::Emit(e.to_string()))
}

fn node_entry(node: &Node) -> Result<Yaml, GenerateError> {
    let location = format!("node '{}'", node.id);
    let mut fields = Mapping::new();
    fields.insert(key("capability"), Yaml::String(node.capability.to_string()));
    if !node.instruction.is_empty() {
        fields.insert(key("instruction"), Yaml::String(node.instruction.clone()));
    }
    if !node.depends_on.is_empty() {
        let deps = node.depends_on.iter().cloned().map(Yaml::String).collect();
        fields.insert(key("depends_on"), Yaml::Sequence(deps));
    }
    if let Some(group) = &node.parallel_group {
        fields.insert(key("parallel_group"), Yaml::String(group.clone()));
    }
    fields.insert(key("timeout"), Yaml::Number(node.timeout_secs.into()));
    if let Some(tool) = &node.tool_name {
        fields.insert(key("tool_name"), Yaml::String(tool.clone()));
    }
    if let Some(params) = &node.params {
        fields.insert(key("params"), params_to_yaml(params, &format!("{location}.params"))?);
    }
    if let Some(name) = &node.sub_workflow_name {
        fields.insert(key("sub_workflow_name"), Yaml::String(name.clone()));
    }
    if let Some(params) = &node.sub_workflow_params {
        fields.insert(
            key("sub_workflow_params"),
            params_to_yaml(params, &format!("{location}.sub_workflow_params"))?,
        );
    }
    if node.on_error != ErrorPolicy::Fail {
        fields.insert(key("on_error"), Yaml::String(node.on_error.as_str().to_string()));
    }
    if node.retries != 0 {
        fields.insert(key("retries"), Yaml::Number(u64::from(node.retries).into()));
    }

    let mut entry = Mapping::new();
    entry.insert(Yaml::String(node.id.clone()), Yaml::Mapping(fields));
    Ok(Yaml::Mapping(entry))
}

fn edge_entry(index: usize, edge: &ConditionalEdge) -> Result<Yaml, GenerateError> {
    let mut fields = Mapping::new();
    fields.insert(key("from"), Yaml::String(edge.from.clone()));
    let rules = edge
        .rules
        .iter()
        .enumerate()
        .map(|(j, rule)| rule_entry(&format!("conditions[{index}].rules[{j}]"), rule))
        .collect::<Result<Vec<_>, _>>()?;
    fields.insert(key("rules"), Yaml::Sequence(rules));
    fields.insert(key("default"), Yaml::String(edge.default.clone()));
    Ok(Yaml::Mapping(fields))
}

fn rule_entry(location: &str, rule: &Rule) -> Result<Yaml, GenerateError> {
    let mut fields = Mapping::new();
    fields.insert(key("field"), Yaml::String(rule.field.clone()));
    fields.insert(key("operator"), Yaml::String(rule.operator.token().to_string()));
    fields.insert(key("value"), json_to_yaml(&rule.value, location)?);
    fields.insert(key("target"), Yaml::String(rule.target.clone()));
    Ok(Yaml::Mapping(fields))
}

fn key(name: &str) -> Yaml {
    Yaml::String(name.to_string())
}

fn json_to_yaml(value: &Value, location: &str) -> Result<Yaml, GenerateError> {
    serde_yaml_ng::to_value(value).map_err(|e| GenerateError::Unrepresentable {
        location: location.to_string(),
        reason: e.to_string(),
    })
}

fn params_to_yaml(params: &Params, location: &str) -> Result<Yaml, GenerateError> {
    serde_yaml_ng::to_value(params).map_err(|e| GenerateError::Unrepresentable {
        location: location.to_string(),
        reason: e.to_string(),
    })
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
