//! YAML workflow syntax parsing.
//!
//! Converts authored YAML into the canonical `Template`. The document is first
//! read as a generic YAML tree and then walked field by field, so that every
//! failure can be classified (`MissingField`, `InvalidOperator`,
//! `InvalidTimeoutFormat`, `SchemaViolation`) and name the offending location.

use std::fmt;
use std::path::Path;

use flowsmith_types::workflow::{
    Capability, ConditionalEdge, ErrorPolicy, Node, Operator, Params, Rule, Template,
    TriggerPattern, DEFAULT_NODE_TIMEOUT_SECS,
};
use serde_json::Value;
use serde_yaml_ng::{Mapping, Value as Yaml};
use thiserror::Error;

use super::validator::{TemplateValidator, ValidationError};

// ---------------------------------------------------------------------------
// Error types
// ---------------------------------------------------------------------------

/// Classification of a parse failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParseErrorKind {
    MissingField,
    InvalidOperator,
    InvalidTimeoutFormat,
    SchemaViolation,
}

impl fmt::Display for ParseErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ParseErrorKind::MissingField => "missing field",
            ParseErrorKind::InvalidOperator => "invalid operator",
            ParseErrorKind::InvalidTimeoutFormat => "invalid timeout format",
            ParseErrorKind::SchemaViolation => "schema violation",
        };
        f.write_str(s)
    }
}

/// A failure to turn workflow text into a `Template`.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{kind}: {message}")]
pub struct ParseError {
    pub kind: ParseErrorKind,
    pub message: String,
}

impl ParseError {
    fn new(kind: ParseErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    fn missing(location: &str, field: &str) -> Self {
        Self::new(
            ParseErrorKind::MissingField,
            format!("{location}: required field '{field}' is missing"),
        )
    }

    fn schema(message: impl Into<String>) -> Self {
        Self::new(ParseErrorKind::SchemaViolation, message)
    }
}

/// Errors from loading a template end to end (read, parse, validate).
#[derive(Debug, Error)]
pub enum TemplateError {
    #[error(transparent)]
    Parse(#[from] ParseError),

    #[error("template failed validation: {}", join_errors(.0))]
    ValidationFailed(Vec<ValidationError>),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

fn join_errors(errors: &[ValidationError]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

type Result<T> = std::result::Result<T, ParseError>;

// ---------------------------------------------------------------------------
// Entry points
// ---------------------------------------------------------------------------

const TOP_LEVEL_KEYS: &[&str] = &[
    "name",
    "version",
    "description",
    "triggers",
    "default_params",
    "nodes",
    "conditions",
];

const NODE_KEYS: &[&str] = &[
    "capability",
    "instruction",
    "depends_on",
    "parallel_group",
    "timeout",
    "tool_name",
    "params",
    "sub_workflow_name",
    "sub_workflow_params",
    "on_error",
    "retries",
];

const EDGE_KEYS: &[&str] = &["from", "rules", "default"];
const RULE_KEYS: &[&str] = &["field", "operator", "value", "target"];

/// Parse workflow YAML into a `Template` without semantic validation.
pub fn parse_template(text: &str) -> Result<Template> {
    parse_template_with_timeout(text, DEFAULT_NODE_TIMEOUT_SECS)
}

/// Like [`parse_template`], with the timeout given to nodes that declare none.
pub fn parse_template_with_timeout(text: &str, default_timeout_secs: u64) -> Result<Template> {
    let doc: Yaml = serde_yaml_ng::from_str(text)
        .map_err(|e| ParseError::schema(format!("invalid YAML: {e}")))?;
    let root = doc
        .as_mapping()
        .ok_or_else(|| ParseError::schema("workflow document must be a mapping"))?;
    reject_unknown_keys(root, TOP_LEVEL_KEYS, "workflow")?;

    let name = required_scalar(root, "name", "workflow")?;
    let version = required_scalar(root, "version", "workflow")?;
    let description = required_scalar(root, "description", "workflow")?;

    let triggers = match root.get("triggers") {
        None | Some(Yaml::Null) => Vec::new(),
        Some(value) => string_list(value, "workflow.triggers")?
            .into_iter()
            .map(TriggerPattern::new)
            .collect(),
    };

    let default_params = match root.get("default_params") {
        None | Some(Yaml::Null) => Params::new(),
        Some(value) => to_params(value, "workflow.default_params")?,
    };

    let nodes_value = root
        .get("nodes")
        .ok_or_else(|| ParseError::missing("workflow", "nodes"))?;
    let nodes = match nodes_value {
        Yaml::Sequence(items) => items
            .iter()
            .enumerate()
            .map(|(i, item)| parse_node(i, item, default_timeout_secs))
            .collect::<Result<Vec<_>>>()?,
        Yaml::Null => Vec::new(),
        _ => return Err(ParseError::schema("workflow.nodes must be a list")),
    };

    let conditions = match root.get("conditions") {
        None | Some(Yaml::Null) => Vec::new(),
        Some(Yaml::Sequence(items)) => items
            .iter()
            .enumerate()
            .map(|(i, item)| parse_edge(i, item))
            .collect::<Result<Vec<_>>>()?,
        Some(_) => return Err(ParseError::schema("workflow.conditions must be a list")),
    };

    Ok(Template {
        name,
        version,
        description,
        default_params,
        triggers,
        nodes,
        conditions,
    })
}

/// Parse and run the built-in validator, reporting every validation error.
pub fn parse_and_validate(text: &str) -> std::result::Result<Template, TemplateError> {
    parse_and_validate_with(text, &TemplateValidator::new())
}

/// Parse and validate with a caller-supplied validator (custom capabilities).
pub fn parse_and_validate_with(
    text: &str,
    validator: &TemplateValidator,
) -> std::result::Result<Template, TemplateError> {
    parse_and_validate_with_timeout(text, validator, DEFAULT_NODE_TIMEOUT_SECS)
}

/// Like [`parse_and_validate_with`], with the timeout given to nodes that declare none.
pub fn parse_and_validate_with_timeout(
    text: &str,
    validator: &TemplateValidator,
    default_timeout_secs: u64,
) -> std::result::Result<Template, TemplateError> {
    let template = parse_template_with_timeout(text, default_timeout_secs)?;
    let errors = validator.validate(&template);
    if !errors.is_empty() {
        return Err(TemplateError::ValidationFailed(errors));
    }
    Ok(template)
}

/// Read a workflow file from disk and parse it (no validation).
pub async fn load_template_file(path: &Path) -> std::result::Result<Template, TemplateError> {
    let text = tokio::fs::read_to_string(path).await?;
    Ok(parse_template(&text)?)
}

// ---------------------------------------------------------------------------
// Nodes
// ---------------------------------------------------------------------------

fn parse_node(index: usize, item: &Yaml, default_timeout_secs: u64) -> Result<Node> {
    let entry = item
        .as_mapping()
        .filter(|m| m.len() == 1)
        .ok_or_else(|| {
            ParseError::schema(format!(
                "nodes[{index}] must be a mapping with exactly one key (the node id)"
            ))
        })?;
    let (key, body) = entry
        .iter()
        .next()
        .ok_or_else(|| ParseError::schema(format!("nodes[{index}] is empty")))?;
    let id = scalar_string(key)
        .ok_or_else(|| ParseError::schema(format!("nodes[{index}]: node id must be a string")))?;
    let location = format!("node '{id}'");

    let fields = body
        .as_mapping()
        .ok_or_else(|| ParseError::schema(format!("{location}: node body must be a mapping")))?;
    reject_unknown_keys(fields, NODE_KEYS, &location)?;

    let capability = Capability::from(required_scalar(fields, "capability", &location)?);
    let mut node = Node::new(id.clone(), capability, "");

    if let Some(value) = present(fields, "instruction") {
        node.instruction = expect_string(value, &location, "instruction")?;
    }
    if let Some(value) = present(fields, "depends_on") {
        let mut deps: Vec<String> = Vec::new();
        for dep in string_list(value, &format!("{location}.depends_on"))? {
            if !deps.contains(&dep) {
                deps.push(dep);
            }
        }
        node.depends_on = deps;
    }
    if let Some(value) = present(fields, "parallel_group") {
        node.parallel_group = Some(expect_string(value, &location, "parallel_group")?);
    }
    node.timeout_secs = match present(fields, "timeout") {
        Some(value) => parse_timeout(value, &id)?,
        None => default_timeout_secs,
    };
    if let Some(value) = present(fields, "tool_name") {
        node.tool_name = Some(expect_string(value, &location, "tool_name")?);
    }
    if let Some(value) = present(fields, "params") {
        node.params = Some(to_params(value, &format!("{location}.params"))?);
    }
    if let Some(value) = present(fields, "sub_workflow_name") {
        node.sub_workflow_name = Some(expect_string(value, &location, "sub_workflow_name")?);
    }
    if let Some(value) = present(fields, "sub_workflow_params") {
        node.sub_workflow_params =
            Some(to_params(value, &format!("{location}.sub_workflow_params"))?);
    }
    if let Some(value) = present(fields, "on_error") {
        node.on_error = match value.as_str() {
            Some("fail") => ErrorPolicy::Fail,
            Some("best_effort") | Some("best-effort") => ErrorPolicy::BestEffort,
            _ => {
                return Err(ParseError::schema(format!(
                    "{location}: on_error must be 'fail' or 'best_effort'"
                )))
            }
        };
    }
    if let Some(value) = present(fields, "retries") {
        node.retries = value
            .as_u64()
            .and_then(|n| u32::try_from(n).ok())
            .ok_or_else(|| {
                ParseError::schema(format!("{location}: retries must be a non-negative integer"))
            })?;
    }

    Ok(node)
}

/// Accepts seconds as an integer, or an integer with an `s`, `m`, or `h` suffix.
fn parse_timeout(value: &Yaml, node_id: &str) -> Result<u64> {
    let invalid = || {
        ParseError::new(
            ParseErrorKind::InvalidTimeoutFormat,
            format!(
                "node '{node_id}': invalid timeout {}",
                scalar_string(value).unwrap_or_else(|| "value".to_string())
            ),
        )
    };

    match value {
        Yaml::Number(n) => n.as_u64().ok_or_else(invalid),
        Yaml::String(s) => {
            let s = s.trim();
            let (digits, multiplier) = match s.char_indices().last() {
                Some((i, 's')) => (&s[..i], 1),
                Some((i, 'm')) => (&s[..i], 60),
                Some((i, 'h')) => (&s[..i], 3600),
                _ => (s, 1),
            };
            if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
                return Err(invalid());
            }
            digits
                .parse::<u64>()
                .ok()
                .and_then(|n| n.checked_mul(multiplier))
                .ok_or_else(invalid)
        }
        _ => Err(invalid()),
    }
}

// ---------------------------------------------------------------------------
// Conditions
// ---------------------------------------------------------------------------

fn parse_edge(index: usize, item: &Yaml) -> Result<ConditionalEdge> {
    let location = format!("conditions[{index}]");
    let fields = item
        .as_mapping()
        .ok_or_else(|| ParseError::schema(format!("{location} must be a mapping")))?;
    reject_unknown_keys(fields, EDGE_KEYS, &location)?;

    let from = required_scalar(fields, "from", &location)?;
    let default = required_scalar(fields, "default", &location)?;
    let rules = match fields.get("rules") {
        None => return Err(ParseError::missing(&location, "rules")),
        Some(Yaml::Null) => Vec::new(),
        Some(Yaml::Sequence(items)) => items
            .iter()
            .enumerate()
            .map(|(j, rule)| parse_rule(index, j, &from, rule))
            .collect::<Result<Vec<_>>>()?,
        Some(_) => return Err(ParseError::schema(format!("{location}.rules must be a list"))),
    };

    Ok(ConditionalEdge {
        from,
        rules,
        default,
    })
}

fn parse_rule(edge: usize, index: usize, from: &str, item: &Yaml) -> Result<Rule> {
    let location = format!("conditions[{edge}].rules[{index}]");
    let fields = item
        .as_mapping()
        .ok_or_else(|| ParseError::schema(format!("{location} must be a mapping")))?;
    reject_unknown_keys(fields, RULE_KEYS, &location)?;

    let field = required_scalar(fields, "field", &location)?;
    let token = required_scalar(fields, "operator", &location)?;
    let operator = Operator::from_token(token.trim()).ok_or_else(|| {
        ParseError::new(
            ParseErrorKind::InvalidOperator,
            format!("{location} (from '{from}'): unknown operator '{token}'"),
        )
    })?;
    let value = fields
        .get("value")
        .ok_or_else(|| ParseError::missing(&location, "value"))
        .and_then(|v| to_json(v, &format!("{location}.value")))?;
    let target = required_scalar(fields, "target", &location)?;

    Ok(Rule {
        field,
        operator,
        value,
        target,
    })
}

// ---------------------------------------------------------------------------
// YAML helpers
// ---------------------------------------------------------------------------

fn reject_unknown_keys(map: &Mapping, allowed: &[&str], location: &str) -> Result<()> {
    for key in map.keys() {
        match key.as_str() {
            Some(k) if allowed.contains(&k) => {}
            _ => {
                let shown = scalar_string(key).unwrap_or_else(|| format!("{key:?}"));
                return Err(ParseError::schema(format!("{location}: unknown field '{shown}'")));
            }
        }
    }
    Ok(())
}

/// A field that is present and not null.
fn present<'a>(map: &'a Mapping, key: &str) -> Option<&'a Yaml> {
    map.get(key).filter(|v| !v.is_null())
}

fn required_scalar(map: &Mapping, key: &str, location: &str) -> Result<String> {
    let value = present(map, key).ok_or_else(|| ParseError::missing(location, key))?;
    scalar_string(value)
        .ok_or_else(|| ParseError::schema(format!("{location}: '{key}' must be a scalar")))
}

fn expect_string(value: &Yaml, location: &str, key: &str) -> Result<String> {
    value
        .as_str()
        .map(str::to_string)
        .ok_or_else(|| ParseError::schema(format!("{location}: '{key}' must be a string")))
}

/// Text of a scalar; numbers and booleans are accepted for identity fields
/// such as `version: 1.0`.
fn scalar_string(value: &Yaml) -> Option<String> {
    match value {
        Yaml::String(s) => Some(s.clone()),
        Yaml::Number(n) => Some(n.to_string()),
        Yaml::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

fn string_list(value: &Yaml, location: &str) -> Result<Vec<String>> {
    let items = value
        .as_sequence()
        .ok_or_else(|| ParseError::schema(format!("{location} must be a list")))?;
    items
        .iter()
        .map(|item| {
            scalar_string(item)
                .ok_or_else(|| ParseError::schema(format!("{location} must contain only strings")))
        })
        .collect()
}

fn to_json(value: &Yaml, location: &str) -> Result<Value> {
    serde_json::to_value(value)
        .map_err(|e| ParseError::schema(format!("{location}: unsupported value: {e}")))
}

fn to_params(value: &Yaml, location: &str) -> Result<Params> {
    match to_json(value, location)? {
        Value::Object(map) => Ok(map),
        _ => Err(ParseError::schema(format!("{location} must be a mapping"))),
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    const RESEARCH: &str = r#"
name: research-report
version: "1.0"
description: Research a topic and write a report
triggers:
  - "research *"
default_params:
  depth: shallow
nodes:
  - research:
      capability: researcher
      instruction: "Research {topic}"
      timeout: 2m
  - analyze:
      capability: analyst
      instruction: "Analyze {research}"
      depends_on: [research]
  - write:
      capability: writer
      instruction: "Write a report from {analyze}"
      depends_on: [analyze, analyze]
      timeout: 1h
"#;

    #[test]
    fn test_parse_research_pipeline() {
        let t = parse_template(RESEARCH).unwrap();
        assert_eq!(t.name, "research-report");
        assert_eq!(t.version, "1.0");
        assert_eq!(t.triggers, vec![TriggerPattern::new("research *")]);
        assert_eq!(t.default_params.get("depth"), Some(&json!("shallow")));
        let ids: Vec<&str> = t.nodes.iter().map(|n| n.id.as_str()).collect();
        assert_eq!(ids, vec!["research", "analyze", "write"]);
        assert_eq!(t.nodes[0].timeout_secs, 120);
        assert_eq!(t.nodes[1].timeout_secs, DEFAULT_NODE_TIMEOUT_SECS);
        assert_eq!(t.nodes[2].timeout_secs, 3600);
        assert_eq!(t.nodes[2].depends_on, vec!["analyze"], "duplicates are dropped");
        assert!(t.conditions.is_empty());
    }

    #[test]
    fn test_parse_tool_and_sub_workflow_nodes() {
        let yaml = r#"
name: pipeline
version: 2
description: mixed
nodes:
  - fetch:
      capability: tool
      tool_name: web_search
      instruction: "search {topic}"
      params:
        limit: 5
  - nested:
      capability: sub-workflow
      sub_workflow_name: summarize
      sub_workflow_params:
        text: "{fetch}"
      depends_on: [fetch]
      on_error: best_effort
      retries: 2
"#;
        let t = parse_template(yaml).unwrap();
        assert_eq!(t.version, "2");
        assert_eq!(t.nodes[0].capability, Capability::Tool);
        assert_eq!(t.nodes[0].tool_name.as_deref(), Some("web_search"));
        assert_eq!(t.nodes[0].params.as_ref().unwrap().get("limit"), Some(&json!(5)));
        assert_eq!(t.nodes[1].capability, Capability::SubWorkflow);
        assert_eq!(t.nodes[1].on_error, ErrorPolicy::BestEffort);
        assert_eq!(t.nodes[1].retries, 2);
        assert_eq!(
            t.nodes[1].sub_workflow_params.as_ref().unwrap().get("text"),
            Some(&json!("{fetch}"))
        );
    }

    #[test]
    fn test_parse_conditions() {
        let yaml = r#"
name: review
version: "1"
description: route on score
nodes:
  - score: {capability: analyst, instruction: "Score it"}
  - publish: {capability: writer, instruction: "Publish"}
  - revise: {capability: writer, instruction: "Revise"}
conditions:
  - from: score
    rules:
      - {field: result.score, operator: ">=", value: 8, target: publish}
      - {field: tags, operator: in, value: [urgent, hot], target: publish}
    default: revise
"#;
        let t = parse_template(yaml).unwrap();
        let edge = &t.conditions[0];
        assert_eq!(edge.from, "score");
        assert_eq!(edge.rules[0].operator, Operator::Ge);
        assert_eq!(edge.rules[0].value, json!(8));
        assert_eq!(edge.rules[1].operator, Operator::In);
        assert_eq!(edge.rules[1].value, json!(["urgent", "hot"]));
        assert_eq!(edge.default, "revise");
    }

    #[test]
    fn test_missing_required_fields() {
        let err = parse_template("version: '1'\ndescription: x\nnodes: []\n").unwrap_err();
        assert_eq!(err.kind, ParseErrorKind::MissingField);
        assert!(err.message.contains("'name'"));

        let err = parse_template("name: a\nversion: '1'\ndescription: x\n").unwrap_err();
        assert_eq!(err.kind, ParseErrorKind::MissingField);
        assert!(err.message.contains("'nodes'"));

        let yaml = "name: a\nversion: '1'\ndescription: x\nnodes:\n  - n: {instruction: hi}\n";
        let err = parse_template(yaml).unwrap_err();
        assert_eq!(err.kind, ParseErrorKind::MissingField);
        assert!(err.message.contains("node 'n'"));
    }

    #[test]
    fn test_invalid_operator_names_rule() {
        let yaml = r#"
name: a
version: "1"
description: x
nodes:
  - a: {capability: analyst, instruction: go}
  - b: {capability: writer, instruction: go}
conditions:
  - from: a
    rules:
      - {field: x, operator: "=~", value: 1, target: b}
    default: b
"#;
        let err = parse_template(yaml).unwrap_err();
        assert_eq!(err.kind, ParseErrorKind::InvalidOperator);
        assert!(err.message.contains("conditions[0].rules[0]"));
        assert!(err.message.contains("from 'a'"));
        assert!(err.message.contains("=~"));
    }

    #[test]
    fn test_invalid_timeout_names_node() {
        for bad in ["\"soon\"", "\"5d\"", "\"m\"", "-3", "1.5"] {
            let yaml = format!(
                "name: a\nversion: '1'\ndescription: x\nnodes:\n  - slow: {{capability: writer, instruction: go, timeout: {bad}}}\n"
            );
            let err = parse_template(&yaml).unwrap_err();
            assert_eq!(err.kind, ParseErrorKind::InvalidTimeoutFormat, "input {bad}");
            assert!(err.message.contains("node 'slow'"));
        }
    }

    #[test]
    fn test_timeout_forms() {
        let v = |s: &str| serde_yaml_ng::from_str::<Yaml>(s).unwrap();
        assert_eq!(parse_timeout(&v("45"), "n").unwrap(), 45);
        assert_eq!(parse_timeout(&v("'45s'"), "n").unwrap(), 45);
        assert_eq!(parse_timeout(&v("'3m'"), "n").unwrap(), 180);
        assert_eq!(parse_timeout(&v("'2h'"), "n").unwrap(), 7200);
        assert_eq!(parse_timeout(&v("'90'"), "n").unwrap(), 90);
    }

    #[test]
    fn test_configured_default_timeout() {
        let yaml = "name: t\nversion: '1'\ndescription: d\nnodes:\n  - a: {capability: writer, instruction: x}\n  - b: {capability: writer, instruction: y, timeout: 5}\n";
        let t = parse_template_with_timeout(yaml, 42).unwrap();
        assert_eq!(t.nodes[0].timeout_secs, 42);
        assert_eq!(t.nodes[1].timeout_secs, 5);
    }

    #[test]
    fn test_schema_violations() {
        let cases = [
            "not yaml: [",
            "- just\n- a list\n",
            "name: a\nversion: '1'\ndescription: x\nnodes: []\nextra: true\n",
            "name: a\nversion: '1'\ndescription: x\nnodes:\n  - a: {capability: writer}\n    b: {capability: writer}\n",
            "name: a\nversion: '1'\ndescription: x\nnodes:\n  - a: {capability: writer, colour: red}\n",
            "name: a\nversion: '1'\ndescription: x\nnodes:\n  - a: {capability: writer, depends_on: {x: 1}}\n",
            "name: a\nversion: '1'\ndescription: x\nnodes:\n  - a: {capability: writer, on_error: ignore}\n",
            "name: a\nversion: '1'\ndescription: x\nnodes: {a: 1}\n",
        ];
        for yaml in cases {
            let err = parse_template(yaml).unwrap_err();
            assert_eq!(err.kind, ParseErrorKind::SchemaViolation, "input: {yaml}");
        }
    }

    #[test]
    fn test_custom_capability_parses() {
        let yaml = "name: a\nversion: '1'\ndescription: x\nnodes:\n  - a: {capability: critic, instruction: judge}\n";
        let t = parse_template(yaml).unwrap();
        assert_eq!(t.nodes[0].capability, Capability::Custom("critic".into()));
    }

    #[test]
    fn test_parse_and_validate_reports_all_errors() {
        let yaml = r#"
name: broken
version: "1"
description: x
nodes:
  - a: {capability: analyst, instruction: go, depends_on: [ghost]}
  - a: {capability: writer, instruction: again}
"#;
        let err = parse_and_validate(yaml).unwrap_err();
        match err {
            TemplateError::ValidationFailed(errors) => {
                assert!(errors.contains(&ValidationError::DuplicateNodeId("a".into())));
                assert!(errors.iter().any(|e| matches!(e, ValidationError::UnknownDependency { .. })));
            }
            other => panic!("expected validation failure, got {other}"),
        }
    }

    #[test]
    fn test_parse_and_validate_accepts_valid() {
        assert!(parse_and_validate(RESEARCH).is_ok());
    }

    #[tokio::test]
    async fn test_load_template_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("research.yaml");
        std::fs::write(&path, RESEARCH).unwrap();
        let t = load_template_file(&path).await.unwrap();
        assert_eq!(t.name, "research-report");

        let err = load_template_file(&dir.path().join("missing.yaml")).await.unwrap_err();
        assert!(matches!(err, TemplateError::Io(_)));
    }
}
