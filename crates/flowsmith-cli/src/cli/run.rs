//! `flowsmith run`: execute a workflow against dry-run collaborators.
//!
//! Agents answer with `[<capability>] <instruction>` and tools echo their
//! request back as JSON, so a run shows exactly which instructions each node
//! would send once real collaborators are wired in.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{anyhow, Context, Result};
use comfy_table::{presets, Cell, Color, ContentArrangement, Table};
use console::style;
use serde_json::Value;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use flowsmith_core::workflow::checkpoint::InMemoryCheckpointStore;
use flowsmith_core::workflow::executor::{RunRequest, WorkflowEngine};
use flowsmith_core::workflow::invoker::{
    AgentInvoker, BoxFuture, Collaborators, InvokeError, ToolInvoker, ToolRequest,
};
use flowsmith_core::workflow::parser::parse_template_with_timeout;
use flowsmith_core::workflow::registry::{DirectorySource, TemplateRegistry};
use flowsmith_core::workflow::validator::TemplateValidator;
use flowsmith_types::config::EngineConfig;
use flowsmith_types::execution::{ExecutionTrace, NodeStatus};
use flowsmith_types::workflow::{Capability, Params};

/// Agent that answers with the instruction it was given.
pub struct DryRunAgent;

impl AgentInvoker for DryRunAgent {
    fn invoke<'a>(
        &'a self,
        capability: &'a Capability,
        instruction: &'a str,
    ) -> BoxFuture<'a, Result<String, InvokeError>> {
        Box::pin(async move { Ok(format!("[{capability}] {instruction}")) })
    }
}

/// Tool that returns its request.
pub struct DryRunTool;

impl ToolInvoker for DryRunTool {
    fn invoke(&self, request: ToolRequest) -> BoxFuture<'_, Result<Value, InvokeError>> {
        Box::pin(async move {
            serde_json::to_value(&request).map_err(|e| InvokeError::Fatal(e.to_string()))
        })
    }
}

/// Parse `KEY=VALUE`. VALUE is JSON when it parses as JSON, otherwise a string.
pub fn parse_param(raw: &str) -> Result<(String, Value)> {
    let (key, value) = raw
        .split_once('=')
        .ok_or_else(|| anyhow!("invalid parameter '{raw}': expected KEY=VALUE"))?;
    let key = key.trim();
    if key.is_empty() {
        return Err(anyhow!("invalid parameter '{raw}': empty key"));
    }
    let value = serde_json::from_str(value).unwrap_or_else(|_| Value::String(value.to_string()));
    Ok((key.to_string(), value))
}

pub fn parse_params(raw: &[String]) -> Result<Params> {
    raw.iter().map(|p| parse_param(p)).collect()
}

pub async fn handle_run(
    file: &Path,
    raw_params: &[String],
    templates: Option<PathBuf>,
    config: EngineConfig,
    json: bool,
    quiet: bool,
) -> Result<()> {
    let params = parse_params(raw_params)?;
    let text = tokio::fs::read_to_string(file)
        .await
        .with_context(|| format!("failed to read {}", file.display()))?;
    let template = parse_template_with_timeout(&text, config.default_timeout_secs)
        .with_context(|| format!("failed to parse {}", file.display()))?;

    let templates_dir = templates.unwrap_or_else(|| {
        file.parent()
            .filter(|p| !p.as_os_str().is_empty())
            .map(Path::to_path_buf)
            .unwrap_or_else(|| PathBuf::from("."))
    });

    let engine = build_engine(&templates_dir, config);
    let session_id = Uuid::now_v7();
    let cancel = CancellationToken::new();
    let on_interrupt = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            on_interrupt.cancel();
        }
    });

    tracing::info!(session_id = %session_id, workflow = template.name.as_str(), "dry run");
    let outcome = engine
        .run(
            Arc::new(template),
            RunRequest::new(params)
                .with_session(session_id)
                .with_cancel(cancel),
        )
        .await
        .with_context(|| format!("workflow {} failed", file.display()))?;

    if json {
        let out = serde_json::json!({
            "session_id": session_id,
            "output_node": outcome.output_node,
            "output": outcome.output,
            "trace": outcome.trace,
        });
        println!("{}", serde_json::to_string_pretty(&out)?);
        return Ok(());
    }

    if !quiet {
        println!();
        println!("{}", trace_table(&outcome.trace));
        for (node_id, warning) in outcome.trace.warnings() {
            println!(
                "  {} {}: {}",
                style("!").yellow().bold(),
                style(node_id).cyan(),
                style(warning).yellow()
            );
        }
        println!();
        println!(
            "  {} Output from {}",
            style("*").green().bold(),
            style(&outcome.output_node).cyan()
        );
    }
    match &outcome.output {
        Value::String(s) => println!("{s}"),
        other => println!("{}", serde_json::to_string_pretty(other)?),
    }
    Ok(())
}

fn build_engine(templates_dir: &Path, config: EngineConfig) -> WorkflowEngine {
    let validator = TemplateValidator::with_capabilities(config.custom_capabilities.iter().cloned());
    let registry = TemplateRegistry::with_source(Arc::new(DirectorySource::new(templates_dir)))
        .with_validator(validator)
        .with_default_timeout_secs(config.default_timeout_secs);
    WorkflowEngine::new(dry_run_collaborators(Arc::new(registry)), config)
        .with_checkpoints(Arc::new(InMemoryCheckpointStore::new()))
}

fn dry_run_collaborators(registry: Arc<TemplateRegistry>) -> Collaborators {
    Collaborators::new(Arc::new(DryRunAgent), Arc::new(DryRunTool), registry)
}

fn trace_table(trace: &ExecutionTrace) -> Table {
    let mut table = Table::new();
    table
        .load_preset(presets::UTF8_FULL_CONDENSED)
        .set_content_arrangement(ContentArrangement::Dynamic)
        .set_header(vec![
            Cell::new("Wave").fg(Color::Cyan),
            Cell::new("Node"),
            Cell::new("Capability"),
            Cell::new("Status"),
            Cell::new("Attempts"),
            Cell::new("Duration"),
        ]);
    add_trace_rows(&mut table, trace, "");
    table
}

/// Nested traces are listed under their node, indented by depth.
fn add_trace_rows(table: &mut Table, trace: &ExecutionTrace, indent: &str) {
    for node in &trace.nodes {
        table.add_row(vec![
            Cell::new(node.wave),
            Cell::new(format!("{indent}{}", node.node_id)),
            Cell::new(&node.capability),
            format_status(node.status),
            Cell::new(node.attempts),
            Cell::new(format!("{}ms", node.duration_ms)),
        ]);
        if let Some(sub) = &node.sub_trace {
            add_trace_rows(table, sub, &format!("{indent}  "));
        }
    }
}

fn format_status(status: NodeStatus) -> Cell {
    match status {
        NodeStatus::Completed => Cell::new("completed").fg(Color::Green),
        NodeStatus::BestEffort => Cell::new("best effort").fg(Color::Yellow),
        NodeStatus::Skipped => Cell::new("skipped").fg(Color::DarkGrey),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_param_values() {
        assert_eq!(parse_param("topic=rust").unwrap(), ("topic".into(), json!("rust")));
        assert_eq!(parse_param("limit=3").unwrap(), ("limit".into(), json!(3)));
        assert_eq!(parse_param("flags=[1,2]").unwrap(), ("flags".into(), json!([1, 2])));
        assert_eq!(parse_param("q=a=b").unwrap(), ("q".into(), json!("a=b")));
        assert_eq!(parse_param("empty=").unwrap(), ("empty".into(), json!("")));
        assert!(parse_param("novalue").is_err());
        assert!(parse_param("=x").is_err());
    }

    #[test]
    fn test_later_params_override_earlier() {
        let params = parse_params(&["a=1".to_string(), "a=2".to_string()]).unwrap();
        assert_eq!(params.get("a"), Some(&json!(2)));
    }

    #[tokio::test]
    async fn test_dry_run_collaborators_echo() {
        let agent = DryRunAgent;
        let reply = agent.invoke(&Capability::Writer, "Write it").await.unwrap();
        assert_eq!(reply, "[writer] Write it");

        let request = ToolRequest {
            tool_name: "search".into(),
            instruction: "find".into(),
            params: Params::new(),
        };
        let value = DryRunTool.invoke(request).await.unwrap();
        assert_eq!(value["tool_name"], json!("search"));
    }

    #[tokio::test]
    async fn test_run_resolves_sub_workflows_from_directory() {
        let dir = tempfile::tempdir().unwrap();
        tokio::fs::write(
            dir.path().join("summarize.yaml"),
            "name: summarize\nversion: '1'\ndescription: s\nnodes:\n  - s: {capability: writer, instruction: \"Summarize {text}\"}\n",
        )
        .await
        .unwrap();
        let main = dir.path().join("main.yaml");
        tokio::fs::write(
            &main,
            "name: main\nversion: '1'\ndescription: m\nnodes:\n  - r: {capability: researcher, instruction: \"Research {topic}\"}\n  - d: {capability: sub_workflow, sub_workflow_name: summarize, sub_workflow_params: {text: \"{r}\"}, depends_on: [r]}\n",
        )
        .await
        .unwrap();

        handle_run(&main, &["topic=rust".to_string()], None, EngineConfig::default(), true, true)
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_run_reports_invalid_workflow() {
        let dir = tempfile::tempdir().unwrap();
        let main = dir.path().join("main.yaml");
        tokio::fs::write(
            &main,
            "name: main\nversion: '1'\ndescription: m\nnodes:\n  - a: {capability: wizard, instruction: x}\n",
        )
        .await
        .unwrap();
        let err = handle_run(&main, &[], None, EngineConfig::default(), true, true)
            .await
            .unwrap_err();
        assert!(format!("{err:#}").contains("wizard"));
    }
}
