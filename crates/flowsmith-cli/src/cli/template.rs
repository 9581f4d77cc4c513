//! Template subcommands: validate, fmt and inspect.

use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use comfy_table::{presets, Cell, Color, ContentArrangement, Table};
use console::style;
use serde::Serialize;

use flowsmith_core::workflow::dag::plan_waves;
use flowsmith_core::workflow::generator::generate_template;
use flowsmith_core::workflow::parser::{parse_and_validate_with, parse_template, TemplateError};
use flowsmith_core::workflow::substitution::placeholders;
use flowsmith_core::workflow::validator::TemplateValidator;
use flowsmith_types::workflow::{Node, Template};

// ---------------------------------------------------------------------------
// Validate
// ---------------------------------------------------------------------------

/// Validation result for one file.
#[derive(Debug, Serialize)]
pub struct FileReport {
    pub file: PathBuf,
    pub valid: bool,
    pub errors: Vec<String>,
}

/// Read, parse and validate one file. Never fails; problems land in the report.
pub async fn check_file(path: &Path, validator: &TemplateValidator) -> FileReport {
    let errors = match tokio::fs::read_to_string(path).await {
        Ok(text) => match parse_and_validate_with(&text, validator) {
            Ok(_) => Vec::new(),
            Err(TemplateError::ValidationFailed(errors)) => {
                errors.iter().map(ToString::to_string).collect()
            }
            Err(e) => vec![e.to_string()],
        },
        Err(e) => vec![format!("cannot read file: {e}")],
    };
    FileReport {
        file: path.to_path_buf(),
        valid: errors.is_empty(),
        errors,
    }
}

pub async fn handle_validate(
    files: &[PathBuf],
    validator: &TemplateValidator,
    json: bool,
    quiet: bool,
) -> Result<()> {
    let mut reports = Vec::with_capacity(files.len());
    for file in files {
        reports.push(check_file(file, validator).await);
    }
    let failed = reports.iter().filter(|r| !r.valid).count();

    if json {
        println!("{}", serde_json::to_string_pretty(&reports)?);
    } else {
        for report in &reports {
            if report.valid {
                if !quiet {
                    println!(
                        "  {} {}",
                        style("✓").green(),
                        style(report.file.display()).cyan()
                    );
                }
            } else {
                eprintln!(
                    "  {} {}",
                    style("✗").red(),
                    style(report.file.display()).cyan()
                );
                for error in &report.errors {
                    eprintln!("      {}", style(error).red());
                }
            }
        }
    }

    if failed > 0 {
        bail!("{failed} of {} workflow file(s) failed validation", reports.len());
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Fmt
// ---------------------------------------------------------------------------

/// Canonical form of workflow text.
pub fn format_text(text: &str) -> Result<String> {
    let template = parse_template(text)?;
    Ok(generate_template(&template)?)
}

pub async fn handle_fmt(file: &Path, write: bool, quiet: bool) -> Result<()> {
    let text = tokio::fs::read_to_string(file)
        .await
        .with_context(|| format!("failed to read {}", file.display()))?;
    let formatted =
        format_text(&text).with_context(|| format!("failed to format {}", file.display()))?;

    if !write {
        print!("{formatted}");
        return Ok(());
    }

    if formatted == text {
        if !quiet {
            println!("  {} already formatted", style(file.display()).cyan());
        }
        return Ok(());
    }
    tokio::fs::write(file, &formatted)
        .await
        .with_context(|| format!("failed to write {}", file.display()))?;
    if !quiet {
        println!(
            "  {} Formatted {}",
            style("*").green().bold(),
            style(file.display()).cyan()
        );
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Inspect
// ---------------------------------------------------------------------------

/// Node ids grouped by the wave they would run in if every route were taken.
pub fn wave_ids(template: &Template) -> Result<Vec<Vec<String>>> {
    let waves = plan_waves(template)?;
    Ok(waves
        .into_iter()
        .map(|wave| wave.into_iter().map(|n| n.id.clone()).collect())
        .collect())
}

pub async fn handle_inspect(file: &Path, validator: &TemplateValidator, json: bool) -> Result<()> {
    let text = tokio::fs::read_to_string(file)
        .await
        .with_context(|| format!("failed to read {}", file.display()))?;
    let template = parse_and_validate_with(&text, validator)
        .with_context(|| format!("invalid workflow {}", file.display()))?;
    let waves = wave_ids(&template)?;

    if json {
        let out = serde_json::json!({
            "template": template,
            "waves": waves,
        });
        println!("{}", serde_json::to_string_pretty(&out)?);
        return Ok(());
    }

    println!();
    println!(
        "  {} {} (v{})",
        style("Workflow:").bold(),
        style(&template.name).cyan(),
        template.version
    );
    println!("  {}", style(&template.description).dim());
    if !template.triggers.is_empty() {
        let triggers: Vec<&str> = template.triggers.iter().map(|t| t.as_str()).collect();
        println!("  Triggers: {}", triggers.join(", "));
    }
    println!();

    let mut table = Table::new();
    table
        .load_preset(presets::UTF8_FULL_CONDENSED)
        .set_content_arrangement(ContentArrangement::Dynamic)
        .set_header(vec![
            Cell::new("Wave").fg(Color::Cyan),
            Cell::new("Node"),
            Cell::new("Capability"),
            Cell::new("Depends on"),
            Cell::new("Group"),
            Cell::new("Timeout"),
            Cell::new("Placeholders"),
        ]);

    for (wave, ids) in waves.iter().enumerate() {
        for node in ids.iter().filter_map(|id| template.node(id)) {
            table.add_row(vec![
                Cell::new(wave),
                Cell::new(&node.id),
                capability_cell(node),
                Cell::new(node.depends_on.join(", ")),
                Cell::new(node.parallel_group.as_deref().unwrap_or("-")),
                Cell::new(format!("{}s", node.timeout_secs)),
                Cell::new(placeholders(&node.instruction).join(", ")),
            ]);
        }
    }
    println!("{table}");

    if !template.conditions.is_empty() {
        let mut routes = Table::new();
        routes
            .load_preset(presets::UTF8_FULL_CONDENSED)
            .set_content_arrangement(ContentArrangement::Dynamic)
            .set_header(vec![
                Cell::new("From").fg(Color::Cyan),
                Cell::new("Rule"),
                Cell::new("Target"),
            ]);
        for edge in &template.conditions {
            for rule in &edge.rules {
                routes.add_row(vec![
                    Cell::new(&edge.from),
                    Cell::new(format!("{} {} {}", rule.field, rule.operator.token(), rule.value)),
                    Cell::new(&rule.target),
                ]);
            }
            routes.add_row(vec![
                Cell::new(&edge.from),
                Cell::new("default").fg(Color::DarkGrey),
                Cell::new(&edge.default),
            ]);
        }
        println!();
        println!("{routes}");
    }
    println!();

    Ok(())
}

fn capability_cell(node: &Node) -> Cell {
    let label = match (&node.tool_name, &node.sub_workflow_name) {
        (Some(tool), _) => format!("{} ({tool})", node.capability),
        (_, Some(name)) => format!("{} ({name})", node.capability),
        _ => node.capability.to_string(),
    };
    if node.capability.is_builtin_agent() {
        Cell::new(label).fg(Color::Green)
    } else {
        Cell::new(label).fg(Color::Yellow)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const PIPELINE: &str = r#"
name: research-report
version: "1"
description: research then write
nodes:
  - research: {capability: researcher, instruction: "Research {topic}"}
  - analyze: {capability: analyst, instruction: "Analyze {research}", depends_on: [research]}
  - write: {capability: writer, instruction: "Write {analyze}", depends_on: [analyze]}
"#;

    #[tokio::test]
    async fn test_check_file_reports_each_problem() {
        let dir = tempfile::tempdir().unwrap();
        let good = dir.path().join("good.yaml");
        let bad = dir.path().join("bad.yaml");
        tokio::fs::write(&good, PIPELINE).await.unwrap();
        tokio::fs::write(
            &bad,
            "name: bad\nversion: '1'\ndescription: x\nnodes:\n  - a: {capability: writer, instruction: a, depends_on: [ghost]}\n  - a: {capability: writer, instruction: b}\n",
        )
        .await
        .unwrap();

        let validator = TemplateValidator::new();
        assert!(check_file(&good, &validator).await.valid);
        let report = check_file(&bad, &validator).await;
        assert!(!report.valid);
        assert!(report.errors.len() >= 2);

        let missing = check_file(&dir.path().join("none.yaml"), &validator).await;
        assert!(missing.errors[0].starts_with("cannot read file"));
    }

    #[tokio::test]
    async fn test_validate_fails_when_any_file_is_invalid() {
        let dir = tempfile::tempdir().unwrap();
        let bad = dir.path().join("bad.yaml");
        tokio::fs::write(&bad, "name: bad\n").await.unwrap();
        let err = handle_validate(&[bad], &TemplateValidator::new(), true, true)
            .await
            .unwrap_err();
        assert!(err.to_string().contains("1 of 1"));
    }

    #[test]
    fn test_format_is_idempotent() {
        let once = format_text(PIPELINE).unwrap();
        let twice = format_text(&once).unwrap();
        assert_eq!(once, twice);
        assert!(once.starts_with("name: research-report"));
    }

    #[tokio::test]
    async fn test_fmt_write_rewrites_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("wf.yaml");
        tokio::fs::write(&path, PIPELINE).await.unwrap();
        handle_fmt(&path, true, true).await.unwrap();
        let written = tokio::fs::read_to_string(&path).await.unwrap();
        assert_eq!(written, format_text(PIPELINE).unwrap());
    }

    #[test]
    fn test_wave_ids() {
        let template = parse_template(PIPELINE).unwrap();
        assert_eq!(
            wave_ids(&template).unwrap(),
            vec![vec!["research"], vec!["analyze"], vec!["write"]]
        );
    }
}
