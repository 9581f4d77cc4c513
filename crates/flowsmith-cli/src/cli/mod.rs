//! CLI command definitions and dispatch for the `flowsmith` binary.
//!
//! Uses clap derive macros for argument parsing. Every command takes one or
//! more workflow YAML files; nothing is stored between invocations.

pub mod config;
pub mod run;
pub mod template;

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use clap_complete::Shell;

/// Author, check and dry-run Flowsmith workflow templates.
#[derive(Parser)]
#[command(name = "flowsmith", version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Output machine-readable JSON instead of styled text.
    #[arg(long, global = true)]
    pub json: bool,

    /// Suppress all output except errors.
    #[arg(long, global = true)]
    pub quiet: bool,

    /// Detailed output (-v for engine events, -vv for everything).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Path to the configuration file.
    #[arg(long, global = true, env = "FLOWSMITH_CONFIG", default_value = config::DEFAULT_CONFIG_FILE)]
    pub config: PathBuf,

    /// Write logs as JSON lines.
    #[arg(long, global = true)]
    pub log_json: bool,

    /// Export spans through OpenTelemetry (stdout exporter).
    #[arg(long, global = true)]
    pub otel: bool,

    #[command(subcommand)]
    pub command: Commands,
}

impl Cli {
    /// Log filter directive implied by `--quiet` / `-v`.
    pub fn log_filter(&self) -> &'static str {
        match self.verbose {
            0 if self.quiet => "error",
            0 => "warn",
            1 => "info,flowsmith_core=debug",
            _ => "trace",
        }
    }
}

#[derive(Subcommand)]
pub enum Commands {
    /// Parse and validate workflow files without running them.
    Validate {
        /// Workflow YAML files.
        #[arg(required = true)]
        files: Vec<PathBuf>,
    },

    /// Rewrite a workflow file in canonical form.
    Fmt {
        /// Workflow YAML file.
        file: PathBuf,

        /// Overwrite the file instead of printing to stdout.
        #[arg(long)]
        write: bool,
    },

    /// Show the parsed template and its execution waves.
    Inspect {
        /// Workflow YAML file.
        file: PathBuf,
    },

    /// Execute a workflow with dry-run agents and tools that echo their input.
    Run {
        /// Workflow YAML file.
        file: PathBuf,

        /// Runtime parameter as KEY=VALUE (VALUE is parsed as JSON when possible).
        #[arg(short, long = "param", value_name = "KEY=VALUE")]
        params: Vec<String>,

        /// Directory holding sub-workflow templates (defaults to the file's directory).
        #[arg(long)]
        templates: Option<PathBuf>,
    },

    /// Generate shell completions.
    Completions {
        /// Shell to generate completions for.
        shell: Shell,
    },
}
