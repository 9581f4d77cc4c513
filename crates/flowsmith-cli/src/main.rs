//! Flowsmith command-line entry point.
//!
//! Binary name: `flowsmith`
//!
//! Parses CLI arguments, sets up logging, loads `flowsmith.toml`, then
//! dispatches to the command handler. Any failure exits non-zero with the
//! error chain on stderr.

mod cli;

use clap::Parser;
use clap_complete::generate;

use flowsmith_core::workflow::validator::TemplateValidator;
use flowsmith_observe::tracing_setup::{init_tracing, shutdown_tracing, TracingOptions};

use cli::{Cli, Commands};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Shell completions don't need logging or config
    if let Commands::Completions { shell } = &cli.command {
        let mut cmd = <Cli as clap::CommandFactory>::command();
        generate(*shell, &mut cmd, "flowsmith", &mut std::io::stdout());
        return Ok(());
    }

    let options = TracingOptions {
        json: cli.log_json,
        otel: cli.otel,
        ..TracingOptions::default()
    }
    .with_filter(cli.log_filter());
    init_tracing(&options).map_err(|e| anyhow::anyhow!("failed to initialize logging: {e}"))?;

    let config = cli::config::load_config(&cli.config).await.engine;
    let validator = TemplateValidator::with_capabilities(config.custom_capabilities.iter().cloned());

    let result = match cli.command {
        Commands::Validate { files } => {
            cli::template::handle_validate(&files, &validator, cli.json, cli.quiet).await
        }
        Commands::Fmt { file, write } => cli::template::handle_fmt(&file, write, cli.quiet).await,
        Commands::Inspect { file } => {
            cli::template::handle_inspect(&file, &validator, cli.json).await
        }
        Commands::Run {
            file,
            params,
            templates,
        } => cli::run::handle_run(&file, &params, templates, config, cli.json, cli.quiet).await,
        Commands::Completions { .. } => unreachable!("handled above"),
    };

    shutdown_tracing();
    result
}
