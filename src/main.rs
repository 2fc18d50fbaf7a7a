//! # dialog-flow
//!
//! Runs a branching questionnaire in the terminal on top of the
//! `dialog-flow` engine.
//!
//! ## Quick Start
//! ```bash
//! cargo run -- --participant ada
//! ```

// =============================================================================
// MODULE DECLARATIONS
// =============================================================================
/// Configuration management
mod config;

/// Terminal channel and collector
mod console;

/// The demo flow
mod questionnaire;

// =============================================================================
// IMPORTS
// =============================================================================
use anyhow::{Context, Result};
use clap::Parser;
use dialog_flow::{render_mermaid, render_mermaid_with_trace, FlowError, FlowRunner};
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

use crate::config::AppConfig;
use crate::console::ConsoleChannel;
use crate::questionnaire::Profile;

// =============================================================================
// CLI ARGUMENTS
// =============================================================================
#[derive(Parser, Debug)]
#[command(
    name = "dialog-flow",
    version = "0.1.0",
    about = "Answer a short branching questionnaire in the terminal",
    long_about = r#"
Runs a small conversational flow: it asks for your name and age, then
branches on the answer. Every line you type is a reply.

Type the exit token (default "exit") or close stdin (Ctrl-D) to leave.
If you don't answer in time the conversation ends due to inactivity.

EXAMPLES:
  # Default settings
  dialog-flow

  # Shorter timeout and a custom exit word
  dialog-flow --timeout-ms 15000 --exit-token quit

  # Print the flow as a Mermaid diagram after the run
  dialog-flow --diagram
"#
)]
struct Args {
    /// Participant name replies are attributed to (overrides DIALOG_FLOW_PARTICIPANT)
    #[arg(short = 'p', long = "participant", help = "Participant name")]
    participant: Option<String>,

    /// Reply deadline per question (overrides DIALOG_FLOW_TIMEOUT_MS)
    #[arg(
        short = 't',
        long = "timeout-ms",
        help = "Milliseconds to wait for each answer",
        value_name = "MS"
    )]
    timeout_ms: Option<u64>,

    /// Reply that ends the conversation (overrides DIALOG_FLOW_EXIT_TOKEN)
    #[arg(short = 'x', long = "exit-token", help = "Reply that ends the conversation")]
    exit_token: Option<String>,

    /// Print the flow diagram with visited nodes marked
    #[arg(
        short = 'd',
        long = "diagram",
        help = "Print a Mermaid diagram of the flow",
        default_value = "false"
    )]
    diagram: bool,

    /// Verbose output (debug logging)
    #[arg(
        short = 'v',
        long = "verbose",
        help = "Enable verbose/debug logging",
        default_value = "false"
    )]
    verbose: bool,
}

// =============================================================================
// MAIN FUNCTION
// =============================================================================
#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    init_logging(args.verbose)?;

    let mut config = AppConfig::from_env()?;

    if let Some(participant) = args.participant {
        config.participant = participant;
    }
    if let Some(millis) = args.timeout_ms {
        config.flow.collect_timeout = Duration::from_millis(millis);
    }
    if let Some(token) = args.exit_token {
        config.flow.exit_token = token;
    }

    config.validate()?;

    let root = questionnaire::build();
    let channel = Arc::new(
        ConsoleChannel::stdio(config.participant.clone()).context("Failed to open the console")?,
    );

    info!(
        participant = %channel.participant(),
        timeout = ?config.flow.collect_timeout,
        exit_token = %config.flow.exit_token,
        "Configuration loaded"
    );

    let mut runner =
        FlowRunner::with_config(Profile::default(), channel.clone(), config.flow.clone());

    let result = runner.run(&root, channel.as_ref()).await;

    if args.diagram {
        let diagram = if runner.trace().is_empty() {
            render_mermaid(&root)
        } else {
            render_mermaid_with_trace(&root, &runner)
        };
        println!("\n{}", diagram);
    }

    match result {
        Ok(run) => {
            println!("\n{}", "=".repeat(60));
            println!("ANSWERS");
            println!("{}\n", "=".repeat(60));
            println!("{}", serde_json::to_string_pretty(&run.data)?);
            info!(visited = run.visited.len(), "Questionnaire completed");
            Ok(())
        }
        // Leaving is a normal way to end the conversation
        Err(FlowError::VoluntaryExit { node }) => {
            info!(node = %node, "Participant left");
            Ok(())
        }
        Err(e) => {
            error!(error = %e, "Questionnaire failed");
            eprintln!("\nQuestionnaire ended: {}", e);
            Err(e.into())
        }
    }
}

// =============================================================================
// LOGGING INITIALIZATION
// =============================================================================
/// Initialize the tracing subscriber.
///
/// `--verbose` forces debug output; otherwise `RUST_LOG` applies, falling
/// back to info. Logs go to stderr so they never interleave with the
/// conversation on stdout.
fn init_logging(verbose: bool) -> Result<()> {
    let filter = if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };

    let subscriber = FmtSubscriber::builder()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_names(false)
        .with_file(false)
        .with_line_number(false)
        .with_writer(std::io::stderr)
        .finish();

    tracing::subscriber::set_global_default(subscriber)
        .map_err(|e| anyhow::anyhow!("Failed to set logging subscriber: {}", e))?;

    Ok(())
}
