//! Tool Agent - command-line entry point.
//!
//! Sends one prompt through the agent loop and prints the final answer.

use std::io::Write;

use anyhow::{bail, Context};
use clap::Parser;
use tool_agent::{agent::Agent, config::Config};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Debug, Parser)]
#[command(name = "tool-agent", version, about = "Run a prompt through a tool-calling LLM agent")]
struct Cli {
    /// Prompt to send to the LLM
    #[arg(short = 'p', long = "prompt")]
    prompt: String,

    /// Model identifier, overrides DEFAULT_MODEL
    #[arg(long)]
    model: Option<String>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Logs go to stderr; stdout carries only the answer.
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "tool_agent=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();
    if cli.prompt.trim().is_empty() {
        bail!("Prompt must not be empty");
    }

    let config = Config::from_env()?;

    let mut agent = Agent::new(&config).context("failed to create LLM client")?;
    if let Some(model) = cli.model {
        agent = agent.with_model(model);
    }
    info!("Loaded configuration: model={}", agent.model());

    let run = agent.run_task(&cli.prompt).await?;

    let mut stdout = std::io::stdout().lock();
    stdout.write_all(run.output.as_bytes())?;
    stdout.flush()?;

    Ok(())
}
