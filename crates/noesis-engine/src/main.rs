// crates/noesis-engine/src/main.rs
// Noesis CLI entrypoint.

mod cli;

use anyhow::Result;
use clap::Parser;
use tracing::Level;
use tracing_subscriber::FmtSubscriber;

use cli::{Cli, Commands};

#[tokio::main]
async fn main() -> Result<()> {
    if let Err(e) = dotenvy::dotenv() {
        tracing::debug!("no .env file loaded: {e}");
    }

    let cli = Cli::parse();

    // Logging always goes to stderr: `serve` speaks MCP over stdio, and
    // anything written to stdout there corrupts the protocol stream.
    let default_level = match &cli.command {
        Some(Commands::Serve) | None => Level::WARN,
        Some(Commands::Tool { .. }) => Level::WARN,
        Some(Commands::Workflow { .. }) => Level::INFO,
        Some(Commands::Config { .. }) => Level::WARN,
    };
    let level = std::env::var("NOESIS_LOG")
        .ok()
        .and_then(|v| v.parse::<Level>().ok())
        .unwrap_or(default_level);

    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_writer(std::io::stderr)
        .with_ansi(false)
        .finish();
    let _ = tracing::subscriber::set_global_default(subscriber);

    match cli.command {
        None | Some(Commands::Serve) => cli::run_mcp_server().await?,
        Some(Commands::Tool { name, args }) => cli::run_tool(name, args).await?,
        Some(Commands::Workflow { action }) => cli::run_workflow(action).await?,
        Some(Commands::Config { action }) => cli::run_config(action)?,
    }

    Ok(())
}
