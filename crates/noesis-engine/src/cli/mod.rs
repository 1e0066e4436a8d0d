// crates/noesis-engine/src/cli/mod.rs
// CLI surface: run the MCP server, invoke one tool directly, drive a
// workflow from a definition file, or inspect configuration.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

pub mod config;
pub mod serve;
pub mod tool;
pub mod workflow;

pub use config::run_config;
pub use serve::run_mcp_server;
pub use tool::run_tool;
pub use workflow::run_workflow;

#[derive(Parser)]
#[command(name = "noesis")]
#[command(about = "Cognitive-tool orchestration engine: MCP tool registry, dispatcher and DAG workflow engine")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run as an MCP server over stdio (default)
    Serve,

    /// Invoke one registered tool directly, bypassing MCP
    Tool {
        /// Tool name (e.g. echo, concat)
        #[arg(index = 1)]
        name: String,

        /// JSON arguments (e.g. '{"text": "hi"}')
        #[arg(index = 2)]
        args: String,
    },

    /// Drive a workflow run from the command line
    Workflow {
        #[command(subcommand)]
        action: WorkflowAction,
    },

    /// Inspect environment-derived configuration
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand)]
pub enum WorkflowAction {
    /// Start a workflow from a JSON definition file and print its outcome
    Run {
        /// Path to a JSON file containing {definition, input}
        path: PathBuf,

        /// Return immediately with a run_id instead of blocking for completion
        #[arg(long)]
        detach: bool,
    },

    /// Print the current status of a run (only useful against a long-lived `serve` process' store)
    Status {
        /// The run_id printed by `workflow run --detach`
        run_id: String,
    },

    /// Request cancellation of a run
    Cancel {
        /// The run_id printed by `workflow run --detach`
        run_id: String,
    },
}

#[derive(Subcommand)]
pub enum ConfigAction {
    /// Print the resolved configuration (env vars read, values in effect)
    Show,
    /// Validate configuration and print warnings/errors
    Validate,
}

/// Default sqlite database path used when `NOESIS_DB_PATH` is unset.
pub fn default_db_path() -> PathBuf {
    let home = dirs::home_dir().unwrap_or_else(|| PathBuf::from("."));
    home.join(".noesis/noesis.db")
}
