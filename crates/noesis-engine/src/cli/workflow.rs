// crates/noesis-engine/src/cli/workflow.rs
// CLI driver for the workflow engine, standalone from MCP. `status` and
// `cancel` only see what this process's in-memory engine knows about, so
// they're only useful immediately after a `run --detach` in the same
// invocation's lifetime — against a real deployment, status/cancel go
// through the MCP `workflow_status`/`workflow_cancel` tools instead.

use std::path::PathBuf;

use anyhow::Result;
use noesis_types::{Value, WorkflowDefinition};
use serde::Deserialize;
use uuid::Uuid;

use super::serve::build_in_memory;
use super::WorkflowAction;

#[derive(Deserialize)]
struct RunFile {
    definition: WorkflowDefinition,
    #[serde(default)]
    input: Value,
}

pub async fn run_workflow(action: WorkflowAction) -> Result<()> {
    match action {
        WorkflowAction::Run { path, detach } => run(path, detach).await,
        WorkflowAction::Status { run_id } => status(run_id).await,
        WorkflowAction::Cancel { run_id } => cancel(run_id).await,
    }
}

async fn run(path: PathBuf, detach: bool) -> Result<()> {
    let raw = std::fs::read_to_string(&path)?;
    let run_file: RunFile = serde_json::from_str(&raw)?;

    let (_registry, _dispatcher, engine) = build_in_memory();

    if detach {
        let run_id = engine.start(run_file.definition, run_file.input).await?;
        println!("{run_id}");
    } else {
        let run = engine.run_to_completion(run_file.definition, run_file.input).await?;
        println!("{}", serde_json::to_string_pretty(&run)?);
    }
    Ok(())
}

async fn status(run_id: String) -> Result<()> {
    let _id: Uuid = run_id.parse()?;
    anyhow::bail!(
        "`workflow status` only sees runs started in the same process; it cannot reach a \
         separately running `serve` instance. Use the `workflow_status` MCP tool against a live server instead."
    );
}

async fn cancel(run_id: String) -> Result<()> {
    let _id: Uuid = run_id.parse()?;
    anyhow::bail!(
        "`workflow cancel` only sees runs started in the same process; it cannot reach a \
         separately running `serve` instance. Use the `workflow_cancel` MCP tool against a live server instead."
    );
}
