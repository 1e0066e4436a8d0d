// crates/noesis-engine/src/cli/tool.rs
// Direct tool execution from the CLI, bypassing MCP entirely: build one
// `ToolCall` from the command line and print the `ToolResult` as JSON.

use anyhow::{bail, Result};

use crate::dispatcher::ToolCall;

use super::serve::build_in_memory;

pub async fn run_tool(name: String, args: String) -> Result<()> {
    let arguments: serde_json::Value = serde_json::from_str(&args)?;
    if !arguments.is_object() && !arguments.is_null() {
        bail!("tool arguments must be a JSON object, got: {args}");
    }

    let (registry, dispatcher, _engine) = build_in_memory();
    if !registry.contains(&name) {
        bail!(
            "unknown tool '{name}'. Registered tools: {}",
            registry.list().into_iter().map(|d| d.name).collect::<Vec<_>>().join(", ")
        );
    }

    let result = dispatcher.dispatch(ToolCall::new(name, arguments)).await;
    println!("{}", serde_json::to_string_pretty(&result)?);

    if !result.is_ok() {
        std::process::exit(1);
    }
    Ok(())
}
