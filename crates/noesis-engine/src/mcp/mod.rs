// crates/noesis-engine/src/mcp/mod.rs
// The MCP Surface (§4.F): exposes the Tool Registry and Workflow Engine to
// any MCP client over `ServerHandler`. Tools are registered at runtime, so
// unlike a `#[tool_router]`-generated server, listing and dispatch here are
// built by hand from whatever `ToolRegistry` currently holds.

pub mod handler;
mod jsonschema;
mod workflow_tools;

use std::sync::Arc;
use std::time::Duration;

use crate::dispatcher::Dispatcher;
use crate::registry::ToolRegistry;
use crate::store::SessionStore;
use crate::workflow::WorkflowEngine;

/// Names reserved for the workflow meta-tools (§6 `workflow/run`,
/// `workflow/status`, `workflow/cancel`). A registered tool under one of
/// these names would be unreachable, so `NoesisServer` refuses to list or
/// dispatch to it — the registry itself stays agnostic of the reservation.
pub const WORKFLOW_RUN_TOOL: &str = "workflow_run";
pub const WORKFLOW_STATUS_TOOL: &str = "workflow_status";
pub const WORKFLOW_CANCEL_TOOL: &str = "workflow_cancel";

fn is_reserved(name: &str) -> bool {
    matches!(name, WORKFLOW_RUN_TOOL | WORKFLOW_STATUS_TOOL | WORKFLOW_CANCEL_TOOL)
}

/// The MCP-facing server. Cheap to clone — every field is already
/// `Arc`/`Clone`-backed, matching `ToolRegistry` and `WorkflowEngine`'s own
/// cloning contract, so `rmcp::serve_server` can hand out a fresh handle per
/// connection without extra synchronization on our side.
#[derive(Clone)]
pub struct NoesisServer {
    registry: ToolRegistry,
    dispatcher: Arc<Dispatcher>,
    workflow: WorkflowEngine,
    store: Arc<dyn SessionStore>,
    /// Per-call timeout applied to direct `tools/call` dispatch when the
    /// caller doesn't express one of its own (workflow nodes carry their
    /// own timeouts independently — see `workflow::scheduler`).
    default_call_timeout: Duration,
}

impl NoesisServer {
    pub fn new(
        registry: ToolRegistry,
        dispatcher: Arc<Dispatcher>,
        workflow: WorkflowEngine,
        store: Arc<dyn SessionStore>,
    ) -> Self {
        NoesisServer {
            registry,
            dispatcher,
            workflow,
            store,
            default_call_timeout: Duration::from_secs(30),
        }
    }
}
