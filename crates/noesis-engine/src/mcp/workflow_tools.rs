// crates/noesis-engine/src/mcp/workflow_tools.rs
// Argument schemas and (de)serialization for the three workflow meta-tools
// (§6 `workflow/run`, `workflow/status`, `workflow/cancel`). These aren't
// `ToolSpec`s in the registry — they front the `WorkflowEngine` directly,
// because a `WorkflowRun` carries far more structure (`NodeState` per node)
// than the generic `ToolResult` a registry handler returns.

use std::collections::BTreeMap;

use noesis_types::{Field, Schema, WorkflowDefinition, WorkflowRun};
use rmcp::model::{ErrorData, Tool};
use serde::Deserialize;
use serde_json::{json, Map, Value};
use uuid::Uuid;

use super::jsonschema::render_as_object;
use super::{WORKFLOW_CANCEL_TOOL, WORKFLOW_RUN_TOOL, WORKFLOW_STATUS_TOOL};

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunArgs {
    pub definition: WorkflowDefinition,
    #[serde(default)]
    pub input: Value,
    /// `true` (default) returns `runId` immediately; `false` blocks until
    /// the run reaches a terminal status (§6 "defaults to `true`" — see
    /// `DESIGN.md` for why this resolves the open question the same way).
    #[serde(default = "default_async")]
    pub r#async: bool,
}

fn default_async() -> bool {
    true
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusArgs {
    pub run_id: Uuid,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CancelArgs {
    pub run_id: Uuid,
}

pub fn parse_args<T: serde::de::DeserializeOwned>(arguments: Option<&Map<String, Value>>) -> Result<T, ErrorData> {
    let value = arguments.cloned().map(Value::Object).unwrap_or(Value::Null);
    serde_json::from_value(value).map_err(|e| ErrorData::invalid_params(format!("invalid arguments: {e}"), None))
}

pub fn run_status_value(run: &WorkflowRun) -> Value {
    json!({
        "runId": run.run_id,
        "status": run.status,
        "startedAt": run.started_at,
        "completedAt": run.completed_at,
        "nodeStates": run.node_states,
    })
}

fn run_input_schema() -> Schema {
    Schema::object(BTreeMap::from([
        (
            "definition".to_string(),
            Field::required(Schema::Object { fields: BTreeMap::new(), closed: false })
                .describe("a WorkflowDefinition: {name, version, nodes, edges, defaultRetryPolicy, maxParallelism}"),
        ),
        (
            "input".to_string(),
            Field::optional(Schema::Object { fields: BTreeMap::new(), closed: false })
                .describe("workflow-level input, resolvable via ${input.<path>}"),
        ),
        (
            "async".to_string(),
            Field::optional(Schema::Boolean)
                .describe("true (default): return runId immediately. false: block until terminal."),
        ),
    ]))
}

fn run_id_input_schema() -> Schema {
    Schema::object(BTreeMap::from([(
        "runId".to_string(),
        Field::required(Schema::string()).describe("the run_id returned by workflow_run"),
    )]))
}

pub fn meta_tools() -> Vec<Tool> {
    vec![
        Tool::new(WORKFLOW_RUN_TOOL, "Starts a workflow run from a DAG definition.", render_as_object(&run_input_schema())),
        Tool::new(
            WORKFLOW_STATUS_TOOL,
            "Returns the current status and per-node state of a workflow run.",
            render_as_object(&run_id_input_schema()),
        ),
        Tool::new(
            WORKFLOW_CANCEL_TOOL,
            "Requests cancellation of a running workflow. Idempotent.",
            render_as_object(&run_id_input_schema()),
        ),
    ]
}
