// crates/noesis-engine/src/workflow/test_support.rs
// Shared fixtures for tests elsewhere in the crate (store backends, the
// dispatcher) that need a plausible `WorkflowRun` without building a graph.

use std::collections::BTreeMap;

use noesis_types::{RunStatus, Value, WorkflowDefinition, WorkflowRun};
use uuid::Uuid;

pub fn empty_run() -> WorkflowRun {
    WorkflowRun {
        run_id: Uuid::new_v4(),
        definition: WorkflowDefinition {
            name: "empty".to_string(),
            version: "1".to_string(),
            nodes: Vec::new(),
            edges: Vec::new(),
            default_retry_policy: None,
            max_parallelism: None,
        },
        workflow_input: Value::Null,
        started_at: None,
        completed_at: None,
        status: RunStatus::Succeeded,
        node_states: BTreeMap::new(),
    }
}
