//! Progress events (§4.E.6). Best-effort, at-most-once; the persisted
//! `WorkflowRun` snapshot is always the source of truth, never the event
//! stream.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::value::Value;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum WorkflowEventKind {
    NodeReady,
    NodeRunning,
    NodeSucceeded,
    NodeFailed,
    NodeSkipped,
    RunStatusChanged,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkflowEvent {
    pub run_id: Uuid,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub node_id: Option<String>,
    pub kind: WorkflowEventKind,
    pub timestamp: DateTime<Utc>,
    #[serde(default)]
    pub detail: Value,
}
