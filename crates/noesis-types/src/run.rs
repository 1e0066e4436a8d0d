//! Run-time state: one tool invocation's outcome (`ToolResult`), one node's
//! lifecycle (`NodeState`), and a whole workflow execution (`WorkflowRun`)
//! (§3).

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error_kind::ErrorKind;
use crate::schema::ValidationError;
use crate::value::Value;
use crate::workflow_def::WorkflowDefinition;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ToolResultStatus {
    Ok,
    ValidationError,
    HandlerError,
    Timeout,
    Cancelled,
}

/// The dispatcher's single unit of output (§3, §4.D step 6).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolResult {
    pub status: ToolResultStatus,
    /// Present iff `status == Ok`; always validated against the tool's
    /// output schema before being set (§3).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_kind: Option<ErrorKind>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
    #[serde(default)]
    pub error_details: Vec<ValidationError>,
    pub duration_millis: u64,
    pub produced_at: DateTime<Utc>,
}

impl ToolResult {
    pub fn ok(output: Value, duration_millis: u64) -> Self {
        ToolResult {
            status: ToolResultStatus::Ok,
            output: Some(output),
            error_kind: None,
            error_message: None,
            error_details: Vec::new(),
            duration_millis,
            produced_at: Utc::now(),
        }
    }

    pub fn failed(
        status: ToolResultStatus,
        kind: ErrorKind,
        message: impl Into<String>,
        details: Vec<ValidationError>,
        duration_millis: u64,
    ) -> Self {
        ToolResult {
            status,
            output: None,
            error_kind: Some(kind),
            error_message: Some(message.into()),
            error_details: details,
            duration_millis,
            produced_at: Utc::now(),
        }
    }

    pub fn is_ok(&self) -> bool {
        self.status == ToolResultStatus::Ok
    }
}

/// §3 node lifecycle: `waiting -> ready -> running -> (succeeded | failed |
/// skipped)`; a failed node with retries remaining re-enters `ready`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum NodeStatus {
    Waiting,
    Ready,
    Running,
    Succeeded,
    Failed,
    Skipped,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NodeState {
    pub node_id: String,
    pub status: NodeStatus,
    pub attempts: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<ToolResult>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub started_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub finished_at: Option<DateTime<Utc>>,
    pub depends_on: Vec<String>,
}

impl NodeState {
    pub fn waiting(node_id: impl Into<String>, depends_on: Vec<String>) -> Self {
        NodeState {
            node_id: node_id.into(),
            status: NodeStatus::Waiting,
            attempts: 0,
            result: None,
            started_at: None,
            finished_at: None,
            depends_on,
        }
    }
}

/// §3: `succeeded` iff every node is `succeeded` or (by-design) `skipped`;
/// `failed` iff at least one node is `failed` and propagates; `partial` iff
/// a mix of `succeeded` and `onError=continue` `failed` nodes; `cancelled`
/// only via explicit cancellation. `Cancelling` is the transitional state
/// between a `workflow/cancel` request and the last in-flight node
/// returning (§4.E.2).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum RunStatus {
    Pending,
    Running,
    Cancelling,
    Succeeded,
    Failed,
    Cancelled,
    Partial,
}

impl RunStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            RunStatus::Succeeded | RunStatus::Failed | RunStatus::Cancelled | RunStatus::Partial
        )
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkflowRun {
    pub run_id: Uuid,
    pub definition: WorkflowDefinition,
    pub workflow_input: Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub started_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
    pub status: RunStatus,
    pub node_states: BTreeMap<String, NodeState>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn terminal_statuses_are_exactly_the_documented_four() {
        assert!(RunStatus::Succeeded.is_terminal());
        assert!(RunStatus::Failed.is_terminal());
        assert!(RunStatus::Cancelled.is_terminal());
        assert!(RunStatus::Partial.is_terminal());
        assert!(!RunStatus::Pending.is_terminal());
        assert!(!RunStatus::Running.is_terminal());
        assert!(!RunStatus::Cancelling.is_terminal());
    }
}
