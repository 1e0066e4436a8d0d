//! Progressive session state (§3 `SessionLog`). Steps are append-only;
//! branches and revisions are new steps that point at an earlier one, never
//! mutations of it.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::value::Value;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum StepKind {
    AnalyzerStep,
    Branch,
    Revision,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionStep {
    pub session_id: String,
    /// Monotonic within `(session_id, branch_id)`, 1-based (§3, §4.B).
    pub step_number: u64,
    pub kind: StepKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub branch_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub revises_step: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub branch_from_step: Option<u64>,
    pub payload: Value,
    pub created_at: DateTime<Utc>,
    /// Carried for forward compatibility with semantic session search
    /// (§9 open question); never populated or queried by this engine.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub vector_embedding: Option<Vec<f32>>,
}
