//! The declarative workflow definition (§3, §6 "Workflow definition
//! (declarative form, stable)"). This is what callers submit to
//! `workflow/run`; it carries no run state.

use serde::{Deserialize, Serialize};

use crate::error_kind::ErrorKind;
use crate::value::Value;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkflowDefinition {
    pub name: String,
    pub version: String,
    pub nodes: Vec<Node>,
    /// Edges may be supplied explicitly or left empty and derived entirely
    /// from `${nodes.<id>.output...}` references in `arguments` (§3, §4.E.1).
    #[serde(default)]
    pub edges: Vec<Edge>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_retry_policy: Option<RetryPolicy>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_parallelism: Option<u32>,
}

/// An explicit dependency edge. Most workflows never need one of these —
/// reference scanning (§4.E.1) derives the same edges automatically — but
/// the wire format allows declaring a pure ordering dependency that has no
/// accompanying data reference.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Edge {
    pub from: String,
    pub to: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Node {
    pub id: String,
    pub tool: String,
    /// Template tree: literal values and `${...}` references mixed freely
    /// (§3, §4.E.3).
    pub arguments: Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout_millis: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub retry_policy: Option<RetryPolicy>,
    #[serde(default)]
    pub on_error: OnError,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub enum OnError {
    #[default]
    Fail,
    Continue,
    SkipDependents,
}

/// §4.E.4. Defaults match the "orchestrator module's numbers" the spec
/// picks over the BDD specifications (§9 open question, resolved).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub initial_backoff_millis: u64,
    pub backoff_multiplier: f64,
    pub max_backoff_millis: u64,
    pub retryable_kinds: Vec<ErrorKind>,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        RetryPolicy {
            max_attempts: 3,
            initial_backoff_millis: 200,
            backoff_multiplier: 2.0,
            max_backoff_millis: 5000,
            retryable_kinds: vec![
                ErrorKind::Timeout,
                ErrorKind::HandlerError,
                ErrorKind::StoreUnavailable,
            ],
        }
    }
}
