// crates/noesis-engine/src/store/mod.rs
// Session Store (§4.B): append-only session log plus workflow-run snapshots.
// Interface only here; two backends ship behind it (§6 "A valid minimum
// implementation is an in-memory map for tests").

mod memory;
mod sqlite;

pub use memory::InMemorySessionStore;
pub use sqlite::SqliteSessionStore;

use async_trait::async_trait;
use noesis_types::{SessionStep, WorkflowRun};
use uuid::Uuid;

use crate::error::Result;

/// Options for reading back a session's steps (§4.B `ReadSession`).
#[derive(Debug, Clone, Default)]
pub struct ReadOptions {
    pub branch_id: Option<String>,
}

/// Pluggable append-only log of session steps and workflow-run snapshots
/// (§4.B). Implementations must provide the guarantees in §4.B verbatim:
/// durability is visible to readers immediately after `append_step`
/// returns, step numbers are strictly increasing within a
/// `(session_id, branch_id)` pair, and `save_run_snapshot` is atomic.
#[async_trait]
pub trait SessionStore: Send + Sync {
    /// Appends one step, returning its assigned monotonic step number.
    /// Rejects a step whose `revises_step` or `branch_from_step` does not
    /// already exist in this session (§4.B).
    async fn append_step(&self, step: SessionStep) -> Result<u64>;

    async fn read_session(&self, session_id: &str, opts: ReadOptions) -> Result<Vec<SessionStep>>;

    /// Overwrite-in-place, atomic (§4.B): an interrupted save must never
    /// leave a partial record observable.
    async fn save_run_snapshot(&self, run: &WorkflowRun) -> Result<()>;

    async fn load_run(&self, run_id: Uuid) -> Result<Option<WorkflowRun>>;

    /// Runs in a non-terminal status, for crash recovery on startup
    /// (§4.E.5).
    async fn list_active_runs(&self) -> Result<Vec<Uuid>>;
}

/// Shared numbering/validation logic used by both backends so the §3/§4.B
/// invariants can't drift between an in-memory test double and the
/// production SQLite store: each backend only does the row I/O, this
/// function decides whether a step is even acceptable and what step number
/// it gets.
pub(crate) fn next_step_number(
    existing: &[SessionStep],
    step: &SessionStep,
) -> Result<u64> {
    use crate::error::EngineError;

    let in_branch: Vec<&SessionStep> = existing
        .iter()
        .filter(|s| s.branch_id == step.branch_id)
        .collect();

    if let Some(revises) = step.revises_step {
        if !in_branch.iter().any(|s| s.step_number == revises) {
            return Err(EngineError::NotFound(format!(
                "cannot revise step {revises}: it does not exist in this branch"
            )));
        }
    }
    if let Some(branch_from) = step.branch_from_step {
        let parent_branch_has_step = existing
            .iter()
            .any(|s| s.step_number == branch_from && s.branch_id != step.branch_id);
        let same_branch_has_step = in_branch.iter().any(|s| s.step_number == branch_from);
        if !parent_branch_has_step && !same_branch_has_step {
            return Err(EngineError::NotFound(format!(
                "cannot branch from step {branch_from}: it does not exist"
            )));
        }
    }

    Ok(in_branch.len() as u64 + 1)
}
