// crates/noesis-engine/src/store/memory.rs
// In-memory `SessionStore` (§6 "a valid minimum implementation is an
// in-memory map for tests"). Backs unit tests and doctests; never used by
// the `serve` CLI command, which always runs the SQLite backend.

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use noesis_types::{SessionStep, WorkflowRun};
use uuid::Uuid;

use super::{next_step_number, ReadOptions, SessionStore};
use crate::error::Result;

#[derive(Default)]
pub struct InMemorySessionStore {
    sessions: Mutex<HashMap<String, Vec<SessionStep>>>,
    runs: Mutex<HashMap<Uuid, WorkflowRun>>,
}

impl InMemorySessionStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl SessionStore for InMemorySessionStore {
    async fn append_step(&self, mut step: SessionStep) -> Result<u64> {
        let mut sessions = self.sessions.lock().expect("session store mutex poisoned");
        let steps = sessions.entry(step.session_id.clone()).or_default();
        let number = next_step_number(steps, &step)?;
        step.step_number = number;
        steps.push(step);
        Ok(number)
    }

    async fn read_session(&self, session_id: &str, opts: ReadOptions) -> Result<Vec<SessionStep>> {
        let sessions = self.sessions.lock().expect("session store mutex poisoned");
        let mut steps = sessions.get(session_id).cloned().unwrap_or_default();
        if let Some(branch) = opts.branch_id {
            steps.retain(|s| s.branch_id.as_deref() == Some(branch.as_str()));
        }
        steps.sort_by_key(|s| s.step_number);
        Ok(steps)
    }

    async fn save_run_snapshot(&self, run: &WorkflowRun) -> Result<()> {
        let mut runs = self.runs.lock().expect("run store mutex poisoned");
        runs.insert(run.run_id, run.clone());
        Ok(())
    }

    async fn load_run(&self, run_id: Uuid) -> Result<Option<WorkflowRun>> {
        let runs = self.runs.lock().expect("run store mutex poisoned");
        Ok(runs.get(&run_id).cloned())
    }

    async fn list_active_runs(&self) -> Result<Vec<Uuid>> {
        let runs = self.runs.lock().expect("run store mutex poisoned");
        Ok(runs
            .values()
            .filter(|r| !r.status.is_terminal())
            .map(|r| r.run_id)
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use noesis_types::StepKind;
    use serde_json::json;

    fn step(session_id: &str, revises: Option<u64>) -> SessionStep {
        SessionStep {
            session_id: session_id.to_string(),
            step_number: 0,
            kind: if revises.is_some() {
                StepKind::Revision
            } else {
                StepKind::AnalyzerStep
            },
            branch_id: None,
            revises_step: revises,
            branch_from_step: None,
            payload: json!({}),
            created_at: Utc::now(),
            vector_embedding: None,
        }
    }

    #[tokio::test]
    async fn step_numbers_are_contiguous_within_a_session() {
        let store = InMemorySessionStore::new();
        for _ in 0..3 {
            store.append_step(step("s1", None)).await.unwrap();
        }
        let steps = store.read_session("s1", ReadOptions::default()).await.unwrap();
        let numbers: Vec<u64> = steps.iter().map(|s| s.step_number).collect();
        assert_eq!(numbers, vec![1, 2, 3]);
    }

    #[tokio::test]
    async fn revising_a_nonexistent_step_is_rejected() {
        let store = InMemorySessionStore::new();
        let err = store.append_step(step("s1", Some(99))).await.unwrap_err();
        assert!(matches!(err, crate::error::EngineError::NotFound(_)));
    }

    #[tokio::test]
    async fn revision_leaves_the_original_step_untouched() {
        let store = InMemorySessionStore::new();
        store.append_step(step("s1", None)).await.unwrap();
        store.append_step(step("s1", None)).await.unwrap();
        store.append_step(step("s1", Some(2))).await.unwrap();
        let steps = store.read_session("s1", ReadOptions::default()).await.unwrap();
        assert_eq!(steps.len(), 3);
        assert_eq!(steps[1].step_number, 2);
        assert_eq!(steps[2].revises_step, Some(2));
    }

    #[tokio::test]
    async fn run_snapshot_round_trips() {
        let store = InMemorySessionStore::new();
        let run = crate::workflow::test_support::empty_run();
        store.save_run_snapshot(&run).await.unwrap();
        let loaded = store.load_run(run.run_id).await.unwrap().unwrap();
        assert_eq!(loaded.run_id, run.run_id);
    }
}
