// crates/noesis-engine/src/workflow/journal.rs
// Append-only audit trail of what happened to a run and when (§4.E.5
// enrichment). The persisted `WorkflowRun` snapshot is the resumable state;
// the journal answers "what happened" for debugging a crashed or
// long-running workflow, which the snapshot alone cannot.

use chrono::{DateTime, Utc};
use noesis_types::ErrorKind;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum JournalEntryKind {
    NodeScheduled,
    NodeStarted,
    NodeCompleted,
    NodeFailed { error_kind: ErrorKind },
    NodeSkipped,
    NodeRetrying { attempt: u32, delay_millis: u64 },
    CancellationRequested,
    RunStatusChanged { from: String, to: String },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JournalEntry {
    pub run_id: Uuid,
    pub node_id: Option<String>,
    pub kind: JournalEntryKind,
    pub timestamp: DateTime<Utc>,
}

impl JournalEntry {
    pub fn new(run_id: Uuid, node_id: Option<String>, kind: JournalEntryKind) -> Self {
        JournalEntry {
            run_id,
            node_id,
            kind,
            timestamp: Utc::now(),
        }
    }
}

/// In-memory ring of journal entries per run, capped so a long-lived run
/// can't grow the journal unboundedly in a single process's memory. The
/// journal is diagnostic, not the resumable state, so dropping the oldest
/// entries under pressure is acceptable.
pub struct Journal {
    capacity: usize,
    entries: Vec<JournalEntry>,
}

impl Journal {
    pub fn new(capacity: usize) -> Self {
        Journal {
            capacity,
            entries: Vec::new(),
        }
    }

    pub fn record(&mut self, entry: JournalEntry) {
        if self.entries.len() >= self.capacity {
            self.entries.remove(0);
        }
        self.entries.push(entry);
    }

    pub fn entries(&self) -> &[JournalEntry] {
        &self.entries
    }
}

impl Default for Journal {
    fn default() -> Self {
        Self::new(1024)
    }
}
