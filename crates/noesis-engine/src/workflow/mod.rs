// crates/noesis-engine/src/workflow/mod.rs
// Workflow Engine (§4.E): parses a workflow definition into a DAG, schedules
// nodes in topological waves with bounded parallelism, resolves input
// references, retries failed nodes, checkpoints to the Session Store, and
// streams progress events.

mod graph;
mod journal;
mod reference;
mod retry;
mod scheduler;

#[cfg(test)]
pub mod test_support;

pub use graph::WorkflowGraph;
pub use journal::{Journal, JournalEntry, JournalEntryKind};
pub use reference::{get_path, scan_references, RefTarget, ResolutionContext};

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use noesis_types::{Value, WorkflowDefinition, WorkflowEvent, WorkflowRun};
use tokio::sync::broadcast;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::dispatcher::Dispatcher;
use crate::error::{EngineError, Result};
use crate::registry::ToolRegistry;
use crate::store::SessionStore;

const EVENT_CHANNEL_CAPACITY: usize = 256;

struct RunHandle {
    state: Arc<Mutex<WorkflowRun>>,
    cancellation: CancellationToken,
    events: broadcast::Sender<WorkflowEvent>,
    journal: Arc<Mutex<Journal>>,
    /// Resolves once the scheduler loop has recorded a terminal status.
    done: Arc<tokio::sync::Notify>,
}

/// The Workflow Engine (§4.E). One instance is shared by the MCP surface;
/// each `start` call spawns its own scheduler task.
#[derive(Clone)]
pub struct WorkflowEngine {
    registry: ToolRegistry,
    dispatcher: Arc<Dispatcher>,
    store: Arc<dyn SessionStore>,
    default_workers: usize,
    handles: Arc<Mutex<HashMap<Uuid, RunHandle>>>,
}

impl WorkflowEngine {
    pub fn new(
        registry: ToolRegistry,
        dispatcher: Arc<Dispatcher>,
        store: Arc<dyn SessionStore>,
        default_workers: usize,
    ) -> Self {
        WorkflowEngine {
            registry,
            dispatcher,
            store,
            default_workers: default_workers.max(1),
            handles: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Parses and starts a workflow, returning its `run_id` immediately
    /// (§6 `workflow/run {async: true}`). Parse failures (unknown node IDs,
    /// unknown tools, cyclic references) return before any run is created
    /// (§8 Scenario 4: "no run recorded, no nodes executed").
    pub async fn start(&self, definition: WorkflowDefinition, input: Value) -> Result<Uuid> {
        let graph = WorkflowGraph::parse(definition, &self.registry)?;
        let run_id = Uuid::new_v4();
        let workers = graph
            .definition
            .max_parallelism
            .map(|n| n as usize)
            .unwrap_or(self.default_workers);

        let run = scheduler::build_initial_run(run_id, &graph, input.clone());
        let state = Arc::new(Mutex::new(run));
        let cancellation = CancellationToken::new();
        let (events, _rx) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        let done = Arc::new(tokio::sync::Notify::new());
        let journal = Arc::new(Mutex::new(Journal::default()));

        self.handles.lock().expect("handles mutex poisoned").insert(
            run_id,
            RunHandle {
                state: state.clone(),
                cancellation: cancellation.clone(),
                events: events.clone(),
                journal: journal.clone(),
                done: done.clone(),
            },
        );

        let dispatcher = self.dispatcher.clone();
        let store = self.store.clone();
        tokio::spawn(scheduler::run_loop(
            run_id,
            graph,
            input,
            state,
            cancellation,
            events,
            dispatcher,
            store,
            workers,
            done,
            journal,
        ));

        Ok(run_id)
    }

    /// Starts a workflow and blocks until it reaches a terminal status
    /// (§6 `workflow/run {async: false}`).
    pub async fn run_to_completion(&self, definition: WorkflowDefinition, input: Value) -> Result<WorkflowRun> {
        let run_id = self.start(definition, input).await?;
        self.wait_for_terminal(run_id).await
    }

    async fn wait_for_terminal(&self, run_id: Uuid) -> Result<WorkflowRun> {
        loop {
            let (state, done) = {
                let handles = self.handles.lock().expect("handles mutex poisoned");
                let handle = handles
                    .get(&run_id)
                    .ok_or_else(|| EngineError::NotFound(format!("run '{run_id}' not found")))?;
                (handle.state.clone(), handle.done.clone())
            };
            {
                let run = state.lock().expect("run state mutex poisoned");
                if run.status.is_terminal() {
                    return Ok(run.clone());
                }
            }
            done.notified().await;
        }
    }

    /// Current run state, read from the in-memory handle while running or
    /// from the store once complete and evicted (§6 `workflow/status`).
    pub async fn status(&self, run_id: Uuid) -> Result<Option<WorkflowRun>> {
        if let Some(state) = self
            .handles
            .lock()
            .expect("handles mutex poisoned")
            .get(&run_id)
            .map(|h| h.state.clone())
        {
            return Ok(Some(state.lock().expect("run state mutex poisoned").clone()));
        }
        self.store.load_run(run_id).await
    }

    /// Requests cancellation (§6 `workflow/cancel`). Idempotent: a
    /// terminal or unknown-but-persisted run is a no-op returning `true`
    /// (§5 "idempotent and returns accepted=true even for already-terminal
    /// runs").
    pub async fn cancel(&self, run_id: Uuid) -> Result<bool> {
        if let Some(cancellation) = self
            .handles
            .lock()
            .expect("handles mutex poisoned")
            .get(&run_id)
            .map(|h| h.cancellation.clone())
        {
            cancellation.cancel();
            return Ok(true);
        }
        match self.store.load_run(run_id).await? {
            Some(_) => Ok(true),
            None => Ok(false),
        }
    }

    pub fn subscribe(&self, run_id: Uuid) -> Option<broadcast::Receiver<WorkflowEvent>> {
        self.handles
            .lock()
            .expect("handles mutex poisoned")
            .get(&run_id)
            .map(|h| h.events.subscribe())
    }

    /// The in-memory audit trail for a still-resident run (§4.E.5
    /// enrichment). `None` once the run has been evicted — the journal is
    /// diagnostic and does not outlive the in-memory handle.
    pub fn journal(&self, run_id: Uuid) -> Option<Vec<JournalEntry>> {
        self.handles
            .lock()
            .expect("handles mutex poisoned")
            .get(&run_id)
            .map(|h| h.journal.lock().expect("journal mutex poisoned").entries().to_vec())
    }

    /// Drops the in-memory handle for a terminal run, leaving only the
    /// persisted snapshot behind (§3 "handed to the store for persistence
    /// and eviction from memory").
    pub fn evict(&self, run_id: Uuid) {
        self.handles.lock().expect("handles mutex poisoned").remove(&run_id);
    }

    /// Crash recovery (§4.E.5): on startup, rehydrate every run the store
    /// reports as non-terminal, mark any `running` node `ready` (its
    /// handler may or may not have completed, so it must be retried — this
    /// is the contract surfaced to tool authors: handlers must be
    /// idempotent or safely retriable), and resume scheduling.
    pub async fn recover(&self) -> Result<usize> {
        let active = self.store.list_active_runs().await?;
        let mut resumed = 0;
        for run_id in active {
            let Some(mut run) = self.store.load_run(run_id).await? else {
                continue;
            };
            for node in run.node_states.values_mut() {
                if node.status == noesis_types::NodeStatus::Running {
                    node.status = noesis_types::NodeStatus::Ready;
                }
            }

            let graph = match WorkflowGraph::parse(run.definition.clone(), &self.registry) {
                Ok(g) => g,
                Err(_) => continue,
            };

            let state = Arc::new(Mutex::new(run.clone()));
            let cancellation = CancellationToken::new();
            let (events, _rx) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
            let done = Arc::new(tokio::sync::Notify::new());
            let journal = Arc::new(Mutex::new(Journal::default()));

            self.handles.lock().expect("handles mutex poisoned").insert(
                run_id,
                RunHandle {
                    state: state.clone(),
                    cancellation: cancellation.clone(),
                    events: events.clone(),
                    journal: journal.clone(),
                    done: done.clone(),
                },
            );

            let workers = graph
                .definition
                .max_parallelism
                .map(|n| n as usize)
                .unwrap_or(self.default_workers);
            let dispatcher = self.dispatcher.clone();
            let store = self.store.clone();
            let workflow_input = run.workflow_input.clone();
            tokio::spawn(scheduler::run_loop(
                run_id,
                graph,
                workflow_input,
                state,
                cancellation,
                events,
                dispatcher,
                store,
                workers,
                done,
                journal,
            ));
            resumed += 1;
        }
        Ok(resumed)
    }
}
