// crates/noesis-engine/src/workflow/scheduler.rs
// The wave-based topological executor (§4.E.2): one task owns
// `WorkflowRun.node_states` and mutates it only in response to messages
// workers send back over a channel (§5); workers carry out a node's
// dispatch-and-retry sequence and report only `started`/`outcome` events.

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use chrono::Utc;
use noesis_types::{
    ErrorKind, Node, NodeState, NodeStatus, OnError, RetryPolicy, RunStatus, ToolResult, Value,
    WorkflowEvent, WorkflowEventKind, WorkflowRun,
};
use serde_json::json;
use tokio::sync::{mpsc, Notify, Semaphore};
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use super::graph::WorkflowGraph;
use super::journal::{Journal, JournalEntry, JournalEntryKind};
use super::reference::ResolutionContext;
use super::retry::next_attempt_delay;
use crate::dispatcher::{Dispatcher, ToolCall};
use crate::store::SessionStore;

const DEFAULT_NODE_TIMEOUT: Duration = Duration::from_secs(30);

pub fn build_initial_run(run_id: Uuid, graph: &WorkflowGraph, input: Value) -> WorkflowRun {
    let deps = graph.all_dependencies();
    let node_states = graph
        .definition
        .nodes
        .iter()
        .map(|n| {
            (
                n.id.clone(),
                NodeState::waiting(n.id.clone(), deps.get(&n.id).cloned().unwrap_or_default()),
            )
        })
        .collect();

    let status = if graph.node_count() == 0 {
        RunStatus::Succeeded
    } else {
        RunStatus::Pending
    };
    let now = if status == RunStatus::Succeeded { Some(Utc::now()) } else { None };

    WorkflowRun {
        run_id,
        definition: graph.definition.clone(),
        workflow_input: input,
        started_at: now,
        completed_at: now,
        status,
        node_states,
    }
}

enum WorkerMsg {
    Started { node_id: String, attempt: u32 },
    Outcome { node_id: String, attempt: u32, outcome: NodeOutcome },
}

enum NodeOutcome {
    Succeeded(ToolResult),
    Retrying { result: ToolResult, delay: Duration },
    Terminal(ToolResult),
}

#[allow(clippy::too_many_arguments)]
pub async fn run_loop(
    run_id: Uuid,
    graph: WorkflowGraph,
    workflow_input: Value,
    state: Arc<Mutex<WorkflowRun>>,
    cancellation: CancellationToken,
    events: tokio::sync::broadcast::Sender<WorkflowEvent>,
    dispatcher: Arc<Dispatcher>,
    store: Arc<dyn SessionStore>,
    workers: usize,
    done: Arc<Notify>,
    journal: Arc<Mutex<Journal>>,
) {
    // Empty workflow: already terminal from `build_initial_run`.
    if graph.node_count() == 0 {
        checkpoint(&store, &state).await;
        done.notify_waiters();
        return;
    }

    {
        let mut run = state.lock().expect("run state mutex poisoned");
        run.started_at.get_or_insert(Utc::now());
        run.status = RunStatus::Running;
    }
    emit(&events, run_id, None, WorkflowEventKind::RunStatusChanged, json!({"status": "running"}));

    let default_retry = graph.definition.default_retry_policy.clone().unwrap_or_default();
    let node_by_id: HashMap<String, Node> = graph
        .definition
        .nodes
        .iter()
        .map(|n| (n.id.clone(), n.clone()))
        .collect();

    let semaphore = Arc::new(Semaphore::new(workers));
    let (tx, mut rx) = mpsc::channel::<WorkerMsg>(256);

    // Seed the ready set. On a fresh run every node starts `waiting`, so
    // this reduces to "nodes with no dependencies" (§4.E.1). On a
    // recovered run (§4.E.5) `state` already carries whatever statuses
    // survived the crash: nodes the engine had flipped `running -> ready`
    // go straight into the queue regardless of dependency count, and any
    // `waiting` node whose dependencies already satisfied before the
    // crash is promoted too, in case the crash landed between the
    // in-memory transition and its checkpoint.
    let mut ready_queue: BTreeSet<String> = BTreeSet::new();
    {
        let mut run = state.lock().expect("run state mutex poisoned");
        for node in &graph.definition.nodes {
            let deps_satisfied = graph.dependencies_of(&node.id).iter().all(|dep_id| {
                run.node_states.get(dep_id).is_some_and(|ns| match ns.status {
                    NodeStatus::Succeeded => true,
                    NodeStatus::Failed => {
                        node_by_id.get(dep_id).map(|n| n.on_error) == Some(OnError::Continue)
                    }
                    _ => false,
                })
            });
            let Some(ns) = run.node_states.get_mut(&node.id) else {
                continue;
            };
            let should_enqueue = ns.status == NodeStatus::Ready
                || (ns.status == NodeStatus::Waiting && deps_satisfied);
            if should_enqueue {
                ns.status = NodeStatus::Ready;
                ready_queue.insert(node.id.clone());
            }
        }
    }
    for node_id in &ready_queue {
        emit(&events, run_id, Some(node_id.clone()), WorkflowEventKind::NodeReady, Value::Null);
        record(&journal, run_id, Some(node_id.clone()), JournalEntryKind::NodeScheduled);
    }
    checkpoint(&store, &state).await;

    let mut outstanding: usize = 0;
    let mut stopping = false;
    let mut cancelling = false;

    loop {
        if !cancelling && !stopping {
            // Dispatch as many ready nodes as we have permits for,
            // smallest node ID first (§4.E.2 "chosen by node-ID ordering").
            loop {
                let Some(node_id) = ready_queue.iter().next().cloned() else {
                    break;
                };
                let Ok(permit) = semaphore.clone().try_acquire_owned() else {
                    break;
                };
                ready_queue.remove(&node_id);
                outstanding += 1;

                {
                    let mut run = state.lock().expect("run state mutex poisoned");
                    if let Some(ns) = run.node_states.get_mut(&node_id) {
                        ns.status = NodeStatus::Running;
                    }
                }

                let node = node_by_id[&node_id].clone();
                let policy = node.retry_policy.clone().unwrap_or_else(|| default_retry.clone());
                let dispatcher = dispatcher.clone();
                let state_for_worker = state.clone();
                let workflow_input = workflow_input.clone();
                let tx = tx.clone();
                let node_cancellation = cancellation.clone();

                tokio::spawn(async move {
                    let _permit = permit;
                    run_node_worker(node, policy, dispatcher, state_for_worker, workflow_input, node_cancellation, tx).await;
                });
            }
        } else {
            // No new scheduling once cancelling or stopping due to a
            // `Fail`-policy failure (§4.E.2); nodes left in `ready` simply
            // never run and the run ends non-`succeeded`.
            ready_queue.clear();
        }

        if outstanding == 0 && ready_queue.is_empty() {
            break;
        }

        tokio::select! {
            _ = cancellation.cancelled(), if !cancelling => {
                cancelling = true;
                let mut run = state.lock().expect("run state mutex poisoned");
                run.status = RunStatus::Cancelling;
                drop(run);
                emit(&events, run_id, None, WorkflowEventKind::RunStatusChanged, json!({"status": "cancelling"}));
                record(&journal, run_id, None, JournalEntryKind::CancellationRequested);
                checkpoint(&store, &state).await;
            }
            msg = rx.recv() => {
                let Some(msg) = msg else { break };
                handle_message(
                    msg,
                    run_id,
                    &graph,
                    &node_by_id,
                    &state,
                    &events,
                    &journal,
                    &mut ready_queue,
                    &mut outstanding,
                    &mut stopping,
                ).await;
                checkpoint(&store, &state).await;
            }
        }
    }

    let final_status = {
        let mut run = state.lock().expect("run state mutex poisoned");
        run.completed_at = Some(Utc::now());
        run.status = compute_final_status(&run, cancelling, stopping);
        run.status
    };
    emit(
        &events,
        run_id,
        None,
        WorkflowEventKind::RunStatusChanged,
        json!({"status": status_str(final_status)}),
    );
    record(
        &journal,
        run_id,
        None,
        JournalEntryKind::RunStatusChanged {
            from: "running".to_string(),
            to: status_str(final_status).to_string(),
        },
    );
    checkpoint(&store, &state).await;
    done.notify_waiters();
}

#[allow(clippy::too_many_arguments)]
#[allow(clippy::too_many_arguments)]
async fn handle_message(
    msg: WorkerMsg,
    run_id: Uuid,
    graph: &WorkflowGraph,
    node_by_id: &HashMap<String, Node>,
    state: &Arc<Mutex<WorkflowRun>>,
    events: &tokio::sync::broadcast::Sender<WorkflowEvent>,
    journal: &Arc<Mutex<Journal>>,
    ready_queue: &mut BTreeSet<String>,
    outstanding: &mut usize,
    stopping: &mut bool,
) {
    match msg {
        WorkerMsg::Started { node_id, attempt } => {
            let mut run = state.lock().expect("run state mutex poisoned");
            if let Some(ns) = run.node_states.get_mut(&node_id) {
                ns.status = NodeStatus::Running;
                ns.attempts = attempt;
                ns.started_at.get_or_insert(Utc::now());
            }
            drop(run);
            emit(events, run_id, Some(node_id.clone()), WorkflowEventKind::NodeRunning, Value::Null);
            record(journal, run_id, Some(node_id), JournalEntryKind::NodeStarted);
        }
        WorkerMsg::Outcome {
            node_id,
            attempt,
            outcome: NodeOutcome::Retrying { result, delay },
        } => {
            let mut run = state.lock().expect("run state mutex poisoned");
            if let Some(ns) = run.node_states.get_mut(&node_id) {
                ns.status = NodeStatus::Ready;
                ns.attempts = attempt;
                ns.result = Some(result);
            }
            drop(run);
            emit(
                events,
                run_id,
                Some(node_id.clone()),
                WorkflowEventKind::NodeReady,
                json!({"retryingAfterMillis": delay.as_millis() as u64}),
            );
            record(
                journal,
                run_id,
                Some(node_id),
                JournalEntryKind::NodeRetrying { attempt, delay_millis: delay.as_millis() as u64 },
            );
        }
        WorkerMsg::Outcome {
            node_id,
            attempt,
            outcome: NodeOutcome::Succeeded(result),
        } => {
            *outstanding -= 1;
            {
                let mut run = state.lock().expect("run state mutex poisoned");
                if let Some(ns) = run.node_states.get_mut(&node_id) {
                    ns.status = NodeStatus::Succeeded;
                    ns.attempts = attempt;
                    ns.result = Some(result);
                    ns.finished_at = Some(Utc::now());
                }
            }
            emit(events, run_id, Some(node_id.clone()), WorkflowEventKind::NodeSucceeded, Value::Null);
            record(journal, run_id, Some(node_id.clone()), JournalEntryKind::NodeCompleted);
            promote_ready_dependents(graph, node_by_id, state, events, journal, run_id, ready_queue, &node_id);
        }
        WorkerMsg::Outcome {
            node_id,
            attempt,
            outcome: NodeOutcome::Terminal(result),
        } => {
            *outstanding -= 1;
            let on_error = node_by_id.get(&node_id).map(|n| n.on_error).unwrap_or_default();
            let error_kind = result.error_kind.unwrap_or(ErrorKind::HandlerError);
            {
                let mut run = state.lock().expect("run state mutex poisoned");
                if let Some(ns) = run.node_states.get_mut(&node_id) {
                    ns.status = NodeStatus::Failed;
                    ns.attempts = attempt;
                    ns.result = Some(result);
                    ns.finished_at = Some(Utc::now());
                }
            }
            emit(events, run_id, Some(node_id.clone()), WorkflowEventKind::NodeFailed, Value::Null);
            record(journal, run_id, Some(node_id.clone()), JournalEntryKind::NodeFailed { error_kind });

            match on_error {
                OnError::Fail => {
                    *stopping = true;
                }
                OnError::Continue => {
                    promote_ready_dependents(graph, node_by_id, state, events, journal, run_id, ready_queue, &node_id);
                }
                OnError::SkipDependents => {
                    let descendants = graph.descendants_of(&node_id);
                    let mut run = state.lock().expect("run state mutex poisoned");
                    for descendant in &descendants {
                        if let Some(ns) = run.node_states.get_mut(descendant) {
                            if !matches!(ns.status, NodeStatus::Succeeded | NodeStatus::Failed | NodeStatus::Skipped) {
                                ns.status = NodeStatus::Skipped;
                                ns.finished_at = Some(Utc::now());
                            }
                        }
                        ready_queue.remove(descendant);
                    }
                    drop(run);
                    for descendant in &descendants {
                        emit(events, run_id, Some(descendant.clone()), WorkflowEventKind::NodeSkipped, Value::Null);
                        record(journal, run_id, Some(descendant.clone()), JournalEntryKind::NodeSkipped);
                    }
                }
            }
        }
    }
}

#[allow(clippy::too_many_arguments)]
fn promote_ready_dependents(
    graph: &WorkflowGraph,
    node_by_id: &HashMap<String, Node>,
    state: &Arc<Mutex<WorkflowRun>>,
    events: &tokio::sync::broadcast::Sender<WorkflowEvent>,
    journal: &Arc<Mutex<Journal>>,
    run_id: Uuid,
    ready_queue: &mut BTreeSet<String>,
    completed_node_id: &str,
) {
    let mut newly_ready = Vec::new();
    {
        let mut run = state.lock().expect("run state mutex poisoned");
        for dependent in graph.dependents_of(completed_node_id) {
            let deps = graph.dependencies_of(&dependent);
            let all_satisfied = deps.iter().all(|dep_id| {
                run.node_states.get(dep_id).is_some_and(|ns| match ns.status {
                    NodeStatus::Succeeded => true,
                    NodeStatus::Failed => node_by_id.get(dep_id).map(|n| n.on_error) == Some(OnError::Continue),
                    _ => false,
                })
            });
            if !all_satisfied {
                continue;
            }
            if let Some(ns) = run.node_states.get_mut(&dependent) {
                if ns.status == NodeStatus::Waiting {
                    ns.status = NodeStatus::Ready;
                    newly_ready.push(dependent.clone());
                }
            }
        }
    }
    for dependent in newly_ready {
        ready_queue.insert(dependent.clone());
        emit(events, run_id, Some(dependent.clone()), WorkflowEventKind::NodeReady, Value::Null);
        record(journal, run_id, Some(dependent), JournalEntryKind::NodeScheduled);
    }
}

async fn run_node_worker(
    node: Node,
    policy: RetryPolicy,
    dispatcher: Arc<Dispatcher>,
    state: Arc<Mutex<WorkflowRun>>,
    workflow_input: Value,
    cancellation: CancellationToken,
    tx: mpsc::Sender<WorkerMsg>,
) {
    let mut attempt = 0u32;
    loop {
        attempt += 1;
        let _ = tx
            .send(WorkerMsg::Started {
                node_id: node.id.clone(),
                attempt,
            })
            .await;

        if cancellation.is_cancelled() {
            let result = ToolResult::failed(
                noesis_types::ToolResultStatus::Cancelled,
                ErrorKind::Cancelled,
                "workflow cancelled before node could run",
                Vec::new(),
                0,
            );
            let _ = tx
                .send(WorkerMsg::Outcome {
                    node_id: node.id.clone(),
                    attempt,
                    outcome: NodeOutcome::Terminal(result),
                })
                .await;
            return;
        }

        let resolved = {
            let run = state.lock().expect("run state mutex poisoned");
            let outputs = collect_outputs(&run);
            let session_context = Value::Null;
            let ctx = ResolutionContext {
                node_outputs: &outputs,
                workflow_input: &workflow_input,
                session_context: &session_context,
            };
            ctx.resolve(&node.arguments)
        };

        let arguments = match resolved {
            Ok(value) => value,
            Err(reference_error) => {
                let result = ToolResult::failed(
                    noesis_types::ToolResultStatus::HandlerError,
                    ErrorKind::ReferenceError,
                    reference_error.to_string(),
                    Vec::new(),
                    0,
                );
                let _ = tx
                    .send(WorkerMsg::Outcome {
                        node_id: node.id.clone(),
                        attempt,
                        outcome: NodeOutcome::Terminal(result),
                    })
                    .await;
                return;
            }
        };

        let timeout = node
            .timeout_millis
            .map(Duration::from_millis)
            .unwrap_or(DEFAULT_NODE_TIMEOUT);
        let mut call = ToolCall::new(node.tool.clone(), arguments)
            .with_deadline(timeout)
            .with_cancellation(cancellation.child_token());
        if let Some(session_id) = workflow_session_id(&workflow_input) {
            call = call.with_session(session_id);
        }

        let result = dispatcher.dispatch(call).await;

        if result.is_ok() {
            let _ = tx
                .send(WorkerMsg::Outcome {
                    node_id: node.id.clone(),
                    attempt,
                    outcome: NodeOutcome::Succeeded(result),
                })
                .await;
            return;
        }

        let kind = result.error_kind.unwrap_or(ErrorKind::HandlerError);
        if let Some(delay) = next_attempt_delay(&policy, kind, attempt) {
            let _ = tx
                .send(WorkerMsg::Outcome {
                    node_id: node.id.clone(),
                    attempt,
                    outcome: NodeOutcome::Retrying {
                        result,
                        delay,
                    },
                })
                .await;
            tokio::select! {
                _ = tokio::time::sleep(delay) => {}
                _ = cancellation.cancelled() => {}
            }
            continue;
        }

        let _ = tx
            .send(WorkerMsg::Outcome {
                node_id: node.id.clone(),
                attempt,
                outcome: NodeOutcome::Terminal(result),
            })
            .await;
        return;
    }
}

/// Builds the `${nodes.<id>.output...}` lookup table from whatever has
/// completed so far: a succeeded node's real output, or the sentinel for an
/// `onError = continue` failure (§9 open question, resolved: sentinel over
/// omission).
fn collect_outputs(run: &WorkflowRun) -> BTreeMap<String, Value> {
    let mut outputs = BTreeMap::new();
    for (node_id, ns) in &run.node_states {
        match ns.status {
            NodeStatus::Succeeded => {
                if let Some(result) = &ns.result {
                    if let Some(output) = &result.output {
                        outputs.insert(node_id.clone(), output.clone());
                    }
                }
            }
            NodeStatus::Failed => {
                let (kind, message) = ns
                    .result
                    .as_ref()
                    .map(|r| {
                        (
                            r.error_kind.map(|k| k.as_str().to_string()).unwrap_or_default(),
                            r.error_message.clone().unwrap_or_default(),
                        )
                    })
                    .unwrap_or_default();
                outputs.insert(node_id.clone(), noesis_types::upstream_failed_sentinel(node_id, &kind, &message));
            }
            _ => {}
        }
    }
    outputs
}

fn workflow_session_id(workflow_input: &Value) -> Option<String> {
    workflow_input.get("sessionId").and_then(Value::as_str).map(String::from)
}

fn compute_final_status(run: &WorkflowRun, cancelling: bool, stopping: bool) -> RunStatus {
    if cancelling {
        return RunStatus::Cancelled;
    }
    if stopping {
        return RunStatus::Failed;
    }
    let all_succeeded_or_skipped = run
        .node_states
        .values()
        .all(|ns| matches!(ns.status, NodeStatus::Succeeded | NodeStatus::Skipped));
    if all_succeeded_or_skipped {
        RunStatus::Succeeded
    } else {
        RunStatus::Partial
    }
}

fn status_str(status: RunStatus) -> &'static str {
    match status {
        RunStatus::Pending => "pending",
        RunStatus::Running => "running",
        RunStatus::Cancelling => "cancelling",
        RunStatus::Succeeded => "succeeded",
        RunStatus::Failed => "failed",
        RunStatus::Cancelled => "cancelled",
        RunStatus::Partial => "partial",
    }
}

fn emit(
    events: &tokio::sync::broadcast::Sender<WorkflowEvent>,
    run_id: Uuid,
    node_id: Option<String>,
    kind: WorkflowEventKind,
    detail: Value,
) {
    let _ = events.send(WorkflowEvent {
        run_id,
        node_id,
        kind,
        timestamp: Utc::now(),
        detail,
    });
}

fn record(journal: &Arc<Mutex<Journal>>, run_id: Uuid, node_id: Option<String>, kind: JournalEntryKind) {
    journal
        .lock()
        .expect("journal mutex poisoned")
        .record(JournalEntry::new(run_id, node_id, kind));
}

async fn checkpoint(store: &Arc<dyn SessionStore>, state: &Arc<Mutex<WorkflowRun>>) {
    let snapshot = state.lock().expect("run state mutex poisoned").clone();
    // Best-effort (§4.E.5): a failed checkpoint is logged but does not fail
    // the run.
    if let Err(err) = store.save_run_snapshot(&snapshot).await {
        tracing::warn!(run_id = %snapshot.run_id, error = %err, "checkpoint failed");
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicU32, Ordering};

    use noesis_types::{Field, OnError, Schema};
    use serde_json::json;

    use super::*;
    use crate::registry::{HandlerFailure, ToolRegistry, ToolSpec};
    use crate::store::InMemorySessionStore;
    use crate::workflow::WorkflowEngine;

    fn engine_with(registry: ToolRegistry) -> WorkflowEngine {
        let dispatcher = Arc::new(Dispatcher::new(registry.clone()));
        let store: Arc<dyn SessionStore> = Arc::new(InMemorySessionStore::default());
        WorkflowEngine::new(registry, dispatcher, store, 4)
    }

    fn int_field(name: &str) -> (String, Field) {
        (name.to_string(), Field::required(Schema::Integer { minimum: None, maximum: None }))
    }

    fn string_field(name: &str) -> (String, Field) {
        (name.to_string(), Field::required(Schema::string()))
    }

    /// A tool that copies its declared fields from input straight to an
    /// identically-shaped output, for chaining through real `${nodes...}`
    /// references without hand-rolling a fixture per test.
    fn passthrough_tool(name: &str, fields: Vec<(String, Field)>) -> ToolSpec {
        let schema = Schema::object(BTreeMap::from_iter(fields));
        ToolSpec {
            name: name.to_string(),
            version: "1.0.0".to_string(),
            description: String::new(),
            input_schema: schema.clone(),
            output_schema: schema,
            handler: Arc::new(|_ctx, input| Box::pin(async move { Ok(input) })),
            metadata: BTreeMap::new(),
        }
    }

    fn empty_schema_tool(name: &str, output_fields: Vec<(String, Field)>) -> ToolSpec {
        ToolSpec {
            name: name.to_string(),
            version: "1.0.0".to_string(),
            description: String::new(),
            input_schema: Schema::object(BTreeMap::new()),
            output_schema: Schema::object(BTreeMap::from_iter(output_fields)),
            handler: Arc::new(|_ctx, input| Box::pin(async move { Ok(input) })),
            metadata: BTreeMap::new(),
        }
    }

    fn node(id: &str, tool: &str, arguments: Value, on_error: OnError) -> Node {
        Node {
            id: id.to_string(),
            tool: tool.to_string(),
            arguments,
            timeout_millis: Some(2_000),
            retry_policy: None,
            on_error,
        }
    }

    fn definition(nodes: Vec<Node>) -> WorkflowDefinition {
        noesis_types::WorkflowDefinition {
            name: "test".to_string(),
            version: "1".to_string(),
            nodes,
            edges: Vec::new(),
            default_retry_policy: None,
            max_parallelism: None,
        }
    }

    #[tokio::test]
    async fn fan_out_then_fan_in_waits_for_both_branches() {
        let registry = ToolRegistry::new();
        registry.register(passthrough_tool("noop", vec![int_field("v")])).unwrap();
        registry
            .register(passthrough_tool("join", vec![int_field("a"), int_field("b")]))
            .unwrap();
        let engine = engine_with(registry);

        let def = definition(vec![
            node("S", "noop", json!({"v": "${input.v}"}), OnError::Fail),
            node("A", "noop", json!({"v": "${nodes.S.output.v}"}), OnError::Fail),
            node("B", "noop", json!({"v": "${nodes.S.output.v}"}), OnError::Fail),
            node(
                "J",
                "join",
                json!({"a": "${nodes.A.output.v}", "b": "${nodes.B.output.v}"}),
                OnError::Fail,
            ),
        ]);

        let run = engine.run_to_completion(def, json!({"v": 1})).await.unwrap();
        assert_eq!(run.status, RunStatus::Succeeded);
        let joined = run.node_states["J"].result.as_ref().unwrap().output.clone().unwrap();
        assert_eq!(joined, json!({"a": 1, "b": 1}));
    }

    #[tokio::test]
    async fn on_error_fail_stops_scheduling_new_nodes() {
        let registry = ToolRegistry::new();
        registry.register(passthrough_tool("noop", vec![int_field("x")])).unwrap();
        registry.register({
            let mut spec = empty_schema_tool("always_fails", Vec::new());
            spec.handler = Arc::new(|_ctx, _input| {
                Box::pin(async move { Err(HandlerFailure::new("always fails")) })
            });
            spec
        }).unwrap();
        let engine = engine_with(registry);

        let def = definition(vec![
            node("A", "always_fails", json!({}), OnError::Fail),
            node("B", "noop", json!({"x": "${nodes.A.output.x}"}), OnError::Fail),
        ]);

        let run = engine.run_to_completion(def, Value::Null).await.unwrap();
        assert_eq!(run.status, RunStatus::Failed);
        assert_eq!(run.node_states["A"].status, NodeStatus::Failed);
        assert_eq!(run.node_states["B"].status, NodeStatus::Waiting);
    }

    #[tokio::test]
    async fn on_error_skip_dependents_skips_the_whole_downstream_set() {
        let registry = ToolRegistry::new();
        registry.register(passthrough_tool("noop", vec![int_field("x")])).unwrap();
        registry.register({
            let mut spec = empty_schema_tool("always_fails", Vec::new());
            spec.handler = Arc::new(|_ctx, _input| {
                Box::pin(async move { Err(HandlerFailure::new("always fails")) })
            });
            spec
        }).unwrap();
        let engine = engine_with(registry);

        let def = definition(vec![
            node("A", "always_fails", json!({}), OnError::SkipDependents),
            node("B", "noop", json!({"x": "${nodes.A.output.x}"}), OnError::Fail),
            node("C", "noop", json!({"x": "${nodes.B.output.x}"}), OnError::Fail),
        ]);

        let run = engine.run_to_completion(def, Value::Null).await.unwrap();
        assert_eq!(run.node_states["A"].status, NodeStatus::Failed);
        assert_eq!(run.node_states["B"].status, NodeStatus::Skipped);
        assert_eq!(run.node_states["C"].status, NodeStatus::Skipped);
        assert_eq!(run.status, RunStatus::Succeeded);
    }

    #[tokio::test]
    async fn on_error_continue_lets_dependents_see_the_upstream_failed_sentinel() {
        let registry = ToolRegistry::new();
        registry.register({
            let mut spec = empty_schema_tool("always_fails", Vec::new());
            spec.handler = Arc::new(|_ctx, _input| {
                Box::pin(async move { Err(HandlerFailure::new("boom")) })
            });
            spec
        }).unwrap();
        registry
            .register(passthrough_tool("noop", vec![string_field("upstreamNodeId")]))
            .unwrap();
        let engine = engine_with(registry);

        let def = definition(vec![
            node("A", "always_fails", json!({}), OnError::Continue),
            node(
                "B",
                "noop",
                json!({"upstreamNodeId": "${nodes.A.output.nodeId}"}),
                OnError::Fail,
            ),
        ]);

        let run = engine.run_to_completion(def, Value::Null).await.unwrap();
        assert_eq!(run.node_states["A"].status, NodeStatus::Failed);
        assert_eq!(run.node_states["B"].status, NodeStatus::Succeeded);
        let b_output = run.node_states["B"].result.as_ref().unwrap().output.clone().unwrap();
        assert_eq!(b_output["upstreamNodeId"], json!("A"));
    }

    #[tokio::test]
    async fn a_node_retries_until_the_configured_attempt_then_succeeds() {
        let registry = ToolRegistry::new();
        let remaining_failures = Arc::new(AtomicU32::new(2));
        registry.register({
            let mut spec = empty_schema_tool(
                "flaky",
                vec![("ok".to_string(), Field::required(Schema::Boolean))],
            );
            let remaining_failures = remaining_failures.clone();
            spec.handler = Arc::new(move |_ctx, _input| {
                let remaining_failures = remaining_failures.clone();
                Box::pin(async move {
                    if remaining_failures.fetch_sub(1, Ordering::SeqCst) > 0 {
                        Err(HandlerFailure::new("not yet"))
                    } else {
                        Ok(json!({"ok": true}))
                    }
                })
            });
            spec
        }).unwrap();
        let engine = engine_with(registry);

        let mut def = definition(vec![node("A", "flaky", json!({}), OnError::Fail)]);
        def.default_retry_policy = Some(noesis_types::RetryPolicy {
            max_attempts: 5,
            initial_backoff_millis: 1,
            backoff_multiplier: 1.0,
            max_backoff_millis: 5,
            retryable_kinds: vec![ErrorKind::HandlerError],
        });

        let run = engine.run_to_completion(def, Value::Null).await.unwrap();
        assert_eq!(run.status, RunStatus::Succeeded);
        assert_eq!(run.node_states["A"].attempts, 3);
    }

    #[tokio::test]
    async fn cancelling_a_run_stops_it_with_cancelled_status() {
        let registry = ToolRegistry::new();
        registry.register({
            let mut spec = empty_schema_tool("slow", Vec::new());
            spec.handler = Arc::new(|_ctx, _input| {
                Box::pin(async move {
                    tokio::time::sleep(Duration::from_secs(5)).await;
                    Ok(json!({}))
                })
            });
            spec
        }).unwrap();
        let engine = engine_with(registry);

        let def = definition(vec![node("A", "slow", json!({}), OnError::Fail)]);
        let run_id = engine.start(def, Value::Null).await.unwrap();

        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(engine.cancel(run_id).await.unwrap());

        let run = tokio::time::timeout(Duration::from_secs(2), async {
            loop {
                let status = engine.status(run_id).await.unwrap().unwrap();
                if status.status.is_terminal() {
                    return status;
                }
                tokio::time::sleep(Duration::from_millis(10)).await;
            }
        })
        .await
        .expect("run did not reach a terminal status in time");

        assert_eq!(run.status, RunStatus::Cancelled);
    }

    #[tokio::test]
    async fn journal_records_the_lifecycle_of_a_linear_run() {
        let registry = ToolRegistry::new();
        registry.register(passthrough_tool("noop", vec![int_field("v")])).unwrap();
        let engine = engine_with(registry);

        let def = definition(vec![
            node("A", "noop", json!({"v": 1}), OnError::Fail),
            node("B", "noop", json!({"v": "${nodes.A.output.v}"}), OnError::Fail),
        ]);

        let run_id = engine.start(def, Value::Null).await.unwrap();
        let run = tokio::time::timeout(Duration::from_secs(2), async {
            loop {
                let status = engine.status(run_id).await.unwrap().unwrap();
                if status.status.is_terminal() {
                    return status;
                }
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .expect("run did not reach a terminal status in time");
        assert_eq!(run.status, RunStatus::Succeeded);

        let journal = engine.journal(run_id).expect("journal present for a resident run");
        assert!(journal.iter().any(|e| matches!(e.kind, JournalEntryKind::NodeStarted) && e.node_id.as_deref() == Some("A")));
        assert!(journal.iter().any(|e| matches!(e.kind, JournalEntryKind::NodeCompleted) && e.node_id.as_deref() == Some("B")));
        assert!(journal.iter().any(|e| matches!(e.kind, JournalEntryKind::RunStatusChanged { .. })));
    }
}
