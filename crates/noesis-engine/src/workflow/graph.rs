// crates/noesis-engine/src/workflow/graph.rs
// Parsing and dependency extraction (§4.E.1): build the DAG implied by a
// workflow definition's explicit edges and `${nodes...}` references, reject
// unknown node IDs / tools, and detect cycles via `petgraph::algo::toposort`.

use std::collections::{BTreeMap, BTreeSet, HashMap};

use noesis_types::WorkflowDefinition;
use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::visit::EdgeRef;

use super::reference::{scan_references, RefTarget};
use crate::error::{EngineError, Result};
use crate::registry::ToolRegistry;

/// A parsed, validated workflow ready to run: the node order is fixed, the
/// graph is acyclic, and every `tool` name exists in the registry.
pub struct WorkflowGraph {
    pub definition: WorkflowDefinition,
    graph: DiGraph<String, ()>,
    node_index: HashMap<String, NodeIndex>,
    /// Topological order, node IDs (§4.E.1 "Detect cycles via a DFS
    /// producing a topological order").
    pub topo_order: Vec<String>,
}

impl WorkflowGraph {
    /// Parses `definition`, rejecting duplicate node IDs, unknown tools, and
    /// cyclic reference graphs (§4.E.1).
    pub fn parse(definition: WorkflowDefinition, registry: &ToolRegistry) -> Result<Self> {
        let mut seen_ids = BTreeSet::new();
        for node in &definition.nodes {
            if !seen_ids.insert(node.id.clone()) {
                return Err(EngineError::InvalidParams(format!(
                    "duplicate node id '{}'",
                    node.id
                )));
            }
            if !registry.contains(&node.tool) {
                return Err(EngineError::UnknownTool(node.tool.clone()));
            }
        }

        let mut graph = DiGraph::new();
        let mut node_index = HashMap::new();
        for node in &definition.nodes {
            node_index.insert(node.id.clone(), graph.add_node(node.id.clone()));
        }

        for edge in &definition.edges {
            let from = *node_index
                .get(&edge.from)
                .ok_or_else(|| EngineError::InvalidParams(format!("edge references unknown node '{}'", edge.from)))?;
            let to = *node_index
                .get(&edge.to)
                .ok_or_else(|| EngineError::InvalidParams(format!("edge references unknown node '{}'", edge.to)))?;
            graph.add_edge(from, to, ());
        }

        for node in &definition.nodes {
            for reference in scan_references(&node.arguments) {
                if let RefTarget::NodeOutput { node_id, .. } = reference {
                    let from = *node_index.get(&node_id).ok_or_else(|| {
                        EngineError::InvalidParams(format!(
                            "node '{}' references unknown node '{node_id}'",
                            node.id
                        ))
                    })?;
                    let to = node_index[&node.id];
                    if from != to {
                        graph.update_edge(from, to, ());
                    }
                }
            }
        }

        let topo_order = petgraph::algo::toposort(&graph, None).map_err(|cycle| {
            let participant = &graph[cycle.node_id()];
            EngineError::CyclicDependency(participant.clone())
        })?;

        Ok(WorkflowGraph {
            definition,
            topo_order: topo_order.iter().map(|i| graph[*i].clone()).collect(),
            node_index,
            graph,
        })
    }

    pub fn dependencies_of(&self, node_id: &str) -> Vec<String> {
        let Some(&idx) = self.node_index.get(node_id) else {
            return Vec::new();
        };
        self.graph
            .edges_directed(idx, petgraph::Direction::Incoming)
            .map(|e| self.graph[e.source()].clone())
            .collect()
    }

    pub fn dependents_of(&self, node_id: &str) -> Vec<String> {
        let Some(&idx) = self.node_index.get(node_id) else {
            return Vec::new();
        };
        self.graph
            .edges_directed(idx, petgraph::Direction::Outgoing)
            .map(|e| self.graph[e.target()].clone())
            .collect()
    }

    /// Every node reachable *from* `node_id` — used for `onError =
    /// skipDependents` (§4.E.2 "each node in this node's descendant set
    /// transitions directly to `skipped`").
    pub fn descendants_of(&self, node_id: &str) -> BTreeSet<String> {
        let mut result = BTreeSet::new();
        let mut stack = self.dependents_of(node_id);
        while let Some(id) = stack.pop() {
            if result.insert(id.clone()) {
                stack.extend(self.dependents_of(&id));
            }
        }
        result
    }

    pub fn node_count(&self) -> usize {
        self.definition.nodes.len()
    }

    pub fn all_dependencies(&self) -> BTreeMap<String, Vec<String>> {
        self.definition
            .nodes
            .iter()
            .map(|n| (n.id.clone(), self.dependencies_of(&n.id)))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use noesis_types::{Node, OnError};
    use serde_json::json;

    fn registry_with(tools: &[&str]) -> ToolRegistry {
        use crate::registry::ToolSpec;
        use noesis_types::Schema;
        use std::collections::BTreeMap as Map;
        use std::sync::Arc;

        let registry = ToolRegistry::new();
        for name in tools {
            registry
                .register(ToolSpec {
                    name: name.to_string(),
                    version: "1.0.0".to_string(),
                    description: String::new(),
                    input_schema: Schema::object(Map::new()),
                    output_schema: Schema::object(Map::new()),
                    handler: Arc::new(|_ctx, input| Box::pin(async move { Ok(input) })),
                    metadata: Map::new(),
                })
                .unwrap();
        }
        registry
    }

    fn node(id: &str, tool: &str, arguments: serde_json::Value) -> Node {
        Node {
            id: id.to_string(),
            tool: tool.to_string(),
            arguments,
            timeout_millis: None,
            retry_policy: None,
            on_error: OnError::Fail,
        }
    }

    #[test]
    fn linear_pipeline_derives_edges_from_references() {
        let registry = registry_with(&["classify", "enrich", "summarize"]);
        let def = WorkflowDefinition {
            name: "pipeline".to_string(),
            version: "1".to_string(),
            nodes: vec![
                node("A", "classify", json!({"text": "${input.text}"})),
                node("B", "enrich", json!({"category": "${nodes.A.output.category}"})),
                node(
                    "C",
                    "summarize",
                    json!({"text": "${input.text}", "tags": "${nodes.B.output.tags}"}),
                ),
            ],
            edges: Vec::new(),
            default_retry_policy: None,
            max_parallelism: None,
        };
        let graph = WorkflowGraph::parse(def, &registry).unwrap();
        assert_eq!(graph.topo_order, vec!["A", "B", "C"]);
        assert_eq!(graph.dependencies_of("C"), vec!["B"]);
    }

    #[test]
    fn cycle_is_rejected_at_parse_time() {
        let registry = registry_with(&["noop"]);
        let def = WorkflowDefinition {
            name: "cycle".to_string(),
            version: "1".to_string(),
            nodes: vec![
                node("A", "noop", json!({"x": "${nodes.B.output.y}"})),
                node("B", "noop", json!({"y": "${nodes.A.output.x}"})),
            ],
            edges: Vec::new(),
            default_retry_policy: None,
            max_parallelism: None,
        };
        let err = WorkflowGraph::parse(def, &registry).unwrap_err();
        assert!(matches!(err, EngineError::CyclicDependency(_)));
    }

    #[test]
    fn unknown_tool_is_rejected() {
        let registry = registry_with(&["known"]);
        let def = WorkflowDefinition {
            name: "bad".to_string(),
            version: "1".to_string(),
            nodes: vec![node("A", "unknown", json!({}))],
            edges: Vec::new(),
            default_retry_policy: None,
            max_parallelism: None,
        };
        assert!(matches!(
            WorkflowGraph::parse(def, &registry).unwrap_err(),
            EngineError::UnknownTool(_)
        ));
    }

    #[test]
    fn duplicate_node_ids_are_rejected() {
        let registry = registry_with(&["noop"]);
        let def = WorkflowDefinition {
            name: "dup".to_string(),
            version: "1".to_string(),
            nodes: vec![node("A", "noop", json!({})), node("A", "noop", json!({}))],
            edges: Vec::new(),
            default_retry_policy: None,
            max_parallelism: None,
        };
        assert!(WorkflowGraph::parse(def, &registry).is_err());
    }

    #[test]
    fn descendants_include_the_whole_downstream_set() {
        let registry = registry_with(&["noop"]);
        let def = WorkflowDefinition {
            name: "fanout".to_string(),
            version: "1".to_string(),
            nodes: vec![
                node("S", "noop", json!({})),
                node("X", "noop", json!({"v": "${nodes.S.output.v}"})),
                node("T", "noop", json!({"v": "${nodes.X.output.v}"})),
            ],
            edges: Vec::new(),
            default_retry_policy: None,
            max_parallelism: None,
        };
        let graph = WorkflowGraph::parse(def, &registry).unwrap();
        let descendants = graph.descendants_of("S");
        assert!(descendants.contains("X"));
        assert!(descendants.contains("T"));
    }
}
