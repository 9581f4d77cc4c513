//! Graph view of a template, cycle detection, and wave preview.
//!
//! Uses `petgraph` to model both dependency edges (`depends_on`) and routing
//! edges (conditional edge source to each of its targets). Topological sort
//! over the combined graph detects cycles; depth grouping produces the static
//! wave preview shown by tooling. The engine itself schedules dynamically and
//! does not consume this preview.

use std::collections::HashMap;

use flowsmith_types::workflow::{Node, Template};
use petgraph::algo::toposort;
use petgraph::graph::{DiGraph, NodeIndex};

/// Why one node must run after another.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EdgeKind {
    Dependency,
    Route,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DagError {
    #[error("cycle detected involving node '{0}'")]
    CycleDetected(String),
}

/// Directed graph over node ids, edges pointing from prerequisite to dependent.
///
/// References to unknown nodes and self-dependencies are left out; the
/// validator reports those separately.
pub fn execution_graph(template: &Template) -> (DiGraph<&str, EdgeKind>, HashMap<&str, NodeIndex>) {
    let mut graph = DiGraph::<&str, EdgeKind>::new();
    let mut index: HashMap<&str, NodeIndex> = HashMap::new();
    for node in &template.nodes {
        index
            .entry(node.id.as_str())
            .or_insert_with(|| graph.add_node(node.id.as_str()));
    }

    for node in &template.nodes {
        let to = index[node.id.as_str()];
        for dep in &node.depends_on {
            if dep == &node.id {
                continue;
            }
            if let Some(&from) = index.get(dep.as_str()) {
                graph.add_edge(from, to, EdgeKind::Dependency);
            }
        }
    }

    for edge in &template.conditions {
        let Some(&from) = index.get(edge.from.as_str()) else {
            continue;
        };
        for target in edge.targets() {
            if let Some(&to) = index.get(target) {
                if from != to && graph.find_edge(from, to).is_none() {
                    graph.add_edge(from, to, EdgeKind::Route);
                }
            }
        }
    }

    (graph, index)
}

/// Returns a node on a cycle, if the combined graph has one.
pub fn find_cycle(template: &Template) -> Option<String> {
    let (graph, _) = execution_graph(template);
    toposort(&graph, None)
        .err()
        .map(|cycle| graph[cycle.node_id()].to_string())
}

/// Group nodes into the waves they would run in if every route were taken.
///
/// Wave 0 holds nodes with no incoming edges; every other node sits one wave
/// after its deepest prerequisite. Nodes keep declaration order within a wave.
pub fn plan_waves(template: &Template) -> Result<Vec<Vec<&Node>>, DagError> {
    if template.nodes.is_empty() {
        return Ok(vec![]);
    }

    let (graph, index) = execution_graph(template);
    let sorted = toposort(&graph, None)
        .map_err(|cycle| DagError::CycleDetected(graph[cycle.node_id()].to_string()))?;

    let mut depths: HashMap<NodeIndex, usize> = HashMap::new();
    for idx in sorted {
        let depth = graph
            .neighbors_directed(idx, petgraph::Direction::Incoming)
            .map(|pred| depths.get(&pred).copied().unwrap_or(0) + 1)
            .max()
            .unwrap_or(0);
        depths.insert(idx, depth);
    }

    let max_depth = depths.values().copied().max().unwrap_or(0);
    let mut waves: Vec<Vec<&Node>> = vec![vec![]; max_depth + 1];
    for node in &template.nodes {
        let depth = depths[&index[node.id.as_str()]];
        // Duplicate ids map to the same graph node; keep the first declaration.
        if !waves[depth].iter().any(|n| n.id == node.id) {
            waves[depth].push(node);
        }
    }

    Ok(waves)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
