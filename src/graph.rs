//! Resource-Allocation Graph
//!
//! Arena-backed directed multigraph over process and resource labels, with a
//! first-cycle search that follows the recorded edge orientation.

use petgraph::graph::{DiGraph, EdgeIndex, NodeIndex};
use petgraph::visit::EdgeRef;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Direction in which an edge of a reported cycle was traversed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Orientation {
    /// Traversed from source to target, exactly as the edge was recorded.
    Forward,
}

/// One edge of a detected cycle.
///
/// Serializes as a `[source, target, orientation]` triple.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(
    into = "(String, String, Orientation)",
    from = "(String, String, Orientation)"
)]
pub struct CycleEdge {
    pub source: String,
    pub target: String,
    pub orientation: Orientation,
}

impl CycleEdge {
    pub fn forward(source: impl Into<String>, target: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            target: target.into(),
            orientation: Orientation::Forward,
        }
    }
}

impl From<CycleEdge> for (String, String, Orientation) {
    fn from(edge: CycleEdge) -> Self {
        (edge.source, edge.target, edge.orientation)
    }
}

impl From<(String, String, Orientation)> for CycleEdge {
    fn from((source, target, orientation): (String, String, Orientation)) -> Self {
        Self {
            source,
            target,
            orientation,
        }
    }
}

/// A directed graph of "who points at whom" in one allocation snapshot.
///
/// - Nodes: process and resource labels, created on first reference.
/// - Edges:
///   - (Process -> Resource): process requests the resource.
///   - (Resource -> Process): resource is held by the process.
///
/// Duplicate edges and self-loops are kept as given.
#[derive(Debug, Default)]
pub struct AllocationGraph {
    /// The underlying graph structure.
    graph: DiGraph<String, ()>,
    /// Map to quickly look up graph indices by label.
    node_map: HashMap<String, NodeIndex>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Visit {
    Unseen,
    OnPath,
    Done,
}

/// DFS frame: a node on the active path and its outgoing edges.
struct Frame {
    node: NodeIndex,
    successors: Vec<NodeIndex>,
    cursor: usize,
}

impl AllocationGraph {
    /// Creates a new, empty allocation graph.
    pub fn new() -> Self {
        Self {
            graph: DiGraph::new(),
            node_map: HashMap::new(),
        }
    }

    /// Builds a graph by inserting every `(source, target)` pair in order.
    pub fn from_edges<'a, I>(edges: I) -> Self
    where
        I: IntoIterator<Item = (&'a str, &'a str)>,
    {
        let mut graph = Self::new();
        for (source, target) in edges {
            graph.add_edge(source, target);
        }
        graph
    }

    /// Records `source -> target`. Always inserts a new edge, even if an
    /// identical one already exists.
    pub fn add_edge(&mut self, source: &str, target: &str) -> EdgeIndex {
        let source_idx = self.node(source);
        let target_idx = self.node(target);
        self.graph.add_edge(source_idx, target_idx, ())
    }

    fn node(&mut self, label: &str) -> NodeIndex {
        *self
            .node_map
            .entry(label.to_owned())
            .or_insert_with(|| self.graph.add_node(label.to_owned()))
    }

    pub fn node_count(&self) -> usize {
        self.graph.node_count()
    }

    pub fn edge_count(&self) -> usize {
        self.graph.edge_count()
    }

    pub fn contains(&self, label: &str) -> bool {
        self.node_map.contains_key(label)
    }

    /// Returns true if any directed cycle exists.
    pub fn has_cycle(&self) -> bool {
        petgraph::algo::is_cyclic_directed(&self.graph)
    }

    /// Finds the first directed cycle, if any.
    ///
    /// Roots are tried in first-seen node order and each node's outgoing
    /// edges in insertion order. The first back edge closes the cycle, which
    /// is reported starting at the node that back edge returns to.
    pub fn find_cycle(&self) -> Option<Vec<CycleEdge>> {
        let mut state = vec![Visit::Unseen; self.graph.node_count()];

        for root in self.graph.node_indices() {
            if state[root.index()] != Visit::Unseen {
                continue;
            }

            state[root.index()] = Visit::OnPath;
            let mut stack = vec![self.frame(root)];
            // Edges along the active path; always one shorter than `stack`.
            let mut trail: Vec<(NodeIndex, NodeIndex)> = Vec::new();

            while let Some(frame) = stack.last_mut() {
                let Some(&next) = frame.successors.get(frame.cursor) else {
                    state[frame.node.index()] = Visit::Done;
                    stack.pop();
                    trail.pop();
                    continue;
                };
                frame.cursor += 1;
                let current = frame.node;

                match state[next.index()] {
                    Visit::OnPath => {
                        trail.push((current, next));
                        return Some(self.close_cycle(&trail, next));
                    }
                    Visit::Unseen => {
                        state[next.index()] = Visit::OnPath;
                        trail.push((current, next));
                        stack.push(self.frame(next));
                    }
                    Visit::Done => {}
                }
            }
        }

        None
    }

    fn frame(&self, node: NodeIndex) -> Frame {
        // petgraph walks adjacency lists newest-first; restore insertion order.
        let mut edges: Vec<(EdgeIndex, NodeIndex)> = self
            .graph
            .edges(node)
            .map(|edge| (edge.id(), edge.target()))
            .collect();
        edges.sort_unstable_by_key(|(id, _)| *id);

        Frame {
            node,
            successors: edges.into_iter().map(|(_, target)| target).collect(),
            cursor: 0,
        }
    }

    fn close_cycle(&self, trail: &[(NodeIndex, NodeIndex)], entry: NodeIndex) -> Vec<CycleEdge> {
        let start = trail
            .iter()
            .position(|&(source, _)| source == entry)
            .unwrap_or(0);

        trail[start..]
            .iter()
            .map(|&(source, target)| {
                CycleEdge::forward(self.graph[source].clone(), self.graph[target].clone())
            })
            .collect()
    }
}
