//! Layout order: referenced entries before the entries that reference them.

use std::cmp::Reverse;
use std::collections::BinaryHeap;

use ncd_common::InternalError;
use ncd_ir::{Ir, NodeId};
use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::Direction;

/// The reference graph of an [`Ir`]: one vertex per node, an edge from each
/// node to every distinct node it references.
pub struct ReferenceGraph {
    graph: DiGraph<NodeId, ()>,
}

impl ReferenceGraph {
    /// Builds the graph. Vertex indices equal node indices.
    pub fn build(ir: &Ir) -> Self {
        let mut graph = DiGraph::with_capacity(ir.len(), 0);
        for id in ir.nodes.ids() {
            graph.add_node(id);
        }
        for id in ir.nodes.ids() {
            for target in ir.references(id) {
                graph.update_edge(NodeIndex::new(id.index()), NodeIndex::new(target.index()), ());
            }
        }
        Self { graph }
    }

    /// Number of distinct reference edges.
    pub fn edge_count(&self) -> usize {
        self.graph.edge_count()
    }

    /// Topological order with dependencies first. Among nodes that are ready
    /// at the same time, the one defined first goes first.
    ///
    /// The graph must be acyclic; a cycle here is a bug in the caller.
    pub fn layout_order(&self) -> Result<Vec<NodeId>, InternalError> {
        // Kahn's algorithm over a min-heap of vertex indices. `algo::toposort`
        // leaves the order of independent vertices unspecified.
        let n = self.graph.node_count();
        let mut pending: Vec<usize> = self
            .graph
            .node_indices()
            .map(|v| self.graph.neighbors_directed(v, Direction::Outgoing).count())
            .collect();
        let mut ready: BinaryHeap<Reverse<usize>> = pending
            .iter()
            .enumerate()
            .filter(|&(_, &count)| count == 0)
            .map(|(i, _)| Reverse(i))
            .collect();

        let mut order = Vec::with_capacity(n);
        while let Some(Reverse(i)) = ready.pop() {
            let v = NodeIndex::new(i);
            order.push(self.graph[v]);
            for dependent in self.graph.neighbors_directed(v, Direction::Incoming) {
                let slot = &mut pending[dependent.index()];
                *slot -= 1;
                if *slot == 0 {
                    ready.push(Reverse(dependent.index()));
                }
            }
        }

        if order.len() != n {
            return Err(InternalError::new(format!(
                "layout placed {} of {n} entries; reference graph is cyclic",
                order.len()
            )));
        }
        Ok(order)
    }
}
