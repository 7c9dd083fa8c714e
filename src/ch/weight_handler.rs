use thiserror::Error;

use crate::graphs::{meta_graph::MetaGraph, Direction, Vertex, Weight};

#[derive(Debug, Error)]
pub enum ContractionError {
    #[error("weight handler does not support the given graph")]
    UnsupportedWeightHandler,
}

/// Decouples the contraction core from the concrete representation of
/// edge weights: every weight the core reads goes through `metric`, every
/// shortcut it writes goes through `combine` and `add_or_update_edge`.
pub trait WeightHandler: Send + Sync {
    /// Whether this handler can operate on the given graph. Checked once
    /// at builder construction.
    fn supports(&self, graph: &MetaGraph) -> bool;

    /// Scalar used to order paths.
    fn metric(&self, weight: Weight) -> Weight {
        weight
    }

    /// Weight of the concatenation of two edges.
    fn combine(&self, first: Weight, second: Weight) -> Weight {
        first + second
    }

    fn add_or_update_edge(
        &self,
        graph: &mut MetaGraph,
        tail: Vertex,
        head: Vertex,
        via: Option<Vertex>,
        direction: Direction,
        weight: Weight,
    ) -> bool {
        graph.add_or_update_edge(tail, head, via, direction, weight)
    }
}

/// Identity handler for graphs whose edge payload already is the metric.
#[derive(Clone, Copy, Debug, Default)]
pub struct MetricHandler;

impl WeightHandler for MetricHandler {
    fn supports(&self, graph: &MetaGraph) -> bool {
        graph
            .vertices()
            .flat_map(|vertex| graph.edges(vertex))
            .all(|edge| edge.weight >= 0.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn metric_handler_rejects_negative_weights() {
        let mut graph = MetaGraph::with_vertices(2);
        graph.add_or_update_edge(0, 1, None, Direction::Both, -1.0);

        assert!(!MetricHandler.supports(&graph));
    }

    #[test]
    fn metric_handler_rejects_nan() {
        let mut graph = MetaGraph::with_vertices(2);
        graph.add_or_update_edge(0, 1, None, Direction::Both, Weight::NAN);

        assert!(!MetricHandler.supports(&graph));
    }

    #[test]
    fn metric_handler_accepts_plain_graphs() {
        let mut graph = MetaGraph::with_vertices(3);
        graph.add_dual_edge(0, 1, 1.0, 1.0);
        graph.add_dual_edge(1, 2, 2.0, 7.0);

        assert!(MetricHandler.supports(&graph));
    }
}
