use serde::{Deserialize, Serialize};

use super::{Direction, MetaEdge, Vertex, Weight, WEIGHT_TOLERANCE};

/// Mutable directed multigraph over dense vertex ids.
///
/// Entries sharing a tail are kept sorted by `(head, direction)`, so
/// lookups are binary searches and parallel edges may only differ in
/// their direction flag. Every logical arc is stored from both
/// endpoints; see [`Direction`] for the mirroring rule.
#[derive(Clone, Default, Serialize, Deserialize)]
pub struct MetaGraph {
    edges: Vec<Vec<MetaEdge>>,
}

impl MetaGraph {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_vertices(number_of_vertices: u32) -> Self {
        MetaGraph {
            edges: vec![Vec::new(); number_of_vertices as usize],
        }
    }

    pub fn number_of_vertices(&self) -> u32 {
        self.edges.len() as u32
    }

    pub fn number_of_edges(&self) -> usize {
        self.edges.iter().map(Vec::len).sum()
    }

    pub fn vertices(&self) -> impl Iterator<Item = Vertex> {
        0..self.number_of_vertices()
    }

    pub fn edges(&self, vertex: Vertex) -> std::slice::Iter<'_, MetaEdge> {
        self.edges
            .get(vertex as usize)
            .map(Vec::as_slice)
            .unwrap_or(&[])
            .iter()
    }

    pub fn edge(&self, tail: Vertex, head: Vertex, direction: Direction) -> Option<&MetaEdge> {
        let edges = self.edges.get(tail as usize)?;
        let index = edges
            .binary_search_by_key(&(head, direction), |edge| (edge.head, edge.direction))
            .ok()?;
        Some(&edges[index])
    }

    /// Inserts an edge or lowers the weight of the existing entry with the
    /// same `(head, direction)`. An existing entry is replaced only when
    /// the new weight is strictly smaller, so no edge ever shadows a
    /// cheaper one in the same direction. Returns whether the graph
    /// changed.
    pub fn add_or_update_edge(
        &mut self,
        tail: Vertex,
        head: Vertex,
        via: Option<Vertex>,
        direction: Direction,
        weight: Weight,
    ) -> bool {
        debug_assert_ne!(tail, head);

        let highest = tail.max(head);
        if (self.edges.len() as u32) <= highest {
            self.edges.resize(highest as usize + 1, Vec::new());
        }

        let edges = &mut self.edges[tail as usize];
        match edges.binary_search_by_key(&(head, direction), |edge| (edge.head, edge.direction)) {
            Ok(index) => {
                if weight < edges[index].weight {
                    edges[index].weight = weight;
                    edges[index].via = via;
                    return true;
                }
                false
            }
            Err(index) => {
                edges.insert(
                    index,
                    MetaEdge {
                        head,
                        direction,
                        weight,
                        via,
                    },
                );
                true
            }
        }
    }

    /// Construction helper for an original edge with independent forward
    /// (`tail -> head`) and backward (`head -> tail`) weights. Weights
    /// within [`WEIGHT_TOLERANCE`] collapse into a single `Both` arc;
    /// otherwise each finite side becomes a directional arc. Both cases
    /// are mirrored on the opposite endpoint. Non-finite sides are
    /// dropped.
    pub fn add_dual_edge(&mut self, tail: Vertex, head: Vertex, forward: Weight, backward: Weight) {
        if tail == head {
            return;
        }

        if forward.is_finite()
            && backward.is_finite()
            && (forward - backward).abs() < WEIGHT_TOLERANCE
        {
            self.add_or_update_edge(tail, head, None, Direction::Both, forward);
            self.add_or_update_edge(head, tail, None, Direction::Both, forward);
            return;
        }

        if forward.is_finite() {
            self.add_or_update_edge(tail, head, None, Direction::Forward, forward);
            self.add_or_update_edge(head, tail, None, Direction::Backward, forward);
        }
        if backward.is_finite() {
            self.add_or_update_edge(tail, head, None, Direction::Backward, backward);
            self.add_or_update_edge(head, tail, None, Direction::Forward, backward);
        }
    }

    /// Removes every entry stored at `tail` toward `head`, whatever its
    /// direction flag. The mirrored entries at `head` are left alone.
    pub fn remove_edge(&mut self, tail: Vertex, head: Vertex) {
        if let Some(edges) = self.edges.get_mut(tail as usize) {
            edges.retain(|edge| edge.head != head);
        }
    }

    /// Removes every edge incident to the vertex, in both directions.
    pub fn disconnect(&mut self, vertex: Vertex) {
        let Some(edges) = self.edges.get_mut(vertex as usize) else {
            return;
        };

        for edge in std::mem::take(edges) {
            if let Some(reverse_edges) = self.edges.get_mut(edge.head as usize) {
                reverse_edges.retain(|reverse_edge| reverse_edge.head != vertex);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn add_or_update_keeps_minimum_per_direction() {
        let mut graph = MetaGraph::with_vertices(2);

        assert!(graph.add_or_update_edge(0, 1, None, Direction::Forward, 5.0));
        assert!(!graph.add_or_update_edge(0, 1, None, Direction::Forward, 7.0));
        assert!(graph.add_or_update_edge(0, 1, Some(9), Direction::Forward, 3.0));

        let edge = graph.edge(0, 1, Direction::Forward).unwrap();
        assert_eq!(edge.weight, 3.0);
        assert_eq!(edge.via, Some(9));
    }

    #[test]
    fn directional_entries_coexist() {
        let mut graph = MetaGraph::with_vertices(2);
        graph.add_or_update_edge(0, 1, None, Direction::Forward, 1.0);
        graph.add_or_update_edge(0, 1, None, Direction::Backward, 10.0);

        assert_eq!(graph.edges(0).count(), 2);
        assert_eq!(graph.edge(0, 1, Direction::Forward).unwrap().weight, 1.0);
        assert_eq!(graph.edge(0, 1, Direction::Backward).unwrap().weight, 10.0);
    }

    #[test]
    fn dual_edge_collapses_symmetric_weights() {
        let mut graph = MetaGraph::with_vertices(2);
        graph.add_dual_edge(0, 1, 2.0, 2.05);

        assert_eq!(graph.edges(0).count(), 1);
        assert_eq!(graph.edge(0, 1, Direction::Both).unwrap().weight, 2.0);
        assert_eq!(graph.edge(1, 0, Direction::Both).unwrap().weight, 2.0);
    }

    #[test]
    fn dual_edge_splits_asymmetric_weights() {
        let mut graph = MetaGraph::with_vertices(2);
        graph.add_dual_edge(0, 1, 1.0, 10.0);

        assert_eq!(graph.edge(0, 1, Direction::Forward).unwrap().weight, 1.0);
        assert_eq!(graph.edge(0, 1, Direction::Backward).unwrap().weight, 10.0);
        assert_eq!(graph.edge(1, 0, Direction::Backward).unwrap().weight, 1.0);
        assert_eq!(graph.edge(1, 0, Direction::Forward).unwrap().weight, 10.0);
    }

    #[test]
    fn dual_edge_skips_infinite_sides() {
        let mut graph = MetaGraph::with_vertices(2);
        graph.add_dual_edge(0, 1, 4.0, Weight::INFINITY);

        assert_eq!(graph.edges(0).count(), 1);
        assert!(graph.edge(0, 1, Direction::Backward).is_none());
        assert_eq!(graph.edge(1, 0, Direction::Backward).unwrap().weight, 4.0);
    }

    #[test]
    fn remove_edge_drops_all_direction_flags() {
        let mut graph = MetaGraph::with_vertices(3);
        graph.add_dual_edge(0, 1, 1.0, 10.0);
        graph.add_dual_edge(0, 2, 1.0, 1.0);

        graph.remove_edge(0, 1);

        assert!(graph.edges(0).all(|edge| edge.head != 1));
        // Mirrors at vertex 1 are untouched.
        assert_eq!(graph.edges(1).count(), 2);
    }

    #[test]
    fn disconnect_removes_both_sides() {
        let mut graph = MetaGraph::with_vertices(3);
        graph.add_dual_edge(0, 1, 1.0, 1.0);
        graph.add_dual_edge(1, 2, 2.0, 2.0);

        graph.disconnect(1);

        assert_eq!(graph.edges(1).count(), 0);
        assert_eq!(graph.edges(0).count(), 0);
        assert_eq!(graph.edges(2).count(), 0);
        assert_eq!(graph.number_of_edges(), 0);
    }
}
