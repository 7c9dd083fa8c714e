use ahash::{HashMap, HashMapExt, HashSet, HashSetExt};
use serde::{Deserialize, Serialize};

use super::{Vertex, Weight};

/// Directed graph with a single scalar weight per ordered vertex pair,
/// used as a bound oracle during contraction.
///
/// Updates keep the minimum weight seen for a pair. A reverse index is
/// maintained so removing a vertex's incident edges stays proportional to
/// its degree. The vertex range may lag behind the routing graph; rows
/// that were never touched are implicit `+inf`.
#[derive(Clone, Default, Serialize, Deserialize)]
pub struct WitnessGraph {
    out_edges: Vec<HashMap<Vertex, Weight>>,
    in_edges: Vec<HashSet<Vertex>>,
}

impl WitnessGraph {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn number_of_vertices(&self) -> u32 {
        self.out_edges.len() as u32
    }

    pub fn edge_count(&self) -> usize {
        self.out_edges.iter().map(HashMap::len).sum()
    }

    /// Allocated entry slots, live or not.
    pub fn edge_space(&self) -> usize {
        self.out_edges.iter().map(HashMap::capacity).sum()
    }

    pub fn get(&self, tail: Vertex, head: Vertex) -> Option<Weight> {
        self.out_edges.get(tail as usize)?.get(&head).copied()
    }

    /// Weight of the pair, `+inf` when absent.
    pub fn weight(&self, tail: Vertex, head: Vertex) -> Weight {
        self.get(tail, head).unwrap_or(Weight::INFINITY)
    }

    /// Keeps the minimum weight for the pair.
    pub fn add_or_update_edge(&mut self, tail: Vertex, head: Vertex, weight: Weight) {
        let highest = tail.max(head);
        if (self.out_edges.len() as u32) <= highest {
            self.out_edges.resize(highest as usize + 1, HashMap::new());
            self.in_edges.resize(highest as usize + 1, HashSet::new());
        }

        let entry = self.out_edges[tail as usize]
            .entry(head)
            .or_insert(Weight::INFINITY);
        if weight < *entry {
            *entry = weight;
        }
        self.in_edges[head as usize].insert(tail);
    }

    pub fn remove_edge(&mut self, tail: Vertex, head: Vertex) {
        if let Some(edges) = self.out_edges.get_mut(tail as usize) {
            edges.remove(&head);
        }
        if let Some(tails) = self.in_edges.get_mut(head as usize) {
            tails.remove(&tail);
        }
    }

    /// Removes every edge incident to the vertex, in both directions.
    pub fn disconnect(&mut self, vertex: Vertex) {
        if let Some(edges) = self.out_edges.get_mut(vertex as usize) {
            for (head, _) in std::mem::take(edges) {
                if let Some(tails) = self.in_edges.get_mut(head as usize) {
                    tails.remove(&vertex);
                }
            }
        }

        if let Some(tails) = self.in_edges.get_mut(vertex as usize) {
            for tail in std::mem::take(&mut *tails) {
                if let Some(edges) = self.out_edges.get_mut(tail as usize) {
                    edges.remove(&vertex);
                }
            }
        }
    }

    pub fn should_compress(&self) -> bool {
        self.edge_space() > 4 * self.edge_count()
    }

    /// In-place compaction of the per-vertex buckets.
    pub fn compress(&mut self) {
        for edges in &mut self.out_edges {
            edges.shrink_to_fit();
        }
        for tails in &mut self.in_edges {
            tails.shrink_to_fit();
        }
    }
}
