use itertools::Itertools;

use crate::graphs::{
    meta_graph::MetaGraph, witness_graph::WitnessGraph, Level, Vertex, Weight,
};

use super::{weight_handler::WeightHandler, ContractionParams};

/// One distinct neighbour of the candidate vertex `v` with the best
/// weights in both orientations.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct RelevantEdge {
    pub neighbor: Vertex,
    /// Best weight `v -> neighbor`.
    pub out_weight: Weight,
    /// Best weight `neighbor -> v`.
    pub in_weight: Weight,
}

/// Shortcut candidate for the ordered neighbour pair `(tail, head)`.
/// `forward` is the weight of `tail -> v -> head`, `backward` the weight
/// of `head -> v -> tail`; a side pruned by the witness graph is `+inf`.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct CandidateShortcut {
    pub tail: Vertex,
    pub head: Vertex,
    pub forward: Weight,
    pub backward: Weight,
}

/// Everything the driver needs to decide on and perform the contraction
/// of one vertex, computed against a snapshot of the shared state.
#[derive(Clone, Debug)]
pub struct VertexInfo {
    pub vertex: Vertex,
    pub depth: Level,
    pub contracted_neighbors: u32,
    pub relevant_edges: Vec<RelevantEdge>,
    /// Candidates that survived witness pruning.
    pub shortcuts: Vec<CandidateShortcut>,
    /// Whether any candidate side was dropped because the witness graph
    /// already certified a strictly cheaper path.
    pub witness_pruned: bool,
    pub priority: f64,
}

pub fn build_vertex_info(
    graph: &MetaGraph,
    witness: &WitnessGraph,
    handler: &dyn WeightHandler,
    params: &ContractionParams,
    vertex: Vertex,
    depth: Level,
    contracted_neighbors: u32,
) -> VertexInfo {
    let relevant_edges = relevant_edges(graph, handler, vertex);
    let mut shortcuts = candidate_shortcuts(handler, &relevant_edges);
    let witness_pruned = remove_shortcuts(&mut shortcuts, witness, params.weight_tolerance);

    let priority = params.difference_factor
        * (shortcuts.len() as f64 - relevant_edges.len() as f64)
        + params.depth_factor * depth as f64
        + params.contracted_factor * contracted_neighbors as f64;

    VertexInfo {
        vertex,
        depth,
        contracted_neighbors,
        relevant_edges,
        shortcuts,
        witness_pruned,
        priority,
    }
}

/// Distinct neighbours of `vertex` with their best weights in both
/// orientations. The adjacency list is sorted by head, so neighbours
/// arrive grouped.
fn relevant_edges(graph: &MetaGraph, handler: &dyn WeightHandler, vertex: Vertex) -> Vec<RelevantEdge> {
    let mut edges: Vec<RelevantEdge> = Vec::new();

    for edge in graph.edges(vertex) {
        if edge.head == vertex {
            continue;
        }

        let weight = handler.metric(edge.weight);
        if edges.last().map(|last| last.neighbor) != Some(edge.head) {
            edges.push(RelevantEdge {
                neighbor: edge.head,
                out_weight: Weight::INFINITY,
                in_weight: Weight::INFINITY,
            });
        }

        let entry = edges.last_mut().unwrap();
        if edge.direction.allows_forward() && weight < entry.out_weight {
            entry.out_weight = weight;
        }
        if edge.direction.allows_backward() && weight < entry.in_weight {
            entry.in_weight = weight;
        }
    }

    edges
}

/// All ordered neighbour pairs routed through the candidate vertex. Pairs
/// without a finite side are not materialised.
fn candidate_shortcuts(
    handler: &dyn WeightHandler,
    relevant_edges: &[RelevantEdge],
) -> Vec<CandidateShortcut> {
    relevant_edges
        .iter()
        .cartesian_product(relevant_edges.iter())
        .filter(|(tail_edge, head_edge)| tail_edge.neighbor != head_edge.neighbor)
        .filter_map(|(tail_edge, head_edge)| {
            let forward = combine(handler, tail_edge.in_weight, head_edge.out_weight);
            let backward = combine(handler, head_edge.in_weight, tail_edge.out_weight);
            if !forward.is_finite() && !backward.is_finite() {
                return None;
            }

            Some(CandidateShortcut {
                tail: tail_edge.neighbor,
                head: head_edge.neighbor,
                forward,
                backward,
            })
        })
        .collect()
}

fn combine(handler: &dyn WeightHandler, first: Weight, second: Weight) -> Weight {
    if first.is_finite() && second.is_finite() {
        handler.combine(first, second)
    } else {
        Weight::INFINITY
    }
}

/// Drops every candidate side for which the witness graph certifies a
/// path cheaper by more than the tolerance, and whole candidates once
/// both sides are gone. Returns whether any witness was used.
///
/// The margin matters: the witness entry for a pair is routinely the
/// `tail -> v -> head` path itself, seeded by the two-hop search, and an
/// equal-weight witness must not prune the shortcut that replaces it.
fn remove_shortcuts(
    candidates: &mut Vec<CandidateShortcut>,
    witness: &WitnessGraph,
    tolerance: Weight,
) -> bool {
    let mut pruned = false;

    for candidate in candidates.iter_mut() {
        if candidate.forward.is_finite()
            && witness.weight(candidate.tail, candidate.head) <= candidate.forward - tolerance
        {
            candidate.forward = Weight::INFINITY;
            pruned = true;
        }
        if candidate.backward.is_finite()
            && witness.weight(candidate.head, candidate.tail) <= candidate.backward - tolerance
        {
            candidate.backward = Weight::INFINITY;
            pruned = true;
        }
    }

    candidates.retain(|candidate| candidate.forward.is_finite() || candidate.backward.is_finite());

    pruned
}
