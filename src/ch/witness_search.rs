use ahash::{HashMap, HashMapExt, HashSet};
use fixedbitset::FixedBitSet;

use crate::{
    graphs::{meta_graph::MetaGraph, Vertex, Weight},
    search::collections::vertex_distance_queue::{
        VertexDistanceQueue, VertexDistanceQueueDaryHeap,
    },
};

/// Neighbourhood searches only look at the source's neighbours and their
/// neighbours.
const MAX_HOPS: u32 = 2;

/// Best known two-hop distances between a source and one settled target,
/// `+inf` for a direction without a path inside the hop bound.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct NeighborWitness {
    pub source: Vertex,
    pub target: Vertex,
    pub forward: Weight,
    pub backward: Weight,
}

/// Runs a forward and a reverse hop-bounded Dijkstra from `source` over
/// the uncontracted part of the graph and reports the distances to every
/// settled vertex. The emitted weights are realized path weights, so
/// min-merging them into the witness graph keeps it an upper-bound
/// oracle.
///
/// When `targets` is given, each search stops as soon as all targets were
/// settled.
pub fn neighborhood_witnesses(
    graph: &MetaGraph,
    contracted: &FixedBitSet,
    source: Vertex,
    targets: Option<&HashSet<Vertex>>,
) -> Vec<NeighborWitness> {
    let forward = bounded_search(graph, contracted, source, targets, true);
    let backward = bounded_search(graph, contracted, source, targets, false);

    let mut witnesses = Vec::with_capacity(forward.len().max(backward.len()));

    for (&target, &weight) in &forward {
        if target == source {
            continue;
        }
        witnesses.push(NeighborWitness {
            source,
            target,
            forward: weight,
            backward: backward.get(&target).copied().unwrap_or(Weight::INFINITY),
        });
    }

    for (&target, &weight) in &backward {
        if target == source || forward.contains_key(&target) {
            continue;
        }
        witnesses.push(NeighborWitness {
            source,
            target,
            forward: Weight::INFINITY,
            backward: weight,
        });
    }

    witnesses
}

/// Hop-bounded Dijkstra in one traversal sense. `forward_sense` follows
/// edges as `tail -> head`; otherwise edges are walked against their
/// direction, yielding distances `settled vertex -> source`.
fn bounded_search(
    graph: &MetaGraph,
    contracted: &FixedBitSet,
    source: Vertex,
    targets: Option<&HashSet<Vertex>>,
    forward_sense: bool,
) -> HashMap<Vertex, Weight> {
    let mut queue = VertexDistanceQueueDaryHeap::new();
    let mut weights = HashMap::new();
    let mut hops = HashMap::new();
    let mut remaining = targets.cloned();

    queue.insert(source, 0.0);
    weights.insert(source, 0.0);
    hops.insert(source, 0u32);

    while let Some((vertex, distance)) = queue.pop() {
        if distance > weights[&vertex] {
            continue;
        }

        if let Some(remaining) = remaining.as_mut() {
            if remaining.remove(&vertex) && remaining.is_empty() {
                break;
            }
        }

        let vertex_hops = hops[&vertex];
        if vertex_hops == MAX_HOPS {
            continue;
        }

        for edge in graph.edges(vertex) {
            let allowed = if forward_sense {
                edge.direction.allows_forward()
            } else {
                edge.direction.allows_backward()
            };
            if !allowed || contracted.contains(edge.head as usize) {
                continue;
            }

            let alternative_weight = distance + edge.weight;
            let current = weights
                .get(&edge.head)
                .copied()
                .unwrap_or(Weight::INFINITY);
            if alternative_weight < current {
                weights.insert(edge.head, alternative_weight);
                hops.insert(edge.head, vertex_hops + 1);
                queue.insert(edge.head, alternative_weight);
            }
        }
    }

    weights
}

#[cfg(test)]
mod tests {
    use ahash::HashSetExt;

    use super::*;

    fn no_contracted(graph: &MetaGraph) -> FixedBitSet {
        FixedBitSet::with_capacity(graph.number_of_vertices() as usize)
    }

    fn witness_to(witnesses: &[NeighborWitness], target: Vertex) -> Option<&NeighborWitness> {
        witnesses.iter().find(|witness| witness.target == target)
    }

    #[test]
    fn stops_at_two_hops() {
        let mut graph = MetaGraph::with_vertices(4);
        graph.add_dual_edge(0, 1, 1.0, 1.0);
        graph.add_dual_edge(1, 2, 1.0, 1.0);
        graph.add_dual_edge(2, 3, 1.0, 1.0);

        let witnesses = neighborhood_witnesses(&graph, &no_contracted(&graph), 0, None);

        assert_eq!(witness_to(&witnesses, 1).unwrap().forward, 1.0);
        assert_eq!(witness_to(&witnesses, 2).unwrap().forward, 2.0);
        assert!(witness_to(&witnesses, 3).is_none());
    }

    #[test]
    fn direct_edge_beats_detour() {
        // 0 -> 1 -> 2 -> 3 plus the direct 0 -> 3.
        let mut graph = MetaGraph::with_vertices(4);
        graph.add_dual_edge(0, 1, 1.0, f64::INFINITY);
        graph.add_dual_edge(1, 2, 1.0, f64::INFINITY);
        graph.add_dual_edge(2, 3, 1.0, f64::INFINITY);
        graph.add_dual_edge(0, 3, 2.0, f64::INFINITY);

        let witnesses = neighborhood_witnesses(&graph, &no_contracted(&graph), 0, None);

        let to_3 = witness_to(&witnesses, 3).unwrap();
        assert_eq!(to_3.forward, 2.0);
        assert!(to_3.backward.is_infinite());
    }

    #[test]
    fn reverse_sense_uses_backward_weights() {
        let mut graph = MetaGraph::with_vertices(3);
        graph.add_dual_edge(0, 1, 1.0, 10.0);
        graph.add_dual_edge(1, 2, 1.0, 10.0);

        let witnesses = neighborhood_witnesses(&graph, &no_contracted(&graph), 0, None);

        let to_2 = witness_to(&witnesses, 2).unwrap();
        assert_eq!(to_2.forward, 2.0);
        // 2 -> 1 -> 0 pays the backward weights.
        assert_eq!(to_2.backward, 20.0);
    }

    #[test]
    fn skips_contracted_vertices() {
        let mut graph = MetaGraph::with_vertices(3);
        graph.add_dual_edge(0, 1, 1.0, 1.0);
        graph.add_dual_edge(1, 2, 1.0, 1.0);

        let mut contracted = no_contracted(&graph);
        contracted.insert(1);

        let witnesses = neighborhood_witnesses(&graph, &contracted, 0, None);
        assert!(witnesses.is_empty());
    }

    #[test]
    fn target_set_terminates_early() {
        let mut graph = MetaGraph::with_vertices(5);
        graph.add_dual_edge(0, 1, 1.0, 1.0);
        graph.add_dual_edge(0, 2, 5.0, 5.0);
        graph.add_dual_edge(2, 3, 1.0, 1.0);

        let mut targets = HashSet::new();
        targets.insert(0);
        targets.insert(1);

        let witnesses = neighborhood_witnesses(&graph, &no_contracted(&graph), 0, Some(&targets));

        // The search stops once 1 is settled; the costlier branch through
        // 2 is never expanded.
        assert!(witness_to(&witnesses, 1).is_some());
        assert!(witness_to(&witnesses, 3).is_none());
    }
}
