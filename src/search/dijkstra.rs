use super::collections::vertex_distance_queue::{
    VertexDistanceQueue, VertexDistanceQueueBinaryHeap,
};
use crate::graphs::{meta_graph::MetaGraph, Vertex, Weight};

/// Forward one-to-all Dijkstra over the meta-graph, honoring direction
/// flags. Unreachable vertices keep `+inf`.
pub fn dijkstra_one_to_all(graph: &MetaGraph, source: Vertex) -> Vec<Weight> {
    let mut distances = vec![Weight::INFINITY; graph.number_of_vertices() as usize];
    let mut queue = VertexDistanceQueueBinaryHeap::new();

    distances[source as usize] = 0.0;
    queue.insert(source, 0.0);

    while let Some((tail, distance)) = queue.pop() {
        if distance > distances[tail as usize] {
            // Stale entry, a cheaper path was already expanded.
            continue;
        }

        for edge in graph.edges(tail) {
            if !edge.direction.allows_forward() {
                continue;
            }

            let alternative = distance + edge.weight;
            if alternative < distances[edge.head as usize] {
                distances[edge.head as usize] = alternative;
                queue.insert(edge.head, alternative);
            }
        }
    }

    distances
}
