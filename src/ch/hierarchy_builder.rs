use ahash::{HashSet, HashSetExt};
use fixedbitset::FixedBitSet;
use indicatif::ParallelProgressIterator;
use log::{debug, info};
use rand::prelude::SliceRandom;
use rayon::prelude::*;

use crate::{
    graphs::{
        meta_graph::MetaGraph, witness_graph::WitnessGraph, Direction, Level, Vertex, Weight,
    },
    utility::get_progressbar,
};

use super::{
    lazy_queue::{LazyPriorityQueue, Pop},
    vertex_info::{build_vertex_info, CandidateShortcut, VertexInfo},
    weight_handler::{ContractionError, MetricHandler, WeightHandler},
    witness_search::{neighborhood_witnesses, NeighborWitness},
    ContractionParams, ContractionSummary, ShortcutEdge,
};

const PROGRESS_STEP: f64 = 5.0;

/// Builds a contraction hierarchy over a dual-weighted routing graph.
///
/// The builder owns every piece of shared state for the duration of the
/// run: the routing graph (borrowed mutably), the witness graph, the
/// contracted flags, the depth and contracted-neighbour bookkeeping, the
/// lazy queue and the deferred witness-refresh set. The graph is
/// dismantled in place while contracting; the inserted shortcut arcs and
/// the contraction order come back in the [`ContractionSummary`].
///
/// Construction seeds the witness graph from every vertex, so a fresh
/// builder can be driven stepwise through [`contract_vertex`] as well as
/// all at once through [`run`].
///
/// [`contract_vertex`]: HierarchyBuilder::contract_vertex
/// [`run`]: HierarchyBuilder::run
pub struct HierarchyBuilder<'a> {
    graph: &'a mut MetaGraph,
    handler: Box<dyn WeightHandler>,
    params: ContractionParams,
    witness: WitnessGraph,
    contracted: FixedBitSet,
    depth: Vec<Level>,
    contracted_neighbors: Vec<u32>,
    queue: LazyPriorityQueue,
    refresh: HashSet<Vertex>,
    order: Vec<Vertex>,
    shortcuts: Vec<ShortcutEdge>,
    queue_rebuilds: u32,
}

impl<'a> HierarchyBuilder<'a> {
    pub fn new(
        graph: &'a mut MetaGraph,
        params: ContractionParams,
    ) -> Result<Self, ContractionError> {
        Self::with_handler(graph, Box::new(MetricHandler), params)
    }

    pub fn with_handler(
        graph: &'a mut MetaGraph,
        handler: Box<dyn WeightHandler>,
        params: ContractionParams,
    ) -> Result<Self, ContractionError> {
        if !handler.supports(graph) {
            return Err(ContractionError::UnsupportedWeightHandler);
        }

        let number_of_vertices = graph.number_of_vertices() as usize;
        let mut builder = HierarchyBuilder {
            graph,
            handler,
            params,
            witness: WitnessGraph::new(),
            contracted: FixedBitSet::with_capacity(number_of_vertices),
            depth: vec![0; number_of_vertices],
            contracted_neighbors: vec![0; number_of_vertices],
            queue: LazyPriorityQueue::new(params.queue_miss_window),
            refresh: HashSet::new(),
            order: Vec::new(),
            shortcuts: Vec::new(),
            queue_rebuilds: 0,
        };
        builder.initialize_witnesses();

        Ok(builder)
    }

    /// Contracts every vertex and returns the summary. The borrowed graph
    /// ends up with no edges; consumers reassemble the augmented graph
    /// through [`ContractionSummary::augment`].
    pub fn run(mut self) -> ContractionSummary {
        let number_of_vertices = self.graph.number_of_vertices();

        info!("Setting up queue");
        self.calculate_queue();

        info!("Start contracting");
        let bar = get_progressbar("Contracting", number_of_vertices as u64);
        let mut next_goal = PROGRESS_STEP;

        loop {
            while let Some(vertex_info) = self.select_next() {
                self.apply_contraction(&vertex_info);
                bar.inc(1);

                let progress =
                    self.order.len() as f64 / number_of_vertices.max(1) as f64 * 100.0;
                if progress >= next_goal {
                    info!("Progress: {:.2}%", progress);
                    next_goal += PROGRESS_STEP;
                }
            }

            // The queue can drain while vertices remain, e.g. right after
            // a window saturation consumed the last entries.
            if self.contracted.count_ones(..) as u32 == number_of_vertices {
                break;
            }
            self.calculate_queue();
        }
        bar.finish_and_clear();

        // Late refresh entries from the last contractions.
        self.flush_witnesses();

        info!(
            "Finished contracting: {} vertices, {} shortcut edges, {} queue rebuilds",
            self.order.len(),
            self.shortcuts.len(),
            self.queue_rebuilds
        );

        ContractionSummary {
            order: self.order,
            shortcuts: self.shortcuts,
            queue_rebuilds: self.queue_rebuilds,
        }
    }

    /// Evaluates and contracts one chosen vertex. This is the stepwise
    /// entry point; [`run`](HierarchyBuilder::run) drives the same path
    /// through the lazy queue.
    pub fn contract_vertex(&mut self, vertex: Vertex) {
        debug_assert!(!self.is_contracted(vertex));
        let vertex_info = self.evaluate(vertex);
        self.apply_contraction(&vertex_info);
    }

    pub fn is_contracted(&self, vertex: Vertex) -> bool {
        self.contracted.contains(vertex as usize)
    }

    /// Maximum `depth(u) + 1` over the already contracted neighbours `u`.
    pub fn depth(&self, vertex: Vertex) -> Level {
        debug_assert!(!self.is_contracted(vertex));
        self.depth[vertex as usize]
    }

    pub fn contracted_neighbors(&self, vertex: Vertex) -> u32 {
        debug_assert!(!self.is_contracted(vertex));
        self.contracted_neighbors[vertex as usize]
    }

    pub fn witness_weight(&self, tail: Vertex, head: Vertex) -> Weight {
        self.witness.weight(tail, head)
    }

    /// Seeds the witness graph by running the neighbourhood search from
    /// every vertex. The searches are pure reads and evaluate in
    /// parallel; the merge into the witness graph is serial.
    fn initialize_witnesses(&mut self) {
        let graph: &MetaGraph = &self.graph;
        let contracted = &self.contracted;
        let number_of_vertices = graph.number_of_vertices();

        let batches: Vec<Vec<NeighborWitness>> = (0..number_of_vertices)
            .into_par_iter()
            .progress_with(get_progressbar(
                "Seeding witness graph",
                number_of_vertices as u64,
            ))
            .map(|source| neighborhood_witnesses(graph, contracted, source, None))
            .collect();

        for witness in batches.iter().flatten() {
            apply_witness(&mut self.witness, witness);
        }
    }

    /// Re-evaluates every uncontracted vertex and rebuilds the queue from
    /// scratch. Pending witness refreshes are drained first so the
    /// evaluations see a current witness graph.
    fn calculate_queue(&mut self) {
        drain_refresh(
            &self.graph,
            &self.contracted,
            &mut self.witness,
            &mut self.refresh,
        );

        let graph: &MetaGraph = &self.graph;
        let witness = &self.witness;
        let handler = self.handler.as_ref();
        let params = &self.params;
        let depth = &self.depth;
        let contracted_neighbors = &self.contracted_neighbors;

        let mut vertices: Vec<Vertex> = graph
            .vertices()
            .filter(|&vertex| !self.contracted.contains(vertex as usize))
            .collect();
        vertices.shuffle(&mut rand::thread_rng());

        let bar = get_progressbar("Evaluating queue", vertices.len() as u64);
        let priorities: Vec<(Vertex, f64)> = vertices
            .into_par_iter()
            .progress_with(bar)
            .map(|vertex| {
                let vertex_info = build_vertex_info(
                    graph,
                    witness,
                    handler,
                    params,
                    vertex,
                    depth[vertex as usize],
                    contracted_neighbors[vertex as usize],
                );
                (vertex, vertex_info.priority)
            })
            .collect();

        self.queue.rebuild(priorities);
    }

    /// Lazy selection loop: pop, re-evaluate, accept on matching
    /// priority. Saturation of the miss window rebuilds the queue.
    fn select_next(&mut self) -> Option<VertexInfo> {
        loop {
            let graph: &MetaGraph = &self.graph;
            let witness = &mut self.witness;
            let refresh = &mut self.refresh;
            let contracted = &self.contracted;
            let handler = self.handler.as_ref();
            let params = &self.params;
            let depth = &self.depth;
            let contracted_neighbors = &self.contracted_neighbors;

            let outcome = self.queue.pop_with(contracted, |vertex| {
                if count_refresh_neighbors(graph, refresh, vertex) >= 2 {
                    drain_refresh(graph, contracted, witness, refresh);
                }
                let vertex_info = build_vertex_info(
                    graph,
                    witness,
                    handler,
                    params,
                    vertex,
                    depth[vertex as usize],
                    contracted_neighbors[vertex as usize],
                );
                (vertex_info.priority, vertex_info)
            });

            match outcome {
                Pop::Selected(vertex, vertex_info) => {
                    debug!("Selected vertex {} for contraction", vertex);
                    return Some(vertex_info);
                }
                Pop::Saturated => {
                    info!("Queue miss window saturated, recalculating queue");
                    self.queue_rebuilds += 1;
                    self.calculate_queue();
                }
                Pop::Empty => return None,
            }
        }
    }

    /// The contraction proper: removes the vertex from the routing and
    /// witness graphs, inserts the surviving shortcuts and updates the
    /// neighbour bookkeeping.
    fn apply_contraction(&mut self, vertex_info: &VertexInfo) {
        let vertex = vertex_info.vertex;

        // Downward removal: the neighbours lose their arcs toward the
        // vertex first, so it disappears from every uncontracted
        // adjacency.
        for edge in &vertex_info.relevant_edges {
            self.graph.remove_edge(edge.neighbor, vertex);
        }

        for candidate in &vertex_info.shortcuts {
            self.insert_shortcut(vertex, candidate);
        }

        self.contracted.insert(vertex as usize);

        for edge in &vertex_info.relevant_edges {
            let neighbor = edge.neighbor as usize;
            self.depth[neighbor] = self.depth[neighbor].max(vertex_info.depth + 1);
            self.contracted_neighbors[neighbor] += 1;
            self.witness.remove_edge(edge.neighbor, vertex);
        }

        // Bulk purge of the remaining incident edges; depth and
        // contracted-neighbour entries of the vertex are dead from here
        // on.
        self.witness.disconnect(vertex);
        self.graph.disconnect(vertex);

        self.order.push(vertex);
    }

    /// Writes one surviving candidate into the graph, mirrored on both
    /// endpoint orderings. Near-symmetric weights collapse into a single
    /// `Both` arc per endpoint.
    fn insert_shortcut(&mut self, via: Vertex, candidate: &CandidateShortcut) {
        let CandidateShortcut {
            tail,
            head,
            forward,
            backward,
        } = *candidate;

        if tail == head {
            // Degenerate candidate from parallel edges.
            return;
        }

        let forward_usable = forward.is_finite() && forward > 0.0;
        let backward_usable = backward.is_finite() && backward > 0.0;

        if forward_usable
            && backward_usable
            && (forward - backward).abs() < self.params.weight_tolerance
        {
            self.add_shortcut_edge(tail, head, via, Direction::Both, forward);
            self.add_shortcut_edge(head, tail, via, Direction::Both, forward);
        } else {
            if forward_usable {
                self.add_shortcut_edge(tail, head, via, Direction::Forward, forward);
                self.add_shortcut_edge(head, tail, via, Direction::Backward, forward);
            }
            if backward_usable {
                self.add_shortcut_edge(tail, head, via, Direction::Backward, backward);
                self.add_shortcut_edge(head, tail, via, Direction::Forward, backward);
            }
        }

        if forward_usable || backward_usable {
            self.refresh.insert(tail);
            self.refresh.insert(head);
        }
    }

    fn add_shortcut_edge(
        &mut self,
        tail: Vertex,
        head: Vertex,
        via: Vertex,
        direction: Direction,
        weight: Weight,
    ) {
        let changed =
            self.handler
                .add_or_update_edge(self.graph, tail, head, Some(via), direction, weight);
        if changed {
            self.shortcuts.push(ShortcutEdge {
                tail,
                head,
                direction,
                weight,
                via,
            });
        }
    }

    fn evaluate(&mut self, vertex: Vertex) -> VertexInfo {
        let graph: &MetaGraph = &self.graph;
        if count_refresh_neighbors(graph, &self.refresh, vertex) >= 2 {
            drain_refresh(
                graph,
                &self.contracted,
                &mut self.witness,
                &mut self.refresh,
            );
        }

        build_vertex_info(
            &self.graph,
            &self.witness,
            self.handler.as_ref(),
            &self.params,
            vertex,
            self.depth[vertex as usize],
            self.contracted_neighbors[vertex as usize],
        )
    }

    fn flush_witnesses(&mut self) {
        drain_refresh(
            &self.graph,
            &self.contracted,
            &mut self.witness,
            &mut self.refresh,
        );
    }
}

/// Distinct neighbours of the vertex that await a witness refresh,
/// counted up to the drain threshold of two.
fn count_refresh_neighbors(graph: &MetaGraph, refresh: &HashSet<Vertex>, vertex: Vertex) -> usize {
    if refresh.len() < 2 {
        return 0;
    }

    let mut hits = 0;
    let mut last = None;
    for edge in graph.edges(vertex) {
        if last == Some(edge.head) {
            continue;
        }
        last = Some(edge.head);

        if refresh.contains(&edge.head) {
            hits += 1;
            if hits >= 2 {
                break;
            }
        }
    }

    hits
}

/// Drains the refresh set: re-runs the neighbourhood search from every
/// still-uncontracted member, restricted to the set itself, and
/// min-merges the results into the witness graph. Compacts the witness
/// graph when it got sparse.
fn drain_refresh(
    graph: &MetaGraph,
    contracted: &FixedBitSet,
    witness: &mut WitnessGraph,
    refresh: &mut HashSet<Vertex>,
) {
    if refresh.is_empty() {
        return;
    }

    let targets = std::mem::take(refresh);
    for &source in &targets {
        if contracted.contains(source as usize) {
            continue;
        }
        for neighbor_witness in neighborhood_witnesses(graph, contracted, source, Some(&targets)) {
            apply_witness(witness, &neighbor_witness);
        }
    }

    if witness.should_compress() {
        witness.compress();
    }
}

fn apply_witness(witness: &mut WitnessGraph, neighbor_witness: &NeighborWitness) {
    if neighbor_witness.forward.is_finite() {
        witness.add_or_update_edge(
            neighbor_witness.source,
            neighbor_witness.target,
            neighbor_witness.forward,
        );
    }
    if neighbor_witness.backward.is_finite() {
        witness.add_or_update_edge(
            neighbor_witness.target,
            neighbor_witness.source,
            neighbor_witness.backward,
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn symmetric_path_graph() -> MetaGraph {
        let mut graph = MetaGraph::with_vertices(3);
        graph.add_dual_edge(0, 1, 1.0, 1.0);
        graph.add_dual_edge(1, 2, 1.0, 1.0);
        graph
    }

    #[test]
    fn self_loop_candidate_is_skipped() {
        let mut graph = symmetric_path_graph();
        let mut builder =
            HierarchyBuilder::new(&mut graph, ContractionParams::default()).unwrap();

        let candidate = CandidateShortcut {
            tail: 0,
            head: 0,
            forward: 2.0,
            backward: 2.0,
        };
        builder.insert_shortcut(1, &candidate);

        assert!(builder.shortcuts.is_empty());
        assert!(builder.refresh.is_empty());
        assert_eq!(builder.graph.number_of_edges(), 4);
    }

    #[test]
    fn unusable_candidate_sides_are_not_written() {
        let mut graph = symmetric_path_graph();
        let mut builder =
            HierarchyBuilder::new(&mut graph, ContractionParams::default()).unwrap();

        let candidate = CandidateShortcut {
            tail: 0,
            head: 2,
            forward: Weight::INFINITY,
            backward: Weight::INFINITY,
        };
        builder.insert_shortcut(1, &candidate);

        assert!(builder.shortcuts.is_empty());
        assert!(builder.refresh.is_empty());
    }

    #[test]
    fn shortcut_insertion_fills_refresh_set() {
        let mut graph = symmetric_path_graph();
        let mut builder =
            HierarchyBuilder::new(&mut graph, ContractionParams::default()).unwrap();

        let candidate = CandidateShortcut {
            tail: 0,
            head: 2,
            forward: 2.0,
            backward: 2.0,
        };
        builder.insert_shortcut(1, &candidate);

        assert_eq!(builder.shortcuts.len(), 2);
        assert!(builder.refresh.contains(&0));
        assert!(builder.refresh.contains(&2));
    }
}
