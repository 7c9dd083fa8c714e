use indicatif::{ProgressBar, ProgressStyle};
use rand::Rng;

use crate::graphs::{meta_graph::MetaGraph, Weight};

pub fn get_progressbar(job_name: &str, len: u64) -> ProgressBar {
    let bar = ProgressBar::new(len);
    bar.set_message(job_name.to_string());
    bar.set_style(
        ProgressStyle::with_template(
            " {msg} {wide_bar} ({percent_precise}%) estimated remaining: {eta_precise}",
        )
        .unwrap(),
    );
    bar
}

/// Random connected-ish dual-weighted graph for tests and benchmarks. A
/// spanning chain keeps the graph from falling apart, the remaining edges
/// are sampled uniformly. Roughly half of the edges get symmetric
/// weights, the rest an independent backward weight. Weights are whole
/// numbers, so path weights compare exactly.
pub fn random_dual_graph(
    number_of_vertices: u32,
    number_of_edges: u32,
    rng: &mut impl Rng,
) -> MetaGraph {
    let mut graph = MetaGraph::with_vertices(number_of_vertices);
    if number_of_vertices < 2 {
        return graph;
    }

    for vertex in 1..number_of_vertices {
        let weight = random_weight(rng);
        graph.add_dual_edge(vertex - 1, vertex, weight, weight);
    }

    let mut inserted = number_of_vertices - 1;
    while inserted < number_of_edges {
        let tail = rng.gen_range(0..number_of_vertices);
        let head = rng.gen_range(0..number_of_vertices);
        if tail == head {
            continue;
        }

        let forward = random_weight(rng);
        let backward = if rng.gen_bool(0.5) {
            forward
        } else {
            random_weight(rng)
        };
        graph.add_dual_edge(tail, head, forward, backward);
        inserted += 1;
    }

    graph
}

fn random_weight(rng: &mut impl Rng) -> Weight {
    rng.gen_range(1..10) as Weight
}
