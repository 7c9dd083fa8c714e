use serde::{Deserialize, Serialize};

use crate::graphs::{meta_graph::MetaGraph, Direction, Vertex, Weight, WEIGHT_TOLERANCE};

pub mod hierarchy_builder;
pub mod lazy_queue;
pub mod vertex_info;
pub mod weight_handler;
pub mod witness_search;

/// Tuning knobs of the preprocessor.
#[derive(Clone, Copy, Debug, Serialize, Deserialize)]
pub struct ContractionParams {
    /// Coefficient of `|kept shortcuts| - |neighbours|` in the priority.
    pub difference_factor: f64,
    /// Coefficient of the vertex depth in the priority.
    pub depth_factor: f64,
    /// Coefficient of the contracted-neighbour count in the priority.
    pub contracted_factor: f64,
    /// Consecutive lazy-pop misses tolerated before the queue is rebuilt.
    pub queue_miss_window: u32,
    /// Absolute tolerance for weight comparisons, shared by the dual-edge
    /// payload rule and the witness pruning.
    pub weight_tolerance: Weight,
}

impl Default for ContractionParams {
    fn default() -> Self {
        ContractionParams {
            difference_factor: 5.0,
            depth_factor: 5.0,
            contracted_factor: 5.0,
            queue_miss_window: 80,
            weight_tolerance: WEIGHT_TOLERANCE,
        }
    }
}

impl ContractionParams {
    pub fn difference_factor(mut self, factor: f64) -> Self {
        self.difference_factor = factor;
        self
    }

    pub fn depth_factor(mut self, factor: f64) -> Self {
        self.depth_factor = factor;
        self
    }

    pub fn contracted_factor(mut self, factor: f64) -> Self {
        self.contracted_factor = factor;
        self
    }

    pub fn queue_miss_window(mut self, window: u32) -> Self {
        self.queue_miss_window = window;
        self
    }

    pub fn weight_tolerance(mut self, tolerance: Weight) -> Self {
        self.weight_tolerance = tolerance;
        self
    }
}

/// One arc written into the graph during a contraction, as recorded in the
/// summary. Mirrored arcs appear as separate records.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct ShortcutEdge {
    pub tail: Vertex,
    pub head: Vertex,
    pub direction: Direction,
    pub weight: Weight,
    pub via: Vertex,
}

/// Result of a full preprocessing run.
///
/// The working graph is dismantled while contracting, so consumers that
/// need the distance-preserving augmented graph replay the recorded
/// shortcuts onto a copy of the original via [`augment`].
///
/// [`augment`]: ContractionSummary::augment
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct ContractionSummary {
    /// Vertices in contraction order; position is the hierarchy level.
    pub order: Vec<Vertex>,
    pub shortcuts: Vec<ShortcutEdge>,
    /// How often the lazy queue saturated its miss window and was rebuilt.
    pub queue_rebuilds: u32,
}

impl ContractionSummary {
    pub fn augment(&self, original: &MetaGraph) -> MetaGraph {
        let mut augmented = original.clone();
        for shortcut in &self.shortcuts {
            augmented.add_or_update_edge(
                shortcut.tail,
                shortcut.head,
                Some(shortcut.via),
                shortcut.direction,
                shortcut.weight,
            );
        }
        augmented
    }
}
