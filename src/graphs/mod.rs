use serde::{Deserialize, Serialize};

pub mod meta_graph;
pub mod witness_graph;

pub type Vertex = u32;
pub type Weight = f64;
pub type Level = u32;

/// Absolute tolerance under which a forward and a backward weight are
/// considered equal and collapse into a single `Direction::Both` edge.
pub const WEIGHT_TOLERANCE: Weight = 0.1;

/// Traversal sense of an edge entry relative to its stored tail.
///
/// An entry `(tail, head, Forward, w)` is the traversal `tail -> head` at
/// cost `w`; `Backward` is the traversal `head -> tail`; `Both` allows
/// either. Every logical arc is stored from both endpoints, so `Forward`
/// at one endpoint mirrors as `Backward` at the other.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Direction {
    Both,
    Forward,
    Backward,
}

impl Direction {
    pub fn allows_forward(self) -> bool {
        matches!(self, Direction::Both | Direction::Forward)
    }

    pub fn allows_backward(self) -> bool {
        matches!(self, Direction::Both | Direction::Backward)
    }
}

/// Tailless edge payload stored in the tail's adjacency list.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct MetaEdge {
    pub head: Vertex,
    pub direction: Direction,
    pub weight: Weight,
    /// Vertex whose contraction produced this edge, `None` for original
    /// edges.
    pub via: Option<Vertex>,
}
