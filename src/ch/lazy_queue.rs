use std::{cmp::Ordering, collections::BinaryHeap};

use fixedbitset::FixedBitSet;

use crate::graphs::Vertex;

#[derive(Clone, Copy, Debug)]
struct QueueEntry {
    vertex: Vertex,
    priority: f64,
}

// The queue depends on `Ord`. The ordering on priorities is flipped so
// the heap becomes a min-heap; ties fall back to the vertex id to keep
// `PartialEq` and `Ord` consistent.
impl Ord for QueueEntry {
    fn cmp(&self, other: &Self) -> Ordering {
        other
            .priority
            .total_cmp(&self.priority)
            .then_with(|| self.vertex.cmp(&other.vertex))
    }
}

impl PartialOrd for QueueEntry {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl PartialEq for QueueEntry {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for QueueEntry {}

/// Outcome of one lazy pop.
#[derive(Debug)]
pub enum Pop<T> {
    /// The popped vertex still had its stored priority.
    Selected(Vertex, T),
    /// The miss window is exhausted; the caller must rebuild the queue.
    Saturated,
    Empty,
}

/// Min-heap over `(vertex, priority)` with lazy re-evaluation.
///
/// Entries are never updated in place: a popped vertex is re-evaluated,
/// accepted if the priority still matches, and pushed back at the new
/// priority otherwise. Entries for contracted vertices are discarded on
/// pop. After `miss_window` consecutive mismatches the queue reports
/// saturation instead of spinning on stale priorities.
pub struct LazyPriorityQueue {
    heap: BinaryHeap<QueueEntry>,
    miss_window: u32,
    miss_streak: u32,
}

impl LazyPriorityQueue {
    pub fn new(miss_window: u32) -> Self {
        LazyPriorityQueue {
            heap: BinaryHeap::new(),
            miss_window,
            miss_streak: 0,
        }
    }

    pub fn len(&self) -> usize {
        self.heap.len()
    }

    pub fn is_empty(&self) -> bool {
        self.heap.is_empty()
    }

    pub fn push(&mut self, vertex: Vertex, priority: f64) {
        self.heap.push(QueueEntry { vertex, priority });
    }

    /// Drops all entries and the miss streak, then refills from the given
    /// evaluations.
    pub fn rebuild(&mut self, priorities: impl IntoIterator<Item = (Vertex, f64)>) {
        self.heap.clear();
        self.miss_streak = 0;
        self.heap.extend(
            priorities
                .into_iter()
                .map(|(vertex, priority)| QueueEntry { vertex, priority }),
        );
    }

    /// Pops the next vertex whose re-evaluated priority matches its
    /// stored one. `evaluate` returns the current priority together with
    /// a payload handed back on success, so the caller does not evaluate
    /// twice.
    pub fn pop_with<T>(
        &mut self,
        contracted: &FixedBitSet,
        mut evaluate: impl FnMut(Vertex) -> (f64, T),
    ) -> Pop<T> {
        while let Some(entry) = self.heap.pop() {
            if contracted.contains(entry.vertex as usize) {
                continue;
            }

            let (priority, payload) = evaluate(entry.vertex);
            if priority == entry.priority {
                self.miss_streak = 0;
                return Pop::Selected(entry.vertex, payload);
            }

            self.heap.push(QueueEntry {
                vertex: entry.vertex,
                priority,
            });
            self.miss_streak += 1;
            if self.miss_streak >= self.miss_window {
                self.miss_streak = 0;
                return Pop::Saturated;
            }
        }

        Pop::Empty
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn no_contracted(vertices: usize) -> FixedBitSet {
        FixedBitSet::with_capacity(vertices)
    }

    #[test]
    fn accepts_matching_priority() {
        let mut queue = LazyPriorityQueue::new(80);
        queue.push(0, 3.0);
        queue.push(1, 1.0);

        match queue.pop_with(&no_contracted(2), |_| (1.0, ())) {
            Pop::Selected(vertex, ()) => assert_eq!(vertex, 1),
            other => panic!("unexpected outcome: {other:?}"),
        }
    }

    #[test]
    fn repushes_on_changed_priority() {
        let mut queue = LazyPriorityQueue::new(80);
        queue.push(0, 1.0);
        queue.push(1, 2.0);

        // Vertex 0 got more expensive than vertex 1.
        let outcome = queue.pop_with(&no_contracted(2), |vertex| match vertex {
            0 => (5.0, ()),
            _ => (2.0, ()),
        });

        match outcome {
            Pop::Selected(vertex, ()) => assert_eq!(vertex, 1),
            other => panic!("unexpected outcome: {other:?}"),
        }
        assert_eq!(queue.len(), 1);
    }

    #[test]
    fn discards_contracted_entries() {
        let mut queue = LazyPriorityQueue::new(80);
        queue.push(0, 1.0);
        queue.push(1, 2.0);

        let mut contracted = no_contracted(2);
        contracted.insert(0);

        match queue.pop_with(&contracted, |_| (2.0, ())) {
            Pop::Selected(vertex, ()) => assert_eq!(vertex, 1),
            other => panic!("unexpected outcome: {other:?}"),
        }
        assert!(queue.is_empty());
    }

    #[test]
    fn saturates_after_window_of_misses() {
        let mut queue = LazyPriorityQueue::new(80);
        for vertex in 0..100 {
            queue.push(vertex, vertex as f64);
        }

        // Every re-evaluation disagrees with the stored priority.
        let mut attempts = 0;
        let outcome = queue.pop_with(&no_contracted(100), |_| {
            attempts += 1;
            (-1.0, ())
        });

        assert!(matches!(outcome, Pop::Saturated));
        assert_eq!(attempts, 80);

        // The streak was reset; the next pop starts a fresh window and
        // succeeds once an evaluation matches.
        match queue.pop_with(&no_contracted(100), |_| (-1.0, ())) {
            Pop::Selected(..) => {}
            other => panic!("unexpected outcome: {other:?}"),
        }
    }

    #[test]
    fn empty_queue_reports_empty() {
        let mut queue = LazyPriorityQueue::new(80);
        assert!(matches!(
            queue.pop_with(&no_contracted(1), |_| (0.0, ())),
            Pop::Empty
        ));
    }

    #[test]
    fn rebuild_resets_entries_and_streak() {
        let mut queue = LazyPriorityQueue::new(2);
        queue.push(0, 0.0);
        queue.push(1, 0.0);

        assert!(matches!(
            queue.pop_with(&no_contracted(2), |_| (9.0, ())),
            Pop::Saturated
        ));

        queue.rebuild([(0, 9.0), (1, 9.5)]);
        match queue.pop_with(&no_contracted(2), |_| (9.0, ())) {
            Pop::Selected(vertex, ()) => assert_eq!(vertex, 0),
            other => panic!("unexpected outcome: {other:?}"),
        }
    }
}
