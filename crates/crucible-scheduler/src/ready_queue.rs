//! The shared ready queue: a priority queue keyed by (critical-path length,
//! label) with workers blocking on a condition variable when it's empty
//! but work remains in flight (spec.md §4.6, §5).

use crucible_types::Label;
use parking_lot::{Condvar, Mutex};
use petgraph::stable_graph::NodeIndex;
use std::cmp::Ordering;
use std::collections::BinaryHeap;

#[derive(Debug, Clone, Eq, PartialEq)]
struct ReadyItem {
    critical_path_len: u64,
    label: Label,
    node: NodeIndex,
}

impl Ord for ReadyItem {
    fn cmp(&self, other: &Self) -> Ordering {
        // Longer critical path first; break ties by lexical label so two
        // runs over the same graph dequeue in the same order.
        self.critical_path_len
            .cmp(&other.critical_path_len)
            .then_with(|| other.label.cmp(&self.label))
    }
}

impl PartialOrd for ReadyItem {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

pub struct ReadyQueue {
    heap: Mutex<BinaryHeap<ReadyItem>>,
    condvar: Condvar,
}

impl ReadyQueue {
    pub fn new() -> Self {
        Self {
            heap: Mutex::new(BinaryHeap::new()),
            condvar: Condvar::new(),
        }
    }

    pub fn push(&self, node: NodeIndex, label: Label, critical_path_len: u64) {
        let mut heap = self.heap.lock();
        heap.push(ReadyItem {
            critical_path_len,
            label,
            node,
        });
        self.condvar.notify_one();
    }

    /// Pops the highest-priority ready node, or returns `None` if the queue
    /// is empty and `still_waiting` says no more items can ever arrive
    /// (every in-flight action has finished).
    pub fn pop(&self, still_waiting: impl Fn() -> bool) -> Option<NodeIndex> {
        let mut heap = self.heap.lock();
        loop {
            if let Some(item) = heap.pop() {
                return Some(item.node);
            }
            if !still_waiting() {
                return None;
            }
            self.condvar.wait(&mut heap);
        }
    }

    /// Wakes every worker blocked in `pop`, e.g. on cancellation so they can
    /// observe it and exit instead of waiting forever.
    pub fn wake_all(&self) {
        self.condvar.notify_all();
    }
}

impl Default for ReadyQueue {
    fn default() -> Self {
        Self::new()
    }
}
