//! Per-node execution state machine (spec.md §4.6).
//!
//! `Pending -> Ready -> Running -> {Completed, Cached, Failed, Skipped}`.
//! Only `Completed` and `Cached` enqueue successors.

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeState {
    Pending,
    Ready,
    Running,
    Completed,
    Cached,
    Failed,
    Skipped,
}

impl NodeState {
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            NodeState::Completed | NodeState::Cached | NodeState::Failed | NodeState::Skipped
        )
    }

    pub fn enqueues_successors(self) -> bool {
        matches!(self, NodeState::Completed | NodeState::Cached)
    }
}

#[derive(Debug, Clone, Default)]
pub struct NodeTiming {
    pub duration: Option<std::time::Duration>,
}
