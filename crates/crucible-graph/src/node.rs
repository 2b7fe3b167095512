use crucible_types::Target;
use petgraph::stable_graph::NodeIndex;

/// A vertex in the [`crate::BuildGraph`] — a target plus the handful of
/// things that only make sense once the target is placed in a graph.
///
/// Links to predecessors/successors are not stored here directly; they live
/// in the underlying `petgraph` edge list and are looked up by `index`
/// (spec.md §9: "stable integer index, not pointer").
#[derive(Debug, Clone)]
pub struct BuildNode {
    pub target: Target,
    pub(crate) index: NodeIndex,
}

impl BuildNode {
    pub fn index(&self) -> NodeIndex {
        self.index
    }
}
