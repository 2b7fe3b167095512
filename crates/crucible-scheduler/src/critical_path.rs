//! Critical-path length estimation for ready-queue priority (spec.md §4.6).
//!
//! Computed once after graph construction: the longest chain of estimated
//! action durations from a node to any sink. Longer-critical-path-first
//! minimizes makespan under a shared worker pool.

use crucible_graph::BuildGraph;
use petgraph::stable_graph::NodeIndex;
use std::collections::HashMap;

/// Estimated duration for a single action when no prior-build history is
/// available (spec.md §4.6: "default estimate: 1 unit for untimed actions").
pub const DEFAULT_ACTION_DURATION: u64 = 1;

/// Computes, for every node, the length of the longest path from that node
/// to a sink (a node with no successors), in duration units.
///
/// `duration_of` supplies a per-node estimate, e.g. from prior-build
/// history; nodes with no history use [`DEFAULT_ACTION_DURATION`].
pub fn compute(graph: &BuildGraph, duration_of: impl Fn(NodeIndex) -> u64) -> HashMap<NodeIndex, u64> {
    let mut memo: HashMap<NodeIndex, u64> = HashMap::new();
    // Memoized DFS; since the graph is acyclic this terminates regardless
    // of visitation order without needing an explicit topological sort.
    for node in graph.node_indices() {
        visit(graph, node, &duration_of, &mut memo);
    }
    memo
}

fn visit(
    graph: &BuildGraph,
    node: NodeIndex,
    duration_of: &impl Fn(NodeIndex) -> u64,
    memo: &mut HashMap<NodeIndex, u64>,
) -> u64 {
    if let Some(&cached) = memo.get(&node) {
        return cached;
    }
    let own = duration_of(node);
    let best_successor = graph
        .successors(node)
        .into_iter()
        .map(|s| visit(graph, s, duration_of, memo))
        .max()
        .unwrap_or(0);
    let length = own + best_successor;
    memo.insert(node, length);
    length
}

#[cfg(test)]
mod tests {
    use super::*;
    use crucible_types::{Label, Target, TargetKind};

    fn target(label: &str, deps: &[&str]) -> Target {
        Target::new(Label::parse(label).unwrap(), TargetKind::Library, "cpp")
            .with_deps(deps.iter().map(|d| Label::parse(d).unwrap()).collect())
    }

    #[test]
    fn chain_accumulates_length() {
        let graph = BuildGraph::build(vec![
            target("//a:a", &["//b:b"]),
            target("//b:b", &["//c:c"]),
            target("//c:c", &[]),
        ])
        .unwrap();

        let lengths = compute(&graph, |_| DEFAULT_ACTION_DURATION);
        let a = graph.find(&Label::parse("//a:a").unwrap()).unwrap();
        let c = graph.find(&Label::parse("//c:c").unwrap()).unwrap();
        // c is the leaf; it unlocks the longest remaining chain (c -> b -> a).
        assert_eq!(lengths[&c], 3);
        // a has no dependents, so its own critical path length is just itself.
        assert_eq!(lengths[&a], 1);
    }

    #[test]
    fn diamond_takes_the_longer_branch() {
        let graph = BuildGraph::build(vec![
            target("//top:top", &["//left:left", "//right:right"]),
            target("//left:left", &["//bottom:bottom"]),
            target("//right:right", &[]),
            target("//bottom:bottom", &[]),
        ])
        .unwrap();

        let lengths = compute(&graph, |_| DEFAULT_ACTION_DURATION);
        let bottom = graph.find(&Label::parse("//bottom:bottom").unwrap()).unwrap();
        // bottom -> left -> top is length 3, the longest chain through bottom.
        assert_eq!(lengths[&bottom], 3);
    }
}
