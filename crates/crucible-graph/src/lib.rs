//! The immutable build DAG (spec.md §4.1).
//!
//! Construction resolves every dependency label, rejects cycles with the
//! full cycle path, and is otherwise a thin, read-only wrapper around
//! `petgraph::stable_graph::StableDiGraph` — workers share one `BuildGraph`
//! by reference without locking (spec.md §5).

mod error;
mod node;

pub use error::{GraphError, Result};
pub use node::BuildNode;

use crucible_types::{Label, Target};
use petgraph::stable_graph::{NodeIndex, StableDiGraph};
use petgraph::visit::EdgeRef;
use petgraph::Direction;
use std::collections::{HashMap, HashSet};
use tracing::{debug, instrument};

/// Edges point from a dependency to its dependent: `A -> B` means `B`
/// depends on `A`, so `A` must complete before `B` becomes ready. This
/// makes `successors(A)` exactly the set of nodes that become ready once
/// `A` finishes (spec.md §4.1 queries).
#[derive(Debug)]
pub struct BuildGraph {
    graph: StableDiGraph<BuildNode, ()>,
    by_label: HashMap<Label, NodeIndex>,
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum DfsColor {
    White,
    Gray,
    Black,
}

impl BuildGraph {
    /// Builds a [`BuildGraph`] from a flat sequence of targets, resolving
    /// every dependency label and rejecting cycles.
    #[instrument(skip(targets), fields(count = targets.len()))]
    pub fn build(targets: Vec<Target>) -> Result<Self> {
        let mut graph: StableDiGraph<BuildNode, ()> = StableDiGraph::new();
        let mut by_label: HashMap<Label, NodeIndex> = HashMap::with_capacity(targets.len());

        for target in targets {
            let label = target.label.clone();
            if by_label.contains_key(&label) {
                return Err(GraphError::DuplicateLabel(label));
            }
            let index = graph.add_node(BuildNode {
                target,
                index: NodeIndex::end(),
            });
            graph[index].index = index;
            by_label.insert(label, index);
        }

        for index in graph.node_indices().collect::<Vec<_>>() {
            let deps = graph[index].target.deps.clone();
            let dependent_label = graph[index].target.label.clone();
            for dep_label in deps {
                let dep_index = *by_label
                    .get(&dep_label)
                    .ok_or_else(|| GraphError::MissingDependency(dependent_label.clone(), dep_label.clone()))?;
                graph.add_edge(dep_index, index, ());
            }
        }

        let built = Self { graph, by_label };
        built.check_acyclic()?;
        debug!(nodes = built.graph.node_count(), edges = built.graph.edge_count(), "build graph constructed");
        Ok(built)
    }

    /// DFS-based cycle check that reports the full cycle path, rather than
    /// relying on `petgraph::algo::toposort`'s single offending node
    /// (spec.md §4.1: "report the full cycle path").
    fn check_acyclic(&self) -> Result<()> {
        let mut color: HashMap<NodeIndex, DfsColor> = self
            .graph
            .node_indices()
            .map(|i| (i, DfsColor::White))
            .collect();

        // Stable iteration order: lexical label order, so two runs report
        // the same cycle (spec.md §4.1: "stable... so two runs... yield
        // identical build order").
        let mut ordered_roots: Vec<NodeIndex> = self.graph.node_indices().collect();
        ordered_roots.sort_by_key(|i| self.graph[*i].target.label.clone());

        for root in ordered_roots {
            if color[&root] == DfsColor::White {
                let mut path: Vec<NodeIndex> = Vec::new();
                if let Some(cycle) = self.dfs_visit(root, &mut color, &mut path) {
                    return Err(GraphError::CircularDependency(
                        cycle.into_iter().map(|i| self.graph[i].target.label.clone()).collect(),
                    ));
                }
            }
        }
        Ok(())
    }

    /// Classic white/gray/black DFS. `path` tracks the current recursion
    /// stack so that when a gray (in-progress) node is revisited we can
    /// slice out exactly the cycle, not the whole traversal.
    fn dfs_visit(
        &self,
        node: NodeIndex,
        color: &mut HashMap<NodeIndex, DfsColor>,
        path: &mut Vec<NodeIndex>,
    ) -> Option<Vec<NodeIndex>> {
        color.insert(node, DfsColor::Gray);
        path.push(node);

        for next in self.successors(node) {
            match color.get(&next).copied().unwrap_or(DfsColor::White) {
                DfsColor::White => {
                    if let Some(cycle) = self.dfs_visit(next, color, path) {
                        return Some(cycle);
                    }
                }
                DfsColor::Gray => {
                    let start = path.iter().position(|&n| n == next).unwrap_or(0);
                    let mut cycle: Vec<NodeIndex> = path[start..].to_vec();
                    cycle.push(next);
                    return Some(cycle);
                }
                DfsColor::Black => {}
            }
        }

        path.pop();
        color.insert(node, DfsColor::Black);
        None
    }

    pub fn leaves(&self) -> Vec<NodeIndex> {
        let mut result: Vec<NodeIndex> = self
            .graph
            .node_indices()
            .filter(|&i| self.graph.edges_directed(i, Direction::Incoming).next().is_none())
            .collect();
        result.sort_by_key(|i| self.graph[*i].target.label.clone());
        result
    }

    pub fn successors(&self, node: NodeIndex) -> Vec<NodeIndex> {
        let mut result: Vec<NodeIndex> = self
            .graph
            .edges_directed(node, Direction::Outgoing)
            .map(|e| e.target())
            .collect();
        result.sort_by_key(|i| self.graph[*i].target.label.clone());
        result
    }

    pub fn predecessors(&self, node: NodeIndex) -> Vec<NodeIndex> {
        let mut result: Vec<NodeIndex> = self
            .graph
            .edges_directed(node, Direction::Incoming)
            .map(|e| e.source())
            .collect();
        result.sort_by_key(|i| self.graph[*i].target.label.clone());
        result
    }

    /// The transitive set of nodes that depend (directly or transitively)
    /// on `node`, used by IncrDeps to propagate a source change
    /// (spec.md §4.1, §4.3).
    pub fn reverse_deps(&self, node: NodeIndex, depth: Option<usize>) -> Vec<NodeIndex> {
        self.bfs_transitive(node, Direction::Outgoing, depth)
    }

    /// The transitive set of nodes `nodes` need built, i.e. every
    /// dependency reachable by following edges backwards (spec.md §4.1).
    pub fn transitive_closure(&self, nodes: &[NodeIndex]) -> Vec<NodeIndex> {
        let mut seen: HashSet<NodeIndex> = HashSet::new();
        for &start in nodes {
            for n in self.bfs_transitive(start, Direction::Incoming, None) {
                seen.insert(n);
            }
            seen.insert(start);
        }
        let mut result: Vec<NodeIndex> = seen.into_iter().collect();
        result.sort_by_key(|i| self.graph[*i].target.label.clone());
        result
    }

    fn bfs_transitive(&self, start: NodeIndex, dir: Direction, depth: Option<usize>) -> Vec<NodeIndex> {
        let mut visited: HashSet<NodeIndex> = HashSet::new();
        let mut frontier: Vec<NodeIndex> = vec![start];
        let mut result = Vec::new();
        let mut level = 0usize;
        while !frontier.is_empty() {
            if let Some(max) = depth {
                if level >= max {
                    break;
                }
            }
            let mut next = Vec::new();
            for n in frontier {
                for e in self.graph.edges_directed(n, dir) {
                    let other = match dir {
                        Direction::Outgoing => e.target(),
                        Direction::Incoming => e.source(),
                    };
                    if visited.insert(other) {
                        result.push(other);
                        next.push(other);
                    }
                }
            }
            frontier = next;
            level += 1;
        }
        result.sort_by_key(|i| self.graph[*i].target.label.clone());
        result
    }

    pub fn node(&self, index: NodeIndex) -> &BuildNode {
        &self.graph[index]
    }

    pub fn find(&self, label: &Label) -> Option<NodeIndex> {
        self.by_label.get(label).copied()
    }

    pub fn len(&self) -> usize {
        self.graph.node_count()
    }

    pub fn is_empty(&self) -> bool {
        self.graph.node_count() == 0
    }

    pub fn node_indices(&self) -> Vec<NodeIndex> {
        let mut v: Vec<NodeIndex> = self.graph.node_indices().collect();
        v.sort_by_key(|i| self.graph[*i].target.label.clone());
        v
    }

    /// Filters the given nodes by target kind, for the external query
    /// subsystem (spec.md §4.1).
    pub fn kind_filter<'a>(
        &'a self,
        nodes: &'a [NodeIndex],
        predicate: impl Fn(&crucible_types::TargetKind) -> bool + 'a,
    ) -> Vec<NodeIndex> {
        nodes
            .iter()
            .copied()
            .filter(|&i| predicate(&self.graph[i].target.kind))
            .collect()
    }

    /// Filters the given nodes by a language-specific option key/value
    /// predicate, for the external query subsystem (spec.md §4.1).
    pub fn attribute_filter<'a>(
        &'a self,
        nodes: &'a [NodeIndex],
        key: &str,
        predicate: impl Fn(&str) -> bool,
    ) -> Vec<NodeIndex> {
        nodes
            .iter()
            .copied()
            .filter(|&i| {
                self.graph[i]
                    .target
                    .options
                    .get(key)
                    .map(|v| predicate(v))
                    .unwrap_or(false)
            })
            .collect()
    }
}


/// P5 (graph acyclicity): any edge set that only ever points from a
/// lower-numbered target to a higher-numbered one is acyclic by
/// construction, and closing one of those edges into a back-edge is
/// always rejected (spec.md §8).
#[cfg(test)]
mod acyclicity_properties {
    use super::*;
    use crucible_types::TargetKind;
    use proptest::collection::vec as pvec;
    use proptest::prelude::*;

    fn labeled_target(n: usize, deps: &[usize]) -> Target {
        Target::new(Label::parse(&format!("//p:t{n}")).unwrap(), TargetKind::Library, "cpp")
            .with_deps(deps.iter().map(|d| Label::parse(&format!("//p:t{d}")).unwrap()).collect())
    }

    proptest! {
        #[test]
        fn forward_only_edges_always_build(n in 2usize..12, seed in any::<u64>()) {
            // Each node i may depend only on nodes < i, so the edge set is
            // acyclic regardless of which subset is chosen.
            let mut targets = Vec::with_capacity(n);
            for i in 0..n {
                let deps: Vec<usize> = (0..i).filter(|&d| (seed.wrapping_add(d as u64).wrapping_mul(2654435761)) % 3 == 0).collect();
                targets.push(labeled_target(i, &deps));
            }
            let graph = BuildGraph::build(targets).unwrap();
            prop_assert_eq!(graph.len(), n);
        }

        #[test]
        fn closing_a_forward_chain_into_a_cycle_is_always_rejected(n in 2usize..8) {
            // t0 -> t1 -> ... -> t(n-1) -> t0.
            let targets: Vec<Target> = (0..n)
                .map(|i| if i == 0 { labeled_target(i, &[n - 1]) } else { labeled_target(i, &[i - 1]) })
                .collect();
            let err = BuildGraph::build(targets).unwrap_err();
            prop_assert!(matches!(err, GraphError::CircularDependency(_)));
        }

        #[test]
        fn node_count_matches_input_regardless_of_dep_subset(picks in pvec(any::<bool>(), 0..10)) {
            let n = picks.len() + 1;
            let mut targets = Vec::with_capacity(n);
            for i in 0..n {
                let deps: Vec<usize> = (0..i).filter(|&d| picks.get(d).copied().unwrap_or(false)).collect();
                targets.push(labeled_target(i, &deps));
            }
            let graph = BuildGraph::build(targets).unwrap();
            prop_assert_eq!(graph.len(), n);
            prop_assert!(graph.leaves().contains(&graph.find(&Label::parse("//p:t0").unwrap()).unwrap()));
        }
    }
}
