//! Change propagation: given a set of changed paths, find every source
//! whose import set transitively depends on one of them (spec.md §4.3).

use crate::store::IncrDepsStore;
use std::collections::{HashMap, HashSet, VecDeque};
use std::path::{Path, PathBuf};

/// Reverse import index: importee -> set of sources that import it.
/// Built once per query; the store itself stays forward-indexed (source ->
/// imports), since that's the natural shape to update during a rescan.
fn reverse_index(store: &IncrDepsStore) -> HashMap<PathBuf, Vec<PathBuf>> {
    let mut reverse: HashMap<PathBuf, Vec<PathBuf>> = HashMap::new();
    for record in store.records() {
        for import in &record.imports {
            reverse
                .entry(import.clone())
                .or_default()
                .push(record.source.clone());
        }
    }
    reverse
}

/// Computes the set of sources affected by a change to any path in
/// `changed`, by reverse-traversing the stored per-file import graph.
/// A changed path that is itself a tracked source is included.
pub fn affected_sources(store: &IncrDepsStore, changed: &[PathBuf]) -> HashSet<PathBuf> {
    let reverse = reverse_index(store);
    let mut affected: HashSet<PathBuf> = HashSet::new();
    let mut queue: VecDeque<PathBuf> = changed.iter().cloned().collect();

    for path in changed {
        affected.insert(path.clone());
    }

    while let Some(path) = queue.pop_front() {
        if let Some(importers) = reverse.get(&path) {
            for importer in importers {
                if affected.insert(importer.clone()) {
                    queue.push_back(importer.clone());
                }
            }
        }
    }
    affected
}

/// True if any of `target_sources` was touched by a change, per
/// `affected_sources`. A target with no tracked sources is never dirty by
/// this mechanism (coarser target-level invalidation is the caller's job).
pub fn target_is_dirty(affected: &HashSet<PathBuf>, target_sources: &[&Path]) -> bool {
    target_sources.iter().any(|s| affected.contains(*s))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::FileDependency;
    use crucible_types::Digest;

    fn record(source: &str, imports: &[&str]) -> FileDependency {
        FileDependency::new(
            PathBuf::from(source),
            imports.iter().map(PathBuf::from).collect(),
            Digest::from_bytes([0u8; 32]),
            imports.iter().map(|_| Digest::from_bytes([0u8; 32])).collect(),
        )
    }

    #[test]
    fn change_propagates_through_a_chain() {
        let mut store = IncrDepsStore::new();
        store.upsert(record("a.rs", &["b.rs"]));
        store.upsert(record("b.rs", &["c.rs"]));
        store.upsert(record("c.rs", &[]));
        store.upsert(record("unrelated.rs", &[]));

        let affected = affected_sources(&store, &[PathBuf::from("c.rs")]);
        assert!(affected.contains(Path::new("c.rs")));
        assert!(affected.contains(Path::new("b.rs")));
        assert!(affected.contains(Path::new("a.rs")));
        assert!(!affected.contains(Path::new("unrelated.rs")));
    }

    #[test]
    fn diamond_import_graph_is_deduplicated() {
        let mut store = IncrDepsStore::new();
        store.upsert(record("top.rs", &["left.rs", "right.rs"]));
        store.upsert(record("left.rs", &["shared.rs"]));
        store.upsert(record("right.rs", &["shared.rs"]));
        store.upsert(record("shared.rs", &[]));

        let affected = affected_sources(&store, &[PathBuf::from("shared.rs")]);
        assert_eq!(affected.len(), 4);
    }

    #[test]
    fn target_dirty_checks_against_affected_set() {
        let mut store = IncrDepsStore::new();
        store.upsert(record("a.rs", &["b.rs"]));
        store.upsert(record("b.rs", &[]));
        let affected = affected_sources(&store, &[PathBuf::from("b.rs")]);

        assert!(target_is_dirty(&affected, &[Path::new("a.rs")]));
        assert!(!target_is_dirty(&affected, &[Path::new("z.rs")]));
    }
}
