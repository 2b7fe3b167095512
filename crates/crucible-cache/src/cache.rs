//! The in-memory + persisted ActionCache (spec.md §4.4).

use crate::entry::ActionEntry;
use crate::error::Result;
use crate::gc::{GcPolicy, GcReport};
use crate::{key, store};
use crucible_cas::LocalCas;
use crucible_types::{ActionFingerprint, ArtifactDigest};
use dashmap::DashMap;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Persistent keyed cache mapping [`ActionFingerprint`] to [`ActionEntry`].
///
/// [`DashMap`]'s internal sharding gives per-key write serialization and
/// lock-free reads, matching the concurrency contract in spec.md §5.
pub struct ActionCache {
    path: PathBuf,
    mac_key: [u8; 32],
    entries: DashMap<ActionFingerprint, ActionEntry>,
}

impl ActionCache {
    pub fn open(cache_root: &Path) -> Result<Self> {
        let actions_dir = cache_root.join("actions");
        let mac_key = key::load_or_create(&actions_dir)?;
        let path = actions_dir.join("actions.bin");
        let loaded = store::load(&path, &mac_key)?;
        let entries = DashMap::new();
        for (fp, entry) in loaded {
            entries.insert(fp, entry);
        }
        info!(count = entries.len(), path = %path.display(), "loaded action cache");
        Ok(Self {
            path,
            mac_key,
            entries,
        })
    }

    /// Returns the entry for `fp` iff it exists and every output digest it
    /// declares is still present in `cas`. A referenced-artifact miss
    /// deletes the entry (lazy GC) and returns `None`.
    pub fn lookup(&self, fp: ActionFingerprint, cas: &LocalCas) -> Option<ActionEntry> {
        let mut missing = false;
        let result = self.entries.get_mut(&fp).map(|mut entry| {
            if entry.success && !entry.output_digests.iter().all(|d| cas.exists(*d)) {
                missing = true;
            } else {
                entry.touch();
            }
            entry.clone()
        });
        if missing {
            debug!(%fp, "action cache entry references a missing artifact, evicting");
            self.entries.remove(&fp);
            return None;
        }
        result
    }

    /// Idempotent insert. If an entry for `fp` already exists, the first
    /// writer wins: only the last-access timestamp is refreshed, never the
    /// recorded outputs (spec.md §4.4, §5 "Cache writes ... serialized").
    pub fn insert(&self, fp: ActionFingerprint, entry: ActionEntry) {
        self.entries
            .entry(fp)
            .and_modify(|existing| existing.touch())
            .or_insert(entry);
    }

    /// Explicit invalidation: removes the entry so a subsequent `insert`
    /// is free to record new outputs.
    pub fn invalidate(&self, fp: ActionFingerprint) {
        self.entries.remove(&fp);
    }

    pub fn delete(&self, fp: ActionFingerprint) {
        self.entries.remove(&fp);
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// All digests referenced by currently-live entries, for the CAS's own
    /// GC pass to treat as reachable.
    pub fn referenced_artifacts(&self) -> std::collections::HashSet<ArtifactDigest> {
        self.entries
            .iter()
            .flat_map(|e| e.output_digests.clone())
            .collect()
    }

    pub fn gc(&self, policy: &GcPolicy) -> GcReport {
        let mut by_access: Vec<(ActionFingerprint, u64)> = self
            .entries
            .iter()
            .map(|e| (*e.key(), e.value().last_access))
            .collect();
        by_access.sort_by_key(|(_, last_access)| *last_access);

        let to_evict: Vec<ActionFingerprint> = match policy {
            GcPolicy::Lru { keep } => {
                if by_access.len() <= *keep {
                    Vec::new()
                } else {
                    by_access[..by_access.len() - keep]
                        .iter()
                        .map(|(fp, _)| *fp)
                        .collect()
                }
            }
            GcPolicy::TotalSize {
                max_bytes,
                bytes_per_artifact,
            } => {
                let mut total: u64 = self
                    .entries
                    .iter()
                    .map(|e| e.value().output_digests.len() as u64 * bytes_per_artifact)
                    .sum();
                let mut evict = Vec::new();
                for (fp, _) in &by_access {
                    if total <= *max_bytes {
                        break;
                    }
                    if let Some(entry) = self.entries.get(fp) {
                        total = total
                            .saturating_sub(entry.output_digests.len() as u64 * bytes_per_artifact);
                    }
                    evict.push(*fp);
                }
                evict
            }
        };

        let mut report = GcReport::default();
        for fp in to_evict {
            if let Some((_, entry)) = self.entries.remove(&fp) {
                report.evicted_entries += 1;
                report.orphaned_artifacts.extend(entry.output_digests);
            }
        }
        if report.evicted_entries > 0 {
            info!(evicted = report.evicted_entries, "action cache GC complete");
        }
        report
    }

    /// Flushes all entries to disk atomically. Any entry inserted after
    /// this call starts will be picked up by the next flush, not this one.
    pub fn flush(&self) -> Result<()> {
        let snapshot: Vec<(ActionFingerprint, ActionEntry)> = self
            .entries
            .iter()
            .map(|e| (*e.key(), e.value().clone()))
            .collect();
        store::save(&self.path, &self.mac_key, &snapshot)?;
        debug!(count = snapshot.len(), "flushed action cache to disk");
        Ok(())
    }
}

impl Drop for ActionCache {
    fn drop(&mut self) {
        if let Err(e) = self.flush() {
            warn!(error = %e, "failed to flush action cache on drop");
        }
    }
}
