use crucible_types::ArtifactDigest;

#[derive(Debug, Clone)]
pub enum GcPolicy {
    /// Evict everything beyond the `keep` most recently accessed entries.
    Lru { keep: usize },
    /// Evict entries until the estimated total output size is under
    /// `max_bytes`, oldest-accessed first. Size is approximated from the
    /// number of output artifacts, since the cache doesn't track blob
    /// sizes directly.
    TotalSize { max_bytes: u64, bytes_per_artifact: u64 },
}

#[derive(Debug, Clone, Default)]
pub struct GcReport {
    pub evicted_entries: usize,
    /// Artifacts orphaned by eviction; candidates for the CAS's own GC pass.
    pub orphaned_artifacts: Vec<ArtifactDigest>,
}
