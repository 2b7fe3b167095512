use crucible_types::ArtifactDigest;
use std::collections::BTreeMap;
use std::time::{SystemTime, UNIX_EPOCH};

/// A single ActionCache record (spec.md §3 glossary, §4.4).
///
/// Invariant: if `success` is true, every digest in `output_digests` must
/// currently exist in the CAS — callers that find otherwise must delete the
/// entry rather than trust it (lazy GC, spec.md §4.4).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActionEntry {
    pub output_paths: Vec<String>,
    pub output_digests: Vec<ArtifactDigest>,
    pub success: bool,
    pub metadata: BTreeMap<String, String>,
    pub created_at: u64,
    pub last_access: u64,
}

impl ActionEntry {
    pub fn new(
        output_paths: Vec<String>,
        output_digests: Vec<ArtifactDigest>,
        success: bool,
        metadata: BTreeMap<String, String>,
    ) -> Self {
        let now = now_secs();
        Self {
            output_paths,
            output_digests,
            success,
            metadata,
            created_at: now,
            last_access: now,
        }
    }

    pub fn failing(metadata: BTreeMap<String, String>) -> Self {
        Self::new(Vec::new(), Vec::new(), false, metadata)
    }

    pub fn touch(&mut self) {
        self.last_access = now_secs();
    }
}

fn now_secs() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}
