use crucible_types::Digest;
use std::path::PathBuf;
use std::time::{SystemTime, UNIX_EPOCH};

/// A per-source-file import record (spec.md §4.1 glossary, §4.3).
///
/// `imports` holds only in-workspace imports; imports that resolve outside
/// the workspace are external and are not fine-grained tracked, so
/// `import_digests[i]` always corresponds to `imports[i]`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileDependency {
    pub source: PathBuf,
    pub imports: Vec<PathBuf>,
    pub source_digest: Digest,
    pub import_digests: Vec<Digest>,
    pub analyzed_at: u64,
}

impl FileDependency {
    pub fn new(
        source: PathBuf,
        imports: Vec<PathBuf>,
        source_digest: Digest,
        import_digests: Vec<Digest>,
    ) -> Self {
        let analyzed_at = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs())
            .unwrap_or(0);
        Self {
            source,
            imports,
            source_digest,
            import_digests,
            analyzed_at,
        }
    }

    /// True if `current_digest` matches what was observed at last analysis,
    /// meaning the stored import set can be reused without re-scanning.
    pub fn is_fresh(&self, current_digest: &Digest) -> bool {
        &self.source_digest == current_digest
    }
}
