//! Materializing CAS-stored outputs into the workspace output tree on a
//! cache hit (spec.md §4.6: "materialize them into the workspace output
//! tree via hard-link (fallback to copy)").

use crate::error::{Result, SchedulerError};
use crucible_cas::LocalCas;
use crucible_types::ArtifactDigest;
use std::path::Path;

pub fn materialize(cas: &LocalCas, digest: ArtifactDigest, dest: &Path) -> Result<()> {
    let io_err = |source: std::io::Error| SchedulerError::Io {
        path: dest.to_path_buf(),
        source,
    };

    if let Some(parent) = dest.parent() {
        std::fs::create_dir_all(parent).map_err(io_err)?;
    }
    let src = cas.path_for(digest);
    if dest.exists() {
        std::fs::remove_file(dest).map_err(io_err)?;
    }
    if std::fs::hard_link(&src, dest).is_ok() {
        return Ok(());
    }
    // Cross-device or unsupported filesystem: fall back to a plain copy.
    std::fs::copy(&src, dest).map_err(io_err)?;
    Ok(())
}
