//! On-disk content-addressed blob store (spec.md §4.5, §6.1).

use crate::error::{CasError, Result};
use crate::gc::{GcPolicy, GcReport};
use crucible_types::ArtifactDigest;
use fs2::FileExt;
use std::collections::HashSet;
use std::fs::File;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::SystemTime;
use tracing::{debug, info, warn};

#[derive(Debug, Clone)]
pub struct LocalCas {
    root: PathBuf,
}

impl LocalCas {
    /// Opens (creating if needed) a local CAS rooted at `<cache_root>/cas`.
    pub fn open(cache_root: &Path) -> Result<Self> {
        let root = cache_root.join("cas");
        std::fs::create_dir_all(root.join("tmp")).map_err(|source| CasError::Io {
            path: root.clone(),
            source,
        })?;
        Ok(Self { root })
    }

    /// The final path for `digest` under the two-level shard layout:
    /// `<root>/<h[0..2]>/<h[2..4]>/<h>`.
    pub fn path_for(&self, digest: ArtifactDigest) -> PathBuf {
        let (a, b) = digest.shard_prefixes();
        self.root.join(a).join(b).join(digest.to_hex())
    }

    pub fn exists(&self, digest: ArtifactDigest) -> bool {
        self.path_for(digest).is_file()
    }

    pub fn read(&self, digest: ArtifactDigest) -> Result<Vec<u8>> {
        let path = self.path_for(digest);
        std::fs::read(&path).map_err(|source| {
            if source.kind() == std::io::ErrorKind::NotFound {
                CasError::ArtifactNotFound(digest)
            } else {
                CasError::Io { path, source }
            }
        })
    }

    /// Write-tmp-verify-rename protocol (spec.md §4.5). If the final path
    /// already exists the rename is skipped and the temp file discarded —
    /// content at a given digest is immutable, so there is nothing to
    /// overwrite.
    pub fn write(&self, digest: ArtifactDigest, data: &[u8]) -> Result<()> {
        let final_path = self.path_for(digest);
        if final_path.is_file() {
            debug!(digest = %digest, "artifact already present, skipping write");
            return Ok(());
        }

        let actual = crucible_types::Digest::from_bytes(*blake3::hash(data).as_bytes());
        let actual_digest = ArtifactDigest::from_digest(actual);
        if actual_digest != digest {
            return Err(CasError::DigestMismatch {
                digest,
                actual: actual_digest,
            });
        }

        let tmp_path = self.root.join("tmp").join(uuid::Uuid::new_v4().to_string());
        {
            let mut file = File::create(&tmp_path).map_err(|source| CasError::Io {
                path: tmp_path.clone(),
                source,
            })?;
            file.write_all(data).map_err(|source| CasError::Io {
                path: tmp_path.clone(),
                source,
            })?;
            file.sync_all().map_err(|source| CasError::Io {
                path: tmp_path.clone(),
                source,
            })?;
        }

        if let Some(parent) = final_path.parent() {
            std::fs::create_dir_all(parent).map_err(|source| CasError::Io {
                path: parent.to_path_buf(),
                source,
            })?;
        }

        match std::fs::rename(&tmp_path, &final_path) {
            Ok(()) => {
                #[cfg(unix)]
                {
                    use std::os::unix::fs::PermissionsExt;
                    let _ = std::fs::set_permissions(
                        &final_path,
                        std::fs::Permissions::from_mode(0o644),
                    );
                }
                Ok(())
            }
            Err(source) => {
                let _ = std::fs::remove_file(&tmp_path);
                if final_path.is_file() {
                    // Lost a race with another writer publishing the same digest.
                    Ok(())
                } else {
                    Err(CasError::Io {
                        path: final_path,
                        source,
                    })
                }
            }
        }
    }

    pub fn delete(&self, digest: ArtifactDigest) -> Result<()> {
        let path = self.path_for(digest);
        match std::fs::remove_file(&path) {
            Ok(()) => Ok(()),
            Err(source) if source.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(source) => Err(CasError::Io { path, source }),
        }
    }

    /// Unreferenced-artifact sweep (spec.md §4.5). `referenced` is the set of
    /// digests still reachable from live ActionEntries; everything else
    /// older than `policy.grace_period` is a deletion candidate. Each
    /// deletion takes an exclusive lock on the candidate file so a
    /// concurrent reader mid-`read()` is never handed a half-deleted file.
    pub fn gc(&self, policy: &GcPolicy, referenced: &HashSet<ArtifactDigest>) -> Result<GcReport> {
        let mut report = GcReport::default();
        let now = SystemTime::now();

        for shard_a in read_dir_entries(&self.root)? {
            if shard_a.file_name() == "tmp" {
                continue;
            }
            for shard_b in read_dir_entries(&shard_a.path())? {
                for candidate in read_dir_entries(&shard_b.path())? {
                    report.scanned += 1;
                    let path = candidate.path();
                    let digest = match path
                        .file_name()
                        .and_then(|n| n.to_str())
                        .and_then(|s| ArtifactDigest::from_hex(s).ok())
                    {
                        Some(d) => d,
                        None => continue,
                    };
                    if referenced.contains(&digest) {
                        continue;
                    }

                    let meta = match std::fs::metadata(&path) {
                        Ok(m) => m,
                        Err(_) => continue,
                    };
                    let age = meta
                        .modified()
                        .ok()
                        .and_then(|m| now.duration_since(m).ok())
                        .unwrap_or_default();
                    if age < policy.grace_period {
                        continue;
                    }

                    if let Ok(file) = File::open(&path) {
                        if file.lock_exclusive().is_ok() {
                            let len = meta.len();
                            if std::fs::remove_file(&path).is_ok() {
                                report.deleted += 1;
                                report.reclaimed_bytes += len;
                            }
                            let _ = FileExt::unlock(&file);
                        }
                    }
                }
            }
        }
        info!(
            scanned = report.scanned,
            deleted = report.deleted,
            reclaimed_bytes = report.reclaimed_bytes,
            "CAS garbage collection complete"
        );
        Ok(report)
    }
}

fn read_dir_entries(dir: &Path) -> Result<Vec<std::fs::DirEntry>> {
    match std::fs::read_dir(dir) {
        Ok(rd) => Ok(rd.filter_map(|e| e.ok()).collect()),
        Err(source) if source.kind() == std::io::ErrorKind::NotFound => Ok(Vec::new()),
        Err(source) => {
            warn!(path = %dir.display(), %source, "failed to read CAS directory during GC");
            Ok(Vec::new())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn put(cas: &LocalCas, data: &[u8]) -> ArtifactDigest {
        let digest =
            ArtifactDigest::from_digest(crucible_types::Digest::from_bytes(*blake3::hash(data).as_bytes()));
        cas.write(digest, data).unwrap();
        digest
    }

    #[test]
    fn write_then_read_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let cas = LocalCas::open(dir.path()).unwrap();
        let digest = put(&cas, b"hello world");
        assert_eq!(cas.read(digest).unwrap(), b"hello world");
    }

    #[test]
    fn missing_artifact_is_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let cas = LocalCas::open(dir.path()).unwrap();
        let bogus = ArtifactDigest::from_digest(crucible_types::Digest::from_bytes([9u8; 32]));
        assert!(matches!(cas.read(bogus), Err(CasError::ArtifactNotFound(_))));
    }

    #[test]
    fn digest_mismatch_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let cas = LocalCas::open(dir.path()).unwrap();
        let wrong = ArtifactDigest::from_digest(crucible_types::Digest::from_bytes([1u8; 32]));
        assert!(matches!(
            cas.write(wrong, b"hello world"),
            Err(CasError::DigestMismatch { .. })
        ));
    }

    #[test]
    fn rewriting_the_same_digest_is_a_no_op() {
        let dir = tempfile::tempdir().unwrap();
        let cas = LocalCas::open(dir.path()).unwrap();
        let digest = put(&cas, b"idempotent");
        cas.write(digest, b"idempotent").unwrap();
        assert_eq!(cas.read(digest).unwrap(), b"idempotent");
    }

    #[test]
    fn gc_skips_referenced_and_young_artifacts() {
        let dir = tempfile::tempdir().unwrap();
        let cas = LocalCas::open(dir.path()).unwrap();
        let kept = put(&cas, b"referenced");
        let young = put(&cas, b"too young to collect");

        let mut referenced = HashSet::new();
        referenced.insert(kept);

        let report = cas
            .gc(
                &GcPolicy {
                    grace_period: Duration::from_secs(3600),
                },
                &referenced,
            )
            .unwrap();

        assert_eq!(report.deleted, 0);
        assert!(cas.exists(kept));
        assert!(cas.exists(young));
    }

    #[test]
    fn gc_deletes_unreferenced_artifacts_past_grace_period() {
        let dir = tempfile::tempdir().unwrap();
        let cas = LocalCas::open(dir.path()).unwrap();
        let orphan = put(&cas, b"orphaned");

        let report = cas
            .gc(
                &GcPolicy {
                    grace_period: Duration::ZERO,
                },
                &HashSet::new(),
            )
            .unwrap();

        assert_eq!(report.deleted, 1);
        assert!(!cas.exists(orphan));
    }
}

/// P4 (CAS injectivity), spec.md §8: distinct content always lands at
/// distinct paths, and identical content is only ever stored once.
#[cfg(test)]
mod injectivity_properties {
    use super::*;
    use proptest::prelude::*;

    fn digest_for(data: &[u8]) -> ArtifactDigest {
        ArtifactDigest::from_digest(crucible_types::Digest::from_bytes(*blake3::hash(data).as_bytes()))
    }

    proptest! {
        #[test]
        fn distinct_content_never_shares_a_path(
            a in proptest::collection::vec(any::<u8>(), 0..256),
            b in proptest::collection::vec(any::<u8>(), 0..256),
        ) {
            prop_assume!(a != b);
            let dir = tempfile::tempdir().unwrap();
            let cas = LocalCas::open(dir.path()).unwrap();
            let digest_a = digest_for(&a);
            let digest_b = digest_for(&b);
            prop_assume!(digest_a != digest_b);

            cas.write(digest_a, &a).unwrap();
            cas.write(digest_b, &b).unwrap();

            prop_assert_ne!(cas.path_for(digest_a), cas.path_for(digest_b));
            prop_assert_eq!(cas.read(digest_a).unwrap(), a);
            prop_assert_eq!(cas.read(digest_b).unwrap(), b);
        }

        #[test]
        fn writing_identical_content_twice_is_idempotent(data in proptest::collection::vec(any::<u8>(), 0..256)) {
            let dir = tempfile::tempdir().unwrap();
            let cas = LocalCas::open(dir.path()).unwrap();
            let digest = digest_for(&data);

            cas.write(digest, &data).unwrap();
            cas.write(digest, &data).unwrap();

            prop_assert_eq!(cas.read(digest).unwrap(), data);
        }
    }
}
