//! File content hashing (spec.md §4.2).

use crate::error::{HashError, Result};
use crucible_types::Digest;
use std::fs::File;
use std::io::Read;
use std::path::{Path, PathBuf};

/// Files at or above this size are memory-mapped instead of read in
/// userspace chunks, to avoid the extra copy (spec.md §4.2).
pub const MMAP_THRESHOLD_BYTES: u64 = 4 * 1024 * 1024;

const BLOCK_SIZE: usize = 64 * 1024;

/// The BLAKE3 digest of zero bytes — the well-known "empty file" digest
/// (spec.md §4.2).
pub fn empty_digest() -> Digest {
    Digest::from_bytes(*blake3::hash(&[]).as_bytes())
}

/// Resolves at most one level of symlink indirection. A second symlink in
/// the chain is treated as a loop (spec.md §4.2: "Symlinks are followed
/// exactly once; a symlink loop fails with IOFailure").
fn resolve_one_symlink_level(path: &Path) -> Result<PathBuf> {
    let meta = std::fs::symlink_metadata(path).map_err(|source| HashError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    if !meta.file_type().is_symlink() {
        return Ok(path.to_path_buf());
    }
    let target = std::fs::read_link(path).map_err(|source| HashError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let resolved = if target.is_absolute() {
        target
    } else {
        path.parent().unwrap_or_else(|| Path::new(".")).join(target)
    };
    let target_meta = std::fs::symlink_metadata(&resolved).map_err(|source| HashError::Io {
        path: resolved.clone(),
        source,
    })?;
    if target_meta.file_type().is_symlink() {
        return Err(HashError::SymlinkLoop(path.to_path_buf()));
    }
    Ok(resolved)
}

/// Computes the BLAKE3 digest of a file's content, reading in 64 KiB
/// blocks (memory-mapping above [`MMAP_THRESHOLD_BYTES`]).
pub fn hash_file(path: &Path) -> Result<Digest> {
    let resolved = resolve_one_symlink_level(path)?;
    let mut file = File::open(&resolved).map_err(|source| HashError::Io {
        path: resolved.clone(),
        source,
    })?;

    let size = file
        .metadata()
        .map_err(|source| HashError::Io {
            path: resolved.clone(),
            source,
        })?
        .len();

    let mut hasher = blake3::Hasher::new();

    if size >= MMAP_THRESHOLD_BYTES {
        // SAFETY: the file is opened read-only for the duration of the
        // mapping and is not (to the core's knowledge) mutated concurrently;
        // actions are hermetic inputs, not actively-written logs.
        let mmap = unsafe { memmap2::Mmap::map(&file) }.map_err(|source| HashError::Io {
            path: resolved.clone(),
            source,
        })?;
        hasher.update(&mmap[..]);
    } else {
        let mut buf = [0u8; BLOCK_SIZE];
        loop {
            let n = file.read(&mut buf).map_err(|source| HashError::Io {
                path: resolved.clone(),
                source,
            })?;
            if n == 0 {
                break;
            }
            hasher.update(&buf[..n]);
        }
    }

    Ok(Digest::from_bytes(*hasher.finalize().as_bytes()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_file_matches_well_known_digest() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("empty");
        File::create(&path).unwrap();
        assert_eq!(hash_file(&path).unwrap(), empty_digest());
    }

    #[test]
    fn single_byte_change_changes_the_digest() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("a.txt");
        std::fs::write(&path, b"int f(){return 1;}").unwrap();
        let before = hash_file(&path).unwrap();

        std::fs::write(&path, b"int f(){return 2;}").unwrap();
        let after = hash_file(&path).unwrap();

        assert_ne!(before, after);
    }

    #[test]
    fn large_file_via_mmap_matches_small_file_path() {
        let dir = tempfile::tempdir().unwrap();
        let small = dir.path().join("small");
        let large = dir.path().join("large");

        let mut content = Vec::new();
        for i in 0..(MMAP_THRESHOLD_BYTES as usize + 1024) {
            content.push((i % 251) as u8);
        }
        std::fs::write(&small, &content[..1024]).unwrap();
        std::fs::write(&large, &content).unwrap();

        // Not equal (different content) but both must hash successfully and
        // deterministically via their respective code paths.
        let small_digest = hash_file(&small).unwrap();
        let large_digest = hash_file(&large).unwrap();
        assert_ne!(small_digest, large_digest);

        let mut expected = blake3::Hasher::new();
        expected.update(&content);
        assert_eq!(
            large_digest,
            Digest::from_bytes(*expected.finalize().as_bytes())
        );
    }

    #[test]
    fn symlink_loop_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let a = dir.path().join("a");
        let b = dir.path().join("b");
        #[cfg(unix)]
        {
            std::os::unix::fs::symlink(&b, &a).unwrap();
            std::os::unix::fs::symlink(&a, &b).unwrap();
            assert!(matches!(hash_file(&a), Err(HashError::SymlinkLoop(_))));
        }
    }
}
