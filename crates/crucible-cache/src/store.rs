//! The on-disk `actions.bin` store (spec.md §4.4, §6.1).

use crate::codec::{write_str, Cursor};
use crate::entry::ActionEntry;
use crate::error::{CacheError, Result};
use crucible_types::{ActionFingerprint, ArtifactDigest, Digest};
use std::path::Path;
use tracing::warn;

const MAGIC: &[u8; 4] = b"ACSC";
const FORMAT_VERSION: u16 = 1;
const MAC_LEN: usize = 32;

pub fn mac_for(key: &[u8; 32], entry_bytes: &[u8]) -> [u8; 32] {
    *blake3::keyed_hash(key, entry_bytes).as_bytes()
}

fn write_entry(buf: &mut Vec<u8>, fp: ActionFingerprint, entry: &ActionEntry, key: &[u8; 32]) {
    let start = buf.len();
    buf.extend_from_slice(fp.digest().as_bytes());
    buf.extend_from_slice(&(entry.output_paths.len() as u32).to_le_bytes());
    for path in &entry.output_paths {
        write_str(buf, path);
    }
    buf.extend_from_slice(&(entry.output_digests.len() as u32).to_le_bytes());
    for digest in &entry.output_digests {
        buf.extend_from_slice(digest.digest().as_bytes());
    }
    buf.push(entry.success as u8);
    buf.extend_from_slice(&(entry.metadata.len() as u32).to_le_bytes());
    for (k, v) in &entry.metadata {
        write_str(buf, k);
        write_str(buf, v);
    }
    buf.extend_from_slice(&entry.created_at.to_le_bytes());
    buf.extend_from_slice(&entry.last_access.to_le_bytes());

    let mac = mac_for(key, &buf[start..]);
    buf.extend_from_slice(&mac);
}

fn read_entry(
    cursor: &mut Cursor<'_>,
    key: &[u8; 32],
) -> Result<Option<(ActionFingerprint, ActionEntry)>> {
    let entry_start = cursor.position();
    let fp = ActionFingerprint::from_digest(cursor.read_digest()?);

    let path_count = cursor.read_u32()?;
    let mut output_paths = Vec::with_capacity(path_count as usize);
    for _ in 0..path_count {
        output_paths.push(cursor.read_str()?);
    }

    let digest_count = cursor.read_u32()?;
    let mut output_digests = Vec::with_capacity(digest_count as usize);
    for _ in 0..digest_count {
        output_digests.push(ArtifactDigest::from_digest(cursor.read_digest()?));
    }

    let success = cursor.read_u8()? != 0;

    let meta_count = cursor.read_u32()?;
    let mut metadata = std::collections::BTreeMap::new();
    for _ in 0..meta_count {
        let k = cursor.read_str()?;
        let v = cursor.read_str()?;
        metadata.insert(k, v);
    }

    let created_at = cursor.read_u64()?;
    let last_access = cursor.read_u64()?;
    let entry_end = cursor.position();

    let stored_mac = cursor.read_fixed(MAC_LEN)?.to_vec();

    // Recompute over the raw bytes; re-serializing would risk drifting from
    // what was actually hashed on write if field order ever changes.
    let entry_bytes = cursor_slice(cursor, entry_start, entry_end);
    let computed_mac = mac_for(key, entry_bytes);
    if computed_mac.as_slice() != stored_mac.as_slice() {
        warn!(fingerprint = %fp, "action cache entry failed MAC verification, discarding");
        return Ok(None);
    }

    Ok(Some((
        fp,
        ActionEntry {
            output_paths,
            output_digests,
            success,
            metadata,
            created_at,
            last_access,
        },
    )))
}

fn cursor_slice<'a>(cursor: &Cursor<'a>, start: usize, end: usize) -> &'a [u8] {
    cursor.full_slice(start, end)
}

/// Serializes every entry and writes the store atomically (temp file then
/// rename), matching the crash-safety protocol used by the other stores.
pub fn save(path: &Path, key: &[u8; 32], entries: &[(ActionFingerprint, ActionEntry)]) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).map_err(|source| CacheError::Io {
            path: parent.to_path_buf(),
            source,
        })?;
    }

    let mut buf = Vec::new();
    buf.extend_from_slice(MAGIC);
    buf.extend_from_slice(&FORMAT_VERSION.to_le_bytes());
    buf.extend_from_slice(&(entries.len() as u32).to_le_bytes());
    for (fp, entry) in entries {
        write_entry(&mut buf, *fp, entry, key);
    }

    let tmp_path = path.with_extension("bin.tmp");
    std::fs::write(&tmp_path, &buf).map_err(|source| CacheError::Io {
        path: tmp_path.clone(),
        source,
    })?;
    std::fs::rename(&tmp_path, path).map_err(|source| CacheError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    Ok(())
}

/// Loads the store at `path`. Missing file or unsupported schema version
/// both yield an empty store (spec.md §4.3's "treated as empty, not fatal"
/// policy applies equally here). Entries that fail MAC verification are
/// dropped individually rather than invalidating the whole file.
pub fn load(path: &Path, key: &[u8; 32]) -> Result<Vec<(ActionFingerprint, ActionEntry)>> {
    let bytes = match std::fs::read(path) {
        Ok(b) => b,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(source) => {
            return Err(CacheError::Io {
                path: path.to_path_buf(),
                source,
            })
        }
    };

    if bytes.len() < 10 || &bytes[0..4] != MAGIC {
        warn!(path = %path.display(), "action cache file missing/invalid magic, treating as empty");
        return Ok(Vec::new());
    }
    let version = u16::from_le_bytes(bytes[4..6].try_into().unwrap());
    if version > FORMAT_VERSION {
        warn!(path = %path.display(), found = version, "action cache schema newer than supported, treating as empty");
        return Ok(Vec::new());
    }
    let count = u32::from_le_bytes(bytes[6..10].try_into().unwrap());

    let mut cursor = Cursor::new(&bytes, path);
    cursor.read_fixed(10)?;
    let mut entries = Vec::with_capacity(count as usize);
    for _ in 0..count {
        if let Some(pair) = read_entry(&mut cursor, key)? {
            entries.push(pair);
        }
    }
    Ok(entries)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crucible_types::Digest;

    fn sample_entry() -> ActionEntry {
        ActionEntry::new(
            vec!["out/lib.o".to_string()],
            vec![ArtifactDigest::from_digest(Digest::from_bytes([5u8; 32]))],
            true,
            Default::default(),
        )
    }

    #[test]
    fn save_and_load_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("actions/actions.bin");
        let key = [7u8; 32];
        let fp = ActionFingerprint::from_digest(Digest::from_bytes([1u8; 32]));
        let entry = sample_entry();

        save(&path, &key, &[(fp, entry.clone())]).unwrap();
        let loaded = load(&path, &key).unwrap();

        assert_eq!(loaded.len(), 1);
        assert_eq!(loaded[0].0, fp);
        assert_eq!(loaded[0].1, entry);
    }

    #[test]
    fn tampered_entry_is_discarded_not_fatal() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("actions.bin");
        let key = [7u8; 32];
        let fp = ActionFingerprint::from_digest(Digest::from_bytes([1u8; 32]));
        save(&path, &key, &[(fp, sample_entry())]).unwrap();

        let mut bytes = std::fs::read(&path).unwrap();
        let last = bytes.len() - 1;
        bytes[last] ^= 0xff;
        std::fs::write(&path, &bytes).unwrap();

        let loaded = load(&path, &key).unwrap();
        assert!(loaded.is_empty());
    }

    #[test]
    fn wrong_key_rejects_every_entry() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("actions.bin");
        let fp = ActionFingerprint::from_digest(Digest::from_bytes([1u8; 32]));
        save(&path, &[1u8; 32], &[(fp, sample_entry())]).unwrap();

        let loaded = load(&path, &[2u8; 32]).unwrap();
        assert!(loaded.is_empty());
    }
}

/// P8 (round-trip), spec.md §8: `load(save(entries)) == entries` for any
/// ActionEntry the type can represent, not just the handful of fixed
/// fixtures above.
#[cfg(test)]
mod round_trip_properties {
    use super::*;
    use proptest::collection::{btree_map, vec as pvec};
    use proptest::prelude::*;

    fn arb_entry() -> impl Strategy<Value = ActionEntry> {
        (
            pvec("[a-z/.]{1,12}", 0..4),
            pvec(any::<[u8; 32]>(), 0..4),
            any::<bool>(),
            btree_map("[a-z]{1,8}", "[a-z0-9]{0,16}", 0..4),
        )
            .prop_map(|(output_paths, digest_bytes, success, metadata)| {
                ActionEntry::new(
                    output_paths,
                    digest_bytes
                        .into_iter()
                        .map(|b| ArtifactDigest::from_digest(Digest::from_bytes(b)))
                        .collect(),
                    success,
                    metadata,
                )
            })
    }

    proptest! {
        #[test]
        fn entries_round_trip_through_save_and_load(
            fp_bytes in any::<[u8; 32]>(),
            entry in arb_entry(),
        ) {
            let dir = tempfile::tempdir().unwrap();
            let path = dir.path().join("actions/actions.bin");
            let key = [9u8; 32];
            let fp = ActionFingerprint::from_digest(Digest::from_bytes(fp_bytes));

            save(&path, &key, &[(fp, entry.clone())]).unwrap();
            let loaded = load(&path, &key).unwrap();

            prop_assert_eq!(loaded.len(), 1);
            prop_assert_eq!(loaded[0].0, fp);
            prop_assert_eq!(&loaded[0].1.output_paths, &entry.output_paths);
            prop_assert_eq!(&loaded[0].1.output_digests, &entry.output_digests);
            prop_assert_eq!(loaded[0].1.success, entry.success);
            prop_assert_eq!(&loaded[0].1.metadata, &entry.metadata);
        }
    }
}
