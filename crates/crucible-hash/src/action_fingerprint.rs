//! Action fingerprinting (spec.md §4.2).
//!
//! This ordering and framing is the cache correctness contract: any change
//! to it is a cache-format version bump, not a refactor.

use crate::error::Result;
use crate::file::hash_file;
use crate::framing::write_framed_str;
use crucible_types::{Action, ActionFingerprint, Digest};
use std::path::Path;
use tracing::trace;

/// Computes the [`ActionFingerprint`] for `action`, whose inputs are
/// resolved relative to `workspace_root`.
///
/// Hashes, in this fixed order:
/// 1. tool identity string
/// 2. each input's content digest, in declared order
/// 3. each flag string, then each `KEY=VALUE` env pair in sorted order
/// 4. the target label
/// 5. the action kind
/// 6. each upstream action's fingerprint, in declared dependency order
pub fn fingerprint_action(action: &Action, workspace_root: &Path) -> Result<ActionFingerprint> {
    let mut hasher = blake3::Hasher::new();

    write_framed_str(&mut hasher, &action.tool);

    for input in &action.inputs {
        let digest = hash_file(&workspace_root.join(input))?;
        hasher.update(&(digest.as_bytes().len() as u64).to_le_bytes());
        hasher.update(digest.as_bytes());
    }

    for flag in &action.flags {
        write_framed_str(&mut hasher, flag);
    }

    // `action.env` is a BTreeMap, so iteration is already key-sorted; the
    // `KEY=VALUE` pairing still needs its own boundary framing.
    for (key, value) in &action.env {
        write_framed_str(&mut hasher, &format!("{key}={value}"));
    }

    write_framed_str(&mut hasher, action.label.as_str());
    write_framed_str(&mut hasher, action.kind.as_str());

    for upstream in &action.upstream_outputs {
        let digest = upstream.digest();
        hasher.update(&(digest.as_bytes().len() as u64).to_le_bytes());
        hasher.update(digest.as_bytes());
    }

    let fp = ActionFingerprint::from_digest(Digest::from_bytes(*hasher.finalize().as_bytes()));
    trace!(label = %action.label, fingerprint = %fp, "computed action fingerprint");
    Ok(fp)
}


/// P1 (determinism) and P3 (sensitivity), spec.md §8, run over
/// proptest-generated source content rather than fixed fixtures.
#[cfg(test)]
mod fingerprint_properties {
    use super::*;
    use crucible_types::{ActionKind, Label};
    use proptest::prelude::*;

    fn action_over(rel: std::path::PathBuf) -> Action {
        Action::new(Label::parse("//lib:a").unwrap(), ActionKind::Compile, "cc-12").with_inputs(vec![rel])
    }

    proptest! {
        #[test]
        fn same_content_always_fingerprints_the_same(content in proptest::collection::vec(any::<u8>(), 0..512)) {
            let dir = tempfile::tempdir().unwrap();
            let rel = std::path::PathBuf::from("src.bin");
            std::fs::write(dir.path().join(&rel), &content).unwrap();
            let action = action_over(rel);

            let fp1 = fingerprint_action(&action, dir.path()).unwrap();
            let fp2 = fingerprint_action(&action, dir.path()).unwrap();
            prop_assert_eq!(fp1, fp2);
        }

        #[test]
        fn flipping_any_single_byte_changes_the_fingerprint(
            content in proptest::collection::vec(any::<u8>(), 1..512),
            index in 0usize..511,
        ) {
            let index = index % content.len();
            let dir = tempfile::tempdir().unwrap();
            let rel = std::path::PathBuf::from("src.bin");
            std::fs::write(dir.path().join(&rel), &content).unwrap();
            let action = action_over(rel.clone());
            let before = fingerprint_action(&action, dir.path()).unwrap();

            let mut flipped = content.clone();
            flipped[index] ^= 0xFF;
            std::fs::write(dir.path().join(&rel), &flipped).unwrap();
            let after = fingerprint_action(&action, dir.path()).unwrap();

            prop_assert_ne!(before, after);
        }
    }
}
