//! Deterministic content and action fingerprinting (spec.md §4.2).
//!
//! Every digest in this crate is BLAKE3. File hashes and action
//! fingerprints are both [`crucible_types::Digest`]-shaped, but action
//! fingerprints are further wrapped in [`crucible_types::ActionFingerprint`]
//! to keep the two spaces distinct at the type level.

mod action_fingerprint;
mod error;
mod file;
mod framing;

pub use action_fingerprint::fingerprint_action;
pub use error::{HashError, Result};
pub use file::{empty_digest, hash_file, MMAP_THRESHOLD_BYTES};
pub use framing::{hash_strings, write_framed, write_framed_str};
