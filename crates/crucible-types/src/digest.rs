//! 256-bit digest primitives shared by the graph, cache, and CAS crates.
//!
//! The actual hashing lives in `crucible-hash`; this module only defines the
//! newtypes so that every crate can pass fingerprints and artifact digests
//! around without depending on the hashing implementation.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Raw 256-bit digest, stored as 64 lowercase hex characters when displayed.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Digest([u8; 32]);

/// A malformed hex string was given where a 64-character digest was expected.
#[derive(Debug, Clone, thiserror::Error)]
#[error("invalid digest: expected 64 hex characters, got {0}")]
pub struct InvalidDigest(String);

impl Digest {
    pub const ZERO: Digest = Digest([0u8; 32]);

    pub fn from_bytes(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    pub fn from_hex(s: &str) -> Result<Self, InvalidDigest> {
        if s.len() != 64 {
            return Err(InvalidDigest(s.to_string()));
        }
        let bytes = hex::decode(s).map_err(|_| InvalidDigest(s.to_string()))?;
        let array: [u8; 32] = bytes
            .try_into()
            .map_err(|_| InvalidDigest(s.to_string()))?;
        Ok(Self(array))
    }
}

impl fmt::Display for Digest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_hex())
    }
}

impl fmt::Debug for Digest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Digest({})", self.to_hex())
    }
}

impl FromStr for Digest {
    type Err = InvalidDigest;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_hex(s)
    }
}

/// Identifies a single [`crate::Action`]'s inputs and parameters; the cache key.
///
/// Two actions with the same fingerprint must produce byte-identical outputs
/// (spec.md §3, ActionFingerprint invariant).
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ActionFingerprint(Digest);

impl ActionFingerprint {
    pub fn from_digest(digest: Digest) -> Self {
        Self(digest)
    }

    pub fn digest(&self) -> Digest {
        self.0
    }

    pub fn to_hex(&self) -> String {
        self.0.to_hex()
    }

    pub fn from_hex(s: &str) -> Result<Self, InvalidDigest> {
        Digest::from_hex(s).map(Self)
    }
}

impl fmt::Display for ActionFingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.0, f)
    }
}

impl fmt::Debug for ActionFingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ActionFingerprint({})", self.0.to_hex())
    }
}

/// Identifies an immutable blob in the content-addressed store.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ArtifactDigest(Digest);

impl ArtifactDigest {
    pub fn from_digest(digest: Digest) -> Self {
        Self(digest)
    }

    pub fn digest(&self) -> Digest {
        self.0
    }

    pub fn to_hex(&self) -> String {
        self.0.to_hex()
    }

    pub fn from_hex(s: &str) -> Result<Self, InvalidDigest> {
        Digest::from_hex(s).map(Self)
    }

    /// Splits the hex digest into the two-level `<aa>/<bb>/<digest>` shard
    /// prefixes used by the CAS on-disk layout (spec.md §6.1).
    pub fn shard_prefixes(&self) -> (String, String) {
        let hex = self.to_hex();
        (hex[0..2].to_string(), hex[2..4].to_string())
    }
}

impl fmt::Display for ArtifactDigest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.0, f)
    }
}

impl fmt::Debug for ArtifactDigest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ArtifactDigest({})", self.0.to_hex())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn digest_roundtrips_through_hex() {
        let d = Digest::from_bytes([7u8; 32]);
        let hex = d.to_hex();
        assert_eq!(Digest::from_hex(&hex).unwrap(), d);
    }

    #[test]
    fn rejects_short_hex() {
        assert!(Digest::from_hex("abc").is_err());
    }

    #[test]
    fn shard_prefixes_match_layout() {
        let mut bytes = [0u8; 32];
        bytes[0] = 0xaa;
        bytes[1] = 0xbb;
        let d = ArtifactDigest::from_digest(Digest::from_bytes(bytes));
        let (a, b) = d.shard_prefixes();
        assert_eq!(a, "aa");
        assert_eq!(b, "bb");
    }
}
