//! Length-prefixed framing so no field boundary in a hashed sequence is
//! ambiguous (spec.md §4.2).

/// Feeds a length-prefixed byte string into `hasher`. Using a fixed 8-byte
/// little-endian length prefix (rather than plain concatenation) is what
/// prevents e.g. `["a", "bc"]` and `["ab", "c"]` from colliding.
pub fn write_framed(hasher: &mut blake3::Hasher, bytes: &[u8]) {
    hasher.update(&(bytes.len() as u64).to_le_bytes());
    hasher.update(bytes);
}

pub fn write_framed_str(hasher: &mut blake3::Hasher, s: &str) {
    write_framed(hasher, s.as_bytes());
}

/// Hashes a list of strings with length-prefixed framing between each
/// element (spec.md §4.2, `hash_strings`).
pub fn hash_strings(list: &[impl AsRef<str>]) -> crucible_types::Digest {
    let mut hasher = blake3::Hasher::new();
    hasher.update(&(list.len() as u64).to_le_bytes());
    for item in list {
        write_framed_str(&mut hasher, item.as_ref());
    }
    crucible_types::Digest::from_bytes(*hasher.finalize().as_bytes())
}
