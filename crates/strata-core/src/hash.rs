//! Content hashing using SHA-256.

use sha2::{Digest, Sha256};

/// Length in hex characters of every object id.
pub const ID_LEN: usize = 64;

/// Hash several fields as one object id.
///
/// Each part is followed by a NUL byte so that `("ab", "c")` and
/// `("a", "bc")` do not collide.
pub fn hash_parts(parts: &[&[u8]]) -> String {
    let mut hasher = Sha256::new();
    for part in parts {
        hasher.update(part);
        hasher.update([0u8]);
    }
    hex_encode(&hasher.finalize())
}

/// True if `s` has the shape of a full object id.
pub fn is_full_id(s: &str) -> bool {
    s.len() == ID_LEN && s.bytes().all(|b| b.is_ascii_hexdigit())
}

/// Encode raw bytes as a lowercase hex string.
fn hex_encode(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{b:02x}")).collect()
}
