//! Password hashing and verification.
//!
//! Iterated SHA-256 (100k rounds) with a random per-user salt. The stored
//! representation is `salt$digest` (both hex), so two hashes of the same
//! plaintext differ while both verify. Comparison is constant-time to avoid
//! leaking the mismatch position.

use rand::RngCore;
use sha2::{Digest, Sha256};

/// Salt byte length before hex encoding.
const SALT_BYTES: usize = 16;

/// Number of SHA-256 iterations for password stretching.
const HASH_ITERATIONS: u32 = 100_000;

/// Separator between the hex salt and hex digest in stored hashes.
const SEPARATOR: char = '$';

/// Hash a plaintext password with a fresh random salt.
///
/// Returns the storage representation (`salt$digest`). Non-deterministic:
/// hashing the same plaintext twice yields different strings.
pub fn hash(plaintext: &str) -> String {
    let mut salt_bytes = [0u8; SALT_BYTES];
    rand::rngs::OsRng.fill_bytes(&mut salt_bytes);
    let salt = hex::encode(salt_bytes);
    let digest = derive(plaintext, &salt);
    format!("{salt}{SEPARATOR}{digest}")
}

/// Verify a plaintext password against a stored `salt$digest` hash.
///
/// Never errors: a malformed stored hash or a mismatch both return `false`.
pub fn verify(plaintext: &str, stored: &str) -> bool {
    let Some((salt, digest)) = stored.split_once(SEPARATOR) else {
        return false;
    };
    let attempt = derive(plaintext, salt);
    constant_time_eq(attempt.as_bytes(), digest.as_bytes())
}

/// Burn the same work as a real verification against a throwaway salt.
///
/// Called on login for unknown usernames so that "no such user" and "wrong
/// password" take indistinguishable time.
pub fn dummy_verify(plaintext: &str) {
    let _ = derive(plaintext, "0000000000000000");
}

/// Derive the hex digest for a plaintext + salt pair (deterministic).
fn derive(plaintext: &str, salt: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(salt.as_bytes());
    hasher.update(plaintext.as_bytes());
    let mut result = hasher.finalize();

    // Iterated hashing for key stretching
    for _ in 1..HASH_ITERATIONS {
        let mut h = Sha256::new();
        h.update(result);
        h.update(salt.as_bytes());
        result = h.finalize();
    }

    hex::encode(result)
}

/// Constant-time byte comparison to prevent timing attacks.
pub(crate) fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    let mut diff = 0u8;
    for (x, y) in a.iter().zip(b.iter()) {
        diff |= x ^ y;
    }
    diff == 0
}
