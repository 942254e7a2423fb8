use sha2::{Digest, Sha256};

/// One-way digest over the raw password, rendered as lowercase hex.
///
/// Plain unsalted SHA-256: the user table already holds digests in this form
/// from the previous backend, and they must keep verifying.
pub fn hash_password(password: &str) -> String {
    hex::encode(Sha256::digest(password.as_bytes()))
}

/// Structural check: recompute and compare.
pub fn verify_password(password: &str, digest: &str) -> bool {
    hash_password(password) == digest
}
