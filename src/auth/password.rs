use bcrypt::BcryptError;

/// Work factor applied to every new digest. Matches the digests already in
/// the principals table, so old and new rows verify through the same path.
pub const BCRYPT_COST: u32 = 10;

/// Hash a plaintext credential into a salted bcrypt digest.
///
/// The digest embeds the algorithm tag, cost, and a randomized salt, so two
/// calls with the same plaintext produce different digests.
pub fn hash_password(plain: &str) -> Result<String, BcryptError> {
    bcrypt::hash(plain, BCRYPT_COST)
}

/// Check a plaintext against a stored digest.
///
/// Returns `Ok(false)` on a mismatch. `Err` means the digest itself is not a
/// well-formed bcrypt hash; comparison of well-formed digests is delegated to
/// bcrypt's constant-time comparator and never errors.
pub fn verify_password(plain: &str, digest: &str) -> Result<bool, BcryptError> {
    bcrypt::verify(plain, digest)
}
