//! Stable hash bucketing.
//!
//! A user's bucket decides both rollout inclusion and variant assignment,
//! so it must be identical across processes, restarts, and runtimes. The
//! hash is SHA-256 over the flag key and user id, seed-free and stable,
//! never a language-default hasher. Keying on the flag as well as the
//! user keeps one user's exposure uncorrelated across experiments.

use rand::Rng;
use sha2::{Digest, Sha256};

/// Buckets partition users into [0, 99].
pub const BUCKET_COUNT: u32 = 100;

/// Deterministic bucket for an identified user.
pub fn bucket(flag_key: &str, user_id: &str) -> u8 {
    let mut hasher = Sha256::new();
    hasher.update(flag_key.as_bytes());
    hasher.update(b":");
    hasher.update(user_id.as_bytes());
    let digest = hasher.finalize();

    let word = u32::from_be_bytes([digest[0], digest[1], digest[2], digest[3]]);
    (word % BUCKET_COUNT) as u8
}

/// Uniform random bucket for anonymous users.
///
/// With no identity to key on there is nothing to be stable over;
/// anonymous sampling is per-call by design.
pub fn random_bucket() -> u8 {
    rand::rng().random_range(0..BUCKET_COUNT) as u8
}
