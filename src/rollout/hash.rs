//! Stable cohort hashing
//!
//! djb2 over UTF-8 bytes with wrapping `u32` arithmetic. No seeds, no clocks:
//! the same input hashes identically in every process.

const DJB2_SEED: u32 = 5381;

fn djb2_update(mut h: u32, bytes: &[u8]) -> u32 {
    for &b in bytes {
        h = h.wrapping_mul(33).wrapping_add(u32::from(b));
    }
    h
}

/// djb2 hash of a string
pub fn stable_hash(input: &str) -> u32 {
    djb2_update(DJB2_SEED, input.as_bytes())
}

/// Cohort bucket (0-99) of `identity` for `flag`.
///
/// Hashes `"{identity}:{flag}"`, so one identity lands in independent buckets
/// for different flags.
pub fn bucket(identity: &str, flag: &str) -> u8 {
    let h = djb2_update(DJB2_SEED, identity.as_bytes());
    let h = djb2_update(h, b":");
    let h = djb2_update(h, flag.as_bytes());
    (h % 100) as u8
}
