// src/core/cluster/hash.rs

//! Implements the key-to-node hash.

/// Calculates the routing hash for a key: a 31-multiplier fold over the key
/// bytes with unsigned 32-bit wraparound. The owning node is the
/// `hash mod active_count`-th active membership entry.
///
/// Every key re-maps when the active count changes; stronger consistent-hash
/// schemes are out of scope.
pub fn hash_key(key: &[u8]) -> u32 {
    key.iter()
        .fold(0u32, |h, &b| h.wrapping_mul(31).wrapping_add(u32::from(b)))
}
