//! Deterministic hashing helpers. `FxHasher` has no per-process random state, so the same
//! input always yields the same value, which is what seed derivation needs.

use rustc_hash::FxHasher;
use std::hash::{Hash, Hasher};

pub fn hash_str(data: &str) -> u64 {
    let mut hasher = FxHasher::default();
    data.hash(&mut hasher);
    hasher.finish()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hash_is_stable_and_distinguishes_names() {
        assert_eq!(hash_str("MovementRng"), hash_str("MovementRng"));
        assert_ne!(hash_str("MovementRng"), hash_str("SeedingRng"));
    }
}
