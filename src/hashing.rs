//! Deterministic `HashMap` and `HashSet` variants.
//!
//! The hashing data structures in the standard library are randomly seeded, so
//! their iteration order changes from one process to the next. Replicate runs
//! must be bit-for-bit reproducible given a seed set, so every hash-keyed
//! container in the engine uses the fixed `rustc-hash` hasher instead.
//!
//! `HashMap<K, V, S>` with a custom hasher has no `new` method; use
//! `HashMap::default()`.

pub use rustc_hash::{FxHashMap as HashMap, FxHashSet as HashSet};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn iteration_order_is_stable() {
        let build = || {
            let mut set = HashSet::default();
            for value in [17_usize, 3, 99, 42, 7, 1000, 5] {
                set.insert(value);
            }
            set.into_iter().collect::<Vec<_>>()
        };
        assert_eq!(build(), build());
    }
}
