//! Series→pool lookup table (spec §4.1).
//!
//! `gen_lookup` is a pure function: given the number of pools in the
//! cluster, it deterministically assigns each of the 8192 lookup slots to
//! an owning pool, moving only the slots that must move when a pool is
//! added. Every node computes the same table independently from the same
//! `num_pools`, so the algorithm and its offset-seeding tie-break must be
//! reproduced exactly (see `examples/original_source/src/siri/db/pools.c`,
//! `POOLS_make`).

use crate::util::LOOKUP_SIZE;

/// The 8192-slot routing table. Given a `Serialize`/`Deserialize` impl
/// because, conceptually, every node in the cluster must agree on it —
/// even though in this implementation it is always recomputed locally
/// rather than shipped over the wire.
pub type SeriesLookup = [u16; LOOKUP_SIZE];

/// Generate the lookup table for `num_pools` pools.
///
/// # Panics
///
/// Panics if `num_pools` is 0 or greater than 8192; both are invariant
/// violations by construction (spec §4.1 contract: `num_pools ∈ [1, 8192]`)
/// rather than recoverable input errors.
pub fn gen_lookup(num_pools: u16) -> SeriesLookup {
    assert!(
        (1..=LOOKUP_SIZE as u32).contains(&(num_pools as u32)),
        "num_pools must be in [1, 8192], got {num_pools}"
    );

    let mut lookup: SeriesLookup = [0u16; LOOKUP_SIZE];

    for n in 1..num_pools {
        // Reassign 1/(n+1) of each existing pool's slots to the new pool
        // `n`. The offsets are seeded [0, 1, .., n-1], not all zero — this
        // seeding is what makes the tie-break deterministic across nodes.
        let mut counters: Vec<u32> = (0..n as u32).collect();
        let m = n as u32 + 1;

        for slot in lookup.iter_mut() {
            let owner = *slot as usize;
            counters[owner] += 1;
            if counters[owner] % m == 0 {
                *slot = n;
            }
        }
    }

    lookup
}

/// Route a series name to its owning pool id.
pub fn pool_of(lookup: &SeriesLookup, name: &str) -> u16 {
    lookup[crate::util::series_slot(name)]
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn single_pool_owns_every_slot() {
        let lookup = gen_lookup(1);
        assert!(lookup.iter().all(|&pool| pool == 0));
    }

    #[test]
    fn is_deterministic() {
        assert_eq!(gen_lookup(5), gen_lookup(5));
    }

    #[test]
    fn stable_under_growth() {
        // Invariant 2 (spec §8): growing from N to N+1 pools never
        // reassigns a slot between two *existing* pools — a slot either
        // keeps its pool or moves to the newly added one.
        for n in 1..32u16 {
            let before = gen_lookup(n);
            let after = gen_lookup(n + 1);
            for i in 0..LOOKUP_SIZE {
                assert!(
                    before[i] == after[i] || after[i] == n,
                    "slot {i} moved from {} to {} when growing {n} -> {}",
                    before[i],
                    after[i],
                    n + 1
                );
            }
        }
    }

    #[test]
    fn two_pools_alternate_on_odd_offset() {
        // Scenario S4 (spec §6): gen_lookup(2)[i] is 1 iff i is odd under
        // the offset seed, count of ones ~= 4096.
        let lookup = gen_lookup(2);
        let ones = lookup.iter().filter(|&&pool| pool == 1).count();
        assert!((ones as i64 - 4096).abs() <= 1);
        for (i, &pool) in lookup.iter().enumerate() {
            assert_eq!(pool, (i % 2 == 1) as u16);
        }
    }

    #[test]
    fn roughly_even_distribution() {
        let lookup = gen_lookup(4);
        let mut counts = [0u32; 4];
        for &pool in lookup.iter() {
            counts[pool as usize] += 1;
        }
        for count in counts {
            assert!((count as i64 - 2048).abs() < 64);
        }
    }

    #[test]
    #[should_panic]
    fn zero_pools_panics() {
        gen_lookup(0);
    }

    #[test]
    fn pool_of_is_in_range() {
        let lookup = gen_lookup(3);
        let pool = pool_of(&lookup, "cpu.load.avg");
        assert!(pool < 3);
    }
}
