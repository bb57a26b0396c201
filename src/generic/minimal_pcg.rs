//! A small, deterministic pseudorandom number generator.
//!
//! A translation of the minimal C PCG32 implementation from
//! <https://www.pcg-random.org/>. Chosen as the presolver's source of
//! randomness (currently just `permute_presolve_constraint_order`'s
//! initial-queue shuffle; the inclusion/duplicate analyzers and the
//! `no_overlap_2d` rectangle search turned out to have fully deterministic
//! signature-based formulations and never needed to draw from it) because
//! it is simple, fast, and — critically for spec.md §5's determinism
//! guarantee — reproducible byte-for-byte given the same seed, without
//! pulling in a full RNG crate's default features.

use rand::SeedableRng;
use rand_core::{impls, RngCore};

/// State and increment.
#[derive(Default)]
pub struct MinimalPCG32 {
    state: u64,
    inc: u64,
}

impl RngCore for MinimalPCG32 {
    fn next_u32(&mut self) -> u32 {
        let old_state = self.state;

        self.state = old_state
            .wrapping_mul(6364136223846793005_u64)
            .wrapping_add(self.inc);

        let xorshifted = ((old_state >> 18) ^ old_state) >> 27;
        let rot = (old_state >> 59) as u32;
        xorshifted.rotate_right(rot) as u32
    }

    fn next_u64(&mut self) -> u64 {
        self.next_u32() as u64
    }

    fn fill_bytes(&mut self, dest: &mut [u8]) {
        impls::fill_bytes_via_next(self, dest)
    }
}

impl SeedableRng for MinimalPCG32 {
    type Seed = [u8; 8];

    fn from_seed(seed: Self::Seed) -> Self {
        const INCREMENT: u64 = 3215534235932367344;
        Self {
            state: (u64::from_le_bytes(seed)).wrapping_add(INCREMENT),
            inc: INCREMENT,
        }
    }
}

impl MinimalPCG32 {
    /// A value in `0..bound`, or `0` when `bound` is zero. Uses a plain
    /// modulo reduction rather than rejection sampling: the slight modulo
    /// bias is irrelevant here (every caller uses this for a one-off
    /// shuffle or sampling choice, never for anything statistical), and
    /// staying branch-free keeps the sequence simple to reason about.
    pub fn below(&mut self, bound: u32) -> u32 {
        if bound == 0 {
            0
        } else {
            self.next_u32() % bound
        }
    }

    /// Fisher-Yates shuffle of `slice` in place.
    pub fn shuffle<T>(&mut self, slice: &mut [T]) {
        for i in (1..slice.len()).rev() {
            let j = self.below((i + 1) as u32) as usize;
            slice.swap(i, j);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn deterministic_for_a_fixed_seed() {
        let mut a = MinimalPCG32::from_seed(2u64.to_le_bytes());
        let mut b = MinimalPCG32::from_seed(2u64.to_le_bytes());
        for _ in 0..16 {
            assert_eq!(a.next_u64(), b.next_u64());
        }
    }

    #[test]
    fn different_seeds_diverge() {
        let mut a = MinimalPCG32::from_seed(2u64.to_le_bytes());
        let mut b = MinimalPCG32::from_seed(73u64.to_le_bytes());
        assert_ne!(a.next_u64(), b.next_u64());
    }

    #[test]
    fn shuffle_is_deterministic_for_a_fixed_seed() {
        let mut a: Vec<u32> = (0..20).collect();
        let mut b = a.clone();
        MinimalPCG32::from_seed(11u64.to_le_bytes()).shuffle(&mut a);
        MinimalPCG32::from_seed(11u64.to_le_bytes()).shuffle(&mut b);
        assert_eq!(a, b);
        let mut sorted = a.clone();
        sorted.sort();
        assert_eq!(sorted, (0..20).collect::<Vec<_>>());
    }

    #[test]
    fn below_zero_is_always_zero() {
        let mut rng = MinimalPCG32::from_seed(5u64.to_le_bytes());
        for _ in 0..8 {
            assert_eq!(rng.below(0), 0);
        }
    }
}
