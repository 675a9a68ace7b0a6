//! Uniform random block generation
//!
//! `RandomRangeState` is a two-word multiply-with-carry generator (Marsaglia's
//! 36969/18000 pair). Every value it returns is derived from its own two seed
//! words; there is no process-global random source behind it, so two states
//! seeded alike yield the same sequence no matter how their calls interleave.

use super::Distribution;

/// Seed both words start from unless another seed is supplied
pub const DEFAULT_SEED: u32 = 100;

/// Per-unit random range generator
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RandomRangeState {
    seed_w: u32,
    seed_z: u32,
    start: u64,
    end: u64,
}

impl RandomRangeState {
    /// Generator for the inclusive range `[start, end]` with the fixed default seed
    pub fn new(start: u64, end: u64) -> Self {
        Self::with_seed(start, end, DEFAULT_SEED, DEFAULT_SEED)
    }

    /// Generator with explicit seed words
    ///
    /// A zero word would lock that half of the generator at zero forever, so it
    /// is replaced by the default seed.
    pub fn with_seed(start: u64, end: u64, seed_w: u32, seed_z: u32) -> Self {
        let nonzero = |s: u32| if s == 0 { DEFAULT_SEED } else { s };
        Self {
            seed_w: nonzero(seed_w),
            seed_z: nonzero(seed_z),
            start,
            end,
        }
    }

    /// Advance both words and combine them into one 32-bit output
    #[inline]
    pub fn next_u32(&mut self) -> u32 {
        self.seed_z = 36969u32
            .wrapping_mul(self.seed_z & 0xFFFF)
            .wrapping_add(self.seed_z >> 16);
        self.seed_w = 18000u32
            .wrapping_mul(self.seed_w & 0xFFFF)
            .wrapping_add(self.seed_w >> 16);
        (self.seed_z << 16).wrapping_add(self.seed_w)
    }

    #[inline]
    fn next_u64(&mut self) -> u64 {
        let hi = self.next_u32() as u64;
        let lo = self.next_u32() as u64;
        (hi << 32) | lo
    }

    /// Uniform draw from `[start, end]`
    pub fn next_in_range(&mut self) -> u64 {
        if self.end <= self.start {
            return self.start;
        }

        let span = self.end - self.start;
        let draw = if span < u32::MAX as u64 {
            self.next_u32() as u64 % (span + 1)
        } else if span == u64::MAX {
            self.next_u64()
        } else {
            self.next_u64() % (span + 1)
        };

        self.start + draw
    }
}

impl Distribution for RandomRangeState {
    #[inline]
    fn next_block(&mut self) -> u64 {
        self.next_in_range()
    }
}
