//! Deterministic seed derivation.
//!
//! Every run owns a single `global_seed`; each worker's RNG is seeded from
//! `derive_seed(global_seed, tid)`. There is no process-wide generator:
//! reproducing worker 7 of a failed run only requires the global seed and
//! the tid.

/// SplitMix64 increment.
const GAMMA: u64 = 0x9E37_79B9_7F4A_7C15;

/// Derives the RNG seed for a single worker from the run's global seed.
///
/// Uses a SplitMix64 finalizer so adjacent tids produce uncorrelated
/// streams. Deterministic: the same `(global_seed, tid)` pair always yields
/// the same seed.
#[must_use]
pub fn derive_seed(global_seed: u64, tid: usize) -> u64 {
    let mut z = global_seed.wrapping_add(GAMMA.wrapping_mul(tid as u64 + 1));
    z = (z ^ (z >> 30)).wrapping_mul(0xBF58_476D_1CE4_E5B9);
    z = (z ^ (z >> 27)).wrapping_mul(0x94D0_49BB_1331_11EB);
    z ^ (z >> 31)
}
