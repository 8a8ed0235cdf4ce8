//! Deterministic Random Number Generator
//!
//! Uses Xorshift128+ algorithm for fast, high-quality, deterministic randomness.
//! Given the same seed, produces identical sequence on all platforms, so a
//! match seeded from a recorded value rolls the same dice every time.

use sha2::{Sha256, Digest};

use super::dice::DiceSource;

/// Deterministic PRNG using Xorshift128+ algorithm.
///
/// # Example
///
/// ```
/// use ludo_server::core::rng::DeterministicRng;
///
/// let mut a = DeterministicRng::new(12345);
/// let mut b = DeterministicRng::new(12345);
/// assert_eq!(a.next_u64(), b.next_u64());
/// ```
#[derive(Clone, Debug)]
pub struct DeterministicRng {
    state: [u64; 2],
}

impl Default for DeterministicRng {
    fn default() -> Self {
        Self::new(0)
    }
}

impl DeterministicRng {
    /// Create a new RNG from a 64-bit seed.
    ///
    /// Uses SplitMix64 to initialize the internal state, ensuring
    /// good distribution even from weak seeds.
    pub fn new(seed: u64) -> Self {
        let mut s = seed;
        let state0 = splitmix64(&mut s);
        let state1 = splitmix64(&mut s);

        // Ensure state is never all zeros
        let state = if state0 == 0 && state1 == 0 {
            [1, 1]
        } else {
            [state0, state1]
        };

        Self { state }
    }

    /// Generate the next 64-bit random value.
    #[inline]
    pub fn next_u64(&mut self) -> u64 {
        let s0 = self.state[0];
        let mut s1 = self.state[1];
        let result = s0.wrapping_add(s1);

        s1 ^= s0;
        self.state[0] = s0.rotate_left(24) ^ s1 ^ (s1 << 16);
        self.state[1] = s1.rotate_left(37);

        result
    }

    /// Roll a single six-sided die, uniform over [1, 6].
    ///
    /// Draws in the top `u64::MAX % 6 + 1` values are rejected so every
    /// face has exactly the same probability.
    pub fn next_die(&mut self) -> u8 {
        const ZONE: u64 = u64::MAX - (u64::MAX % 6);
        loop {
            let value = self.next_u64();
            if value < ZONE {
                return (value % 6) as u8 + 1;
            }
        }
    }

}

impl DiceSource for DeterministicRng {
    fn roll_die(&mut self) -> u8 {
        self.next_die()
    }
}

/// SplitMix64 for seed initialization.
/// Produces well-distributed values from sequential seeds.
#[inline]
fn splitmix64(state: &mut u64) -> u64 {
    *state = state.wrapping_add(0x9E3779B97F4A7C15);
    let mut z = *state;
    z = (z ^ (z >> 30)).wrapping_mul(0xBF58476D1CE4E5B9);
    z = (z ^ (z >> 27)).wrapping_mul(0x94D049BB133111EB);
    z ^ (z >> 31)
}

/// Derive a match seed from room parameters.
///
/// # Parameters
///
/// - `entropy`: fresh random bytes drawn when the room is created
/// - `match_id`: unique room identifier
/// - `participant_ids`: connection ids in seat order (P1 first)
pub fn derive_match_seed(
    entropy: &[u8; 32],
    match_id: &[u8; 16],
    participant_ids: &[[u8; 16]],
) -> u64 {
    let mut hasher = Sha256::new();

    // Domain separator
    hasher.update(b"LUDO_SEED_V1");
    hasher.update(entropy);
    hasher.update(match_id);
    for pid in participant_ids {
        hasher.update(pid);
    }

    let hash = hasher.finalize();

    // Take first 8 bytes as seed
    let mut seed = [0u8; 8];
    seed.copy_from_slice(&hash[..8]);
    u64::from_le_bytes(seed)
}

// =============================================================================
// TESTS
// =============================================================================
