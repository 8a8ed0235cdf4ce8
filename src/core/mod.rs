//! Core deterministic primitives.
//!
//! Randomness and hashing live here so the rule engine above them stays
//! pure and replayable.

pub mod dice;
pub mod rng;
pub mod hash;

// Re-export core types
pub use dice::{DiceSource, ScriptedDice};
pub use rng::DeterministicRng;
pub use hash::{compute_state_hash, StateHash};
