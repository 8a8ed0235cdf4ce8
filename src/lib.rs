//! # Ludo Game Server
//!
//! Authoritative two-player Ludo: a pure rule engine and a WebSocket
//! coordinator that pairs connections into rooms.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                       LUDO SERVER                            │
//! ├─────────────────────────────────────────────────────────────┤
//! │  core/           - Deterministic primitives                  │
//! │  ├── dice.rs     - Dice source seam, scripted dice           │
//! │  ├── rng.rs      - Deterministic Xorshift128+ PRNG           │
//! │  └── hash.rs     - State hashing for verification            │
//! │                                                              │
//! │  game/           - Rules (deterministic)                     │
//! │  ├── board.rs    - Track layout, safe squares, stepping      │
//! │  ├── state.rs    - Players, pieces, positions, match state   │
//! │  └── engine.rs   - Roll/move state machine, captures, replay │
//! │                                                              │
//! │  network/        - Networking (non-deterministic)            │
//! │  ├── server.rs   - WebSocket server, pairing, config         │
//! │  ├── protocol.rs - Message types                             │
//! │  └── session.rs  - Room session management                   │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Determinism Guarantee
//!
//! The `core/` and `game/` modules are deterministic:
//! - No I/O, clocks or global state in the rules
//! - Dice come from an injected [`core::DiceSource`]
//! - Every rule returns a new [`MatchState`] instead of mutating in place
//!
//! Given the same seed and the same intents, a match produces the same
//! outcomes and the same state hash.

#![warn(missing_docs)]
#![warn(clippy::all)]
#![deny(unsafe_code)]

pub mod core;
pub mod game;
pub mod network;

// Re-export commonly used types
pub use core::{DeterministicRng, DiceSource, ScriptedDice};
pub use game::{ActionRejected, MatchState, PieceIndex, Player, Position};

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
