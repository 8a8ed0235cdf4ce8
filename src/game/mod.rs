//! Game Logic Module
//!
//! The Ludo rules. Pure and synchronous: no I/O, no clocks, no hidden
//! randomness.
//!
//! ## Module Structure
//!
//! - `board`: track layout, safe squares, single-step advance
//! - `state`: players, pieces, positions, match state
//! - `engine`: roll/move state machine, legality, captures, replay

pub mod board;
pub mod state;
pub mod engine;

// Re-export key types
pub use state::{MatchState, Player, PieceIndex, Position, TurnPhase};
pub use engine::{
    ActionRejected, CaptureRecord, MatchAction, MoveOutcome, MoveResolution, ReplayError, RollOutcome, PITY_LIMIT,
    eligible_pieces, move_piece, replay_match, resolve_move, roll_dice,
};
