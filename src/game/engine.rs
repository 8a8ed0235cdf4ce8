//! Rule Engine
//!
//! Turn/dice state machine, move legality, move resolution with capture
//! detection, the pity dice rule and replay.
//!
//! Every operation takes the current [`MatchState`] by reference and
//! returns the next state together with an outcome record. A rejected
//! action returns [`ActionRejected`] and produces no new state, so a stale
//! or duplicated intent can never corrupt a match.
//!
//! ```
//! use ludo_server::core::ScriptedDice;
//! use ludo_server::game::engine::{roll_dice, move_piece};
//! use ludo_server::game::state::{MatchState, Player, PieceIndex, Position};
//!
//! let state = MatchState::new();
//! let mut dice = ScriptedDice::new([6]);
//!
//! let (state, roll) = roll_dice(&state, Player::One, &mut dice).unwrap();
//! assert_eq!(roll.eligible, PieceIndex::ALL.to_vec());
//!
//! let (state, moved) = move_piece(&state, Player::One, PieceIndex::ALL[0]).unwrap();
//! assert_eq!(moved.path, vec![Position::Track(0)]);
//! assert!(moved.turn_retained); // a six keeps the turn
//! assert_eq!(state.turn(), Player::One);
//! ```

use serde::{Serialize, Deserialize};

use crate::core::dice::{DiceSource, ScriptedDice};
use crate::game::board::{advance_one_step, base_square, entry_square, is_safe, steps_to_home};
use crate::game::state::{MatchState, Player, PieceIndex, Position, TurnPhase};

/// Consecutive non-six rolls after which the next roll is forced to six.
pub const PITY_LIMIT: u8 = 15;

/// The face that releases pieces from base and grants another turn.
pub const SIX: u8 = 6;

// =============================================================================
// REJECTIONS
// =============================================================================

/// Why an intent was refused. The match always continues.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum ActionRejected {
    /// The acting player is not on turn.
    #[error("not your turn (waiting on {expected})")]
    NotYourTurn {
        /// Player whose turn it is.
        expected: Player,
    },

    /// A roll was requested while a rolled value is still pending.
    #[error("dice already rolled this turn")]
    DiceAlreadyRolled,

    /// A move was requested before rolling.
    #[error("dice not rolled yet")]
    DiceNotRolled,

    /// The chosen piece has no legal move for the rolled value.
    #[error("piece {0} cannot move with the current roll")]
    PieceNotEligible(PieceIndex),

    /// Someone has already won.
    #[error("match is over")]
    MatchOver,
}

// =============================================================================
// OUTCOMES
// =============================================================================

/// Result of a successful roll.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RollOutcome {
    /// Player who rolled.
    pub player: Player,
    /// Face shown, `1..=6`.
    pub value: u8,
    /// The six was forced by the pity rule.
    pub forced: bool,
    /// Pieces that can move with this value, ascending.
    pub eligible: Vec<PieceIndex>,
    /// No piece could move, so the turn passed as part of this roll.
    pub turn_changed: bool,
    /// Player on turn after the roll.
    pub next_turn: Player,
}

/// An opponent piece sent back to base.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CaptureRecord {
    /// Owner of the captured piece.
    pub player: Player,
    /// Index of the captured piece.
    pub piece: PieceIndex,
    /// Addressable base slot it was returned to.
    pub square: u16,
}

/// Raw effect of relocating a piece, before any turn bookkeeping.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MoveResolution {
    /// Every square visited, in order; the last one is the new position.
    pub path: Vec<Position>,
    /// Opponent pieces captured, ascending by piece index.
    pub captures: Vec<CaptureRecord>,
}

/// Result of a successful move.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MoveOutcome {
    /// Player who moved.
    pub player: Player,
    /// Piece that moved.
    pub piece: PieceIndex,
    /// Dice value used.
    pub value: u8,
    /// Every square visited, in order; the last one is the new position.
    pub path: Vec<Position>,
    /// Opponent pieces captured, ascending by piece index.
    pub captures: Vec<CaptureRecord>,
    /// The mover rolls again (six or capture).
    pub turn_retained: bool,
    /// Player on turn after the move.
    pub next_turn: Player,
    /// Set when this move finished the mover's last piece.
    pub winner: Option<Player>,
}

impl MoveOutcome {
    /// Primary capture record: the lowest-index captured piece.
    pub fn capture(&self) -> Option<&CaptureRecord> {
        self.captures.first()
    }
}

// =============================================================================
// LEGALITY
// =============================================================================

/// Pieces of `player` that can legally move `value` squares, ascending.
pub fn eligible_pieces(state: &MatchState, player: Player, value: u8) -> Vec<PieceIndex> {
    PieceIndex::ALL
        .into_iter()
        .filter(|piece| can_move(player, state.position(player, *piece), value))
        .collect()
}

/// Base needs a six; everything else needs room before home.
fn can_move(player: Player, position: Position, value: u8) -> bool {
    match steps_to_home(player, position) {
        None => value == SIX,
        Some(left) => value <= left,
    }
}

// =============================================================================
// ROLL
// =============================================================================

/// Roll for `player`.
///
/// Forced to six once the player's pity counter has reached
/// [`PITY_LIMIT`]; otherwise one face is drawn from `dice`. When no piece can
/// move the turn passes inside this same call.
pub fn roll_dice<D: DiceSource + ?Sized>(
    state: &MatchState,
    player: Player,
    dice: &mut D,
) -> Result<(MatchState, RollOutcome), ActionRejected> {
    if state.is_over() {
        return Err(ActionRejected::MatchOver);
    }
    if state.turn() != player {
        return Err(ActionRejected::NotYourTurn { expected: state.turn() });
    }
    if state.dice_value().is_some() {
        return Err(ActionRejected::DiceAlreadyRolled);
    }

    let forced = state.pity(player) >= PITY_LIMIT;
    let value = if forced { SIX } else { dice.roll_die() };

    let mut next = state.clone();
    next.set_pity(player, if value == SIX { 0 } else { state.pity(player) + 1 });

    let eligible = eligible_pieces(&next, player, value);
    let turn_changed = eligible.is_empty();
    if turn_changed {
        next.pass_turn();
    } else {
        next.set_phase(TurnPhase::DiceRolled { value });
    }

    let outcome = RollOutcome {
        player,
        value,
        forced,
        eligible,
        turn_changed,
        next_turn: next.turn(),
    };
    Ok((next, outcome))
}

// =============================================================================
// MOVE
// =============================================================================

/// Relocate `piece` by `value` and apply captures, with no turn checks.
///
/// The caller must already know the piece is eligible for `value`. A piece
/// leaving base lands on its entry square with a one-square path and never
/// captures; otherwise the path has exactly `value` squares.
pub fn resolve_move(
    state: &MatchState,
    player: Player,
    piece: PieceIndex,
    value: u8,
) -> (MatchState, MoveResolution) {
    let mut next = state.clone();
    let current = state.position(player, piece);

    if current.is_base() {
        let entry = Position::Track(entry_square(player));
        next.set_position(player, piece, entry);
        return (next, MoveResolution { path: vec![entry], captures: Vec::new() });
    }

    let mut path = Vec::with_capacity(value as usize);
    let mut position = current;
    for _ in 0..value {
        position = advance_one_step(player, position);
        path.push(position);
    }
    next.set_position(player, piece, position);

    let captures = capture_at(&mut next, player, position);
    (next, MoveResolution { path, captures })
}

/// Send every opponent piece sharing `landing` back to base.
///
/// Only unsafe track squares capture; home stretches, home and base are
/// private to their owner.
fn capture_at(state: &mut MatchState, mover: Player, landing: Position) -> Vec<CaptureRecord> {
    if landing.track_square().is_none() || is_safe(landing) {
        return Vec::new();
    }

    let opponent = mover.opponent();
    let mut captures = Vec::new();
    for piece in PieceIndex::ALL {
        if state.position(opponent, piece) == landing {
            state.set_position(opponent, piece, Position::Base);
            captures.push(CaptureRecord {
                player: opponent,
                piece,
                square: base_square(opponent, piece),
            });
        }
    }
    captures
}

/// Move `piece` for `player` with the pending dice value.
///
/// The mover keeps the turn after a six or a capture; otherwise it passes.
/// Either way the next step is a fresh roll.
pub fn move_piece(
    state: &MatchState,
    player: Player,
    piece: PieceIndex,
) -> Result<(MatchState, MoveOutcome), ActionRejected> {
    if state.is_over() {
        return Err(ActionRejected::MatchOver);
    }
    if state.turn() != player {
        return Err(ActionRejected::NotYourTurn { expected: state.turn() });
    }
    let value = state.dice_value().ok_or(ActionRejected::DiceNotRolled)?;
    if !can_move(player, state.position(player, piece), value) {
        return Err(ActionRejected::PieceNotEligible(piece));
    }

    let (mut next, resolution) = resolve_move(state, player, piece, value);

    let turn_retained = value == SIX || !resolution.captures.is_empty();
    if turn_retained {
        next.retain_turn();
    } else {
        next.pass_turn();
    }

    let winner = next.has_won(player).then_some(player);

    let outcome = MoveOutcome {
        player,
        piece,
        value,
        path: resolution.path,
        captures: resolution.captures,
        turn_retained,
        next_turn: next.turn(),
        winner,
    };
    Ok((next, outcome))
}

// =============================================================================
// REPLAY
// =============================================================================

/// One recorded intent, with the rolled face for rolls.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum MatchAction {
    /// A roll and the face it produced.
    Roll {
        /// Player who rolled.
        player: Player,
        /// Face shown.
        value: u8,
    },
    /// A piece move.
    Move {
        /// Player who moved.
        player: Player,
        /// Piece moved.
        piece: PieceIndex,
    },
}

/// Replay failure.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ReplayError {
    /// A recorded action was refused by the engine.
    #[error("action {index} rejected: {source}")]
    Rejected {
        /// Position in the action list.
        index: usize,
        /// Engine rejection.
        source: ActionRejected,
    },

    /// A recorded roll disagrees with what the engine produced (pity forcing).
    #[error("action {index}: recorded roll {recorded} but engine rolled {actual}")]
    DiceMismatch {
        /// Position in the action list.
        index: usize,
        /// Face in the record.
        recorded: u8,
        /// Face the engine produced.
        actual: u8,
    },
}

/// Rebuild a match from a fresh state by replaying recorded actions.
pub fn replay_match(actions: &[MatchAction]) -> Result<MatchState, ReplayError> {
    let mut state = MatchState::new();

    for (index, action) in actions.iter().enumerate() {
        state = match *action {
            MatchAction::Roll { player, value } => {
                let mut dice = ScriptedDice::new([value]);
                let (next, outcome) = roll_dice(&state, player, &mut dice)
                    .map_err(|source| ReplayError::Rejected { index, source })?;
                if outcome.value != value {
                    return Err(ReplayError::DiceMismatch {
                        index,
                        recorded: value,
                        actual: outcome.value,
                    });
                }
                next
            }
            MatchAction::Move { player, piece } => {
                move_piece(&state, player, piece)
                    .map_err(|source| ReplayError::Rejected { index, source })?
                    .0
            }
        };
    }

    Ok(state)
}

// =============================================================================
// TESTS
// =============================================================================
