//! Match State Definitions
//!
//! The complete state of one Ludo match as a plain value. Engine operations
//! take a `&MatchState` and hand back a new one; nothing here mutates in
//! place outside the crate.

use std::fmt;
use serde::{Serialize, Deserialize};

use crate::core::hash::{StateHash, compute_state_hash};
use crate::game::board::is_valid;
use crate::game::engine::PITY_LIMIT;

// =============================================================================
// PLAYER
// =============================================================================

/// One of the two seats at the board. `P1` always moves first.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Player {
    /// First seat.
    #[serde(rename = "P1")]
    One,
    /// Second seat.
    #[serde(rename = "P2")]
    Two,
}

impl Player {
    /// Both players in seat order.
    pub const ALL: [Player; 2] = [Player::One, Player::Two];

    /// The other seat.
    #[inline]
    pub fn opponent(self) -> Player {
        match self {
            Player::One => Player::Two,
            Player::Two => Player::One,
        }
    }

    /// Seat index (0 or 1).
    #[inline]
    pub fn index(self) -> usize {
        self as usize
    }

    /// Wire label, `"P1"` or `"P2"`.
    pub fn label(self) -> &'static str {
        match self {
            Player::One => "P1",
            Player::Two => "P2",
        }
    }
}

impl fmt::Display for Player {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

// =============================================================================
// PIECE INDEX
// =============================================================================

/// Index of one of a player's four pieces.
///
/// Always in `0..4`; untrusted input goes through [`PieceIndex::new`] or
/// `TryFrom<u8>`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub struct PieceIndex(u8);

/// Raised when a piece index outside `0..4` is supplied.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("piece index {0} out of range (expected 0-3)")]
pub struct InvalidPieceIndex(pub u8);

impl PieceIndex {
    /// Pieces per player.
    pub const COUNT: usize = 4;

    /// All four indices in ascending order.
    pub const ALL: [PieceIndex; 4] = [PieceIndex(0), PieceIndex(1), PieceIndex(2), PieceIndex(3)];

    /// Create from a raw index, `None` if out of range.
    pub const fn new(index: u8) -> Option<Self> {
        if (index as usize) < Self::COUNT {
            Some(Self(index))
        } else {
            None
        }
    }

    /// Raw index.
    #[inline]
    pub fn get(self) -> u8 {
        self.0
    }

    /// Raw index for array access.
    #[inline]
    pub fn as_usize(self) -> usize {
        self.0 as usize
    }
}

impl TryFrom<u8> for PieceIndex {
    type Error = InvalidPieceIndex;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        Self::new(value).ok_or(InvalidPieceIndex(value))
    }
}

impl From<PieceIndex> for u8 {
    fn from(piece: PieceIndex) -> u8 {
        piece.0
    }
}

impl fmt::Display for PieceIndex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

// =============================================================================
// POSITION
// =============================================================================

/// Where a single piece is.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Position {
    /// Off the board, waiting for a six.
    Base,
    /// On the shared circular track, `0..52`.
    Track(u8),
    /// On the owner's private approach, stretch index `0..5`.
    HomeStretch(u8),
    /// Finished.
    Home,
}

impl Position {
    /// Is this piece still in its base?
    #[inline]
    pub fn is_base(self) -> bool {
        matches!(self, Position::Base)
    }

    /// Has this piece finished?
    #[inline]
    pub fn is_home(self) -> bool {
        matches!(self, Position::Home)
    }

    /// Track coordinate, if on the shared track.
    #[inline]
    pub fn track_square(self) -> Option<u8> {
        match self {
            Position::Track(n) => Some(n),
            _ => None,
        }
    }

    /// Stable discriminant used when hashing.
    fn tag(self) -> (u8, u8) {
        match self {
            Position::Base => (0, 0),
            Position::Track(n) => (1, n),
            Position::HomeStretch(k) => (2, k),
            Position::Home => (3, 0),
        }
    }
}

// =============================================================================
// TURN PHASE
// =============================================================================

/// Where the current turn is in the roll-then-move cycle.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum TurnPhase {
    /// Waiting for the player on turn to roll.
    #[default]
    DiceNotRolled,
    /// Rolled, waiting for a move with this value.
    DiceRolled {
        /// Face shown, `1..=6`.
        value: u8,
    },
}

impl TurnPhase {
    /// Current dice value, only while a roll is pending.
    #[inline]
    pub fn dice_value(self) -> Option<u8> {
        match self {
            TurnPhase::DiceNotRolled => None,
            TurnPhase::DiceRolled { value } => Some(value),
        }
    }
}

// =============================================================================
// MATCH STATE
// =============================================================================

/// Complete state of a match.
///
/// Deserializing checks the same bounds as the builders.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "MatchStateRepr")]
pub struct MatchState {
    /// Positions per player, indexed by `PieceIndex`.
    positions: [[Position; PieceIndex::COUNT]; 2],
    /// Player expected to act.
    turn: Player,
    /// Roll/move phase of the current turn.
    phase: TurnPhase,
    /// Consecutive non-six rolls per player.
    pity: [u8; 2],
}

impl Default for MatchState {
    fn default() -> Self {
        Self::new()
    }
}

impl MatchState {
    /// Fresh match: every piece in base, P1 to roll, no pity accumulated.
    pub fn new() -> Self {
        Self {
            positions: [[Position::Base; PieceIndex::COUNT]; 2],
            turn: Player::One,
            phase: TurnPhase::DiceNotRolled,
            pity: [0; 2],
        }
    }

    /// Place a piece anywhere, for setting up positions in tests and tools.
    ///
    /// # Panics
    ///
    /// If `position` is off the board (`Track(52..)` or `HomeStretch(5..)`).
    pub fn with_position(mut self, player: Player, piece: PieceIndex, position: Position) -> Self {
        assert!(is_valid(position), "{position:?} is off the board");
        self.set_position(player, piece, position);
        self
    }

    /// Hand the turn to `player` with the dice not yet rolled.
    pub fn with_turn(mut self, player: Player) -> Self {
        self.turn = player;
        self.phase = TurnPhase::DiceNotRolled;
        self
    }

    /// Override a pity counter.
    ///
    /// # Panics
    ///
    /// If `count` exceeds [`PITY_LIMIT`].
    pub fn with_pity(mut self, player: Player, count: u8) -> Self {
        assert!(count <= PITY_LIMIT, "pity {count} above {PITY_LIMIT}");
        self.pity[player.index()] = count;
        self
    }

    /// Position of one piece.
    #[inline]
    pub fn position(&self, player: Player, piece: PieceIndex) -> Position {
        self.positions[player.index()][piece.as_usize()]
    }

    /// All four positions of a player.
    #[inline]
    pub fn positions(&self, player: Player) -> &[Position; PieceIndex::COUNT] {
        &self.positions[player.index()]
    }

    /// Player expected to act.
    #[inline]
    pub fn turn(&self) -> Player {
        self.turn
    }

    /// Current phase.
    #[inline]
    pub fn phase(&self) -> TurnPhase {
        self.phase
    }

    /// Rolled value awaiting a move, if any.
    #[inline]
    pub fn dice_value(&self) -> Option<u8> {
        self.phase.dice_value()
    }

    /// Consecutive non-six rolls for a player.
    #[inline]
    pub fn pity(&self, player: Player) -> u8 {
        self.pity[player.index()]
    }

    /// True iff all four of the player's pieces are home.
    pub fn has_won(&self, player: Player) -> bool {
        self.positions(player).iter().all(|p| p.is_home())
    }

    /// The winner, if the match is decided.
    pub fn winner(&self) -> Option<Player> {
        Player::ALL.into_iter().find(|p| self.has_won(*p))
    }

    /// Is the match decided?
    pub fn is_over(&self) -> bool {
        self.winner().is_some()
    }

    pub(crate) fn set_position(&mut self, player: Player, piece: PieceIndex, position: Position) {
        self.positions[player.index()][piece.as_usize()] = position;
    }

    pub(crate) fn set_pity(&mut self, player: Player, count: u8) {
        self.pity[player.index()] = count;
    }

    pub(crate) fn set_phase(&mut self, phase: TurnPhase) {
        self.phase = phase;
    }

    /// Pass the turn to the opponent and wait for their roll.
    pub(crate) fn pass_turn(&mut self) {
        self.turn = self.turn.opponent();
        self.phase = TurnPhase::DiceNotRolled;
    }

    /// Keep the turn and wait for another roll.
    pub(crate) fn retain_turn(&mut self) {
        self.phase = TurnPhase::DiceNotRolled;
    }

    /// Compute hash of current state for verification.
    pub fn compute_hash(&self) -> StateHash {
        compute_state_hash(|hasher| {
            for player in Player::ALL {
                for position in self.positions(player) {
                    let (tag, value) = position.tag();
                    hasher.update_u8(tag);
                    hasher.update_u8(value);
                }
                hasher.update_u8(self.pity(player));
            }

            hasher.update_u8(self.turn as u8);
            match self.phase {
                TurnPhase::DiceNotRolled => hasher.update_u8(0),
                TurnPhase::DiceRolled { value } => {
                    hasher.update_u8(1);
                    hasher.update_u8(value);
                }
            }
        })
    }
}

/// Serialized form of [`MatchState`], checked before it becomes one.
#[derive(Deserialize)]
struct MatchStateRepr {
    positions: [[Position; PieceIndex::COUNT]; 2],
    turn: Player,
    phase: TurnPhase,
    pity: [u8; 2],
}

/// Raised when a serialized match state is out of bounds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum InvalidMatchState {
    /// A piece sits on a square that does not exist.
    #[error("{player} piece {piece} is off the board at {position:?}")]
    OffBoard {
        /// Owner.
        player: Player,
        /// Piece.
        piece: PieceIndex,
        /// Stored position.
        position: Position,
    },

    /// A pity counter beyond the forcing limit.
    #[error("{player} pity {count} above the forcing limit")]
    PityOutOfRange {
        /// Owner of the counter.
        player: Player,
        /// Stored count.
        count: u8,
    },

    /// A pending roll that no die can show.
    #[error("pending dice value {0} outside 1-6")]
    BadDiceValue(u8),
}

impl TryFrom<MatchStateRepr> for MatchState {
    type Error = InvalidMatchState;

    fn try_from(repr: MatchStateRepr) -> Result<Self, Self::Error> {
        for player in Player::ALL {
            for piece in PieceIndex::ALL {
                let position = repr.positions[player.index()][piece.as_usize()];
                if !is_valid(position) {
                    return Err(InvalidMatchState::OffBoard { player, piece, position });
                }
            }
            let count = repr.pity[player.index()];
            if count > PITY_LIMIT {
                return Err(InvalidMatchState::PityOutOfRange { player, count });
            }
        }
        if let TurnPhase::DiceRolled { value } = repr.phase {
            if !(1..=6).contains(&value) {
                return Err(InvalidMatchState::BadDiceValue(value));
            }
        }

        Ok(Self {
            positions: repr.positions,
            turn: repr.turn,
            phase: repr.phase,
            pity: repr.pity,
        })
    }
}

// =============================================================================
// TESTS
// =============================================================================
