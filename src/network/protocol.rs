//! Protocol Messages
//!
//! Wire format for client-server communication over WebSocket.
//! Every message is a JSON object tagged by `type`. Squares are sent in the
//! addressable numbering of [`crate::game::board`].

use serde::{Serialize, Deserialize};

use crate::game::board::square_of;
use crate::game::engine::{CaptureRecord, MoveOutcome, RollOutcome};
use crate::game::state::{MatchState, Player, PieceIndex};

// =============================================================================
// CLIENT -> SERVER MESSAGES
// =============================================================================

/// Messages sent from client to server.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientMessage {
    /// Roll the dice.
    RollDice,

    /// Move one of the sender's pieces with the pending roll.
    MovePiece {
        /// Raw piece index; validated by the session.
        piece: u8,
    },

    /// Ping for latency measurement.
    Ping {
        /// Client clock, echoed back in the pong.
        timestamp: u64,
    },

    /// Player is leaving the match.
    Leave,
}

// =============================================================================
// SERVER -> CLIENT MESSAGES
// =============================================================================

/// Messages sent from server to client.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerMessage {
    /// Connected; waiting for an opponent.
    Waiting,

    /// Paired; the match begins.
    GameStart(GameStartInfo),

    /// Player on turn, sent after every turn boundary.
    TurnChange {
        /// Player now on turn.
        turn: Player,
    },

    /// Result of a roll.
    DiceRolled(DiceRolledInfo),

    /// Result of a move.
    PieceMoved(PieceMovedInfo),

    /// A player finished all four pieces.
    PlayerWon {
        /// The winner.
        player: Player,
    },

    /// The other participant left; the match is over.
    OpponentDisconnect,

    /// Pong response.
    Pong {
        /// Timestamp from the ping.
        timestamp: u64,
        /// Server clock in milliseconds since the Unix epoch.
        server_time: u64,
    },

    /// Error message (sender only).
    Error(ServerError),

    /// Server is shutting down.
    Shutdown {
        /// Why the server is stopping.
        reason: String,
    },
}

/// Sent to each participant when a room is formed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GameStartInfo {
    /// Seat assigned to the recipient.
    pub player: Player,
    /// Room identifier.
    pub room: String,
    /// Initial board.
    pub positions: BoardSnapshot,
}

/// Addressable square of every piece, plus a state hash.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BoardSnapshot {
    /// P1 pieces by index.
    #[serde(rename = "P1")]
    pub p1: [u16; PieceIndex::COUNT],
    /// P2 pieces by index.
    #[serde(rename = "P2")]
    pub p2: [u16; PieceIndex::COUNT],
    /// Hex SHA-256 of the full match state.
    pub state_hash: String,
}

impl BoardSnapshot {
    /// Snapshot a match state.
    pub fn from_state(state: &MatchState) -> Self {
        Self {
            p1: squares(state, Player::One),
            p2: squares(state, Player::Two),
            state_hash: hex::encode(state.compute_hash()),
        }
    }
}

fn squares(state: &MatchState, player: Player) -> [u16; PieceIndex::COUNT] {
    PieceIndex::ALL.map(|piece| square_of(player, piece, state.position(player, piece)))
}

/// Roll broadcast.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiceRolledInfo {
    /// Player who rolled.
    pub player: Player,
    /// Face shown.
    pub dice_value: u8,
    /// Pieces that may move.
    pub eligible_pieces: Vec<u8>,
    /// Six forced by the pity rule.
    pub forced: bool,
}

impl From<&RollOutcome> for DiceRolledInfo {
    fn from(outcome: &RollOutcome) -> Self {
        Self {
            player: outcome.player,
            dice_value: outcome.value,
            eligible_pieces: outcome.eligible.iter().map(|p| p.get()).collect(),
            forced: outcome.forced,
        }
    }
}

/// Move broadcast.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PieceMovedInfo {
    /// Player who moved.
    pub player: Player,
    /// Piece index moved.
    pub piece: u8,
    /// Squares visited, in order.
    pub path: Vec<u16>,
    /// Primary capture (lowest captured index), if any.
    pub capture: Option<CaptureRecord>,
    /// Every capture, ascending by piece index.
    pub captures: Vec<CaptureRecord>,
}

impl From<&MoveOutcome> for PieceMovedInfo {
    fn from(outcome: &MoveOutcome) -> Self {
        Self {
            player: outcome.player,
            piece: outcome.piece.get(),
            path: outcome
                .path
                .iter()
                .map(|pos| square_of(outcome.player, outcome.piece, *pos))
                .collect(),
            capture: outcome.capture().copied(),
            captures: outcome.captures.clone(),
        }
    }
}

/// Server error.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServerError {
    /// Error code.
    pub code: ErrorCode,
    /// Human-readable message.
    pub message: String,
}

/// Error codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCode {
    /// Malformed message or out-of-range field.
    InvalidInput,
    /// Game message sent outside a match.
    NotInMatch,
}

impl ServerMessage {
    /// Build an error message.
    pub fn error(code: ErrorCode, message: impl Into<String>) -> Self {
        ServerMessage::Error(ServerError {
            code,
            message: message.into(),
        })
    }
}

// =============================================================================
// SERIALIZATION HELPERS
// =============================================================================

impl ClientMessage {
    /// Serialize to JSON string.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    /// Deserialize from JSON string.
    pub fn from_json(s: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(s)
    }
}

impl ServerMessage {
    /// Serialize to JSON string.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    /// Deserialize from JSON string.
    pub fn from_json(s: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(s)
    }
}
