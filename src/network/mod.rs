//! Network Layer
//!
//! WebSocket server that seats two connections per room and relays the
//! engine's outcomes. All rules run through `game/`.

pub mod protocol;
pub mod session;
pub mod server;

pub use protocol::{
    BoardSnapshot, ClientMessage, DiceRolledInfo, ErrorCode, GameStartInfo, PieceMovedInfo,
    ServerMessage,
};
pub use session::{MatchSession, SessionConfig, SessionError, SessionId, SessionManager, SessionState};
pub use server::{ConfigError, GameServer, GameServerError, ServerConfig};
