//! Match Session Management
//!
//! One session per room: two seated connections, the authoritative
//! [`MatchState`], the room's dice and the action history. Sessions turn
//! engine outcomes into the messages both participants see.

use std::collections::BTreeMap;
use std::sync::Arc;
use tokio::sync::{mpsc, Mutex, RwLock};
use tracing::{debug, info, warn};

use crate::core::hash::short_hex;
use crate::core::rng::{derive_match_seed, DeterministicRng};
use crate::game::engine::{self, ActionRejected, MatchAction};
use crate::game::state::{MatchState, Player, PieceIndex};
use crate::network::protocol::{
    BoardSnapshot, DiceRolledInfo, GameStartInfo, PieceMovedInfo, ServerMessage,
};

/// Unique session identifier.
pub type SessionId = [u8; 16];

/// Unique connection identifier.
pub type ConnectionId = [u8; 16];

/// Session state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// Match in progress.
    Playing,
    /// Someone won.
    Ended,
    /// A participant left.
    Closed,
}

/// Configuration for a match session.
#[derive(Debug, Clone, Default)]
pub struct SessionConfig {
    /// Fixed dice seed for reproducible matches; fresh entropy when `None`.
    pub rng_seed: Option<u64>,
}

/// A seated connection.
#[derive(Debug, Clone)]
pub struct Participant {
    /// Connection identifier.
    pub connection_id: ConnectionId,
    /// Message channel to this connection.
    pub sender: mpsc::Sender<ServerMessage>,
}

/// A match session.
pub struct MatchSession {
    /// Unique session identifier.
    pub id: SessionId,
    /// Current state.
    state: SessionState,
    /// Seated connections, indexed by `Player::index()`.
    participants: [Participant; 2],
    /// Authoritative game state.
    game: MatchState,
    /// Dice for this room only.
    rng: DeterministicRng,
    /// Seed the dice started from.
    rng_seed: u64,
    /// Every accepted intent, for replay verification.
    history: Vec<MatchAction>,
}

impl MatchSession {
    /// Create a session for two participants. The first one plays P1.
    pub fn new(
        id: SessionId,
        participants: [Participant; 2],
        config: &SessionConfig,
        entropy: &[u8; 32],
    ) -> Self {
        let rng_seed = config.rng_seed.unwrap_or_else(|| {
            let ids = [participants[0].connection_id, participants[1].connection_id];
            derive_match_seed(entropy, &id, &ids)
        });

        Self {
            id,
            state: SessionState::Playing,
            participants,
            game: MatchState::new(),
            rng: DeterministicRng::new(rng_seed),
            rng_seed,
            history: Vec::new(),
        }
    }

    /// Room name shown to clients.
    pub fn room_name(&self) -> String {
        format!("room_{}", uuid::Uuid::from_bytes(self.id))
    }

    /// Seat held by a connection.
    pub fn seat_of(&self, connection_id: &ConnectionId) -> Option<Player> {
        Player::ALL
            .into_iter()
            .find(|p| self.participants[p.index()].connection_id == *connection_id)
    }

    /// Connection seated as `player`.
    pub fn participant(&self, player: Player) -> &Participant {
        &self.participants[player.index()]
    }

    /// Messages that open the match: a personal `game_start` per seat,
    /// then the first `turn_change` for both.
    pub fn start_messages(&self) -> ([ServerMessage; 2], ServerMessage) {
        let snapshot = BoardSnapshot::from_state(&self.game);
        let start = Player::ALL.map(|player| {
            ServerMessage::GameStart(GameStartInfo {
                player,
                room: self.room_name(),
                positions: snapshot.clone(),
            })
        });
        (start, ServerMessage::TurnChange { turn: self.game.turn() })
    }

    /// Roll for `player`. Returns the messages to broadcast.
    pub fn handle_roll(&mut self, player: Player) -> Result<Vec<ServerMessage>, SessionError> {
        self.ensure_playing()?;

        let (next, outcome) = engine::roll_dice(&self.game, player, &mut self.rng)?;
        self.game = next;
        self.history.push(MatchAction::Roll { player, value: outcome.value });

        debug!(
            "Room {}: {} rolled {} (forced: {}, eligible: {:?}, pity: {})",
            self.short_id(), player, outcome.value, outcome.forced,
            outcome.eligible, self.game.pity(player)
        );

        let mut messages = vec![ServerMessage::DiceRolled(DiceRolledInfo::from(&outcome))];
        if outcome.turn_changed {
            messages.push(ServerMessage::TurnChange { turn: outcome.next_turn });
        }
        Ok(messages)
    }

    /// Move `piece` for `player`. Returns the messages to broadcast.
    pub fn handle_move(
        &mut self,
        player: Player,
        piece: PieceIndex,
    ) -> Result<Vec<ServerMessage>, SessionError> {
        self.ensure_playing()?;

        let (next, outcome) = engine::move_piece(&self.game, player, piece)?;
        self.game = next;
        self.history.push(MatchAction::Move { player, piece });

        if let Some(capture) = outcome.capture() {
            debug!(
                "Room {}: {} piece {} captured {} piece {}",
                self.short_id(), player, piece, capture.player, capture.piece
            );
        }

        let mut messages = vec![
            ServerMessage::PieceMoved(PieceMovedInfo::from(&outcome)),
            ServerMessage::TurnChange { turn: outcome.next_turn },
        ];

        if let Some(winner) = outcome.winner {
            self.state = SessionState::Ended;
            info!(
                "Room {}: {} won after {} actions (state {})",
                self.short_id(), winner, self.history.len(),
                short_hex(&self.game.compute_hash())
            );
            if !self.verify_replay() {
                warn!("Room {}: replay of {} actions diverged from live state", self.short_id(), self.history.len());
            }
            messages.push(ServerMessage::PlayerWon { player: winner });
        }
        Ok(messages)
    }

    /// A participant left. Returns the seat that should be told.
    pub fn handle_departure(&mut self, player: Player) -> Option<Player> {
        if self.state != SessionState::Playing {
            self.state = SessionState::Closed;
            return None;
        }
        self.state = SessionState::Closed;
        info!("Room {}: {} left, closing", self.short_id(), player);
        Some(player.opponent())
    }

    /// Send a message to one seat.
    pub async fn send_to(&self, player: Player, message: ServerMessage) {
        let _ = self.participant(player).sender.send(message).await;
    }

    /// Broadcast a message to both seats.
    pub async fn broadcast(&self, message: ServerMessage) {
        for participant in &self.participants {
            let _ = participant.sender.send(message.clone()).await;
        }
    }

    /// Replay the recorded history and compare against the live state.
    pub fn verify_replay(&self) -> bool {
        match engine::replay_match(&self.history) {
            Ok(replayed) => replayed.compute_hash() == self.game.compute_hash(),
            Err(_) => false,
        }
    }

    /// Get session state.
    pub fn get_state(&self) -> SessionState {
        self.state
    }

    /// Authoritative game state.
    pub fn game(&self) -> &MatchState {
        &self.game
    }

    /// Seed the room's dice started from.
    pub fn rng_seed(&self) -> u64 {
        self.rng_seed
    }

    fn ensure_playing(&self) -> Result<(), SessionError> {
        match self.state {
            SessionState::Playing => Ok(()),
            _ => Err(SessionError::MatchNotInProgress),
        }
    }

    fn short_id(&self) -> String {
        hex::encode(&self.id[..4])
    }
}

/// Session errors.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SessionError {
    /// The engine refused the intent.
    #[error("Action rejected: {0}")]
    Rejected(#[from] ActionRejected),

    /// Match not in progress.
    #[error("Match not in progress")]
    MatchNotInProgress,
}

// =============================================================================
// SESSION MANAGER
// =============================================================================

/// Manages all active sessions.
pub struct SessionManager {
    /// Active sessions.
    sessions: RwLock<BTreeMap<SessionId, Arc<Mutex<MatchSession>>>>,
    /// Connection to session mapping.
    connection_sessions: RwLock<BTreeMap<ConnectionId, SessionId>>,
    /// Settings applied to new sessions.
    config: SessionConfig,
}

impl SessionManager {
    /// Create new session manager.
    pub fn new(config: SessionConfig) -> Self {
        Self {
            sessions: RwLock::new(BTreeMap::new()),
            connection_sessions: RwLock::new(BTreeMap::new()),
            config,
        }
    }

    /// Seat two participants in a new session and register both.
    pub async fn create_session(&self, participants: [Participant; 2]) -> Arc<Mutex<MatchSession>> {
        let id = uuid::Uuid::new_v4().into_bytes();

        let mut entropy = [0u8; 32];
        entropy[..16].copy_from_slice(uuid::Uuid::new_v4().as_bytes());
        entropy[16..].copy_from_slice(uuid::Uuid::new_v4().as_bytes());

        let connection_ids = [participants[0].connection_id, participants[1].connection_id];
        let session = Arc::new(Mutex::new(MatchSession::new(id, participants, &self.config, &entropy)));

        self.sessions.write().await.insert(id, session.clone());
        {
            let mut connection_sessions = self.connection_sessions.write().await;
            for connection_id in connection_ids {
                connection_sessions.insert(connection_id, id);
            }
        }

        session
    }

    /// Get a session by ID.
    pub async fn get_session(&self, id: &SessionId) -> Option<Arc<Mutex<MatchSession>>> {
        self.sessions.read().await.get(id).cloned()
    }

    /// Get the session a connection is seated in.
    pub async fn get_connection_session(
        &self,
        connection_id: &ConnectionId,
    ) -> Option<Arc<Mutex<MatchSession>>> {
        let session_id = self.connection_sessions.read().await.get(connection_id).copied()?;
        self.get_session(&session_id).await
    }

    /// Remove a session and forget both of its connections.
    pub async fn remove_session(&self, id: &SessionId) {
        let removed = self.sessions.write().await.remove(id);
        if removed.is_some() {
            self.connection_sessions.write().await.retain(|_, sid| sid != id);
        }
    }

    /// Get active session count.
    pub async fn session_count(&self) -> usize {
        self.sessions.read().await.len()
    }

    /// Cleanup ended and closed sessions.
    pub async fn cleanup(&self) {
        let mut finished = Vec::new();
        {
            let sessions = self.sessions.read().await;
            for (id, session) in sessions.iter() {
                if session.lock().await.get_state() != SessionState::Playing {
                    finished.push(*id);
                }
            }
        }

        for id in finished {
            self.remove_session(&id).await;
        }
    }
}

impl Default for SessionManager {
    fn default() -> Self {
        Self::new(SessionConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::state::Position;

    fn participant(id: u8) -> (Participant, mpsc::Receiver<ServerMessage>) {
        let (sender, rx) = mpsc::channel(16);
        (Participant { connection_id: [id; 16], sender }, rx)
    }

    fn create_test_session(seed: u64) -> MatchSession {
        let (p1, _) = participant(1);
        let (p2, _) = participant(2);
        let config = SessionConfig { rng_seed: Some(seed) };
        MatchSession::new([0; 16], [p1, p2], &config, &[0; 32])
    }

    fn first_eligible(messages: &[ServerMessage]) -> Option<PieceIndex> {
        match messages.first() {
            Some(ServerMessage::DiceRolled(info)) => {
                info.eligible_pieces.first().and_then(|i| PieceIndex::new(*i))
            }
            _ => None,
        }
    }

    /// Roll with the session until P1 gets a six, playing P2's turns.
    fn roll_until_p1_six(session: &mut MatchSession) -> Vec<ServerMessage> {
        loop {
            let turn = session.game().turn();
            let messages = session.handle_roll(turn).unwrap();
            if turn == Player::One && session.game().dice_value() == Some(6) {
                return messages;
            }
            if let Some(piece) = first_eligible(&messages) {
                session.handle_move(turn, piece).unwrap();
            }
        }
    }

    #[test]
    fn test_seats_and_room() {
        let session = create_test_session(1);
        assert_eq!(session.seat_of(&[1; 16]), Some(Player::One));
        assert_eq!(session.seat_of(&[2; 16]), Some(Player::Two));
        assert_eq!(session.seat_of(&[3; 16]), None);
        assert!(session.room_name().starts_with("room_"));
        assert_eq!(session.rng_seed(), 1);
    }

    #[test]
    fn test_start_messages() {
        let session = create_test_session(1);
        let ([to_p1, to_p2], turn) = session.start_messages();

        match (to_p1, to_p2) {
            (ServerMessage::GameStart(a), ServerMessage::GameStart(b)) => {
                assert_eq!(a.player, Player::One);
                assert_eq!(b.player, Player::Two);
                assert_eq!(a.room, b.room);
                assert_eq!(a.positions.p1, [500, 501, 502, 503]);
            }
            other => panic!("unexpected start messages: {other:?}"),
        }
        assert_eq!(turn, ServerMessage::TurnChange { turn: Player::One });
    }

    #[test]
    fn test_out_of_turn_roll_rejected() {
        let mut session = create_test_session(9);
        let result = session.handle_roll(Player::Two);
        assert_eq!(
            result,
            Err(SessionError::Rejected(ActionRejected::NotYourTurn { expected: Player::One }))
        );
        assert!(session.history.is_empty());
    }

    #[test]
    fn test_roll_messages_and_history() {
        let mut session = create_test_session(42);
        let messages = roll_until_p1_six(&mut session);

        assert_eq!(messages.len(), 1);
        match &messages[0] {
            ServerMessage::DiceRolled(info) => {
                assert_eq!(info.player, Player::One);
                assert_eq!(info.dice_value, 6);
            }
            other => panic!("unexpected message: {other:?}"),
        }

        let moved = session.handle_move(Player::One, PieceIndex::ALL[1]).unwrap();
        assert!(matches!(moved[0], ServerMessage::PieceMoved(_)));
        assert_eq!(moved[1], ServerMessage::TurnChange { turn: Player::One });
        assert_eq!(session.game().position(Player::One, PieceIndex::ALL[1]), Position::Track(0));

        assert!(session.verify_replay());
    }

    #[test]
    fn test_same_seed_same_match() {
        let mut a = create_test_session(7);
        let mut b = create_test_session(7);

        for _ in 0..40 {
            let turn = a.game().turn();
            let ma = a.handle_roll(turn).unwrap();
            let mb = b.handle_roll(turn).unwrap();
            assert_eq!(ma, mb);

            if let Some(piece) = first_eligible(&ma) {
                assert_eq!(a.handle_move(turn, piece).unwrap(), b.handle_move(turn, piece).unwrap());
            }
        }
        assert_eq!(a.game(), b.game());
    }

    #[test]
    fn test_win_ends_session() {
        let mut session = create_test_session(3);
        let mut game = MatchState::new();
        for piece in PieceIndex::ALL.iter().take(3) {
            game = game.with_position(Player::One, *piece, Position::Home);
        }
        // The home stretch cannot be captured, so only exact rolls matter
        session.game = game.with_position(Player::One, PieceIndex::ALL[3], Position::HomeStretch(0));

        let mut won = false;
        for _ in 0..500 {
            let turn = session.game().turn();
            let messages = session.handle_roll(turn).unwrap();
            if let Some(piece) = first_eligible(&messages) {
                let moved = session.handle_move(turn, piece).unwrap();
                if moved.contains(&ServerMessage::PlayerWon { player: Player::One }) {
                    won = true;
                    break;
                }
            }
        }

        assert!(won);
        assert_eq!(session.get_state(), SessionState::Ended);
        assert_eq!(session.handle_roll(Player::One), Err(SessionError::MatchNotInProgress));
    }

    #[test]
    fn test_departure_notifies_opponent() {
        let mut session = create_test_session(5);
        assert_eq!(session.handle_departure(Player::Two), Some(Player::One));
        assert_eq!(session.get_state(), SessionState::Closed);

        // Second departure has nobody left to tell
        assert_eq!(session.handle_departure(Player::One), None);
    }

    #[tokio::test]
    async fn test_broadcast_reaches_both() {
        let (p1, mut rx1) = participant(1);
        let (p2, mut rx2) = participant(2);
        let session = MatchSession::new([0; 16], [p1, p2], &SessionConfig::default(), &[7; 32]);

        session.broadcast(ServerMessage::Waiting).await;
        assert_eq!(rx1.recv().await, Some(ServerMessage::Waiting));
        assert_eq!(rx2.recv().await, Some(ServerMessage::Waiting));

        session.send_to(Player::Two, ServerMessage::OpponentDisconnect).await;
        assert_eq!(rx2.recv().await, Some(ServerMessage::OpponentDisconnect));
        assert!(rx1.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_session_manager() {
        let manager = SessionManager::default();
        let (p1, _rx1) = participant(1);
        let (p2, _rx2) = participant(2);

        let session = manager.create_session([p1, p2]).await;
        let id = session.lock().await.id;
        assert_eq!(manager.session_count().await, 1);
        assert!(manager.get_session(&id).await.is_some());
        assert!(manager.get_connection_session(&[2; 16]).await.is_some());

        manager.remove_session(&id).await;
        assert_eq!(manager.session_count().await, 0);
        assert!(manager.get_connection_session(&[1; 16]).await.is_none());
    }

    #[tokio::test]
    async fn test_cleanup_removes_closed() {
        let manager = SessionManager::default();
        let (p1, _rx1) = participant(1);
        let (p2, _rx2) = participant(2);

        let session = manager.create_session([p1, p2]).await;
        manager.cleanup().await;
        assert_eq!(manager.session_count().await, 1);

        session.lock().await.handle_departure(Player::One);
        manager.cleanup().await;
        assert_eq!(manager.session_count().await, 0);
    }
}
