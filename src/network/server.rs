//! WebSocket Game Server
//!
//! Async WebSocket server for two-player Ludo rooms.
//! Pairs connections through a single waiting slot and routes game
//! messages to the owning session.

use std::collections::BTreeMap;
use std::net::SocketAddr;
use std::ops::ControlFlow;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{broadcast, mpsc, Mutex, RwLock};
use tokio::time::interval;
use tokio_tungstenite::{accept_async, tungstenite::Message};
use futures_util::{SinkExt, StreamExt};
use tracing::{debug, error, info, instrument, warn};

use crate::game::state::{PieceIndex, Player};
use crate::network::protocol::{ClientMessage, ErrorCode, ServerMessage};
use crate::network::session::{
    ConnectionId, MatchSession, Participant, SessionConfig, SessionError, SessionManager,
    SessionState,
};

/// Port used when neither `LUDO_BIND_ADDR` nor `PORT` is set.
pub const DEFAULT_PORT: u16 = 3000;

/// Server configuration.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Bind address.
    pub bind_addr: SocketAddr,
    /// Maximum concurrent connections.
    pub max_connections: usize,
    /// How often finished sessions are swept.
    pub cleanup_interval: Duration,
    /// Fixed dice seed for every room; fresh entropy per room when `None`.
    pub rng_seed: Option<u64>,
    /// Server version string.
    pub version: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: SocketAddr::from(([0, 0, 0, 0], DEFAULT_PORT)),
            max_connections: 1000,
            cleanup_interval: Duration::from_secs(60),
            rng_seed: None,
            version: env!("CARGO_PKG_VERSION").to_string(),
        }
    }
}

impl ServerConfig {
    /// Read configuration from the process environment.
    ///
    /// - `LUDO_BIND_ADDR`: full socket address, wins over `PORT`
    /// - `PORT`: port on `0.0.0.0`
    /// - `LUDO_MAX_CONNECTIONS`
    /// - `LUDO_RNG_SEED`: fixed dice seed
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build configuration from any key lookup, falling back to defaults.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        if let Some(port) = lookup("PORT") {
            let port: u16 = parse_var("PORT", &port)?;
            config.bind_addr = SocketAddr::from(([0, 0, 0, 0], port));
        }
        if let Some(addr) = lookup("LUDO_BIND_ADDR") {
            config.bind_addr = parse_var("LUDO_BIND_ADDR", &addr)?;
        }
        if let Some(max) = lookup("LUDO_MAX_CONNECTIONS") {
            config.max_connections = parse_var("LUDO_MAX_CONNECTIONS", &max)?;
        }
        if let Some(seed) = lookup("LUDO_RNG_SEED") {
            config.rng_seed = Some(parse_var("LUDO_RNG_SEED", &seed)?);
        }

        Ok(config)
    }
}

fn parse_var<T: std::str::FromStr>(var: &'static str, value: &str) -> Result<T, ConfigError> {
    value.trim().parse().map_err(|_| ConfigError::InvalidValue {
        var,
        value: value.to_string(),
    })
}

/// Configuration errors.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    /// An environment variable could not be parsed.
    #[error("Invalid value for {var}: {value:?}")]
    InvalidValue {
        /// Variable name.
        var: &'static str,
        /// Raw value.
        value: String,
    },
}

/// Game server errors.
#[derive(Debug, thiserror::Error)]
pub enum GameServerError {
    /// Failed to bind to address.
    #[error("Failed to bind: {0}")]
    BindFailed(#[from] std::io::Error),
}

/// Connected client state.
struct ConnectedClient {
    /// Connection time.
    connected_at: Instant,
}

type Clients = Arc<RwLock<BTreeMap<ConnectionId, ConnectedClient>>>;
type WaitingSlot = Arc<Mutex<Option<Participant>>>;

/// The game server.
pub struct GameServer {
    /// Server configuration.
    config: ServerConfig,
    /// Session manager.
    sessions: Arc<SessionManager>,
    /// Connected clients.
    clients: Clients,
    /// The one connection waiting for an opponent.
    waiting: WaitingSlot,
    /// Shutdown signal.
    shutdown_tx: broadcast::Sender<()>,
}

impl GameServer {
    /// Create a new game server.
    pub fn new(config: ServerConfig) -> Self {
        let (shutdown_tx, _) = broadcast::channel(1);
        let session_config = SessionConfig { rng_seed: config.rng_seed };

        Self {
            config,
            sessions: Arc::new(SessionManager::new(session_config)),
            clients: Arc::new(RwLock::new(BTreeMap::new())),
            waiting: Arc::new(Mutex::new(None)),
            shutdown_tx,
        }
    }

    /// Bind the configured address and run the server.
    pub async fn run(&self) -> Result<(), GameServerError> {
        let listener = TcpListener::bind(&self.config.bind_addr).await?;
        self.serve(listener).await
    }

    /// Run the server on an already bound listener.
    #[instrument(skip(self, listener))]
    pub async fn serve(&self, listener: TcpListener) -> Result<(), GameServerError> {
        info!("Ludo server v{} listening on {}", self.config.version, listener.local_addr()?);

        let cleanup_sessions = self.sessions.clone();
        let cleanup_every = self.config.cleanup_interval;
        let cleanup_handle = tokio::spawn(async move {
            Self::run_cleanup_loop(cleanup_sessions, cleanup_every).await;
        });

        let mut shutdown_rx = self.shutdown_tx.subscribe();

        loop {
            tokio::select! {
                result = listener.accept() => {
                    match result {
                        Ok((stream, addr)) => {
                            let clients_count = self.clients.read().await.len();
                            if clients_count >= self.config.max_connections {
                                warn!("Connection limit reached, rejecting {}", addr);
                                continue;
                            }

                            info!("New connection from {}", addr);
                            self.handle_connection(stream, addr);
                        }
                        Err(e) => {
                            error!("Accept error: {}", e);
                        }
                    }
                }
                _ = shutdown_rx.recv() => {
                    info!("Shutdown signal received");
                    break;
                }
            }
        }

        cleanup_handle.abort();

        Ok(())
    }

    /// Handle a new WebSocket connection.
    fn handle_connection(&self, stream: TcpStream, addr: SocketAddr) {
        let clients = self.clients.clone();
        let sessions = self.sessions.clone();
        let waiting = self.waiting.clone();
        let mut shutdown_rx = self.shutdown_tx.subscribe();

        tokio::spawn(async move {
            let ws_stream = match accept_async(stream).await {
                Ok(ws) => ws,
                Err(e) => {
                    error!("WebSocket handshake failed for {}: {}", addr, e);
                    return;
                }
            };

            let (mut ws_sender, mut ws_receiver) = ws_stream.split();
            let (msg_tx, mut msg_rx) = mpsc::channel::<ServerMessage>(64);
            let connection_id = uuid::Uuid::new_v4().into_bytes();

            {
                let mut clients = clients.write().await;
                clients.insert(connection_id, ConnectedClient { connected_at: Instant::now() });
            }

            // Spawn message sender task
            let sender_task = tokio::spawn(async move {
                while let Some(msg) = msg_rx.recv().await {
                    let text = match msg.to_json() {
                        Ok(t) => t,
                        Err(e) => {
                            error!("Failed to serialize message: {}", e);
                            continue;
                        }
                    };
                    if ws_sender.send(Message::Text(text)).await.is_err() {
                        break;
                    }
                }
                let _ = ws_sender.close().await;
            });

            Self::join_or_wait(
                Participant { connection_id, sender: msg_tx.clone() },
                &sessions,
                &waiting,
            ).await;

            loop {
                tokio::select! {
                    msg = ws_receiver.next() => {
                        match msg {
                            Some(Ok(Message::Text(text))) => {
                                let client_msg = match ClientMessage::from_json(&text) {
                                    Ok(m) => m,
                                    Err(e) => {
                                        debug!("Invalid message from {}: {}", addr, e);
                                        let _ = msg_tx.send(ServerMessage::error(
                                            ErrorCode::InvalidInput,
                                            "Invalid message format",
                                        )).await;
                                        continue;
                                    }
                                };

                                let flow = Self::handle_client_message(
                                    connection_id,
                                    client_msg,
                                    &sessions,
                                    &msg_tx,
                                ).await;
                                if flow.is_break() {
                                    break;
                                }
                            }
                            Some(Ok(Message::Close(_))) | None => {
                                debug!("Client {} disconnected", addr);
                                break;
                            }
                            Some(Err(e)) => {
                                error!("WebSocket error for {}: {}", addr, e);
                                break;
                            }
                            _ => {}
                        }
                    }
                    _ = shutdown_rx.recv() => {
                        let _ = msg_tx.send(ServerMessage::Shutdown {
                            reason: "Server shutting down".to_string(),
                        }).await;
                        break;
                    }
                }
            }

            // Cleanup
            Self::disconnect(connection_id, &sessions, &waiting).await;

            // Let the writer flush what is queued, then stop it
            drop(msg_tx);
            let mut sender_task = sender_task;
            if tokio::time::timeout(Duration::from_secs(1), &mut sender_task).await.is_err() {
                debug!("Writer for {} did not drain in time", addr);
                sender_task.abort();
            }

            let session_time = clients
                .write()
                .await
                .remove(&connection_id)
                .map(|client| client.connected_at.elapsed());
            info!("Client {} cleaned up after {:?}", addr, session_time.unwrap_or_default());
        });
    }

    /// Pair a new connection with the waiting one, or make it wait.
    ///
    /// The slot stays locked until the room is registered, so a waiting
    /// peer that drops meanwhile is seen by [`Self::disconnect`] as seated.
    async fn join_or_wait(me: Participant, sessions: &SessionManager, waiting: &Mutex<Option<Participant>>) {
        let mut slot = waiting.lock().await;
        let first = match slot.take() {
            Some(first) if !first.sender.is_closed() => first,
            _ => {
                let sender = me.sender.clone();
                *slot = Some(me);
                let _ = sender.send(ServerMessage::Waiting).await;
                return;
            }
        };

        let session = sessions.create_session([first, me]).await;
        let session = session.lock().await;
        Self::announce_start(&session).await;
    }

    /// Release whatever a closing connection holds: the waiting slot or its seat.
    async fn disconnect(connection_id: ConnectionId, sessions: &SessionManager, waiting: &Mutex<Option<Participant>>) {
        {
            let mut slot = waiting.lock().await;
            if slot.as_ref().is_some_and(|p| p.connection_id == connection_id) {
                *slot = None;
                debug!("Connection left the waiting slot");
                return;
            }
        }
        Self::depart(connection_id, sessions).await;
    }

    /// Send each seat its `game_start`, then the opening turn to both.
    async fn announce_start(session: &MatchSession) {
        let ([to_p1, to_p2], turn) = session.start_messages();
        session.send_to(Player::One, to_p1).await;
        session.send_to(Player::Two, to_p2).await;
        session.broadcast(turn).await;
        info!("Started {} (dice seed {})", session.room_name(), session.rng_seed());
    }

    /// Handle a client message.
    async fn handle_client_message(
        connection_id: ConnectionId,
        msg: ClientMessage,
        sessions: &SessionManager,
        sender: &mpsc::Sender<ServerMessage>,
    ) -> ControlFlow<()> {
        match msg {
            ClientMessage::RollDice => {
                Self::handle_game_intent(connection_id, None, sessions, sender).await;
            }
            ClientMessage::MovePiece { piece } => match PieceIndex::try_from(piece) {
                Ok(piece) => {
                    Self::handle_game_intent(connection_id, Some(piece), sessions, sender).await;
                }
                Err(e) => {
                    let _ = sender.send(ServerMessage::error(ErrorCode::InvalidInput, e.to_string())).await;
                }
            },
            ClientMessage::Ping { timestamp } => {
                let _ = sender.send(ServerMessage::Pong {
                    timestamp,
                    server_time: std::time::SystemTime::now()
                        .duration_since(std::time::UNIX_EPOCH)
                        .unwrap_or_default()
                        .as_millis() as u64,
                }).await;
            }
            ClientMessage::Leave => return ControlFlow::Break(()),
        }
        ControlFlow::Continue(())
    }

    /// Route a roll (`piece == None`) or a move to the sender's session.
    async fn handle_game_intent(
        connection_id: ConnectionId,
        piece: Option<PieceIndex>,
        sessions: &SessionManager,
        sender: &mpsc::Sender<ServerMessage>,
    ) {
        let Some(session) = sessions.get_connection_session(&connection_id).await else {
            let _ = sender.send(ServerMessage::error(ErrorCode::NotInMatch, "Not in a match")).await;
            return;
        };

        let mut session = session.lock().await;
        let Some(seat) = session.seat_of(&connection_id) else {
            return;
        };

        let result = match piece {
            None => session.handle_roll(seat),
            Some(piece) => session.handle_move(seat, piece),
        };

        match result {
            Ok(messages) => {
                for message in messages {
                    session.broadcast(message).await;
                }
                if session.get_state() == SessionState::Ended {
                    let id = session.id;
                    drop(session);
                    sessions.remove_session(&id).await;
                }
            }
            Err(SessionError::MatchNotInProgress) => {
                let _ = sender.send(ServerMessage::error(ErrorCode::NotInMatch, "Match is over")).await;
            }
            Err(SessionError::Rejected(reason)) => {
                debug!(
                    "Ignored intent from {} in {} ({} on turn): {}",
                    seat, session.room_name(), session.game().turn(), reason
                );
            }
        }
    }

    /// Take a connection out of its room and tell the other seat.
    async fn depart(connection_id: ConnectionId, sessions: &SessionManager) {
        let Some(session) = sessions.get_connection_session(&connection_id).await else {
            return;
        };

        let (id, notify) = {
            let mut session = session.lock().await;
            let notify = session
                .seat_of(&connection_id)
                .and_then(|seat| session.handle_departure(seat))
                .map(|seat| session.participant(seat).sender.clone());
            (session.id, notify)
        };

        // Remove the room before telling the survivor
        sessions.remove_session(&id).await;
        if let Some(sender) = notify {
            let _ = sender.send(ServerMessage::OpponentDisconnect).await;
        }
    }

    /// Run cleanup loop.
    async fn run_cleanup_loop(sessions: Arc<SessionManager>, every: Duration) {
        let mut interval = interval(every);

        loop {
            interval.tick().await;
            sessions.cleanup().await;
        }
    }

    /// Shutdown the server.
    pub fn shutdown(&self) {
        let _ = self.shutdown_tx.send(());
    }

    /// Get active connection count.
    pub async fn connection_count(&self) -> usize {
        self.clients.read().await.len()
    }

    /// Get active session count.
    pub async fn session_count(&self) -> usize {
        self.sessions.session_count().await
    }

    /// Is a connection waiting for an opponent?
    pub async fn has_waiting(&self) -> bool {
        self.waiting.lock().await.is_some()
    }
}
