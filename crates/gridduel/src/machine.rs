//! Session state machine.
//!
//! [`Session::handle`] is the single place session state changes. It takes
//! one [`SessionEvent`] (a local command, a transport report or a timer) and
//! returns the [`Effect`]s the caller must carry out. The machine itself never
//! touches the network or the clock's timers, so a test can drive two sessions
//! by passing effects from one into the other.

use crate::error::{SessionError, TransportError};
use crate::protocol::{ChatMessage, ChatPayload, PeerMessage};
use crate::room::{DEFAULT_PEER_PREFIX, RoomCode};
use crate::transport::ConnectionId;
use derive_getters::Getters;
use derive_setters::Setters;
use gridduel_game::{GameConfig, GameState, MoveError, Player, Score};
use rand::SeedableRng;
use rand::rngs::StdRng;
use serde::{Deserialize, Serialize};
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use tracing::{debug, info, instrument, trace, warn};

/// Which side of the room this session is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, strum::Display)]
pub enum Role {
    /// Created the room; plays X and owns the board configuration.
    Host,
    /// Entered the room code; plays O and adopts the host's board.
    Joiner,
}

impl Role {
    /// The mark this role plays.
    pub fn player(self) -> Player {
        match self {
            Role::Host => Player::X,
            Role::Joiner => Player::O,
        }
    }
}

/// Connection lifecycle.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize, strum::Display,
)]
pub enum ConnectionStatus {
    /// No room, or the opponent left.
    #[default]
    Disconnected,
    /// Opening the endpoint, dialing, or waiting for an opponent.
    Connecting,
    /// Opponent connected; moves flow.
    Connected,
    /// The last attempt failed; see the session's last error.
    Error,
}

/// Session settings, passed in by the caller.
#[derive(Debug, Clone, PartialEq, Eq, Getters, Setters)]
#[setters(prefix = "with_")]
pub struct SessionConfig {
    /// Name shown to the opponent.
    display_name: String,
    /// Board geometry used when hosting.
    game: GameConfig,
    /// Namespace prepended to room codes.
    peer_prefix: String,
    /// How long a joiner waits for the host.
    connect_timeout: Duration,
    /// Keepalive period while connected.
    heartbeat_interval: Duration,
    /// Room codes tried before giving up.
    max_room_attempts: u32,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            display_name: "Player".to_string(),
            game: GameConfig::CLASSIC,
            peer_prefix: DEFAULT_PEER_PREFIX.to_string(),
            connect_timeout: Duration::from_secs(10),
            heartbeat_interval: Duration::from_secs(4),
            max_room_attempts: 5,
        }
    }
}

/// Input to the state machine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEvent {
    /// Create a room.
    Host,
    /// Join the room with this code.
    Join {
        /// Code from the host.
        code: RoomCode,
    },
    /// The local endpoint is open under `id`.
    EndpointOpened {
        /// Identifier in use.
        id: String,
    },
    /// Opening the endpoint or dialing failed.
    TransportFailed(TransportError),
    /// A connection is ready.
    ConnectionOpened {
        /// The connection.
        conn: ConnectionId,
        /// The other end.
        remote: String,
        /// True if the other end dialed us.
        inbound: bool,
    },
    /// Message text arrived.
    Message {
        /// The connection.
        conn: ConnectionId,
        /// Raw payload.
        payload: String,
    },
    /// A connection closed.
    ConnectionClosed(ConnectionId),
    /// The connect deadline passed.
    ConnectTimeout,
    /// Time to send a keepalive.
    HeartbeatTick,
    /// The local player picked a square.
    LocalMove {
        /// Board index.
        index: usize,
    },
    /// The local player asked for a new game.
    LocalReset,
    /// Send a chat line.
    SendChat {
        /// Message text.
        text: String,
    },
    /// Send an emoji reaction.
    SendEmoji {
        /// The emoji.
        emoji: String,
    },
    /// Poke the opponent.
    SendNudge,
    /// Leave the room and release everything.
    Leave,
}

/// Work the caller must do on the machine's behalf.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Effect {
    /// Open the local endpoint; report back with `EndpointOpened` or
    /// `TransportFailed`.
    OpenEndpoint {
        /// Identifier to claim, or `None` for a random one.
        id: Option<String>,
    },
    /// Dial the remote; report failures with `TransportFailed`.
    Connect {
        /// Remote identifier.
        remote: String,
    },
    /// Send a message.
    Send {
        /// The connection.
        conn: ConnectionId,
        /// The message.
        message: PeerMessage,
    },
    /// Close one connection.
    CloseConnection(ConnectionId),
    /// Close everything and release the local identifier.
    DestroyEndpoint,
    /// Deliver `ConnectTimeout` after this long.
    ArmConnectTimeout(Duration),
    /// Forget the pending connect deadline.
    CancelConnectTimeout,
    /// Deliver `HeartbeatTick` at this period.
    StartHeartbeat(Duration),
    /// Stop the keepalive.
    StopHeartbeat,
    /// Tell the UI layer.
    Notify(SessionNotice),
}

/// Things the UI layer shows.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionNotice {
    /// The host's room is open and waiting.
    RoomOpened(RoomCode),
    /// The channel to the opponent is up.
    Connected,
    /// The opponent introduced themselves.
    OpponentJoined {
        /// Their display name.
        name: String,
    },
    /// The opponent closed the connection.
    OpponentLeft,
    /// The game changed.
    GameUpdated,
    /// A new game started.
    GameReset {
        /// Who moves first.
        starting_player: Player,
    },
    /// A move was refused.
    MoveRejected {
        /// The index tried.
        index: usize,
        /// Why.
        reason: MoveError,
        /// True if the opponent sent it.
        remote: bool,
    },
    /// A chat line arrived.
    ChatReceived(ChatMessage),
    /// Our chat line went out.
    ChatSent(ChatMessage),
    /// An emoji arrived.
    EmojiReceived(String),
    /// The opponent nudged us.
    NudgeReceived,
    /// The session failed.
    Failed(SessionError),
}

/// Read-only view of a session for the UI layer.
#[derive(Debug, Clone, PartialEq, Eq, Getters)]
pub struct SessionSnapshot {
    /// Host or joiner, once a room action started.
    role: Option<Role>,
    /// Connection lifecycle.
    status: ConnectionStatus,
    /// Current room.
    room_code: Option<RoomCode>,
    /// Our mark.
    local_player: Player,
    /// Opponent's display name.
    remote_name: Option<String>,
    /// The game.
    game: GameState,
    /// Wins so far.
    score: Score,
    /// Why the session last failed.
    last_error: Option<SessionError>,
}

/// One player's side of a networked game.
#[derive(Debug)]
pub struct Session {
    config: SessionConfig,
    rng: StdRng,
    role: Option<Role>,
    status: ConnectionStatus,
    room_code: Option<RoomCode>,
    room_attempts: u32,
    local_id: Option<String>,
    remote_id: Option<String>,
    remote_name: Option<String>,
    conn: Option<ConnectionId>,
    game: GameState,
    score: Score,
    starting_player: Player,
    last_error: Option<SessionError>,
    chat_counter: u64,
}

impl Session {
    /// Creates an idle session.
    #[instrument(skip(config), fields(name = %config.display_name))]
    pub fn new(config: SessionConfig) -> Self {
        Self::with_rng(config, StdRng::from_entropy())
    }

    /// Creates an idle session with deterministic room codes.
    pub fn with_seed(config: SessionConfig, seed: u64) -> Self {
        Self::with_rng(config, StdRng::seed_from_u64(seed))
    }

    fn with_rng(config: SessionConfig, rng: StdRng) -> Self {
        let game = GameState::idle(config.game);
        Self {
            config,
            rng,
            role: None,
            status: ConnectionStatus::Disconnected,
            room_code: None,
            room_attempts: 0,
            local_id: None,
            remote_id: None,
            remote_name: None,
            conn: None,
            game,
            score: Score::default(),
            starting_player: Player::X,
            last_error: None,
            chat_counter: 0,
        }
    }

    /// Current connection status.
    pub fn status(&self) -> ConnectionStatus {
        self.status
    }

    /// Current game.
    pub fn game(&self) -> &GameState {
        &self.game
    }

    /// Copies the UI-visible state.
    pub fn snapshot(&self) -> SessionSnapshot {
        SessionSnapshot {
            role: self.role,
            status: self.status,
            room_code: self.room_code,
            local_player: self.local_player(),
            remote_name: self.remote_name.clone(),
            game: self.game.clone(),
            score: self.score,
            last_error: self.last_error.clone(),
        }
    }

    fn local_player(&self) -> Player {
        self.role.map_or(Player::X, Role::player)
    }

    /// Applies one event and returns the effects to carry out, in order.
    #[instrument(skip(self), fields(status = %self.status, role = ?self.role))]
    pub fn handle(&mut self, event: SessionEvent) -> Vec<Effect> {
        match event {
            SessionEvent::Host => self.host(),
            SessionEvent::Join { code } => self.join(code),
            SessionEvent::EndpointOpened { id } => self.endpoint_opened(id),
            SessionEvent::TransportFailed(err) => self.transport_failed(err),
            SessionEvent::ConnectionOpened {
                conn,
                remote,
                inbound,
            } => self.connection_opened(conn, remote, inbound),
            SessionEvent::Message { conn, payload } => self.message(conn, &payload),
            SessionEvent::ConnectionClosed(conn) => self.connection_closed(conn),
            SessionEvent::ConnectTimeout => self.connect_timeout(),
            SessionEvent::HeartbeatTick => self.heartbeat(),
            SessionEvent::LocalMove { index } => self.local_move(index),
            SessionEvent::LocalReset => self.local_reset(),
            SessionEvent::SendChat { text } => self.send_chat(text),
            SessionEvent::SendEmoji { emoji } => {
                self.send_to_peer(PeerMessage::Emoji { emoji }).into_iter().collect()
            }
            SessionEvent::SendNudge => self.send_to_peer(PeerMessage::Nudge).into_iter().collect(),
            SessionEvent::Leave => self.leave(),
        }
    }

    fn is_busy(&self) -> bool {
        matches!(
            self.status,
            ConnectionStatus::Connecting | ConnectionStatus::Connected
        )
    }

    fn host(&mut self) -> Vec<Effect> {
        if self.is_busy() {
            warn!("Already in a room; leave first");
            return Vec::new();
        }
        self.role = Some(Role::Host);
        self.status = ConnectionStatus::Connecting;
        self.last_error = None;
        self.room_attempts = 0;
        self.remote_name = None;
        self.starting_player = Player::X;
        self.score = Score::default();
        self.game = GameState::new(self.config.game, self.starting_player);
        self.allocate_room()
    }

    fn allocate_room(&mut self) -> Vec<Effect> {
        let code = RoomCode::generate(&mut self.rng);
        self.room_attempts += 1;
        self.room_code = Some(code);
        debug!(room_code = %code, attempt = self.room_attempts, "Trying room code");
        vec![Effect::OpenEndpoint {
            id: Some(code.peer_id(&self.config.peer_prefix)),
        }]
    }

    fn join(&mut self, code: RoomCode) -> Vec<Effect> {
        if self.is_busy() {
            warn!("Already in a room; leave first");
            return Vec::new();
        }
        if self.role != Some(Role::Joiner) {
            self.score = Score::default();
            self.game = GameState::idle(self.config.game);
        }
        self.role = Some(Role::Joiner);
        self.status = ConnectionStatus::Connecting;
        self.last_error = None;
        self.room_code = Some(code);
        self.remote_name = None;
        info!(room_code = %code, "Joining room");
        vec![Effect::OpenEndpoint { id: None }]
    }

    fn endpoint_opened(&mut self, id: String) -> Vec<Effect> {
        if self.status != ConnectionStatus::Connecting {
            debug!(%id, "Endpoint opened after the attempt ended");
            return vec![Effect::DestroyEndpoint];
        }
        self.local_id = Some(id);
        match (self.role, self.room_code) {
            (Some(Role::Host), Some(code)) => {
                info!(room_code = %code, "Room open, waiting for opponent");
                vec![Effect::Notify(SessionNotice::RoomOpened(code))]
            }
            (Some(Role::Joiner), Some(code)) => vec![
                Effect::ArmConnectTimeout(self.config.connect_timeout),
                Effect::Connect {
                    remote: code.peer_id(&self.config.peer_prefix),
                },
            ],
            _ => Vec::new(),
        }
    }

    fn transport_failed(&mut self, err: TransportError) -> Vec<Effect> {
        if let TransportError::IdentifierUnavailable(id) = &err
            && self.role == Some(Role::Host)
            && self.status == ConnectionStatus::Connecting
        {
            if self.room_attempts < self.config.max_room_attempts {
                debug!(%id, "Room code taken, retrying");
                return self.allocate_room();
            }
            return self.fail(SessionError::IdentifierCollision {
                attempts: self.room_attempts,
            });
        }
        warn!(error = %err, "Transport failure");
        self.fail(err.into())
    }

    fn connection_opened(&mut self, conn: ConnectionId, remote: String, inbound: bool) -> Vec<Effect> {
        match self.role {
            Some(Role::Host) if inbound && self.local_id.is_some() => {
                let mut effects = Vec::new();
                if let Some(old) = self.conn.replace(conn) {
                    info!(old, new = conn, "Replacing previous opponent");
                    effects.push(Effect::CloseConnection(old));
                }
                info!(%remote, conn, "Opponent connected");
                self.remote_id = Some(remote);
                self.status = ConnectionStatus::Connected;
                self.last_error = None;
                effects.extend([
                    Effect::StartHeartbeat(self.config.heartbeat_interval),
                    Effect::Notify(SessionNotice::Connected),
                    Effect::Send {
                        conn,
                        message: PeerMessage::Handshake {
                            name: self.config.display_name.clone(),
                            grid_size: Some(self.game.config().grid_size()),
                            win_condition: Some(self.game.config().win_condition()),
                        },
                    },
                    Effect::Send {
                        conn,
                        message: PeerMessage::SyncState {
                            full_state: self.game.clone(),
                        },
                    },
                ]);
                effects
            }
            Some(Role::Joiner) if !inbound && self.status == ConnectionStatus::Connecting => {
                info!(%remote, conn, "Connected to host");
                self.conn = Some(conn);
                self.remote_id = Some(remote);
                self.status = ConnectionStatus::Connected;
                vec![
                    Effect::CancelConnectTimeout,
                    Effect::StartHeartbeat(self.config.heartbeat_interval),
                    Effect::Notify(SessionNotice::Connected),
                    Effect::Send {
                        conn,
                        message: PeerMessage::Handshake {
                            name: self.config.display_name.clone(),
                            grid_size: None,
                            win_condition: None,
                        },
                    },
                ]
            }
            _ => {
                warn!(%remote, conn, inbound, "Refusing unexpected connection");
                vec![Effect::CloseConnection(conn)]
            }
        }
    }

    fn message(&mut self, conn: ConnectionId, payload: &str) -> Vec<Effect> {
        if self.conn != Some(conn) {
            debug!(conn, "Message on inactive connection");
            return Vec::new();
        }
        let message = match PeerMessage::decode(payload) {
            Ok(message) => message,
            Err(err) => {
                warn!(error = %err, "Ignoring undecodable message");
                return Vec::new();
            }
        };
        trace!(kind = message.kind(), "Received");

        match message {
            PeerMessage::Move { index, player } => self.remote_move(index, player),
            PeerMessage::Reset { starting_player } => {
                info!(%starting_player, "Opponent started a new game");
                self.start_game(starting_player);
                vec![Effect::Notify(SessionNotice::GameReset { starting_player })]
            }
            PeerMessage::SyncState { full_state } => match full_state.validate() {
                Ok(()) => {
                    self.starting_player = full_state.starting_player();
                    debug!(status = %full_state.status(), starting = %self.starting_player, "State synced");
                    self.game = full_state;
                    vec![Effect::Notify(SessionNotice::GameUpdated)]
                }
                Err(err) => {
                    warn!(error = %err, "Ignoring malformed state");
                    Vec::new()
                }
            },
            PeerMessage::Handshake {
                name,
                grid_size,
                win_condition,
            } => {
                if self.role == Some(Role::Joiner)
                    && let (Some(n), Some(k)) = (grid_size, win_condition)
                {
                    match GameConfig::new(n, k) {
                        Ok(adopted) if !self.game.is_playing() => {
                            debug!(%adopted, "Adopting host board");
                            self.game = GameState::idle(adopted);
                        }
                        Ok(_) => {}
                        Err(err) => warn!(error = %err, "Host sent invalid board"),
                    }
                }
                info!(%name, "Opponent introduced");
                self.remote_name = Some(name.clone());
                vec![Effect::Notify(SessionNotice::OpponentJoined { name })]
            }
            PeerMessage::Emoji { emoji } => vec![Effect::Notify(SessionNotice::EmojiReceived(emoji))],
            PeerMessage::Chat(ChatPayload::Full(chat)) => {
                vec![Effect::Notify(SessionNotice::ChatReceived(chat))]
            }
            PeerMessage::Chat(ChatPayload::Legacy { text }) => {
                // Legacy lines carry no sender; it can only be the opponent.
                let chat = ChatMessage {
                    id: self.next_chat_id(),
                    from: self.remote_id.clone().unwrap_or_default(),
                    name: self.remote_name.clone().unwrap_or_else(|| "Opponent".to_string()),
                    text,
                    ts: now_millis(),
                };
                vec![Effect::Notify(SessionNotice::ChatReceived(chat))]
            }
            PeerMessage::Nudge => vec![Effect::Notify(SessionNotice::NudgeReceived)],
            PeerMessage::Ping | PeerMessage::Pong => Vec::new(),
            PeerMessage::Unknown => {
                debug!("Ignoring unknown message type");
                Vec::new()
            }
        }
    }

    fn remote_move(&mut self, index: usize, player: Player) -> Vec<Effect> {
        let applied = if player == self.local_player() {
            Err(MoveError::WrongPlayer(player))
        } else {
            self.game.apply_move(index, player)
        };
        match applied {
            Ok(outcome) => {
                debug!(index, %player, "Opponent moved");
                if let Some(winner) = outcome.winner_just_decided {
                    self.score.record(winner);
                }
                self.game = outcome.state;
                vec![Effect::Notify(SessionNotice::GameUpdated)]
            }
            Err(reason) => {
                warn!(index, %player, error = %reason, "Rejected opponent move");
                let mut effects = vec![Effect::Notify(SessionNotice::MoveRejected {
                    index,
                    reason,
                    remote: true,
                })];
                if self.role == Some(Role::Host)
                    && let Some(conn) = self.conn
                {
                    effects.push(Effect::Send {
                        conn,
                        message: PeerMessage::SyncState {
                            full_state: self.game.clone(),
                        },
                    });
                }
                effects
            }
        }
    }

    fn connection_closed(&mut self, conn: ConnectionId) -> Vec<Effect> {
        if self.conn != Some(conn) {
            debug!(conn, "Inactive connection closed");
            return Vec::new();
        }
        info!(conn, "Opponent disconnected");
        self.conn = None;
        self.status = ConnectionStatus::Disconnected;
        self.last_error = Some(SessionError::PeerDisconnected);
        vec![
            Effect::StopHeartbeat,
            Effect::Notify(SessionNotice::OpponentLeft),
        ]
    }

    fn connect_timeout(&mut self) -> Vec<Effect> {
        if self.status != ConnectionStatus::Connecting || self.role != Some(Role::Joiner) {
            return Vec::new();
        }
        warn!(room_code = ?self.room_code, "Connect timed out");
        // Board, score and room code stay so the user can retry.
        self.fail(SessionError::ConnectTimeout)
    }

    fn heartbeat(&mut self) -> Vec<Effect> {
        match (self.status, self.conn) {
            (ConnectionStatus::Connected, Some(conn)) => vec![Effect::Send {
                conn,
                message: PeerMessage::Ping,
            }],
            _ => vec![Effect::StopHeartbeat],
        }
    }

    fn local_move(&mut self, index: usize) -> Vec<Effect> {
        let player = self.local_player();
        let applied = if self.status != ConnectionStatus::Connected {
            Err(MoveError::GameNotActive(*self.game.status()))
        } else {
            self.game.apply_move(index, player)
        };
        let outcome = match applied {
            Ok(outcome) => outcome,
            Err(reason) => {
                debug!(index, error = %reason, "Local move refused");
                return vec![Effect::Notify(SessionNotice::MoveRejected {
                    index,
                    reason,
                    remote: false,
                })];
            }
        };
        if let Some(winner) = outcome.winner_just_decided {
            self.score.record(winner);
        }
        self.game = outcome.state;
        let mut effects: Vec<Effect> = self
            .send_to_peer(PeerMessage::Move { index, player })
            .into_iter()
            .collect();
        effects.push(Effect::Notify(SessionNotice::GameUpdated));
        effects
    }

    fn local_reset(&mut self) -> Vec<Effect> {
        if self.role.is_none() {
            return Vec::new();
        }
        let starting_player = self.starting_player.opponent();
        info!(%starting_player, "Starting a new game");
        self.start_game(starting_player);
        let mut effects: Vec<Effect> = self
            .send_to_peer(PeerMessage::Reset { starting_player })
            .into_iter()
            .collect();
        effects.push(Effect::Notify(SessionNotice::GameReset { starting_player }));
        effects
    }

    fn start_game(&mut self, starting_player: Player) {
        self.starting_player = starting_player;
        self.game = GameState::new(*self.game.config(), starting_player);
    }

    fn send_chat(&mut self, text: String) -> Vec<Effect> {
        let chat = ChatMessage {
            id: self.next_chat_id(),
            from: self.local_id.clone().unwrap_or_default(),
            name: self.config.display_name.clone(),
            text,
            ts: now_millis(),
        };
        match self.send_to_peer(PeerMessage::Chat(ChatPayload::Full(chat.clone()))) {
            Some(send) => vec![send, Effect::Notify(SessionNotice::ChatSent(chat))],
            None => Vec::new(),
        }
    }

    fn send_to_peer(&self, message: PeerMessage) -> Option<Effect> {
        match (self.status, self.conn) {
            (ConnectionStatus::Connected, Some(conn)) => Some(Effect::Send { conn, message }),
            _ => {
                debug!(kind = message.kind(), "Not connected; message dropped");
                None
            }
        }
    }

    fn next_chat_id(&mut self) -> String {
        self.chat_counter += 1;
        format!(
            "{}-{}",
            self.local_id.as_deref().unwrap_or("local"),
            self.chat_counter
        )
    }

    /// Enters the error state and releases every transport resource.
    fn fail(&mut self, err: SessionError) -> Vec<Effect> {
        info!(error = %err, "Session failed");
        self.status = ConnectionStatus::Error;
        self.last_error = Some(err.clone());
        self.local_id = None;
        let mut effects = vec![Effect::CancelConnectTimeout, Effect::StopHeartbeat];
        if let Some(conn) = self.conn.take() {
            effects.push(Effect::CloseConnection(conn));
        }
        effects.push(Effect::DestroyEndpoint);
        effects.push(Effect::Notify(SessionNotice::Failed(err)));
        effects
    }

    fn leave(&mut self) -> Vec<Effect> {
        info!(room_code = ?self.room_code, "Leaving room");
        let mut effects = vec![Effect::CancelConnectTimeout, Effect::StopHeartbeat];
        if let Some(conn) = self.conn.take() {
            effects.push(Effect::CloseConnection(conn));
        }
        effects.push(Effect::DestroyEndpoint);
        self.role = None;
        self.status = ConnectionStatus::Disconnected;
        self.room_code = None;
        self.room_attempts = 0;
        self.local_id = None;
        self.remote_id = None;
        self.remote_name = None;
        self.last_error = None;
        self.score = Score::default();
        self.starting_player = Player::X;
        self.game = GameState::idle(self.config.game);
        effects
    }
}

fn now_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_or(0, |elapsed| elapsed.as_millis() as u64)
}
