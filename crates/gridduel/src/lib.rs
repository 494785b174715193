//! Gridduel - two-player N-in-a-row over a peer connection or against the
//! computer.
//!
//! # Architecture
//!
//! - **Machine**: sans-IO session state machine ([`Session::handle`])
//! - **Protocol**: JSON messages exchanged between peers
//! - **Transport**: the peer channel port, plus an in-process implementation
//! - **Driver**: runs a session on tokio with its timers
//! - **AI match**: local play against the engine from `gridduel_game`
//! - **Config / preferences / ICE**: collaborators at the edges

#![warn(missing_docs)]
#![forbid(unsafe_code)]

mod ai_match;
mod config;
mod driver;
mod error;
mod ice;
mod machine;
mod memory;
mod preferences;
mod protocol;
mod room;
mod transport;

// Crate-level exports - Session state machine
pub use machine::{
    ConnectionStatus, Effect, Role, Session, SessionConfig, SessionEvent, SessionNotice,
    SessionSnapshot,
};

// Crate-level exports - Protocol and rooms
pub use protocol::{ChatMessage, ChatPayload, PeerMessage, ProtocolError};
pub use room::{DEFAULT_PEER_PREFIX, RoomCode, RoomCodeError};

// Crate-level exports - Transport
pub use memory::{MemoryNetwork, MemoryTransport};
pub use transport::{ConnectionId, Transport, TransportEvent};

// Crate-level exports - Driver
pub use driver::{SessionCommand, SessionDriver, SessionHandle};

// Crate-level exports - Computer opponent
pub use ai_match::{AiMatch, PendingTurn, PositionKey, think};

// Crate-level exports - Collaborators
pub use config::AppConfig;
pub use ice::{HttpIceProvider, IceProvider, IceServer, IceUrls, StaticIceProvider};
pub use preferences::{Preferences, PreferencesStore, TomlPreferencesStore};

// Crate-level exports - Errors
pub use error::{ConfigError, SessionError, TransportError};
