//! Transport port: the peer-to-peer channel the session runs over.
//!
//! Implementations handle discovery, NAT traversal and relaying. The session
//! only needs an endpoint it can open under an identifier, ordered reliable
//! connections, and events for what happened on them.

use crate::error::TransportError;
use async_trait::async_trait;

/// Handle for one connection on a local endpoint.
pub type ConnectionId = u64;

/// Something that happened on the local endpoint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportEvent {
    /// A connection is ready to carry messages.
    Opened {
        /// The connection.
        conn: ConnectionId,
        /// Identifier of the other end.
        remote: String,
        /// True if the other end dialed us.
        inbound: bool,
    },

    /// A message arrived.
    Message {
        /// The connection it arrived on.
        conn: ConnectionId,
        /// Message text.
        payload: String,
    },

    /// The connection closed, from either side.
    Closed {
        /// The connection.
        conn: ConnectionId,
    },

    /// The endpoint failed after it was opened.
    Failed(TransportError),
}

/// A peer-to-peer endpoint.
#[async_trait]
pub trait Transport: Send {
    /// Opens the local endpoint, under `id` if given or a random identifier
    /// otherwise. Returns the identifier in use.
    async fn open(&mut self, id: Option<String>) -> Result<String, TransportError>;

    /// Starts dialing `remote`. The connection is usable once
    /// [`TransportEvent::Opened`] arrives for it.
    async fn connect(&mut self, remote: &str) -> Result<ConnectionId, TransportError>;

    /// Sends one message.
    async fn send(&mut self, conn: ConnectionId, payload: String) -> Result<(), TransportError>;

    /// Closes one connection.
    async fn close(&mut self, conn: ConnectionId);

    /// Closes every connection and releases the local identifier.
    async fn destroy(&mut self);

    /// Waits for the next event. Pends forever while no endpoint is open.
    ///
    /// Must be cancel safe: it is polled inside `tokio::select!`.
    async fn next_event(&mut self) -> TransportEvent;
}
