//! In-process transport with ordered, reliable delivery.
//!
//! Every [`MemoryTransport`] created from one [`MemoryNetwork`] can reach the
//! others by identifier. Used by tests and the `loopback` command.

use crate::error::TransportError;
use crate::transport::{ConnectionId, Transport, TransportEvent};
use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex, MutexGuard};
use tokio::sync::mpsc;
use tracing::{debug, instrument, warn};

/// Shared broker for in-process endpoints.
#[derive(Debug, Clone, Default)]
pub struct MemoryNetwork {
    inner: Arc<Mutex<Registry>>,
}

#[derive(Debug, Default)]
struct Registry {
    endpoints: HashMap<String, mpsc::UnboundedSender<TransportEvent>>,
    links: HashMap<ConnectionId, Link>,
    unreachable: HashSet<String>,
    next_conn: ConnectionId,
    next_anonymous: u64,
}

#[derive(Debug, Clone)]
struct Link {
    owner: String,
    peer: Option<ConnectionId>,
}

impl Registry {
    fn deliver(&self, endpoint: &str, event: TransportEvent) {
        if let Some(tx) = self.endpoints.get(endpoint)
            && tx.send(event).is_err()
        {
            debug!(endpoint, "Dropped event for closed inbox");
        }
    }

    fn allocate_conn(&mut self) -> ConnectionId {
        self.next_conn += 1;
        self.next_conn
    }

    /// Removes `conn` and its twin; tells the twin's owner.
    fn unlink(&mut self, conn: ConnectionId) {
        let Some(link) = self.links.remove(&conn) else {
            return;
        };
        if let Some(peer) = link.peer
            && let Some(peer_link) = self.links.remove(&peer)
        {
            self.deliver(&peer_link.owner, TransportEvent::Closed { conn: peer });
        }
    }
}

impl MemoryNetwork {
    /// Creates an empty network.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a transport attached to this network.
    pub fn transport(&self) -> MemoryTransport {
        MemoryTransport {
            network: self.clone(),
            id: None,
            inbox: None,
        }
    }

    /// Makes dials to `id` hang without opening or failing, like a peer
    /// behind a NAT that never answers.
    #[instrument(skip(self))]
    pub fn set_unreachable(&self, id: &str, unreachable: bool) {
        let mut registry = self.lock();
        if unreachable {
            registry.unreachable.insert(id.to_string());
        } else {
            registry.unreachable.remove(id);
        }
    }

    /// Claims `id` without attaching a session, so opening it fails.
    #[instrument(skip(self))]
    pub fn reserve(&self, id: &str) {
        let (tx, _rx) = mpsc::unbounded_channel();
        self.lock().endpoints.insert(id.to_string(), tx);
    }

    /// Returns true if an endpoint is registered under `id`.
    pub fn is_registered(&self, id: &str) -> bool {
        self.lock().endpoints.contains_key(id)
    }

    /// Number of open connection ends.
    pub fn open_connections(&self) -> usize {
        self.lock().links.len()
    }

    fn lock(&self) -> MutexGuard<'_, Registry> {
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

/// One endpoint on a [`MemoryNetwork`].
#[derive(Debug)]
pub struct MemoryTransport {
    network: MemoryNetwork,
    id: Option<String>,
    inbox: Option<mpsc::UnboundedReceiver<TransportEvent>>,
}

impl MemoryTransport {
    /// Identifier of the open endpoint.
    pub fn id(&self) -> Option<&str> {
        self.id.as_deref()
    }

    fn release(&mut self) {
        let Some(id) = self.id.take() else {
            return;
        };
        let mut registry = self.network.lock();
        let owned: Vec<ConnectionId> = registry
            .links
            .iter()
            .filter(|(_, link)| link.owner == id)
            .map(|(conn, _)| *conn)
            .collect();
        for conn in owned {
            registry.unlink(conn);
        }
        registry.endpoints.remove(&id);
        self.inbox = None;
        debug!(%id, "Endpoint released");
    }
}

#[async_trait]
impl Transport for MemoryTransport {
    #[instrument(skip(self))]
    async fn open(&mut self, id: Option<String>) -> Result<String, TransportError> {
        self.release();
        let mut registry = self.network.lock();
        let id = match id {
            Some(id) if registry.endpoints.contains_key(&id) => {
                return Err(TransportError::IdentifierUnavailable(id));
            }
            Some(id) => id,
            None => loop {
                registry.next_anonymous += 1;
                let candidate = format!("peer-{}", registry.next_anonymous);
                if !registry.endpoints.contains_key(&candidate) {
                    break candidate;
                }
            },
        };
        let (tx, rx) = mpsc::unbounded_channel();
        registry.endpoints.insert(id.clone(), tx);
        drop(registry);
        self.id = Some(id.clone());
        self.inbox = Some(rx);
        debug!(%id, "Endpoint opened");
        Ok(id)
    }

    #[instrument(skip(self), fields(local = ?self.id))]
    async fn connect(&mut self, remote: &str) -> Result<ConnectionId, TransportError> {
        let Some(local) = self.id.clone() else {
            return Err(TransportError::GenericFailure(
                "No open endpoint to dial from".to_string(),
            ));
        };
        let mut registry = self.network.lock();
        if !registry.endpoints.contains_key(remote) {
            return Err(TransportError::RemoteUnavailable(remote.to_string()));
        }

        let dialer = registry.allocate_conn();
        if registry.unreachable.contains(remote) {
            registry.links.insert(
                dialer,
                Link {
                    owner: local,
                    peer: None,
                },
            );
            debug!(remote, conn = dialer, "Dial will never open");
            return Ok(dialer);
        }

        let listener = registry.allocate_conn();
        registry.links.insert(
            dialer,
            Link {
                owner: local.clone(),
                peer: Some(listener),
            },
        );
        registry.links.insert(
            listener,
            Link {
                owner: remote.to_string(),
                peer: Some(dialer),
            },
        );
        registry.deliver(
            &local,
            TransportEvent::Opened {
                conn: dialer,
                remote: remote.to_string(),
                inbound: false,
            },
        );
        registry.deliver(
            remote,
            TransportEvent::Opened {
                conn: listener,
                remote: local,
                inbound: true,
            },
        );
        Ok(dialer)
    }

    #[instrument(skip(self, payload), fields(bytes = payload.len()))]
    async fn send(&mut self, conn: ConnectionId, payload: String) -> Result<(), TransportError> {
        let registry = self.network.lock();
        let peer = registry
            .links
            .get(&conn)
            .filter(|link| Some(&link.owner) == self.id.as_ref())
            .ok_or_else(|| TransportError::GenericFailure(format!("Connection {conn} is closed")))?
            .peer
            .ok_or_else(|| TransportError::GenericFailure(format!("Connection {conn} is not open")))?;
        match registry.links.get(&peer) {
            Some(link) => {
                registry.deliver(&link.owner, TransportEvent::Message { conn: peer, payload });
                Ok(())
            }
            None => {
                warn!(conn, "Peer end vanished");
                Err(TransportError::GenericFailure(format!("Connection {conn} is closed")))
            }
        }
    }

    #[instrument(skip(self))]
    async fn close(&mut self, conn: ConnectionId) {
        self.network.lock().unlink(conn);
    }

    #[instrument(skip(self))]
    async fn destroy(&mut self) {
        self.release();
    }

    async fn next_event(&mut self) -> TransportEvent {
        let event = match self.inbox.as_mut() {
            Some(inbox) => inbox.recv().await,
            None => None,
        };
        match event {
            Some(event) => event,
            None => {
                self.inbox = None;
                std::future::pending().await
            }
        }
    }
}

impl Drop for MemoryTransport {
    fn drop(&mut self) {
        self.release();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_identifier_collision() {
        let network = MemoryNetwork::new();
        let mut a = network.transport();
        let mut b = network.transport();
        a.open(Some("room".into())).await.unwrap();
        assert_eq!(
            b.open(Some("room".into())).await,
            Err(TransportError::IdentifierUnavailable("room".into()))
        );
    }

    #[tokio::test]
    async fn test_dial_unknown_remote() {
        let network = MemoryNetwork::new();
        let mut a = network.transport();
        a.open(None).await.unwrap();
        assert_eq!(
            a.connect("nobody").await,
            Err(TransportError::RemoteUnavailable("nobody".into()))
        );
    }

    #[tokio::test]
    async fn test_ordered_delivery_and_close() {
        let network = MemoryNetwork::new();
        let mut host = network.transport();
        let mut guest = network.transport();
        host.open(Some("host".into())).await.unwrap();
        let guest_id = guest.open(None).await.unwrap();

        let conn = guest.connect("host").await.unwrap();
        assert!(matches!(
            guest.next_event().await,
            TransportEvent::Opened { inbound: false, .. }
        ));
        let TransportEvent::Opened {
            conn: host_conn,
            remote,
            inbound: true,
        } = host.next_event().await
        else {
            panic!("host did not see the dial");
        };
        assert_eq!(remote, guest_id);

        for i in 0..3 {
            guest.send(conn, format!("m{i}")).await.unwrap();
        }
        for i in 0..3 {
            assert_eq!(
                host.next_event().await,
                TransportEvent::Message {
                    conn: host_conn,
                    payload: format!("m{i}")
                }
            );
        }

        guest.destroy().await;
        assert_eq!(host.next_event().await, TransportEvent::Closed { conn: host_conn });
        assert_eq!(network.open_connections(), 0);
        assert!(!network.is_registered(&guest_id));
    }
}
