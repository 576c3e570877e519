//! Connection hub - the transport seen by the lobby and matches

use dashmap::DashMap;
use std::collections::HashSet;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, warn};

use super::protocol::{ClientMsg, ConnectionId, ServerMsg};

/// A message received from a connection
#[derive(Debug, Clone, PartialEq)]
pub struct Inbound {
    pub connection: ConnectionId,
    pub msg: ClientMsg,
}

/// Reliable ordered message channel with connection identity
pub trait Transport: Send + Sync {
    /// Connections that are currently open
    fn live_connections(&self) -> HashSet<ConnectionId>;

    /// Unicast to one connection. Unknown or closed connections are skipped.
    fn send_to(&self, connection: ConnectionId, msg: ServerMsg);

    /// Send to every live connection
    fn broadcast(&self, msg: ServerMsg);

    /// Register a listener for inbound messages. The listener stays
    /// registered until the returned handle is dropped.
    fn subscribe(&self) -> (Subscription, mpsc::UnboundedReceiver<Inbound>);
}

type ListenerTable = DashMap<u64, mpsc::UnboundedSender<Inbound>>;

/// Owned listener registration, released on drop
pub struct Subscription {
    id: u64,
    listeners: Arc<ListenerTable>,
}

impl Subscription {
    pub fn id(&self) -> u64 {
        self.id
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.listeners.remove(&self.id);
        debug!(listener = self.id, "Listener unregistered");
    }
}

/// In-process transport backed by per-connection outbound channels
pub struct ConnectionHub {
    connections: DashMap<ConnectionId, mpsc::UnboundedSender<ServerMsg>>,
    listeners: Arc<ListenerTable>,
    next_listener: AtomicU64,
}

impl ConnectionHub {
    pub fn new() -> Self {
        Self {
            connections: DashMap::new(),
            listeners: Arc::new(DashMap::new()),
            next_listener: AtomicU64::new(0),
        }
    }

    /// Open a connection. Returns its id and the receiver for outbound messages.
    pub fn connect(&self) -> (ConnectionId, mpsc::UnboundedReceiver<ServerMsg>) {
        let id = ConnectionId::new();
        let (tx, rx) = mpsc::unbounded_channel();
        self.connections.insert(id, tx);
        debug!(connection = %id, "Connection opened");
        (id, rx)
    }

    /// Close a connection. Lobby state is not touched; the sweep notices.
    pub fn disconnect(&self, connection: ConnectionId) {
        if self.connections.remove(&connection).is_some() {
            debug!(connection = %connection, "Connection closed");
        }
    }

    /// Deliver an inbound message to every registered listener
    pub fn dispatch(&self, connection: ConnectionId, msg: ClientMsg) {
        let inbound = Inbound { connection, msg };
        for listener in self.listeners.iter() {
            if listener.value().send(inbound.clone()).is_err() {
                warn!(listener = *listener.key(), "Listener receiver dropped");
            }
        }
    }

    #[cfg(test)]
    pub fn listener_count(&self) -> usize {
        self.listeners.len()
    }
}

impl Default for ConnectionHub {
    fn default() -> Self {
        Self::new()
    }
}

impl Transport for ConnectionHub {
    fn live_connections(&self) -> HashSet<ConnectionId> {
        self.connections.iter().map(|entry| *entry.key()).collect()
    }

    fn send_to(&self, connection: ConnectionId, msg: ServerMsg) {
        match self.connections.get(&connection) {
            Some(tx) => {
                if tx.send(msg).is_err() {
                    debug!(connection = %connection, "Outbound channel closed");
                }
            }
            None => debug!(connection = %connection, "Send to unknown connection skipped"),
        }
    }

    fn broadcast(&self, msg: ServerMsg) {
        for entry in self.connections.iter() {
            let _ = entry.value().send(msg.clone());
        }
    }

    fn subscribe(&self) -> (Subscription, mpsc::UnboundedReceiver<Inbound>) {
        let id = self.next_listener.fetch_add(1, Ordering::Relaxed);
        let (tx, rx) = mpsc::unbounded_channel();
        self.listeners.insert(id, tx);
        debug!(listener = id, "Listener registered");

        let subscription = Subscription {
            id,
            listeners: self.listeners.clone(),
        };
        (subscription, rx)
    }
}
