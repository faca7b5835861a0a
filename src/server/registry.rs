//! Live connection tracking
//!
//! The registry is the single source of truth for membership queries: one
//! [`Connection`] per accepted transport, held in insertion order so that
//! member lists come out deterministic. It is owned by the server state
//! and only ever mutated under its lock.

use std::net::SocketAddr;

use bytes::Bytes;
use tokio::sync::mpsc;
use tracing::debug;
use uuid::Uuid;

use crate::protocol::codec;
use crate::protocol::messages::ServerEvent;

/// Identifier for a live connection, unique for the server lifetime
pub type ConnId = u64;

/// Per-client session state
#[derive(Debug)]
pub struct Connection {
    /// Registry-assigned id
    pub id: ConnId,
    /// Session id for log correlation
    pub session: String,
    /// Remote address
    pub addr: SocketAddr,
    /// Username, `None` until login succeeds; unique once set
    pub username: Option<String>,
    /// Current channel, `None` means the no-channel scope
    pub channel: Option<String>,
    /// Outbound sink, drained by this connection's writer task
    sink: mpsc::UnboundedSender<Bytes>,
}

impl Connection {
    fn new(id: ConnId, addr: SocketAddr, sink: mpsc::UnboundedSender<Bytes>) -> Self {
        Self {
            id,
            session: Uuid::new_v4().to_string(),
            addr,
            username: None,
            channel: None,
            sink,
        }
    }

    /// Queue an event for delivery to this client.
    ///
    /// Fire-and-forget: a closed sink means the writer task is gone and the
    /// disconnect cleanup will run shortly, so the failure is only logged.
    pub fn send(&self, event: &ServerEvent) {
        self.send_frame(codec::encode(event));
    }

    /// Queue an already-encoded frame for delivery to this client
    pub fn send_frame(&self, frame: Bytes) {
        if self.sink.send(frame).is_err() {
            debug!(
                "Dropping outbound frame for closed connection {} ({})",
                self.session, self.addr
            );
        }
    }
}

/// Process-wide collection of live connections
#[derive(Debug, Default)]
pub struct Registry {
    connections: Vec<Connection>,
    next_id: ConnId,
}

impl Registry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a newly accepted connection and return its id
    pub fn register(&mut self, addr: SocketAddr, sink: mpsc::UnboundedSender<Bytes>) -> ConnId {
        let id = self.next_id;
        self.next_id += 1;
        self.connections.push(Connection::new(id, addr, sink));
        id
    }

    /// Remove a connection, returning it if it was registered
    pub fn unregister(&mut self, id: ConnId) -> Option<Connection> {
        let index = self.connections.iter().position(|conn| conn.id == id)?;
        Some(self.connections.remove(index))
    }

    /// Look up a connection by id
    pub fn get(&self, id: ConnId) -> Option<&Connection> {
        self.connections.iter().find(|conn| conn.id == id)
    }

    /// Look up a connection by id, mutably
    pub fn get_mut(&mut self, id: ConnId) -> Option<&mut Connection> {
        self.connections.iter_mut().find(|conn| conn.id == id)
    }

    /// True iff no currently-registered connection holds this username.
    ///
    /// Scans the live set at call time; usernames free up only when their
    /// connection goes away.
    pub fn is_username_available(&self, name: &str) -> bool {
        !self
            .connections
            .iter()
            .any(|conn| conn.username.as_deref() == Some(name))
    }

    /// All connections whose channel matches, in insertion order.
    ///
    /// `None` selects the connections in the no-channel scope.
    pub fn members_of<'a>(
        &'a self,
        channel: Option<&'a str>,
    ) -> impl Iterator<Item = &'a Connection> {
        self.connections
            .iter()
            .filter(move |conn| conn.channel.as_deref() == channel)
    }

    /// Usernames of the members of a channel, in insertion order.
    ///
    /// Connections that have not completed login have no username and are
    /// skipped.
    pub fn usernames_in(&self, channel: Option<&str>) -> Vec<String> {
        self.members_of(channel)
            .filter_map(|conn| conn.username.clone())
            .collect()
    }

    /// Number of live connections
    pub fn len(&self) -> usize {
        self.connections.len()
    }

    /// True iff no connections are registered
    pub fn is_empty(&self) -> bool {
        self.connections.is_empty()
    }
}
