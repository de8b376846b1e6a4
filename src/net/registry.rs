//! Connection registry owned by the top-level loop

use std::collections::BTreeMap;

use tracing::{info, warn};

use crate::protocol::{codec, Message};

use super::{Connection, PeerId, TransportEvent};

/// Lifecycle change surfaced to the simulation after handling an event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PeerChange {
    Connected(PeerId),
    Disconnected(PeerId),
}

/// All live connections, iterated in ascending peer order so the server
/// drains commands in the same order on every run.
#[derive(Debug, Default)]
pub struct ConnectionRegistry {
    connections: BTreeMap<PeerId, Connection>,
}

impl ConnectionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Apply one transport event. Duplicate opens and closes are ignored.
    pub fn handle(&mut self, event: TransportEvent) -> Option<PeerChange> {
        match event {
            TransportEvent::Opened { peer, transport } => {
                if self.connections.contains_key(&peer) {
                    warn!(peer, "Duplicate open event ignored");
                    return None;
                }
                let mut connection = Connection::new(peer, transport);
                connection.on_open();
                self.connections.insert(peer, connection);
                info!(peer, connections = self.connections.len(), "Peer connected");
                Some(PeerChange::Connected(peer))
            }
            TransportEvent::Frame { peer, bytes } => {
                match self.connections.get_mut(&peer) {
                    Some(connection) => connection.on_message(&bytes),
                    None => warn!(peer, "Frame from unknown peer discarded"),
                }
                None
            }
            TransportEvent::Closed { peer } => {
                let mut connection = self.connections.remove(&peer)?;
                connection.on_close();
                info!(peer, connections = self.connections.len(), "Peer disconnected");
                Some(PeerChange::Disconnected(peer))
            }
        }
    }

    /// Drop connections whose transport failed during a flush.
    pub fn reap_closed(&mut self) -> Vec<PeerChange> {
        let closed: Vec<PeerId> = self
            .connections
            .iter()
            .filter(|(_, connection)| !connection.is_open())
            .map(|(peer, _)| *peer)
            .collect();
        closed
            .into_iter()
            .map(|peer| {
                self.connections.remove(&peer);
                info!(peer, "Reaped closed connection");
                PeerChange::Disconnected(peer)
            })
            .collect()
    }

    pub fn get(&self, peer: PeerId) -> Option<&Connection> {
        self.connections.get(&peer)
    }

    pub fn get_mut(&mut self, peer: PeerId) -> Option<&mut Connection> {
        self.connections.get_mut(&peer)
    }

    /// Open connections in peer order.
    pub fn open_mut(&mut self) -> impl Iterator<Item = &mut Connection> {
        self.connections.values_mut().filter(|c| c.is_open())
    }

    pub fn peers(&self) -> impl Iterator<Item = PeerId> + '_ {
        self.connections.keys().copied()
    }

    /// Send and flush to every open peer. Returns the encoded frame size.
    pub fn broadcast(&mut self, message: impl Into<Message>) -> usize {
        let message = message.into();
        let kind = message.kind();
        let frame = codec::encode(&message);
        for connection in self.open_mut() {
            if connection.send_encoded(kind, frame.clone()).is_ok() {
                connection.flush(kind);
            }
        }
        frame.len()
    }

    pub fn len(&self) -> usize {
        self.connections.len()
    }

    pub fn is_empty(&self) -> bool {
        self.connections.is_empty()
    }
}
