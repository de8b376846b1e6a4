//! Per-peer connection with kind-indexed message lanes

use std::collections::VecDeque;

use bytes::Bytes;
use tracing::{debug, trace, warn};

use crate::error::{NetError, NetResult};
use crate::protocol::{
    codec, ClockSyncMessage, Command, Message, MessageKind, Snapshot,
};

use super::{PeerId, Transport};

const LANES: usize = MessageKind::ALL.len();

/// One remote peer.
///
/// Inbound frames are decoded into per-kind FIFO lanes; outbound messages
/// are encoded into per-kind lanes and written only on [`Connection::flush`].
/// Flushing one kind never touches another kind's lane.
pub struct Connection {
    peer: PeerId,
    open: bool,
    transport: Box<dyn Transport>,
    inbound: [VecDeque<Message>; LANES],
    outbound: [VecDeque<Bytes>; LANES],
}

impl Connection {
    /// A connection starts closed until the transport reports it open.
    pub fn new(peer: PeerId, transport: Box<dyn Transport>) -> Self {
        Self {
            peer,
            open: false,
            transport,
            inbound: Default::default(),
            outbound: Default::default(),
        }
    }

    pub fn peer(&self) -> PeerId {
        self.peer
    }

    pub fn is_open(&self) -> bool {
        self.open
    }

    /// Returns `true` if this call opened the connection.
    pub fn on_open(&mut self) -> bool {
        if self.open {
            return false;
        }
        self.open = true;
        debug!(peer = self.peer, "Connection opened");
        true
    }

    /// Returns `true` if this call closed the connection. Everything still
    /// queued in either direction is discarded.
    pub fn on_close(&mut self) -> bool {
        if !self.open {
            return false;
        }
        self.open = false;
        for lane in &mut self.inbound {
            lane.clear();
        }
        for lane in &mut self.outbound {
            lane.clear();
        }
        debug!(peer = self.peer, "Connection closed");
        true
    }

    /// Encode and queue a message on its kind's lane.
    pub fn send(&mut self, message: impl Into<Message>) -> NetResult<()> {
        let message = message.into();
        let kind = message.kind();
        self.send_encoded(kind, codec::encode(&message))
    }

    /// Queue an already-encoded frame of `kind`.
    pub fn send_encoded(&mut self, kind: MessageKind, frame: Bytes) -> NetResult<()> {
        if !self.open {
            warn!(peer = self.peer, kind = ?kind, "Dropping outbound message on closed connection");
            return Err(NetError::ConnectionNotOpen(self.peer));
        }
        self.outbound[kind.index()].push_back(frame);
        Ok(())
    }

    /// Write every queued frame of `kind` in enqueue order. Returns the
    /// number of frames written.
    pub fn flush(&mut self, kind: MessageKind) -> usize {
        if !self.open {
            warn!(peer = self.peer, kind = ?kind, "Flush on closed connection ignored");
            return 0;
        }
        let mut written = 0;
        while let Some(frame) = self.outbound[kind.index()].pop_front() {
            if let Err(e) = self.transport.send(frame) {
                warn!(peer = self.peer, error = %e, "Transport write failed, closing connection");
                self.on_close();
                break;
            }
            written += 1;
        }
        written
    }

    /// Send and flush in one go.
    pub fn send_now(&mut self, message: impl Into<Message>) -> NetResult<()> {
        let message = message.into();
        let kind = message.kind();
        self.send(message)?;
        self.flush(kind);
        Ok(())
    }

    /// Decode a received frame into its lane. Malformed frames are logged
    /// and discarded.
    pub fn on_message(&mut self, frame: &[u8]) {
        if !self.open {
            trace!(peer = self.peer, "Frame on closed connection discarded");
            return;
        }
        match codec::decode_frame(frame) {
            Ok(message) => self.inbound[message.kind().index()].push_back(message),
            Err(e) => warn!(peer = self.peer, error = %e, len = frame.len(), "Discarding frame"),
        }
    }

    /// Oldest unconsumed message of `kind`.
    pub fn recv(&mut self, kind: MessageKind) -> Option<Message> {
        self.inbound[kind.index()].pop_front()
    }

    pub fn recv_clock_sync(&mut self) -> Option<ClockSyncMessage> {
        match self.recv(MessageKind::ClockSync)? {
            Message::ClockSync(msg) => Some(msg),
            _ => None,
        }
    }

    pub fn recv_command(&mut self) -> Option<Command> {
        match self.recv(MessageKind::Command)? {
            Message::Command(cmd) => Some(cmd),
            _ => None,
        }
    }

    pub fn recv_snapshot(&mut self) -> Option<Snapshot> {
        match self.recv(MessageKind::Snapshot)? {
            Message::Snapshot(snapshot) => Some(snapshot),
            _ => None,
        }
    }

    pub fn pending_inbound(&self, kind: MessageKind) -> usize {
        self.inbound[kind.index()].len()
    }

    pub fn pending_outbound(&self, kind: MessageKind) -> usize {
        self.outbound[kind.index()].len()
    }
}

impl std::fmt::Debug for Connection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Connection")
            .field("peer", &self.peer)
            .field("open", &self.open)
            .finish()
    }
}
