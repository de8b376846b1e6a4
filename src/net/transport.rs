//! Transport seam: anything that can carry a binary frame to one peer

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use bytes::Bytes;
use parking_lot::Mutex;
use tokio::sync::mpsc;

use crate::error::TransportError;

/// Transport-level connection id. Assigned by whoever accepts the socket.
pub type PeerId = u32;

pub trait Transport: Send {
    /// Write one frame. Must not block.
    fn send(&mut self, frame: Bytes) -> Result<(), TransportError>;
}

/// Network callbacks, forwarded to the tick loop. Socket tasks only ever
/// enqueue these; the tick loop is the only consumer.
pub enum TransportEvent {
    Opened {
        peer: PeerId,
        transport: Box<dyn Transport>,
    },
    Frame {
        peer: PeerId,
        bytes: Bytes,
    },
    Closed {
        peer: PeerId,
    },
}

impl std::fmt::Debug for TransportEvent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Opened { peer, .. } => f.debug_struct("Opened").field("peer", peer).finish(),
            Self::Frame { peer, bytes } => f
                .debug_struct("Frame")
                .field("peer", peer)
                .field("len", &bytes.len())
                .finish(),
            Self::Closed { peer } => f.debug_struct("Closed").field("peer", peer).finish(),
        }
    }
}

/// Outbound half backed by a channel to a socket writer task.
#[derive(Debug, Clone)]
pub struct ChannelTransport {
    tx: mpsc::UnboundedSender<Bytes>,
}

impl ChannelTransport {
    pub fn new(tx: mpsc::UnboundedSender<Bytes>) -> Self {
        Self { tx }
    }
}

impl Transport for ChannelTransport {
    fn send(&mut self, frame: Bytes) -> Result<(), TransportError> {
        self.tx.send(frame).map_err(|_| TransportError::Closed)
    }
}

#[derive(Debug, Default)]
struct Link {
    queue: Mutex<VecDeque<Bytes>>,
}

/// One end of an in-memory duplex link.
///
/// Frames sent on one end queue up on the other until taken with
/// [`LoopbackTransport::take_inbound`]. Nothing is delivered on its own,
/// so callers decide when (and whether) frames arrive.
#[derive(Debug, Clone)]
pub struct LoopbackTransport {
    outbox: Arc<Link>,
    inbox: Arc<Link>,
    closed: Arc<AtomicBool>,
}

impl LoopbackTransport {
    pub fn pair() -> (Self, Self) {
        let a_to_b = Arc::new(Link::default());
        let b_to_a = Arc::new(Link::default());
        let closed = Arc::new(AtomicBool::new(false));
        let a = Self {
            outbox: a_to_b.clone(),
            inbox: b_to_a.clone(),
            closed: closed.clone(),
        };
        let b = Self {
            outbox: b_to_a,
            inbox: a_to_b,
            closed,
        };
        (a, b)
    }

    /// Drain every frame the other end has sent, oldest first.
    pub fn take_inbound(&self) -> Vec<Bytes> {
        self.inbox.queue.lock().drain(..).collect()
    }

    pub fn inbound_len(&self) -> usize {
        self.inbox.queue.lock().len()
    }

    /// Close both ends. Frames in flight are discarded.
    pub fn close(&self) {
        self.closed.store(true, Ordering::Release);
        self.inbox.queue.lock().clear();
        self.outbox.queue.lock().clear();
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }
}

impl Transport for LoopbackTransport {
    fn send(&mut self, frame: Bytes) -> Result<(), TransportError> {
        if self.is_closed() {
            return Err(TransportError::Closed);
        }
        self.outbox.queue.lock().push_back(frame);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn loopback_delivers_in_order() {
        let (mut a, b) = LoopbackTransport::pair();
        a.send(Bytes::from_static(b"one")).unwrap();
        a.send(Bytes::from_static(b"two")).unwrap();
        assert_eq!(b.inbound_len(), 2);
        assert_eq!(
            b.take_inbound(),
            vec![Bytes::from_static(b"one"), Bytes::from_static(b"two")]
        );
        assert!(a.take_inbound().is_empty());
    }

    #[test]
    fn closed_loopback_rejects_frames() {
        let (mut a, b) = LoopbackTransport::pair();
        b.close();
        assert_eq!(a.send(Bytes::from_static(b"x")), Err(TransportError::Closed));
    }

    #[test]
    fn channel_transport_reports_dropped_receiver() {
        let (tx, rx) = mpsc::unbounded_channel();
        let mut transport = ChannelTransport::new(tx);
        drop(rx);
        assert_eq!(
            transport.send(Bytes::from_static(b"x")),
            Err(TransportError::Closed)
        );
    }
}
