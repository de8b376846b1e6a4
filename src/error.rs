//! Error taxonomy for the simulation core
//!
//! None of these are fatal. Each is handled at the boundary where it is
//! detected (connection or engine) and the offending item is discarded.

use crate::protocol::{MessageKind, Timestamp};
use crate::world::Entity;

/// Errors raised by the wire codec, connections and the world model.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum NetError {
    #[error("malformed {kind:?} message: need {needed} bytes, {available} available")]
    MalformedMessage {
        kind: MessageKind,
        needed: usize,
        available: usize,
    },

    #[error("unknown message kind tag {0}")]
    UnknownMessageKind(u8),

    #[error("entity {0:?} does not exist")]
    UnknownEntity(Entity),

    #[error("connection {0} is not open")]
    ConnectionNotOpen(u32),

    #[error("stale snapshot {received:?}, holding {held:?}")]
    StaleSnapshot { held: Timestamp, received: Timestamp },
}

/// Errors reported by a transport when writing a frame.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TransportError {
    #[error("transport closed")]
    Closed,
}

pub type NetResult<T> = Result<T, NetError>;
