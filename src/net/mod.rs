//! Peer connections and the transport seam

mod connection;
mod registry;
mod transport;

pub use connection::Connection;
pub use registry::{ConnectionRegistry, PeerChange};
pub use transport::{ChannelTransport, LoopbackTransport, PeerId, Transport, TransportEvent};
