//! Application state shared across routes

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

use parking_lot::RwLock;
use tokio::sync::mpsc;

use crate::config::Config;
use crate::game::ServerStats;
use crate::net::{PeerId, TransportEvent};

/// Capacity of the socket → simulation event queue
pub const EVENT_QUEUE_CAPACITY: usize = 1024;

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    /// Socket tasks enqueue transport events here; the tick loop drains them
    pub events_tx: mpsc::Sender<TransportEvent>,
    /// Latest counters published by the tick loop
    pub stats: Arc<RwLock<ServerStats>>,
    next_peer: Arc<AtomicU32>,
}

impl AppState {
    /// Build the state plus the receiving end the tick loop consumes.
    pub fn new(config: Config) -> (Self, mpsc::Receiver<TransportEvent>) {
        let (events_tx, events_rx) = mpsc::channel(EVENT_QUEUE_CAPACITY);
        let state = Self {
            config: Arc::new(config),
            events_tx,
            stats: Arc::new(RwLock::new(ServerStats::default())),
            next_peer: Arc::new(AtomicU32::new(1)),
        };
        (state, events_rx)
    }

    /// Allocate a transport-level peer id for a new socket
    pub fn next_peer_id(&self) -> PeerId {
        self.next_peer.fetch_add(1, Ordering::Relaxed)
    }
}
