//! WebSocket upgrade handler
//!
//! Each socket gets a reader loop and a writer task. Neither touches the
//! simulation: the reader turns binary frames into transport events for the
//! tick loop, and the writer drains frames the tick loop flushed.

use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        State,
    },
    response::Response,
};
use bytes::Bytes;
use futures::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

use crate::app::AppState;
use crate::net::{ChannelTransport, PeerId, TransportEvent};
use crate::util::rate_limit::PeerRateLimiter;

/// WebSocket upgrade handler
pub async fn ws_handler(ws: WebSocketUpgrade, State(state): State<AppState>) -> Response {
    let peer = state.next_peer_id();
    debug!(peer, "WebSocket upgrade");
    ws.on_upgrade(move |socket| handle_socket(socket, peer, state))
}

/// Handle the upgraded WebSocket connection
async fn handle_socket(socket: WebSocket, peer: PeerId, state: AppState) {
    info!(peer, "New WebSocket connection");

    let (mut ws_sink, mut ws_stream) = socket.split();
    let (frame_tx, mut frame_rx) = mpsc::unbounded_channel::<Bytes>();

    let opened = TransportEvent::Opened {
        peer,
        transport: Box::new(ChannelTransport::new(frame_tx)),
    };
    if state.events_tx.send(opened).await.is_err() {
        error!(peer, "Simulation is not running, dropping socket");
        return;
    }

    // Spawn writer task: flushed frames -> WebSocket
    let writer_handle = tokio::spawn(async move {
        while let Some(frame) = frame_rx.recv().await {
            if let Err(e) = ws_sink.send(Message::Binary(frame.to_vec())).await {
                debug!(peer, error = %e, "WebSocket send failed");
                break;
            }
        }
    });

    let rate_limiter = PeerRateLimiter::new(state.config.input_rate_limit);

    // Reader loop: WebSocket -> tick loop
    while let Some(result) = ws_stream.next().await {
        match result {
            Ok(Message::Binary(data)) => {
                if !rate_limiter.check_frame() {
                    warn!(peer, "Rate limited inbound frame");
                    continue;
                }
                let event = TransportEvent::Frame {
                    peer,
                    bytes: Bytes::from(data),
                };
                if state.events_tx.send(event).await.is_err() {
                    debug!(peer, "Event channel closed");
                    break;
                }
            }
            Ok(Message::Text(_)) => {
                warn!(peer, "Received text message, ignoring");
            }
            Ok(Message::Ping(_)) => {
                debug!(peer, "Received ping");
            }
            Ok(Message::Pong(_)) => {
                debug!(peer, "Received pong");
            }
            Ok(Message::Close(_)) => {
                info!(peer, "Client initiated close");
                break;
            }
            Err(e) => {
                error!(peer, error = %e, "WebSocket error");
                break;
            }
        }
    }

    // Signal disconnect to the tick loop
    let _ = state.events_tx.send(TransportEvent::Closed { peer }).await;

    writer_handle.abort();

    info!(peer, "WebSocket connection closed");
}
