//! Clock synchronization between a peer and the authority
//!
//! The peer stamps a request with its local elapsed seconds; the authority
//! echoes it back with its own elapsed seconds. Half the round trip is
//! assumed to be the one-way delay. Estimates only affect tick alignment
//! and display smoothing, never reconciliation correctness.

use tracing::{debug, trace};

use crate::protocol::ClockSyncMessage;

/// Peer id carried before the authority has assigned one.
pub const UNASSIGNED_PEER: u32 = u32::MAX;

#[derive(Debug, Clone)]
pub struct ClockSync {
    interval: f64,
    smoothing: f64,
    last_sent: Option<f64>,
    offset: Option<f64>,
    latency: Option<f64>,
    peer_id: Option<u32>,
    samples: u64,
}

impl ClockSync {
    pub fn new(interval: f64, smoothing: f64) -> Self {
        Self {
            interval,
            smoothing: smoothing.clamp(0.0, 1.0),
            last_sent: None,
            offset: None,
            latency: None,
            peer_id: None,
            samples: 0,
        }
    }

    /// Whether a request is due at local time `now`.
    pub fn should_send(&self, now: f64) -> bool {
        self.last_sent.map_or(true, |sent| now - sent >= self.interval)
    }

    pub fn request(&mut self, now: f64) -> ClockSyncMessage {
        self.last_sent = Some(now);
        ClockSyncMessage {
            peer_id: self.peer_id.unwrap_or(UNASSIGNED_PEER),
            peer_elapsed: now,
            authority_elapsed: 0.0,
        }
    }

    /// Authority side: echo a request with the authority's clock and the
    /// id assigned to the requesting peer.
    pub fn respond(
        request: &ClockSyncMessage,
        authority_elapsed: f64,
        peer_id: u32,
    ) -> ClockSyncMessage {
        ClockSyncMessage {
            peer_id,
            peer_elapsed: request.peer_elapsed,
            authority_elapsed,
        }
    }

    /// Fold a reply into the estimate. Replies that would imply a negative
    /// or non-finite round trip are rejected.
    pub fn on_response(&mut self, response: &ClockSyncMessage, now: f64) -> bool {
        let rtt = now - response.peer_elapsed;
        if !rtt.is_finite() || rtt < 0.0 || !response.authority_elapsed.is_finite() {
            trace!(rtt, "Rejecting clock sample");
            return false;
        }
        let offset = response.authority_elapsed + rtt / 2.0 - now;

        self.offset = Some(match self.offset {
            Some(current) => current + (offset - current) * self.smoothing,
            None => offset,
        });
        self.latency = Some(match self.latency {
            Some(current) => current + (rtt - current) * self.smoothing,
            None => rtt,
        });
        if response.peer_id != UNASSIGNED_PEER && self.peer_id != Some(response.peer_id) {
            debug!(peer_id = response.peer_id, "Authority assigned peer id");
            self.peer_id = Some(response.peer_id);
        }
        self.samples += 1;
        true
    }

    /// Estimated authority elapsed seconds at local time `now`.
    pub fn authority_time(&self, now: f64) -> Option<f64> {
        self.offset.map(|offset| now + offset)
    }

    /// Smoothed round-trip time in seconds.
    pub fn latency(&self) -> Option<f64> {
        self.latency
    }

    pub fn offset(&self) -> Option<f64> {
        self.offset
    }

    pub fn peer_id(&self) -> Option<u32> {
        self.peer_id
    }

    pub fn samples(&self) -> u64 {
        self.samples
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_sample_sets_offset_and_latency() {
        let mut clock = ClockSync::new(1.0, 0.5);
        let request = clock.request(10.0);
        let reply = ClockSync::respond(&request, 100.0, 42);
        assert!(clock.on_response(&reply, 10.2));

        assert!((clock.latency().unwrap() - 0.2).abs() < 1e-9);
        // Authority read 100.0 halfway through the trip.
        assert!((clock.authority_time(10.2).unwrap() - 100.1).abs() < 1e-9);
        assert_eq!(clock.peer_id(), Some(42));
    }

    #[test]
    fn later_samples_are_smoothed() {
        let mut clock = ClockSync::new(1.0, 0.5);
        let reply = ClockSync::respond(&clock.request(0.0), 50.0, 1);
        clock.on_response(&reply, 0.0);
        let reply = ClockSync::respond(&clock.request(1.0), 53.0, 1);
        clock.on_response(&reply, 1.0);
        // Offsets 50 then 52, half weight on the new one.
        assert!((clock.offset().unwrap() - 51.0).abs() < 1e-9);
    }

    #[test]
    fn negative_round_trip_is_rejected() {
        let mut clock = ClockSync::new(1.0, 0.1);
        let reply = ClockSync::respond(&clock.request(5.0), 1.0, 1);
        assert!(!clock.on_response(&reply, 4.0));
        assert_eq!(clock.offset(), None);
        assert_eq!(clock.samples(), 0);
    }

    #[test]
    fn requests_follow_interval() {
        let mut clock = ClockSync::new(1.0, 0.1);
        assert!(clock.should_send(0.0));
        clock.request(0.0);
        assert!(!clock.should_send(0.5));
        assert!(clock.should_send(1.0));
    }
}
