//! Bounded histories kept by the client for resimulation

use std::collections::VecDeque;

use tracing::warn;

use crate::protocol::{Command, Snapshot, Timestamp};

/// Ring of locally issued commands not yet covered by a confirmed snapshot.
///
/// Commands are kept in issue order. Once the ring is full the oldest
/// command is evicted, which only matters if the authority stops
/// confirming for longer than the ring spans.
#[derive(Debug, Clone)]
pub struct CommandHistory {
    buffer: VecDeque<Command>,
    max_size: usize,
}

impl CommandHistory {
    pub fn new(max_size: usize) -> Self {
        let max_size = max_size.max(1);
        Self {
            buffer: VecDeque::with_capacity(max_size),
            max_size,
        }
    }

    pub fn push(&mut self, command: Command) {
        if self.buffer.len() == self.max_size {
            if let Some(evicted) = self.buffer.pop_front() {
                warn!(timestamp = %evicted.timestamp, "Command history full, evicting oldest");
            }
        }
        self.buffer.push_back(command);
    }

    /// Drop every command stamped at or before `confirmed`.
    pub fn evict_through(&mut self, confirmed: Timestamp) {
        self.buffer
            .retain(|command| command.timestamp.is_after(confirmed));
    }

    /// Commands stamped exactly `timestamp`, in issue order.
    pub fn stamped_at(&self, timestamp: Timestamp) -> impl Iterator<Item = &Command> {
        self.buffer
            .iter()
            .filter(move |command| command.timestamp == timestamp)
    }

    /// Move commands stamped in `(after, through]` to `to`. Returns how
    /// many were moved.
    pub fn restamp(&mut self, after: Timestamp, through: Timestamp, to: Timestamp) -> usize {
        let mut moved = 0;
        for command in &mut self.buffer {
            if command.timestamp.is_after(after) && command.timestamp.is_at_or_before(through) {
                command.timestamp = to;
                moved += 1;
            }
        }
        moved
    }

    pub fn iter(&self) -> impl Iterator<Item = &Command> {
        self.buffer.iter()
    }

    pub fn len(&self) -> usize {
        self.buffer.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }
}

/// Ring of locally predicted snapshots, used to measure how far the
/// prediction was off once the authority confirms a tick.
#[derive(Debug, Clone)]
pub struct PredictionHistory {
    buffer: VecDeque<Snapshot>,
    max_size: usize,
}

impl PredictionHistory {
    pub fn new(max_size: usize) -> Self {
        let max_size = max_size.max(1);
        Self {
            buffer: VecDeque::with_capacity(max_size),
            max_size,
        }
    }

    pub fn record(&mut self, snapshot: Snapshot) {
        if self.buffer.len() == self.max_size {
            self.buffer.pop_front();
        }
        self.buffer.push_back(snapshot);
    }

    pub fn get(&self, timestamp: Timestamp) -> Option<&Snapshot> {
        self.buffer.iter().find(|s| s.timestamp == timestamp)
    }

    pub fn clear(&mut self) {
        self.buffer.clear();
    }
}

/// Largest translation difference between a prediction and the authority,
/// over entities present in both.
pub fn prediction_error(predicted: &Snapshot, authoritative: &Snapshot) -> f64 {
    authoritative
        .players
        .iter()
        .filter_map(|truth| {
            let guess = predicted.get(truth.entity)?;
            Some(guess.translation.distance(truth.translation))
        })
        .fold(0.0, f64::max)
}
