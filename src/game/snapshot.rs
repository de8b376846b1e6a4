//! Snapshot cadence and broadcast statistics

use serde::Serialize;

use crate::physics::Physics;
use crate::protocol::{Snapshot, Timestamp};
use crate::world::World;

/// Decides on which ticks the authority broadcasts a snapshot.
#[derive(Debug, Clone)]
pub struct SnapshotBuilder {
    /// Tick counter since last snapshot
    ticks_since_snapshot: u32,
    /// Snapshot interval in ticks
    snapshot_interval: u32,
    stats: SnapshotStats,
}

impl SnapshotBuilder {
    pub fn new(snapshot_interval: u32) -> Self {
        Self {
            ticks_since_snapshot: 0,
            snapshot_interval: snapshot_interval.max(1),
            stats: SnapshotStats::default(),
        }
    }

    /// Check if it's time to send a snapshot
    pub fn should_send(&mut self) -> bool {
        self.ticks_since_snapshot += 1;
        if self.ticks_since_snapshot >= self.snapshot_interval {
            self.ticks_since_snapshot = 0;
            true
        } else {
            false
        }
    }

    /// Force snapshot on next check (used when a peer joins)
    pub fn force_next(&mut self) {
        self.ticks_since_snapshot = self.snapshot_interval;
    }

    pub fn build<P: Physics>(&self, world: &World<P>, timestamp: Timestamp) -> Snapshot {
        world.snapshot(timestamp)
    }

    pub fn record(&mut self, player_count: usize, bytes: usize) {
        self.stats.record(player_count, bytes);
    }

    pub fn stats(&self) -> &SnapshotStats {
        &self.stats
    }
}

/// Snapshot bandwidth stats, exposed on the health endpoint
#[derive(Debug, Clone, Default, Serialize)]
pub struct SnapshotStats {
    pub total_snapshots: u64,
    pub total_bytes: u64,
    pub avg_players_per_snapshot: f32,
}

impl SnapshotStats {
    pub fn record(&mut self, player_count: usize, bytes: usize) {
        self.total_snapshots += 1;
        self.total_bytes += bytes as u64;

        // Running average
        let n = self.total_snapshots as f32;
        self.avg_players_per_snapshot =
            self.avg_players_per_snapshot * ((n - 1.0) / n) + (player_count as f32 / n);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sends_every_interval() {
        let mut builder = SnapshotBuilder::new(2);
        let sent: Vec<bool> = (0..4).map(|_| builder.should_send()).collect();
        assert_eq!(sent, vec![false, true, false, true]);
        builder.force_next();
        assert!(builder.should_send());
    }

    #[test]
    fn stats_average_players() {
        let mut stats = SnapshotStats::default();
        stats.record(2, 100);
        stats.record(4, 200);
        assert_eq!(stats.total_snapshots, 2);
        assert_eq!(stats.total_bytes, 300);
        assert!((stats.avg_players_per_snapshot - 3.0).abs() < 1e-6);
    }
}
