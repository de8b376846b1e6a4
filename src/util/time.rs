//! Time utilities for the fixed-timestep simulation

use std::time::{Duration, Instant};

use tracing::warn;

/// Server start time for uptime tracking
static SERVER_START: std::sync::OnceLock<Instant> = std::sync::OnceLock::new();

/// Initialize server start time (call once at startup)
pub fn init_server_time() {
    SERVER_START.get_or_init(Instant::now);
}

/// Get server uptime in seconds
pub fn uptime_secs() -> u64 {
    SERVER_START
        .get()
        .map(|start| start.elapsed().as_secs())
        .unwrap_or(0)
}

/// Convert a timestep in seconds to a tokio interval period
pub fn tick_duration(timestep: f64) -> Duration {
    Duration::from_secs_f64(timestep.max(1e-6))
}

/// Accumulator for running a fixed-rate simulation off a variable clock.
///
/// Wall-clock time is added with [`FixedTimestep::accumulate`]; each
/// [`FixedTimestep::consume`] that returns `true` stands for one tick. The
/// remainder carries over to the next frame.
#[derive(Debug, Clone)]
pub struct FixedTimestep {
    timestep: f64,
    max_ticks: u32,
    accumulator: f64,
}

impl FixedTimestep {
    pub fn new(timestep: f64, max_ticks: u32) -> Self {
        Self {
            timestep,
            max_ticks: max_ticks.max(1),
            accumulator: 0.0,
        }
    }

    /// Add elapsed seconds. Backlog beyond `max_ticks` worth of time is
    /// dropped so a stalled host does not spiral.
    pub fn accumulate(&mut self, elapsed: f64) {
        if !elapsed.is_finite() || elapsed <= 0.0 {
            return;
        }
        self.accumulator += elapsed;
        let cap = self.timestep * f64::from(self.max_ticks);
        if self.accumulator > cap {
            warn!(
                backlog_ticks = self.accumulator / self.timestep,
                max_ticks = self.max_ticks,
                "Simulation fell behind, dropping backlog"
            );
            self.accumulator = cap;
        }
    }

    /// Take one tick's worth of time if available.
    pub fn consume(&mut self) -> bool {
        if self.accumulator >= self.timestep {
            self.accumulator -= self.timestep;
            true
        } else {
            false
        }
    }

    /// Fraction of a tick left over, in `[0, 1)`.
    pub fn alpha(&self) -> f64 {
        (self.accumulator / self.timestep).clamp(0.0, 1.0)
    }
}
