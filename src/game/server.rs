//! Authoritative simulation and its tick loop

use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Instant;

use glam::DVec3;
use parking_lot::RwLock;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use serde::Serialize;
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TryRecvError;
use tokio::time::{interval, MissedTickBehavior};
use tracing::{debug, info, trace, warn};

use crate::clock::{ClockSync, UNASSIGNED_PEER};
use crate::config::SimulationConfig;
use crate::net::{ConnectionRegistry, PeerChange, PeerId, TransportEvent};
use crate::physics::{CollisionWorld, Physics};
use crate::protocol::{Command, Timestamp};
use crate::util::time::{tick_duration, FixedTimestep};
use crate::world::{arena, Entity, Intent, World};

use super::snapshot::{SnapshotBuilder, SnapshotStats};

/// Half-width of the square players drop into.
const SPAWN_SPREAD: f64 = 20.0;

/// A validated command waiting for its tick.
#[derive(Debug, Clone, Copy)]
struct PendingCommand {
    command: Command,
    arrival: u64,
}

/// Server counters published to the health endpoint
#[derive(Debug, Clone, Default, Serialize)]
pub struct ServerStats {
    pub tick: u64,
    pub connections: usize,
    pub entities: usize,
    pub held_commands: usize,
    pub snapshots: SnapshotStats,
}

/// The authoritative world plus everything needed to drive it from peers.
pub struct ServerSimulation<P: Physics = CollisionWorld> {
    config: SimulationConfig,
    world: World<P>,
    ticks: u64,
    timestamp: Timestamp,
    peers: BTreeMap<PeerId, Entity>,
    held: Vec<PendingCommand>,
    arrivals: u64,
    snapshot_builder: SnapshotBuilder,
    rng: ChaCha8Rng,
}

impl ServerSimulation<CollisionWorld> {
    /// Server on the default level.
    pub fn with_default_level(config: SimulationConfig, seed: u64) -> Self {
        Self::new(config, World::with_default_level(), seed)
    }
}

impl<P: Physics> ServerSimulation<P> {
    pub fn new(config: SimulationConfig, world: World<P>, seed: u64) -> Self {
        let world = world.with_timestep(config.timestep);
        let snapshot_builder = SnapshotBuilder::new(config.snapshot_interval);
        Self {
            config,
            world,
            ticks: 0,
            timestamp: Timestamp::default(),
            peers: BTreeMap::new(),
            held: Vec::new(),
            arrivals: 0,
            snapshot_builder,
            rng: ChaCha8Rng::seed_from_u64(seed),
        }
    }

    pub fn world(&self) -> &World<P> {
        &self.world
    }

    pub fn world_mut(&mut self) -> &mut World<P> {
        &mut self.world
    }

    pub fn timestamp(&self) -> Timestamp {
        self.timestamp
    }

    pub fn ticks(&self) -> u64 {
        self.ticks
    }

    /// Authority clock in seconds, derived from the tick count.
    pub fn elapsed(&self) -> f64 {
        self.ticks as f64 * self.config.timestep
    }

    pub fn entity_of(&self, peer: PeerId) -> Option<Entity> {
        self.peers.get(&peer).copied()
    }

    /// Generate a spawn position for a new player
    fn spawn_position(&mut self) -> DVec3 {
        let x = self.rng.gen_range(-SPAWN_SPREAD..SPAWN_SPREAD);
        let z = self.rng.gen_range(-SPAWN_SPREAD..SPAWN_SPREAD);
        DVec3::new(x, arena::SPAWN_POINT.y, z)
    }

    /// Spawn a player for a newly connected peer.
    pub fn connect(&mut self, peer: PeerId) -> Option<Entity> {
        if let Some(entity) = self.peers.get(&peer) {
            warn!(peer, entity = ?entity, "Peer already has a player");
            return Some(*entity);
        }
        let position = self.spawn_position();
        let Some(entity) = self.world.spawn_player(position) else {
            warn!(peer, "World is full, peer gets no player");
            return None;
        };
        self.peers.insert(peer, entity);
        self.snapshot_builder.force_next();
        info!(peer, entity = ?entity, "Player joined");
        Some(entity)
    }

    pub fn disconnect(&mut self, peer: PeerId) -> bool {
        let Some(entity) = self.peers.remove(&peer) else {
            return false;
        };
        self.world.despawn(entity);
        self.held.retain(|pending| pending.command.entity != entity);
        info!(peer, entity = ?entity, "Player left");
        true
    }

    pub fn handle_change(&mut self, change: PeerChange) {
        match change {
            PeerChange::Connected(peer) => {
                self.connect(peer);
            }
            PeerChange::Disconnected(peer) => {
                self.disconnect(peer);
            }
        }
    }

    /// A command is accepted only for the sender's own player, with nothing
    /// but intent bits, stamped no further ahead than the allowed lead.
    pub fn command_is_valid(&self, command: &Command, peer: PeerId) -> bool {
        if self.peers.get(&peer) != Some(&command.entity) {
            return false;
        }
        if (command.on | command.off) & !Intent::MASK != 0 {
            return false;
        }
        let lead = command.timestamp.ticks_since(self.timestamp);
        lead <= i16::try_from(self.config.max_command_lead).unwrap_or(i16::MAX)
    }

    /// Run one authoritative tick against the connected peers.
    pub fn tick(&mut self, registry: &mut ConnectionRegistry) {
        self.answer_clock_sync(registry);

        let fresh = self.drain_commands(registry);
        self.apply_due(fresh);

        self.world.step();
        self.ticks += 1;
        self.timestamp = Timestamp::from_ticks(self.ticks);

        if self.snapshot_builder.should_send() {
            let snapshot = self.snapshot_builder.build(&self.world, self.timestamp);
            let players = snapshot.players.len();
            let bytes = registry.broadcast(snapshot);
            self.snapshot_builder.record(players, bytes);
        }

        for change in registry.reap_closed() {
            self.handle_change(change);
        }
    }

    fn answer_clock_sync(&self, registry: &mut ConnectionRegistry) {
        let elapsed = self.elapsed();
        for connection in registry.open_mut() {
            let peer_id = self
                .peers
                .get(&connection.peer())
                .map_or(UNASSIGNED_PEER, |entity| entity.to_bits());
            while let Some(request) = connection.recv_clock_sync() {
                if let Err(e) = connection.send_now(ClockSync::respond(&request, elapsed, peer_id)) {
                    trace!(peer = connection.peer(), error = %e, "Clock sync reply not sent");
                }
            }
        }
    }

    /// Commands in peer order, then arrival order within a peer.
    fn drain_commands(&mut self, registry: &mut ConnectionRegistry) -> Vec<PendingCommand> {
        let mut fresh = Vec::new();
        for connection in registry.open_mut() {
            let peer = connection.peer();
            while let Some(command) = connection.recv_command() {
                if !self.command_is_valid(&command, peer) {
                    debug!(peer, entity = ?command.entity, timestamp = %command.timestamp, "Dropping invalid command");
                    continue;
                }
                fresh.push(PendingCommand {
                    command,
                    arrival: self.arrivals,
                });
                self.arrivals += 1;
            }
        }
        fresh
    }

    /// Apply every command due for the upcoming tick: held ones first by
    /// timestamp then arrival, then this tick's arrivals. Commands stamped
    /// further ahead wait.
    fn apply_due(&mut self, fresh: Vec<PendingCommand>) {
        let due_at = self.timestamp.next();
        let is_due = |pending: &PendingCommand| pending.command.timestamp.is_at_or_before(due_at);

        let (mut due, waiting): (Vec<_>, Vec<_>) = self.held.drain(..).partition(is_due);
        self.held = waiting;
        due.sort_by(|a, b| match a.command.timestamp.compare(b.command.timestamp) {
            Ordering::Equal => a.arrival.cmp(&b.arrival),
            other => other,
        });

        for pending in fresh {
            if is_due(&pending) {
                due.push(pending);
            } else {
                self.held.push(pending);
            }
        }

        for pending in due {
            if let Err(e) = self.world.apply_command(&pending.command) {
                warn!(error = %e, timestamp = %pending.command.timestamp, "Command dropped");
            }
        }
    }

    pub fn stats(&self, connections: usize) -> ServerStats {
        ServerStats {
            tick: self.ticks,
            connections,
            entities: self.world.len(),
            held_commands: self.held.len(),
            snapshots: self.snapshot_builder.stats().clone(),
        }
    }
}

impl<P: Physics + Send> ServerSimulation<P> {
    /// Run the authoritative tick loop until every event sender is gone.
    ///
    /// This task is the only writer of world state. Socket tasks feed it
    /// through `events` and never touch the world directly.
    pub async fn run(
        mut self,
        mut events: mpsc::Receiver<TransportEvent>,
        stats: Arc<RwLock<ServerStats>>,
    ) {
        info!(
            tick_rate = self.config.tick_rate(),
            snapshot_interval = self.config.snapshot_interval,
            "Simulation started"
        );

        let mut registry = ConnectionRegistry::new();
        let mut stepper = FixedTimestep::new(self.config.timestep, self.config.max_catch_up_ticks);
        let mut tick_interval = interval(tick_duration(self.config.timestep));
        tick_interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
        let mut last = Instant::now();

        loop {
            tick_interval.tick().await;

            // Drain network events
            loop {
                match events.try_recv() {
                    Ok(event) => {
                        if let Some(change) = registry.handle(event) {
                            self.handle_change(change);
                        }
                    }
                    Err(TryRecvError::Empty) => break,
                    Err(TryRecvError::Disconnected) => {
                        info!(ticks = self.ticks, "Event channel closed, stopping simulation");
                        return;
                    }
                }
            }

            let now = Instant::now();
            stepper.accumulate(now.duration_since(last).as_secs_f64());
            last = now;

            while stepper.consume() {
                self.tick(&mut registry);
            }

            *stats.write() = self.stats(registry.len());
        }
    }
}
