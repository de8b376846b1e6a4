//! Client-side prediction and reconciliation
//!
//! The client runs the same world step as the authority, ahead of it in
//! time. Every locally issued command is stamped with the tick it will be
//! applied before, kept in a ring, and sent straight away. When an
//! authoritative snapshot for tick `S` arrives the world is reset to it and
//! ticks `S+1 ..= C` are replayed with the buffered commands, so local
//! input survives the correction.

use tracing::{debug, trace, warn};

use crate::clock::ClockSync;
use crate::config::SimulationConfig;
use crate::error::{NetError, NetResult};
use crate::input;
use crate::net::Connection;
use crate::physics::{CollisionWorld, Physics};
use crate::protocol::{Command, Snapshot, Timestamp};
use crate::util::time::FixedTimestep;
use crate::world::{DisplayState, Entity, World};

use super::history::{prediction_error, CommandHistory, PredictionHistory};

pub struct ClientSimulation<P: Physics = CollisionWorld> {
    config: SimulationConfig,
    world: World<P>,
    /// Tick the world currently sits at.
    timestamp: Timestamp,
    /// Tick of the newest accepted snapshot.
    confirmed: Option<Timestamp>,
    commands: CommandHistory,
    predictions: PredictionHistory,
    clock: ClockSync,
    stepper: FixedTimestep,
    previous_display: DisplayState,
    current_display: DisplayState,
    last_correction: f64,
    resimulated_ticks: u64,
}

impl ClientSimulation<CollisionWorld> {
    /// Client on the default level.
    pub fn with_default_level(config: SimulationConfig) -> Self {
        Self::new(config, World::with_default_level())
    }
}

impl<P: Physics> ClientSimulation<P> {
    pub fn new(config: SimulationConfig, world: World<P>) -> Self {
        let world = world.with_timestep(config.timestep);
        let display = world.display_state();
        Self {
            commands: CommandHistory::new(config.command_history_capacity),
            predictions: PredictionHistory::new(config.predicted_history_capacity),
            clock: ClockSync::new(config.clock_sync_interval, config.clock_smoothing),
            stepper: FixedTimestep::new(config.timestep, config.max_catch_up_ticks),
            previous_display: display.clone(),
            current_display: display,
            world,
            timestamp: Timestamp::default(),
            confirmed: None,
            last_correction: 0.0,
            resimulated_ticks: 0,
            config,
        }
    }

    pub fn world(&self) -> &World<P> {
        &self.world
    }

    pub fn timestamp(&self) -> Timestamp {
        self.timestamp
    }

    pub fn confirmed(&self) -> Option<Timestamp> {
        self.confirmed
    }

    pub fn clock(&self) -> &ClockSync {
        &self.clock
    }

    pub fn pending_commands(&self) -> usize {
        self.commands.len()
    }

    /// Largest position error seen at the last accepted snapshot.
    pub fn last_correction(&self) -> f64 {
        self.last_correction
    }

    /// Ticks replayed across every reconciliation so far.
    pub fn resimulated_ticks(&self) -> u64 {
        self.resimulated_ticks
    }

    /// The player this client controls, once the authority has said so.
    pub fn controlled_entity(&self) -> Option<Entity> {
        self.clock.peer_id().map(Entity::from_bits)
    }

    /// Stamp a command for the next tick, keep it for replay and send it
    /// without waiting for acknowledgement. If the connection is closed
    /// the command still drives local prediction.
    pub fn issue_command(&mut self, command: Command, connection: &mut Connection) -> Command {
        let command = command.stamped(self.timestamp.next());
        self.commands.push(command);
        if let Err(e) = connection.send_now(command) {
            debug!(error = %e, timestamp = %command.timestamp, "Command kept locally only");
        }
        command
    }

    /// Key down on `code` for the controlled player.
    pub fn key_down(&mut self, code: &str, repeat: bool, connection: &mut Connection) {
        let Some(entity) = self.controlled_entity() else {
            return;
        };
        if let Some(command) = input::key_down(entity, code, repeat) {
            self.issue_command(command, connection);
        }
    }

    /// Key up on `code` for the controlled player.
    pub fn key_up(&mut self, code: &str, connection: &mut Connection) {
        let Some(entity) = self.controlled_entity() else {
            return;
        };
        if let Some(command) = input::key_up(entity, code) {
            self.issue_command(command, connection);
        }
    }

    /// Drive the client from a frame callback. `elapsed` is wall time since
    /// the previous call, `now` the local clock in seconds.
    pub fn update(&mut self, elapsed: f64, now: f64, connection: &mut Connection) {
        if connection.is_open() && self.clock.should_send(now) {
            let request = self.clock.request(now);
            let _ = connection.send_now(request);
        }
        while let Some(response) = connection.recv_clock_sync() {
            self.clock.on_response(&response, now);
        }
        self.align(now);

        self.stepper.accumulate(elapsed);
        while self.stepper.consume() {
            self.tick(connection);
        }
    }

    /// Keep the local tick half a round trip plus a margin ahead of the
    /// authority, so commands arrive before the tick they are stamped for.
    fn align(&mut self, now: f64) {
        let Some(authority) = self.clock.authority_time(now) else {
            return;
        };
        let one_way = self.clock.latency().unwrap_or(0.0) / 2.0;
        let ticks = ((authority + one_way) / self.config.timestep).floor().max(0.0) as u64;
        let target = Timestamp::from_ticks(ticks + u64::from(self.config.lead_margin_ticks));
        let drift = target.ticks_since(self.timestamp);
        if u32::from(drift.unsigned_abs()) > self.config.drift_tolerance_ticks {
            debug!(from = %self.timestamp, to = %target, drift, "Snapping client tick");
            if drift > 0 {
                // Skipped ticks never run locally; their commands go on the next one.
                let moved = self.commands.restamp(self.timestamp, target, target.next());
                if moved > 0 {
                    debug!(moved, "Restamped commands past skipped ticks");
                }
            }
            self.timestamp = target;
            self.predictions.clear();
        }
    }

    /// One fixed tick: reconcile against the newest snapshot, if any, then
    /// predict one step forward.
    pub fn tick(&mut self, connection: &mut Connection) {
        let mut newest: Option<Snapshot> = None;
        while let Some(snapshot) = connection.recv_snapshot() {
            newest = match newest {
                Some(held) if !snapshot.timestamp.is_after(held.timestamp) => Some(held),
                _ => Some(snapshot),
            };
        }
        if let Some(snapshot) = newest {
            if let Err(e) = self.reconcile(snapshot) {
                trace!(error = %e, "Snapshot ignored");
            }
        }

        self.previous_display = std::mem::take(&mut self.current_display);
        self.advance();
        self.current_display = self.world.display_state();
    }

    /// Reset to an authoritative snapshot and replay buffered commands up
    /// to the current tick. Snapshots not newer than the confirmed one are
    /// rejected without touching the world.
    pub fn reconcile(&mut self, snapshot: Snapshot) -> NetResult<()> {
        let confirmed = snapshot.timestamp;
        if let Some(held) = self.confirmed {
            if !confirmed.is_after(held) {
                return Err(NetError::StaleSnapshot {
                    held,
                    received: confirmed,
                });
            }
        }

        if let Some(predicted) = self.predictions.get(confirmed) {
            let error = prediction_error(predicted, &snapshot);
            if error > 0.0 {
                debug!(timestamp = %confirmed, error, "Prediction corrected");
            }
            self.last_correction = error;
        }

        self.world.apply_snapshot(&snapshot);
        self.confirmed = Some(confirmed);
        self.commands.evict_through(confirmed);
        self.predictions.clear();

        if confirmed.is_after(self.timestamp) {
            // Authority is ahead of us: adopt its tick outright.
            self.timestamp = confirmed;
            return Ok(());
        }

        let replay = self.timestamp.ticks_since(confirmed) as usize;
        if replay > self.config.predicted_history_capacity {
            warn!(replay, "Too far ahead of the authority, adopting snapshot tick");
            self.timestamp = confirmed;
            return Ok(());
        }

        self.timestamp = confirmed;
        for _ in 0..replay {
            self.advance();
        }
        self.resimulated_ticks += replay as u64;
        Ok(())
    }

    /// Apply the commands stamped for the next tick, step, and remember
    /// the predicted result.
    fn advance(&mut self) {
        let next = self.timestamp.next();
        for command in self.commands.stamped_at(next) {
            if let Err(e) = self.world.apply_command(command) {
                warn!(error = %e, timestamp = %next, "Buffered command skipped");
            }
        }
        self.world.step();
        self.timestamp = next;
        self.predictions.record(self.world.snapshot(next));
    }

    /// Interpolated view between the last two ticks.
    pub fn display_state(&self) -> DisplayState {
        DisplayState::interpolate(
            &self.previous_display,
            &self.current_display,
            self.stepper.alpha(),
        )
    }
}
