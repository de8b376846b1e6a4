//! Lockstep harness: one authority and any number of predicting clients
//! joined over in-memory transports with configurable latency and loss.

#![allow(dead_code)]

use arena_netcode::config::SimulationConfig;
use arena_netcode::game::{ClientSimulation, ServerSimulation};
use arena_netcode::net::{Connection, ConnectionRegistry, LoopbackTransport, PeerId, TransportEvent};
use arena_netcode::protocol::MessageKind;
use arena_netcode::world::{Entity, PlayerState};
use bytes::Bytes;

/// One direction of a simulated network path, measured in harness steps.
#[derive(Debug, Clone, Default)]
pub struct Link {
    pub delay: u64,
    /// Extra delay cycling through `0..=jitter`, which reorders frames.
    pub jitter: u64,
    /// Drop every n-th Command frame. Zero drops nothing.
    pub drop_every: usize,
    commands_seen: usize,
    sent: u64,
    in_flight: Vec<(u64, u64, Bytes)>,
}

impl Link {
    pub fn perfect() -> Self {
        Self::default()
    }

    pub fn lossy(delay: u64, jitter: u64, drop_every: usize) -> Self {
        Self {
            delay,
            jitter,
            drop_every,
            ..Self::default()
        }
    }

    fn carry(&mut self, now: u64, frames: Vec<Bytes>) {
        for frame in frames {
            if frame.first() == Some(&MessageKind::Command.tag()) && self.drop_every > 0 {
                self.commands_seen += 1;
                if self.commands_seen % self.drop_every == 0 {
                    continue;
                }
            }
            let due = now + self.delay + self.sent % (self.jitter + 1);
            self.in_flight.push((due, self.sent, frame));
            self.sent += 1;
        }
    }

    fn deliver(&mut self, now: u64) -> Vec<Bytes> {
        let (mut due, waiting): (Vec<_>, Vec<_>) =
            self.in_flight.drain(..).partition(|(at, _, _)| *at <= now);
        self.in_flight = waiting;
        due.sort_by_key(|(at, seq, _)| (*at, *seq));
        due.into_iter().map(|(_, _, frame)| frame).collect()
    }

    pub fn in_flight(&self) -> usize {
        self.in_flight.len()
    }
}

pub struct Peer {
    pub id: PeerId,
    pub client: ClientSimulation,
    pub connection: Connection,
    pub client_end: LoopbackTransport,
    server_end: LoopbackTransport,
    pub uplink: Link,
    pub downlink: Link,
}

pub struct Harness {
    pub config: SimulationConfig,
    pub server: ServerSimulation,
    pub registry: ConnectionRegistry,
    pub peers: Vec<Peer>,
    pub steps: u64,
}

impl Harness {
    pub fn new(seed: u64) -> Self {
        let config = SimulationConfig::default();
        Self {
            server: ServerSimulation::with_default_level(config.clone(), seed),
            registry: ConnectionRegistry::new(),
            peers: Vec::new(),
            steps: 0,
            config,
        }
    }

    /// Connect a client whose world starts `lead` ticks ahead of the
    /// authority. Returns its index in `peers`.
    pub fn join(&mut self, id: PeerId, lead: u32, uplink: Link, downlink: Link) -> usize {
        let (server_end, client_end) = LoopbackTransport::pair();
        let change = self
            .registry
            .handle(TransportEvent::Opened {
                peer: id,
                transport: Box::new(server_end.clone()),
            })
            .expect("fresh peer opens");
        self.server.handle_change(change);

        let mut connection = Connection::new(id, Box::new(client_end.clone()));
        connection.on_open();
        let mut client = ClientSimulation::with_default_level(self.config.clone());
        for _ in 0..lead {
            client.tick(&mut connection);
        }

        self.peers.push(Peer {
            id,
            client,
            connection,
            client_end,
            server_end,
            uplink,
            downlink,
        });
        self.peers.len() - 1
    }

    /// The socket under `peer` goes away on both sides.
    pub fn drop_connection(&mut self, peer: usize) {
        let peer = &mut self.peers[peer];
        peer.client_end.close();
        peer.connection.on_close();
        if let Some(change) = self.registry.handle(TransportEvent::Closed { peer: peer.id }) {
            self.server.handle_change(change);
        }
    }

    pub fn entity(&self, peer: usize) -> Entity {
        self.server
            .entity_of(self.peers[peer].id)
            .expect("peer has a player")
    }

    fn pump_up(&mut self) {
        let now = self.steps;
        for peer in &mut self.peers {
            let frames = peer.server_end.take_inbound();
            peer.uplink.carry(now, frames);
            for bytes in peer.uplink.deliver(now) {
                self.registry.handle(TransportEvent::Frame {
                    peer: peer.id,
                    bytes,
                });
            }
        }
    }

    fn pump_down(&mut self) {
        let now = self.steps;
        for peer in &mut self.peers {
            let frames = peer.client_end.take_inbound();
            peer.downlink.carry(now, frames);
            for bytes in peer.downlink.deliver(now) {
                peer.connection.on_message(&bytes);
            }
        }
    }

    /// One authority tick, then one fixed tick on every client.
    pub fn step(&mut self) {
        self.pump_up();
        self.server.tick(&mut self.registry);
        self.pump_down();
        for peer in &mut self.peers {
            peer.client.tick(&mut peer.connection);
        }
        self.steps += 1;
    }

    /// Like [`Harness::step`], but clients run from their frame callback
    /// with one timestep of wall time, including clock sync.
    pub fn step_realtime(&mut self) {
        self.pump_up();
        self.server.tick(&mut self.registry);
        self.pump_down();
        let dt = self.config.timestep;
        let now = self.steps as f64 * dt;
        for peer in &mut self.peers {
            peer.client.update(dt, now, &mut peer.connection);
        }
        self.steps += 1;
    }

    /// Advance only the authority.
    pub fn server_tick(&mut self) {
        self.pump_up();
        self.server.tick(&mut self.registry);
    }

    pub fn run(&mut self, steps: usize) {
        for _ in 0..steps {
            self.step();
        }
    }

    pub fn authority(&self, entity: Entity) -> PlayerState {
        self.server.world().player(entity).expect("authority has player")
    }

    pub fn predicted(&self, peer: usize, entity: Entity) -> PlayerState {
        self.peers[peer]
            .client
            .world()
            .player(entity)
            .expect("client mirrors player")
    }
}
