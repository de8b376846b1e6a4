//! Message payloads carried between peers

use glam::{DQuat, DVec3};

use crate::world::Entity;

use super::Timestamp;

/// One-byte tag at the start of every frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[repr(u8)]
pub enum MessageKind {
    ClockSync = 0,
    Command = 1,
    Snapshot = 2,
}

impl MessageKind {
    pub const ALL: [MessageKind; 3] = [Self::ClockSync, Self::Command, Self::Snapshot];

    pub const fn tag(self) -> u8 {
        self as u8
    }

    pub const fn from_tag(tag: u8) -> Option<Self> {
        match tag {
            0 => Some(Self::ClockSync),
            1 => Some(Self::Command),
            2 => Some(Self::Snapshot),
            _ => None,
        }
    }

    /// Lane index for kind-indexed queues.
    pub const fn index(self) -> usize {
        self as usize
    }
}

/// Clock exchange between a peer and the authority.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ClockSyncMessage {
    /// Wire id of the peer's player entity, assigned by the authority.
    /// All ones until assigned.
    pub peer_id: u32,
    /// Peer's local elapsed seconds when the request was sent.
    pub peer_elapsed: f64,
    /// Authority's elapsed seconds when it answered (zero in requests).
    pub authority_elapsed: f64,
}

/// An input edge for one entity.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Command {
    pub entity: Entity,
    pub on: u8,
    pub off: u8,
    pub timestamp: Timestamp,
}

impl Command {
    /// Build an unstamped input command. The engine assigns the timestamp
    /// when the command is issued.
    pub fn input(entity: Entity, on: u8, off: u8) -> Self {
        Self {
            entity,
            on,
            off,
            timestamp: Timestamp::default(),
        }
    }

    #[must_use]
    pub fn stamped(mut self, timestamp: Timestamp) -> Self {
        self.timestamp = timestamp;
        self
    }

    /// `(input | on) & !off`. Idempotent.
    pub fn apply_to(&self, input: u8) -> u8 {
        (input | self.on) & !self.off
    }
}

/// Authoritative state of one player entity.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PlayerSnapshot {
    pub entity: Entity,
    pub translation: DVec3,
    pub rotation: DQuat,
    pub force: DVec3,
    pub grounded: bool,
    pub input: u8,
}

/// Authoritative state of every player entity at one tick.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Snapshot {
    pub timestamp: Timestamp,
    pub players: Vec<PlayerSnapshot>,
}

impl Snapshot {
    pub fn get(&self, entity: Entity) -> Option<&PlayerSnapshot> {
        self.players.iter().find(|p| p.entity == entity)
    }
}

/// Any decoded frame.
#[derive(Debug, Clone, PartialEq)]
pub enum Message {
    ClockSync(ClockSyncMessage),
    Command(Command),
    Snapshot(Snapshot),
}

impl Message {
    pub fn kind(&self) -> MessageKind {
        match self {
            Self::ClockSync(_) => MessageKind::ClockSync,
            Self::Command(_) => MessageKind::Command,
            Self::Snapshot(_) => MessageKind::Snapshot,
        }
    }
}

impl From<ClockSyncMessage> for Message {
    fn from(msg: ClockSyncMessage) -> Self {
        Self::ClockSync(msg)
    }
}

impl From<Command> for Message {
    fn from(cmd: Command) -> Self {
        Self::Command(cmd)
    }
}

impl From<Snapshot> for Message {
    fn from(snapshot: Snapshot) -> Self {
        Self::Snapshot(snapshot)
    }
}
