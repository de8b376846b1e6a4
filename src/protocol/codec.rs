//! Fixed-layout binary codec
//!
//! Every frame starts with a one-byte [`MessageKind`] tag. All numeric fields
//! are fixed width and big-endian; nothing is variable-length, so offsets are
//! plain arithmetic and the byte cost of a tick is known up front.
//!
//! | Kind      | Layout                                                              |
//! |-----------|---------------------------------------------------------------------|
//! | ClockSync | tag, peer id u32, peer elapsed f64, authority elapsed f64            |
//! | Command   | tag, timestamp i16, entity u32, on u8, off u8                        |
//! | Snapshot  | tag, timestamp i16, count u16, count × entry                         |
//!
//! A snapshot entry is entity u32, translation 3×f64, rotation 4×f64
//! (x, y, z, w), force 3×f64, grounded u8, input u8.

use bytes::{Buf, BufMut, Bytes, BytesMut};
use glam::{DQuat, DVec3};

use crate::error::{NetError, NetResult};
use crate::world::Entity;

use super::message::{ClockSyncMessage, Command, Message, MessageKind, PlayerSnapshot, Snapshot};
use super::Timestamp;

const TAG_SIZE: usize = 1;

/// Payload bytes after the tag.
pub const CLOCK_SYNC_PAYLOAD: usize = 4 + 8 + 8;
pub const COMMAND_PAYLOAD: usize = 2 + 4 + 1 + 1;
pub const SNAPSHOT_HEADER_PAYLOAD: usize = 2 + 2;
pub const SNAPSHOT_ENTRY_SIZE: usize = 4 + 8 * 3 + 8 * 4 + 8 * 3 + 1 + 1;

pub const CLOCK_SYNC_FRAME: usize = TAG_SIZE + CLOCK_SYNC_PAYLOAD;
pub const COMMAND_FRAME: usize = TAG_SIZE + COMMAND_PAYLOAD;

/// Upper bound on entities per snapshot frame.
pub const MAX_SNAPSHOT_ENTRIES: usize = u16::MAX as usize;

/// Size in bytes of an encoded snapshot frame with `count` entries.
pub const fn snapshot_frame_size(count: usize) -> usize {
    TAG_SIZE + SNAPSHOT_HEADER_PAYLOAD + count * SNAPSHOT_ENTRY_SIZE
}

/// Encode a message into a complete frame, tag included.
///
/// Snapshots with more than [`MAX_SNAPSHOT_ENTRIES`] players are truncated;
/// the world model never produces them.
pub fn encode(message: &Message) -> Bytes {
    match message {
        Message::ClockSync(msg) => {
            let mut buf = BytesMut::with_capacity(CLOCK_SYNC_FRAME);
            buf.put_u8(MessageKind::ClockSync.tag());
            buf.put_u32(msg.peer_id);
            buf.put_f64(msg.peer_elapsed);
            buf.put_f64(msg.authority_elapsed);
            buf.freeze()
        }
        Message::Command(cmd) => {
            let mut buf = BytesMut::with_capacity(COMMAND_FRAME);
            buf.put_u8(MessageKind::Command.tag());
            buf.put_i16(cmd.timestamp.raw());
            buf.put_u32(cmd.entity.to_bits());
            buf.put_u8(cmd.on);
            buf.put_u8(cmd.off);
            buf.freeze()
        }
        Message::Snapshot(snapshot) => {
            let count = snapshot.players.len().min(MAX_SNAPSHOT_ENTRIES);
            let mut buf = BytesMut::with_capacity(snapshot_frame_size(count));
            buf.put_u8(MessageKind::Snapshot.tag());
            buf.put_i16(snapshot.timestamp.raw());
            buf.put_u16(count as u16);
            for player in &snapshot.players[..count] {
                put_player(&mut buf, player);
            }
            buf.freeze()
        }
    }
}

fn put_player(buf: &mut BytesMut, player: &PlayerSnapshot) {
    buf.put_u32(player.entity.to_bits());
    put_vec3(buf, player.translation);
    buf.put_f64(player.rotation.x);
    buf.put_f64(player.rotation.y);
    buf.put_f64(player.rotation.z);
    buf.put_f64(player.rotation.w);
    put_vec3(buf, player.force);
    buf.put_u8(u8::from(player.grounded));
    buf.put_u8(player.input);
}

fn put_vec3(buf: &mut BytesMut, v: DVec3) {
    buf.put_f64(v.x);
    buf.put_f64(v.y);
    buf.put_f64(v.z);
}

/// Decode the payload of a `kind` message starting at `offset` (just past
/// the tag byte when reading a whole frame).
pub fn decode(kind: MessageKind, bytes: &[u8], offset: usize) -> NetResult<Message> {
    let available = bytes.len().saturating_sub(offset);
    let malformed = |needed: usize| NetError::MalformedMessage {
        kind,
        needed,
        available,
    };
    let mut buf = bytes.get(offset..).unwrap_or_default();

    match kind {
        MessageKind::ClockSync => {
            if available < CLOCK_SYNC_PAYLOAD {
                return Err(malformed(CLOCK_SYNC_PAYLOAD));
            }
            Ok(Message::ClockSync(ClockSyncMessage {
                peer_id: buf.get_u32(),
                peer_elapsed: buf.get_f64(),
                authority_elapsed: buf.get_f64(),
            }))
        }
        MessageKind::Command => {
            if available < COMMAND_PAYLOAD {
                return Err(malformed(COMMAND_PAYLOAD));
            }
            let timestamp = Timestamp::new(buf.get_i16());
            let entity = Entity::from_bits(buf.get_u32());
            let on = buf.get_u8();
            let off = buf.get_u8();
            Ok(Message::Command(Command {
                entity,
                on,
                off,
                timestamp,
            }))
        }
        MessageKind::Snapshot => {
            if available < SNAPSHOT_HEADER_PAYLOAD {
                return Err(malformed(SNAPSHOT_HEADER_PAYLOAD));
            }
            let timestamp = Timestamp::new(buf.get_i16());
            let count = buf.get_u16() as usize;
            let needed = SNAPSHOT_HEADER_PAYLOAD + count * SNAPSHOT_ENTRY_SIZE;
            if available < needed {
                return Err(malformed(needed));
            }
            let players = (0..count).map(|_| get_player(&mut buf)).collect();
            Ok(Message::Snapshot(Snapshot { timestamp, players }))
        }
    }
}

fn get_player(buf: &mut &[u8]) -> PlayerSnapshot {
    let entity = Entity::from_bits(buf.get_u32());
    let translation = get_vec3(buf);
    let rotation = DQuat::from_xyzw(buf.get_f64(), buf.get_f64(), buf.get_f64(), buf.get_f64());
    let force = get_vec3(buf);
    let grounded = buf.get_u8() != 0;
    let input = buf.get_u8();
    PlayerSnapshot {
        entity,
        translation,
        rotation,
        force,
        grounded,
        input,
    }
}

fn get_vec3(buf: &mut &[u8]) -> DVec3 {
    DVec3::new(buf.get_f64(), buf.get_f64(), buf.get_f64())
}

/// Decode a whole frame, reading the kind from its first byte.
pub fn decode_frame(frame: &[u8]) -> NetResult<Message> {
    let Some(&tag) = frame.first() else {
        return Err(NetError::MalformedMessage {
            kind: MessageKind::ClockSync,
            needed: TAG_SIZE,
            available: 0,
        });
    };
    let kind = MessageKind::from_tag(tag).ok_or(NetError::UnknownMessageKind(tag))?;
    decode(kind, frame, TAG_SIZE)
}
