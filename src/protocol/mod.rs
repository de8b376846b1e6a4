//! Wire protocol: message payloads, logical timestamps and the binary codec

pub mod codec;
pub mod message;
pub mod timestamp;

pub use codec::{decode, decode_frame, encode};
pub use message::{ClockSyncMessage, Command, Message, MessageKind, PlayerSnapshot, Snapshot};
pub use timestamp::Timestamp;
