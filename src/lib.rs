//! Arena netcode - authoritative kinematic simulation with client-side
//! prediction and rollback reconciliation
//!
//! - [`protocol`]: fixed-layout binary codec, message types and wrapping tick stamps
//! - [`net`]: per-peer connections with kind-indexed lanes, registry and transports
//! - [`world`]: player entities and the deterministic kinematic step
//! - [`physics`]: shape-cast collaborator and the built-in collision world
//! - [`game`]: server and client engines
//! - [`clock`]: clock offset and latency estimation

pub mod app;
pub mod clock;
pub mod config;
pub mod error;
pub mod game;
pub mod http;
pub mod input;
pub mod net;
pub mod physics;
pub mod protocol;
pub mod util;
pub mod world;
pub mod ws;

pub use error::{NetError, NetResult, TransportError};
