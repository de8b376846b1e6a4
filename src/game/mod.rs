//! Prediction and reconciliation engines

pub mod client;
pub mod history;
pub mod server;
pub mod snapshot;

pub use client::ClientSimulation;
pub use history::{CommandHistory, PredictionHistory};
pub use server::{ServerSimulation, ServerStats};
pub use snapshot::{SnapshotBuilder, SnapshotStats};
