//! Configuration module - environment variable parsing and simulation tuning

use std::env;
use std::net::SocketAddr;
use std::str::FromStr;

/// Server configuration loaded from environment variables
#[derive(Clone, Debug)]
pub struct Config {
    /// Server binding address
    pub server_addr: SocketAddr,
    /// Log level (trace, debug, info, warn, error)
    pub log_level: String,
    /// Allowed browser origins for CORS, comma-separated. Any origin when unset.
    pub client_origin: Option<String>,
    /// Max inbound frames per second per socket
    pub input_rate_limit: u32,
    /// Seed for spawn placement
    pub world_seed: u64,
    /// Simulation tuning shared with clients
    pub simulation: SimulationConfig,
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self, ConfigError> {
        // PORT wins over SERVER_ADDR so hosted deployments can inject it
        let server_addr = if let Ok(port) = env::var("PORT") {
            format!("0.0.0.0:{}", port)
        } else {
            env::var("SERVER_ADDR").unwrap_or_else(|_| "0.0.0.0:8080".to_string())
        };

        let mut simulation = SimulationConfig::default();
        if let Some(tick_rate) = parse_var::<u32>("TICK_RATE")? {
            if tick_rate == 0 {
                return Err(ConfigError::Invalid("TICK_RATE"));
            }
            simulation.timestep = 1.0 / f64::from(tick_rate);
        }
        if let Some(interval) = parse_var::<u32>("SNAPSHOT_INTERVAL")? {
            if interval == 0 {
                return Err(ConfigError::Invalid("SNAPSHOT_INTERVAL"));
            }
            simulation.snapshot_interval = interval;
        }

        Ok(Self {
            server_addr: server_addr
                .parse()
                .map_err(|_| ConfigError::InvalidAddress)?,

            log_level: env::var("LOG_LEVEL").unwrap_or_else(|_| "info".to_string()),

            client_origin: env::var("CLIENT_ORIGIN").ok().filter(|s| !s.trim().is_empty()),

            input_rate_limit: parse_var("INPUT_RATE_LIMIT")?.unwrap_or(DEFAULT_INPUT_RATE_LIMIT),
            world_seed: parse_var("WORLD_SEED")?.unwrap_or(DEFAULT_WORLD_SEED),
            simulation,
        })
    }
}

pub const DEFAULT_INPUT_RATE_LIMIT: u32 = 120;
pub const DEFAULT_WORLD_SEED: u64 = 0x5eed;

fn parse_var<T: FromStr>(name: &'static str) -> Result<Option<T>, ConfigError> {
    match env::var(name) {
        Ok(raw) => raw
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| ConfigError::Invalid(name)),
        Err(_) => Ok(None),
    }
}

/// Tuning for the fixed-timestep simulation, identical on both sides.
#[derive(Clone, Debug, PartialEq)]
pub struct SimulationConfig {
    /// Seconds per tick
    pub timestep: f64,
    /// Ticks between authoritative snapshots
    pub snapshot_interval: u32,
    /// Unconfirmed commands kept for resimulation
    pub command_history_capacity: usize,
    /// Predicted snapshots kept for error measurement
    pub predicted_history_capacity: usize,
    /// Seconds between clock sync requests
    pub clock_sync_interval: f64,
    /// Weight of a new clock sample in the smoothed estimate
    pub clock_smoothing: f64,
    /// Extra ticks the client runs ahead of the authority
    pub lead_margin_ticks: u32,
    /// Tick drift tolerated before the client snaps to its target tick
    pub drift_tolerance_ticks: u32,
    /// Most ticks run in one update before backlog is dropped
    pub max_catch_up_ticks: u32,
    /// How far ahead of the authority a command may be stamped
    pub max_command_lead: u16,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            timestep: 1.0 / 60.0,
            snapshot_interval: 2,
            command_history_capacity: 256,
            predicted_history_capacity: 128,
            clock_sync_interval: 1.0,
            clock_smoothing: 0.1,
            lead_margin_ticks: 2,
            drift_tolerance_ticks: 3,
            max_catch_up_ticks: 8,
            max_command_lead: 60,
        }
    }
}

impl SimulationConfig {
    /// Simulation ticks per second
    pub fn tick_rate(&self) -> f64 {
        1.0 / self.timestep
    }
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid server address format")]
    InvalidAddress,

    #[error("Invalid value for environment variable: {0}")]
    Invalid(&'static str),
}
