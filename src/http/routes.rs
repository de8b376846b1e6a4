//! HTTP route definitions

use axum::{
    extract::State,
    http::{header, Method},
    response::Json,
    routing::get,
    Router,
};
use serde::Serialize;
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

use crate::app::AppState;
use crate::game::{ServerStats, SnapshotStats};
use crate::util::time::uptime_secs;
use crate::ws::ws_handler;

/// Build the application router
pub fn build_router(state: AppState) -> Router {
    let cors = cors_layer(state.config.client_origin.as_deref());

    Router::new()
        .route("/health", get(health_handler))
        .route("/ws", get(ws_handler))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

/// CORS for browser clients. `origins` is comma-separated; any origin when unset.
fn cors_layer(origins: Option<&str>) -> CorsLayer {
    let cors = CorsLayer::new()
        .allow_methods([Method::GET, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE]);

    match origins {
        Some(origins) => {
            let allowed: Vec<header::HeaderValue> = origins
                .split(',')
                .filter_map(|s| s.trim().parse::<header::HeaderValue>().ok())
                .collect();
            cors.allow_origin(allowed)
        }
        None => cors.allow_origin(Any),
    }
}

// ============================================================================
// Health endpoint
// ============================================================================

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    uptime_secs: u64,
    tick: u64,
    tick_rate: f64,
    connections: usize,
    entities: usize,
    held_commands: usize,
    snapshots: SnapshotStats,
}

async fn health_handler(State(state): State<AppState>) -> Json<HealthResponse> {
    let stats = state.stats.read().clone();
    Json(HealthResponse::new(stats, state.config.simulation.tick_rate()))
}

impl HealthResponse {
    fn new(stats: ServerStats, tick_rate: f64) -> Self {
        Self {
            status: "ok",
            uptime_secs: uptime_secs(),
            tick: stats.tick,
            tick_rate,
            connections: stats.connections,
            entities: stats.entities,
            held_commands: stats.held_commands,
            snapshots: stats.snapshots,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn health_reports_simulation_stats() {
        let mut stats = ServerStats {
            tick: 120,
            connections: 2,
            entities: 2,
            ..ServerStats::default()
        };
        stats.snapshots.record(2, 177);

        let json = serde_json::to_value(HealthResponse::new(stats, 60.0)).unwrap();
        assert_eq!(json["status"], "ok");
        assert_eq!(json["tick"], 120);
        assert_eq!(json["connections"], 2);
        assert_eq!(json["tick_rate"], 60.0);
        assert_eq!(json["snapshots"]["total_snapshots"], 1);
    }
}
