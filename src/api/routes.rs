//! API route definitions
//!
//! - /api/v1/status - Link state and gateway counters
//! - /api/v1/snapshot - Latest telemetry snapshot
//! - /api/v1/faults - Active faults, critical subset, per-category roll-up
//! - /api/v1/registry - Known fault definitions and categories
//! - /api/v1/command - Write command to the PLC
//! - /api/v1/link/* - Manual connect / disconnect

use axum::{routing::{get, post}, Router};

use super::handlers::{self, ConsumerState};

/// Create all API routes
pub fn api_routes(state: ConsumerState) -> Router {
    Router::new()
        .route("/status", get(handlers::link_status))
        .route("/snapshot", get(handlers::latest_snapshot))
        // Faults
        .route("/faults", get(handlers::active_faults))
        .route("/faults/critical", get(handlers::critical_faults))
        .route("/faults/categories", get(handlers::fault_categories))
        .route("/registry", get(handlers::registry))
        // Commands and link control
        .route("/command", post(handlers::send_command))
        .route("/link/connect", post(handlers::connect))
        .route("/link/disconnect", post(handlers::disconnect))
        .with_state(state)
}

/// Health endpoint at root level
pub fn health_routes(state: ConsumerState) -> Router {
    Router::new()
        .route("/health", get(handlers::health))
        .with_state(state)
}
