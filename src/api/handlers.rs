//! API handlers - consumer-facing view of the telemetry link and faults.
//!
//! All handlers return `Response` via [`ApiResponse::ok`] or [`ApiErrorResponse`].

use std::sync::Arc;

use axum::extract::State;
use axum::response::Response;
use axum::Json;
use serde::Serialize;
use tracing::{info, warn};

use super::envelope::{ApiErrorResponse, ApiResponse};
use crate::acquisition::CommandError;
use crate::distributor::TelemetryDistributor;
use crate::faults::FaultMonitorHandle;
use crate::registry::SignalRegistry;
use crate::types::{ActiveFault, EquipmentCategory, FaultDefinition, LinkState, WriteCommand};

/// Shared state handed to every handler.
#[derive(Clone)]
pub struct ConsumerState {
    pub distributor: Arc<TelemetryDistributor>,
    pub faults: FaultMonitorHandle,
    pub registry: Arc<SignalRegistry>,
}

// ============================================================================
// Response types
// ============================================================================

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub link: LinkState,
    pub connected: bool,
    pub active_faults: usize,
}

#[derive(Debug, Serialize)]
pub struct CriticalFaultsResponse {
    pub count: usize,
    pub faults: Vec<ActiveFault>,
}

#[derive(Debug, Serialize)]
pub struct RegistryResponse<'a> {
    pub definitions: Vec<&'a FaultDefinition>,
    pub categories: std::collections::BTreeMap<&'a str, &'a EquipmentCategory>,
}

// ============================================================================
// Handlers
// ============================================================================

/// GET /health
pub async fn health(State(state): State<ConsumerState>) -> Response {
    let status = state.distributor.status();
    ApiResponse::ok(HealthResponse {
        status: "ok",
        link: status.link,
        connected: status.connected,
        active_faults: state.faults.report().count,
    })
}

/// GET /api/v1/status
pub async fn link_status(State(state): State<ConsumerState>) -> Response {
    ApiResponse::ok(state.distributor.status())
}

/// GET /api/v1/snapshot
pub async fn latest_snapshot(State(state): State<ConsumerState>) -> Response {
    match state.distributor.latest_snapshot() {
        Some(snapshot) => ApiResponse::ok(snapshot.as_ref()),
        None => ApiErrorResponse::service_unavailable("No telemetry received yet"),
    }
}

/// GET /api/v1/faults
pub async fn active_faults(State(state): State<ConsumerState>) -> Response {
    ApiResponse::ok(state.faults.report().as_ref())
}

/// GET /api/v1/faults/critical
pub async fn critical_faults(State(state): State<ConsumerState>) -> Response {
    let report = state.faults.report();
    ApiResponse::ok(CriticalFaultsResponse {
        count: report.critical.len(),
        faults: report.critical.clone(),
    })
}

/// GET /api/v1/faults/categories
pub async fn fault_categories(State(state): State<ConsumerState>) -> Response {
    ApiResponse::ok(&state.faults.report().by_category)
}

/// GET /api/v1/registry
pub async fn registry(State(state): State<ConsumerState>) -> Response {
    ApiResponse::ok(RegistryResponse {
        definitions: state.registry.definitions(),
        categories: state.registry.categories(),
    })
}

/// POST /api/v1/command
pub async fn send_command(
    State(state): State<ConsumerState>,
    Json(command): Json<WriteCommand>,
) -> Response {
    if command.is_empty() {
        return ApiErrorResponse::bad_request("Command carries no writes");
    }

    match state.distributor.send_command(&command).await {
        Ok(receipt) => {
            info!(via = ?receipt.via, "Command accepted");
            ApiResponse::ok(receipt)
        }
        Err(e @ CommandError::Undelivered { .. }) => {
            warn!(error = %e, "Command undelivered");
            ApiErrorResponse::bad_gateway(e.to_string())
        }
        Err(CommandError::ClientStopped) => {
            ApiErrorResponse::service_unavailable("Stream client has stopped")
        }
        Err(e @ CommandError::Serialization(_)) => ApiErrorResponse::internal(e.to_string()),
    }
}

/// POST /api/v1/link/connect
pub async fn connect(State(state): State<ConsumerState>) -> Response {
    match state.distributor.connect().await {
        Ok(()) => ApiResponse::ok(state.distributor.status()),
        Err(e) => ApiErrorResponse::service_unavailable(e.to_string()),
    }
}

/// POST /api/v1/link/disconnect
pub async fn disconnect(State(state): State<ConsumerState>) -> Response {
    match state.distributor.disconnect().await {
        Ok(()) => ApiResponse::ok(state.distributor.status()),
        Err(e) => ApiErrorResponse::service_unavailable(e.to_string()),
    }
}
