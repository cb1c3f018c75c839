//! eclusa-telemetry: PLC telemetry ingestion and fault detection
//!
//! Live link to the lock (eclusa) PLC gateway for the HMI.
//!
//! ## Architecture
//!
//! - **Stream Client**: self-healing WebSocket link with bounded reconnects,
//!   HTTP fallback for commands and a gateway health poll
//! - **Telemetry Distributor**: one shared client, latest snapshot and status
//!   broadcast to every subscriber
//! - **Signal Registry**: sparse `(bank, word, bit)` table of fault meanings
//! - **Fault Detector / Monitor**: active faults and per-equipment severity,
//!   recomputed on every snapshot
//! - **Consumer API**: local axum surface for the visual layer

pub mod config;
pub mod types;
pub mod registry;
pub mod acquisition;
pub mod distributor;
pub mod faults;
pub mod api;

// Re-export configuration
pub use config::{ConfigError, GatewayConfig};

// Re-export commonly used types
pub use types::{
    ActiveFault, BitBanks, BitWord, CategoryStats, ConnectionStatus, EquipmentCategory,
    FaultDefinition, FaultKind, FaultSeverity, LinkState, TelemetrySnapshot, WriteCommand,
};

// Re-export the link
pub use acquisition::{
    CommandError, CommandReceipt, CommandRoute, GatewayApi, GatewayError, HttpGateway,
    StreamClient, StreamHandle,
};
pub use distributor::{TelemetryDistributor, TelemetrySubscription};

// Re-export fault detection
pub use faults::{FaultDetector, FaultMonitor, FaultMonitorHandle, FaultReport};
pub use registry::{SignalKey, SignalRegistry};
