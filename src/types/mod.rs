//! Shared data structures for PLC telemetry and fault detection
//!
//! - Snapshots: TelemetrySnapshot and its expanded bit banks
//! - Commands: WriteCommand sent back to the gateway
//! - Link: ConnectionStatus and the stream lifecycle
//! - Faults: definitions, active faults, equipment categories

mod snapshot;
mod command;
mod link;
mod fault;

pub use snapshot::*;
pub use command::*;
pub use link::*;
pub use fault::*;
