//! Gateway Configuration Module
//!
//! Deployment settings for the telemetry link loaded from TOML, with
//! built-in defaults matching the stock gateway.
//!
//! ## Loading Order
//!
//! 1. `ECLUSA_CONFIG` environment variable (path to TOML file)
//! 2. `eclusa.toml` in the current working directory
//! 3. Built-in defaults
//!
//! ## Usage
//!
//! ```ignore
//! let config = GatewayConfig::load();
//! let distributor = TelemetryDistributor::start(&config, gateway);
//! ```

mod settings;
pub mod defaults;

pub use settings::*;
