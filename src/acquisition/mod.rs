//! Telemetry acquisition module
//!
//! Handles data ingestion from the PLC gateway: the WebSocket stream, frame
//! decoding and the HTTP side-channel.

pub mod frame;
pub mod gateway;
pub mod stream_client;

pub use frame::{decode_frame, FrameError};
pub use gateway::{GatewayApi, GatewayError, HttpGateway};
pub use stream_client::{
    CommandError, CommandReceipt, CommandRoute, SnapshotSlot, StreamClient, StreamHandle,
};
