//! Telemetry Distributor
//!
//! One shared stream client per process. The distributor spawns the client
//! actor, arms a single debounced auto-connect on first subscription and
//! hands out read-mostly [`TelemetrySubscription`]s that see the latest
//! snapshot and connection status.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::acquisition::{
    CommandError, CommandReceipt, GatewayApi, SnapshotSlot, StreamClient, StreamHandle,
};
use crate::config::GatewayConfig;
use crate::types::{ConnectionStatus, WriteCommand};

/// Shared owner of the gateway link.
pub struct TelemetryDistributor {
    handle: StreamHandle,
    actor: Mutex<Option<JoinHandle<()>>>,
    cancel: CancellationToken,
    auto_connect_enabled: bool,
    auto_connect_delay: Duration,
    /// Set by the first subscriber; later subscribers never re-arm
    auto_connect_armed: AtomicBool,
    /// Cancelled by an explicit disconnect; a pending auto-connect then stands down
    auto_connect_suppressed: CancellationToken,
}

impl TelemetryDistributor {
    /// Spawn the stream client actor. Must be called inside a tokio runtime.
    pub fn start(config: &GatewayConfig, gateway: Arc<dyn GatewayApi>) -> Arc<Self> {
        let (client, handle) =
            StreamClient::new(config.gateway.stream_url.clone(), config.link.clone(), gateway);
        let actor = tokio::spawn(client.run());

        info!(
            url = %config.gateway.stream_url,
            auto_connect = config.link.auto_connect,
            "Telemetry distributor started"
        );

        Arc::new(Self {
            handle,
            actor: Mutex::new(Some(actor)),
            cancel: CancellationToken::new(),
            auto_connect_enabled: config.link.auto_connect,
            auto_connect_delay: config.link.auto_connect_delay(),
            auto_connect_armed: AtomicBool::new(false),
            auto_connect_suppressed: CancellationToken::new(),
        })
    }

    /// New consumer view. The first call arms the auto-connect.
    pub fn subscribe(&self) -> TelemetrySubscription {
        self.arm_auto_connect();
        TelemetrySubscription {
            handle: self.handle.clone(),
            auto_connect_suppressed: self.auto_connect_suppressed.clone(),
            snapshot_rx: self.handle.watch_snapshots(),
            status_rx: self.handle.watch_status(),
        }
    }

    fn arm_auto_connect(&self) {
        if !self.auto_connect_enabled || self.auto_connect_armed.swap(true, Ordering::SeqCst) {
            return;
        }

        let handle = self.handle.clone();
        let cancel = self.cancel.clone();
        let suppressed = self.auto_connect_suppressed.clone();
        let delay = self.auto_connect_delay;

        tokio::spawn(async move {
            tokio::select! {
                () = cancel.cancelled() => return,
                () = suppressed.cancelled() => {
                    debug!("Auto-connect suppressed by explicit disconnect");
                    return;
                }
                () = tokio::time::sleep(delay) => {}
            }
            if handle.status().link.is_active() {
                return;
            }
            debug!("Auto-connecting to gateway");
            if let Err(e) = handle.connect().await {
                warn!(error = %e, "Auto-connect failed");
            }
        });
    }

    pub fn latest_snapshot(&self) -> SnapshotSlot {
        self.handle.snapshot()
    }

    pub fn status(&self) -> ConnectionStatus {
        self.handle.status()
    }

    pub async fn connect(&self) -> Result<(), CommandError> {
        self.handle.connect().await
    }

    /// Disconnect and stand down any pending auto-connect.
    pub async fn disconnect(&self) -> Result<(), CommandError> {
        self.auto_connect_suppressed.cancel();
        self.handle.disconnect().await
    }

    pub async fn send_command(&self, command: &WriteCommand) -> Result<CommandReceipt, CommandError> {
        self.handle.send_command(command).await
    }

    /// Cancel timers, close the stream and wait for the actor to exit.
    pub async fn shutdown(&self) {
        self.cancel.cancel();
        self.handle.shutdown().await;

        let actor = self.actor.lock().ok().and_then(|mut slot| slot.take());
        if let Some(actor) = actor {
            if let Err(e) = actor.await {
                warn!(error = %e, "Stream client task ended abnormally");
            }
        }
        info!("Telemetry distributor stopped");
    }
}

/// Consumer view of the distributor.
#[derive(Clone)]
pub struct TelemetrySubscription {
    handle: StreamHandle,
    auto_connect_suppressed: CancellationToken,
    snapshot_rx: watch::Receiver<SnapshotSlot>,
    status_rx: watch::Receiver<ConnectionStatus>,
}

impl TelemetrySubscription {
    /// Latest snapshot, `None` until the first frame arrives.
    pub fn latest_snapshot(&self) -> SnapshotSlot {
        self.snapshot_rx.borrow().clone()
    }

    pub fn status(&self) -> ConnectionStatus {
        self.status_rx.borrow().clone()
    }

    /// Wait for the next published snapshot and return it. Returns `None`
    /// once the stream client has stopped.
    pub async fn next_snapshot(&mut self) -> Option<SnapshotSlot> {
        self.snapshot_rx.changed().await.ok()?;
        Some(self.snapshot_rx.borrow_and_update().clone())
    }

    /// Wait for the next status change.
    pub async fn next_status(&mut self) -> Option<ConnectionStatus> {
        self.status_rx.changed().await.ok()?;
        Some(self.status_rx.borrow_and_update().clone())
    }

    pub async fn send_command(&self, command: &WriteCommand) -> Result<CommandReceipt, CommandError> {
        self.handle.send_command(command).await
    }

    pub async fn connect(&self) -> Result<(), CommandError> {
        self.handle.connect().await
    }

    pub async fn disconnect(&self) -> Result<(), CommandError> {
        self.auto_connect_suppressed.cancel();
        self.handle.disconnect().await
    }
}
