//! Stream Client - self-healing WebSocket link to the PLC gateway
//!
//! A single actor task owns the link state, the write half of the socket
//! and the reconnect deadline. Connect attempts, the socket reader and the
//! health poller are child tasks that report back over an internal channel.
//! Every connection-scoped event carries the generation it was started
//! under; events from a superseded generation are dropped, so a late
//! handshake or close can never undo a newer `connect()` or `disconnect()`.
//!
//! State machine:
//!
//! ```text
//!   Idle --connect--> Connecting --open--> Open
//!                        |                  |
//!                        +--fail--> Closed <+--close
//!                                     |
//!                     (attempts < max) +--delay--> Connecting
//!   Connecting/Open/Closed --disconnect--> Idle
//! ```

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use futures::stream::{SplitSink, SplitStream};
use futures::{SinkExt, StreamExt};
use thiserror::Error;
use tokio::net::TcpStream;
use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};
use tracing::{debug, error, info, trace, warn};

use super::frame::decode_frame;
use super::gateway::{GatewayApi, GatewayError};
use crate::config::defaults::{CLOSE_HANDSHAKE_TIMEOUT_MS, COMMAND_CHANNEL_CAPACITY};
use crate::config::LinkConfig;
use crate::types::{ConnectionStatus, GatewayHealth, LinkState, TelemetrySnapshot, WriteCommand};

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;
type WsSink = SplitSink<WsStream, Message>;
type WsSource = SplitStream<WsStream>;

/// Latest snapshot as published to consumers. `None` until the first frame.
pub type SnapshotSlot = Option<Arc<TelemetrySnapshot>>;

// ============================================================================
// Errors & Receipts
// ============================================================================

/// Command delivery errors
#[derive(Debug, Error)]
pub enum CommandError {
    #[error("Command not delivered (stream: {stream}; fallback: {fallback})")]
    Undelivered { stream: String, fallback: GatewayError },

    #[error("Command serialization failed: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Stream client has stopped")]
    ClientStopped,
}

/// Transport a command went out on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CommandRoute {
    Stream,
    Fallback,
}

/// Successful delivery of a write command.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub struct CommandReceipt {
    pub via: CommandRoute,
    /// Gateway acknowledgement (fallback only)
    pub message: Option<String>,
}

// ============================================================================
// Commands & Internal Events
// ============================================================================

/// Commands for the stream client actor
#[derive(Debug)]
enum LinkCommand {
    Connect { reply: oneshot::Sender<()> },
    Disconnect { reply: oneshot::Sender<()> },
    /// Send an already-serialized command on the open stream
    Send {
        payload: String,
        reply: oneshot::Sender<Result<(), String>>,
    },
    Shutdown { reply: oneshot::Sender<()> },
}

/// Reports from child tasks
enum LinkEvent {
    Opened { generation: u64, stream: Box<WsStream> },
    AttemptFailed { generation: u64, reason: String },
    Snapshot { generation: u64, snapshot: TelemetrySnapshot },
    Closed { generation: u64, reason: String },
    Health(GatewayHealth),
}

// ============================================================================
// Handle
// ============================================================================

/// Cloneable handle to the stream client actor.
#[derive(Clone)]
pub struct StreamHandle {
    tx: mpsc::Sender<LinkCommand>,
    gateway: Arc<dyn GatewayApi>,
    snapshot_rx: watch::Receiver<SnapshotSlot>,
    status_rx: watch::Receiver<ConnectionStatus>,
}

impl StreamHandle {
    /// Start connecting. No-op while connecting or open.
    pub async fn connect(&self) -> Result<(), CommandError> {
        let (reply, rx) = oneshot::channel();
        self.tx
            .send(LinkCommand::Connect { reply })
            .await
            .map_err(|_| CommandError::ClientStopped)?;
        rx.await.map_err(|_| CommandError::ClientStopped)
    }

    /// Cancel any pending reconnect and close the stream. Returns once the
    /// client is idle.
    pub async fn disconnect(&self) -> Result<(), CommandError> {
        let (reply, rx) = oneshot::channel();
        self.tx
            .send(LinkCommand::Disconnect { reply })
            .await
            .map_err(|_| CommandError::ClientStopped)?;
        rx.await.map_err(|_| CommandError::ClientStopped)
    }

    /// Deliver a write command: on the stream when open, otherwise (or when
    /// the stream write fails) through the HTTP fallback.
    pub async fn send_command(&self, command: &WriteCommand) -> Result<CommandReceipt, CommandError> {
        let payload = serde_json::to_string(command)?;

        let stream_failure = match self.send_on_stream(payload).await {
            Ok(()) => {
                debug!("Command sent on stream");
                return Ok(CommandReceipt { via: CommandRoute::Stream, message: None });
            }
            Err(reason) => reason,
        };

        debug!(reason = %stream_failure, "Stream unavailable, using fallback write");
        match self.gateway.post_write(command).await {
            Ok(message) => {
                info!(message = %message, "Command delivered via fallback");
                Ok(CommandReceipt { via: CommandRoute::Fallback, message: Some(message) })
            }
            Err(e) => {
                warn!(stream = %stream_failure, fallback = %e, "Command delivery failed");
                Err(CommandError::Undelivered { stream: stream_failure, fallback: e })
            }
        }
    }

    async fn send_on_stream(&self, payload: String) -> Result<(), String> {
        let (reply, rx) = oneshot::channel();
        self.tx
            .send(LinkCommand::Send { payload, reply })
            .await
            .map_err(|_| "stream client stopped".to_string())?;
        rx.await.map_err(|_| "stream client stopped".to_string())?
    }

    /// Stop the actor: disconnects, stops the health poll and waits for the
    /// actor to acknowledge.
    pub async fn shutdown(&self) {
        let (reply, rx) = oneshot::channel();
        if self.tx.send(LinkCommand::Shutdown { reply }).await.is_ok() {
            let _ = rx.await;
        }
    }

    /// Latest decoded snapshot, if any frame has arrived.
    pub fn snapshot(&self) -> SnapshotSlot {
        self.snapshot_rx.borrow().clone()
    }

    pub fn status(&self) -> ConnectionStatus {
        self.status_rx.borrow().clone()
    }

    pub fn watch_snapshots(&self) -> watch::Receiver<SnapshotSlot> {
        self.snapshot_rx.clone()
    }

    pub fn watch_status(&self) -> watch::Receiver<ConnectionStatus> {
        self.status_rx.clone()
    }
}

// ============================================================================
// Stream Client Actor
// ============================================================================

/// Owner of the gateway link.
pub struct StreamClient {
    url: String,
    link: LinkConfig,
    gateway: Arc<dyn GatewayApi>,
    rx: mpsc::Receiver<LinkCommand>,
    events_tx: mpsc::Sender<LinkEvent>,
    events_rx: mpsc::Receiver<LinkEvent>,
    snapshot_tx: watch::Sender<SnapshotSlot>,
    status_tx: watch::Sender<ConnectionStatus>,

    state: LinkState,
    /// Bumped on every connect attempt and every disconnect
    generation: u64,
    /// Automatic reconnects since the last successful open
    reconnect_attempts: u32,
    reconnect_at: Option<Instant>,
    sink: Option<WsSink>,
    attempt_task: Option<JoinHandle<()>>,
    reader_task: Option<JoinHandle<()>>,
}

impl StreamClient {
    /// Create new stream client and handle
    pub fn new(
        url: impl Into<String>,
        link: LinkConfig,
        gateway: Arc<dyn GatewayApi>,
    ) -> (Self, StreamHandle) {
        let (tx, rx) = mpsc::channel(COMMAND_CHANNEL_CAPACITY);
        let (events_tx, events_rx) = mpsc::channel(COMMAND_CHANNEL_CAPACITY * 4);
        let (snapshot_tx, snapshot_rx) = watch::channel(None);
        let (status_tx, status_rx) = watch::channel(ConnectionStatus::default());

        let actor = Self {
            url: url.into(),
            link,
            gateway: Arc::clone(&gateway),
            rx,
            events_tx,
            events_rx,
            snapshot_tx,
            status_tx,
            state: LinkState::Idle,
            generation: 0,
            reconnect_attempts: 0,
            reconnect_at: None,
            sink: None,
            attempt_task: None,
            reader_task: None,
        };

        let handle = StreamHandle { tx, gateway, snapshot_rx, status_rx };

        (actor, handle)
    }

    /// Run the actor loop until shutdown or until every handle is dropped.
    pub async fn run(mut self) {
        info!(url = %self.url, "StreamClient starting");

        let health_task = tokio::spawn(poll_health(
            Arc::clone(&self.gateway),
            self.link.health_poll_interval(),
            self.events_tx.clone(),
        ));

        loop {
            let deadline = self.reconnect_at;
            let reconnect_due = async move {
                match deadline {
                    Some(at) => tokio::time::sleep_until(at).await,
                    None => std::future::pending().await,
                }
            };

            tokio::select! {
                cmd = self.rx.recv() => {
                    match cmd {
                        Some(LinkCommand::Connect { reply }) => {
                            self.handle_connect();
                            let _ = reply.send(());
                        }
                        Some(LinkCommand::Disconnect { reply }) => {
                            self.handle_disconnect().await;
                            let _ = reply.send(());
                        }
                        Some(LinkCommand::Send { payload, reply }) => {
                            let result = self.handle_send(payload).await;
                            let _ = reply.send(result);
                        }
                        Some(LinkCommand::Shutdown { reply }) => {
                            self.handle_disconnect().await;
                            let _ = reply.send(());
                            break;
                        }
                        None => {
                            self.handle_disconnect().await;
                            break;
                        }
                    }
                }
                Some(event) = self.events_rx.recv() => {
                    self.handle_event(event);
                }
                () = reconnect_due => {
                    self.reconnect_at = None;
                    if self.state == LinkState::Closed {
                        info!(
                            attempt = self.reconnect_attempts,
                            max_attempts = self.link.max_reconnect_attempts,
                            "Reconnecting to gateway"
                        );
                        self.start_attempt();
                    }
                }
            }
        }

        health_task.abort();
        info!("StreamClient stopped");
    }

    // ------------------------------------------------------------------------
    // Commands
    // ------------------------------------------------------------------------

    fn handle_connect(&mut self) {
        if self.state.is_active() {
            debug!(state = %self.state, "Connect ignored, link already active");
            return;
        }

        // A manual connect starts the retry budget over
        self.reconnect_attempts = 0;
        self.reconnect_at = None;
        self.status_tx.send_modify(|s| s.retries_exhausted = false);
        self.start_attempt();
    }

    async fn handle_disconnect(&mut self) {
        self.reconnect_at = None;
        self.generation += 1;

        if let Some(task) = self.attempt_task.take() {
            task.abort();
        }
        if let Some(mut sink) = self.sink.take() {
            let grace = Duration::from_millis(CLOSE_HANDSHAKE_TIMEOUT_MS);
            if tokio::time::timeout(grace, sink.close()).await.is_err() {
                debug!("Close handshake timed out");
            }
        }
        if let Some(task) = self.reader_task.take() {
            task.abort();
        }

        let was = self.state;
        self.state = LinkState::Idle;
        self.reconnect_attempts = 0;
        self.publish_status(|s| {
            s.connected = false;
            s.retries_exhausted = false;
        });

        if was != LinkState::Idle {
            info!(previous = %was, "Gateway link disconnected");
        }
    }

    async fn handle_send(&mut self, payload: String) -> Result<(), String> {
        if self.state != LinkState::Open {
            return Err(format!("stream is {}", self.state));
        }
        let Some(sink) = self.sink.as_mut() else {
            return Err("stream has no writer".to_string());
        };

        let limit = self.link.write_timeout();
        let reason = match tokio::time::timeout(limit, sink.send(Message::Text(payload))).await {
            Ok(Ok(())) => return Ok(()),
            Ok(Err(e)) => e.to_string(),
            Err(_) => format!("write timed out after {}ms", limit.as_millis()),
        };

        // A stalled or broken writer means the transport is gone
        warn!(url = %self.url, reason = %reason, "Stream write failed, dropping stream");
        self.on_transport_closed();
        Err(reason)
    }

    // ------------------------------------------------------------------------
    // Child task events
    // ------------------------------------------------------------------------

    fn handle_event(&mut self, event: LinkEvent) {
        match event {
            LinkEvent::Opened { generation, stream } => {
                if generation != self.generation || self.state != LinkState::Connecting {
                    debug!(generation, current = self.generation, "Dropping superseded connection");
                    return;
                }
                self.on_open(*stream);
            }
            LinkEvent::AttemptFailed { generation, reason } => {
                if generation != self.generation || self.state != LinkState::Connecting {
                    return;
                }
                warn!(url = %self.url, reason = %reason, "Gateway connect attempt failed");
                self.on_transport_closed();
            }
            LinkEvent::Closed { generation, reason } => {
                if generation != self.generation || self.state != LinkState::Open {
                    return;
                }
                warn!(url = %self.url, reason = %reason, "Gateway stream closed");
                self.on_transport_closed();
            }
            LinkEvent::Snapshot { generation, snapshot } => {
                if generation != self.generation || self.state != LinkState::Open {
                    return;
                }
                let received_at = snapshot.received_at;
                trace!(byte_size = snapshot.byte_size, timestamp = %snapshot.timestamp, "Snapshot received");
                self.snapshot_tx.send_replace(Some(Arc::new(snapshot)));
                self.status_tx.send_modify(|s| s.last_update = Some(received_at));
            }
            LinkEvent::Health(health) => {
                self.status_tx.send_if_modified(|s| {
                    let changed = s.plc_connections != health.plc_connections
                        || s.websocket_clients != health.websocket_clients;
                    s.plc_connections = health.plc_connections;
                    s.websocket_clients = health.websocket_clients;
                    changed
                });
            }
        }
    }

    fn start_attempt(&mut self) {
        self.generation += 1;
        self.state = LinkState::Connecting;
        let attempts = self.reconnect_attempts;
        self.publish_status(|s| {
            s.connected = false;
            s.reconnect_attempts = attempts;
        });

        if let Some(task) = self.attempt_task.take() {
            task.abort();
        }

        let url = self.url.clone();
        let timeout = self.link.connect_timeout();
        let generation = self.generation;
        let events = self.events_tx.clone();

        info!(url = %url, generation, "Connecting to gateway stream");
        self.attempt_task = Some(tokio::spawn(async move {
            let event = match tokio::time::timeout(timeout, tokio_tungstenite::connect_async(url)).await {
                Ok(Ok((stream, _response))) => LinkEvent::Opened { generation, stream: Box::new(stream) },
                Ok(Err(e)) => LinkEvent::AttemptFailed { generation, reason: e.to_string() },
                Err(_) => LinkEvent::AttemptFailed {
                    generation,
                    reason: format!("handshake timed out after {}ms", timeout.as_millis()),
                },
            };
            let _ = events.send(event).await;
        }));
    }

    fn on_open(&mut self, stream: WsStream) {
        let (sink, source) = stream.split();
        self.sink = Some(sink);
        self.attempt_task = None;
        self.reader_task = Some(tokio::spawn(read_frames(
            source,
            self.generation,
            self.events_tx.clone(),
        )));

        self.state = LinkState::Open;
        self.reconnect_attempts = 0;
        self.reconnect_at = None;
        self.publish_status(|s| {
            s.connected = true;
            s.reconnect_attempts = 0;
            s.retries_exhausted = false;
        });

        info!(url = %self.url, "Gateway stream open");
    }

    fn on_transport_closed(&mut self) {
        self.sink = None;
        self.attempt_task = None;
        if let Some(task) = self.reader_task.take() {
            task.abort();
        }
        self.state = LinkState::Closed;

        if self.reconnect_attempts < self.link.max_reconnect_attempts {
            self.reconnect_attempts += 1;
            let delay = self.link.reconnect_delay();
            self.reconnect_at = Some(Instant::now() + delay);
            warn!(
                attempt = self.reconnect_attempts,
                max_attempts = self.link.max_reconnect_attempts,
                delay_ms = delay.as_millis() as u64,
                "Scheduling gateway reconnect"
            );
            let attempts = self.reconnect_attempts;
            self.publish_status(|s| {
                s.connected = false;
                s.reconnect_attempts = attempts;
            });
        } else {
            self.reconnect_at = None;
            error!(
                url = %self.url,
                attempts = self.reconnect_attempts,
                "Gateway unreachable, giving up until the next manual connect"
            );
            self.publish_status(|s| {
                s.connected = false;
                s.retries_exhausted = true;
            });
        }
    }

    fn publish_status(&self, update: impl FnOnce(&mut ConnectionStatus)) {
        let state = self.state;
        self.status_tx.send_modify(|s| {
            update(s);
            s.link = state;
        });
    }
}

// ============================================================================
// Child Tasks
// ============================================================================

/// Decode inbound messages until the stream ends.
async fn read_frames(mut source: WsSource, generation: u64, events: mpsc::Sender<LinkEvent>) {
    let reason = loop {
        let payload = match source.next().await {
            Some(Ok(Message::Text(text))) => text.into_bytes(),
            Some(Ok(Message::Binary(bytes))) => bytes,
            Some(Ok(Message::Ping(_) | Message::Pong(_) | Message::Frame(_))) => continue,
            Some(Ok(Message::Close(frame))) => {
                break frame.map_or_else(|| "close frame".to_string(), |f| format!("close frame: {}", f.reason));
            }
            Some(Err(e)) => break e.to_string(),
            None => break "stream ended".to_string(),
        };

        match decode_frame(&payload, Utc::now()) {
            Ok(snapshot) => {
                if events.send(LinkEvent::Snapshot { generation, snapshot }).await.is_err() {
                    return;
                }
            }
            Err(e) => {
                warn!(error = %e, bytes = payload.len(), "Dropping undecodable frame");
            }
        }
    };

    let _ = events.send(LinkEvent::Closed { generation, reason }).await;
}

/// Poll the gateway status endpoint forever. Failures are expected while the
/// gateway is down and are only traced.
async fn poll_health(gateway: Arc<dyn GatewayApi>, every: Duration, events: mpsc::Sender<LinkEvent>) {
    let mut ticker = tokio::time::interval(every);
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

    loop {
        ticker.tick().await;
        match gateway.fetch_status().await {
            Ok(health) => {
                if events.send(LinkEvent::Health(health)).await.is_err() {
                    break;
                }
            }
            Err(e) => trace!(error = %e, "Gateway status poll failed"),
        }
    }
}
