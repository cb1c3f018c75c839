//! Shared fixtures for integration tests: a loopback gateway (WebSocket
//! accept side) and a scripted HTTP side-channel.

#![allow(dead_code)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use futures::{SinkExt, StreamExt};
use serde_json::json;
use tokio::net::TcpListener;
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::Message;

use eclusa_telemetry::config::LinkConfig;
use eclusa_telemetry::types::GatewayHealth;
use eclusa_telemetry::{ConnectionStatus, GatewayApi, GatewayError, WriteCommand};

pub const WAIT: Duration = Duration::from_secs(5);

/// Link tuning with short delays so reconnect scenarios finish quickly.
pub fn fast_link() -> LinkConfig {
    LinkConfig {
        max_reconnect_attempts: 5,
        reconnect_delay_ms: 20,
        connect_timeout_ms: 1_000,
        health_poll_interval_ms: 50,
        auto_connect_delay_ms: 20,
        write_timeout_ms: 200,
        auto_connect: false,
    }
}

// ============================================================================
// Frames
// ============================================================================

/// Gateway frame with the given alarm-bank bits set (offsets, not absolute
/// word addresses).
pub fn frame_with_alarms(set: &[(usize, usize)], timestamp: &str) -> String {
    let mut alarm_bits = vec![vec![false; 16]; 31];
    for &(word, bit) in set {
        alarm_bits[word][bit] = true;
    }
    json!({
        "words": vec![0u16; 65],
        "ints": [0, 0],
        "reals": [0.0],
        "strings": ["", ""],
        "bit_data": {
            "status_bits": vec![vec![false; 16]; 17],
            "alarm_bits": alarm_bits,
            "event_bits": vec![vec![false; 16]; 17],
        },
        "counts": {"word_count": 65},
        "timestamp": timestamp,
        "bytes_size": 512
    })
    .to_string()
}

// ============================================================================
// Loopback Gateway
// ============================================================================

/// What the fake gateway does with each accepted connection.
#[derive(Clone)]
pub enum Behaviour {
    /// Complete the handshake, push `frames`, then stay open echoing inbound
    /// text messages into `received`.
    Stream { frames: Vec<String> },
    /// Push `frames` then send a close frame.
    StreamThenClose { frames: Vec<String> },
    /// Accept TCP and drop it before the WebSocket handshake.
    RejectHandshake,
    /// Complete the handshake, then never read again (half-open peer).
    Silent,
}

pub struct FakeGateway {
    pub url: String,
    pub accepted: Arc<AtomicUsize>,
    pub received: mpsc::UnboundedReceiver<String>,
}

impl FakeGateway {
    pub fn accepted(&self) -> usize {
        self.accepted.load(Ordering::SeqCst)
    }
}

pub async fn spawn_gateway(behaviour: Behaviour) -> FakeGateway {
    let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind loopback");
    let addr = listener.local_addr().expect("local addr");
    let accepted = Arc::new(AtomicUsize::new(0));
    let (received_tx, received) = mpsc::unbounded_channel();

    let counter = Arc::clone(&accepted);
    tokio::spawn(async move {
        loop {
            let Ok((tcp, _)) = listener.accept().await else { break };
            counter.fetch_add(1, Ordering::SeqCst);

            let behaviour = behaviour.clone();
            let received_tx = received_tx.clone();
            tokio::spawn(async move {
                let close_after = matches!(behaviour, Behaviour::StreamThenClose { .. });
                let frames = match behaviour {
                    Behaviour::RejectHandshake => {
                        drop(tcp);
                        return;
                    }
                    Behaviour::Silent => {
                        let Ok(_ws) = tokio_tungstenite::accept_async(tcp).await else { return };
                        std::future::pending::<()>().await;
                        return;
                    }
                    Behaviour::Stream { frames } | Behaviour::StreamThenClose { frames } => frames,
                };

                let Ok(ws) = tokio_tungstenite::accept_async(tcp).await else { return };
                let (mut sink, mut source) = ws.split();
                for frame in frames {
                    if sink.send(Message::Text(frame)).await.is_err() {
                        return;
                    }
                }
                if close_after {
                    let _ = sink.send(Message::Close(None)).await;
                    return;
                }
                while let Some(Ok(msg)) = source.next().await {
                    if let Message::Text(text) = msg {
                        let _ = received_tx.send(text);
                    }
                }
            });
        }
    });

    FakeGateway { url: format!("ws://{addr}/ws"), accepted, received }
}

/// A loopback address nothing listens on.
pub async fn unused_url() -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind loopback");
    let addr = listener.local_addr().expect("local addr");
    drop(listener);
    format!("ws://{addr}/ws")
}

// ============================================================================
// Scripted HTTP Side-channel
// ============================================================================

pub struct ScriptedGateway {
    pub writes: Mutex<Vec<WriteCommand>>,
    pub fail_writes: bool,
    pub health: Option<GatewayHealth>,
}

impl ScriptedGateway {
    pub fn accepting() -> Arc<Self> {
        Arc::new(Self { writes: Mutex::new(Vec::new()), fail_writes: false, health: None })
    }

    pub fn failing() -> Arc<Self> {
        Arc::new(Self { writes: Mutex::new(Vec::new()), fail_writes: true, health: None })
    }

    pub fn reporting(health: GatewayHealth) -> Arc<Self> {
        Arc::new(Self { writes: Mutex::new(Vec::new()), fail_writes: false, health: Some(health) })
    }

    pub fn writes(&self) -> Vec<WriteCommand> {
        self.writes.lock().expect("writes lock").clone()
    }
}

#[async_trait]
impl GatewayApi for ScriptedGateway {
    async fn post_write(&self, command: &WriteCommand) -> Result<String, GatewayError> {
        self.writes.lock().expect("writes lock").push(command.clone());
        if self.fail_writes {
            Err(GatewayError::ServerError(reqwest::StatusCode::SERVICE_UNAVAILABLE))
        } else {
            Ok("Comando enviado".to_string())
        }
    }

    async fn fetch_status(&self) -> Result<GatewayHealth, GatewayError> {
        self.health
            .ok_or(GatewayError::ServerError(reqwest::StatusCode::NOT_FOUND))
    }
}

// ============================================================================
// Waiting
// ============================================================================

/// Wait until the status satisfies `pred`, failing the test after [`WAIT`].
pub async fn wait_for_status(
    mut rx: tokio::sync::watch::Receiver<ConnectionStatus>,
    pred: impl Fn(&ConnectionStatus) -> bool,
) -> ConnectionStatus {
    tokio::time::timeout(WAIT, async {
        loop {
            {
                let status = rx.borrow_and_update();
                if pred(&*status) {
                    return status.clone();
                }
            }
            rx.changed().await.expect("stream client stopped");
        }
    })
    .await
    .expect("timed out waiting for link status")
}
