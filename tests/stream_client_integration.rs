//! Stream Client Integration Tests
//!
//! Drives the client against a loopback gateway (real WebSocket handshake)
//! and a scripted HTTP side-channel.

mod common;

use std::sync::Arc;
use std::time::Duration;

use common::{
    fast_link, frame_with_alarms, spawn_gateway, unused_url, wait_for_status, Behaviour,
    ScriptedGateway, WAIT,
};
use eclusa_telemetry::types::GatewayHealth;
use eclusa_telemetry::{
    CommandError, CommandRoute, GatewayApi, LinkState, StreamClient, StreamHandle, WriteCommand,
};

fn start_client(url: &str, gateway: Arc<ScriptedGateway>) -> StreamHandle {
    let gateway: Arc<dyn GatewayApi> = gateway;
    let (client, handle) = StreamClient::new(url, fast_link(), gateway);
    tokio::spawn(client.run());
    handle
}

#[tokio::test]
async fn test_connect_publishes_snapshots() {
    let gateway = spawn_gateway(Behaviour::Stream {
        frames: vec![frame_with_alarms(&[(0, 8)], "2025-05-02 10:15:30.125")],
    })
    .await;
    let handle = start_client(&gateway.url, ScriptedGateway::accepting());
    assert!(handle.snapshot().is_none(), "no snapshot before the first frame");

    handle.connect().await.expect("connect");
    let status = wait_for_status(handle.watch_status(), |s| s.last_update.is_some()).await;

    assert!(status.connected);
    assert_eq!(status.link, LinkState::Open);
    let snapshot = handle.snapshot().expect("snapshot published");
    assert_eq!(snapshot.timestamp, "2025-05-02 10:15:30.125");
    assert!(snapshot.alarm_bits()[0][8]);
    assert_eq!(snapshot.byte_size, 512);

    handle.shutdown().await;
}

#[tokio::test]
async fn test_connect_is_idempotent() {
    let gateway = spawn_gateway(Behaviour::Stream { frames: vec![] }).await;
    let handle = start_client(&gateway.url, ScriptedGateway::accepting());

    handle.connect().await.expect("first connect");
    handle.connect().await.expect("second connect while connecting");
    wait_for_status(handle.watch_status(), |s| s.connected).await;
    handle.connect().await.expect("third connect while open");

    tokio::time::sleep(Duration::from_millis(100)).await;
    assert_eq!(gateway.accepted(), 1, "only one transport may be opened");

    handle.shutdown().await;
}

#[tokio::test]
async fn test_malformed_frame_keeps_last_good_snapshot() {
    let gateway = spawn_gateway(Behaviour::Stream {
        frames: vec![
            frame_with_alarms(&[], "2025-05-02 10:00:00.000"),
            "{\"words\": [\"not a word\"]".to_string(),
            "[]".to_string(),
        ],
    })
    .await;
    let handle = start_client(&gateway.url, ScriptedGateway::accepting());

    handle.connect().await.expect("connect");
    wait_for_status(handle.watch_status(), |s| s.last_update.is_some()).await;
    tokio::time::sleep(Duration::from_millis(100)).await;

    let snapshot = handle.snapshot().expect("good snapshot retained");
    assert_eq!(snapshot.timestamp, "2025-05-02 10:00:00.000");
    let status = handle.status();
    assert!(status.connected, "bad frames must not drop the link");

    handle.shutdown().await;
}

#[tokio::test]
async fn test_gives_up_after_max_attempts() {
    let gateway = spawn_gateway(Behaviour::RejectHandshake).await;
    let handle = start_client(&gateway.url, ScriptedGateway::accepting());

    handle.connect().await.expect("connect");
    let status = wait_for_status(handle.watch_status(), |s| s.retries_exhausted).await;

    assert!(!status.connected);
    assert_eq!(status.link, LinkState::Closed);
    assert_eq!(status.reconnect_attempts, 5);
    // One manual attempt plus five automatic ones
    assert_eq!(gateway.accepted(), 6);

    tokio::time::sleep(Duration::from_millis(100)).await;
    assert_eq!(gateway.accepted(), 6, "no attempts after giving up");

    // A manual connect starts the budget over
    handle.connect().await.expect("manual reconnect");
    assert!(!handle.status().retries_exhausted);
    wait_for_status(handle.watch_status(), |s| s.retries_exhausted).await;
    assert_eq!(gateway.accepted(), 12);

    handle.shutdown().await;
}

#[tokio::test]
async fn test_unreachable_gateway_gives_up() {
    let url = unused_url().await;
    let handle = start_client(&url, ScriptedGateway::accepting());

    handle.connect().await.expect("connect");
    let status = wait_for_status(handle.watch_status(), |s| s.retries_exhausted).await;
    assert!(!status.connected);
    assert!(status.last_update.is_none());

    handle.shutdown().await;
}

#[tokio::test]
async fn test_reconnects_after_server_close() {
    let gateway = spawn_gateway(Behaviour::StreamThenClose {
        frames: vec![frame_with_alarms(&[], "2025-05-02 11:00:00.000")],
    })
    .await;
    let handle = start_client(&gateway.url, ScriptedGateway::accepting());

    handle.connect().await.expect("connect");
    tokio::time::timeout(WAIT, async {
        while gateway.accepted() < 3 {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .expect("client should keep reconnecting after clean opens");

    // Each successful open resets the budget
    assert!(!handle.status().retries_exhausted);
    assert!(handle.snapshot().is_some());

    handle.disconnect().await.expect("disconnect");
    handle.shutdown().await;
}

#[tokio::test]
async fn test_disconnect_cancels_pending_reconnect() {
    let gateway = spawn_gateway(Behaviour::RejectHandshake).await;
    let gateway_api: Arc<dyn GatewayApi> = ScriptedGateway::accepting();
    let mut link = fast_link();
    link.reconnect_delay_ms = 300;
    let (client, handle) = StreamClient::new(gateway.url.clone(), link, gateway_api);
    tokio::spawn(client.run());

    handle.connect().await.expect("connect");
    wait_for_status(handle.watch_status(), |s| s.reconnect_attempts == 1).await;
    handle.disconnect().await.expect("disconnect");

    let status = handle.status();
    assert_eq!(status.link, LinkState::Idle);
    assert!(!status.connected);

    tokio::time::sleep(Duration::from_millis(500)).await;
    assert_eq!(gateway.accepted(), 1, "reconnect must not fire after disconnect");
    assert_eq!(handle.status().link, LinkState::Idle);

    handle.shutdown().await;
}

#[tokio::test]
async fn test_command_goes_over_open_stream() {
    let mut gateway = spawn_gateway(Behaviour::Stream { frames: vec![] }).await;
    let fallback = ScriptedGateway::accepting();
    let handle = start_client(&gateway.url, Arc::clone(&fallback));

    handle.connect().await.expect("connect");
    wait_for_status(handle.watch_status(), |s| s.connected).await;

    let command = WriteCommand::new().word(0, 0x0002).int(4, -12);
    let receipt = handle.send_command(&command).await.expect("command delivered");
    assert_eq!(receipt.via, CommandRoute::Stream);

    let received = tokio::time::timeout(WAIT, gateway.received.recv())
        .await
        .expect("gateway should receive the command")
        .expect("gateway channel open");
    let decoded: WriteCommand = serde_json::from_str(&received).expect("command JSON");
    assert_eq!(decoded, command);
    assert!(fallback.writes().is_empty(), "fallback unused while stream is open");

    handle.shutdown().await;
}

#[tokio::test]
async fn test_command_falls_back_when_not_connected() {
    let fallback = ScriptedGateway::accepting();
    let handle = start_client(&unused_url().await, Arc::clone(&fallback));

    let command = WriteCommand::new().real(2, 42.5).string(0, "MANUAL");
    let receipt = handle.send_command(&command).await.expect("fallback delivery");

    assert_eq!(receipt.via, CommandRoute::Fallback);
    assert_eq!(receipt.message.as_deref(), Some("Comando enviado"));
    assert_eq!(fallback.writes(), vec![command]);
    assert_eq!(handle.status().link, LinkState::Idle);

    handle.shutdown().await;
}

#[tokio::test]
async fn test_command_error_when_both_transports_fail() {
    let fallback = ScriptedGateway::failing();
    let handle = start_client(&unused_url().await, Arc::clone(&fallback));

    let err = handle
        .send_command(&WriteCommand::new().word(1, 1))
        .await
        .expect_err("both transports down");
    assert!(matches!(err, CommandError::Undelivered { .. }), "got {err:?}");
    assert_eq!(fallback.writes().len(), 1);

    let status = handle.status();
    assert_eq!(status.link, LinkState::Idle, "command failures leave the link alone");
    assert!(!status.retries_exhausted);

    handle.shutdown().await;
}

#[tokio::test]
async fn test_health_poll_merges_gateway_counters() {
    let gateway = ScriptedGateway::reporting(GatewayHealth { plc_connections: 1, websocket_clients: 3 });
    let handle = start_client(&unused_url().await, gateway);

    let status = wait_for_status(handle.watch_status(), |s| s.plc_connections == 1).await;
    assert_eq!(status.websocket_clients, 3);
    assert!(!status.connected, "counters never imply an open stream");

    handle.shutdown().await;
}

#[tokio::test]
async fn test_stalled_stream_write_falls_back_and_frees_link() {
    let gateway = spawn_gateway(Behaviour::Silent).await;
    let fallback = ScriptedGateway::accepting();
    let handle = start_client(&gateway.url, Arc::clone(&fallback));

    handle.connect().await.expect("connect");
    wait_for_status(handle.watch_status(), |s| s.connected).await;

    // Large commands fill the socket buffers of a peer that never reads
    let bulk = "X".repeat(1 << 20);
    let receipt = tokio::time::timeout(WAIT, async {
        for i in 0..64 {
            let command = WriteCommand::new().string(i, bulk.clone());
            let receipt = handle.send_command(&command).await.expect("command delivered");
            if receipt.via == CommandRoute::Fallback {
                return receipt;
            }
        }
        panic!("stream writes never stalled");
    })
    .await
    .expect("a stalled write must not block the caller");

    assert_eq!(receipt.message.as_deref(), Some("Comando enviado"));
    assert_eq!(fallback.writes().len(), 1, "only the stalled command used the fallback");

    // The actor is still responsive
    tokio::time::timeout(Duration::from_secs(1), handle.disconnect())
        .await
        .expect("disconnect must return promptly")
        .expect("disconnect");
    assert_eq!(handle.status().link, LinkState::Idle);
    tokio::time::timeout(Duration::from_secs(1), handle.connect())
        .await
        .expect("connect must return promptly")
        .expect("connect");

    handle.shutdown().await;
}

#[tokio::test]
async fn test_stalled_write_schedules_reconnect() {
    let gateway = spawn_gateway(Behaviour::Silent).await;
    let handle = start_client(&gateway.url, ScriptedGateway::accepting());

    handle.connect().await.expect("connect");
    wait_for_status(handle.watch_status(), |s| s.connected).await;

    let bulk = "X".repeat(1 << 20);
    for i in 0..64 {
        let receipt = handle
            .send_command(&WriteCommand::new().string(i, bulk.clone()))
            .await
            .expect("command delivered");
        if receipt.via == CommandRoute::Fallback {
            break;
        }
    }

    tokio::time::timeout(WAIT, async {
        while gateway.accepted() < 2 {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .expect("dropped stream should be re-established");
    assert!(!handle.status().retries_exhausted);

    handle.shutdown().await;
}

#[tokio::test]
async fn test_secure_url_reaches_tls_handshake() {
    // The peer drops TCP, so the TLS handshake fails; what matters is that
    // each attempt actually dials out over wss.
    let gateway = spawn_gateway(Behaviour::RejectHandshake).await;
    let url = gateway.url.replacen("ws://", "wss://", 1);
    let handle = start_client(&url, ScriptedGateway::accepting());

    handle.connect().await.expect("connect");
    wait_for_status(handle.watch_status(), |s| s.retries_exhausted).await;
    assert_eq!(gateway.accepted(), 6, "every wss attempt opens a TCP connection");

    handle.shutdown().await;
}
