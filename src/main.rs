//! eclusa-telemetry - PLC gateway link and fault monitor for the lock HMI
//!
//! # Usage
//!
//! ```bash
//! # Run against the local gateway with built-in defaults
//! cargo run --release
//!
//! # Point at another gateway and expose the consumer API elsewhere
//! ./eclusa-telemetry --stream-url ws://10.0.0.5:8081/ws --http-base http://10.0.0.5:8081 --addr 127.0.0.1:9000
//!
//! # Evaluate a captured frame without connecting
//! ./eclusa-telemetry detect captured_frame.json
//! ```
//!
//! # Environment Variables
//!
//! - `ECLUSA_CONFIG`: Path to the TOML settings file (default: ./eclusa.toml)
//! - `ECLUSA_CORS_ORIGINS`: Comma-separated origins allowed by the consumer API
//! - `RUST_LOG`: Logging level (default: info)

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use axum::Router;
use chrono::Utc;
use clap::Parser;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

use eclusa_telemetry::acquisition::decode_frame;
use eclusa_telemetry::api::{create_app, ConsumerState};
use eclusa_telemetry::{
    FaultDetector, FaultMonitor, FaultReport, GatewayApi, GatewayConfig, HttpGateway,
    SignalRegistry, TelemetryDistributor,
};

// ============================================================================
// CLI Arguments
// ============================================================================

#[derive(Parser, Debug)]
#[command(name = "eclusa-telemetry")]
#[command(about = "PLC telemetry ingestion and fault detection for the lock HMI")]
#[command(version)]
struct CliArgs {
    /// Path to a TOML settings file (overrides ECLUSA_CONFIG / ./eclusa.toml)
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Gateway WebSocket URL (e.g. ws://10.0.0.5:8081/ws)
    #[arg(long, env = "ECLUSA_STREAM_URL")]
    stream_url: Option<String>,

    /// Gateway HTTP base URL for fallback writes and status polling
    #[arg(long, env = "ECLUSA_HTTP_BASE")]
    http_base: Option<String>,

    /// Override the consumer API address (default: "0.0.0.0:8090")
    #[arg(short, long)]
    addr: Option<String>,

    /// Log output format
    #[arg(long, value_enum, default_value_t = LogFormat::Text)]
    log_format: LogFormat,

    #[command(subcommand)]
    command: Option<SubCommand>,
}

#[derive(clap::ValueEnum, Clone, Copy, Debug)]
enum LogFormat {
    Text,
    Json,
}

#[derive(clap::Subcommand, Debug)]
enum SubCommand {
    /// Run the fault detector over a captured gateway frame and print the result
    Detect {
        /// Path to a JSON frame as sent by the gateway
        frame: PathBuf,
        /// Print the full report as JSON
        #[arg(long)]
        json: bool,
    },
}

// ============================================================================
// Task Names for Supervisor Logging
// ============================================================================

#[derive(Debug, Clone, Copy)]
enum TaskName {
    HttpServer,
    FaultMonitor,
}

impl std::fmt::Display for TaskName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TaskName::HttpServer => write!(f, "HttpServer"),
            TaskName::FaultMonitor => write!(f, "FaultMonitor"),
        }
    }
}

// ============================================================================
// Setup
// ============================================================================

fn init_tracing(format: LogFormat) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));
    let builder = tracing_subscriber::fmt().with_env_filter(filter).with_target(false);

    match format {
        LogFormat::Text => builder.init(),
        LogFormat::Json => builder.json().init(),
    }
}

/// Load settings and apply CLI overrides.
fn load_config(args: &CliArgs) -> Result<GatewayConfig> {
    let mut config = match &args.config {
        Some(path) => GatewayConfig::load_from_file(path)
            .with_context(|| format!("Failed to load config from {}", path.display()))?,
        None => GatewayConfig::load(),
    };

    if let Some(url) = &args.stream_url {
        config.gateway.stream_url = url.clone();
    }
    if let Some(base) = &args.http_base {
        config.gateway.http_base_url = base.clone();
    }
    if let Some(addr) = &args.addr {
        config.server.addr = addr.clone();
    }

    config.validate().context("Invalid configuration after CLI overrides")?;
    Ok(config)
}

// ============================================================================
// Supervisor
// ============================================================================

/// Spawn the HTTP server task into the JoinSet.
fn spawn_http_server(
    task_set: &mut JoinSet<Result<TaskName>>,
    listener: tokio::net::TcpListener,
    app: Router,
    cancel_token: CancellationToken,
) {
    task_set.spawn(async move {
        info!("[HttpServer] Task starting");

        let result = axum::serve(listener, app)
            .with_graceful_shutdown(async move {
                cancel_token.cancelled().await;
                info!("[HttpServer] Received shutdown signal");
            })
            .await;

        match result {
            Ok(()) => {
                info!("[HttpServer] Graceful shutdown complete");
                Ok(TaskName::HttpServer)
            }
            Err(e) => {
                error!("[HttpServer] Server error: {}", e);
                Err(anyhow::anyhow!("HTTP server error: {}", e))
            }
        }
    });
}

async fn run_supervisor(
    task_set: &mut JoinSet<Result<TaskName>>,
    cancel_token: CancellationToken,
) -> Result<()> {
    info!("Supervisor: all tasks spawned, monitoring...");

    loop {
        tokio::select! {
            () = cancel_token.cancelled() => {
                info!("Supervisor: shutdown signal received");
                break;
            }
            result = task_set.join_next() => {
                match result {
                    Some(Ok(Ok(task_name))) => {
                        info!("Supervisor: task {} completed normally", task_name);
                    }
                    Some(Ok(Err(e))) => {
                        error!("Supervisor: task failed with error: {}", e);
                        cancel_token.cancel();
                        return Err(e);
                    }
                    Some(Err(e)) => {
                        error!("Supervisor: task panicked: {}", e);
                        cancel_token.cancel();
                        return Err(anyhow::anyhow!("Task panicked: {}", e));
                    }
                    None => {
                        info!("Supervisor: all tasks completed");
                        break;
                    }
                }
            }
        }
    }

    // Let the remaining tasks observe cancellation and finish
    while let Some(result) = task_set.join_next().await {
        if let Ok(Ok(task_name)) = result {
            info!("Supervisor: task {} stopped", task_name);
        }
    }

    Ok(())
}

// ============================================================================
// Modes
// ============================================================================

/// Offline: decode one frame and print the faults it carries.
fn run_detect(config: &GatewayConfig, frame: &Path, json: bool) -> Result<()> {
    let payload = std::fs::read(frame)
        .with_context(|| format!("Failed to read frame {}", frame.display()))?;
    let snapshot = decode_frame(&payload, Utc::now())
        .with_context(|| format!("Failed to decode frame {}", frame.display()))?;

    let registry = Arc::new(SignalRegistry::with_overrides(&config.faults));
    let report = FaultDetector::new(registry, config.detector).evaluate(&snapshot);

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        print_report(&snapshot.timestamp, &report);
    }
    Ok(())
}

fn print_report(timestamp: &str, report: &FaultReport) {
    println!("Frame {timestamp}: {} active fault(s), {} critical", report.count, report.critical.len());
    for fault in &report.faults {
        let d = &fault.definition;
        println!(
            "  [{:<8}] {} {:>2}.{:<2} {:<18} {}",
            d.severity, d.kind, d.word_index, d.bit_index, d.equipment, d.description
        );
    }
    for (equipment, stats) in &report.by_category {
        println!("  {equipment}: {} fault(s), max {}", stats.count, stats.severity);
    }
}

/// Online: keep the gateway link, monitor faults, serve the consumer API.
async fn run_service(config: GatewayConfig, cancel_token: CancellationToken) -> Result<()> {
    let registry = Arc::new(SignalRegistry::with_overrides(&config.faults));
    info!(definitions = registry.len(), "Signal registry loaded");

    let gateway: Arc<dyn GatewayApi> =
        Arc::new(HttpGateway::new(&config.gateway).context("Failed to build gateway HTTP client")?);
    let distributor = TelemetryDistributor::start(&config, gateway);

    let listener = tokio::net::TcpListener::bind(&config.server.addr)
        .await
        .with_context(|| format!("Failed to bind consumer API to {}", config.server.addr))?;
    info!(addr = %config.server.addr, "Consumer API listening");

    let mut task_set: JoinSet<Result<TaskName>> = JoinSet::new();

    let (monitor, faults) = FaultMonitor::new(
        FaultDetector::new(Arc::clone(&registry), config.detector),
        distributor.subscribe(),
        cancel_token.clone(),
    );
    task_set.spawn(async move {
        monitor.run().await;
        Ok(TaskName::FaultMonitor)
    });

    let app = create_app(ConsumerState {
        distributor: Arc::clone(&distributor),
        faults,
        registry,
    });
    spawn_http_server(&mut task_set, listener, app, cancel_token.clone());

    let outcome = run_supervisor(&mut task_set, cancel_token).await;
    distributor.shutdown().await;
    outcome
}

// ============================================================================
// Main Entry Point
// ============================================================================

#[tokio::main]
async fn main() -> Result<()> {
    let args = CliArgs::parse();
    init_tracing(args.log_format);

    let config = load_config(&args)?;

    if let Some(SubCommand::Detect { frame, json }) = &args.command {
        return run_detect(&config, frame, *json);
    }

    info!(
        stream = %config.gateway.stream_url,
        http = %config.gateway.http_base_url,
        "eclusa-telemetry starting"
    );

    // Graceful shutdown via Ctrl+C
    let cancel_token = CancellationToken::new();
    let shutdown_token = cancel_token.clone();
    tokio::spawn(async move {
        tokio::signal::ctrl_c().await.ok();
        info!("Received Ctrl+C, initiating shutdown...");
        shutdown_token.cancel();
    });

    run_service(config, cancel_token).await?;

    info!("eclusa-telemetry shutdown complete");
    Ok(())
}
