//! Gateway settings - every tunable of the telemetry link as TOML values
//!
//! Each struct implements `Default` with the values in [`super::defaults`],
//! so a missing file or a missing section behaves exactly like the stock
//! deployment.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;
use tracing::{info, warn};

use super::defaults;
use crate::types::{FaultKind, FaultSeverity};

/// Environment variable naming the settings file.
pub const CONFIG_ENV_VAR: &str = "ECLUSA_CONFIG";

/// Settings file looked up in the working directory.
pub const LOCAL_CONFIG_FILE: &str = "eclusa.toml";

// ============================================================================
// Top-Level Config
// ============================================================================

/// Root configuration of a telemetry deployment.
///
/// Load with `GatewayConfig::load()` which searches:
/// 1. `$ECLUSA_CONFIG` env var
/// 2. `./eclusa.toml`
/// 3. Built-in defaults
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GatewayConfig {
    /// Gateway endpoints
    #[serde(default)]
    pub gateway: GatewayEndpoints,

    /// Link supervision (reconnect, health poll, auto-connect)
    #[serde(default)]
    pub link: LinkConfig,

    /// Register map used by the fault detector
    #[serde(default)]
    pub detector: DetectorConfig,

    /// Local consumer API
    #[serde(default)]
    pub server: ServerConfig,

    /// Extra fault definitions merged over the built-in registry
    #[serde(default)]
    pub faults: Vec<FaultEntry>,
}

impl GatewayConfig {
    /// Load configuration using the standard search order:
    /// 1. `$ECLUSA_CONFIG` environment variable
    /// 2. `./eclusa.toml` in the current working directory
    /// 3. Built-in defaults
    pub fn load() -> Self {
        if let Ok(path) = std::env::var(CONFIG_ENV_VAR) {
            let p = PathBuf::from(&path);
            if p.exists() {
                match Self::load_from_file(&p) {
                    Ok(config) => {
                        info!(path = %p.display(), "Loaded gateway config from {}", CONFIG_ENV_VAR);
                        return config;
                    }
                    Err(e) => {
                        warn!(path = %p.display(), error = %e, "Failed to load config from {}, falling back", CONFIG_ENV_VAR);
                    }
                }
            } else {
                warn!(path = %path, "{} points to non-existent file, falling back", CONFIG_ENV_VAR);
            }
        }

        let local = PathBuf::from(LOCAL_CONFIG_FILE);
        if local.exists() {
            match Self::load_from_file(&local) {
                Ok(config) => {
                    info!("Loaded gateway config from ./{}", LOCAL_CONFIG_FILE);
                    return config;
                }
                Err(e) => {
                    warn!(error = %e, "Failed to load ./{}, using defaults", LOCAL_CONFIG_FILE);
                }
            }
        }

        info!("No {} found, using built-in defaults", LOCAL_CONFIG_FILE);
        Self::default()
    }

    /// Load from a specific TOML file path.
    pub fn load_from_file(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)
            .map_err(|e| ConfigError::Io(path.to_path_buf(), e))?;
        let config: Self = toml::from_str(&contents)
            .map_err(|e| ConfigError::Parse(path.to_path_buf(), e))?;
        config.validate()?;
        Ok(config)
    }

    /// Serialize the config back to TOML.
    pub fn to_toml(&self) -> Result<String, ConfigError> {
        toml::to_string_pretty(self).map_err(ConfigError::Serialize)
    }

    /// Check every value for range and consistency errors.
    ///
    /// All problems are collected so an operator sees the full list at once.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let mut errors = Vec::new();

        if !self.gateway.stream_url.starts_with("ws://")
            && !self.gateway.stream_url.starts_with("wss://")
        {
            errors.push(format!(
                "gateway.stream_url must be a ws:// or wss:// URL (got '{}')",
                self.gateway.stream_url
            ));
        }
        if !self.gateway.http_base_url.starts_with("http://")
            && !self.gateway.http_base_url.starts_with("https://")
        {
            errors.push(format!(
                "gateway.http_base_url must be an http:// or https:// URL (got '{}')",
                self.gateway.http_base_url
            ));
        }
        for (name, path) in [
            ("gateway.write_path", &self.gateway.write_path),
            ("gateway.status_path", &self.gateway.status_path),
        ] {
            if !path.starts_with('/') {
                errors.push(format!("{name} must start with '/' (got '{path}')"));
            }
        }
        if self.gateway.http_timeout_secs == 0 {
            errors.push("gateway.http_timeout_secs must be > 0".to_string());
        }

        if self.link.reconnect_delay_ms == 0 {
            errors.push("link.reconnect_delay_ms must be > 0".to_string());
        }
        if self.link.connect_timeout_ms == 0 {
            errors.push("link.connect_timeout_ms must be > 0".to_string());
        }
        if self.link.health_poll_interval_ms == 0 {
            errors.push("link.health_poll_interval_ms must be > 0".to_string());
        }
        if self.link.write_timeout_ms == 0 {
            errors.push("link.write_timeout_ms must be > 0".to_string());
        }

        let alarm_end = u32::from(self.detector.alarm_base_word) + defaults::ALARM_BANK_WORDS as u32;
        if u32::from(self.detector.event_base_word) < alarm_end
            && self.detector.event_base_word >= self.detector.alarm_base_word
        {
            errors.push(format!(
                "detector.event_base_word ({}) overlaps the alarm bank ({}..{})",
                self.detector.event_base_word, self.detector.alarm_base_word, alarm_end
            ));
        }

        for (i, entry) in self.faults.iter().enumerate() {
            if usize::from(entry.bit) >= defaults::BITS_PER_WORD {
                errors.push(format!(
                    "faults[{i}].bit must be 0..{} (got {})",
                    defaults::BITS_PER_WORD,
                    entry.bit
                ));
            }
            if entry.equipment.trim().is_empty() {
                errors.push(format!("faults[{i}].equipment must not be empty"));
            }
        }

        if self.server.addr.parse::<std::net::SocketAddr>().is_err() {
            errors.push(format!("server.addr is not a socket address (got '{}')", self.server.addr));
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(ConfigError::Validation(errors))
        }
    }
}

// ============================================================================
// Error Type
// ============================================================================

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Config I/O error ({}): {1}", .0.display())]
    Io(PathBuf, #[source] std::io::Error),

    #[error("Config parse error ({}): {1}", .0.display())]
    Parse(PathBuf, #[source] toml::de::Error),

    #[error("Config serialization error: {0}")]
    Serialize(#[from] toml::ser::Error),

    #[error("Config validation failed:\n  - {}", .0.join("\n  - "))]
    Validation(Vec<String>),
}

// ============================================================================
// Gateway Endpoints
// ============================================================================

/// Where the PLC gateway lives.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatewayEndpoints {
    /// WebSocket URL of the telemetry stream.
    #[serde(default = "default_stream_url")]
    pub stream_url: String,

    /// Base URL of the HTTP side-channel (fallback writes, status).
    #[serde(default = "default_http_base_url")]
    pub http_base_url: String,

    /// Path of the fallback write endpoint.
    #[serde(default = "default_write_path")]
    pub write_path: String,

    /// Path of the status endpoint.
    #[serde(default = "default_status_path")]
    pub status_path: String,

    /// Timeout for side-channel requests (seconds).
    #[serde(default = "default_http_timeout_secs")]
    pub http_timeout_secs: u64,
}

fn default_stream_url() -> String { defaults::STREAM_URL.to_string() }
fn default_http_base_url() -> String { defaults::HTTP_BASE_URL.to_string() }
fn default_write_path() -> String { defaults::WRITE_PATH.to_string() }
fn default_status_path() -> String { defaults::STATUS_PATH.to_string() }
fn default_http_timeout_secs() -> u64 { defaults::HTTP_TIMEOUT_SECS }

impl Default for GatewayEndpoints {
    fn default() -> Self {
        Self {
            stream_url: default_stream_url(),
            http_base_url: default_http_base_url(),
            write_path: default_write_path(),
            status_path: default_status_path(),
            http_timeout_secs: default_http_timeout_secs(),
        }
    }
}

impl GatewayEndpoints {
    /// Full URL of the fallback write endpoint.
    pub fn write_url(&self) -> String {
        format!("{}{}", self.http_base_url.trim_end_matches('/'), self.write_path)
    }

    /// Full URL of the status endpoint.
    pub fn status_url(&self) -> String {
        format!("{}{}", self.http_base_url.trim_end_matches('/'), self.status_path)
    }

    pub fn http_timeout(&self) -> Duration {
        Duration::from_secs(self.http_timeout_secs)
    }
}

// ============================================================================
// Link Supervision
// ============================================================================

/// Reconnect, health-poll and auto-connect tuning.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LinkConfig {
    /// Automatic reconnect attempts before giving up.
    #[serde(default = "default_max_reconnect_attempts")]
    pub max_reconnect_attempts: u32,

    /// Fixed delay before each automatic reconnect (ms).
    #[serde(default = "default_reconnect_delay_ms")]
    pub reconnect_delay_ms: u64,

    /// Upper bound on one WebSocket handshake (ms).
    #[serde(default = "default_connect_timeout_ms")]
    pub connect_timeout_ms: u64,

    /// Interval of the gateway status poll (ms).
    #[serde(default = "default_health_poll_interval_ms")]
    pub health_poll_interval_ms: u64,

    /// Debounce before the distributor connects on first use (ms).
    #[serde(default = "default_auto_connect_delay_ms")]
    pub auto_connect_delay_ms: u64,

    /// Upper bound on one outbound stream write; on expiry the stream is
    /// dropped and the command falls back to HTTP.
    #[serde(default = "default_write_timeout_ms")]
    pub write_timeout_ms: u64,

    /// Whether the distributor connects on its own after first use.
    #[serde(default = "default_auto_connect")]
    pub auto_connect: bool,
}

fn default_max_reconnect_attempts() -> u32 { defaults::MAX_RECONNECT_ATTEMPTS }
fn default_reconnect_delay_ms() -> u64 { defaults::RECONNECT_DELAY_MS }
fn default_connect_timeout_ms() -> u64 { defaults::CONNECT_TIMEOUT_MS }
fn default_health_poll_interval_ms() -> u64 { defaults::HEALTH_POLL_INTERVAL_MS }
fn default_auto_connect_delay_ms() -> u64 { defaults::AUTO_CONNECT_DELAY_MS }
fn default_write_timeout_ms() -> u64 { defaults::WRITE_TIMEOUT_MS }
fn default_auto_connect() -> bool { true }

impl Default for LinkConfig {
    fn default() -> Self {
        Self {
            max_reconnect_attempts: default_max_reconnect_attempts(),
            reconnect_delay_ms: default_reconnect_delay_ms(),
            connect_timeout_ms: default_connect_timeout_ms(),
            health_poll_interval_ms: default_health_poll_interval_ms(),
            auto_connect_delay_ms: default_auto_connect_delay_ms(),
            write_timeout_ms: default_write_timeout_ms(),
            auto_connect: default_auto_connect(),
        }
    }
}

impl LinkConfig {
    pub fn reconnect_delay(&self) -> Duration {
        Duration::from_millis(self.reconnect_delay_ms)
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }

    pub fn health_poll_interval(&self) -> Duration {
        Duration::from_millis(self.health_poll_interval_ms)
    }

    pub fn auto_connect_delay(&self) -> Duration {
        Duration::from_millis(self.auto_connect_delay_ms)
    }

    pub fn write_timeout(&self) -> Duration {
        Duration::from_millis(self.write_timeout_ms)
    }
}

// ============================================================================
// Detector
// ============================================================================

/// Absolute register addresses of the bit banks scanned for faults.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct DetectorConfig {
    /// Absolute word address of `alarm_bits[0]`.
    #[serde(default = "default_alarm_base_word")]
    pub alarm_base_word: u16,

    /// Absolute word address of `event_bits[0]`.
    #[serde(default = "default_event_base_word")]
    pub event_base_word: u16,
}

fn default_alarm_base_word() -> u16 { defaults::ALARM_BANK_BASE_WORD }
fn default_event_base_word() -> u16 { defaults::EVENT_BANK_BASE_WORD }

impl Default for DetectorConfig {
    fn default() -> Self {
        Self {
            alarm_base_word: default_alarm_base_word(),
            event_base_word: default_event_base_word(),
        }
    }
}

// ============================================================================
// Server
// ============================================================================

/// Local consumer API.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Bind address, e.g. `0.0.0.0:8090`.
    #[serde(default = "default_server_addr")]
    pub addr: String,
}

fn default_server_addr() -> String { defaults::SERVER_ADDR.to_string() }

impl Default for ServerConfig {
    fn default() -> Self {
        Self { addr: default_server_addr() }
    }
}

// ============================================================================
// Registry Extensions
// ============================================================================

/// One extra fault definition from `[[faults]]`.
///
/// An entry with the same `(kind, word, bit)` as a built-in definition
/// replaces it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FaultEntry {
    /// Bank the bit lives in (`AL` or `EV`).
    #[serde(default = "default_fault_kind")]
    pub kind: FaultKind,
    /// Absolute word address.
    pub word: u16,
    /// Bit within the word (0-15).
    pub bit: u8,
    /// Equipment category key, e.g. `AL_EnchimentoRG`.
    pub equipment: String,
    pub description: String,
    #[serde(default)]
    pub severity: FaultSeverity,
}

fn default_fault_kind() -> FaultKind { FaultKind::Alarm }

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_empty_toml_gives_defaults() {
        let config: GatewayConfig = toml::from_str("").expect("empty TOML should parse");
        assert_eq!(config.gateway.stream_url, defaults::STREAM_URL);
        assert_eq!(config.link.max_reconnect_attempts, 5);
        assert_eq!(config.link.reconnect_delay_ms, 3_000);
        assert_eq!(config.link.health_poll_interval_ms, 2_000);
        assert_eq!(config.detector.alarm_base_word, 17);
        assert_eq!(config.detector.event_base_word, 48);
        assert!(config.faults.is_empty());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_toml_keeps_other_defaults() {
        let toml_str = r#"
[gateway]
stream_url = "ws://10.0.0.5:8081/ws"

[link]
reconnect_delay_ms = 1500
"#;
        let config: GatewayConfig = toml::from_str(toml_str).expect("partial TOML should parse");
        assert_eq!(config.gateway.stream_url, "ws://10.0.0.5:8081/ws");
        assert_eq!(config.gateway.http_base_url, defaults::HTTP_BASE_URL);
        assert_eq!(config.link.reconnect_delay(), Duration::from_millis(1500));
        assert_eq!(config.link.max_reconnect_attempts, defaults::MAX_RECONNECT_ATTEMPTS);
    }

    #[test]
    fn test_endpoint_urls_join_cleanly() {
        let endpoints = GatewayEndpoints {
            http_base_url: "http://plc-gw:8081/".to_string(),
            ..Default::default()
        };
        assert_eq!(endpoints.write_url(), "http://plc-gw:8081/api/write");
        assert_eq!(endpoints.status_url(), "http://plc-gw:8081/api/status");
    }

    #[test]
    fn test_validation_collects_all_errors() {
        let mut config = GatewayConfig::default();
        config.gateway.stream_url = "http://wrong".to_string();
        config.link.reconnect_delay_ms = 0;
        config.server.addr = "not-an-addr".to_string();

        match config.validate() {
            Err(ConfigError::Validation(errors)) => {
                assert_eq!(errors.len(), 3, "got: {errors:?}");
                assert!(errors[0].contains("stream_url"));
            }
            other => panic!("expected validation error, got {other:?}"),
        }
    }

    #[test]
    fn test_overlapping_banks_rejected() {
        let mut config = GatewayConfig::default();
        config.detector.event_base_word = 30;
        assert!(matches!(config.validate(), Err(ConfigError::Validation(_))));
    }

    #[test]
    fn test_fault_entries_parse_and_validate() {
        let toml_str = r#"
[[faults]]
kind = "EV"
word = 48
bit = 3
equipment = "AL_EnchimentoRG"
description = "COMPORTA DIREITA ABERTA"
severity = "LOW"

[[faults]]
word = 19
bit = 16
equipment = "AL_EnchimentoRG"
description = "BIT INVALIDO"
"#;
        let config: GatewayConfig = toml::from_str(toml_str).expect("faults should parse");
        assert_eq!(config.faults.len(), 2);
        assert_eq!(config.faults[0].kind, FaultKind::Event);
        assert_eq!(config.faults[1].kind, FaultKind::Alarm);

        let Err(ConfigError::Validation(errors)) = config.validate() else {
            panic!("bit 16 must be rejected");
        };
        assert_eq!(errors.len(), 1);
        assert!(errors[0].contains("faults[1].bit"));
    }

    #[test]
    fn test_load_from_file_round_trip() {
        let mut file = tempfile::NamedTempFile::new().expect("temp file");
        write!(
            file,
            "[server]\naddr = \"127.0.0.1:9999\"\n\n[link]\nauto_connect = false\n"
        )
        .expect("write config");

        let config = GatewayConfig::load_from_file(file.path()).expect("config should load");
        assert_eq!(config.server.addr, "127.0.0.1:9999");
        assert!(!config.link.auto_connect);

        let rendered = config.to_toml().expect("serialize");
        let reparsed: GatewayConfig = toml::from_str(&rendered).expect("reparse");
        assert_eq!(reparsed.server.addr, "127.0.0.1:9999");
    }

    #[test]
    fn test_load_from_missing_file_is_io_error() {
        let err = GatewayConfig::load_from_file(Path::new("/nonexistent/eclusa.toml"))
            .expect_err("missing file must fail");
        assert!(matches!(err, ConfigError::Io(..)));
    }
}
