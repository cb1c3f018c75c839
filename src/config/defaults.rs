//! System-wide default constants.
//!
//! Centralises the magic numbers of the gateway link and the register map.
//! Grouped by subsystem for easy discovery.

// ============================================================================
// Gateway Endpoints
// ============================================================================

/// Default WebSocket endpoint of the PLC gateway.
pub const STREAM_URL: &str = "ws://127.0.0.1:8081/ws";

/// Default base URL of the gateway HTTP side-channel.
pub const HTTP_BASE_URL: &str = "http://127.0.0.1:8081";

/// Fallback write endpoint, used when the stream is not open.
pub const WRITE_PATH: &str = "/api/write";

/// Gateway status endpoint polled for connection counters.
pub const STATUS_PATH: &str = "/api/status";

/// HTTP client timeout for side-channel requests (seconds).
pub const HTTP_TIMEOUT_SECS: u64 = 5;

// ============================================================================
// Link Supervision
// ============================================================================

/// Automatic reconnect attempts before the client gives up.
pub const MAX_RECONNECT_ATTEMPTS: u32 = 5;

/// Fixed delay between a transport close and the next attempt (ms).
pub const RECONNECT_DELAY_MS: u64 = 3_000;

/// Upper bound on a single WebSocket handshake (ms).
pub const CONNECT_TIMEOUT_MS: u64 = 10_000;

/// Upper bound on a single outbound stream write (ms). A peer that stops
/// reading is treated as a closed transport once this elapses.
pub const WRITE_TIMEOUT_MS: u64 = 2_000;

/// Interval of the side-channel status poll (ms).
pub const HEALTH_POLL_INTERVAL_MS: u64 = 2_000;

/// Debounce between first subscription and the automatic connect (ms).
pub const AUTO_CONNECT_DELAY_MS: u64 = 100;

/// Capacity of the stream client command channel.
pub const COMMAND_CHANNEL_CAPACITY: usize = 64;

/// Grace period for the close handshake on explicit disconnect (ms).
pub const CLOSE_HANDSHAKE_TIMEOUT_MS: u64 = 500;

// ============================================================================
// Register Map
// ============================================================================

/// Number of words carrying status/animation bits (words 0-16).
pub const STATUS_BANK_WORDS: usize = 17;

/// Absolute address of the first alarm word.
pub const ALARM_BANK_BASE_WORD: u16 = 17;

/// Number of alarm words (words 17-47).
pub const ALARM_BANK_WORDS: usize = 31;

/// Absolute address of the first event word.
pub const EVENT_BANK_BASE_WORD: u16 = 48;

/// Number of event words (words 48-64).
pub const EVENT_BANK_WORDS: usize = 17;

/// Bits per PLC word.
pub const BITS_PER_WORD: usize = 16;

// ============================================================================
// Consumer API
// ============================================================================

/// Bind address of the local consumer API.
pub const SERVER_ADDR: &str = "0.0.0.0:8090";

/// Display color for equipment without category metadata.
pub const FALLBACK_CATEGORY_COLOR: &str = "gray";
