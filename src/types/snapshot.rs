//! Telemetry snapshot types

use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::config::defaults::{
    ALARM_BANK_WORDS, BITS_PER_WORD, EVENT_BANK_WORDS, STATUS_BANK_WORDS,
};

/// One PLC word expanded into its 16 bits, bit 0 first.
pub type BitWord = [bool; BITS_PER_WORD];

/// Timestamp layout stamped by the gateway (local time, no zone).
pub const CAPTURE_TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S%.3f";

/// Expand a raw word into bits: bit `i` is `(word >> i) & 1`.
pub fn expand_word(word: u16) -> BitWord {
    std::array::from_fn(|i| (word >> i) & 1 == 1)
}

/// Normalize a decoded bit word of arbitrary length to exactly 16 bits.
///
/// Longer words are truncated, shorter ones padded with `false`.
pub fn normalize_bits(bits: &[bool]) -> BitWord {
    std::array::from_fn(|i| bits.get(i).copied().unwrap_or(false))
}

// ============================================================================
// Bit Banks
// ============================================================================

/// The three expanded bit banks carried by every snapshot.
///
/// Index 0 of each bank is the first word of that bank, not absolute word 0.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BitBanks {
    /// Status/animation bits (words 0-16)
    pub status_bits: Vec<BitWord>,
    /// Alarm bits (words 17-47)
    pub alarm_bits: Vec<BitWord>,
    /// Event bits (words 48-64)
    pub event_bits: Vec<BitWord>,
}

impl BitBanks {
    /// Expand the banks from raw words, the way the gateway does when it
    /// builds `bit_data`. Words missing from the input are simply absent.
    pub fn from_words(words: &[u16]) -> Self {
        let alarm_start = STATUS_BANK_WORDS;
        let event_start = alarm_start + ALARM_BANK_WORDS;
        let event_end = event_start + EVENT_BANK_WORDS;

        let bank = |start: usize, end: usize| -> Vec<BitWord> {
            words
                .iter()
                .take(end)
                .skip(start)
                .map(|w| expand_word(*w))
                .collect()
        };

        Self {
            status_bits: bank(0, alarm_start),
            alarm_bits: bank(alarm_start, event_start),
            event_bits: bank(event_start, event_end),
        }
    }

    /// Whether any bit in any bank is set.
    pub fn any_set(&self) -> bool {
        self.status_bits
            .iter()
            .chain(&self.alarm_bits)
            .chain(&self.event_bits)
            .any(|w| w.iter().any(|b| *b))
    }
}

// ============================================================================
// Telemetry Snapshot
// ============================================================================

/// Point-in-time reading of the PLC, replaced wholesale on every frame.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TelemetrySnapshot {
    pub words: Vec<u16>,
    pub ints: Vec<i32>,
    pub reals: Vec<f64>,
    pub strings: Vec<String>,
    pub bit_data: BitBanks,
    /// Capture time as sent by the gateway
    pub timestamp: String,
    /// Wire size of the frame (diagnostic)
    pub byte_size: usize,
    /// Local receipt time
    pub received_at: DateTime<Utc>,
}

impl TelemetrySnapshot {
    /// Parse the gateway capture timestamp. `None` when the sender used an
    /// unexpected layout.
    pub fn captured_at(&self) -> Option<NaiveDateTime> {
        NaiveDateTime::parse_from_str(&self.timestamp, CAPTURE_TIMESTAMP_FORMAT).ok()
    }

    pub fn alarm_bits(&self) -> &[BitWord] {
        &self.bit_data.alarm_bits
    }

    pub fn event_bits(&self) -> &[BitWord] {
        &self.bit_data.event_bits
    }

    pub fn status_bits(&self) -> &[BitWord] {
        &self.bit_data.status_bits
    }
}
