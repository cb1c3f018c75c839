//! Gateway Frame Decoder
//!
//! Turns one inbound stream message into a [`TelemetrySnapshot`]. The
//! gateway sends JSON objects of the form:
//!
//! ```text
//! {
//!   "words":   [u16, ...],          // 65 words
//!   "ints":    [i16, ...],
//!   "reals":   [f32, ...],
//!   "strings": [str, ...],
//!   "bit_data": {
//!     "status_bits": [[bool; 16], ...],   // words 0-16
//!     "alarm_bits":  [[bool; 16], ...],   // words 17-47
//!     "event_bits":  [[bool; 16], ...]    // words 48-64
//!   },
//!   "timestamp":  "YYYY-MM-DD HH:MM:SS.mmm",
//!   "bytes_size": usize
//! }
//! ```
//!
//! Unknown fields (`counts`, ...) are ignored. `null` arrays decode as empty,
//! a `null` word inside a bit bank decodes as sixteen `false` bits so word
//! offsets stay aligned.

use chrono::{DateTime, Utc};
use serde::Deserialize;
use thiserror::Error;

use crate::types::{normalize_bits, BitBanks, BitWord, TelemetrySnapshot};

/// Frame decoding errors. A failed frame is dropped; the previous snapshot
/// stays current.
#[derive(Debug, Error)]
pub enum FrameError {
    #[error("Malformed frame: {0}")]
    Malformed(#[from] serde_json::Error),

    #[error("Frame is not a JSON object")]
    NotAnObject,

    #[error("Frame carries no telemetry fields")]
    NotTelemetry,
}

#[derive(Debug, Deserialize)]
struct RawFrame {
    words: Option<Vec<u16>>,
    ints: Option<Vec<i32>>,
    reals: Option<Vec<f64>>,
    strings: Option<Vec<String>>,
    bit_data: Option<RawBitData>,
    timestamp: Option<String>,
    bytes_size: Option<usize>,
}

impl RawFrame {
    fn has_telemetry(&self) -> bool {
        self.words.is_some()
            || self.ints.is_some()
            || self.reals.is_some()
            || self.strings.is_some()
            || self.bit_data.is_some()
    }
}

#[derive(Debug, Deserialize)]
struct RawBitData {
    status_bits: Option<Vec<Option<Vec<bool>>>>,
    alarm_bits: Option<Vec<Option<Vec<bool>>>>,
    event_bits: Option<Vec<Option<Vec<bool>>>>,
}

fn normalize_bank(bank: Option<Vec<Option<Vec<bool>>>>) -> Vec<BitWord> {
    bank.unwrap_or_default()
        .iter()
        .map(|word| word.as_deref().map_or([false; 16], normalize_bits))
        .collect()
}

/// Decode one frame received at `received_at`.
///
/// Text and binary messages share this path; `payload` is the raw message
/// body and its length is the fallback for a missing `bytes_size`.
pub fn decode_frame(payload: &[u8], received_at: DateTime<Utc>) -> Result<TelemetrySnapshot, FrameError> {
    let value: serde_json::Value = serde_json::from_slice(payload)?;
    if !value.is_object() {
        return Err(FrameError::NotAnObject);
    }

    let raw: RawFrame = serde_json::from_value(value)?;
    if !raw.has_telemetry() {
        return Err(FrameError::NotTelemetry);
    }

    let words = raw.words.unwrap_or_default();
    let bit_data = match raw.bit_data {
        Some(bits) => BitBanks {
            status_bits: normalize_bank(bits.status_bits),
            alarm_bits: normalize_bank(bits.alarm_bits),
            event_bits: normalize_bank(bits.event_bits),
        },
        None => BitBanks::from_words(&words),
    };

    Ok(TelemetrySnapshot {
        words,
        ints: raw.ints.unwrap_or_default(),
        reals: raw.reals.unwrap_or_default(),
        strings: raw.strings.unwrap_or_default(),
        bit_data,
        timestamp: raw.timestamp.unwrap_or_default(),
        byte_size: raw.bytes_size.unwrap_or(payload.len()),
        received_at,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn decode(value: &serde_json::Value) -> Result<TelemetrySnapshot, FrameError> {
        decode_frame(value.to_string().as_bytes(), Utc::now())
    }

    #[test]
    fn test_decode_full_frame() {
        let mut alarm_word = vec![false; 16];
        alarm_word[8] = true;
        let frame = json!({
            "words": [1, 2, 3],
            "ints": [-5, 10],
            "reals": [1.5],
            "strings": ["ECLUSA"],
            "bit_data": {
                "status_bits": [vec![false; 16]],
                "alarm_bits": [alarm_word],
                "event_bits": []
            },
            "counts": {"word_count": 3},
            "timestamp": "2025-06-01 12:00:00.250",
            "bytes_size": 1200
        });

        let snapshot = decode(&frame).expect("frame should decode");
        assert_eq!(snapshot.words, vec![1, 2, 3]);
        assert_eq!(snapshot.ints, vec![-5, 10]);
        assert_eq!(snapshot.strings, vec!["ECLUSA".to_string()]);
        assert_eq!(snapshot.byte_size, 1200);
        assert!(snapshot.alarm_bits()[0][8]);
        assert_eq!(snapshot.status_bits().len(), 1);
        assert!(snapshot.event_bits().is_empty());
        assert!(snapshot.captured_at().is_some());
    }

    #[test]
    fn test_null_arrays_and_null_words() {
        let frame = json!({
            "words": null,
            "ints": null,
            "bit_data": {
                "status_bits": null,
                "alarm_bits": [null, [true, false, true]],
                "event_bits": null
            },
            "timestamp": "2025-06-01 12:00:00.000"
        });

        let snapshot = decode(&frame).expect("nulls should decode");
        assert!(snapshot.words.is_empty());
        assert!(snapshot.ints.is_empty());
        assert_eq!(snapshot.alarm_bits().len(), 2);
        assert!(snapshot.alarm_bits()[0].iter().all(|b| !b));
        assert!(snapshot.alarm_bits()[1][0]);
        assert!(snapshot.alarm_bits()[1][2]);
        assert!(!snapshot.alarm_bits()[1][15]);
    }

    #[test]
    fn test_missing_bit_data_expands_words() {
        let mut words = vec![0u16; 65];
        words[17] = 1 << 8;
        let frame = json!({ "words": words, "timestamp": "2025-06-01 12:00:00.000" });
        let payload = frame.to_string();

        let snapshot = decode_frame(payload.as_bytes(), Utc::now()).expect("decode");
        assert_eq!(snapshot.alarm_bits().len(), 31);
        assert!(snapshot.alarm_bits()[0][8]);
        assert_eq!(snapshot.byte_size, payload.len());
    }

    #[test]
    fn test_rejects_garbage() {
        assert!(matches!(
            decode_frame(b"{not json", Utc::now()),
            Err(FrameError::Malformed(_))
        ));
        assert!(matches!(decode(&json!([1, 2, 3])), Err(FrameError::NotAnObject)));
        assert!(matches!(
            decode(&json!({"status": "success", "message": "Comando enviado"})),
            Err(FrameError::NotTelemetry)
        ));
        assert!(matches!(
            decode(&json!({"words": ["a"]})),
            Err(FrameError::Malformed(_))
        ));
    }
}
