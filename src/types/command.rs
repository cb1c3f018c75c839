//! Outbound write commands

use serde::{Deserialize, Serialize};

/// A single value addressed to one slot of a PLC area.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WriteValue<T> {
    pub index: usize,
    pub value: T,
}

/// Write request sent to the gateway, over the stream or the fallback POST.
///
/// The JSON body is identical on both transports.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct WriteCommand {
    #[serde(default)]
    pub words: Vec<WriteValue<u16>>,
    #[serde(default)]
    pub ints: Vec<WriteValue<i32>>,
    #[serde(default)]
    pub reals: Vec<WriteValue<f64>>,
    #[serde(default)]
    pub strings: Vec<WriteValue<String>>,
}

impl WriteCommand {
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn word(mut self, index: usize, value: u16) -> Self {
        self.words.push(WriteValue { index, value });
        self
    }

    #[must_use]
    pub fn int(mut self, index: usize, value: i32) -> Self {
        self.ints.push(WriteValue { index, value });
        self
    }

    #[must_use]
    pub fn real(mut self, index: usize, value: f64) -> Self {
        self.reals.push(WriteValue { index, value });
        self
    }

    #[must_use]
    pub fn string(mut self, index: usize, value: impl Into<String>) -> Self {
        self.strings.push(WriteValue { index, value: value.into() });
        self
    }

    /// True when the command carries no writes at all.
    pub fn is_empty(&self) -> bool {
        self.words.is_empty() && self.ints.is_empty() && self.reals.is_empty() && self.strings.is_empty()
    }
}
