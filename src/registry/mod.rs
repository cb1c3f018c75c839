//! Signal Registry
//!
//! Sparse lookup table from `(bank, word, bit)` to the meaning of that bit,
//! plus the display metadata of each equipment category. Bits that are not
//! in the registry are ignored by the detector.

mod definitions;

use std::collections::{BTreeMap, HashMap};

use serde::Serialize;
use tracing::debug;

use crate::config::FaultEntry;
use crate::types::{EquipmentCategory, FaultDefinition, FaultKind};
use definitions::{BUILTIN_ALARMS, BUILTIN_CATEGORIES};

/// Composite registry key. Alarm and event banks never collide.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub struct SignalKey {
    pub kind: FaultKind,
    /// Absolute word address
    pub word: u16,
    pub bit: u8,
}

impl SignalKey {
    pub fn new(kind: FaultKind, word: u16, bit: u8) -> Self {
        Self { kind, word, bit }
    }

    pub fn alarm(word: u16, bit: u8) -> Self {
        Self::new(FaultKind::Alarm, word, bit)
    }

    pub fn event(word: u16, bit: u8) -> Self {
        Self::new(FaultKind::Event, word, bit)
    }
}

impl std::fmt::Display for SignalKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}.{}", self.kind, self.word, self.bit)
    }
}

/// Fault definitions and equipment categories.
#[derive(Debug, Clone, Default)]
pub struct SignalRegistry {
    definitions: HashMap<SignalKey, FaultDefinition>,
    categories: HashMap<String, EquipmentCategory>,
}

impl SignalRegistry {
    /// Registry with no definitions and no categories.
    pub fn empty() -> Self {
        Self::default()
    }

    /// The lock PLC's built-in alarm table and equipment categories.
    pub fn builtin() -> Self {
        let mut registry = Self::empty();

        for &(word, bit, equipment, severity, description) in BUILTIN_ALARMS {
            registry.insert(FaultDefinition {
                word_index: word,
                bit_index: bit,
                equipment: equipment.to_string(),
                description: description.to_string(),
                kind: FaultKind::Alarm,
                severity,
            });
        }

        for &(key, name, equipment, color, icon) in BUILTIN_CATEGORIES {
            registry.insert_category(
                key,
                EquipmentCategory {
                    name: name.to_string(),
                    equipment: equipment.to_string(),
                    color: color.to_string(),
                    icon: icon.to_string(),
                },
            );
        }

        registry
    }

    /// Built-in table with configured `[[faults]]` merged on top.
    pub fn with_overrides(entries: &[FaultEntry]) -> Self {
        let mut registry = Self::builtin();
        for entry in entries {
            let replaced = registry.insert(FaultDefinition {
                word_index: entry.word,
                bit_index: entry.bit,
                equipment: entry.equipment.clone(),
                description: entry.description.clone(),
                kind: entry.kind,
                severity: entry.severity,
            });
            debug!(
                key = %SignalKey::new(entry.kind, entry.word, entry.bit),
                replaced = replaced.is_some(),
                "Registry entry from config"
            );
        }
        registry
    }

    /// Add or replace a definition, returning the one it replaced.
    pub fn insert(&mut self, definition: FaultDefinition) -> Option<FaultDefinition> {
        let key = SignalKey::new(definition.kind, definition.word_index, definition.bit_index);
        self.definitions.insert(key, definition)
    }

    pub fn insert_category(&mut self, key: impl Into<String>, category: EquipmentCategory) {
        self.categories.insert(key.into(), category);
    }

    pub fn lookup(&self, key: SignalKey) -> Option<&FaultDefinition> {
        self.definitions.get(&key)
    }

    pub fn category(&self, equipment: &str) -> Option<&EquipmentCategory> {
        self.categories.get(equipment)
    }

    /// All definitions ordered by `(kind, word, bit)`.
    pub fn definitions(&self) -> Vec<&FaultDefinition> {
        let ordered: BTreeMap<SignalKey, &FaultDefinition> =
            self.definitions.iter().map(|(k, v)| (*k, v)).collect();
        ordered.into_values().collect()
    }

    /// All categories ordered by key.
    pub fn categories(&self) -> BTreeMap<&str, &EquipmentCategory> {
        self.categories.iter().map(|(k, v)| (k.as_str(), v)).collect()
    }

    pub fn len(&self) -> usize {
        self.definitions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.definitions.is_empty()
    }
}
