//! Fault types: FaultKind, FaultSeverity, FaultDefinition, ActiveFault, categories

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// ============================================================================
// Classification
// ============================================================================

/// Bank a signal lives in. Alarm and event banks are separate keyspaces.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum FaultKind {
    #[serde(rename = "AL")]
    Alarm,
    #[serde(rename = "EV")]
    Event,
}

impl std::fmt::Display for FaultKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FaultKind::Alarm => write!(f, "AL"),
            FaultKind::Event => write!(f, "EV"),
        }
    }
}

/// Severity of a fault, totally ordered `Low < Medium < High < Critical`.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
#[serde(rename_all = "UPPERCASE")]
pub enum FaultSeverity {
    #[default]
    Low = 1,
    Medium = 2,
    High = 3,
    Critical = 4,
}

impl std::fmt::Display for FaultSeverity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FaultSeverity::Low => write!(f, "LOW"),
            FaultSeverity::Medium => write!(f, "MEDIUM"),
            FaultSeverity::High => write!(f, "HIGH"),
            FaultSeverity::Critical => write!(f, "CRITICAL"),
        }
    }
}

// ============================================================================
// Definitions & Active Faults
// ============================================================================

/// Registry entry describing what a set bit means.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FaultDefinition {
    /// Absolute word address
    pub word_index: u16,
    /// Bit within the word (0-15)
    pub bit_index: u8,
    /// Equipment category key, e.g. `AL_EnchimentoRG`
    pub equipment: String,
    pub description: String,
    pub kind: FaultKind,
    pub severity: FaultSeverity,
}

/// A fault whose bit is set in the current snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActiveFault {
    #[serde(flatten)]
    pub definition: FaultDefinition,
    pub detected_at: DateTime<Utc>,
    pub is_active: bool,
}

impl ActiveFault {
    pub fn new(definition: FaultDefinition, detected_at: DateTime<Utc>) -> Self {
        Self { definition, detected_at, is_active: true }
    }

    pub fn severity(&self) -> FaultSeverity {
        self.definition.severity
    }

    pub fn equipment(&self) -> &str {
        &self.definition.equipment
    }

    /// `(kind, word, bit)` identity of the underlying signal.
    pub fn signal(&self) -> (FaultKind, u16, u8) {
        (self.definition.kind, self.definition.word_index, self.definition.bit_index)
    }
}

// ============================================================================
// Equipment Categories
// ============================================================================

/// Display metadata of an equipment group.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EquipmentCategory {
    /// Short name, e.g. "Enchimento"
    pub name: String,
    /// Long label, e.g. "Sistema de Enchimento"
    pub equipment: String,
    pub color: String,
    pub icon: String,
}

/// Roll-up of the active faults of one equipment category.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CategoryStats {
    pub count: usize,
    /// Highest severity among the category's active faults
    pub severity: FaultSeverity,
    pub color: String,
    pub name: String,
    /// `(word, bit)` of the fault that set `severity`
    pub representative: (u16, u8),
}
