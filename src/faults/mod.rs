//! Fault Detection
//!
//! Derives the currently active faults and per-category severity from each
//! telemetry snapshot. [`FaultDetector`] is the stateless evaluator;
//! [`FaultMonitor`] runs it on every snapshot the distributor publishes.

mod detector;
mod monitor;

pub use detector::{aggregate_by_category, detect_active_faults};
pub use monitor::{FaultMonitor, FaultMonitorHandle};

use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::config::DetectorConfig;
use crate::registry::SignalRegistry;
use crate::types::{ActiveFault, CategoryStats, FaultSeverity, TelemetrySnapshot};

/// Everything the fault consumers need from one snapshot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FaultReport {
    /// Active faults in scan order
    pub faults: Vec<ActiveFault>,
    pub count: usize,
    /// Subset of `faults` at Critical severity
    pub critical: Vec<ActiveFault>,
    pub by_category: BTreeMap<String, CategoryStats>,
    pub evaluated_at: DateTime<Utc>,
}

impl FaultReport {
    /// Report with no active faults.
    pub fn empty(evaluated_at: DateTime<Utc>) -> Self {
        Self {
            faults: Vec::new(),
            count: 0,
            critical: Vec::new(),
            by_category: BTreeMap::new(),
            evaluated_at,
        }
    }

    /// Highest severity currently active, if any.
    pub fn max_severity(&self) -> Option<FaultSeverity> {
        self.faults.iter().map(ActiveFault::severity).max()
    }
}

/// Registry plus bank layout; evaluates snapshots into reports.
#[derive(Debug, Clone)]
pub struct FaultDetector {
    registry: Arc<SignalRegistry>,
    layout: DetectorConfig,
}

impl FaultDetector {
    pub fn new(registry: Arc<SignalRegistry>, layout: DetectorConfig) -> Self {
        Self { registry, layout }
    }

    pub fn registry(&self) -> &Arc<SignalRegistry> {
        &self.registry
    }

    /// Evaluate a snapshot, stamping faults with the current time.
    pub fn evaluate(&self, snapshot: &TelemetrySnapshot) -> FaultReport {
        self.evaluate_at(snapshot, Utc::now())
    }

    /// Evaluate a snapshot with an explicit detection time.
    pub fn evaluate_at(&self, snapshot: &TelemetrySnapshot, at: DateTime<Utc>) -> FaultReport {
        let faults = detect_active_faults(
            snapshot.alarm_bits(),
            snapshot.event_bits(),
            &self.registry,
            &self.layout,
            at,
        );
        let by_category = aggregate_by_category(&faults, &self.registry);
        let critical: Vec<ActiveFault> = faults
            .iter()
            .filter(|f| f.severity() == FaultSeverity::Critical)
            .cloned()
            .collect();

        FaultReport {
            count: faults.len(),
            faults,
            critical,
            by_category,
            evaluated_at: at,
        }
    }
}
