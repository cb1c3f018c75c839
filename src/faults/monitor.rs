//! Fault Monitor - re-evaluates faults on every published snapshot

use std::collections::HashSet;
use std::sync::Arc;

use chrono::Utc;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use super::{FaultDetector, FaultReport};
use crate::distributor::TelemetrySubscription;
use crate::types::{FaultKind, FaultSeverity, TelemetrySnapshot};

/// Read side of the monitor.
#[derive(Clone)]
pub struct FaultMonitorHandle {
    report_rx: watch::Receiver<Arc<FaultReport>>,
}

impl FaultMonitorHandle {
    /// Latest report. Empty until the first snapshot is evaluated.
    pub fn report(&self) -> Arc<FaultReport> {
        Arc::clone(&self.report_rx.borrow())
    }

    /// Wait for the next report.
    pub async fn next_report(&mut self) -> Option<Arc<FaultReport>> {
        self.report_rx.changed().await.ok()?;
        Some(Arc::clone(&self.report_rx.borrow_and_update()))
    }
}

/// Background task running the detector over the distributor's snapshots.
pub struct FaultMonitor {
    detector: FaultDetector,
    subscription: TelemetrySubscription,
    report_tx: watch::Sender<Arc<FaultReport>>,
    cancel: CancellationToken,
}

impl FaultMonitor {
    /// Create new monitor and handle
    pub fn new(
        detector: FaultDetector,
        subscription: TelemetrySubscription,
        cancel: CancellationToken,
    ) -> (Self, FaultMonitorHandle) {
        let (report_tx, report_rx) = watch::channel(Arc::new(FaultReport::empty(Utc::now())));
        let monitor = Self { detector, subscription, report_tx, cancel };
        (monitor, FaultMonitorHandle { report_rx })
    }

    /// Run until cancelled or until the distributor stops.
    pub async fn run(mut self) {
        info!(definitions = self.detector.registry().len(), "FaultMonitor starting");

        if let Some(snapshot) = self.subscription.latest_snapshot() {
            self.apply(&snapshot);
        }

        loop {
            tokio::select! {
                () = self.cancel.cancelled() => break,
                next = self.subscription.next_snapshot() => match next {
                    Some(Some(snapshot)) => self.apply(&snapshot),
                    Some(None) => {}
                    None => break,
                },
            }
        }

        info!("FaultMonitor stopped");
    }

    fn apply(&self, snapshot: &TelemetrySnapshot) {
        let report = self.detector.evaluate(snapshot);
        log_transitions(&self.report_tx.borrow(), &report);
        self.report_tx.send_replace(Arc::new(report));
    }
}

/// Log faults that appeared or disappeared between two reports.
fn log_transitions(previous: &FaultReport, current: &FaultReport) {
    let before: HashSet<(FaultKind, u16, u8)> = previous.faults.iter().map(|f| f.signal()).collect();
    let after: HashSet<(FaultKind, u16, u8)> = current.faults.iter().map(|f| f.signal()).collect();

    for fault in current.faults.iter().filter(|f| !before.contains(&f.signal())) {
        let d = &fault.definition;
        if d.severity == FaultSeverity::Critical {
            error!(
                kind = %d.kind, word = d.word_index, bit = d.bit_index,
                equipment = %d.equipment, severity = %d.severity,
                "Fault raised: {}", d.description
            );
        } else {
            warn!(
                kind = %d.kind, word = d.word_index, bit = d.bit_index,
                equipment = %d.equipment, severity = %d.severity,
                "Fault raised: {}", d.description
            );
        }
    }

    for fault in previous.faults.iter().filter(|f| !after.contains(&f.signal())) {
        let d = &fault.definition;
        info!(
            kind = %d.kind, word = d.word_index, bit = d.bit_index,
            equipment = %d.equipment,
            "Fault cleared: {}", d.description
        );
    }
}
