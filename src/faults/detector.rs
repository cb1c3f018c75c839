//! Bit-level fault detection
//!
//! Pure functions: the result depends only on the snapshot, the registry
//! and the bank layout. Nothing is remembered between snapshots, so a bit
//! that flaps produces a fault that flaps.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};

use crate::config::defaults::FALLBACK_CATEGORY_COLOR;
use crate::config::DetectorConfig;
use crate::registry::{SignalKey, SignalRegistry};
use crate::types::{ActiveFault, BitWord, CategoryStats, FaultKind};

/// Every defined bit that is set in the alarm and event banks, ordered alarm
/// bank first, then by word, then by bit. `layout` gives the absolute word
/// address of each bank's first entry.
pub fn detect_active_faults(
    alarm_bits: &[BitWord],
    event_bits: &[BitWord],
    registry: &SignalRegistry,
    layout: &DetectorConfig,
    detected_at: DateTime<Utc>,
) -> Vec<ActiveFault> {
    let mut active = Vec::new();
    scan_bank(alarm_bits, FaultKind::Alarm, layout.alarm_base_word, registry, detected_at, &mut active);
    scan_bank(event_bits, FaultKind::Event, layout.event_base_word, registry, detected_at, &mut active);
    active
}

fn scan_bank(
    bank: &[BitWord],
    kind: FaultKind,
    base_word: u16,
    registry: &SignalRegistry,
    detected_at: DateTime<Utc>,
    out: &mut Vec<ActiveFault>,
) {
    for (offset, word_bits) in bank.iter().enumerate() {
        // Words past the addressable range cannot be in the registry
        let Some(word) = u16::try_from(offset).ok().and_then(|o| base_word.checked_add(o)) else {
            break;
        };

        for (bit, set) in (0u8..).zip(word_bits.iter()) {
            if !*set {
                continue;
            }
            if let Some(definition) = registry.lookup(SignalKey::new(kind, word, bit)) {
                out.push(ActiveFault::new(definition.clone(), detected_at));
            }
        }
    }
}

/// Roll active faults up by equipment category.
///
/// The category severity is the maximum of its faults. On ties the first
/// fault in scan order stays the representative, so the outcome does not
/// depend on anything but the input order.
pub fn aggregate_by_category(
    faults: &[ActiveFault],
    registry: &SignalRegistry,
) -> BTreeMap<String, CategoryStats> {
    let mut stats: BTreeMap<String, CategoryStats> = BTreeMap::new();

    for fault in faults {
        let definition = &fault.definition;
        match stats.get_mut(&definition.equipment) {
            Some(entry) => {
                entry.count += 1;
                if definition.severity > entry.severity {
                    entry.severity = definition.severity;
                    entry.representative = (definition.word_index, definition.bit_index);
                }
            }
            None => {
                let category = registry.category(&definition.equipment);
                stats.insert(
                    definition.equipment.clone(),
                    CategoryStats {
                        count: 1,
                        severity: definition.severity,
                        color: category
                            .map_or_else(|| FALLBACK_CATEGORY_COLOR.to_string(), |c| c.color.clone()),
                        name: category
                            .map_or_else(|| definition.equipment.clone(), |c| c.name.clone()),
                        representative: (definition.word_index, definition.bit_index),
                    },
                );
            }
        }
    }

    stats
}
