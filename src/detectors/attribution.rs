//! detectors/attribution.rs
//!
//! Intersects declaration ranges with changed lines.

use crate::state::{ChangeRecord, ChangeType, Declaration, LineChangeSet};

/// Classify every declaration whose range holds at least one changed line.
///
/// Changed lines are scanned deleted → added → modified and the first
/// line inside a declaration's range decides its classification. A
/// changed line inside nested declarations classifies all of them.
/// Declarations without changed lines are omitted.
pub fn attribute_changes(declarations: &[Declaration], lines: &LineChangeSet) -> ChangeRecord {
    let mut record = ChangeRecord::new();

    for decl in declarations {
        if let Some(change) = classify(decl, lines) {
            record.insert(decl.name.clone(), change);
        }
    }

    record
}

pub fn classify(decl: &Declaration, lines: &LineChangeSet) -> Option<ChangeType> {
    lines
        .scan_order()
        .find(|(line, _)| decl.contains(*line))
        .map(|(_, change)| change)
}

/// Every declaration marked modified, used when no diff is available.
pub fn assume_modified(declarations: &[Declaration]) -> ChangeRecord {
    let mut record = ChangeRecord::new();
    for decl in declarations {
        record.insert(decl.name.clone(), ChangeType::Modified);
    }
    record
}
