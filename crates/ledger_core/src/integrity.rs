use serde::{Deserialize, Serialize};

use crate::overlap::overlaps;
use crate::{CompensationInterval, IntervalId, SubjectId};

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IntegrityReport {
    pub subject_id: SubjectId,
    pub interval_count: usize,
    pub open_intervals: Vec<IntervalId>,
    pub overlapping_pairs: Vec<(IntervalId, IntervalId)>,
}

impl IntegrityReport {
    pub fn is_healthy(&self) -> bool {
        self.open_intervals.len() <= 1 && self.overlapping_pairs.is_empty()
    }
}

/// Audits one subject's intervals for overlaps and for more than one open row.
pub fn check_intervals(subject_id: SubjectId, intervals: &[CompensationInterval]) -> IntegrityReport {
    let mut sorted: Vec<&CompensationInterval> = intervals
        .iter()
        .filter(|interval| interval.subject_id == subject_id)
        .collect();
    sorted.sort_by_key(|interval| interval.id);

    let open_intervals = sorted
        .iter()
        .filter(|interval| interval.is_open())
        .map(|interval| interval.id)
        .collect();

    let mut overlapping_pairs = Vec::new();
    for (index, left) in sorted.iter().enumerate() {
        for right in &sorted[index + 1..] {
            if overlaps(&left.span(), &right.span()) {
                overlapping_pairs.push((left.id, right.id));
            }
        }
    }

    IntegrityReport {
        subject_id,
        interval_count: sorted.len(),
        open_intervals,
        overlapping_pairs,
    }
}
