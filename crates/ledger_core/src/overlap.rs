//! Overlap decisions between a candidate span and a subject's stored intervals.
//!
//! Bounds are inclusive on both ends and an absent end extends to positive
//! infinity, so `[1, 5]` and `[5, 9]` overlap while `[1, 4]` and `[5, 9]` do
//! not.

use crate::{CompensationInterval, IntervalId, IntervalSpan};

/// Whether a stored interval shares at least one instant with `candidate`.
pub fn overlaps(existing: &IntervalSpan, candidate: &IntervalSpan) -> bool {
    let existing_reaches_start = existing.to.map_or(true, |to| to >= candidate.from);
    let starts_before_candidate_end = candidate.to.map_or(true, |to| existing.from <= to);
    existing_reaches_start && starts_before_candidate_end
}

/// First interval in `existing` (other than `exclude`) that overlaps `candidate`.
pub fn find_conflict<'a, I>(
    candidate: &IntervalSpan,
    existing: I,
    exclude: Option<IntervalId>,
) -> Option<&'a CompensationInterval>
where
    I: IntoIterator<Item = &'a CompensationInterval>,
{
    existing
        .into_iter()
        .filter(|interval| Some(interval.id) != exclude)
        .find(|interval| overlaps(&interval.span(), candidate))
}

pub fn conflicts<'a, I>(candidate: &IntervalSpan, existing: I, exclude: Option<IntervalId>) -> bool
where
    I: IntoIterator<Item = &'a CompensationInterval>,
{
    find_conflict(candidate, existing, exclude).is_some()
}
