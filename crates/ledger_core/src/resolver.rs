//! "Current value as of an instant" resolution shared by every read path.

use rust_decimal::Decimal;

use crate::{CompensationInterval, ValidTime};

/// Picks the interval considered current at `at`.
///
/// Intervals still running at `at` (open, or ending at or after it) are
/// preferred; when none are, the whole history is considered. Among the pool
/// the latest `from` wins and equal starts fall back to the highest id, so the
/// most recently inserted row is chosen.
pub fn resolve_current(
    intervals: &[CompensationInterval],
    at: ValidTime,
) -> Option<&CompensationInterval> {
    let running = intervals
        .iter()
        .filter(|interval| interval.to.map_or(true, |to| to >= at));
    latest(running).or_else(|| latest(intervals.iter()))
}

pub fn current_value_as_of(intervals: &[CompensationInterval], at: ValidTime) -> Option<Decimal> {
    resolve_current(intervals, at).map(|interval| interval.amount)
}

fn latest<'a>(
    pool: impl Iterator<Item = &'a CompensationInterval>,
) -> Option<&'a CompensationInterval> {
    pool.max_by(|a, b| a.from.cmp(&b.from).then_with(|| a.id.cmp(&b.id)))
}

#[cfg(test)]
mod tests {
    use rust_decimal::Decimal;

    use super::{current_value_as_of, resolve_current};
    use crate::{CompensationInterval, IntervalId, SubjectId, ValidTime};

    fn interval(id: i64, amount: i64, from: i64, to: Option<i64>) -> CompensationInterval {
        CompensationInterval {
            id: IntervalId(id),
            subject_id: SubjectId::new(),
            amount: Decimal::new(amount, 0),
            from: ValidTime(from),
            to: to.map(ValidTime),
        }
    }

    #[test]
    fn empty_history_has_no_value() {
        assert_eq!(current_value_as_of(&[], ValidTime(0)), None);
    }

    #[test]
    fn open_interval_wins_over_closed_history() {
        let intervals = vec![
            interval(1, 1_000, 0, Some(99)),
            interval(2, 1_200, 100, None),
        ];
        assert_eq!(
            current_value_as_of(&intervals, ValidTime(150)),
            Some(Decimal::new(1_200, 0))
        );
    }

    #[test]
    fn interval_ending_exactly_at_instant_is_still_running() {
        let intervals = vec![interval(1, 700, 0, Some(50)), interval(2, 900, 60, Some(80))];
        assert_eq!(
            current_value_as_of(&intervals, ValidTime(50)),
            Some(Decimal::new(900, 0))
        );
    }

    #[test]
    fn later_start_among_running_intervals_wins() {
        let intervals = vec![
            interval(1, 500, 0, Some(1_000)),
            interval(2, 600, 200, Some(1_000)),
        ];
        assert_eq!(
            current_value_as_of(&intervals, ValidTime(100)),
            Some(Decimal::new(600, 0))
        );
    }

    #[test]
    fn falls_back_to_latest_start_when_nothing_runs() {
        // Instant sits after two closed intervals separated by a gap.
        let intervals = vec![
            interval(1, 800, 0, Some(10)),
            interval(2, 850, 20, Some(30)),
        ];
        let picked = resolve_current(&intervals, ValidTime(40)).expect("fallback");
        assert_eq!(picked.id, IntervalId(2));
        assert_eq!(
            current_value_as_of(&intervals, ValidTime(40)),
            Some(Decimal::new(850, 0))
        );
    }

    #[test]
    fn equal_starts_break_ties_on_highest_id() {
        let intervals = vec![
            interval(9, 300, 10, None),
            interval(4, 400, 10, None),
            interval(7, 500, 10, None),
        ];
        let picked = resolve_current(&intervals, ValidTime(11)).expect("tie");
        assert_eq!(picked.id, IntervalId(9));

        let mut reversed = intervals.clone();
        reversed.reverse();
        let picked = resolve_current(&reversed, ValidTime(11)).expect("tie");
        assert_eq!(picked.id, IntervalId(9));
    }

    #[test]
    fn resolution_is_idempotent() {
        let intervals = vec![interval(1, 100, 0, Some(5)), interval(2, 200, 10, None)];
        let first = current_value_as_of(&intervals, ValidTime(7));
        let second = current_value_as_of(&intervals, ValidTime(7));
        assert_eq!(first, second);
        assert_eq!(first, Some(Decimal::new(200, 0)));
    }
}
