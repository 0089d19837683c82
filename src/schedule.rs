//! Schedule math for digest runs
//!
//! All schedule decisions are made in UTC. A job considers a subscription
//! due when its `next_run` falls inside the job's fetch window (the full
//! UTC day the job runs in); after a successful run the subscription is
//! advanced by its cadence.

use crate::error::{Error, Result, ScheduleError};
use crate::types::Cadence;
use chrono::{DateTime, Duration, Months, NaiveTime, Utc};

/// The half-open fetch window for a job running at `now`.
///
/// Spans the full UTC day containing `now`: `[midnight, midnight + 24h)`.
/// Every instant of the same UTC day maps to the same window, so a delayed
/// or re-triggered job makes identical due-ness decisions.
///
/// # Example
///
/// ```rust
/// use chrono::{TimeZone, Utc};
/// use lettercast::schedule::window_for;
///
/// let now = Utc.with_ymd_and_hms(2024, 3, 15, 17, 45, 0).unwrap();
/// let (start, end) = window_for(now);
/// assert_eq!(start, Utc.with_ymd_and_hms(2024, 3, 15, 0, 0, 0).unwrap());
/// assert_eq!(end, Utc.with_ymd_and_hms(2024, 3, 16, 0, 0, 0).unwrap());
/// ```
pub fn window_for(now: DateTime<Utc>) -> (DateTime<Utc>, DateTime<Utc>) {
    let start = now.date_naive().and_time(NaiveTime::MIN).and_utc();
    (start, start + Duration::hours(24))
}

/// Compute the next run instant after a run at `from`.
///
/// Weekly and biweekly advance by exactly 7 and 14 days. Monthly advances
/// by one calendar month with the day-of-month clamped to the last valid
/// day of the target month, so a subscription running on Jan 31 next runs
/// on the last day of February rather than skipping to March.
///
/// An unrecognized cadence is an error: the caller surfaces it as the
/// run's failure instead of silently leaving the schedule untouched, so a
/// subscription with a bad cadence shows up in every report until fixed.
pub fn next_run(from: DateTime<Utc>, cadence: &Cadence) -> Result<DateTime<Utc>> {
    match cadence {
        Cadence::Weekly => Ok(from + Duration::days(7)),
        Cadence::Biweekly => Ok(from + Duration::days(14)),
        Cadence::Monthly => from
            .checked_add_months(Months::new(1))
            .ok_or_else(|| Error::Other(format!("monthly advance out of range from {from}"))),
        Cadence::Other(s) => Err(ScheduleError::UnsupportedCadence(s.clone()).into()),
    }
}

// unwrap/expect are acceptable in tests for concise failure-on-error assertions
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn utc(y: i32, mo: u32, d: u32, h: u32, mi: u32, s: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, mo, d, h, mi, s).unwrap()
    }

    // --- window_for ---

    #[test]
    fn window_spans_the_utc_day_containing_now() {
        let (start, end) = window_for(utc(2024, 3, 15, 17, 45, 12));
        assert_eq!(start, utc(2024, 3, 15, 0, 0, 0));
        assert_eq!(end, utc(2024, 3, 16, 0, 0, 0));
    }

    #[test]
    fn window_is_identical_for_every_instant_of_the_same_day() {
        let early = window_for(utc(2024, 3, 15, 0, 0, 0));
        let late = window_for(utc(2024, 3, 15, 23, 59, 59));
        assert_eq!(early, late);
    }

    #[test]
    fn window_at_midnight_starts_at_that_midnight() {
        let (start, end) = window_for(utc(2024, 3, 15, 0, 0, 0));
        assert_eq!(start, utc(2024, 3, 15, 0, 0, 0));
        assert_eq!(end, utc(2024, 3, 16, 0, 0, 0));
    }

    #[test]
    fn consecutive_days_produce_adjacent_windows() {
        let (_, end_day1) = window_for(utc(2024, 3, 15, 12, 0, 0));
        let (start_day2, _) = window_for(utc(2024, 3, 16, 12, 0, 0));
        assert_eq!(
            end_day1, start_day2,
            "day windows must tile with no gap and no overlap"
        );
    }

    // --- next_run cadence offsets ---

    #[test]
    fn weekly_advances_seven_days() {
        let next = next_run(utc(2024, 1, 1, 9, 30, 0), &Cadence::Weekly).unwrap();
        assert_eq!(next, utc(2024, 1, 8, 9, 30, 0));
    }

    #[test]
    fn biweekly_advances_fourteen_days() {
        let next = next_run(utc(2024, 1, 1, 0, 0, 0), &Cadence::Biweekly).unwrap();
        assert_eq!(next, utc(2024, 1, 15, 0, 0, 0));
    }

    #[test]
    fn monthly_advances_one_calendar_month() {
        let next = next_run(utc(2024, 3, 15, 8, 0, 0), &Cadence::Monthly).unwrap();
        assert_eq!(next, utc(2024, 4, 15, 8, 0, 0));
    }

    #[test]
    fn monthly_clamps_to_leap_february() {
        let next = next_run(utc(2024, 1, 31, 6, 0, 0), &Cadence::Monthly).unwrap();
        assert_eq!(
            next,
            utc(2024, 2, 29, 6, 0, 0),
            "Jan 31 must land on Feb 29 in a leap year, not skip to March"
        );
    }

    #[test]
    fn monthly_clamps_to_common_february() {
        let next = next_run(utc(2023, 1, 31, 0, 0, 0), &Cadence::Monthly).unwrap();
        assert_eq!(next, utc(2023, 2, 28, 0, 0, 0));
    }

    #[test]
    fn monthly_clamps_thirty_one_to_thirty() {
        let next = next_run(utc(2024, 8, 31, 0, 0, 0), &Cadence::Monthly).unwrap();
        assert_eq!(next, utc(2024, 9, 30, 0, 0, 0));
    }

    #[test]
    fn monthly_preserves_time_of_day() {
        let next = next_run(utc(2024, 5, 10, 13, 5, 22), &Cadence::Monthly).unwrap();
        assert_eq!(next, utc(2024, 6, 10, 13, 5, 22));
    }

    #[test]
    fn monthly_crosses_year_boundary() {
        let next = next_run(utc(2024, 12, 15, 0, 0, 0), &Cadence::Monthly).unwrap();
        assert_eq!(next, utc(2025, 1, 15, 0, 0, 0));
    }

    // --- unrecognized cadence ---

    #[test]
    fn unknown_cadence_is_an_error_naming_the_cadence() {
        let err = next_run(utc(2024, 1, 1, 0, 0, 0), &Cadence::Other("daily".into()))
            .unwrap_err();
        match err {
            Error::Schedule(ScheduleError::UnsupportedCadence(s)) => assert_eq!(s, "daily"),
            other => panic!("expected UnsupportedCadence, got {other}"),
        }
    }
}
