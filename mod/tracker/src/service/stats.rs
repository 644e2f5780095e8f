//! Habit statistics, derived from the raw entry list on every request.
//!
//! All day arithmetic is UTC. The canonical day of an entry is
//! `timestamp.div_euclid(86400)`; several entries on one calendar day
//! count once.

use chrono::{DateTime, Datelike, Utc};

use crate::model::{HabitEntry, HabitSummary};

const SECS_PER_DAY: i64 = 86_400;

/// Compute the full summary for one habit at time `now`.
///
/// An empty entry list is not an error: every numeric field is zero.
pub fn summarize(name: &str, entries: &[HabitEntry], now: DateTime<Utc>) -> HabitSummary {
    let days = distinct_days(entries);
    let today = now.timestamp().div_euclid(SECS_PER_DAY);

    HabitSummary {
        name: name.to_string(),
        current_streak: current_streak(&days, today),
        longest_streak: longest_streak(&days),
        first_logged: first_logged(entries),
        total_days_done: days.len() as u32,
        best_month: best_month(&days),
        this_month: days_in_month(&days, now.year(), now.month()),
        last_write: now.timestamp(),
    }
}

/// Sorted, deduplicated canonical days across all entries.
fn distinct_days(entries: &[HabitEntry]) -> Vec<i64> {
    let mut days: Vec<i64> = entries
        .iter()
        .map(|e| e.timestamp.div_euclid(SECS_PER_DAY))
        .collect();
    days.sort_unstable();
    days.dedup();
    days
}

/// Walk back from the most recent day counting exact one-day steps.
///
/// The streak is alive only while the latest day is today or yesterday —
/// the one-day grace period lets a user log yesterday before midnight
/// without losing the run.
fn current_streak(days: &[i64], today: i64) -> u32 {
    let Some(&last) = days.last() else {
        return 0;
    };
    if last != today && last != today - 1 {
        return 0;
    }

    let mut streak = 1;
    for w in days.windows(2).rev() {
        if w[1] - w[0] == 1 {
            streak += 1;
        } else {
            break;
        }
    }
    streak
}

/// Longest run of consecutive days anywhere in the history.
fn longest_streak(days: &[i64]) -> u32 {
    if days.is_empty() {
        return 0;
    }

    let mut longest = 1;
    let mut run = 1;
    for w in days.windows(2) {
        if w[1] - w[0] == 1 {
            run += 1;
            longest = longest.max(run);
        } else {
            run = 1;
        }
    }
    longest
}

/// Minimum raw timestamp across entries; 0 when empty.
fn first_logged(entries: &[HabitEntry]) -> i64 {
    entries.iter().map(|e| e.timestamp).min().unwrap_or(0)
}

/// Count distinct days falling in the given UTC (year, month).
fn days_in_month(days: &[i64], year: i32, month: u32) -> u32 {
    days.iter()
        .filter(|&&day| {
            let date = DateTime::from_timestamp(day * SECS_PER_DAY, 0).unwrap_or_default();
            date.year() == year && date.month() == month
        })
        .count() as u32
}

/// The day count of the best (year, month) bucket.
fn best_month(days: &[i64]) -> u32 {
    let mut buckets = std::collections::HashMap::new();
    for &day in days {
        let date = DateTime::from_timestamp(day * SECS_PER_DAY, 0).unwrap_or_default();
        *buckets.entry((date.year(), date.month())).or_insert(0u32) += 1;
    }
    buckets.values().copied().max().unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn entry(ts: i64) -> HabitEntry {
        HabitEntry {
            name: "guitar".into(),
            note: String::new(),
            timestamp: ts,
        }
    }

    // A fixed "now": 2023-11-15 12:00:00 UTC.
    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2023, 11, 15, 12, 0, 0).unwrap()
    }

    fn day_ts(days_ago: i64) -> i64 {
        let today = now().timestamp().div_euclid(86_400);
        (today - days_ago) * 86_400
    }

    #[test]
    fn test_empty_entries_all_zero() {
        let s = summarize("guitar", &[], now());
        assert_eq!(s.current_streak, 0);
        assert_eq!(s.longest_streak, 0);
        assert_eq!(s.first_logged, 0);
        assert_eq!(s.total_days_done, 0);
        assert_eq!(s.this_month, 0);
        assert_eq!(s.best_month, 0);
    }

    #[test]
    fn test_streak_ending_today() {
        let entries = vec![entry(day_ts(0)), entry(day_ts(1)), entry(day_ts(2))];
        let s = summarize("guitar", &entries, now());
        assert_eq!(s.current_streak, 3);
        assert_eq!(s.longest_streak, 3);
        assert_eq!(s.total_days_done, 3);
    }

    #[test]
    fn test_streak_ending_yesterday_still_counts() {
        let entries = vec![entry(day_ts(1)), entry(day_ts(2)), entry(day_ts(3))];
        let s = summarize("guitar", &entries, now());
        assert_eq!(s.current_streak, 3);
    }

    #[test]
    fn test_streak_broken_two_days_ago() {
        let entries = vec![entry(day_ts(2)), entry(day_ts(3)), entry(day_ts(4))];
        let s = summarize("guitar", &entries, now());
        assert_eq!(s.current_streak, 0);
        assert_eq!(s.longest_streak, 3);
    }

    #[test]
    fn test_gap_resets_current_but_longest_remembers() {
        // 5-day run long ago, then a 2-day run ending today.
        let entries = vec![
            entry(day_ts(20)),
            entry(day_ts(19)),
            entry(day_ts(18)),
            entry(day_ts(17)),
            entry(day_ts(16)),
            entry(day_ts(1)),
            entry(day_ts(0)),
        ];
        let s = summarize("guitar", &entries, now());
        assert_eq!(s.current_streak, 2);
        assert_eq!(s.longest_streak, 5);
        assert_eq!(s.total_days_done, 7);
    }

    #[test]
    fn test_single_day_longest_is_one() {
        let entries = vec![entry(day_ts(0))];
        let s = summarize("guitar", &entries, now());
        assert_eq!(s.current_streak, 1);
        assert_eq!(s.longest_streak, 1);
    }

    #[test]
    fn test_same_day_duplicates_count_once() {
        let base = day_ts(0);
        let entries = vec![entry(base), entry(base + 3600), entry(base + 7200)];
        let s = summarize("guitar", &entries, now());
        assert_eq!(s.total_days_done, 1);
        assert_eq!(s.current_streak, 1);
    }

    #[test]
    fn test_first_logged_is_min_raw_timestamp() {
        let entries = vec![entry(day_ts(0) + 500), entry(day_ts(3) + 42)];
        let s = summarize("guitar", &entries, now());
        assert_eq!(s.first_logged, day_ts(3) + 42);
    }

    #[test]
    fn test_this_month_only_counts_current_utc_month() {
        // now() is 2023-11-15: two November days, one October day.
        let oct = Utc.with_ymd_and_hms(2023, 10, 3, 9, 0, 0).unwrap().timestamp();
        let entries = vec![entry(day_ts(0)), entry(day_ts(1)), entry(oct)];
        let s = summarize("guitar", &entries, now());
        assert_eq!(s.this_month, 2);
    }

    #[test]
    fn test_best_month_is_a_day_count() {
        // Three distinct days in October, two in November.
        let oct = |d: u32| Utc.with_ymd_and_hms(2023, 10, d, 9, 0, 0).unwrap().timestamp();
        let entries = vec![
            entry(oct(3)),
            entry(oct(4)),
            entry(oct(20)),
            entry(day_ts(0)),
            entry(day_ts(1)),
        ];
        let s = summarize("guitar", &entries, now());
        assert_eq!(s.best_month, 3);
    }

    #[test]
    fn test_month_boundary_does_not_join_runs() {
        // Oct 31 + Nov 1 are consecutive canonical days.
        let oct31 = Utc.with_ymd_and_hms(2023, 10, 31, 9, 0, 0).unwrap().timestamp();
        let nov1 = Utc.with_ymd_and_hms(2023, 11, 1, 9, 0, 0).unwrap().timestamp();
        let entries = vec![entry(oct31), entry(nov1)];
        let s = summarize("guitar", &entries, now());
        assert_eq!(s.longest_streak, 2);
        assert_eq!(s.best_month, 1);
    }
}
