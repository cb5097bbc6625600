//! Weekly partitioning.
//!
//! Two different notions of "week" live here and must not be mixed up:
//!
//! - **Rolling window**: the trailing 7 days ending at `now` (offset 0), the
//!   7 days before that (offset 1), and so on. Selects which records are
//!   scored.
//! - **Week key**: the `YYYY-MM-DD` of the most recent Sunday (UTC). Names
//!   the snapshot slot a result is stored under, and only changes once per
//!   calendar week.

use chrono::{DateTime, Datelike, Duration, Utc};

use crate::models::MentionRecord;

pub const WINDOW_DAYS: i64 = 7;

/// `[start, end)` of the rolling window `offset` weeks back from `now`.
pub fn week_bounds(now: DateTime<Utc>, offset: u32) -> (DateTime<Utc>, DateTime<Utc>) {
    let offset = i64::from(offset);
    let end = now - Duration::days(offset * WINDOW_DAYS);
    let start = now - Duration::days((offset + 1) * WINDOW_DAYS);
    (start, end)
}

/// Records created inside the rolling window `offset` weeks back.
pub fn records_for_week(
    records: &[MentionRecord],
    now: DateTime<Utc>,
    offset: u32,
) -> Vec<MentionRecord> {
    let (start, end) = week_bounds(now, offset);
    records
        .iter()
        .filter(|r| r.created_at >= start && r.created_at < end)
        .cloned()
        .collect()
}

/// Canonical key of the calendar week (Sunday-start) containing `now`.
pub fn week_key(now: DateTime<Utc>) -> String {
    let date = now.date_naive();
    let sunday = date - Duration::days(i64::from(date.weekday().num_days_from_sunday()));
    sunday.format("%Y-%m-%d").to_string()
}
