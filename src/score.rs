//! Per-user engagement scoring.
//!
//! A user's records in the current window are ranked newest-first and each
//! one contributes
//!
//! ```text
//! impact       = followers * 0.001 + likes + reposts * 2
//! contribution = impact * freshness(rank) * decay(rank)
//! ```
//!
//! | rank | freshness | decay |
//! |------|-----------|-------|
//! | 0    | 3         | 1.0   |
//! | 1    | 2         | 0.5   |
//! | 2+   | 1         | 0.25  |
//!
//! The sum is multiplied by [`CONSISTENCY_BONUS`] when the user was also
//! active in the prior window. Ranking is by recency order, not by elapsed
//! time, so the result depends only on the records themselves.

use std::collections::HashSet;

use crate::models::{MentionRecord, UserStats};

pub const FOLLOWER_WEIGHT: f64 = 0.001;
pub const LIKE_WEIGHT: f64 = 1.0;
pub const REPOST_WEIGHT: f64 = 2.0;
pub const CONSISTENCY_BONUS: f64 = 1.25;

fn freshness_multiplier(rank: usize) -> f64 {
    match rank {
        0 => 3.0,
        1 => 2.0,
        _ => 1.0,
    }
}

fn decay_factor(rank: usize) -> f64 {
    match rank {
        0 => 1.0,
        1 => 0.5,
        _ => 0.25,
    }
}

pub fn impact(record: &MentionRecord) -> f64 {
    record.author_follower_count as f64 * FOLLOWER_WEIGHT
        + record.like_count as f64 * LIKE_WEIGHT
        + record.repost_count as f64 * REPOST_WEIGHT
}

/// Sort newest-first. Stable, so equal timestamps keep input order.
fn newest_first<'a>(records: &[&'a MentionRecord]) -> Vec<&'a MentionRecord> {
    let mut sorted = records.to_vec();
    sorted.sort_by(|a, b| b.created_at.cmp(&a.created_at));
    sorted
}

/// Score one user's records, applying the consistency bonus when `handle`
/// appears in `prior_active`.
pub fn score_user(handle: &str, records: &[&MentionRecord], prior_active: &HashSet<String>) -> f64 {
    let raw: f64 = newest_first(records)
        .iter()
        .enumerate()
        .map(|(rank, r)| impact(r) * freshness_multiplier(rank) * decay_factor(rank))
        .sum();

    if prior_active.contains(handle) {
        raw * CONSISTENCY_BONUS
    } else {
        raw
    }
}

/// Highest `likes + 2 * reposts`; the first record wins ties.
pub fn most_viral<'a, I>(records: I) -> Option<&'a MentionRecord>
where
    I: IntoIterator<Item = &'a MentionRecord>,
{
    records.into_iter().fold(None, |best, r| match best {
        Some(b) if b.viral_score() >= r.viral_score() => Some(b),
        _ => Some(r),
    })
}

/// Build a user's stats, or `None` when the score is not strictly positive.
pub fn user_stats(
    handle: &str,
    records: &[&MentionRecord],
    prior_active: &HashSet<String>,
) -> Option<UserStats> {
    let total_score = score_user(handle, records, prior_active);
    if total_score.is_nan() || total_score <= 0.0 {
        return None;
    }

    let top_record = most_viral(records.iter().copied())?.clone();
    let last_active_at = records.iter().map(|r| r.created_at).max()?;
    let n = records.len() as f64;

    Some(UserStats {
        author_handle: handle.to_string(),
        total_score,
        mention_count: records.len(),
        avg_likes: records.iter().map(|r| r.like_count as f64).sum::<f64>() / n,
        avg_reposts: records.iter().map(|r| r.repost_count as f64).sum::<f64>() / n,
        top_record,
        last_active_at,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{DateTime, Duration, Utc};

    fn rec(id: &str, age_hours: i64, followers: u64, likes: u64, reposts: u64) -> MentionRecord {
        let now: DateTime<Utc> = "2026-10-14T12:00:00Z".parse().unwrap();
        MentionRecord {
            id: id.to_string(),
            author_handle: "a".to_string(),
            author_follower_count: followers,
            created_at: now - Duration::hours(age_hours),
            like_count: likes,
            repost_count: reposts,
            text: String::new(),
            permalink: String::new(),
        }
    }

    fn worked_example() -> Vec<MentionRecord> {
        vec![
            rec("r0", 1, 1000, 10, 5),
            rec("r1", 2, 0, 1, 0),
            rec("r2", 3, 0, 0, 0),
        ]
    }

    #[test]
    fn test_worked_example_without_bonus() {
        let records = worked_example();
        let refs: Vec<&MentionRecord> = records.iter().collect();
        let score = score_user("a", &refs, &HashSet::new());
        assert!((score - 64.0).abs() < 1e-9, "got {}", score);
    }

    #[test]
    fn test_worked_example_with_bonus() {
        let records = worked_example();
        let refs: Vec<&MentionRecord> = records.iter().collect();
        let prior: HashSet<String> = ["a".to_string()].into_iter().collect();
        let score = score_user("a", &refs, &prior);
        assert!((score - 80.0).abs() < 1e-9, "got {}", score);
    }

    #[test]
    fn test_input_order_does_not_matter() {
        let records = worked_example();
        let forward: Vec<&MentionRecord> = records.iter().collect();
        let reversed: Vec<&MentionRecord> = records.iter().rev().collect();
        let prior = HashSet::new();
        assert_eq!(
            score_user("a", &forward, &prior),
            score_user("a", &reversed, &prior)
        );
    }

    #[test]
    fn test_deterministic() {
        let records = worked_example();
        let refs: Vec<&MentionRecord> = records.iter().collect();
        let prior = HashSet::new();
        let first = score_user("a", &refs, &prior);
        for _ in 0..10 {
            assert_eq!(score_user("a", &refs, &prior), first);
        }
    }

    #[test]
    fn test_best_record_scores_more_when_newest() {
        let prior = HashSet::new();
        let best_newest = vec![rec("big", 1, 0, 20, 0), rec("s1", 2, 0, 1, 0), rec("s2", 3, 0, 1, 0)];
        let best_oldest = vec![rec("s1", 1, 0, 1, 0), rec("s2", 2, 0, 1, 0), rec("big", 3, 0, 20, 0)];

        let a: Vec<&MentionRecord> = best_newest.iter().collect();
        let b: Vec<&MentionRecord> = best_oldest.iter().collect();
        assert!(score_user("a", &a, &prior) >= score_user("a", &b, &prior));
    }

    #[test]
    fn test_zero_engagement_is_excluded() {
        let records = vec![rec("z", 1, 0, 0, 0)];
        let refs: Vec<&MentionRecord> = records.iter().collect();
        assert!(user_stats("a", &refs, &HashSet::new()).is_none());
    }

    #[test]
    fn test_user_stats_fields() {
        let records = worked_example();
        let refs: Vec<&MentionRecord> = records.iter().collect();
        let stats = user_stats("a", &refs, &HashSet::new()).unwrap();
        assert_eq!(stats.mention_count, 3);
        assert_eq!(stats.top_record.id, "r0");
        assert_eq!(stats.last_active_at, records[0].created_at);
        assert!((stats.avg_likes - 11.0 / 3.0).abs() < 1e-9);
        assert!((stats.avg_reposts - 5.0 / 3.0).abs() < 1e-9);
    }

    #[test]
    fn test_most_viral_first_wins_ties() {
        let records = vec![rec("first", 1, 0, 2, 1), rec("second", 2, 0, 4, 0)];
        assert_eq!(most_viral(&records).unwrap().id, "first");
        assert!(most_viral(&Vec::<MentionRecord>::new()).is_none());
    }
}
