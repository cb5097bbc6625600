//! Core data models used throughout Buzzboard.
//!
//! These types mirror the persisted JSON document one-to-one: the field
//! names on disk are camelCase (`authorHandle`, `weekKey`, ...) and the top
//! level keys are `tweets`, `lastFetch` and `leaderboards`.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Handle assigned when a tweet's author could not be resolved.
pub const UNKNOWN_HANDLE: &str = "unknown";

/// Handle of the placeholder record used when a window has no mentions.
pub const NONE_HANDLE: &str = "none";

/// Base URL used to build record permalinks.
pub const PERMALINK_BASE: &str = "https://x.com";

/// One social post referencing the tracked keyword set.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MentionRecord {
    pub id: String,
    pub author_handle: String,
    #[serde(default)]
    pub author_follower_count: u64,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub like_count: u64,
    #[serde(default)]
    pub repost_count: u64,
    #[serde(default)]
    pub text: String,
    #[serde(default)]
    pub permalink: String,
}

impl MentionRecord {
    /// Engagement used for viral selection: `likes + 2 * reposts`.
    pub fn viral_score(&self) -> u64 {
        self.like_count
            .saturating_add(self.repost_count.saturating_mul(2))
    }

    /// Records with an unresolved or placeholder author never reach the scorer.
    pub fn is_scorable(&self) -> bool {
        !self.id.is_empty()
            && !self.author_handle.is_empty()
            && self.author_handle != UNKNOWN_HANDLE
            && self.author_handle != NONE_HANDLE
    }

    /// Placeholder stored as `mostViralRecord` for an empty window.
    pub fn sentinel(at: DateTime<Utc>) -> Self {
        Self {
            id: String::new(),
            author_handle: NONE_HANDLE.to_string(),
            author_follower_count: 0,
            created_at: at,
            like_count: 0,
            repost_count: 0,
            text: String::new(),
            permalink: String::new(),
        }
    }
}

pub fn permalink(handle: &str, id: &str) -> String {
    format!("{}/{}/status/{}", PERMALINK_BASE, handle, id)
}

/// One user's aggregate within a scoring window.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserStats {
    pub author_handle: String,
    pub total_score: f64,
    pub mention_count: usize,
    pub avg_likes: f64,
    pub avg_reposts: f64,
    pub top_record: MentionRecord,
    pub last_active_at: DateTime<Utc>,
}

/// One computed weekly ranking.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LeaderboardSnapshot {
    pub week_key: String,
    pub ranked_users: Vec<UserStats>,
    pub total_mention_count: usize,
    pub most_viral_record: MentionRecord,
    #[serde(default)]
    pub generated_at: DateTime<Utc>,
}

/// The whole persisted document.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StoreState {
    #[serde(default)]
    pub tweets: Vec<MentionRecord>,
    #[serde(default, rename = "lastFetch")]
    pub last_fetch: DateTime<Utc>,
    #[serde(default)]
    pub leaderboards: Vec<LeaderboardSnapshot>,
}

impl StoreState {
    pub fn snapshot(&self, week_key: &str) -> Option<&LeaderboardSnapshot> {
        self.leaderboards.iter().find(|s| s.week_key == week_key)
    }

    pub fn latest_snapshot(&self) -> Option<&LeaderboardSnapshot> {
        self.leaderboards.last()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_viral_score_weights_reposts_double() {
        let mut r = MentionRecord::sentinel(Utc::now());
        r.like_count = 7;
        r.repost_count = 3;
        assert_eq!(r.viral_score(), 13);
    }

    #[test]
    fn test_permalink_format() {
        assert_eq!(permalink("alice", "42"), "https://x.com/alice/status/42");
    }

    #[test]
    fn test_sentinel_not_scorable() {
        assert!(!MentionRecord::sentinel(Utc::now()).is_scorable());
    }

    #[test]
    fn test_state_json_keys() {
        let json = serde_json::to_value(StoreState::default()).unwrap();
        assert!(json.get("tweets").is_some());
        assert!(json.get("lastFetch").is_some());
        assert!(json.get("leaderboards").is_some());
    }

    #[test]
    fn test_missing_last_fetch_defaults_to_epoch() {
        let state: StoreState = serde_json::from_str(r#"{"tweets": []}"#).unwrap();
        assert_eq!(state.last_fetch.timestamp(), 0);
        assert!(state.leaderboards.is_empty());
    }
}
