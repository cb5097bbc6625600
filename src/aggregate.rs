//! Ingestion and aggregation orchestration.
//!
//! Coordinates the full cycle: fetch → merge → partition → score →
//! snapshot. Each step loads the store fresh and persists once, so a
//! half-built snapshot never reaches disk.
//!
//! ```text
//! MentionFetcher ──▶ merge ──▶ Store ──▶ window ──▶ score ──▶ snapshot
//! ```

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};

use crate::config::Config;
use crate::fetch::MentionFetcher;
use crate::merge::{merge_and_persist, MergeOutcome};
use crate::models::{LeaderboardSnapshot, MentionRecord, StoreState};
use crate::score::{most_viral, user_stats};
use crate::store::{persist, Store};
use crate::window::{records_for_week, week_key};

/// What one aggregation pass did.
#[derive(Debug, Clone, PartialEq)]
pub enum AggregateOutcome {
    /// The current window had no records. Existing snapshots are untouched.
    NoData,
    /// A snapshot was written (or replaced) under `week_key`.
    Snapshot {
        week_key: String,
        ranked_users: usize,
        total_mentions: usize,
        replaced: bool,
        persisted: bool,
    },
}

/// Summary of one fetch → merge → aggregate cycle.
#[derive(Debug, Clone, PartialEq)]
pub struct CycleReport {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    pub fetched: usize,
    pub merge: MergeOutcome,
    /// `None` when nothing new was merged and aggregation was not forced.
    pub aggregate: Option<AggregateOutcome>,
}

/// Overrides for a single cycle.
#[derive(Debug, Clone, Default)]
pub struct CycleOptions {
    pub since: Option<DateTime<Utc>>,
    pub until: Option<DateTime<Utc>>,
    pub max_results: Option<u32>,
    /// Aggregate even if the merge added nothing.
    pub force_aggregate: bool,
}

/// Group scorable records by handle, keeping first-seen handle order.
fn group_by_author(records: &[MentionRecord]) -> Vec<(String, Vec<&MentionRecord>)> {
    let mut index: HashMap<&str, usize> = HashMap::new();
    let mut groups: Vec<(String, Vec<&MentionRecord>)> = Vec::new();

    for record in records.iter().filter(|r| r.is_scorable()) {
        match index.get(record.author_handle.as_str()) {
            Some(&i) => groups[i].1.push(record),
            None => {
                index.insert(record.author_handle.as_str(), groups.len());
                groups.push((record.author_handle.clone(), vec![record]));
            }
        }
    }

    groups
}

/// Compute the snapshot for the window ending at `now`.
///
/// Returns `None` when the current window is empty.
pub fn build_snapshot(records: &[MentionRecord], now: DateTime<Utc>) -> Option<LeaderboardSnapshot> {
    let current = records_for_week(records, now, 0);
    if current.is_empty() {
        return None;
    }

    let prior_active: HashSet<String> = records_for_week(records, now, 1)
        .into_iter()
        .filter(|r| r.is_scorable())
        .map(|r| r.author_handle)
        .collect();

    let mut ranked_users: Vec<_> = group_by_author(&current)
        .into_iter()
        .filter_map(|(handle, group)| user_stats(&handle, &group, &prior_active))
        .collect();
    // Stable: equal scores keep grouping order.
    ranked_users.sort_by(|a, b| {
        b.total_score
            .partial_cmp(&a.total_score)
            .unwrap_or(std::cmp::Ordering::Equal)
    });

    let most_viral_record = most_viral(&current)
        .cloned()
        .unwrap_or_else(|| MentionRecord::sentinel(now));

    Some(LeaderboardSnapshot {
        week_key: week_key(now),
        ranked_users,
        total_mention_count: current.len(),
        most_viral_record,
        generated_at: now,
    })
}

/// Insert or replace `snapshot` by week key, then keep only the newest
/// `retention` entries. Returns whether an existing entry was replaced.
pub fn upsert_snapshot(state: &mut StoreState, snapshot: LeaderboardSnapshot, retention: usize) -> bool {
    let replaced = match state
        .leaderboards
        .iter_mut()
        .find(|s| s.week_key == snapshot.week_key)
    {
        Some(existing) => {
            *existing = snapshot;
            true
        }
        None => {
            state.leaderboards.push(snapshot);
            false
        }
    };

    if state.leaderboards.len() > retention {
        let excess = state.leaderboards.len() - retention;
        state.leaderboards.drain(..excess);
    }

    replaced
}

/// Drives the fetcher, the merge, and snapshot aggregation against one store.
pub struct Aggregator {
    store: Arc<dyn Store>,
    fetcher: MentionFetcher,
    retention: usize,
    lookback: Duration,
    end_skew: Duration,
}

impl Aggregator {
    pub fn new(store: Arc<dyn Store>, fetcher: MentionFetcher, config: &Config) -> Self {
        Self {
            store,
            fetcher,
            retention: config.leaderboard.retention,
            lookback: Duration::days(config.search.lookback_days),
            end_skew: Duration::seconds(config.search.end_skew_secs),
        }
    }

    pub fn store(&self) -> &dyn Store {
        self.store.as_ref()
    }

    /// Recompute the current week's snapshot from stored records.
    pub fn aggregate(&self, now: DateTime<Utc>) -> AggregateOutcome {
        let mut state = self.store.load();
        self.aggregate_state(&mut state, now)
    }

    /// Rebuild the snapshot from `state` and persist the result.
    fn aggregate_state(&self, state: &mut StoreState, now: DateTime<Utc>) -> AggregateOutcome {
        let Some(snapshot) = build_snapshot(&state.tweets, now) else {
            tracing::info!("no mentions in the current window; leaving snapshots untouched");
            return AggregateOutcome::NoData;
        };

        let week_key = snapshot.week_key.clone();
        let ranked_users = snapshot.ranked_users.len();
        let total_mentions = snapshot.total_mention_count;
        let replaced = upsert_snapshot(state, snapshot, self.retention);
        let persisted = persist(self.store.as_ref(), state);

        tracing::info!(
            week_key = %week_key,
            ranked_users,
            total_mentions,
            replaced,
            "aggregated weekly leaderboard"
        );

        AggregateOutcome::Snapshot {
            week_key,
            ranked_users,
            total_mentions,
            replaced,
            persisted,
        }
    }

    /// Fetch range for a cycle at `now`: from the later of the previous
    /// cycle's range end (`last_fetch` minus the end skew) and the lookback
    /// horizon, up to `now` minus the end skew.
    ///
    /// Consecutive cycles overlap rather than leave a gap; the merge drops
    /// the re-fetched ids.
    pub fn fetch_range(&self, last_fetch: DateTime<Utc>, now: DateTime<Utc>) -> (DateTime<Utc>, DateTime<Utc>) {
        let horizon = now - self.lookback;
        let resume = last_fetch - self.end_skew;
        let start = if resume > horizon { resume } else { horizon };
        (start, now - self.end_skew)
    }

    /// Run one full fetch → merge → aggregate cycle.
    pub async fn run_cycle(&self, options: &CycleOptions, now: DateTime<Utc>) -> CycleReport {
        let mut state = self.store.load();
        let (default_start, default_end) = self.fetch_range(state.last_fetch, now);
        let start = options.since.unwrap_or(default_start);
        let end = options.until.unwrap_or(default_end);

        tracing::info!(%start, %end, query = %self.fetcher.query(), "starting mention sync");

        let fetched = self.fetcher.fetch(start, end, options.max_results).await;
        let fetched_count = fetched.len();
        let merge = merge_and_persist(self.store.as_ref(), &mut state, fetched, now);

        // Aggregates the merged in-memory state, even if the merge save failed.
        let aggregate = if merge.needs_aggregation() || options.force_aggregate {
            Some(self.aggregate_state(&mut state, now))
        } else {
            tracing::info!("no new mentions; skipping aggregation");
            None
        };

        CycleReport {
            start,
            end,
            fetched: fetched_count,
            merge,
            aggregate,
        }
    }
}
