//! Deduplicating merge of fetched mentions into the store.

use std::collections::HashSet;

use chrono::{DateTime, Utc};

use crate::models::{MentionRecord, StoreState};
use crate::store::{persist, Store};

/// Result of one merge.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MergeOutcome {
    /// Records appended by this merge.
    pub added: usize,
    /// Records in the store afterwards.
    pub total: usize,
    pub persisted: bool,
}

impl MergeOutcome {
    /// Re-aggregation is only worth running when something new arrived.
    pub fn needs_aggregation(&self) -> bool {
        self.added > 0
    }
}

/// Append records whose id is not yet in `state` and stamp `last_fetch`.
///
/// Returns the number of records appended. Duplicates inside `fetched`
/// are collapsed too, first occurrence wins.
pub fn merge_records(state: &mut StoreState, fetched: Vec<MentionRecord>, now: DateTime<Utc>) -> usize {
    let mut known: HashSet<String> = state.tweets.iter().map(|r| r.id.clone()).collect();
    let before = state.tweets.len();

    for record in fetched {
        if record.id.is_empty() {
            continue;
        }
        if known.insert(record.id.clone()) {
            state.tweets.push(record);
        }
    }

    state.last_fetch = now;
    state.tweets.len() - before
}

/// Load the store, merge `fetched`, and persist.
pub fn merge_into_store(store: &dyn Store, fetched: Vec<MentionRecord>, now: DateTime<Utc>) -> MergeOutcome {
    let mut state = store.load();
    merge_and_persist(store, &mut state, fetched, now)
}

/// Merge `fetched` into an already loaded `state` and persist it.
///
/// `state` keeps the merged records even when the save fails.
pub fn merge_and_persist(
    store: &dyn Store,
    state: &mut StoreState,
    fetched: Vec<MentionRecord>,
    now: DateTime<Utc>,
) -> MergeOutcome {
    let added = merge_records(state, fetched, now);
    let persisted = persist(store, state);

    tracing::info!(added, total = state.tweets.len(), "merged fetched mentions");

    MergeOutcome {
        added,
        total: state.tweets.len(),
        persisted,
    }
}
