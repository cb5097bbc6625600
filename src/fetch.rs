//! Mention fetcher.
//!
//! Pulls every mention of the tracked keywords inside a time range from a
//! [`SearchSource`], following continuation cursors page by page, and
//! normalizes the raw tweet/user payloads into [`MentionRecord`]s.
//!
//! # Workflow
//!
//! 1. Build the fixed query: `(k1 OR k2 ...) -is:retweet`.
//! 2. Request pages newest-first until the cursor runs out or the page cap
//!    is hit, sleeping between pages.
//! 3. Collect raw tweets and raw users from every page. A tweet's author may
//!    arrive on a different page than the tweet itself.
//! 4. Join tweets to authors, drop unresolved authors, dedup by id.
//!
//! Fetching is best effort. Any failure (transport, upstream error,
//! malformed page) is logged and the whole call yields an empty list; the
//! caller cannot tell it apart from a quiet window, and doesn't need to.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Result};
use chrono::{DateTime, SecondsFormat, Utc};
use serde_json::Value;

use crate::config::Config;
use crate::models::{permalink, MentionRecord, UNKNOWN_HANDLE};
use crate::search_api::{SearchRequest, SearchSource};

const MIN_PAGE_RESULTS: u32 = 10;
const MAX_PAGE_RESULTS: u32 = 100;

const TWEET_FIELDS: &str = "created_at,public_metrics,author_id,text";
const USER_FIELDS: &str = "username,public_metrics";
const EXPANSIONS: &str = "author_id";

/// Paginated mention retrieval for one keyword set.
pub struct MentionFetcher {
    source: Arc<dyn SearchSource>,
    endpoint: String,
    method: String,
    query: String,
    max_pages: usize,
    page_delay: Duration,
    max_results: u32,
}

impl MentionFetcher {
    pub fn new(source: Arc<dyn SearchSource>, config: &Config) -> Self {
        Self {
            source,
            endpoint: config.search.endpoint.clone(),
            method: config.search.method.to_ascii_uppercase(),
            query: build_query(&config.query.keywords),
            max_pages: config.search.max_pages,
            page_delay: Duration::from_millis(config.search.page_delay_ms),
            max_results: config.search.max_results,
        }
    }

    pub fn query(&self) -> &str {
        &self.query
    }

    /// Fetch mentions created in `[start, end)`.
    ///
    /// `max_results` overrides the configured per-page count. Never fails:
    /// errors are logged and produce an empty list.
    pub async fn fetch(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        max_results: Option<u32>,
    ) -> Vec<MentionRecord> {
        if start >= end {
            tracing::debug!(%start, %end, "empty fetch range, skipping");
            return Vec::new();
        }

        match self.fetch_pages(start, end, max_results).await {
            Ok(records) => records,
            Err(e) => {
                tracing::warn!(error = %format!("{:#}", e), %start, %end, "mention fetch failed");
                Vec::new()
            }
        }
    }

    async fn fetch_pages(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        max_results: Option<u32>,
    ) -> Result<Vec<MentionRecord>> {
        let per_page = max_results
            .unwrap_or(self.max_results)
            .clamp(MIN_PAGE_RESULTS, MAX_PAGE_RESULTS);

        let mut tweets: Vec<RawTweet> = Vec::new();
        let mut users: HashMap<String, RawUser> = HashMap::new();
        let mut cursor: Option<String> = None;
        let mut pages = 0usize;

        while pages < self.max_pages {
            if pages > 0 {
                tokio::time::sleep(self.page_delay).await;
            }

            let request = self.page_request(start, end, per_page, cursor.as_deref());
            let payload = self.source.execute(&request).await?.into_payload()?;
            let page = parse_page(&payload)?;
            pages += 1;

            tracing::debug!(
                page = pages,
                tweets = page.tweets.len(),
                users = page.users.len(),
                has_next = page.next_token.is_some(),
                "fetched mention page"
            );

            tweets.extend(page.tweets);
            for user in page.users {
                users.insert(user.id.clone(), user);
            }

            match page.next_token {
                Some(token) => cursor = Some(token),
                None => break,
            }
        }

        if cursor.is_some() && pages >= self.max_pages {
            tracing::info!(
                max_pages = self.max_pages,
                "page cap reached; narrow the range to collect the rest"
            );
        }

        let records = join_authors(tweets, &users);
        tracing::info!(pages, records = records.len(), "mention fetch complete");
        Ok(records)
    }

    fn page_request(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        per_page: u32,
        cursor: Option<&str>,
    ) -> SearchRequest {
        let mut query_params = vec![
            ("query".to_string(), self.query.clone()),
            ("start_time".to_string(), format_ts(start)),
            ("end_time".to_string(), format_ts(end)),
            ("max_results".to_string(), per_page.to_string()),
            ("sort_order".to_string(), "recency".to_string()),
            ("expansions".to_string(), EXPANSIONS.to_string()),
            ("tweet.fields".to_string(), TWEET_FIELDS.to_string()),
            ("user.fields".to_string(), USER_FIELDS.to_string()),
        ];
        if let Some(token) = cursor {
            query_params.push(("next_token".to_string(), token.to_string()));
        }

        SearchRequest {
            endpoint: self.endpoint.clone(),
            method: self.method.clone(),
            query_params,
        }
    }
}

/// Build the fixed search query: keywords OR-ed, reposts excluded.
pub fn build_query(keywords: &[String]) -> String {
    let terms: Vec<String> = keywords
        .iter()
        .map(|k| k.trim())
        .filter(|k| !k.is_empty())
        .map(|k| {
            if k.contains(char::is_whitespace) {
                format!("\"{}\"", k.replace('"', ""))
            } else {
                k.to_string()
            }
        })
        .collect();
    format!("({}) -is:retweet", terms.join(" OR "))
}

fn format_ts(ts: DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Secs, true)
}

/// Coerce an upstream numeric field to a non-negative integer.
///
/// Null, missing, non-numeric, negative and non-finite values all become 0.
/// Numeric strings are accepted.
pub fn safe_number(value: Option<&Value>) -> u64 {
    let n = match value {
        Some(Value::Number(n)) => {
            if let Some(u) = n.as_u64() {
                return u;
            }
            n.as_f64()
        }
        Some(Value::String(s)) => s.trim().parse::<f64>().ok(),
        _ => None,
    };

    match n {
        Some(f) if f.is_finite() && f > 0.0 => f.floor() as u64,
        _ => 0,
    }
}

fn id_string(value: Option<&Value>) -> Option<String> {
    match value? {
        Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

fn str_field<'a>(value: &'a Value, keys: &[&str]) -> Option<&'a str> {
    keys.iter()
        .filter_map(|k| value.get(*k).and_then(Value::as_str))
        .map(str::trim)
        .find(|s| !s.is_empty())
}

/// First key among `keys` present on `metrics` or, failing that, on `value`.
fn metric<'a>(value: &'a Value, keys: &[&str]) -> Option<&'a Value> {
    let metrics = value.get("public_metrics");
    keys.iter()
        .find_map(|k| metrics.and_then(|m| m.get(*k)).filter(|v| !v.is_null()))
        .or_else(|| keys.iter().find_map(|k| value.get(*k).filter(|v| !v.is_null())))
}

#[derive(Debug, Clone)]
struct RawTweet {
    id: String,
    author_id: Option<String>,
    text: String,
    created_at: DateTime<Utc>,
    like_count: u64,
    repost_count: u64,
}

#[derive(Debug, Clone)]
struct RawUser {
    id: String,
    handle: Option<String>,
    follower_count: u64,
}

#[derive(Debug, Default)]
struct Page {
    tweets: Vec<RawTweet>,
    users: Vec<RawUser>,
    next_token: Option<String>,
}

fn parse_page(payload: &Value) -> Result<Page> {
    if !payload.is_object() {
        bail!("search page is not a JSON object");
    }

    let data = payload.get("data").and_then(Value::as_array);
    if data.is_none() {
        if let Some(errors) = payload.get("errors") {
            bail!("search returned errors: {}", errors);
        }
    }

    let mut page = Page::default();

    for raw in data.into_iter().flatten() {
        let Some(tweet) = parse_tweet(raw) else {
            tracing::debug!(raw = %raw, "skipping tweet without id or timestamp");
            continue;
        };

        // Some shapes embed the author instead of using includes.users.
        if let Some(author) = raw.get("author") {
            let fallback_id = tweet.author_id.clone();
            if let Some(user) = parse_user(author, fallback_id) {
                page.users.push(user);
            }
        }

        page.tweets.push(tweet);
    }

    let users = payload
        .get("includes")
        .and_then(|i| i.get("users"))
        .and_then(Value::as_array);
    for raw in users.into_iter().flatten() {
        if let Some(user) = parse_user(raw, None) {
            page.users.push(user);
        }
    }

    page.next_token = payload
        .get("meta")
        .and_then(|m| m.get("next_token"))
        .and_then(Value::as_str)
        .filter(|t| !t.is_empty())
        .map(str::to_string);

    Ok(page)
}

fn parse_tweet(raw: &Value) -> Option<RawTweet> {
    let id = id_string(raw.get("id"))?;
    let created_at = str_field(raw, &["created_at"])
        .and_then(|s| DateTime::parse_from_rfc3339(s).ok())
        .map(|dt| dt.with_timezone(&Utc))?;

    let author_id = id_string(raw.get("author_id")).or_else(|| {
        raw.get("author")
            .and_then(|a| id_string(a.get("id")))
    });

    Some(RawTweet {
        id,
        author_id,
        text: raw
            .get("text")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string(),
        created_at,
        like_count: safe_number(metric(raw, &["like_count", "favorite_count"])),
        repost_count: safe_number(metric(raw, &["retweet_count", "repost_count"])),
    })
}

fn parse_user(raw: &Value, fallback_id: Option<String>) -> Option<RawUser> {
    let id = id_string(raw.get("id")).or(fallback_id)?;
    Some(RawUser {
        id,
        handle: str_field(raw, &["username", "screen_name", "handle"])
            .map(|h| h.trim_start_matches('@').to_string())
            .filter(|h| !h.is_empty()),
        follower_count: safe_number(metric(raw, &["followers_count"])),
    })
}

/// Resolve authors, then drop unresolved records and in-call duplicates.
fn join_authors(tweets: Vec<RawTweet>, users: &HashMap<String, RawUser>) -> Vec<MentionRecord> {
    let mut seen: HashSet<String> = HashSet::new();
    let mut records = Vec::with_capacity(tweets.len());

    for tweet in tweets {
        if !seen.insert(tweet.id.clone()) {
            continue;
        }

        let author = tweet.author_id.as_ref().and_then(|id| users.get(id));
        let (handle, followers) = match author.and_then(|u| u.handle.clone().map(|h| (h, u))) {
            Some((handle, user)) => (handle, user.follower_count),
            None => (UNKNOWN_HANDLE.to_string(), 0),
        };

        let record = MentionRecord {
            permalink: permalink(&handle, &tweet.id),
            id: tweet.id,
            author_handle: handle,
            author_follower_count: followers,
            created_at: tweet.created_at,
            like_count: tweet.like_count,
            repost_count: tweet.repost_count,
            text: tweet.text,
        };

        if record.author_handle == UNKNOWN_HANDLE {
            tracing::debug!(id = %record.id, "dropping mention with unresolved author");
            continue;
        }
        records.push(record);
    }

    records
}
