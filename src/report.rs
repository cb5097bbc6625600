//! Leaderboard, history and store statistics for the CLI.
//!
//! Rendering is split from printing so the text can be tested directly.
//! Everything here is read-only: the store is loaded, never saved.

use std::collections::HashSet;

use anyhow::{bail, Result};
use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::config::Config;
use crate::models::{LeaderboardSnapshot, StoreState, NONE_HANDLE};
use crate::store::{JsonFileStore, Store};
use crate::window::{records_for_week, week_key};

pub const NO_DATA: &str = "No data this week.";

/// Render a snapshot as a ranked table, at most `limit` rows.
pub fn render_leaderboard(snapshot: &LeaderboardSnapshot, limit: usize) -> String {
    let mut out = String::new();
    out.push_str(&format!("Leaderboard for the week of {}\n", snapshot.week_key));
    out.push_str(&format!(
        "  {} mention{} in window\n\n",
        snapshot.total_mention_count,
        if snapshot.total_mention_count == 1 { "" } else { "s" }
    ));

    if snapshot.ranked_users.is_empty() {
        out.push_str(NO_DATA);
        out.push('\n');
    } else {
        out.push_str(&format!(
            "  {:>4}  {:<20} {:>10} {:>8} {:>9} {:>11}\n",
            "RANK", "USER", "SCORE", "POSTS", "AVG LIKES", "AVG REPOSTS"
        ));
        out.push_str(&format!("  {}\n", "-".repeat(68)));
        for (i, user) in snapshot.ranked_users.iter().take(limit).enumerate() {
            out.push_str(&format!(
                "  {:>4}  {:<20} {:>10.2} {:>8} {:>9.1} {:>11.1}\n",
                i + 1,
                format!("@{}", user.author_handle),
                user.total_score,
                user.mention_count,
                user.avg_likes,
                user.avg_reposts
            ));
        }
    }

    let viral = &snapshot.most_viral_record;
    if viral.author_handle != NONE_HANDLE {
        out.push_str(&format!(
            "\n  Most viral: @{} ({} likes, {} reposts) {}\n",
            viral.author_handle, viral.like_count, viral.repost_count, viral.permalink
        ));
    }

    out
}

/// Pick the snapshot to show: the named week, or the newest one.
pub fn select_snapshot<'a>(state: &'a StoreState, week: Option<&str>) -> Option<&'a LeaderboardSnapshot> {
    match week {
        Some(key) => state.snapshot(key),
        None => state.latest_snapshot(),
    }
}

pub fn run_leaderboard(config: &Config, week: Option<&str>, limit: Option<usize>, json: bool) -> Result<()> {
    let state = JsonFileStore::from_config(config).load();
    let limit = limit.unwrap_or(config.leaderboard.display_limit);

    let Some(snapshot) = select_snapshot(&state, week) else {
        if let Some(key) = week {
            bail!("No leaderboard stored for week '{}'", key);
        }
        if json {
            println!("null");
        } else {
            println!("{}", NO_DATA);
        }
        return Ok(());
    };

    if json {
        let mut trimmed = snapshot.clone();
        trimmed.ranked_users.truncate(limit);
        println!("{}", serde_json::to_string_pretty(&trimmed)?);
    } else {
        print!("{}", render_leaderboard(snapshot, limit));
    }
    Ok(())
}

#[derive(Debug, Serialize)]
struct HistoryEntry<'a> {
    week_key: &'a str,
    users: usize,
    mentions: usize,
    leader: Option<&'a str>,
    top_score: Option<f64>,
}

pub fn run_history(config: &Config, json: bool) -> Result<()> {
    let state = JsonFileStore::from_config(config).load();

    let entries: Vec<HistoryEntry> = state
        .leaderboards
        .iter()
        .rev()
        .map(|s| HistoryEntry {
            week_key: &s.week_key,
            users: s.ranked_users.len(),
            mentions: s.total_mention_count,
            leader: s.ranked_users.first().map(|u| u.author_handle.as_str()),
            top_score: s.ranked_users.first().map(|u| u.total_score),
        })
        .collect();

    if json {
        println!("{}", serde_json::to_string_pretty(&entries)?);
        return Ok(());
    }

    if entries.is_empty() {
        println!("No leaderboards stored yet.");
        return Ok(());
    }

    println!("{:<12} {:>6} {:>9}   LEADER", "WEEK", "USERS", "MENTIONS");
    for e in &entries {
        let leader = match (e.leader, e.top_score) {
            (Some(handle), Some(score)) => format!("@{} ({:.2})", handle, score),
            _ => "-".to_string(),
        };
        println!("{:<12} {:>6} {:>9}   {}", e.week_key, e.users, e.mentions, leader);
    }
    Ok(())
}

pub fn run_stats(config: &Config) -> Result<()> {
    let store = JsonFileStore::from_config(config);
    let state = store.load();
    let now = Utc::now();

    let size = std::fs::metadata(store.path()).map(|m| m.len()).unwrap_or(0);
    let authors: HashSet<&str> = state
        .tweets
        .iter()
        .filter(|r| r.is_scorable())
        .map(|r| r.author_handle.as_str())
        .collect();
    let current = records_for_week(&state.tweets, now, 0).len();
    let prior = records_for_week(&state.tweets, now, 1).len();

    println!("Buzzboard Store Stats");
    println!("=====================");
    println!();
    println!("  Store:         {}", store.path().display());
    println!("  Size:          {}", format_bytes(size));
    println!("  Last fetch:    {}", format_relative(state.last_fetch, now));
    println!();
    println!("  Mentions:      {}", state.tweets.len());
    println!("  Authors:       {}", authors.len());
    println!("  This week:     {}", current);
    println!("  Last week:     {}", prior);
    println!("  Week key:      {}", week_key(now));
    println!("  Snapshots:     {} / {}", state.leaderboards.len(), config.leaderboard.retention);
    println!();
    Ok(())
}

/// Format a byte count as a human-readable string.
fn format_bytes(bytes: u64) -> String {
    if bytes < 1024 {
        format!("{} B", bytes)
    } else if bytes < 1024 * 1024 {
        format!("{:.1} KB", bytes as f64 / 1024.0)
    } else {
        format!("{:.1} MB", bytes as f64 / (1024.0 * 1024.0))
    }
}

/// Format a timestamp relative to `now` (e.g. "3 hours ago").
fn format_relative(ts: DateTime<Utc>, now: DateTime<Utc>) -> String {
    if ts.timestamp() == 0 {
        return "never".to_string();
    }

    let delta = (now - ts).num_seconds();
    if delta < 0 {
        return ts.format("%Y-%m-%d %H:%M").to_string();
    }

    if delta < 60 {
        "just now".to_string()
    } else if delta < 3600 {
        let mins = delta / 60;
        format!("{} min{} ago", mins, if mins == 1 { "" } else { "s" })
    } else if delta < 86400 {
        let hours = delta / 3600;
        format!("{} hour{} ago", hours, if hours == 1 { "" } else { "s" })
    } else if delta < 86400 * 30 {
        let days = delta / 86400;
        format!("{} day{} ago", days, if days == 1 { "" } else { "s" })
    } else {
        ts.format("%Y-%m-%d %H:%M").to_string()
    }
}
