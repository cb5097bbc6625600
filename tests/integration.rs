use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;

use chrono::{Duration, SecondsFormat, Utc};
use serde_json::{json, Value};
use tempfile::TempDir;

fn buzz_binary() -> PathBuf {
    PathBuf::from(env!("CARGO_BIN_EXE_buzz"))
}

/// Temp root with `config/buzz.toml` pointing at `data/mentions.json`.
///
/// The search URL is a closed local port, so `sync` exercises the
/// upstream-failure path without touching the network.
fn setup_test_env() -> (TempDir, PathBuf) {
    let tmp = TempDir::new().unwrap();
    let root = tmp.path().to_path_buf();

    let config_dir = root.join("config");
    fs::create_dir_all(&config_dir).unwrap();

    let config_content = format!(
        r#"[store]
path = "{}/data/mentions.json"

[query]
keywords = ["acme", "acme corp"]

[search]
url = "http://127.0.0.1:9/execute"
timeout_secs = 2
max_retries = 0
page_delay_ms = 0

[leaderboard]
retention = 4
display_limit = 5
"#,
        root.display()
    );

    let config_path = config_dir.join("buzz.toml");
    fs::write(&config_path, config_content).unwrap();

    (tmp, config_path)
}

fn store_path(tmp: &TempDir) -> PathBuf {
    tmp.path().join("data/mentions.json")
}

fn run_buzz(config_path: &Path, args: &[&str]) -> (String, String, bool) {
    let binary = buzz_binary();
    let output = Command::new(&binary)
        .arg("--config")
        .arg(config_path.to_str().unwrap())
        .args(args)
        .env_remove("RUST_LOG")
        .output()
        .unwrap_or_else(|e| panic!("Failed to run buzz binary at {:?}: {}", binary, e));

    let stdout = String::from_utf8_lossy(&output.stdout).to_string();
    let stderr = String::from_utf8_lossy(&output.stderr).to_string();
    (stdout, stderr, output.status.success())
}

fn mention(id: &str, handle: &str, hours_ago: i64, likes: u64, reposts: u64) -> Value {
    let created = (Utc::now() - Duration::hours(hours_ago)).to_rfc3339_opts(SecondsFormat::Millis, true);
    json!({
        "id": id,
        "authorHandle": handle,
        "authorFollowerCount": 0,
        "createdAt": created,
        "likeCount": likes,
        "repostCount": reposts,
        "text": format!("acme mention {}", id),
        "permalink": format!("https://x.com/{}/status/{}", handle, id)
    })
}

/// Write a store holding a few recent mentions and no snapshots.
fn seed_mentions(tmp: &TempDir) {
    let state = json!({
        "tweets": [
            mention("1", "alice", 1, 20, 4),
            mention("2", "bob", 2, 3, 0),
            mention("3", "alice", 30, 1, 0),
        ],
        "lastFetch": Utc::now().to_rfc3339(),
        "leaderboards": []
    });
    let path = store_path(tmp);
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    fs::write(&path, serde_json::to_string_pretty(&state).unwrap()).unwrap();
}

fn read_store(tmp: &TempDir) -> Value {
    serde_json::from_str(&fs::read_to_string(store_path(tmp)).unwrap()).unwrap()
}

#[test]
fn test_leaderboard_on_empty_store() {
    let (_tmp, config) = setup_test_env();
    let (stdout, stderr, success) = run_buzz(&config, &["leaderboard"]);
    assert!(success, "leaderboard failed: {}", stderr);
    assert!(stdout.contains("No data this week."), "unexpected output: {}", stdout);
}

#[test]
fn test_leaderboard_json_on_empty_store_is_null() {
    let (_tmp, config) = setup_test_env();
    let (stdout, _, success) = run_buzz(&config, &["leaderboard", "--json"]);
    assert!(success);
    assert_eq!(stdout.trim(), "null");
}

#[test]
fn test_aggregate_then_leaderboard() {
    let (tmp, config) = setup_test_env();
    seed_mentions(&tmp);

    let (stdout, stderr, success) = run_buzz(&config, &["aggregate"]);
    assert!(success, "aggregate failed: {}", stderr);
    assert!(stdout.contains("2 users, 3 mentions, new"), "unexpected output: {}", stdout);
    assert!(stdout.contains("ok"));

    let (stdout, _, success) = run_buzz(&config, &["leaderboard"]);
    assert!(success);
    assert!(stdout.contains("Leaderboard for the week of"));
    assert!(stdout.contains("@alice"));
    assert!(stdout.contains("@bob"));
    assert!(stdout.contains("Most viral: @alice"));

    // alice outranks bob
    let alice = stdout.find("@alice").unwrap();
    let bob = stdout.find("@bob").unwrap();
    assert!(alice < bob);
}

#[test]
fn test_leaderboard_json_and_limit() {
    let (tmp, config) = setup_test_env();
    seed_mentions(&tmp);
    run_buzz(&config, &["aggregate"]);

    let (stdout, _, success) = run_buzz(&config, &["leaderboard", "--json", "--limit", "1"]);
    assert!(success);
    let snapshot: Value = serde_json::from_str(&stdout).expect("leaderboard --json should be valid JSON");
    let ranked = snapshot["rankedUsers"].as_array().unwrap();
    assert_eq!(ranked.len(), 1);
    assert_eq!(ranked[0]["authorHandle"], "alice");
    assert_eq!(snapshot["totalMentionCount"], 3);
    assert_eq!(snapshot["mostViralRecord"]["id"], "1");
}

#[test]
fn test_aggregate_twice_replaces_snapshot() {
    let (tmp, config) = setup_test_env();
    seed_mentions(&tmp);

    run_buzz(&config, &["aggregate"]);
    let (stdout, _, success) = run_buzz(&config, &["aggregate"]);
    assert!(success);
    assert!(stdout.contains("replaced"), "unexpected output: {}", stdout);

    let store = read_store(&tmp);
    assert_eq!(store["leaderboards"].as_array().unwrap().len(), 1);
    assert_eq!(store["tweets"].as_array().unwrap().len(), 3);
}

#[test]
fn test_aggregate_without_current_mentions() {
    let (_tmp, config) = setup_test_env();
    let (stdout, _, success) = run_buzz(&config, &["aggregate"]);
    assert!(success);
    assert!(stdout.contains("no data this week"));
}

#[test]
fn test_history_lists_weeks() {
    let (tmp, config) = setup_test_env();

    let (stdout, _, success) = run_buzz(&config, &["history"]);
    assert!(success);
    assert!(stdout.contains("No leaderboards stored yet."));

    seed_mentions(&tmp);
    run_buzz(&config, &["aggregate"]);

    let (stdout, _, success) = run_buzz(&config, &["history"]);
    assert!(success);
    assert!(stdout.contains("WEEK"));
    assert!(stdout.contains("@alice"));

    let week_key = read_store(&tmp)["leaderboards"][0]["weekKey"]
        .as_str()
        .unwrap()
        .to_string();
    assert!(stdout.contains(&week_key));

    let (stdout, _, success) = run_buzz(&config, &["leaderboard", "--week", &week_key]);
    assert!(success);
    assert!(stdout.contains(&week_key));
}

#[test]
fn test_leaderboard_unknown_week_fails() {
    let (tmp, config) = setup_test_env();
    seed_mentions(&tmp);
    run_buzz(&config, &["aggregate"]);

    let (_, stderr, success) = run_buzz(&config, &["leaderboard", "--week", "1999-01-03"]);
    assert!(!success);
    assert!(stderr.contains("1999-01-03"));
}

#[test]
fn test_sync_with_unreachable_upstream() {
    let (tmp, config) = setup_test_env();
    seed_mentions(&tmp);
    let before = read_store(&tmp);

    let (stdout, stderr, success) = run_buzz(&config, &["sync"]);
    assert!(success, "sync failed: {}", stderr);
    assert!(stdout.contains("fetched: 0 mentions"), "unexpected output: {}", stdout);
    assert!(stdout.contains("new: 0"));
    assert!(stdout.contains("total stored: 3"));

    let after = read_store(&tmp);
    assert_eq!(after["tweets"], before["tweets"]);
    assert!(after["leaderboards"].as_array().unwrap().is_empty());
    assert_ne!(after["lastFetch"], before["lastFetch"]);
}

#[test]
fn test_sync_force_aggregate_builds_snapshot() {
    let (tmp, config) = setup_test_env();
    seed_mentions(&tmp);

    let (stdout, _, success) = run_buzz(&config, &["sync", "--force-aggregate"]);
    assert!(success);
    assert!(stdout.contains("leaderboard:"));
    assert_eq!(read_store(&tmp)["leaderboards"].as_array().unwrap().len(), 1);
}

#[test]
fn test_sync_rejects_bad_timestamp() {
    let (_tmp, config) = setup_test_env();
    let (_, _, success) = run_buzz(&config, &["sync", "--since", "yesterday-ish"]);
    assert!(!success);
}

#[test]
fn test_stats() {
    let (tmp, config) = setup_test_env();
    seed_mentions(&tmp);

    let (stdout, _, success) = run_buzz(&config, &["stats"]);
    assert!(success);
    assert!(stdout.contains("Buzzboard Store Stats"));
    assert!(stdout.contains("Mentions:      3"));
    assert!(stdout.contains("Authors:       2"));
}

#[test]
fn test_malformed_store_is_treated_as_empty() {
    let (tmp, config) = setup_test_env();
    let path = store_path(&tmp);
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    fs::write(&path, "{ not json").unwrap();

    let (stdout, _, success) = run_buzz(&config, &["leaderboard"]);
    assert!(success);
    assert!(stdout.contains("No data this week."));

    let (stdout, _, success) = run_buzz(&config, &["stats"]);
    assert!(success);
    assert!(stdout.contains("Mentions:      0"));
}

#[test]
fn test_missing_config_fails() {
    let (_, stderr, success) = run_buzz(Path::new("/nonexistent/buzz.toml"), &["stats"]);
    assert!(!success);
    assert!(!stderr.is_empty());
}

#[test]
fn test_invalid_config_fails() {
    let (tmp, config) = setup_test_env();
    let broken = fs::read_to_string(&config)
        .unwrap()
        .replace(r#"keywords = ["acme", "acme corp"]"#, "keywords = []");
    let broken_path = tmp.path().join("config/broken.toml");
    fs::write(&broken_path, broken).unwrap();

    let (_, stderr, success) = run_buzz(&broken_path, &["leaderboard"]);
    assert!(!success);
    assert!(stderr.to_lowercase().contains("keyword"), "unexpected stderr: {}", stderr);
}
