//! TOML configuration parsing and validation.
//!
//! A single [`Config`] is loaded at startup and passed by reference into
//! the store, fetcher and aggregator. Nothing reads settings from globals.

use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub store: StoreConfig,
    pub query: QueryConfig,
    pub search: SearchConfig,
    #[serde(default)]
    pub leaderboard: LeaderboardConfig,
    #[serde(default)]
    pub watch: WatchConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct StoreConfig {
    pub path: PathBuf,
}

#[derive(Debug, Deserialize, Clone)]
pub struct QueryConfig {
    /// Terms OR-ed together into the upstream search query.
    pub keywords: Vec<String>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct SearchConfig {
    /// Tool-execution URL that accepts `{endpoint, method, queryParams}`.
    pub url: String,
    #[serde(default = "default_endpoint")]
    pub endpoint: String,
    #[serde(default = "default_method")]
    pub method: String,
    /// Name of the environment variable holding a bearer token, if any.
    #[serde(default)]
    pub api_key_env: Option<String>,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    #[serde(default = "default_max_pages")]
    pub max_pages: usize,
    #[serde(default = "default_page_delay_ms")]
    pub page_delay_ms: u64,
    #[serde(default = "default_max_results")]
    pub max_results: u32,
    #[serde(default = "default_lookback_days")]
    pub lookback_days: i64,
    #[serde(default = "default_end_skew_secs")]
    pub end_skew_secs: i64,
}

fn default_endpoint() -> String {
    "/2/tweets/search/recent".to_string()
}
fn default_method() -> String {
    "GET".to_string()
}
fn default_timeout_secs() -> u64 {
    30
}
fn default_max_retries() -> u32 {
    2
}
fn default_max_pages() -> usize {
    10
}
fn default_page_delay_ms() -> u64 {
    2000
}
fn default_max_results() -> u32 {
    100
}
fn default_lookback_days() -> i64 {
    7
}
fn default_end_skew_secs() -> i64 {
    10
}

#[derive(Debug, Deserialize, Clone)]
pub struct LeaderboardConfig {
    /// Number of weekly snapshots kept in the store.
    #[serde(default = "default_retention")]
    pub retention: usize,
    #[serde(default = "default_display_limit")]
    pub display_limit: usize,
}

impl Default for LeaderboardConfig {
    fn default() -> Self {
        Self {
            retention: default_retention(),
            display_limit: default_display_limit(),
        }
    }
}

fn default_retention() -> usize {
    8
}
fn default_display_limit() -> usize {
    10
}

#[derive(Debug, Deserialize, Clone)]
pub struct WatchConfig {
    #[serde(default = "default_interval_secs")]
    pub interval_secs: u64,
}

impl Default for WatchConfig {
    fn default() -> Self {
        Self {
            interval_secs: default_interval_secs(),
        }
    }
}

fn default_interval_secs() -> u64 {
    3600
}

impl SearchConfig {
    /// Resolve the bearer token from the configured environment variable.
    pub fn api_key(&self) -> Option<String> {
        self.api_key_env
            .as_deref()
            .and_then(|name| std::env::var(name).ok())
            .filter(|v| !v.is_empty())
    }
}

pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    let config: Config = toml::from_str(&content).with_context(|| "Failed to parse config file")?;
    validate(&config)?;
    Ok(config)
}

fn validate(config: &Config) -> Result<()> {
    // Validate query
    if config.query.keywords.iter().all(|k| k.trim().is_empty()) {
        anyhow::bail!("query.keywords must contain at least one non-empty keyword");
    }

    // Validate search
    if config.search.url.trim().is_empty() {
        anyhow::bail!("search.url must be set");
    }
    if config.search.max_pages == 0 {
        anyhow::bail!("search.max_pages must be >= 1");
    }
    if config.search.lookback_days < 1 {
        anyhow::bail!("search.lookback_days must be >= 1");
    }
    if config.search.end_skew_secs < 0 {
        anyhow::bail!("search.end_skew_secs must be >= 0");
    }
    match config.search.method.to_ascii_uppercase().as_str() {
        "GET" | "POST" => {}
        other => anyhow::bail!("Unknown search.method: '{}'. Must be GET or POST.", other),
    }

    // Validate leaderboard
    if config.leaderboard.retention == 0 {
        anyhow::bail!("leaderboard.retention must be >= 1");
    }
    if config.leaderboard.display_limit == 0 {
        anyhow::bail!("leaderboard.display_limit must be >= 1");
    }

    if config.watch.interval_secs == 0 {
        anyhow::bail!("watch.interval_secs must be >= 1");
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    const MINIMAL: &str = r#"
[store]
path = "./data/mentions.json"

[query]
keywords = ["acme"]

[search]
url = "http://localhost:8080/execute"
"#;

    #[test]
    fn test_defaults_applied() {
        let config: Config = toml::from_str(MINIMAL).unwrap();
        validate(&config).unwrap();
        assert_eq!(config.search.max_pages, 10);
        assert_eq!(config.search.page_delay_ms, 2000);
        assert_eq!(config.search.max_results, 100);
        assert_eq!(config.search.endpoint, "/2/tweets/search/recent");
        assert_eq!(config.leaderboard.retention, 8);
        assert_eq!(config.watch.interval_secs, 3600);
    }

    #[test]
    fn test_rejects_empty_keywords() {
        let toml_str = MINIMAL.replace(r#"keywords = ["acme"]"#, r#"keywords = ["  "]"#);
        let config: Config = toml::from_str(&toml_str).unwrap();
        assert!(validate(&config).is_err());
    }

    #[test]
    fn test_rejects_zero_retention() {
        let toml_str = format!("{}\n[leaderboard]\nretention = 0\n", MINIMAL);
        let config: Config = toml::from_str(&toml_str).unwrap();
        let err = validate(&config).unwrap_err();
        assert!(err.to_string().contains("retention"));
    }

    #[test]
    fn test_rejects_unknown_method() {
        let toml_str = MINIMAL.replace(
            "url = \"http://localhost:8080/execute\"",
            "url = \"http://localhost:8080/execute\"\nmethod = \"PATCH\"",
        );
        let config: Config = toml::from_str(&toml_str).unwrap();
        assert!(validate(&config).is_err());
    }
}
