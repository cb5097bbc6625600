//! Upstream search capability.
//!
//! The fetcher talks to the social search API through an opaque
//! request/response seam: it sends `{ endpoint, method, queryParams }` and
//! receives `{ output }`, where `output` is either a JSON object or a
//! string holding one. [`SearchSource`] is that seam; [`HttpSearchSource`]
//! is the production implementation, which posts the request to a
//! tool-execution URL.
//!
//! # Retry
//!
//! [`HttpSearchSource`] retries transient failures with exponential
//! backoff (1s, 2s, 4s, ... capped at 32s):
//! - HTTP 429 and 5xx → retry
//! - Network errors → retry
//! - Other 4xx → fail immediately

use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::Value;
use thiserror::Error;

use crate::config::SearchConfig;

pub type Result<T> = std::result::Result<T, SearchError>;

#[derive(Debug, Error)]
pub enum SearchError {
    #[error("Network error: {0}")]
    Network(String),

    #[error("API error (status {status}): {message}")]
    Api { status: u16, message: String },

    #[error("Parse error: {0}")]
    Parse(String),
}

impl From<reqwest::Error> for SearchError {
    fn from(err: reqwest::Error) -> Self {
        SearchError::Network(err.to_string())
    }
}

impl From<serde_json::Error> for SearchError {
    fn from(err: serde_json::Error) -> Self {
        SearchError::Parse(err.to_string())
    }
}

/// One call to the upstream capability.
#[derive(Debug, Clone, PartialEq)]
pub struct SearchRequest {
    pub endpoint: String,
    pub method: String,
    pub query_params: Vec<(String, String)>,
}

impl SearchRequest {
    pub fn param(&self, key: &str) -> Option<&str> {
        self.query_params
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    fn body(&self) -> Value {
        let params: serde_json::Map<String, Value> = self
            .query_params
            .iter()
            .map(|(k, v)| (k.clone(), Value::String(v.clone())))
            .collect();
        serde_json::json!({
            "endpoint": self.endpoint,
            "method": self.method,
            "queryParams": params,
        })
    }
}

/// Raw reply from the capability.
#[derive(Debug, Clone, Deserialize)]
pub struct SearchResponse {
    #[serde(default)]
    pub output: Value,
}

impl SearchResponse {
    /// Resolve `output` to a JSON value, parsing it first if it arrived as a string.
    pub fn into_payload(self) -> Result<Value> {
        match self.output {
            Value::String(s) => Ok(serde_json::from_str(&s)?),
            Value::Null => Err(SearchError::Parse("response has no output".to_string())),
            other => Ok(other),
        }
    }
}

/// A paginated search backend.
///
/// Implement this to feed the fetcher from something other than HTTP,
/// e.g. a scripted sequence of pages in tests.
#[async_trait]
pub trait SearchSource: Send + Sync {
    /// Execute one page request.
    async fn execute(&self, request: &SearchRequest) -> Result<SearchResponse>;
}

/// [`SearchSource`] backed by a tool-execution HTTP endpoint.
pub struct HttpSearchSource {
    client: reqwest::Client,
    url: String,
    api_key: Option<String>,
    max_retries: u32,
}

impl HttpSearchSource {
    pub fn new(config: &SearchConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;

        Ok(Self {
            client,
            url: config.url.clone(),
            api_key: config.api_key(),
            max_retries: config.max_retries,
        })
    }
}

#[async_trait]
impl SearchSource for HttpSearchSource {
    async fn execute(&self, request: &SearchRequest) -> Result<SearchResponse> {
        let body = request.body();
        let mut last_err = None;

        for attempt in 0..=self.max_retries {
            if attempt > 0 {
                let delay = Duration::from_secs(1 << (attempt - 1).min(5));
                tracing::debug!(attempt, delay_secs = delay.as_secs(), "retrying search request");
                tokio::time::sleep(delay).await;
            }

            let mut req = self.client.post(&self.url).json(&body);
            if let Some(ref key) = self.api_key {
                req = req.bearer_auth(key);
            }

            match req.send().await {
                Ok(resp) => {
                    let status = resp.status();
                    if status.is_success() {
                        let text = resp.text().await?;
                        return Ok(serde_json::from_str(&text)?);
                    }

                    let message = resp.text().await.unwrap_or_default();
                    let err = SearchError::Api {
                        status: status.as_u16(),
                        message: message.chars().take(500).collect(),
                    };

                    // Rate limited or server error: retry
                    if status.as_u16() == 429 || status.is_server_error() {
                        last_err = Some(err);
                        continue;
                    }

                    return Err(err);
                }
                Err(e) => {
                    last_err = Some(e.into());
                    continue;
                }
            }
        }

        Err(last_err.unwrap_or_else(|| {
            SearchError::Network("search request failed after retries".to_string())
        }))
    }
}
