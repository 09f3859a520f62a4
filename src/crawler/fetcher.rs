//! HTTP fetcher implementation
//!
//! This module handles all HTTP requests for the crawler, including:
//! - Building HTTP clients with a stable user agent string
//! - GET requests with per-request timeouts
//! - Retry with exponential backoff and jitter for transient failures
//! - Error classification (transient vs permanent)
//! - Raw content retrieval that never fails loudly

use crate::config::FetchConfig;
use crate::crawler::retry::{RetryDecision, RetryPolicy, RetryState};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::{header::RETRY_AFTER, redirect::Policy, Client, StatusCode};
use std::collections::HashMap;
use std::error::Error as StdError;
use std::sync::Arc;
use std::time::Duration;
use url::Url;

/// Whether a failure is worth retrying
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    /// Timeout, connection reset, 5xx, 429
    Transient,
    /// 4xx other than 429, DNS failure, invalid request
    Permanent,
}

/// Outcome of fetching one URL
#[derive(Debug, Clone)]
pub enum FetchOutcome {
    /// Successfully fetched the page
    Success {
        /// Final URL after redirects
        final_url: String,
        /// HTTP status code
        status_code: u16,
        /// Page body content
        body: String,
    },

    /// The URL could not be fetched; after retries for transient failures
    Failed {
        /// HTTP status code, if a response was received
        status_code: Option<u16>,
        /// Error description
        reason: String,
        kind: FailureKind,
    },
}

/// Result of a fetch, including retries
#[derive(Debug, Clone)]
pub struct FetchResult {
    /// The requested URL
    pub url: String,
    pub outcome: FetchOutcome,
    /// When the last attempt completed
    pub fetched_at: DateTime<Utc>,
    /// Number of attempts made
    pub attempts: u32,
}

impl FetchResult {
    pub fn new(url: &Url, outcome: FetchOutcome, attempts: u32) -> Self {
        Self {
            url: url.to_string(),
            outcome,
            fetched_at: Utc::now(),
            attempts,
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self.outcome, FetchOutcome::Success { .. })
    }

    /// The page body, if the fetch succeeded
    pub fn body(&self) -> Option<&str> {
        match &self.outcome {
            FetchOutcome::Success { body, .. } => Some(body),
            FetchOutcome::Failed { .. } => None,
        }
    }

    /// The page body, or an empty string on failure
    pub fn into_body(self) -> String {
        match self.outcome {
            FetchOutcome::Success { body, .. } => body,
            FetchOutcome::Failed { .. } => String::new(),
        }
    }

    pub fn status_code(&self) -> Option<u16> {
        match &self.outcome {
            FetchOutcome::Success { status_code, .. } => Some(*status_code),
            FetchOutcome::Failed { status_code, .. } => *status_code,
        }
    }

    /// Failure description, if the fetch failed
    pub fn failure_reason(&self) -> Option<&str> {
        match &self.outcome {
            FetchOutcome::Success { .. } => None,
            FetchOutcome::Failed { reason, .. } => Some(reason),
        }
    }
}

/// Source of listing pages
///
/// Implementations never return errors: a page that cannot be retrieved is a
/// `FetchOutcome::Failed`, which callers treat as "zero links".
#[async_trait]
pub trait PageFetcher: Send + Sync {
    async fn fetch(&self, url: &Url) -> FetchResult;
}

/// Clock used between retry attempts
#[async_trait]
pub trait Sleeper: Send + Sync {
    async fn sleep(&self, duration: Duration);
}

/// Sleeps on the tokio timer
#[derive(Debug, Default, Clone, Copy)]
pub struct TokioSleeper;

#[async_trait]
impl Sleeper for TokioSleeper {
    async fn sleep(&self, duration: Duration) {
        tokio::time::sleep(duration).await;
    }
}

/// Builds an HTTP client with proper configuration
///
/// # Example
///
/// ```no_run
/// use pagecrawl::config::FetchConfig;
/// use pagecrawl::crawler::build_http_client;
///
/// let client = build_http_client(&FetchConfig::default()).unwrap();
/// ```
pub fn build_http_client(config: &FetchConfig) -> Result<Client, reqwest::Error> {
    Client::builder()
        .user_agent(config.user_agent.as_str())
        .timeout(Duration::from_millis(config.request_timeout_ms))
        .connect_timeout(Duration::from_millis(config.connect_timeout_ms))
        .redirect(Policy::limited(config.max_redirects))
        .gzip(true)
        .brotli(true)
        .build()
}

/// Fetcher backed by `reqwest` with bounded retries
///
/// # Retry Logic
///
/// | Condition | Action |
/// |-----------|--------|
/// | HTTP 2xx | Success |
/// | HTTP 429 | Retry (honoring Retry-After) |
/// | HTTP 5xx | Retry with backoff |
/// | Timeout, connection reset, body read error | Retry with backoff |
/// | Other HTTP status | Immediate failure |
/// | DNS failure, invalid request | Immediate failure |
#[derive(Clone)]
pub struct HttpFetcher {
    client: Client,
    policy: RetryPolicy,
    request_timeout: Duration,
    sleeper: Arc<dyn Sleeper>,
}

impl HttpFetcher {
    /// Creates a fetcher from fetch configuration
    pub fn new(config: &FetchConfig) -> Result<Self, reqwest::Error> {
        Ok(Self {
            client: build_http_client(config)?,
            policy: RetryPolicy::from(config),
            request_timeout: Duration::from_millis(config.request_timeout_ms),
            sleeper: Arc::new(TokioSleeper),
        })
    }

    /// Replaces the clock used between attempts
    pub fn with_sleeper(mut self, sleeper: Arc<dyn Sleeper>) -> Self {
        self.sleeper = sleeper;
        self
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    /// Fetches a URL, retrying transient failures, with an explicit per-request timeout
    pub async fn fetch_with_timeout(&self, url: &Url, timeout: Duration) -> FetchResult {
        let mut retry = RetryState::new(self.policy.clone());

        loop {
            let attempt = retry.begin_attempt();
            let (outcome, retry_after) = self.attempt(url, timeout).await;

            let (transient, reason) = match &outcome {
                FetchOutcome::Success { .. } => {
                    tracing::debug!(url = %url, attempt, "Fetched");
                    return FetchResult::new(url, outcome, attempt);
                }
                FetchOutcome::Failed { kind, reason, .. } => {
                    (*kind == FailureKind::Transient, reason.clone())
                }
            };

            match retry.on_failure(transient, retry_after) {
                RetryDecision::Retry(delay) => {
                    tracing::warn!(
                        "Error fetching {}: {} (attempt {}/{}, retrying in {:?})",
                        url,
                        reason,
                        attempt,
                        self.policy.max_attempts,
                        delay
                    );
                    self.sleeper.sleep(delay).await;
                }
                RetryDecision::GiveUp => {
                    if transient {
                        tracing::warn!(
                            "Giving up on {} after {} attempts: {}",
                            url,
                            attempt,
                            reason
                        );
                    } else {
                        tracing::info!("Permanent failure for {}: {}", url, reason);
                    }
                    return FetchResult::new(url, outcome, attempt);
                }
            }
        }
    }

    /// Performs a single GET; the second value is a Retry-After hint
    async fn attempt(&self, url: &Url, timeout: Duration) -> (FetchOutcome, Option<Duration>) {
        let response = match self.client.get(url.clone()).timeout(timeout).send().await {
            Ok(response) => response,
            Err(e) => return (classify_request_error(&e), None),
        };

        let status = response.status();
        let final_url = response.url().to_string();

        if !status.is_success() {
            let retry_after = if status == StatusCode::TOO_MANY_REQUESTS {
                response
                    .headers()
                    .get(RETRY_AFTER)
                    .and_then(|v| v.to_str().ok())
                    .and_then(|v| v.trim().parse::<u64>().ok())
                    .map(Duration::from_secs)
            } else {
                None
            };

            return (
                FetchOutcome::Failed {
                    status_code: Some(status.as_u16()),
                    reason: format!("HTTP {}", status),
                    kind: classify_status(status),
                },
                retry_after,
            );
        }

        match response.text().await {
            Ok(body) => (
                FetchOutcome::Success {
                    final_url,
                    status_code: status.as_u16(),
                    body,
                },
                None,
            ),
            Err(e) => (
                FetchOutcome::Failed {
                    status_code: Some(status.as_u16()),
                    reason: format!("Failed to read body: {}", e),
                    kind: FailureKind::Transient,
                },
                None,
            ),
        }
    }
}

#[async_trait]
impl PageFetcher for HttpFetcher {
    async fn fetch(&self, url: &Url) -> FetchResult {
        self.fetch_with_timeout(url, self.request_timeout).await
    }
}

/// Maps a non-success status to a failure kind
pub fn classify_status(status: StatusCode) -> FailureKind {
    if status == StatusCode::TOO_MANY_REQUESTS || status.is_server_error() {
        FailureKind::Transient
    } else {
        FailureKind::Permanent
    }
}

/// Maps a transport-level error to a failure outcome
fn classify_request_error(e: &reqwest::Error) -> FetchOutcome {
    let (kind, reason) = if e.is_timeout() {
        (FailureKind::Transient, "Request timeout".to_string())
    } else if e.is_connect() && is_dns_failure(e) {
        (FailureKind::Permanent, format!("DNS resolution failed: {}", e))
    } else if e.is_connect() {
        (FailureKind::Transient, format!("Connection failed: {}", e))
    } else if e.is_builder() || e.is_redirect() {
        (FailureKind::Permanent, e.to_string())
    } else {
        (FailureKind::Transient, e.to_string())
    };

    FetchOutcome::Failed {
        status_code: e.status().map(|s| s.as_u16()),
        reason,
        kind,
    }
}

/// Walks the error chain looking for a resolver failure
fn is_dns_failure(e: &reqwest::Error) -> bool {
    let mut source: Option<&(dyn StdError + 'static)> = Some(e as &(dyn StdError + 'static));
    while let Some(err) = source {
        let message = err.to_string().to_lowercase();
        if message.contains("dns error")
            || message.contains("failed to lookup address")
            || message.contains("name or service not known")
            || message.contains("no such host")
        {
            return true;
        }
        source = err.source();
    }
    false
}

/// Retrieves the raw HTML of a URL, or an empty string on any failure
///
/// Uses the fetcher's retry semantics; never returns an error so batch
/// processing survives partial outages.
pub async fn fetch_raw(fetcher: &dyn PageFetcher, url: &str) -> String {
    let parsed = match Url::parse(url) {
        Ok(parsed) => parsed,
        Err(e) => {
            tracing::warn!("Cannot fetch invalid URL {}: {}", url, e);
            return String::new();
        }
    };

    let result = fetcher.fetch(&parsed).await;
    if let Some(reason) = result.failure_reason() {
        tracing::warn!("Failed to fetch {}: {}", url, reason);
    }
    result.into_body()
}

/// Session-scoped map of fetched content, owned by the caller
///
/// Only successful, non-empty bodies are cached so a failed URL is tried
/// again on the next request.
#[derive(Debug, Default, Clone)]
pub struct ContentCache {
    entries: HashMap<String, String>,
}

impl ContentCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, url: &str) -> Option<&str> {
        self.entries.get(url).map(String::as_str)
    }

    pub fn insert(&mut self, url: impl Into<String>, content: String) {
        self.entries.insert(url.into(), content);
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Like [`fetch_raw`], consulting and filling `cache`
pub async fn fetch_raw_cached(
    fetcher: &dyn PageFetcher,
    url: &str,
    cache: &mut ContentCache,
) -> String {
    if let Some(content) = cache.get(url) {
        return content.to_string();
    }

    let content = fetch_raw(fetcher, url).await;
    if !content.is_empty() {
        cache.insert(url, content.clone());
    }
    content
}
