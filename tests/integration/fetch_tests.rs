//! Integration tests for the fetcher
//!
//! These tests run the real `reqwest`-based fetcher against wiremock servers
//! and record backoff delays instead of sleeping.

use async_trait::async_trait;
use pagecrawl::config::FetchConfig;
use pagecrawl::crawler::{
    fetch_raw, fetch_raw_cached, ContentCache, FailureKind, FetchOutcome, HttpFetcher,
    PageFetcher, Sleeper,
};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use url::Url;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// Records requested delays and returns immediately
#[derive(Default)]
struct RecordingSleeper {
    delays: Mutex<Vec<Duration>>,
}

impl RecordingSleeper {
    fn delays(&self) -> Vec<Duration> {
        self.delays.lock().unwrap().clone()
    }
}

#[async_trait]
impl Sleeper for RecordingSleeper {
    async fn sleep(&self, duration: Duration) {
        self.delays.lock().unwrap().push(duration);
    }
}

fn test_fetcher(max_attempts: u32) -> (HttpFetcher, Arc<RecordingSleeper>) {
    let config = FetchConfig {
        max_attempts,
        base_delay_ms: 100,
        max_delay_ms: 1000,
        jitter: 0.0,
        request_timeout_ms: 2000,
        ..FetchConfig::default()
    };
    let sleeper = Arc::new(RecordingSleeper::default());
    let fetcher = HttpFetcher::new(&config)
        .expect("Failed to build fetcher")
        .with_sleeper(sleeper.clone());
    (fetcher, sleeper)
}

fn page_url(server: &MockServer, page: &str) -> Url {
    Url::parse(&format!("{}{}", server.uri(), page)).expect("Failed to parse URL")
}

#[tokio::test]
async fn test_two_failures_then_success_sleeps_twice() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/news"))
        .respond_with(ResponseTemplate::new(500))
        .up_to_n_times(2)
        .expect(2)
        .mount(&mock_server)
        .await;

    Mock::given(method("GET"))
        .and(path("/news"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html>ok</html>"))
        .expect(1)
        .mount(&mock_server)
        .await;

    let (fetcher, sleeper) = test_fetcher(3);
    let result = fetcher.fetch(&page_url(&mock_server, "/news")).await;

    assert!(result.is_success());
    assert_eq!(result.body(), Some("<html>ok</html>"));
    assert_eq!(result.attempts, 3);
    assert_eq!(
        sleeper.delays(),
        vec![Duration::from_millis(100), Duration::from_millis(200)]
    );
}

#[tokio::test]
async fn test_no_sleep_after_final_attempt() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/down"))
        .respond_with(ResponseTemplate::new(503))
        .expect(3)
        .mount(&mock_server)
        .await;

    let (fetcher, sleeper) = test_fetcher(3);
    let result = fetcher.fetch(&page_url(&mock_server, "/down")).await;

    assert!(!result.is_success());
    assert_eq!(result.status_code(), Some(503));
    assert_eq!(sleeper.delays().len(), 2);
}

#[tokio::test]
async fn test_not_found_is_not_retried() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/missing"))
        .respond_with(ResponseTemplate::new(404))
        .expect(1)
        .mount(&mock_server)
        .await;

    let (fetcher, sleeper) = test_fetcher(3);
    let result = fetcher.fetch(&page_url(&mock_server, "/missing")).await;

    match result.outcome {
        FetchOutcome::Failed {
            status_code, kind, ..
        } => {
            assert_eq!(status_code, Some(404));
            assert_eq!(kind, FailureKind::Permanent);
        }
        FetchOutcome::Success { .. } => panic!("Expected failure"),
    }
    assert!(sleeper.delays().is_empty());
}

#[tokio::test]
async fn test_rate_limit_honors_retry_after() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/busy"))
        .respond_with(ResponseTemplate::new(429).insert_header("Retry-After", "30"))
        .up_to_n_times(1)
        .mount(&mock_server)
        .await;

    Mock::given(method("GET"))
        .and(path("/busy"))
        .respond_with(ResponseTemplate::new(200).set_body_string("done"))
        .mount(&mock_server)
        .await;

    let (fetcher, sleeper) = test_fetcher(3);
    let result = fetcher.fetch(&page_url(&mock_server, "/busy")).await;

    assert!(result.is_success());
    // Clamped to max-delay-ms
    assert_eq!(sleeper.delays(), vec![Duration::from_millis(1000)]);
}

#[tokio::test]
async fn test_redirect_is_followed() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/old"))
        .respond_with(
            ResponseTemplate::new(301).insert_header("Location", format!("{}/new", mock_server.uri()).as_str()),
        )
        .mount(&mock_server)
        .await;

    Mock::given(method("GET"))
        .and(path("/new"))
        .respond_with(ResponseTemplate::new(200).set_body_string("moved"))
        .mount(&mock_server)
        .await;

    let (fetcher, _) = test_fetcher(1);
    let result = fetcher.fetch(&page_url(&mock_server, "/old")).await;

    match result.outcome {
        FetchOutcome::Success {
            final_url, body, ..
        } => {
            assert!(final_url.ends_with("/new"));
            assert_eq!(body, "moved");
        }
        FetchOutcome::Failed { reason, .. } => panic!("Expected success, got {}", reason),
    }
}

#[tokio::test]
async fn test_fetch_raw_is_empty_on_failure() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/gone"))
        .respond_with(ResponseTemplate::new(410))
        .mount(&mock_server)
        .await;

    let (fetcher, _) = test_fetcher(2);
    let content = fetch_raw(&fetcher, &format!("{}/gone", mock_server.uri())).await;
    assert_eq!(content, "");

    assert_eq!(fetch_raw(&fetcher, "not a url").await, "");
}

#[tokio::test]
async fn test_content_cache_avoids_refetch() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/article/2024/robots"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<p>robots</p>"))
        .expect(1)
        .mount(&mock_server)
        .await;

    let (fetcher, _) = test_fetcher(1);
    let url = format!("{}/article/2024/robots", mock_server.uri());
    let mut cache = ContentCache::new();

    let first = fetch_raw_cached(&fetcher, &url, &mut cache).await;
    let second = fetch_raw_cached(&fetcher, &url, &mut cache).await;

    assert_eq!(first, "<p>robots</p>");
    assert_eq!(first, second);
    assert_eq!(cache.len(), 1);
}
