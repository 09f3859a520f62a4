//! Integration tests for the crawler
//!
//! These tests use wiremock to create mock HTTP servers and test
//! the full classify-and-paginate cycle end-to-end.

use async_trait::async_trait;
use pagecrawl::config::{parse_config, FetchConfig};
use pagecrawl::crawler::{
    FetchResult, HttpFetcher, PageFetcher, RenderStop, RenderedPage, Renderer, StopReason,
    StrategyDecision,
};
use pagecrawl::{Crawler, RenderError, SeedRequest};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tokio_util::sync::CancellationToken;
use url::Url;
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// Renderer that records its calls and returns fixed HTML
struct SpyRenderer {
    html: String,
    calls: Mutex<Vec<(String, u32)>>,
}

impl SpyRenderer {
    fn new(html: &str) -> Self {
        Self {
            html: html.to_string(),
            calls: Mutex::new(Vec::new()),
        }
    }

    fn calls(&self) -> Vec<(String, u32)> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl Renderer for SpyRenderer {
    async fn render_and_collect(
        &self,
        url: &Url,
        max_steps: u32,
    ) -> Result<RenderedPage, RenderError> {
        self.calls.lock().unwrap().push((url.to_string(), max_steps));
        Ok(RenderedPage {
            html: self.html.clone(),
            steps_taken: max_steps,
            stop: RenderStop::StepBudget,
        })
    }
}

/// Renderer whose browser never starts
struct UnavailableRenderer;

#[async_trait]
impl Renderer for UnavailableRenderer {
    async fn render_and_collect(
        &self,
        _url: &Url,
        _max_steps: u32,
    ) -> Result<RenderedPage, RenderError> {
        Err(RenderError::Launch("chrome not found".to_string()))
    }
}

/// Fetcher that cancels the crawl once it has served `after` pages
struct CancellingFetcher {
    inner: HttpFetcher,
    token: CancellationToken,
    after: usize,
    served: AtomicUsize,
}

#[async_trait]
impl PageFetcher for CancellingFetcher {
    async fn fetch(&self, url: &Url) -> FetchResult {
        let result = self.inner.fetch(url).await;
        if self.served.fetch_add(1, Ordering::SeqCst) + 1 >= self.after {
            self.token.cancel();
        }
        result
    }
}

fn fast_fetcher() -> HttpFetcher {
    let config = FetchConfig {
        max_attempts: 1,
        request_timeout_ms: 2000,
        ..FetchConfig::default()
    };
    HttpFetcher::new(&config).expect("Failed to build fetcher")
}

/// Creates a crawler with a fast-failing HTTP fetcher and the given renderer
fn create_test_crawler(renderer: Arc<dyn Renderer>) -> Crawler {
    Crawler::new(Arc::new(fast_fetcher()), renderer)
}

fn listing(links: &[&str], next: Option<&str>) -> String {
    let mut html = String::from("<html><body><ul>");
    for link in links {
        html.push_str(&format!(r#"<li><a href="{}">Story</a></li>"#, link));
    }
    html.push_str("</ul>");
    if let Some(next) = next {
        html.push_str(&format!(r#"<a href="{}">Next page</a>"#, next));
    }
    html.push_str("</body></html>");
    html
}

async fn mount_page(server: &MockServer, page_path: &str, body: String, expected: u64) {
    Mock::given(method("GET"))
        .and(path(page_path))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_string(body)
                .insert_header("content-type", "text/html"),
        )
        .expect(expected)
        .mount(server)
        .await;
}

async fn mount_numbered_page(server: &MockServer, page: u32, links: &[&str], expected: u64) {
    Mock::given(method("GET"))
        .and(path("/news"))
        .and(query_param("page", page.to_string()))
        .respond_with(ResponseTemplate::new(200).set_body_string(listing(links, None)))
        .expect(expected)
        .mount(server)
        .await;
}

#[tokio::test]
async fn test_static_pagination_collects_pages_in_order() {
    let mock_server = MockServer::start().await;
    let base_url = mock_server.uri();

    mount_numbered_page(&mock_server, 1, &["/article/1", "/article/2"], 1).await;
    mount_numbered_page(&mock_server, 2, &["/article/3", "/article/2"], 1).await;
    mount_numbered_page(&mock_server, 3, &["/article/4"], 1).await;
    mount_numbered_page(&mock_server, 4, &["/article/5"], 0).await;

    let crawler = create_test_crawler(Arc::new(SpyRenderer::new("")));
    let seed = SeedRequest::new(&format!("{}/news?page=1", base_url), 3, 5).unwrap();
    let report = crawler.crawl(&seed).await;

    assert_eq!(report.decision, Some(StrategyDecision::StaticOffset));
    assert_eq!(report.stop, Some(StopReason::PageCap));
    assert_eq!(
        report.urls,
        vec![
            format!("{}/article/1", base_url),
            format!("{}/article/2", base_url),
            format!("{}/article/3", base_url),
            format!("{}/article/4", base_url),
        ]
    );
    assert_eq!(report.pages.len(), 3);
}

#[tokio::test]
async fn test_dated_articles_across_three_pages() {
    let mock_server = MockServer::start().await;
    let base_url = mock_server.uri();

    mount_numbered_page(&mock_server, 1, &["/article/2024/01"], 1).await;
    mount_numbered_page(&mock_server, 2, &["/article/2024/02", "/article/2024/01"], 1).await;
    mount_numbered_page(&mock_server, 3, &["/article/2024/03"], 1).await;
    mount_numbered_page(&mock_server, 4, &["/article/2024/04"], 0).await;

    // Default keyword relevance, not AcceptAll
    let crawler = create_test_crawler(Arc::new(SpyRenderer::new("")));
    let seed = SeedRequest::new(&format!("{}/news?page=1", base_url), 3, 5).unwrap();
    let report = crawler.crawl(&seed).await;

    assert_eq!(report.decision, Some(StrategyDecision::StaticOffset));
    assert_eq!(
        report.urls,
        vec![
            format!("{}/article/2024/01", base_url),
            format!("{}/article/2024/02", base_url),
            format!("{}/article/2024/03", base_url),
        ]
    );
    assert_eq!(report.pages_fetched, 3);
}

#[tokio::test]
async fn test_cancel_between_pages_keeps_partial_results() {
    let mock_server = MockServer::start().await;
    let base_url = mock_server.uri();

    mount_numbered_page(&mock_server, 1, &["/article/2024/01"], 1).await;
    mount_numbered_page(&mock_server, 2, &["/article/2024/02"], 1).await;
    mount_numbered_page(&mock_server, 3, &["/article/2024/03"], 0).await;

    let token = CancellationToken::new();
    let fetcher = CancellingFetcher {
        inner: fast_fetcher(),
        token: token.clone(),
        after: 2,
        served: AtomicUsize::new(0),
    };
    let crawler = Crawler::new(Arc::new(fetcher), Arc::new(SpyRenderer::new("")))
        .with_cancellation(token);
    let seed = SeedRequest::new(&format!("{}/news?page=1", base_url), 10, 5).unwrap();
    let report = crawler.crawl(&seed).await;

    assert_eq!(report.stop, Some(StopReason::Cancelled));
    assert_eq!(
        report.urls,
        vec![
            format!("{}/article/2024/01", base_url),
            format!("{}/article/2024/02", base_url),
        ]
    );
}

#[tokio::test]
async fn test_static_pagination_single_page_budget() {
    let mock_server = MockServer::start().await;

    mount_numbered_page(&mock_server, 1, &["/article/1"], 1).await;
    mount_numbered_page(&mock_server, 2, &["/article/2"], 0).await;

    let crawler = create_test_crawler(Arc::new(SpyRenderer::new("")));
    let seed = SeedRequest::new(&format!("{}/news?page=1", mock_server.uri()), 1, 5).unwrap();
    let report = crawler.crawl(&seed).await;

    assert_eq!(report.pages_fetched, 1);
    assert_eq!(report.urls.len(), 1);
}

#[tokio::test]
async fn test_static_pagination_stops_at_missing_page() {
    let mock_server = MockServer::start().await;

    mount_numbered_page(&mock_server, 1, &["/article/1"], 1).await;
    Mock::given(method("GET"))
        .and(path("/news"))
        .and(query_param("page", "2"))
        .respond_with(ResponseTemplate::new(404))
        .expect(1)
        .mount(&mock_server)
        .await;

    let crawler = create_test_crawler(Arc::new(SpyRenderer::new("")));
    let seed = SeedRequest::new(&format!("{}/news?page=1", mock_server.uri()), 10, 5).unwrap();
    let report = crawler.crawl(&seed).await;

    assert_eq!(report.stop, Some(StopReason::FetchFailed));
    assert_eq!(report.urls, vec![format!("{}/article/1", mock_server.uri())]);
}

#[tokio::test]
async fn test_link_follow_walks_next_anchors() {
    let mock_server = MockServer::start().await;
    let base_url = mock_server.uri();

    mount_page(
        &mock_server,
        "/archive",
        listing(&["/article/1"], Some("/archive/older")),
        1,
    )
    .await;
    mount_page(
        &mock_server,
        "/archive/older",
        listing(&["/article/2"], Some("/archive/oldest")),
        1,
    )
    .await;
    mount_page(&mock_server, "/archive/oldest", listing(&["/article/3"], None), 1).await;

    let renderer = Arc::new(SpyRenderer::new(""));
    let crawler = create_test_crawler(renderer.clone());
    let seed = SeedRequest::new(&format!("{}/archive", base_url), 10, 5).unwrap();
    let report = crawler.crawl(&seed).await;

    assert_eq!(report.decision, Some(StrategyDecision::LinkFollow));
    assert_eq!(report.stop, Some(StopReason::NoNextLink));
    assert_eq!(
        report.urls,
        vec![
            format!("{}/article/1", base_url),
            format!("{}/article/2", base_url),
            format!("{}/article/3", base_url),
        ]
    );
    assert_eq!(report.pages_fetched, 3);
    assert!(renderer.calls().is_empty());
}

#[tokio::test]
async fn test_link_follow_single_page_budget() {
    let mock_server = MockServer::start().await;

    mount_page(
        &mock_server,
        "/archive",
        listing(&["/article/1"], Some("/archive/older")),
        1,
    )
    .await;
    mount_page(&mock_server, "/archive/older", listing(&["/article/2"], None), 0).await;

    let crawler = create_test_crawler(Arc::new(SpyRenderer::new("")));
    let seed = SeedRequest::new(&format!("{}/archive", mock_server.uri()), 1, 5).unwrap();
    let report = crawler.crawl(&seed).await;

    assert_eq!(report.stop, Some(StopReason::PageCap));
    assert_eq!(report.pages_fetched, 1);
}

#[tokio::test]
async fn test_link_follow_cycle_terminates() {
    let mock_server = MockServer::start().await;

    mount_page(
        &mock_server,
        "/archive",
        listing(&["/article/1"], Some("/archive/older")),
        1,
    )
    .await;
    mount_page(
        &mock_server,
        "/archive/older",
        listing(&["/article/2"], Some("/archive")),
        1,
    )
    .await;

    let crawler = create_test_crawler(Arc::new(SpyRenderer::new("")));
    let seed = SeedRequest::new(&format!("{}/archive", mock_server.uri()), 50, 5).unwrap();
    let report = crawler.crawl(&seed).await;

    assert_eq!(report.stop, Some(StopReason::Cycle));
    assert_eq!(report.urls.len(), 2);
}

#[tokio::test]
async fn test_plain_listing_is_rendered() {
    let mock_server = MockServer::start().await;
    let base_url = mock_server.uri();

    mount_page(&mock_server, "/blog", listing(&["/about"], None), 1).await;

    let renderer = Arc::new(SpyRenderer::new(&listing(
        &["/article/2024/01/robots", "/article/2024/02/news"],
        None,
    )));
    let crawler = create_test_crawler(renderer.clone());
    let seed = SeedRequest::new(&format!("{}/blog", base_url), 3, 7).unwrap();
    let report = crawler.crawl(&seed).await;

    assert_eq!(report.decision, Some(StrategyDecision::RenderedScroll));
    assert_eq!(renderer.calls(), vec![(format!("{}/blog", base_url), 7)]);
    assert_eq!(
        report.urls,
        vec![
            format!("{}/article/2024/01/robots", base_url),
            format!("{}/article/2024/02/news", base_url),
        ]
    );
    assert_eq!(report.render_steps, 7);
    assert!(report.rendered_html().is_some());
}

#[tokio::test]
async fn test_seed_failures_are_isolated() {
    let mock_server = MockServer::start().await;
    let base_url = mock_server.uri();

    mount_numbered_page(&mock_server, 1, &["/article/shared"], 1).await;
    mount_page(&mock_server, "/feed", listing(&["/article/shared"], None), 1).await;
    Mock::given(method("GET"))
        .and(path("/broken"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&mock_server)
        .await;

    let crawler = create_test_crawler(Arc::new(UnavailableRenderer));
    let seeds = vec![
        SeedRequest::new(&format!("{}/news?page=1", base_url), 1, 5).unwrap(),
        SeedRequest::new(&format!("{}/broken", base_url), 3, 5).unwrap(),
        SeedRequest::new(&format!("{}/feed", base_url), 3, 5).unwrap(),
    ];
    let reports = crawler.crawl_all(&seeds).await;

    assert_eq!(reports.len(), 3);

    // Unaffected seed
    assert_eq!(reports[0].urls, vec![format!("{}/article/shared", base_url)]);

    // Unreachable seed: no URLs, reported but not fatal
    assert!(reports[1].urls.is_empty());
    assert!(reports[1].error.is_some());

    // Renderer could not start: the seed itself is the only URL
    assert!(reports[2].fell_back);
    assert_eq!(reports[2].urls, vec![format!("{}/feed", base_url)]);
}

#[tokio::test]
async fn test_crawl_from_config_file_contents() {
    let mock_server = MockServer::start().await;

    mount_numbered_page(&mock_server, 1, &["/news/2024/a", "/contact"], 1).await;

    let config = parse_config(&format!(
        r#"
[crawler]
max-pages = 1

[fetch]
max-attempts = 1

[[seed]]
url = "{}/news?page=1"
"#,
        mock_server.uri()
    ))
    .unwrap();

    let crawler = Crawler::from_config(&config).unwrap();
    let reports = crawler.crawl_all(&config.seed_requests().unwrap()).await;

    // The default relevance filter drops /contact
    assert_eq!(
        reports[0].urls,
        vec![format!("{}/news/2024/a", mock_server.uri())]
    );
}
