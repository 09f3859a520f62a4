//! Headless Chromium renderer
//!
//! Each call launches its own browser process so cookies and storage never
//! leak between seeds. The process is shut down on every exit path: explicitly
//! via [`BrowserSession::close`], or by the `Drop` fallback if the future is
//! cancelled or unwinds.

use crate::config::RenderConfig;
use crate::crawler::render::{RenderStop, RenderedPage, Renderer};
use crate::RenderError;
use async_trait::async_trait;
use chromiumoxide::browser::{Browser, BrowserConfig};
use chromiumoxide::Page;
use futures::StreamExt;
use serde::Deserialize;
use std::time::{Duration, Instant};
use tokio::task::JoinHandle;
use url::Url;

/// DOM state sampled while waiting for a step to settle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
struct DomSnapshot {
    ready: bool,
    anchors: u64,
    height: u64,
}

const SNAPSHOT_SCRIPT: &str = r#"(() => ({
    ready: document.readyState === "complete",
    anchors: document.querySelectorAll("a[href]").length,
    height: document.body ? document.body.scrollHeight : 0
}))()"#;

/// An exclusively owned browser process plus its CDP event loop
struct BrowserSession {
    browser: Option<Browser>,
    handler: Option<JoinHandle<()>>,
    shutdown_timeout: Duration,
}

impl BrowserSession {
    async fn launch(config: &RenderConfig) -> Result<Self, RenderError> {
        let mut builder = BrowserConfig::builder()
            .request_timeout(Duration::from_millis(config.navigation_timeout_ms));
        if !config.headless {
            builder = builder.with_head();
        }
        if let Some(path) = &config.chrome_executable {
            builder = builder.chrome_executable(path);
        }
        let browser_config = builder.build().map_err(RenderError::Config)?;

        let (browser, mut handler) = Browser::launch(browser_config)
            .await
            .map_err(|e| RenderError::Launch(e.to_string()))?;

        let handler = tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                if event.is_err() {
                    break;
                }
            }
        });

        Ok(Self {
            browser: Some(browser),
            handler: Some(handler),
            shutdown_timeout: Duration::from_millis(config.step_timeout_ms),
        })
    }

    async fn open_page(&mut self) -> Result<Page, RenderError> {
        let browser = self
            .browser
            .as_ref()
            .ok_or_else(|| RenderError::Page("browser already closed".to_string()))?;
        browser
            .new_page("about:blank")
            .await
            .map_err(|e| RenderError::Page(e.to_string()))
    }

    async fn close(mut self) {
        if let Some(browser) = self.browser.take() {
            shutdown(browser, self.shutdown_timeout).await;
        }
        if let Some(handler) = self.handler.take() {
            handler.abort();
        }
    }
}

impl Drop for BrowserSession {
    fn drop(&mut self) {
        let browser = self.browser.take();
        let handler = self.handler.take();
        let limit = self.shutdown_timeout;
        if browser.is_none() && handler.is_none() {
            return;
        }

        match tokio::runtime::Handle::try_current() {
            Ok(runtime) => {
                runtime.spawn(async move {
                    if let Some(browser) = browser {
                        shutdown(browser, limit).await;
                    }
                    if let Some(handler) = handler {
                        handler.abort();
                    }
                    tracing::trace!("Browser session cleaned up from drop");
                });
            }
            Err(_) => {
                if let Some(handler) = handler {
                    handler.abort();
                }
            }
        }
    }
}

/// Closes the browser and reaps its process, killing it if that takes longer
/// than `limit`
async fn shutdown(mut browser: Browser, limit: Duration) {
    let graceful = async {
        if let Err(e) = browser.close().await {
            tracing::warn!("Failed to close browser: {}", e);
        }
        if let Err(e) = browser.wait().await {
            tracing::warn!("Failed to reap browser process: {}", e);
        }
    };

    if !finished_within(limit, graceful).await {
        tracing::warn!("Browser did not exit within {:?}, killing it", limit);
        match tokio::time::timeout(limit, browser.kill()).await {
            Ok(Some(Err(e))) => tracing::warn!("Failed to kill browser: {}", e),
            Err(_) => tracing::warn!("Browser kill timed out"),
            _ => {}
        }
    }
}

/// Runs `work` for at most `limit`; false if it was cut off
async fn finished_within<F: std::future::Future<Output = ()>>(limit: Duration, work: F) -> bool {
    tokio::time::timeout(limit, work).await.is_ok()
}

/// Renderer backed by headless Chromium (via `chromiumoxide`)
///
/// # Step Protocol
///
/// For each of up to `max_steps` iterations:
/// 1. Click the first visible, enabled control whose text matches one of the
///    configured labels ("load more", "show more", "more")
/// 2. If there is none, scroll down by `scroll-px`
/// 3. Wait until anchor count and page height stay unchanged for `idle-ms`,
///    bounded by `step-timeout-ms`
///
/// The session stops early on an idle timeout or when a step adds no anchors.
#[derive(Debug, Clone)]
pub struct BrowserRenderer {
    config: RenderConfig,
}

impl BrowserRenderer {
    pub fn new(config: RenderConfig) -> Self {
        Self { config }
    }

    async fn drive(&self, page: &Page, url: &Url, max_steps: u32) -> RenderedPage {
        let navigation_timeout = Duration::from_millis(self.config.navigation_timeout_ms);

        match tokio::time::timeout(navigation_timeout, page.goto(url.as_str())).await {
            Ok(Ok(_)) => {}
            Ok(Err(e)) => {
                return self
                    .finish(page, 0, RenderStop::NavigationFailed(e.to_string()))
                    .await
            }
            Err(_) => {
                return self
                    .finish(
                        page,
                        0,
                        RenderStop::NavigationFailed("navigation timed out".to_string()),
                    )
                    .await
            }
        }

        let mut anchors = match self.wait_for_idle(page).await {
            Some(snapshot) => snapshot.anchors,
            None => return self.finish(page, 0, RenderStop::IdleTimeout).await,
        };

        let click_script = self.click_script();
        let scroll_script = format!("window.scrollBy(0, {}); true", self.config.scroll_px);
        let mut steps = 0;

        while steps < max_steps {
            steps += 1;

            let clicked = match evaluate_bool(page, &click_script).await {
                Ok(clicked) => clicked,
                Err(e) => return self.finish(page, steps, RenderStop::StepFailed(e)).await,
            };

            if clicked {
                tracing::debug!("Render step {}: clicked load-more control", steps);
            } else {
                tracing::debug!("Render step {}: scrolling", steps);
                if let Err(e) = evaluate_bool(page, &scroll_script).await {
                    return self.finish(page, steps, RenderStop::StepFailed(e)).await;
                }
            }

            let Some(snapshot) = self.wait_for_idle(page).await else {
                tracing::info!("Page did not settle after step {}, keeping partial content", steps);
                return self.finish(page, steps, RenderStop::IdleTimeout).await;
            };

            if snapshot.anchors <= anchors {
                return self.finish(page, steps, RenderStop::NoNewContent).await;
            }
            anchors = snapshot.anchors;
        }

        self.finish(page, steps, RenderStop::StepBudget).await
    }

    /// Captures whatever HTML is currently present
    async fn finish(&self, page: &Page, steps_taken: u32, stop: RenderStop) -> RenderedPage {
        let timeout = Duration::from_millis(self.config.step_timeout_ms);
        let html = match tokio::time::timeout(timeout, page.content()).await {
            Ok(Ok(html)) => html,
            Ok(Err(e)) => {
                tracing::warn!("Failed to read page content: {}", e);
                String::new()
            }
            Err(_) => {
                tracing::warn!("Timed out reading page content");
                String::new()
            }
        };

        RenderedPage {
            html,
            steps_taken,
            stop,
        }
    }

    /// Waits until the DOM stays unchanged for `idle-ms`
    ///
    /// Returns None if that does not happen within `step-timeout-ms`.
    async fn wait_for_idle(&self, page: &Page) -> Option<DomSnapshot> {
        let idle = Duration::from_millis(self.config.idle_ms);
        let poll = (idle / 4).max(Duration::from_millis(100));
        let step_timeout = Duration::from_millis(self.config.step_timeout_ms);

        let settle = async {
            let mut last: Option<DomSnapshot> = None;
            let mut stable_since = Instant::now();
            loop {
                let current = snapshot(page).await;
                match (current, last) {
                    (Some(now), Some(before))
                        if now == before && now.ready && stable_since.elapsed() >= idle =>
                    {
                        return now;
                    }
                    (Some(now), Some(before)) if now == before => {}
                    _ => {
                        last = current;
                        stable_since = Instant::now();
                    }
                }
                tokio::time::sleep(poll).await;
            }
        };

        tokio::time::timeout(step_timeout, settle).await.ok()
    }

    fn click_script(&self) -> String {
        let labels: Vec<String> = self
            .config
            .load_more_labels
            .iter()
            .map(|l| l.trim().to_lowercase())
            .filter(|l| !l.is_empty())
            .collect();
        let labels = serde_json::to_string(&labels).unwrap_or_else(|_| "[]".to_string());

        format!(
            r##"(() => {{
    const labels = {labels};
    const controls = document.querySelectorAll(
        'button, [role="button"], a:not([href]), a[href="#"], a[href^="javascript"]'
    );
    for (const el of controls) {{
        const text = (el.innerText || el.textContent || "").trim().toLowerCase();
        if (!text || el.disabled || el.offsetParent === null) continue;
        if (labels.some((label) => text.includes(label))) {{
            el.scrollIntoView({{ block: "center" }});
            el.click();
            return true;
        }}
    }}
    return false;
}})()"##
        )
    }
}

#[async_trait]
impl Renderer for BrowserRenderer {
    async fn render_and_collect(
        &self,
        url: &Url,
        max_steps: u32,
    ) -> Result<RenderedPage, RenderError> {
        let mut session = BrowserSession::launch(&self.config).await?;

        let page = match session.open_page().await {
            Ok(page) => page,
            Err(e) => {
                session.close().await;
                return Err(e);
            }
        };

        let rendered = self.drive(&page, url, max_steps).await;
        if let Err(e) = page.close().await {
            tracing::debug!("Failed to close page for {}: {}", url, e);
        }
        session.close().await;

        tracing::info!(
            "Rendered {} in {} steps ({}), {} bytes",
            url,
            rendered.steps_taken,
            rendered.stop,
            rendered.html.len()
        );
        Ok(rendered)
    }
}

async fn evaluate_bool(page: &Page, script: &str) -> Result<bool, String> {
    page.evaluate_expression(script)
        .await
        .map_err(|e| e.to_string())?
        .into_value::<bool>()
        .map_err(|e| e.to_string())
}

async fn snapshot(page: &Page) -> Option<DomSnapshot> {
    page.evaluate_expression(SNAPSHOT_SCRIPT)
        .await
        .ok()?
        .into_value::<DomSnapshot>()
        .ok()
}
