//! Browser-session abstraction.
//!
//! Adapters never talk to a concrete browser; they drive a [`BrowserSession`]
//! handle. Static portals are served by [`HttpSession`] (plain fetches, no
//! scripting). Portals that need a real scripted browser get their session
//! from whatever [`SessionProvider`] the embedding application wires in —
//! browser provisioning itself lives outside this workspace. The
//! [`PlaybackSession`] replays canned pages deterministically for tests and
//! local development.

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use scraper::{Html, Selector};
use thiserror::Error;
use uuid::Uuid;

use crate::{FetchError, HttpFetcher};

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("timed out after {waited:?} waiting for `{selector}`")]
    Timeout { selector: String, waited: Duration },
    #[error("no page loaded")]
    NoPage,
    #[error("operation `{operation}` not supported by this session")]
    Unsupported { operation: &'static str },
    #[error("navigation to {url} failed: {source}")]
    Navigation {
        url: String,
        #[source]
        source: anyhow::Error,
    },
}

/// Wait and settle knobs shared by all adapters. The settle delays substitute
/// for readiness events the target sites do not expose, so they stay
/// configurable rather than hard-coded.
#[derive(Debug, Clone, Copy)]
pub struct WaitPolicy {
    /// Upper bound on waiting for an element to appear.
    pub element_timeout: Duration,
    /// Pause after a search submit or page navigation.
    pub settle: Duration,
    /// Pause after a scroll while infinite-scroll content loads.
    pub scroll_settle: Duration,
}

impl Default for WaitPolicy {
    fn default() -> Self {
        Self {
            element_timeout: Duration::from_secs(20),
            settle: Duration::from_secs(5),
            scroll_settle: Duration::from_secs(2),
        }
    }
}

impl WaitPolicy {
    /// Zero waits everywhere; keeps adapter tests instant.
    pub fn immediate() -> Self {
        Self {
            element_timeout: Duration::ZERO,
            settle: Duration::ZERO,
            scroll_settle: Duration::ZERO,
        }
    }
}

/// One navigable browser tab. Every method is a suspension point; waits are
/// bounded and fail with [`SessionError::Timeout`] instead of blocking.
#[async_trait]
pub trait BrowserSession: Send {
    async fn navigate(&mut self, url: &str) -> Result<(), SessionError>;
    async fn page_source(&mut self) -> Result<String, SessionError>;
    async fn fill(&mut self, selector: &str, text: &str) -> Result<(), SessionError>;
    async fn click(&mut self, selector: &str) -> Result<(), SessionError>;
    async fn wait_for(&mut self, selector: &str, timeout: Duration) -> Result<(), SessionError>;
    async fn scroll_to_bottom(&mut self) -> Result<(), SessionError>;
    async fn page_height(&mut self) -> Result<u64, SessionError>;
}

/// Opens one fresh session per portal task. Sessions are never shared across
/// tasks, so navigation state stays isolated.
#[async_trait]
pub trait SessionProvider: Send + Sync {
    async fn open(&self, run_id: Uuid, portal: &str) -> anyhow::Result<Box<dyn BrowserSession>>;
}

fn selector_matches(html: &str, selector: &str) -> bool {
    let Ok(parsed) = Selector::parse(selector) else {
        return false;
    };
    Html::parse_document(html).select(&parsed).next().is_some()
}

/// Session backed by plain HTTP fetches. Good for static portals; the
/// interactive operations report themselves unsupported so search-driven
/// adapters degrade per keyword instead of hanging.
pub struct HttpSession {
    fetcher: Arc<HttpFetcher>,
    run_id: Uuid,
    portal: String,
    current: Option<String>,
}

impl HttpSession {
    pub fn new(fetcher: Arc<HttpFetcher>, run_id: Uuid, portal: impl Into<String>) -> Self {
        Self {
            fetcher,
            run_id,
            portal: portal.into(),
            current: None,
        }
    }
}

#[async_trait]
impl BrowserSession for HttpSession {
    async fn navigate(&mut self, url: &str) -> Result<(), SessionError> {
        let response = self
            .fetcher
            .fetch_text(self.run_id, &self.portal, url)
            .await
            .map_err(|err: FetchError| SessionError::Navigation {
                url: url.to_string(),
                source: err.into(),
            })?;
        self.current = Some(response.body);
        Ok(())
    }

    async fn page_source(&mut self) -> Result<String, SessionError> {
        self.current.clone().ok_or(SessionError::NoPage)
    }

    async fn fill(&mut self, _selector: &str, _text: &str) -> Result<(), SessionError> {
        Err(SessionError::Unsupported { operation: "fill" })
    }

    async fn click(&mut self, _selector: &str) -> Result<(), SessionError> {
        Err(SessionError::Unsupported { operation: "click" })
    }

    async fn wait_for(&mut self, selector: &str, timeout: Duration) -> Result<(), SessionError> {
        let page = self.current.as_deref().ok_or(SessionError::NoPage)?;
        if selector_matches(page, selector) {
            Ok(())
        } else {
            Err(SessionError::Timeout {
                selector: selector.to_string(),
                waited: timeout,
            })
        }
    }

    async fn scroll_to_bottom(&mut self) -> Result<(), SessionError> {
        Ok(())
    }

    async fn page_height(&mut self) -> Result<u64, SessionError> {
        let page = self.current.as_deref().ok_or(SessionError::NoPage)?;
        Ok(page.len() as u64)
    }
}

/// [`SessionProvider`] handing out [`HttpSession`]s over a shared fetcher.
pub struct HttpSessionProvider {
    fetcher: Arc<HttpFetcher>,
}

impl HttpSessionProvider {
    pub fn new(fetcher: Arc<HttpFetcher>) -> Self {
        Self { fetcher }
    }
}

#[async_trait]
impl SessionProvider for HttpSessionProvider {
    async fn open(&self, run_id: Uuid, portal: &str) -> anyhow::Result<Box<dyn BrowserSession>> {
        Ok(Box::new(HttpSession::new(
            Arc::clone(&self.fetcher),
            run_id,
            portal,
        )))
    }
}

/// Deterministic scripted session: `navigate` serves canned routes, `click`
/// pops the next queued result page, `wait_for` checks the current page
/// immediately. Heights can be scripted to exercise scroll-until-stable
/// loops.
#[derive(Debug, Clone, Default)]
pub struct PlaybackSession {
    routes: HashMap<String, String>,
    result_pages: VecDeque<String>,
    heights: Vec<u64>,
    height_cursor: usize,
    timeout_selectors: Vec<String>,
    current: Option<String>,
    pub filled: Vec<(String, String)>,
}

impl PlaybackSession {
    pub fn new() -> Self {
        Self::default()
    }

    /// Serves `html` whenever `url` is navigated to.
    pub fn with_route(mut self, url: impl Into<String>, html: impl Into<String>) -> Self {
        self.routes.insert(url.into(), html.into());
        self
    }

    /// Queues a page to become current on the next `click`.
    pub fn with_result_page(mut self, html: impl Into<String>) -> Self {
        self.result_pages.push_back(html.into());
        self
    }

    /// Scripts successive `page_height` readings; the last value repeats.
    pub fn with_heights(mut self, heights: Vec<u64>) -> Self {
        self.heights = heights;
        self
    }

    /// Makes `wait_for` on this selector time out regardless of content.
    pub fn timing_out_on(mut self, selector: impl Into<String>) -> Self {
        self.timeout_selectors.push(selector.into());
        self
    }
}

#[async_trait]
impl BrowserSession for PlaybackSession {
    async fn navigate(&mut self, url: &str) -> Result<(), SessionError> {
        match self.routes.get(url) {
            Some(page) => {
                self.current = Some(page.clone());
                Ok(())
            }
            None => Err(SessionError::Navigation {
                url: url.to_string(),
                source: anyhow::anyhow!("no scripted route"),
            }),
        }
    }

    async fn page_source(&mut self) -> Result<String, SessionError> {
        self.current.clone().ok_or(SessionError::NoPage)
    }

    async fn fill(&mut self, selector: &str, text: &str) -> Result<(), SessionError> {
        self.filled.push((selector.to_string(), text.to_string()));
        Ok(())
    }

    async fn click(&mut self, _selector: &str) -> Result<(), SessionError> {
        if let Some(page) = self.result_pages.pop_front() {
            self.current = Some(page);
        }
        Ok(())
    }

    async fn wait_for(&mut self, selector: &str, timeout: Duration) -> Result<(), SessionError> {
        if self.timeout_selectors.iter().any(|s| s == selector) {
            return Err(SessionError::Timeout {
                selector: selector.to_string(),
                waited: timeout,
            });
        }
        let page = self.current.as_deref().ok_or(SessionError::NoPage)?;
        if selector_matches(page, selector) {
            Ok(())
        } else {
            Err(SessionError::Timeout {
                selector: selector.to_string(),
                waited: timeout,
            })
        }
    }

    async fn scroll_to_bottom(&mut self) -> Result<(), SessionError> {
        Ok(())
    }

    async fn page_height(&mut self) -> Result<u64, SessionError> {
        if self.heights.is_empty() {
            let page = self.current.as_deref().ok_or(SessionError::NoPage)?;
            return Ok(page.len() as u64);
        }
        let idx = self.height_cursor.min(self.heights.len() - 1);
        self.height_cursor += 1;
        Ok(self.heights[idx])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn playback_serves_routes_and_result_pages() {
        let mut session = PlaybackSession::new()
            .with_route("https://example.test", "<div id='search'></div>")
            .with_result_page("<div id='results'>hit</div>");

        session.navigate("https://example.test").await.unwrap();
        session
            .wait_for("#search", Duration::ZERO)
            .await
            .expect("search form present");
        session.fill("#search", "Tourismus").await.unwrap();
        assert_eq!(
            session.filled,
            vec![("#search".to_string(), "Tourismus".to_string())]
        );
        session.click("#submit").await.unwrap();
        session
            .wait_for("#results", Duration::ZERO)
            .await
            .expect("results present after click");
        assert!(session.page_source().await.unwrap().contains("hit"));
    }

    #[tokio::test]
    async fn playback_wait_for_times_out_on_missing_selector() {
        let mut session = PlaybackSession::new().with_route("u", "<p>empty</p>");
        session.navigate("u").await.unwrap();
        let err = session.wait_for("#never", Duration::ZERO).await.unwrap_err();
        assert!(matches!(err, SessionError::Timeout { .. }));
    }

    #[tokio::test]
    async fn playback_heights_repeat_last_value() {
        let mut session = PlaybackSession::new()
            .with_route("u", "x")
            .with_heights(vec![100, 200, 200]);
        session.navigate("u").await.unwrap();
        assert_eq!(session.page_height().await.unwrap(), 100);
        assert_eq!(session.page_height().await.unwrap(), 200);
        assert_eq!(session.page_height().await.unwrap(), 200);
        assert_eq!(session.page_height().await.unwrap(), 200);
    }
}
