//! Poll page crawler.
//!
//! Starting from the configured seed pages, the crawler follows every
//! "more sources" navigation link, parses the poll table of each page and
//! returns the union of all rows. Seeds are fetched concurrently; discovered
//! pages are then drained one at a time.
//!
//! The crawl is best-effort. A page that still fails after its retries is
//! recorded in [`CrawlReport::failed`] and the crawl carries on.

pub mod fetch;
pub mod frontier;
pub mod parser;

pub use fetch::{FetchError, HttpFetcher, PageFetcher};
pub use frontier::{Frontier, PageOutcome};
pub use parser::{PageParser, ParsedPage};

use futures::future::join_all;
use poll_common::{crawl_span, logging, CrawlerConfig, Error, Result};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn, Instrument};
use url::Url;

use crate::poll::RawPoll;

// ============================================================================
// Crawl Report
// ============================================================================

/// A page that could not be fetched.
#[derive(Debug, Clone)]
pub struct FailedPage {
    pub url: Url,
    pub error: FetchError,
}

/// Outcome of one crawl.
#[derive(Debug, Clone, Default)]
pub struct CrawlReport {
    /// Every poll row found, unordered.
    pub polls: Vec<RawPoll>,
    /// Pages fetched, successfully or not.
    pub pages_visited: usize,
    pub failed: Vec<FailedPage>,
    /// Whether the crawl stopped early on cancellation.
    pub cancelled: bool,
}

impl CrawlReport {
    /// No page failed and the crawl ran to the end.
    pub fn is_complete(&self) -> bool {
        self.failed.is_empty() && !self.cancelled
    }
}

// ============================================================================
// Crawler
// ============================================================================

/// Seed list, fetch policy and page parser for crawling one poll site.
pub struct Crawler {
    fetcher: Arc<dyn PageFetcher>,
    parser: PageParser,
    seeds: Vec<Url>,
    fetch_timeout: Duration,
    max_retries: u32,
    retry_backoff: Duration,
}

impl Crawler {
    pub fn new(fetcher: Arc<dyn PageFetcher>, config: &CrawlerConfig) -> Result<Self> {
        let seeds = config
            .seed_urls()
            .map_err(|e| Error::Config(e.to_string()))?;

        Ok(Self {
            fetcher,
            parser: PageParser::from_config(config)?,
            seeds,
            fetch_timeout: config.fetch_timeout(),
            max_retries: config.max_retries,
            retry_backoff: config.retry_backoff(),
        })
    }

    /// Crawler fetching over HTTP.
    pub fn from_config(config: &CrawlerConfig) -> Result<Self> {
        Self::new(Arc::new(HttpFetcher::new(config)), config)
    }

    pub fn seeds(&self) -> &[Url] {
        &self.seeds
    }

    /// Crawl the site. Cancelling `cancel` stops the crawl and returns what
    /// was collected so far.
    pub async fn crawl(&self, cancel: &CancellationToken) -> CrawlReport {
        let run_id = logging::generate_run_id();
        let span = crawl_span!(run_id, seeds = self.seeds.len(), fetcher = self.fetcher.name());
        self.run(cancel).instrument(span).await
    }

    async fn run(&self, cancel: &CancellationToken) -> CrawlReport {
        let frontier = Frontier::new();
        let mut report = CrawlReport::default();

        let seeds: Vec<Url> = self
            .seeds
            .iter()
            .filter(|url| frontier.claim(url))
            .cloned()
            .collect();

        let pages = join_all(seeds.iter().map(|url| self.visit(url, cancel))).await;
        for (url, page) in seeds.into_iter().zip(pages) {
            self.absorb(&frontier, &mut report, url, page);
        }

        while let Some(url) = frontier.pop() {
            if cancel.is_cancelled() {
                report.cancelled = true;
                break;
            }
            if !frontier.claim(&url) {
                continue;
            }
            let page = self.visit(&url, cancel).await;
            self.absorb(&frontier, &mut report, url, page);
        }

        info!(
            polls = report.polls.len(),
            pages = report.pages_visited,
            failed = report.failed.len(),
            cancelled = report.cancelled,
            "Crawl finished"
        );
        report
    }

    async fn visit(
        &self,
        url: &Url,
        cancel: &CancellationToken,
    ) -> std::result::Result<ParsedPage, FetchError> {
        let body = self.fetch_with_retry(url, cancel).await?;
        Ok(self.parser.parse(url, &body))
    }

    fn absorb(
        &self,
        frontier: &Frontier,
        report: &mut CrawlReport,
        url: Url,
        page: std::result::Result<ParsedPage, FetchError>,
    ) {
        match page {
            Ok(page) => {
                let mut discovered = 0;
                for link in page.links {
                    if frontier.discover(link) {
                        discovered += 1;
                    }
                }
                debug!(url = %url, polls = page.polls.len(), discovered, "Page parsed");

                frontier.record(&url, PageOutcome::Parsed { polls: page.polls.len() });
                report.pages_visited += 1;
                report.polls.extend(page.polls);
            }
            Err(FetchError::Cancelled) => {
                frontier.record(&url, PageOutcome::Cancelled);
                report.cancelled = true;
            }
            Err(error) => {
                warn!(url = %url, error = %error, "Page fetch failed");
                frontier.record(&url, PageOutcome::Failed);
                report.pages_visited += 1;
                report.failed.push(FailedPage { url, error });
            }
        }
    }

    /// Fetch under the per-fetch timeout, retrying recoverable failures with
    /// exponential backoff.
    async fn fetch_with_retry(
        &self,
        url: &Url,
        cancel: &CancellationToken,
    ) -> std::result::Result<String, FetchError> {
        let mut attempt: u32 = 0;
        loop {
            let result = tokio::select! {
                biased;
                _ = cancel.cancelled() => Err(FetchError::Cancelled),
                fetched = tokio::time::timeout(self.fetch_timeout, self.fetcher.fetch(url)) => {
                    fetched.unwrap_or_else(|_| Err(FetchError::Timeout { url: url.to_string() }))
                }
            };

            match result {
                Err(error) if error.is_recoverable() && attempt < self.max_retries => {
                    let delay = self
                        .retry_backoff
                        .saturating_mul(2u32.saturating_pow(attempt));
                    attempt += 1;
                    warn!(
                        url = %url,
                        attempt,
                        delay_ms = delay.as_millis() as u64,
                        error = %error,
                        "Retrying page fetch"
                    );

                    tokio::select! {
                        biased;
                        _ = cancel.cancelled() => return Err(FetchError::Cancelled),
                        _ = tokio::time::sleep(delay) => {}
                    }
                }
                other => return other,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    /// Scripted fetcher: a queue of responses per path.
    struct ScriptedFetcher {
        pages: Mutex<HashMap<String, Vec<std::result::Result<String, FetchError>>>>,
        calls: AtomicUsize,
    }

    impl ScriptedFetcher {
        fn new(pages: Vec<(&str, Vec<std::result::Result<String, FetchError>>)>) -> Self {
            Self {
                pages: Mutex::new(
                    pages
                        .into_iter()
                        .map(|(path, mut responses)| {
                            responses.reverse();
                            (path.to_string(), responses)
                        })
                        .collect(),
                ),
                calls: AtomicUsize::new(0),
            }
        }
    }

    #[async_trait]
    impl PageFetcher for ScriptedFetcher {
        fn name(&self) -> &str {
            "scripted"
        }

        async fn fetch(&self, url: &Url) -> std::result::Result<String, FetchError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let mut pages = self.pages.lock().unwrap();
            pages
                .get_mut(url.path())
                .and_then(|responses| responses.pop())
                .unwrap_or_else(|| {
                    Err(FetchError::Status {
                        status: 404,
                        url: url.to_string(),
                    })
                })
        }
    }

    fn page(links: &[&str], date: &str) -> String {
        let anchors: String = links
            .iter()
            .map(|l| format!(r#"<a href="{l}">x</a>"#))
            .collect();
        format!(
            r#"<p class="navi">{anchors}</p>
            <table class="wilko">
              <tr><th>Datum</th><th class="part">CDU/CSU</th><th class="part">SPD</th></tr>
              <tr><td class="s">{date}</td><td>30 %</td><td>20 %</td></tr>
            </table>"#
        )
    }

    fn config(seeds: &[&str]) -> CrawlerConfig {
        CrawlerConfig {
            base_url: "https://polls.example.org/umfragen/".into(),
            seeds: seeds.iter().map(|s| s.to_string()).collect(),
            max_retries: 2,
            retry_backoff_ms: 1,
            ..CrawlerConfig::default()
        }
    }

    #[tokio::test]
    async fn test_transient_failure_is_retried() {
        let fetcher = Arc::new(ScriptedFetcher::new(vec![(
            "/umfragen/forsa.htm",
            vec![
                Err(FetchError::Status {
                    status: 503,
                    url: "forsa".into(),
                }),
                Ok(page(&[], "01.02.2024")),
            ],
        )]));
        let crawler = Crawler::new(fetcher.clone(), &config(&["forsa.htm"])).unwrap();

        let report = crawler.crawl(&CancellationToken::new()).await;
        assert!(report.is_complete());
        assert_eq!(report.polls.len(), 1);
        assert_eq!(fetcher.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_permanent_failure_is_not_retried() {
        let fetcher = Arc::new(ScriptedFetcher::new(vec![(
            "/umfragen/forsa.htm",
            vec![Ok(page(&["missing.htm"], "01.02.2024"))],
        )]));
        let crawler = Crawler::new(fetcher.clone(), &config(&["forsa.htm"])).unwrap();

        let report = crawler.crawl(&CancellationToken::new()).await;
        assert_eq!(report.polls.len(), 1);
        assert_eq!(report.pages_visited, 2);
        assert_eq!(report.failed.len(), 1);
        assert!(report.failed[0].url.as_str().ends_with("missing.htm"));
        assert_eq!(fetcher.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_cycles_are_fetched_once() {
        let fetcher = Arc::new(ScriptedFetcher::new(vec![
            ("/umfragen/a.htm", vec![Ok(page(&["b.htm", "a.htm"], "01.01.2024"))]),
            ("/umfragen/b.htm", vec![Ok(page(&["a.htm", "c.htm#x"], "02.01.2024"))]),
            ("/umfragen/c.htm", vec![Ok(page(&["a.htm", "b.htm"], "03.01.2024"))]),
        ]));
        let crawler = Crawler::new(fetcher.clone(), &config(&["a.htm", "b.htm"])).unwrap();

        let report = crawler.crawl(&CancellationToken::new()).await;
        assert!(report.is_complete());
        assert_eq!(report.pages_visited, 3);
        assert_eq!(report.polls.len(), 3);
        assert_eq!(fetcher.calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_cancelled_crawl_returns_partial_report() {
        let fetcher = Arc::new(ScriptedFetcher::new(vec![(
            "/umfragen/a.htm",
            vec![Ok(page(&["b.htm"], "01.01.2024"))],
        )]));
        let crawler = Crawler::new(fetcher, &config(&["a.htm"])).unwrap();

        let cancel = CancellationToken::new();
        cancel.cancel();
        let report = crawler.crawl(&cancel).await;
        assert!(report.cancelled);
        assert!(!report.is_complete());
    }

    #[tokio::test]
    async fn test_slow_fetch_times_out() {
        struct Stalled;

        #[async_trait]
        impl PageFetcher for Stalled {
            fn name(&self) -> &str {
                "stalled"
            }

            async fn fetch(&self, _url: &Url) -> std::result::Result<String, FetchError> {
                tokio::time::sleep(Duration::from_secs(60)).await;
                Ok(String::new())
            }
        }

        let mut cfg = config(&["a.htm"]);
        cfg.max_retries = 0;
        let mut crawler = Crawler::new(Arc::new(Stalled), &cfg).unwrap();
        crawler.fetch_timeout = Duration::from_millis(20);

        let report = crawler.crawl(&CancellationToken::new()).await;
        assert_eq!(report.failed.len(), 1);
        assert!(matches!(report.failed[0].error, FetchError::Timeout { .. }));
    }
}
