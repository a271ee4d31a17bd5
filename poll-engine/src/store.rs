//! Cache-first access to the poll set.

use poll_common::{Config, Error, Result};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::cache::PollCache;
use crate::crawler::Crawler;
use crate::history::PollHistory;
use crate::poll::{PollResult, RawPoll};

/// Serves polls from the cache, crawling when it is cold.
pub struct PollStore {
    cache: PollCache,
    crawler: Crawler,
}

impl PollStore {
    pub fn new(cache: PollCache, crawler: Crawler) -> Self {
        Self { cache, crawler }
    }

    /// Store crawling over HTTP with the configured cache file.
    pub fn from_config(config: &Config) -> Result<Self> {
        Ok(Self::new(
            PollCache::from_config(&config.cache),
            Crawler::from_config(&config.crawler)?,
        ))
    }

    pub fn cache(&self) -> &PollCache {
        &self.cache
    }

    /// Every known poll, sorted by date.
    ///
    /// A fresh cache is returned as is. Otherwise the site is crawled and the
    /// result cached. A crawl that finds nothing while pages failed is an
    /// error carrying the first failure. A cancelled crawl, or one where some
    /// pages failed, returns what it found without caching it, so the next
    /// fetch crawls again.
    pub async fn fetch(&self, cancel: &CancellationToken) -> Result<Vec<RawPoll>> {
        let cached = self.cache.read();
        if !cached.is_empty() {
            info!(polls = cached.len(), "Serving polls from cache");
            return Ok(cached);
        }

        let report = self.crawler.crawl(cancel).await;

        if report.polls.is_empty() {
            if report.cancelled {
                return Err(Error::Cancelled);
            }
            if let Some(first) = report.failed.first() {
                return Err(Error::Crawl {
                    failed: report.failed.len(),
                    source: Box::new(first.error.clone().into()),
                });
            }
        }

        let complete = report.is_complete();
        let mut polls = report.polls;
        polls.sort_by_key(|p| p.date());

        if report.cancelled {
            warn!(polls = polls.len(), "Crawl cancelled, not caching partial result");
            return Ok(polls);
        }
        if !complete {
            for page in &report.failed {
                warn!(url = %page.url, error = %page.error, "Page unavailable");
            }
            warn!(
                polls = polls.len(),
                failed = report.failed.len(),
                "Crawl incomplete, not caching partial result"
            );
            return Ok(polls);
        }

        if !polls.is_empty() {
            if let Err(e) = self.cache.write(&polls) {
                warn!(error = %e, "Failed to write poll cache");
            }
        }
        Ok(polls)
    }

    /// [`fetch`](Self::fetch) wrapped in a [`PollHistory`].
    pub async fn history(&self, cancel: &CancellationToken) -> Result<PollHistory> {
        Ok(PollHistory::new(self.fetch(cancel).await?))
    }

    /// Drop the cache so the next fetch crawls.
    pub fn invalidate(&self) -> Result<()> {
        self.cache.invalidate()
    }
}
