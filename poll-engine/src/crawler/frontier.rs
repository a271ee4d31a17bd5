//! De-duplicating work queue for one crawl.

use dashmap::mapref::entry::Entry;
use dashmap::{DashMap, DashSet};
use url::Url;

/// What happened to a claimed page.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PageOutcome {
    /// Claimed, fetch not finished yet
    InFlight,
    /// Fetched and parsed
    Parsed { polls: usize },
    /// Fetch failed after retries
    Failed,
    /// The crawl was cancelled before the page finished
    Cancelled,
}

/// Discovered-but-unvisited URLs plus the outcome of every claimed URL.
///
/// A URL is fetched at most once: [`claim`](Self::claim) succeeds only for
/// the first caller, and [`discover`](Self::discover) ignores URLs that were
/// already claimed.
#[derive(Debug, Default)]
pub struct Frontier {
    pending: DashSet<Url>,
    visited: DashMap<Url, PageOutcome>,
}

impl Frontier {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue `url` unless it was already claimed. Returns whether it is new.
    pub fn discover(&self, url: Url) -> bool {
        if self.visited.contains_key(&url) {
            return false;
        }
        self.pending.insert(url)
    }

    /// Take an arbitrary pending URL.
    pub fn pop(&self) -> Option<Url> {
        let url = self.pending.iter().next().map(|entry| entry.key().clone())?;
        self.pending.remove(&url);
        Some(url)
    }

    /// Mark `url` as being fetched. Returns `false` when it was claimed before.
    pub fn claim(&self, url: &Url) -> bool {
        self.pending.remove(url);
        match self.visited.entry(url.clone()) {
            Entry::Occupied(_) => false,
            Entry::Vacant(slot) => {
                slot.insert(PageOutcome::InFlight);
                true
            }
        }
    }

    pub fn record(&self, url: &Url, outcome: PageOutcome) {
        self.visited.insert(url.clone(), outcome);
    }

    pub fn outcome(&self, url: &Url) -> Option<PageOutcome> {
        self.visited.get(url).map(|entry| *entry.value())
    }

    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }

    pub fn visited_len(&self) -> usize {
        self.visited.len()
    }
}
