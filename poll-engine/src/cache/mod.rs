//! On-disk poll cache.
//!
//! The cache is a single file holding a creation timestamp and every poll.
//! It is all or nothing: a stale, unreadable or corrupt file reads as empty,
//! which callers treat as a cold start.

pub mod codec;

pub use codec::CacheError;

use chrono::{DateTime, Utc};
use poll_common::{CacheConfig, Result};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::poll::{PollResult, RawPoll};

/// File-backed poll cache with a maximum age.
#[derive(Debug, Clone)]
pub struct PollCache {
    path: PathBuf,
    max_age: Duration,
}

impl PollCache {
    pub fn new(path: impl Into<PathBuf>, max_age: Duration) -> Self {
        Self {
            path: path.into(),
            max_age,
        }
    }

    pub fn from_config(config: &CacheConfig) -> Self {
        Self::new(config.path(), config.max_age())
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn max_age(&self) -> Duration {
        self.max_age
    }

    /// Delete the cache file. A missing file is not an error.
    pub fn invalidate(&self) -> Result<()> {
        match fs::remove_file(&self.path) {
            Ok(()) => {
                info!(path = %self.path.display(), "Cache invalidated");
                Ok(())
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    /// Replace the cache with `polls`, stamped with the current time.
    pub fn write(&self, polls: &[RawPoll]) -> Result<()> {
        self.write_at(polls, Utc::now())
    }

    /// Replace the cache with `polls`, stamped with `created`.
    ///
    /// The file is written next to the target and renamed into place, so a
    /// reader never sees a half-written cache.
    pub fn write_at(&self, polls: &[RawPoll], created: DateTime<Utc>) -> Result<()> {
        let mut sorted = polls.to_vec();
        sorted.sort_by_key(|p| p.date());
        let bytes = codec::encode(created, &sorted)?;

        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }

        let tmp = self.path.with_extension("tmp");
        fs::write(&tmp, &bytes)?;
        fs::rename(&tmp, &self.path)?;

        info!(
            path = %self.path.display(),
            polls = sorted.len(),
            bytes = bytes.len(),
            "Cache written"
        );
        Ok(())
    }

    /// Cached polls sorted by date, or nothing if the cache is missing,
    /// stale or corrupt.
    pub fn read(&self) -> Vec<RawPoll> {
        self.read_at(Utc::now())
    }

    /// Like [`read`](Self::read), judging freshness against `now`.
    pub fn read_at(&self, now: DateTime<Utc>) -> Vec<RawPoll> {
        let bytes = match fs::read(&self.path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                debug!(path = %self.path.display(), "No cache file");
                return Vec::new();
            }
            Err(e) => {
                warn!(path = %self.path.display(), error = %e, "Failed to read cache");
                return Vec::new();
            }
        };

        let (created, mut polls) = match codec::decode(&bytes) {
            Ok(decoded) => decoded,
            Err(e) => {
                warn!(path = %self.path.display(), error = %e, "Discarding corrupt cache");
                return Vec::new();
            }
        };

        let fresh = (now - created)
            .to_std()
            .map(|age| age <= self.max_age)
            .unwrap_or(false);
        if !fresh {
            info!(path = %self.path.display(), created = %created, "Cache is stale");
            return Vec::new();
        }

        polls.sort_by_key(|p| p.date());
        debug!(polls = polls.len(), "Cache hit");
        polls
    }
}
