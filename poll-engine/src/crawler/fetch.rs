//! Page fetching.
//!
//! The crawler talks to the network only through [`PageFetcher`], so tests
//! can substitute scripted fetchers and the HTTP client stays in one place.

use async_trait::async_trait;
use poll_common::CrawlerConfig;
use thiserror::Error;
use tracing::debug;
use url::Url;

/// Failure to obtain one page.
#[derive(Debug, Clone, Error)]
pub enum FetchError {
    /// Connection-level failure
    #[error("Network error fetching {url}: {message}")]
    Network { url: String, message: String },

    /// Non-success HTTP status
    #[error("HTTP {status} from {url}")]
    Status { status: u16, url: String },

    /// The fetch exceeded its time limit
    #[error("Timed out fetching {url}")]
    Timeout { url: String },

    /// The crawl was cancelled while the fetch was pending
    #[error("Fetch cancelled")]
    Cancelled,

    /// The response arrived but its body could not be read
    #[error("Failed to read body of {url}: {message}")]
    Body { url: String, message: String },
}

impl FetchError {
    /// Whether retrying the same request may succeed.
    pub fn is_recoverable(&self) -> bool {
        match self {
            Self::Network { .. } | Self::Timeout { .. } => true,
            Self::Status { status, .. } => *status == 429 || (500..600).contains(status),
            Self::Cancelled | Self::Body { .. } => false,
        }
    }
}

impl From<FetchError> for poll_common::Error {
    fn from(err: FetchError) -> Self {
        match err {
            FetchError::Timeout { .. } => Self::Timeout,
            FetchError::Cancelled => Self::Cancelled,
            other => Self::Network(other.to_string()),
        }
    }
}

/// Source of page bodies.
#[async_trait]
pub trait PageFetcher: Send + Sync {
    /// Fetcher name for logs.
    fn name(&self) -> &str;

    /// Fetch the body of `url` as text.
    async fn fetch(&self, url: &Url) -> Result<String, FetchError>;
}

/// [`PageFetcher`] backed by `reqwest`.
pub struct HttpFetcher {
    client: reqwest::Client,
}

impl HttpFetcher {
    pub fn new(config: &CrawlerConfig) -> Self {
        let client = reqwest::Client::builder()
            .timeout(config.fetch_timeout())
            .user_agent(config.user_agent.clone())
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());

        Self { client }
    }
}

#[async_trait]
impl PageFetcher for HttpFetcher {
    fn name(&self) -> &str {
        "http"
    }

    async fn fetch(&self, url: &Url) -> Result<String, FetchError> {
        debug!(url = %url, "Fetching page");

        let response = self
            .client
            .get(url.clone())
            .header("accept", "text/html")
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    FetchError::Timeout {
                        url: url.to_string(),
                    }
                } else {
                    FetchError::Network {
                        url: url.to_string(),
                        message: e.to_string(),
                    }
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Status {
                status: status.as_u16(),
                url: url.to_string(),
            });
        }

        response.text().await.map_err(|e| FetchError::Body {
            url: url.to_string(),
            message: e.to_string(),
        })
    }
}
