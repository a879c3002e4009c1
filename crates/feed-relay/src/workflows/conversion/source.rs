use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use reqwest::blocking::Client;

const USER_AGENT: &str = concat!("feed-relay/", env!("CARGO_PKG_VERSION"));

/// Supplies the raw bytes of the source feed for one run.
pub trait FeedSource: Send + Sync {
    /// Human-readable origin used in logs.
    fn describe(&self) -> String;
    fn fetch(&self) -> Result<Vec<u8>, FetchError>;
}

#[derive(Debug, thiserror::Error)]
pub enum FetchError {
    #[error("failed to download feed from {url}: {source}")]
    Http {
        url: String,
        #[source]
        source: reqwest::Error,
    },
    #[error("failed to read feed file {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Downloads the feed over HTTP(S). A client is built per fetch so the
/// source can be created from async code and used on a blocking thread.
#[derive(Debug, Clone)]
pub struct HttpFeedSource {
    url: String,
    timeout: Duration,
}

impl HttpFeedSource {
    pub fn new(url: impl Into<String>, timeout: Duration) -> Self {
        Self {
            url: url.into(),
            timeout,
        }
    }
}

impl FeedSource for HttpFeedSource {
    fn describe(&self) -> String {
        self.url.clone()
    }

    fn fetch(&self) -> Result<Vec<u8>, FetchError> {
        let http_error = |source| FetchError::Http {
            url: self.url.clone(),
            source,
        };

        let client = Client::builder()
            .user_agent(USER_AGENT)
            .timeout(self.timeout)
            .build()
            .map_err(http_error)?;
        let response = client
            .get(&self.url)
            .send()
            .and_then(|response| response.error_for_status())
            .map_err(http_error)?;
        let body = response.bytes().map_err(http_error)?;
        Ok(body.to_vec())
    }
}

/// Reads the feed from a local file, mostly for one-off conversions.
#[derive(Debug, Clone)]
pub struct FileFeedSource {
    path: PathBuf,
}

impl FileFeedSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl FeedSource for FileFeedSource {
    fn describe(&self) -> String {
        self.path.display().to_string()
    }

    fn fetch(&self) -> Result<Vec<u8>, FetchError> {
        std::fs::read(&self.path).map_err(|source| FetchError::Io {
            path: self.path.clone(),
            source,
        })
    }
}

/// Picks the HTTP source for `http(s)://` locations and a file source otherwise.
pub fn feed_source(location: &str, timeout: Duration) -> Arc<dyn FeedSource> {
    let location = location.trim();
    if location.starts_with("http://") || location.starts_with("https://") {
        Arc::new(HttpFeedSource::new(location, timeout))
    } else {
        Arc::new(FileFeedSource::new(location))
    }
}
