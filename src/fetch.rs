//! Network fetch for external sources and URL ingestion.
//!
//! Web pages are read through a reader proxy that returns the page as plain
//! text: the page URL, scheme stripped, is appended to the configured
//! prefix after `http://`. API sources are fetched directly as JSON.
//! Non-success statuses map onto the same [`FailureKind`]s as extraction.

use std::time::Duration;

use async_trait::async_trait;

use crate::config::FetchConfig;
use crate::error::{FailureKind, RagError, Result};

/// A collaborator that fetches remote content.
#[async_trait]
pub trait ContentFetcher: Send + Sync {
    /// Readable text of the web page at `url`.
    async fn fetch_page(&self, url: &str) -> Result<String>;

    /// JSON document at `url`.
    async fn fetch_json(&self, url: &str) -> Result<serde_json::Value>;
}

/// Build the reader-proxy URL for a page.
///
/// ```
/// use rag_harness::fetch::reader_url;
///
/// assert_eq!(
///     reader_url("https://r.jina.ai/", "https://example.com/a"),
///     "https://r.jina.ai/http://example.com/a"
/// );
/// ```
pub fn reader_url(prefix: &str, url: &str) -> String {
    let bare = url
        .strip_prefix("https://")
        .or_else(|| url.strip_prefix("http://"))
        .unwrap_or(url);
    format!("{}http://{}", prefix, bare)
}

/// reqwest-backed [`ContentFetcher`].
pub struct HttpFetcher {
    client: reqwest::Client,
    reader_prefix: String,
}

impl HttpFetcher {
    pub fn new(reader_prefix: impl Into<String>, timeout: Duration) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            reader_prefix: reader_prefix.into(),
        })
    }

    pub fn from_config(config: &FetchConfig) -> anyhow::Result<Self> {
        Self::new(
            config.reader_prefix.clone(),
            Duration::from_secs(config.timeout_secs),
        )
    }

    async fn get(&self, url: &str) -> Result<reqwest::Response> {
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| RagError::Fetch {
                url: url.to_string(),
                kind: FailureKind::Failed,
                message: e.to_string(),
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(RagError::Fetch {
                url: url.to_string(),
                kind: FailureKind::from_status(status.as_u16()),
                message: format!("HTTP {}", status),
            });
        }
        Ok(response)
    }
}

#[async_trait]
impl ContentFetcher for HttpFetcher {
    async fn fetch_page(&self, url: &str) -> Result<String> {
        let proxied = reader_url(&self.reader_prefix, url);
        let response = self.get(&proxied).await?;
        response.text().await.map_err(|e| RagError::Fetch {
            url: url.to_string(),
            kind: FailureKind::Failed,
            message: e.to_string(),
        })
    }

    async fn fetch_json(&self, url: &str) -> Result<serde_json::Value> {
        let response = self.get(url).await?;
        response.json().await.map_err(|e| RagError::Fetch {
            url: url.to_string(),
            kind: FailureKind::Failed,
            message: format!("invalid JSON: {}", e),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reader_url_strips_scheme() {
        assert_eq!(
            reader_url("https://r.jina.ai/", "http://example.com"),
            "https://r.jina.ai/http://example.com"
        );
        assert_eq!(
            reader_url("http://127.0.0.1:9/", "example.com/x?y=1"),
            "http://127.0.0.1:9/http://example.com/x?y=1"
        );
    }
}
