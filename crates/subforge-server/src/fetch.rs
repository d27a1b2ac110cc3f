//! Subscription fetching.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::HeaderName;
use thiserror::Error;
use tracing::debug;

/// User agent sent to subscription providers. Many providers pick the body
/// format from it.
pub const DEFAULT_USER_AGENT: &str = "ClashMeta/1.18.0";

/// Default per-request timeout.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(20);

const USER_INFO_HEADER: HeaderName = HeaderName::from_static("subscription-userinfo");

/// Fetch settings.
#[derive(Debug, Clone)]
pub struct FetchConfig {
    pub user_agent: String,
    pub timeout: Duration,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            user_agent: DEFAULT_USER_AGENT.to_string(),
            timeout: DEFAULT_TIMEOUT,
        }
    }
}

/// Errors that can occur while fetching a source.
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("HTTP {status} from {url}")]
    Status { status: u16, url: String },
}

/// A fetched subscription body.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Fetched {
    pub body: String,
    /// The provider's `subscription-userinfo` header, if sent.
    pub user_info: Option<String>,
}

/// Source of subscription bodies.
#[async_trait]
pub trait Fetcher: Send + Sync {
    async fn fetch(&self, url: &str) -> Result<Fetched, FetchError>;
}

/// Fetches over HTTP(S) with reqwest.
#[derive(Debug, Clone)]
pub struct HttpFetcher {
    client: reqwest::Client,
}

impl HttpFetcher {
    pub fn new(config: &FetchConfig) -> Result<Self, FetchError> {
        let client = reqwest::Client::builder()
            .user_agent(config.user_agent.as_str())
            .timeout(config.timeout)
            .build()?;

        Ok(Self { client })
    }
}

#[async_trait]
impl Fetcher for HttpFetcher {
    async fn fetch(&self, url: &str) -> Result<Fetched, FetchError> {
        let response = self.client.get(url).send().await?;
        let status = response.status();
        debug!(url, status = status.as_u16(), "fetched subscription");

        if !status.is_success() {
            return Err(FetchError::Status {
                status: status.as_u16(),
                url: url.to_string(),
            });
        }

        let user_info = response
            .headers()
            .get(USER_INFO_HEADER)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        let body = response.text().await?;

        Ok(Fetched { body, user_info })
    }
}


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = FetchConfig::default();
        assert_eq!(config.user_agent, "ClashMeta/1.18.0");
        assert_eq!(config.timeout, DEFAULT_TIMEOUT);
    }

    #[test]
    fn test_http_fetcher_builds() {
        assert!(HttpFetcher::new(&FetchConfig::default()).is_ok());
    }

    #[tokio::test]
    async fn test_stub_unknown_url_is_error() {
        let fetcher = stub::StubFetcher::new([("https://a.example", "body")]);
        assert!(fetcher.fetch("https://a.example").await.is_ok());
        assert!(matches!(
            fetcher.fetch("https://b.example").await,
            Err(FetchError::Status { status: 404, .. })
        ));
        assert_eq!(fetcher.calls(), 2);
    }
}
