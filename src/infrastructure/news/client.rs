//! News feed HTTP client.

use async_trait::async_trait;
use reqwest::{Client, header};
use serde::de::DeserializeOwned;
use tracing::{debug, warn};
use url::Url;

use crate::domain::entities::NewsPage;
use crate::domain::errors::FeedError;
use crate::domain::ports::NewsFeedPort;

/// Default feed API host.
pub const DEFAULT_BASE_URL: &str = "https://webapi.autodoc.ru";
const NEWS_PATH: &str = "api/news";
const USER_AGENT: &str = concat!("newsfeed/", env!("CARGO_PKG_VERSION"));

/// JSON API client for the news feed.
#[derive(Debug, Clone)]
pub struct NewsApiClient {
    client: Client,
    base_url: Url,
}

impl NewsApiClient {
    /// Creates new client with default base URL.
    ///
    /// # Errors
    /// Returns error if HTTP client creation fails.
    pub fn new() -> Result<Self, FeedError> {
        Self::with_base_url(DEFAULT_BASE_URL)
    }

    /// Creates client with custom base URL.
    ///
    /// # Errors
    /// Returns error if the base URL is invalid or HTTP client creation fails.
    pub fn with_base_url(base_url: impl Into<String>) -> Result<Self, FeedError> {
        let raw = base_url.into();
        let base_url = Url::parse(&raw).map_err(|_| FeedError::bad_url(&raw))?;
        if base_url.cannot_be_a_base() {
            return Err(FeedError::bad_url(raw));
        }

        let client = Client::builder()
            .user_agent(USER_AGENT)
            .timeout(std::time::Duration::from_secs(30))
            .build()
            .map_err(|e| FeedError::network(format!("failed to create HTTP client: {e}")))?;

        Ok(Self { client, base_url })
    }

    /// Builds `{base}/{path}/{params...}`.
    fn endpoint(&self, path: &str, path_parameters: &[String]) -> Result<Url, FeedError> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|()| FeedError::bad_url(self.base_url.as_str()))?
            .pop_if_empty()
            .extend(path.split('/').filter(|s| !s.is_empty()))
            .extend(path_parameters);
        Ok(url)
    }

    /// Performs a GET and decodes the JSON body.
    async fn get_json<T: DeserializeOwned>(
        &self,
        path: &str,
        path_parameters: &[String],
    ) -> Result<T, FeedError> {
        let url = self.endpoint(path, path_parameters)?;
        debug!(url = %url, "Requesting feed API");

        let response = self
            .client
            .get(url)
            .header(header::ACCEPT, "application/json")
            .send()
            .await
            .map_err(|e| {
                warn!(error = %e, "Failed to reach feed API");
                if e.is_timeout() {
                    FeedError::network("request timed out")
                } else if e.is_connect() {
                    FeedError::network("failed to connect to feed API")
                } else {
                    FeedError::network(e.to_string())
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(FeedError::Status(status.as_u16()));
        }

        let body = response
            .bytes()
            .await
            .map_err(|e| FeedError::network(format!("failed to read response: {e}")))?;

        serde_json::from_slice(&body).map_err(|e| {
            warn!(error = %e, "Failed to parse feed response");
            FeedError::decoding(e.to_string())
        })
    }
}

#[async_trait]
impl NewsFeedPort for NewsApiClient {
    async fn fetch_page(&self, page: u32, page_size: u32) -> Result<NewsPage, FeedError> {
        let page: NewsPage = self
            .get_json(NEWS_PATH, &[page.to_string(), page_size.to_string()])
            .await?;
        debug!(items = page.news.len(), has_more = ?page.has_more, "Fetched feed page");
        Ok(page)
    }
}
