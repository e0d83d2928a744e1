//! HTTP transport for image bytes.

use async_trait::async_trait;
use reqwest::{Client, header};
use tracing::{debug, warn};

use crate::domain::errors::ImageError;
use crate::domain::ports::{CachePolicy, FetchRequest, FetchResponse, ImageTransport};

const USER_AGENT: &str = concat!("newsfeed/", env!("CARGO_PKG_VERSION"));

/// [`ImageTransport`] backed by a shared reqwest client.
#[derive(Debug, Clone)]
pub struct ReqwestImageTransport {
    client: Client,
}

impl ReqwestImageTransport {
    /// Creates a transport with its own HTTP client.
    ///
    /// # Errors
    /// Returns error if HTTP client creation fails.
    pub fn new() -> Result<Self, ImageError> {
        let client = Client::builder()
            .user_agent(USER_AGENT)
            .build()
            .map_err(|e| ImageError::transport(format!("Failed to create HTTP client: {e}")))?;
        Ok(Self { client })
    }

    fn header_value(response: &reqwest::Response, name: header::HeaderName) -> Option<String> {
        response
            .headers()
            .get(name)
            .and_then(|v| v.to_str().ok())
            .map(String::from)
    }
}

#[async_trait]
impl ImageTransport for ReqwestImageTransport {
    async fn fetch(&self, request: FetchRequest) -> Result<FetchResponse, ImageError> {
        if request.cache_policy == CachePolicy::ReturnCacheDontLoad {
            return Err(ImageError::transport(
                "cache-only request cannot be served by the network",
            ));
        }

        debug!(key = %request.key, "Requesting image");

        let response = self
            .client
            .get(request.key.url().clone())
            .header(header::CACHE_CONTROL, "no-cache")
            .header(header::PRAGMA, "no-cache")
            .timeout(request.timeout)
            .send()
            .await
            .map_err(|e| {
                warn!(key = %request.key, error = %e, "Image request failed");
                if e.is_timeout() {
                    ImageError::Timeout {
                        timeout: request.timeout,
                    }
                } else if e.is_connect() {
                    ImageError::transport(format!("failed to connect: {e}"))
                } else {
                    ImageError::transport(e.to_string())
                }
            })?;

        let status = response.status().as_u16();
        let content_type = Self::header_value(&response, header::CONTENT_TYPE);
        let etag = Self::header_value(&response, header::ETAG);
        let last_modified = Self::header_value(&response, header::LAST_MODIFIED);

        let body = response.bytes().await.map_err(|e| {
            if e.is_timeout() {
                ImageError::Timeout {
                    timeout: request.timeout,
                }
            } else {
                ImageError::transport(format!("Failed to read body: {e}"))
            }
        })?;

        Ok(FetchResponse {
            status,
            content_type,
            etag,
            last_modified,
            body,
        })
    }
}
