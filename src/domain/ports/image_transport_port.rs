//! Port definition for the network side of image loading.

use std::time::Duration;

use bytes::Bytes;

use crate::domain::entities::ImageKey;
use crate::domain::errors::ImageError;

/// How a request interacts with locally stored HTTP responses.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CachePolicy {
    /// Always go to the network and ignore any stored response.
    ReloadIgnoringCache,
    /// Only serve a stored response; never touch the network.
    ReturnCacheDontLoad,
}

/// A GET request for image bytes.
#[derive(Debug, Clone)]
pub struct FetchRequest {
    /// Resource to fetch.
    pub key: ImageKey,
    /// Cache interaction for this request.
    pub cache_policy: CachePolicy,
    /// Upper bound for the whole transfer.
    pub timeout: Duration,
}

impl FetchRequest {
    /// Creates a request that bypasses local caches.
    #[must_use]
    pub const fn reload(key: ImageKey, timeout: Duration) -> Self {
        Self {
            key,
            cache_policy: CachePolicy::ReloadIgnoringCache,
            timeout,
        }
    }
}

/// Raw response for an image request.
#[derive(Debug, Clone)]
pub struct FetchResponse {
    /// HTTP status code.
    pub status: u16,
    /// `Content-Type` header, if any.
    pub content_type: Option<String>,
    /// `ETag` header, if any.
    pub etag: Option<String>,
    /// `Last-Modified` header, if any.
    pub last_modified: Option<String>,
    /// Response body.
    pub body: Bytes,
}

impl FetchResponse {
    /// Creates a 200 response carrying only a body.
    #[must_use]
    pub fn ok(body: impl Into<Bytes>) -> Self {
        Self {
            status: 200,
            content_type: None,
            etag: None,
            last_modified: None,
            body: body.into(),
        }
    }

    /// Returns true for 2xx statuses.
    #[must_use]
    pub const fn is_success(&self) -> bool {
        self.status >= 200 && self.status < 300
    }
}

/// Performs network GETs for image bytes.
#[async_trait::async_trait]
pub trait ImageTransport: Send + Sync {
    /// Fetches the resource described by `request`.
    ///
    /// A non-2xx status is not an error at this level; callers inspect
    /// [`FetchResponse::status`].
    async fn fetch(&self, request: FetchRequest) -> Result<FetchResponse, ImageError>;
}
