//! Feed API error types.

use thiserror::Error;

/// Failure while fetching a page of the news feed.
#[derive(Debug, Error)]
#[allow(missing_docs)]
pub enum FeedError {
    #[error("invalid API URL: {url}")]
    BadUrl { url: String },

    #[error("feed API responded with HTTP {0}")]
    Status(u16),

    #[error("failed to decode feed response: {message}")]
    Decoding { message: String },

    #[error("network error while fetching feed: {message}")]
    Network { message: String },
}

impl FeedError {
    /// Creates bad URL error.
    #[must_use]
    pub fn bad_url(url: impl Into<String>) -> Self {
        Self::BadUrl { url: url.into() }
    }

    /// Creates decoding error.
    #[must_use]
    pub fn decoding(message: impl Into<String>) -> Self {
        Self::Decoding {
            message: message.into(),
        }
    }

    /// Creates network error.
    #[must_use]
    pub fn network(message: impl Into<String>) -> Self {
        Self::Network {
            message: message.into(),
        }
    }
}
