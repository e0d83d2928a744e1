//! Image loading error types.

use std::time::Duration;

use thiserror::Error;

/// Outcome of a failed image load.
///
/// `Clone` so a single fetch outcome can be handed to every caller attached
/// to it.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[allow(missing_docs)]
pub enum ImageError {
    #[error("network error: {message}")]
    Transport { message: String },

    #[error("server responded with HTTP {status}")]
    Status { status: u16 },

    #[error("request timed out after {}s", .timeout.as_secs())]
    Timeout { timeout: Duration },

    #[error("failed to decode image: {message}")]
    Decode { message: String },

    #[error("image load cancelled")]
    Cancelled,

    #[error("cache storage error: {message}")]
    Io { message: String },
}

impl ImageError {
    /// Creates transport error.
    #[must_use]
    pub fn transport(message: impl Into<String>) -> Self {
        Self::Transport {
            message: message.into(),
        }
    }

    /// Creates decode error.
    #[must_use]
    pub fn decode(message: impl Into<String>) -> Self {
        Self::Decode {
            message: message.into(),
        }
    }

    /// Creates storage error.
    #[must_use]
    pub fn io(message: impl Into<String>) -> Self {
        Self::Io {
            message: message.into(),
        }
    }

    /// Returns whether the load was cancelled by a caller.
    #[must_use]
    pub const fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled)
    }

    /// Returns whether the failure came from the network phase.
    #[must_use]
    pub const fn is_transport(&self) -> bool {
        matches!(
            self,
            Self::Transport { .. } | Self::Status { .. } | Self::Timeout { .. }
        )
    }

    /// Returns whether retrying the same request may succeed.
    #[must_use]
    pub const fn is_transient(&self) -> bool {
        match self {
            Self::Transport { .. } | Self::Timeout { .. } => true,
            Self::Status { status } => *status >= 500 || *status == 429 || *status == 408,
            Self::Decode { .. } | Self::Cancelled | Self::Io { .. } => false,
        }
    }
}
