//! Port definition for image loading.

use crate::domain::entities::{Image, ImageKey};
use crate::domain::errors::ImageError;

/// Result type for image operations.
pub type ImageResult<T> = std::result::Result<T, ImageError>;

/// Port for loading images by URL with caching.
/// Implementations must be thread-safe.
#[async_trait::async_trait]
pub trait ImageLoaderPort: Send + Sync {
    /// Best-effort lookup across local cache tiers. Never touches the network.
    fn cached_image(&self, key: &ImageKey) -> Option<Image>;

    /// Returns the image for `key`, fetching it if no tier holds it.
    /// Concurrent calls for the same key share one network fetch.
    async fn load(&self, key: &ImageKey) -> ImageResult<Image>;

    /// Cancels the in-flight fetch for `key`, if any.
    fn cancel(&self, key: &ImageKey);
}
