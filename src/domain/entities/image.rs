//! Domain types for image handling.

use std::sync::Arc;

use url::Url;

/// A decoded image shared between cache tiers and callers.
pub type Image = Arc<image::DynamicImage>;

/// Identifies a remote image.
///
/// The key is the resource URL itself. It is the lookup key for every cache
/// tier and the deduplication key for in-flight fetches.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ImageKey(Url);

impl ImageKey {
    /// Creates a key from an already parsed URL.
    #[must_use]
    pub const fn new(url: Url) -> Self {
        Self(url)
    }

    /// Parses a key from a URL string.
    ///
    /// # Errors
    /// Returns error if the string is not an absolute URL.
    pub fn parse(input: &str) -> Result<Self, url::ParseError> {
        Url::parse(input).map(Self)
    }

    /// Returns the underlying URL.
    #[must_use]
    pub const fn url(&self) -> &Url {
        &self.0
    }

    /// Returns the canonical string form of the URL.
    #[must_use]
    pub fn as_str(&self) -> &str {
        self.0.as_str()
    }

    /// Filesystem-safe name derived from the URL.
    ///
    /// Hex of the first 16 bytes of a SHA-256 digest over the canonical URL
    /// string. Not a security boundary.
    #[must_use]
    pub fn storage_name(&self) -> String {
        use sha2::{Digest, Sha256};
        let mut hasher = Sha256::new();
        hasher.update(self.0.as_str().as_bytes());
        let result = hasher.finalize();
        hex::encode(&result[..16])
    }
}

impl std::fmt::Display for ImageKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<Url> for ImageKey {
    fn from(url: Url) -> Self {
        Self::new(url)
    }
}

impl std::str::FromStr for ImageKey {
    type Err = url::ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

/// Cache tier that satisfied a lookup.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheTier {
    /// Decoded image held in the in-memory LRU.
    Memory,
    /// Raw bytes persisted in the image directory.
    Disk,
    /// Stored HTTP response body.
    Http,
}

impl std::fmt::Display for CacheTier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Memory => write!(f, "memory"),
            Self::Disk => write!(f, "disk"),
            Self::Http => write!(f, "http"),
        }
    }
}

/// Decoded size of an image in bytes, used as its memory cost.
#[must_use]
pub fn decoded_size(image: &image::DynamicImage) -> usize {
    image.as_bytes().len()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_storage_name_is_fixed_length_hex() {
        let key = ImageKey::parse("https://example.com/news/42/title.jpg").unwrap();
        let name = key.storage_name();
        assert_eq!(name.len(), 32);
        assert!(name.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn test_storage_name_consistency() {
        let a = ImageKey::parse("https://example.com/image.png").unwrap();
        let b = ImageKey::parse("https://example.com/image.png").unwrap();
        let c = ImageKey::parse("https://example.com/other.png").unwrap();
        assert_eq!(a, b);
        assert_eq!(a.storage_name(), b.storage_name());
        assert_ne!(a.storage_name(), c.storage_name());
    }

    #[test]
    fn test_keys_compare_by_canonical_form() {
        let a = ImageKey::parse("HTTPS://Example.com/a.png").unwrap();
        let b = ImageKey::parse("https://example.com/a.png").unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_relative_url_rejected() {
        assert!(ImageKey::parse("/relative/path.png").is_err());
    }

    #[test]
    fn test_tier_labels() {
        assert_eq!(CacheTier::Memory.to_string(), "memory");
        assert_eq!(CacheTier::Disk.to_string(), "disk");
        assert_eq!(CacheTier::Http.to_string(), "http");
    }

    #[test]
    fn test_decoded_size() {
        let img = image::DynamicImage::new_rgba8(4, 2);
        assert_eq!(decoded_size(&img), 4 * 2 * 4);
    }
}
