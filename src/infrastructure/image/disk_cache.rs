//! Disk-based image cache for persistence across sessions.
//!
//! A flat directory of `<storage name>.img` files holding the raw encoded
//! bytes as received from the network. There is no manifest and no eviction;
//! entries live until the directory is cleared.

use std::io::Write;
use std::path::{Path, PathBuf};

use tempfile::NamedTempFile;
use tracing::{debug, trace, warn};

use crate::domain::entities::ImageKey;
use crate::domain::errors::ImageError;
use crate::domain::ports::ImageResult;

const EXTENSION: &str = "img";

/// Disk-based image cache that persists raw image bytes.
#[derive(Debug)]
pub struct DiskImageCache {
    cache_dir: PathBuf,
}

impl DiskImageCache {
    /// Opens a cache in `cache_dir`, creating the directory if absent.
    ///
    /// # Errors
    /// Returns error if cache directory cannot be created.
    pub fn new(cache_dir: PathBuf) -> ImageResult<Self> {
        std::fs::create_dir_all(&cache_dir)
            .map_err(|e| ImageError::io(format!("Failed to create cache dir: {e}")))?;
        debug!(path = %cache_dir.display(), "Opened disk image cache");
        Ok(Self { cache_dir })
    }

    /// Directory holding the cached files.
    #[must_use]
    pub fn dir(&self) -> &Path {
        &self.cache_dir
    }

    /// Returns the path for a cached image.
    #[must_use]
    pub fn cache_path(&self, key: &ImageKey) -> PathBuf {
        self.cache_dir
            .join(format!("{}.{EXTENSION}", key.storage_name()))
    }

    /// Reads raw image bytes. Missing or unreadable files are a miss.
    #[must_use]
    pub fn get_bytes(&self, key: &ImageKey) -> Option<Vec<u8>> {
        let path = self.cache_path(key);
        match std::fs::read(&path) {
            Ok(bytes) => {
                trace!(key = %key, path = %path.display(), "Disk cache hit");
                Some(bytes)
            }
            Err(e) => {
                if e.kind() != std::io::ErrorKind::NotFound {
                    warn!(key = %key, error = %e, "Failed to read disk cache entry");
                }
                trace!(key = %key, "Disk cache miss");
                None
            }
        }
    }

    /// Loads and decodes an image from disk.
    ///
    /// Entries that no longer decode are treated as a miss.
    #[must_use]
    pub fn get(&self, key: &ImageKey) -> Option<image::DynamicImage> {
        let bytes = self.get_bytes(key)?;
        match image::load_from_memory(&bytes) {
            Ok(img) => {
                debug!(key = %key, "Decoded image from disk cache");
                Some(img)
            }
            Err(e) => {
                warn!(key = %key, error = %e, "Failed to decode cached image");
                None
            }
        }
    }

    /// Stores raw bytes, replacing any previous entry atomically.
    ///
    /// # Errors
    /// Returns error if the file cannot be written or moved into place.
    pub fn put_bytes(&self, key: &ImageKey, bytes: &[u8]) -> ImageResult<()> {
        let path = self.cache_path(key);

        let mut file = NamedTempFile::new_in(&self.cache_dir)
            .map_err(|e| ImageError::io(format!("Failed to create cache file: {e}")))?;
        file.write_all(bytes)
            .map_err(|e| ImageError::io(format!("Failed to write cache file: {e}")))?;
        file.persist(&path)
            .map_err(|e| ImageError::io(format!("Failed to persist cache file: {e}")))?;

        debug!(key = %key, path = %path.display(), size = bytes.len(), "Stored image in disk cache");
        Ok(())
    }

    /// Removes an image from disk cache.
    pub fn evict(&self, key: &ImageKey) {
        let path = self.cache_path(key);
        match std::fs::remove_file(&path) {
            Ok(()) => debug!(key = %key, "Evicted from disk cache"),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => warn!(key = %key, error = %e, "Failed to evict from disk cache"),
        }
    }

    /// Checks if an image is cached.
    #[must_use]
    pub fn contains(&self, key: &ImageKey) -> bool {
        self.cache_path(key).is_file()
    }

    /// Returns the number of cached files.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries().count()
    }

    /// Returns true if the cache is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries().next().is_none()
    }

    /// Clears the entire disk cache.
    ///
    /// # Errors
    /// Returns error if cache directory cannot be read.
    pub fn clear(&self) -> ImageResult<()> {
        std::fs::read_dir(&self.cache_dir)
            .map_err(|e| ImageError::io(format!("Failed to read cache dir: {e}")))?;

        for path in self.entries() {
            if let Err(e) = std::fs::remove_file(&path) {
                warn!(path = %path.display(), error = %e, "Failed to remove cache file");
            }
        }
        debug!("Cleared disk cache");
        Ok(())
    }

    fn entries(&self) -> impl Iterator<Item = PathBuf> {
        std::fs::read_dir(&self.cache_dir)
            .into_iter()
            .flatten()
            .filter_map(Result::ok)
            .map(|entry| entry.path())
            .filter(|path| path.extension().is_some_and(|ext| ext == EXTENSION))
    }
}

/// Returns the default cache root (`<user cache dir>/newsfeed`).
///
/// Falls back to the temp directory when no home directory is known.
#[must_use]
pub fn default_cache_root() -> PathBuf {
    directories::ProjectDirs::from("com", "newsfeed", "newsfeed").map_or_else(
        || std::env::temp_dir().join("newsfeed").join("cache"),
        |dirs| dirs.cache_dir().to_path_buf(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn create_test_cache() -> (DiskImageCache, TempDir) {
        let temp_dir = TempDir::new().unwrap();
        let cache = DiskImageCache::new(temp_dir.path().join("Images")).unwrap();
        (cache, temp_dir)
    }

    fn key(name: &str) -> ImageKey {
        ImageKey::parse(&format!("https://example.com/{name}.png")).unwrap()
    }

    fn png_bytes() -> Vec<u8> {
        let mut buf = Vec::new();
        image::DynamicImage::new_rgb8(3, 2)
            .write_to(&mut std::io::Cursor::new(&mut buf), image::ImageFormat::Png)
            .unwrap();
        buf
    }

    #[test]
    fn test_creates_directory() {
        let temp_dir = TempDir::new().unwrap();
        let dir = temp_dir.path().join("nested").join("Images");
        let _cache = DiskImageCache::new(dir.clone()).unwrap();
        assert!(dir.is_dir());
    }

    #[test]
    fn test_put_and_get_bytes() {
        let (cache, _temp) = create_test_cache();
        let data = b"test image data";

        cache.put_bytes(&key("a"), data).unwrap();

        assert_eq!(cache.get_bytes(&key("a")).as_deref(), Some(&data[..]));
    }

    #[test]
    fn test_file_named_by_storage_name() {
        let (cache, _temp) = create_test_cache();
        cache.put_bytes(&key("a"), b"x").unwrap();

        let expected = cache.dir().join(format!("{}.img", key("a").storage_name()));
        assert!(expected.is_file());
    }

    #[test]
    fn test_cache_miss() {
        let (cache, _temp) = create_test_cache();
        assert!(cache.get_bytes(&key("nonexistent")).is_none());
        assert!(cache.get(&key("nonexistent")).is_none());
    }

    #[test]
    fn test_get_decodes() {
        let (cache, _temp) = create_test_cache();
        cache.put_bytes(&key("a"), &png_bytes()).unwrap();

        let img = cache.get(&key("a")).unwrap();
        assert_eq!((img.width(), img.height()), (3, 2));
    }

    #[test]
    fn test_undecodable_entry_is_miss() {
        let (cache, _temp) = create_test_cache();
        cache.put_bytes(&key("a"), b"not an image").unwrap();
        assert!(cache.get(&key("a")).is_none());
    }

    #[test]
    fn test_overwrite_replaces() {
        let (cache, _temp) = create_test_cache();
        cache.put_bytes(&key("a"), b"first").unwrap();
        cache.put_bytes(&key("a"), b"second").unwrap();

        assert_eq!(cache.get_bytes(&key("a")).as_deref(), Some(&b"second"[..]));
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn test_evict() {
        let (cache, _temp) = create_test_cache();
        cache.put_bytes(&key("a"), b"test").unwrap();
        assert!(cache.contains(&key("a")));

        cache.evict(&key("a"));
        assert!(!cache.contains(&key("a")));

        // evicting again is harmless
        cache.evict(&key("a"));
    }

    #[test]
    fn test_clear() {
        let (cache, _temp) = create_test_cache();
        cache.put_bytes(&key("a"), b"data1").unwrap();
        cache.put_bytes(&key("b"), b"data2").unwrap();
        assert_eq!(cache.len(), 2);

        cache.clear().unwrap();
        assert!(cache.is_empty());
    }
}
