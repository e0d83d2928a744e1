//! Stored HTTP responses for image requests.
//!
//! Every successful network fetch is recorded here, keyed by request URL, and
//! consulted by cache-only lookups. Entries are JSON envelopes carrying the
//! response metadata and a base64 body. Disk usage is bounded; the oldest
//! entries are removed when the capacity is exceeded.

use std::io::Write;
use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};

use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use bytes::Bytes;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tempfile::NamedTempFile;
use tracing::{debug, trace, warn};

use crate::domain::entities::ImageKey;
use crate::domain::errors::ImageError;
use crate::domain::ports::{CachePolicy, FetchRequest, FetchResponse, ImageResult};

/// Default disk capacity for stored responses (64 MiB).
pub const DEFAULT_HTTP_CACHE_SIZE: u64 = 64 * 1024 * 1024;

const EXTENSION: &str = "resp";

/// A response previously stored for a URL.
#[derive(Debug, Clone)]
pub struct CachedResponse {
    /// HTTP status code of the stored response.
    pub status: u16,
    /// `Content-Type` header, if any.
    pub content_type: Option<String>,
    /// `ETag` header, if any.
    pub etag: Option<String>,
    /// `Last-Modified` header, if any.
    pub last_modified: Option<String>,
    /// When the response was stored.
    pub stored_at: DateTime<Utc>,
    /// Response body.
    pub body: Bytes,
}

#[derive(Debug, Serialize, Deserialize)]
struct Envelope {
    url: String,
    status: u16,
    content_type: Option<String>,
    etag: Option<String>,
    last_modified: Option<String>,
    stored_at: DateTime<Utc>,
    body: String,
}

/// Disk-backed store of successful image responses.
#[derive(Debug)]
pub struct HttpResponseCache {
    cache_dir: PathBuf,
    max_size: u64,
    current_size: AtomicU64,
}

impl HttpResponseCache {
    /// Opens a response store in `cache_dir`, creating it if absent.
    ///
    /// # Errors
    /// Returns error if the directory cannot be created or listed.
    pub fn new(cache_dir: PathBuf, max_size: u64) -> ImageResult<Self> {
        std::fs::create_dir_all(&cache_dir)
            .map_err(|e| ImageError::io(format!("Failed to create response cache dir: {e}")))?;

        let entries = std::fs::read_dir(&cache_dir)
            .map_err(|e| ImageError::io(format!("Failed to read response cache dir: {e}")))?;

        let total_size = entries
            .filter_map(Result::ok)
            .filter(|entry| entry.path().extension().is_some_and(|ext| ext == EXTENSION))
            .filter_map(|entry| entry.metadata().ok())
            .map(|meta| meta.len())
            .sum();

        let cache = Self {
            cache_dir,
            max_size,
            current_size: AtomicU64::new(total_size),
        };
        cache.cleanup_if_needed();
        Ok(cache)
    }

    fn cache_path(&self, key: &ImageKey) -> PathBuf {
        self.cache_dir
            .join(format!("{}.{EXTENSION}", key.storage_name()))
    }

    /// Answers `request` from stored responses, honoring its cache policy.
    ///
    /// Requests that must reload never match.
    #[must_use]
    pub fn cached_response(&self, request: &FetchRequest) -> Option<CachedResponse> {
        match request.cache_policy {
            CachePolicy::ReturnCacheDontLoad => self.get(&request.key),
            CachePolicy::ReloadIgnoringCache => None,
        }
    }

    /// Returns the stored response for `key`.
    #[must_use]
    pub fn get(&self, key: &ImageKey) -> Option<CachedResponse> {
        let path = self.cache_path(key);
        let raw = std::fs::read(&path).ok()?;

        let envelope: Envelope = match serde_json::from_slice(&raw) {
            Ok(envelope) => envelope,
            Err(e) => {
                warn!(key = %key, error = %e, "Discarding unreadable stored response");
                self.remove(key);
                return None;
            }
        };

        if envelope.url != key.as_str() {
            trace!(key = %key, stored = %envelope.url, "Stored response belongs to another URL");
            return None;
        }

        let body = match BASE64.decode(envelope.body.as_bytes()) {
            Ok(body) => body,
            Err(e) => {
                warn!(key = %key, error = %e, "Discarding stored response with corrupt body");
                self.remove(key);
                return None;
            }
        };

        trace!(key = %key, "Response cache hit");
        Some(CachedResponse {
            status: envelope.status,
            content_type: envelope.content_type,
            etag: envelope.etag,
            last_modified: envelope.last_modified,
            stored_at: envelope.stored_at,
            body: Bytes::from(body),
        })
    }

    /// Records a response for `key`. Non-2xx responses are ignored.
    ///
    /// # Errors
    /// Returns error if the envelope cannot be written.
    pub fn store(&self, key: &ImageKey, response: &FetchResponse) -> ImageResult<()> {
        if !response.is_success() {
            trace!(key = %key, status = response.status, "Not storing unsuccessful response");
            return Ok(());
        }

        let envelope = Envelope {
            url: key.as_str().to_owned(),
            status: response.status,
            content_type: response.content_type.clone(),
            etag: response.etag.clone(),
            last_modified: response.last_modified.clone(),
            stored_at: Utc::now(),
            body: BASE64.encode(&response.body),
        };
        let encoded = serde_json::to_vec(&envelope)
            .map_err(|e| ImageError::io(format!("Failed to encode stored response: {e}")))?;

        let path = self.cache_path(key);
        let old_size = std::fs::metadata(&path).map(|m| m.len()).ok();

        let mut file = NamedTempFile::new_in(&self.cache_dir)
            .map_err(|e| ImageError::io(format!("Failed to create response file: {e}")))?;
        file.write_all(&encoded)
            .map_err(|e| ImageError::io(format!("Failed to write response file: {e}")))?;
        file.persist(&path)
            .map_err(|e| ImageError::io(format!("Failed to persist response file: {e}")))?;

        let new_size = encoded.len() as u64;
        if let Some(old) = old_size {
            self.current_size.fetch_sub(old.min(self.size()), Ordering::Relaxed);
        }
        self.current_size.fetch_add(new_size, Ordering::Relaxed);

        debug!(key = %key, size = new_size, "Stored response in HTTP cache");

        self.cleanup_if_needed();
        Ok(())
    }

    /// Removes the stored response for `key`.
    pub fn remove(&self, key: &ImageKey) {
        let path = self.cache_path(key);
        let size = std::fs::metadata(&path).map(|m| m.len()).ok();
        if let Err(e) = std::fs::remove_file(&path) {
            if e.kind() != std::io::ErrorKind::NotFound {
                warn!(key = %key, error = %e, "Failed to remove stored response");
            }
        } else if let Some(s) = size {
            self.current_size.fetch_sub(s.min(self.size()), Ordering::Relaxed);
        }
    }

    /// Removes every stored response.
    ///
    /// # Errors
    /// Returns error if the directory cannot be read.
    pub fn clear(&self) -> ImageResult<()> {
        let entries = std::fs::read_dir(&self.cache_dir)
            .map_err(|e| ImageError::io(format!("Failed to read response cache dir: {e}")))?;

        for entry in entries.filter_map(Result::ok) {
            let path = entry.path();
            if path.extension().is_some_and(|ext| ext == EXTENSION)
                && std::fs::remove_file(&path).is_err()
            {
                warn!(path = %path.display(), "Failed to remove stored response");
            }
        }
        self.current_size.store(0, Ordering::Relaxed);
        debug!("Cleared HTTP response cache");
        Ok(())
    }

    /// Bytes currently used on disk.
    #[must_use]
    pub fn size(&self) -> u64 {
        self.current_size.load(Ordering::Relaxed)
    }

    /// Removes the oldest entries once usage exceeds the capacity, down to
    /// 90% of it.
    fn cleanup_if_needed(&self) {
        let current_size = self.size();
        if current_size <= self.max_size {
            return;
        }

        debug!(
            current_size = current_size,
            max_size = self.max_size,
            "HTTP cache over limit, cleaning up"
        );

        let Ok(entries) = std::fs::read_dir(&self.cache_dir) else {
            return;
        };

        let mut files: Vec<(PathBuf, std::time::SystemTime, u64)> = entries
            .filter_map(Result::ok)
            .filter(|entry| entry.path().extension().is_some_and(|ext| ext == EXTENSION))
            .filter_map(|entry| {
                let meta = entry.metadata().ok()?;
                let touched = meta
                    .accessed()
                    .or_else(|_| meta.modified())
                    .unwrap_or(std::time::SystemTime::UNIX_EPOCH);
                Some((entry.path(), touched, meta.len()))
            })
            .collect();

        files.sort_by_key(|(_, time, _)| *time);

        let mut freed_size = 0u64;
        let mut freed_count = 0usize;
        let target = current_size - self.max_size + (self.max_size / 10);

        for (path, _, size) in files {
            if freed_size >= target {
                break;
            }

            if let Err(e) = std::fs::remove_file(&path) {
                warn!(path = %path.display(), error = %e, "Failed to remove old response");
            } else {
                freed_size += size;
                freed_count += 1;
            }
        }
        self.current_size
            .fetch_sub(freed_size.min(current_size), Ordering::Relaxed);

        debug!(
            freed_size = freed_size,
            freed_count = freed_count,
            "HTTP cache cleanup complete"
        );
    }
}
