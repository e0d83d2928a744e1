//! Image handling infrastructure.
//!
//! This module provides:
//! - Memory caching with a byte-budgeted LRU
//! - Disk caching of raw image bytes
//! - Stored HTTP responses as a fallback tier
//! - The fetch coordinator that deduplicates network loads

pub mod disk_cache;
pub mod http_cache;
pub mod loader;
pub mod memory_cache;
pub mod transport;

pub use disk_cache::{DiskImageCache, default_cache_root};
pub use http_cache::{CachedResponse, HttpResponseCache};
pub use loader::{ImageLoader, ImageLoaderConfig};
pub use memory_cache::{CacheStats, MemoryImageCache};
pub use transport::ReqwestImageTransport;
