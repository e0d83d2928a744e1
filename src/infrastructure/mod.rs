//! Infrastructure layer with external service adapters.

/// Application configuration.
pub mod config;
/// Image caching and loading.
pub mod image;
/// News feed API client.
pub mod news;

pub use self::image::{
    CacheStats, DiskImageCache, HttpResponseCache, ImageLoader, ImageLoaderConfig,
    MemoryImageCache, ReqwestImageTransport,
};
pub use config::{AppConfig, CliArgs, ConfigStorage, LogLevel};
pub use news::NewsApiClient;
