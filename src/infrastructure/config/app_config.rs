//! Application configuration.

use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

use super::args::CliArgs;
use crate::infrastructure::image::{ImageLoaderConfig, default_cache_root};
use crate::infrastructure::news::DEFAULT_BASE_URL;

pub(crate) const APP_NAME: &str = "newsfeed";
pub(crate) const APP_QUALIFIER: &str = "com";
pub(crate) const APP_ORGANIZATION: &str = "newsfeed";

const MIB: u64 = 1024 * 1024;

/// Log level configuration.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    /// Trace level.
    Trace,
    /// Debug level.
    Debug,
    /// Info level.
    #[default]
    Info,
    /// Warning level.
    Warn,
    /// Error level.
    Error,
}

impl std::fmt::Display for LogLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Trace => write!(f, "trace"),
            Self::Debug => write!(f, "debug"),
            Self::Info => write!(f, "info"),
            Self::Warn => write!(f, "warn"),
            Self::Error => write!(f, "error"),
        }
    }
}

/// Application configuration, read from `config.toml` and overridden by CLI flags.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// Log file path.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub log_path: Option<PathBuf>,

    /// Log verbosity level.
    #[serde(default)]
    pub log_level: LogLevel,

    /// Feed API configuration.
    #[serde(default)]
    pub api: ApiConfig,

    /// Image cache configuration.
    #[serde(default)]
    pub images: ImagesConfig,
}

/// Feed API configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApiConfig {
    /// Base URL of the feed API.
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// Items requested per page.
    #[serde(default = "default_page_size")]
    pub page_size: u32,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            page_size: default_page_size(),
        }
    }
}

/// Image cache configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImagesConfig {
    /// Memory tier budget in MiB of decoded pixels.
    #[serde(default = "default_cache_mb")]
    pub memory_mb: u64,

    /// Disk capacity of stored HTTP responses in MiB.
    #[serde(default = "default_cache_mb")]
    pub http_cache_mb: u64,

    /// Network timeout per image in seconds.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    /// Maximum simultaneous image downloads.
    #[serde(default = "default_max_concurrent_downloads")]
    pub max_concurrent_downloads: usize,

    /// Cache root directory. Defaults to the user cache directory.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cache_dir: Option<PathBuf>,
}

impl Default for ImagesConfig {
    fn default() -> Self {
        Self {
            memory_mb: default_cache_mb(),
            http_cache_mb: default_cache_mb(),
            timeout_secs: default_timeout_secs(),
            max_concurrent_downloads: default_max_concurrent_downloads(),
            cache_dir: None,
        }
    }
}

impl ImagesConfig {
    /// Converts to loader settings. Zero values fall back to one unit.
    #[must_use]
    pub fn loader_config(&self) -> ImageLoaderConfig {
        ImageLoaderConfig {
            memory_budget: usize::try_from(self.memory_mb.saturating_mul(MIB))
                .unwrap_or(usize::MAX),
            http_cache_size: self.http_cache_mb.saturating_mul(MIB),
            max_concurrent_downloads: self.max_concurrent_downloads.max(1),
            fetch_timeout: Duration::from_secs(self.timeout_secs.max(1)),
        }
    }

    /// Effective cache root.
    #[must_use]
    pub fn effective_cache_dir(&self) -> PathBuf {
        self.cache_dir.clone().unwrap_or_else(default_cache_root)
    }
}

fn default_base_url() -> String {
    DEFAULT_BASE_URL.to_string()
}

const fn default_page_size() -> u32 {
    crate::application::services::DEFAULT_PAGE_SIZE
}

const fn default_cache_mb() -> u64 {
    64
}

const fn default_timeout_secs() -> u64 {
    60
}

const fn default_max_concurrent_downloads() -> usize {
    6
}

impl AppConfig {
    /// Merges CLI arguments into the configuration.
    pub fn merge_with_args(&mut self, args: CliArgs) {
        if let Some(log_path) = args.log_path {
            self.log_path = Some(log_path);
        }
        if let Some(log_level) = args.log_level {
            self.log_level = log_level;
        }
        if let Some(base_url) = args.base_url {
            self.api.base_url = base_url;
        }
        if let Some(page_size) = args.page_size {
            self.api.page_size = page_size;
        }
        if let Some(cache_dir) = args.cache_dir {
            self.images.cache_dir = Some(cache_dir);
        }
        if let Some(memory_mb) = args.memory_mb {
            self.images.memory_mb = memory_mb;
        }
        if let Some(timeout_secs) = args.timeout_secs {
            self.images.timeout_secs = timeout_secs;
        }
        if let Some(max_downloads) = args.max_concurrent_downloads {
            self.images.max_concurrent_downloads = max_downloads;
        }
    }

    /// Returns default log file path.
    #[must_use]
    pub fn default_log_path() -> Option<PathBuf> {
        ProjectDirs::from(APP_QUALIFIER, APP_ORGANIZATION, APP_NAME)
            .map(|dirs| dirs.data_dir().join("newsfeed.log"))
    }

    /// Returns effective log path.
    #[must_use]
    pub fn effective_log_path(&self) -> Option<PathBuf> {
        self.log_path.clone().or_else(Self::default_log_path)
    }
}
