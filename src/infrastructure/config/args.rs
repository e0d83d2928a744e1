use super::app_config::LogLevel;
use clap::Parser;
use std::path::PathBuf;

/// Command-line flags; `Option` fields override `config.toml`.
#[derive(Debug, Parser)]
#[command(
    name = "newsfeed",
    version,
    about = "Headless news feed reader with a tiered image cache",
    long_about = None
)]
pub struct CliArgs {
    /// Configuration file path.
    #[arg(short, long, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Log file path.
    #[arg(long, value_name = "PATH")]
    pub log_path: Option<PathBuf>,

    /// Log verbosity level.
    #[arg(long, value_enum)]
    pub log_level: Option<LogLevel>,

    /// Feed API base URL.
    #[arg(long, value_name = "URL", env = "NEWSFEED_BASE_URL")]
    pub base_url: Option<String>,

    /// Items requested per page.
    #[arg(long)]
    pub page_size: Option<u32>,

    /// Number of feed pages to load.
    #[arg(short, long, default_value_t = 1)]
    pub pages: u32,

    /// Image cache root directory.
    #[arg(long, value_name = "PATH")]
    pub cache_dir: Option<PathBuf>,

    /// Memory cache budget in MiB.
    #[arg(long)]
    pub memory_mb: Option<u64>,

    /// Image download timeout in seconds.
    #[arg(long)]
    pub timeout_secs: Option<u64>,

    /// Maximum simultaneous image downloads.
    #[arg(long)]
    pub max_concurrent_downloads: Option<usize>,

    /// Skip thumbnail downloads.
    #[arg(long)]
    pub no_images: bool,

    /// Clear every image cache tier before loading.
    #[arg(long)]
    pub clear_cache: bool,
}
