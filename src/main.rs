use std::collections::HashMap;
use std::sync::Arc;

use clap::Parser;
use color_eyre::eyre::{Result, WrapErr};
use tracing::{info, warn};
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

use newsfeed::application::{FeedPager, ThumbnailService};
use newsfeed::domain::{ImageLoaderPort, NewsFeedPort};
use newsfeed::infrastructure::{
    AppConfig, CliArgs, ConfigStorage, ImageLoader, NewsApiClient, ReqwestImageTransport,
};

fn init_logging(config: &AppConfig) -> Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(config.log_level.to_string()));

    if let Some(log_path) = config.effective_log_path() {
        if let Some(parent) = log_path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let file = std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&log_path)?;

        let file_layer = fmt::layer()
            .with_writer(file)
            .with_ansi(false)
            .with_target(true)
            .with_thread_ids(false);

        tracing_subscriber::registry()
            .with(filter)
            .with(file_layer)
            .init();

        info!(path = %log_path.display(), "Logging initialized");
    } else {
        tracing_subscriber::registry().with(filter).init();
    }

    Ok(())
}

fn load_config(args: CliArgs) -> Result<AppConfig> {
    let mut config = match ConfigStorage::new() {
        Ok(storage) => storage
            .load_config(args.config.as_deref())
            .wrap_err("Failed to load configuration")?,
        Err(_) => AppConfig::default(),
    };
    config.merge_with_args(args);
    Ok(config)
}

#[tokio::main]
async fn main() -> Result<()> {
    color_eyre::install()?;

    let args = CliArgs::parse();
    let pages = args.pages.max(1);
    let no_images = args.no_images;
    let clear_cache = args.clear_cache;

    let config = load_config(args)?;
    init_logging(&config)?;

    info!(version = newsfeed::VERSION, base_url = %config.api.base_url, "Starting newsfeed");

    let feed: Arc<dyn NewsFeedPort> = Arc::new(
        NewsApiClient::with_base_url(&config.api.base_url)
            .wrap_err("Failed to create feed client")?,
    );
    let pager = FeedPager::with_page_size(feed, config.api.page_size);

    let cache_root = config.images.effective_cache_dir();
    let transport = Arc::new(ReqwestImageTransport::new().wrap_err("Failed to create image client")?);
    let loader = ImageLoader::open(config.images.loader_config(), transport, &cache_root)
        .wrap_err_with(|| format!("Failed to open image cache at {}", cache_root.display()))?;

    if clear_cache {
        loader.clear_all();
    }

    pager
        .fetch_news(true)
        .await
        .wrap_err("Failed to load the first feed page")?;
    for _ in 1..pages {
        if !pager.state().has_more {
            break;
        }
        if let Err(e) = pager.fetch_news(false).await {
            warn!(error = %e, "Stopping after failed page");
            break;
        }
    }

    let items = pager.state().items;
    let mut thumbnails = HashMap::new();

    if !no_images {
        let port: Arc<dyn ImageLoaderPort> = Arc::new(loader.clone());
        let (service, mut events) = ThumbnailService::new(port);

        let handles: Vec<_> = items.iter().filter_map(|item| service.configure(item)).collect();
        futures_util::future::join_all(handles).await;
        drop(service);

        while let Some(event) = events.recv().await {
            thumbnails.insert(event.item_id, event.image);
        }
    }

    for (index, item) in items.iter().enumerate() {
        let thumbnail = match thumbnails.get(&item.id) {
            Some(Some(image)) => format!("{}x{}", image.width(), image.height()),
            Some(None) => "placeholder".to_string(),
            None => "-".to_string(),
        };
        let link = item.full_url.as_ref().map_or("", url::Url::as_str);
        println!("{:>3}. {} [{thumbnail}] {link}", index + 1, item.title);
    }

    let state = pager.state();
    println!(
        "{} items, page {}, {}",
        items.len(),
        state.page,
        if state.has_more { "more available" } else { "end of feed" }
    );
    if !no_images {
        println!("{}", loader.memory_stats());
    }

    Ok(())
}
