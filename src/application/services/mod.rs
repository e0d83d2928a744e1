//! Application services.

pub mod feed_pager;
pub mod thumbnail_service;

pub use feed_pager::{DEFAULT_PAGE_SIZE, FeedPager, FeedState};
pub use thumbnail_service::{ThumbnailEvent, ThumbnailService};
