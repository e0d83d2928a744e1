//! Application layer with view models and services.

/// Data transfer objects.
pub mod dto;
/// Feed paging and thumbnail services.
pub mod services;

pub use dto::FeedItem;
pub use services::{FeedPager, FeedState, ThumbnailEvent, ThumbnailService};
