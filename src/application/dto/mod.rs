//! Data transfer objects for the application layer.

mod feed_item;

pub use feed_item::FeedItem;
