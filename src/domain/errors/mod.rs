//! Domain error types.

mod feed_error;
mod image_error;

pub use feed_error::FeedError;
pub use image_error::ImageError;
