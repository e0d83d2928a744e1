//! Domain entity definitions.

mod image;
mod news;

pub use self::image::{CacheTier, Image, ImageKey, decoded_size};
pub use news::{NewsItem, NewsPage};
