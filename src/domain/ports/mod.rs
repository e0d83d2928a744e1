mod image_loader_port;
mod image_transport_port;
mod news_feed_port;

pub use image_loader_port::{ImageLoaderPort, ImageResult};
pub use image_transport_port::{
    CachePolicy, FetchRequest, FetchResponse, ImageTransport,
};
pub use news_feed_port::NewsFeedPort;

#[cfg(test)]
pub mod mocks {
    pub use super::news_feed_port::MockNewsFeedPort;
}
