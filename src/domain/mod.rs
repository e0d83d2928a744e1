//! Domain layer with core entities, errors and port definitions.

/// Entity definitions.
pub mod entities;
/// Error types.
pub mod errors;
/// Port definitions.
pub mod ports;
/// Serde utilities.
pub mod serde_utils;

pub use entities::{Image, ImageKey};
pub use errors::{FeedError, ImageError};
pub use ports::{ImageLoaderPort, ImageTransport, NewsFeedPort};
