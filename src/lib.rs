//! Newsfeed - a paginated news feed client with a tiered image loader.
//!
//! Thumbnails are resolved from memory, then disk, then stored HTTP
//! responses, and only then from the network. Concurrent requests for the
//! same image share a single download.

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

/// Application layer containing feed services and DTOs.
pub mod application;
/// Domain layer containing entities, errors, and port definitions.
pub mod domain;
/// Infrastructure layer containing adapters for external services.
pub mod infrastructure;

/// Current version of the application.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Application name.
pub const NAME: &str = "newsfeed";
