//! News feed API adapter.

pub mod client;

pub use client::{DEFAULT_BASE_URL, NewsApiClient};
