//! Port definition for the paginated news API.

use async_trait::async_trait;

use crate::domain::entities::NewsPage;
use crate::domain::errors::FeedError;

/// Port for fetching pages of the news feed.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait NewsFeedPort: Send + Sync {
    /// Fetches one page. Pages are 1-based.
    async fn fetch_page(&self, page: u32, page_size: u32) -> Result<NewsPage, FeedError>;
}
