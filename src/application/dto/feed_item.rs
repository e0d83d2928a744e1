//! Feed cell view model.

use std::hash::{Hash, Hasher};

use url::Url;
use uuid::Uuid;

use crate::domain::entities::{ImageKey, NewsItem};

/// A news article as displayed in the feed.
///
/// Every instance gets a fresh identity, so equality and hashing go by `id`
/// only. Two items built from the same article are distinct cells.
#[derive(Debug, Clone)]
pub struct FeedItem {
    /// Cell identity.
    pub id: Uuid,
    /// Article headline.
    pub title: String,
    /// Thumbnail location, if the article has a usable one.
    pub image_url: Option<Url>,
    /// Link to the full article.
    pub full_url: Option<Url>,
}

impl FeedItem {
    /// Creates an item with a fresh id.
    #[must_use]
    pub fn new(title: impl Into<String>, image_url: Option<Url>, full_url: Option<Url>) -> Self {
        Self {
            id: Uuid::new_v4(),
            title: title.into(),
            image_url,
            full_url,
        }
    }

    /// Cache key for the thumbnail.
    #[must_use]
    pub fn image_key(&self) -> Option<ImageKey> {
        self.image_url.clone().map(ImageKey::new)
    }
}

impl From<&NewsItem> for FeedItem {
    fn from(news: &NewsItem) -> Self {
        let image_url = news
            .title_image_url
            .as_deref()
            .and_then(|raw| Url::parse(raw).ok());
        let full_url = Url::parse(&news.full_url).ok();
        Self::new(news.title.clone(), image_url, full_url)
    }
}

impl From<NewsItem> for FeedItem {
    fn from(news: NewsItem) -> Self {
        Self::from(&news)
    }
}

impl PartialEq for FeedItem {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for FeedItem {}

impl Hash for FeedItem {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}
