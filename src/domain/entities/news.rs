//! News feed entities as served by the feed API.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::serde_utils::flexible_datetime;

/// One page of the news feed.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewsPage {
    /// Items on this page.
    pub news: Vec<NewsItem>,
    /// Total number of items, when the server reports it.
    #[serde(default)]
    pub total: Option<i64>,
    /// Whether more pages follow, when the server reports it.
    #[serde(default)]
    pub has_more: Option<bool>,
}

/// A single news article.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
#[allow(missing_docs)]
pub struct NewsItem {
    pub id: i64,
    pub title: String,
    pub description: String,
    pub url: String,
    pub full_url: String,
    #[serde(default)]
    pub title_image_url: Option<String>,
    #[serde(default)]
    pub category_type: Option<String>,
    #[serde(default, with = "flexible_datetime::option")]
    pub published_date: Option<DateTime<Utc>>,
}
