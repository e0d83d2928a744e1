//! Paginated feed state.

use std::sync::Arc;

use tokio::sync::watch;
use tracing::{debug, info, warn};

use crate::application::dto::FeedItem;
use crate::domain::errors::FeedError;
use crate::domain::ports::NewsFeedPort;

/// First page index used by the feed API.
pub const INITIAL_PAGE: u32 = 1;
/// Default number of items requested per page.
pub const DEFAULT_PAGE_SIZE: u32 = 15;
/// How close to the end of the list a visible row must be to request more.
pub const LOAD_MORE_THRESHOLD: usize = 5;

/// Snapshot of the feed as seen by the UI.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FeedState {
    /// Items loaded so far, in display order.
    pub items: Vec<FeedItem>,
    /// Last requested page.
    pub page: u32,
    /// A request is outstanding.
    pub is_loading: bool,
    /// More pages may follow.
    pub has_more: bool,
    /// Message from the last failed request, cleared on the next one.
    pub error_message: Option<String>,
    generation: u64,
}

impl Default for FeedState {
    fn default() -> Self {
        Self {
            items: Vec::new(),
            page: INITIAL_PAGE,
            is_loading: false,
            has_more: true,
            error_message: None,
            generation: 0,
        }
    }
}

/// Drives page-by-page loading of the news feed.
///
/// State changes are published through a watch channel; call
/// [`FeedPager::subscribe`] to observe them.
pub struct FeedPager {
    feed: Arc<dyn NewsFeedPort>,
    page_size: u32,
    state: watch::Sender<FeedState>,
}

impl FeedPager {
    /// Creates a pager with the default page size.
    #[must_use]
    pub fn new(feed: Arc<dyn NewsFeedPort>) -> Self {
        Self::with_page_size(feed, DEFAULT_PAGE_SIZE)
    }

    /// Creates a pager requesting `page_size` items per page.
    #[must_use]
    pub fn with_page_size(feed: Arc<dyn NewsFeedPort>, page_size: u32) -> Self {
        Self {
            feed,
            page_size: page_size.max(1),
            state: watch::Sender::new(FeedState::default()),
        }
    }

    /// Items requested per page.
    #[must_use]
    pub const fn page_size(&self) -> u32 {
        self.page_size
    }

    /// Receiver that observes every state change.
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<FeedState> {
        self.state.subscribe()
    }

    /// Current state snapshot.
    #[must_use]
    pub fn state(&self) -> FeedState {
        self.state.borrow().clone()
    }

    /// Loads the first page (`reset`) or the next one.
    ///
    /// A non-reset call is a no-op while a request is outstanding or once
    /// the feed is exhausted. A reset supersedes any outstanding request;
    /// its late result is discarded.
    ///
    /// # Errors
    /// Returns the feed error after publishing its message in the state.
    pub async fn fetch_news(&self, reset: bool) -> Result<(), FeedError> {
        let mut request = None;
        self.state.send_if_modified(|state| {
            if reset {
                state.items.clear();
                state.page = INITIAL_PAGE;
                state.has_more = true;
                state.generation += 1;
            } else {
                if !state.has_more || state.is_loading {
                    return false;
                }
                state.page += 1;
            }
            state.is_loading = true;
            state.error_message = None;
            request = Some((state.page, state.generation));
            true
        });

        let Some((page, generation)) = request else {
            debug!("Skipping feed request, nothing more to load or already loading");
            return Ok(());
        };

        debug!(page, page_size = self.page_size, reset, "Requesting feed page");
        let result = self.feed.fetch_page(page, self.page_size).await;

        let page_size = self.page_size as usize;
        let mut outcome = Ok(());
        self.state.send_if_modified(|state| {
            if state.generation != generation {
                debug!(page, "Discarding superseded feed response");
                return false;
            }
            state.is_loading = false;
            match result {
                Ok(response) => {
                    let items: Vec<FeedItem> = response.news.iter().map(FeedItem::from).collect();
                    state.has_more = response.has_more.unwrap_or(items.len() == page_size);
                    info!(page, count = items.len(), has_more = state.has_more, "Loaded feed page");
                    if reset {
                        state.items = items;
                    } else {
                        state.items.extend(items);
                    }
                }
                Err(e) => {
                    warn!(page, error = %e, "Failed to load feed page");
                    state.error_message = Some(e.to_string());
                    if !reset {
                        state.page = state.page.saturating_sub(1).max(INITIAL_PAGE);
                    }
                    outcome = Err(e);
                }
            }
            true
        });
        outcome
    }

    /// Whether showing the row at `visible_index` should trigger the next page.
    #[must_use]
    pub fn should_load_more(&self, visible_index: usize) -> bool {
        let state = self.state.borrow();
        if !state.has_more || state.is_loading {
            return false;
        }
        visible_index >= state.items.len().saturating_sub(LOAD_MORE_THRESHOLD)
    }
}

impl std::fmt::Debug for FeedPager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FeedPager")
            .field("page_size", &self.page_size)
            .field("state", &*self.state.borrow())
            .finish_non_exhaustive()
    }
}
