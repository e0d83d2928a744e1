//! Thumbnail loading for feed cells.

use std::sync::Arc;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, trace};
use uuid::Uuid;

use crate::application::dto::FeedItem;
use crate::domain::entities::Image;
use crate::domain::ports::ImageLoaderPort;

/// Thumbnail resolved for a feed item.
///
/// `image` is `None` when the placeholder should stay: the item has no image
/// URL or the load failed.
#[derive(Debug, Clone)]
pub struct ThumbnailEvent {
    /// Item the thumbnail belongs to.
    pub item_id: Uuid,
    /// Decoded image, if any.
    pub image: Option<Image>,
}

/// Resolves thumbnails for displayed items and warms the cache for upcoming ones.
#[derive(Clone)]
pub struct ThumbnailService {
    loader: Arc<dyn ImageLoaderPort>,
    events: mpsc::UnboundedSender<ThumbnailEvent>,
}

impl ThumbnailService {
    /// Creates the service and the receiver for thumbnail events.
    #[must_use]
    pub fn new(loader: Arc<dyn ImageLoaderPort>) -> (Self, mpsc::UnboundedReceiver<ThumbnailEvent>) {
        let (events, rx) = mpsc::unbounded_channel();
        (Self { loader, events }, rx)
    }

    /// Resolves the thumbnail for an item about to be displayed.
    ///
    /// Cached images and items without an image URL are answered
    /// immediately. Otherwise the load runs on a spawned task whose handle is
    /// returned. A cancelled load sends no event.
    pub fn configure(&self, item: &FeedItem) -> Option<JoinHandle<()>> {
        let Some(key) = item.image_key() else {
            self.send(item.id, None);
            return None;
        };

        if let Some(image) = self.loader.cached_image(&key) {
            trace!(item = %item.id, key = %key, "Thumbnail served from cache");
            self.send(item.id, Some(image));
            return None;
        }

        let loader = Arc::clone(&self.loader);
        let events = self.events.clone();
        let item_id = item.id;
        Some(tokio::spawn(async move {
            let image = match loader.load(&key).await {
                Ok(image) => Some(image),
                Err(e) if e.is_cancelled() => {
                    trace!(item = %item_id, key = %key, "Thumbnail load cancelled");
                    return;
                }
                Err(e) => {
                    debug!(item = %item_id, key = %key, error = %e, "Thumbnail load failed");
                    None
                }
            };
            let _ = events.send(ThumbnailEvent { item_id, image });
        }))
    }

    /// Starts background loads for items likely to be displayed soon.
    ///
    /// Returns the number of loads started.
    pub fn prefetch<'a>(&self, items: impl IntoIterator<Item = &'a FeedItem>) -> usize {
        let mut started = 0;
        for key in items.into_iter().filter_map(FeedItem::image_key) {
            if self.loader.cached_image(&key).is_some() {
                continue;
            }
            let loader = Arc::clone(&self.loader);
            tokio::spawn(async move {
                if let Err(e) = loader.load(&key).await {
                    trace!(key = %key, error = %e, "Prefetch did not complete");
                }
            });
            started += 1;
        }
        if started > 0 {
            debug!(count = started, "Prefetching thumbnails");
        }
        started
    }

    /// Cancels loads for items that are no longer about to be displayed.
    pub fn cancel_prefetch<'a>(&self, items: impl IntoIterator<Item = &'a FeedItem>) {
        for key in items.into_iter().filter_map(FeedItem::image_key) {
            self.loader.cancel(&key);
        }
    }

    /// Cancels the load for an item that scrolled out of view.
    pub fn did_end_displaying(&self, item: &FeedItem) {
        if let Some(key) = item.image_key() {
            self.loader.cancel(&key);
        }
    }

    fn send(&self, item_id: Uuid, image: Option<Image>) {
        // receiver gone means nobody is displaying thumbnails anymore
        let _ = self.events.send(ThumbnailEvent { item_id, image });
    }
}

impl std::fmt::Debug for ThumbnailService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ThumbnailService").finish_non_exhaustive()
    }
}
