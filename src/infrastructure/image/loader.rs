//! Image cache and fetch coordinator.
//!
//! Lookups go Memory -> Disk -> stored HTTP responses, and only then to the
//! network. At most one network fetch per key is in flight; every caller
//! asking for that key awaits the same shared outcome.
//!
//! All mutable state (memory tier and in-flight table) lives behind one lock
//! that is never held across an await. File I/O and decoding happen outside
//! it, on the blocking pool when called from async code.

use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use futures_util::FutureExt;
use futures_util::future::{BoxFuture, Shared};
use parking_lot::Mutex;
use tokio::sync::Semaphore;
use tokio::task::AbortHandle;
use tracing::{debug, info, trace, warn};

use crate::domain::entities::{CacheTier, Image, ImageKey};
use crate::domain::errors::ImageError;
use crate::domain::ports::{
    CachePolicy, FetchRequest, FetchResponse, ImageLoaderPort, ImageResult, ImageTransport,
};

use super::disk_cache::{DiskImageCache, default_cache_root};
use super::http_cache::{DEFAULT_HTTP_CACHE_SIZE, HttpResponseCache};
use super::memory_cache::{CacheStats, DEFAULT_MEMORY_BUDGET, MemoryImageCache};
use super::transport::ReqwestImageTransport;

/// Directory under the cache root holding raw image files.
pub const IMAGES_DIR: &str = "Images";
/// Directory under the cache root holding stored HTTP responses.
pub const HTTP_CACHE_DIR: &str = "ImageURLCache";

/// Configuration for the image loader.
#[derive(Debug, Clone)]
pub struct ImageLoaderConfig {
    /// Memory tier budget in decoded bytes.
    pub memory_budget: usize,
    /// Disk capacity of the HTTP response tier in bytes.
    pub http_cache_size: u64,
    /// Maximum concurrent network downloads.
    pub max_concurrent_downloads: usize,
    /// Upper bound for the network phase of a fetch.
    pub fetch_timeout: Duration,
}

impl Default for ImageLoaderConfig {
    fn default() -> Self {
        Self {
            memory_budget: DEFAULT_MEMORY_BUDGET,
            http_cache_size: DEFAULT_HTTP_CACHE_SIZE,
            max_concurrent_downloads: 6,
            fetch_timeout: Duration::from_secs(60),
        }
    }
}

type SharedFetch = Shared<BoxFuture<'static, ImageResult<Image>>>;

struct InFlightFetch {
    id: u64,
    result: SharedFetch,
    abort: AbortHandle,
}

struct LoaderState {
    memory: MemoryImageCache,
    in_flight: HashMap<ImageKey, InFlightFetch>,
    next_fetch_id: u64,
}

struct LoaderInner {
    state: Mutex<LoaderState>,
    disk_cache: DiskImageCache,
    http_cache: HttpResponseCache,
    transport: Arc<dyn ImageTransport>,
    downloads: Semaphore,
    config: ImageLoaderConfig,
}

/// Orchestrates image loading from memory, disk, stored responses and network.
///
/// Cheap to clone; clones share caches and in-flight fetches.
#[derive(Clone)]
pub struct ImageLoader {
    inner: Arc<LoaderInner>,
}

impl std::fmt::Debug for ImageLoader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ImageLoader")
            .field("config", &self.inner.config)
            .finish_non_exhaustive()
    }
}

impl ImageLoader {
    /// Creates a loader over already opened cache tiers.
    #[must_use]
    pub fn new(
        config: ImageLoaderConfig,
        transport: Arc<dyn ImageTransport>,
        disk_cache: DiskImageCache,
        http_cache: HttpResponseCache,
    ) -> Self {
        let state = LoaderState {
            memory: MemoryImageCache::new(config.memory_budget),
            in_flight: HashMap::new(),
            next_fetch_id: 0,
        };

        Self {
            inner: Arc::new(LoaderInner {
                state: Mutex::new(state),
                disk_cache,
                http_cache,
                transport,
                downloads: Semaphore::new(config.max_concurrent_downloads.max(1)),
                config,
            }),
        }
    }

    /// Opens both persistent tiers under `cache_root`.
    ///
    /// # Errors
    /// Returns error if a cache directory cannot be created.
    pub fn open(
        config: ImageLoaderConfig,
        transport: Arc<dyn ImageTransport>,
        cache_root: &Path,
    ) -> ImageResult<Self> {
        let disk_cache = DiskImageCache::new(cache_root.join(IMAGES_DIR))?;
        let http_cache =
            HttpResponseCache::new(cache_root.join(HTTP_CACHE_DIR), config.http_cache_size)?;
        Ok(Self::new(config, transport, disk_cache, http_cache))
    }

    /// Creates a loader with default configuration, cache location and transport.
    ///
    /// # Errors
    /// Returns error if cache directories or the HTTP client cannot be created.
    pub fn with_defaults() -> ImageResult<Self> {
        let transport = Arc::new(ReqwestImageTransport::new()?);
        Self::open(ImageLoaderConfig::default(), transport, &default_cache_root())
    }

    /// Best-effort synchronous lookup across local tiers.
    ///
    /// Disk and stored-response hits are promoted into memory; a stored
    /// response hit is also written to disk. Performs file I/O but never
    /// touches the network.
    #[must_use]
    pub fn cached_image(&self, key: &ImageKey) -> Option<Image> {
        let in_memory = self.inner.state.lock().memory.get(key);
        if let Some(img) = in_memory {
            trace!(key = %key, tier = %CacheTier::Memory, "Cache hit");
            return Some(img);
        }
        self.inner.lookup_persisted(key)
    }

    /// Loads an image, checking caches first.
    ///
    /// Joins an in-flight fetch for the same key instead of starting another.
    ///
    /// # Errors
    /// Returns the shared fetch outcome: transport, status, timeout, decode
    /// or cancellation errors.
    pub async fn load(&self, key: &ImageKey) -> ImageResult<Image> {
        let in_memory = self.inner.state.lock().memory.get(key);
        if let Some(img) = in_memory {
            trace!(key = %key, tier = %CacheTier::Memory, "Cache hit");
            return Ok(img);
        }

        let inner = Arc::clone(&self.inner);
        let lookup_key = key.clone();
        match tokio::task::spawn_blocking(move || inner.lookup_persisted(&lookup_key)).await {
            Ok(Some(img)) => return Ok(img),
            Ok(None) => {}
            Err(e) => warn!(key = %key, error = %e, "Local cache lookup task failed"),
        }

        self.join_or_start(key).await
    }

    /// Returns the in-flight fetch for `key`, starting one if needed.
    fn join_or_start(&self, key: &ImageKey) -> SharedFetch {
        let mut state = self.inner.state.lock();

        if let Some(fetch) = state.in_flight.get(key) {
            debug!(key = %key, "Joining in-flight fetch");
            return fetch.result.clone();
        }

        // a fetch may have completed while the persistent tiers were checked
        if let Some(img) = state.memory.peek(key) {
            return futures_util::future::ready(Ok(img)).boxed().shared();
        }

        state.next_fetch_id += 1;
        let id = state.next_fetch_id;

        // the guard is built on first poll; a task dropped unpolled (runtime
        // shutdown) must not take the state lock while it is held here
        let task_inner = Arc::clone(&self.inner);
        let task_key = key.clone();
        let handle = tokio::spawn(async move {
            let guard = InFlightGuard {
                inner: task_inner,
                key: task_key,
                id,
            };
            Arc::clone(&guard.inner).fetch(guard.key.clone()).await
        });
        let abort = handle.abort_handle();

        let inner = Arc::clone(&self.inner);
        let result_key = key.clone();
        let result = async move {
            match handle.await {
                Ok(result) => result,
                Err(e) => {
                    inner.finish_fetch(&result_key, id);
                    if e.is_cancelled() {
                        Err(ImageError::Cancelled)
                    } else {
                        Err(ImageError::transport(format!("Fetch task failed: {e}")))
                    }
                }
            }
        }
        .boxed()
        .shared();

        state.in_flight.insert(
            key.clone(),
            InFlightFetch {
                id,
                result: result.clone(),
                abort,
            },
        );
        debug!(key = %key, fetch_id = id, "Started image fetch");

        result
    }

    /// Starts loading an image in the background, discarding the outcome.
    pub fn prefetch(&self, key: ImageKey) {
        let loader = self.clone();
        tokio::spawn(async move {
            if let Err(e) = loader.load(&key).await {
                debug!(key = %key, error = %e, "Prefetch failed");
            }
        });
    }

    /// Cancels the in-flight fetch for `key`.
    ///
    /// Every caller awaiting it resolves with [`ImageError::Cancelled`]. No-op
    /// when nothing is in flight.
    pub fn cancel(&self, key: &ImageKey) {
        let fetch = self.inner.state.lock().in_flight.remove(key);
        if let Some(fetch) = fetch {
            fetch.abort.abort();
            debug!(key = %key, fetch_id = fetch.id, "Cancelled image fetch");
        }
    }

    /// Cancels every in-flight fetch.
    pub fn cancel_all(&self) {
        let fetches: Vec<_> = self.inner.state.lock().in_flight.drain().collect();
        let count = fetches.len();
        for (_, fetch) in fetches {
            fetch.abort.abort();
        }
        if count > 0 {
            debug!(count = count, "Cancelled all in-flight image fetches");
        }
    }

    /// Returns true if a fetch for `key` is in flight.
    #[must_use]
    pub fn is_loading(&self, key: &ImageKey) -> bool {
        self.inner.state.lock().in_flight.contains_key(key)
    }

    /// Returns the number of in-flight fetches.
    #[must_use]
    pub fn pending_count(&self) -> usize {
        self.inner.state.lock().in_flight.len()
    }

    /// Returns memory tier statistics.
    #[must_use]
    pub fn memory_stats(&self) -> CacheStats {
        self.inner.state.lock().memory.stats()
    }

    /// Clears all cache tiers. In-flight fetches are left running.
    pub fn clear_all(&self) {
        self.inner.state.lock().memory.clear();
        if let Err(e) = self.inner.disk_cache.clear() {
            warn!(error = %e, "Failed to clear disk cache");
        }
        if let Err(e) = self.inner.http_cache.clear() {
            warn!(error = %e, "Failed to clear HTTP cache");
        }
        info!("Cleared all image caches");
    }
}

impl LoaderInner {
    /// Drops the in-flight entry for `key` if it still belongs to fetch `id`.
    fn finish_fetch(&self, key: &ImageKey, id: u64) {
        let mut state = self.state.lock();
        if state
            .in_flight
            .get(key)
            .is_some_and(|fetch| fetch.id == id)
        {
            state.in_flight.remove(key);
            trace!(key = %key, fetch_id = id, "Fetch finished");
        }
    }

    /// Disk, then stored-response lookup with promotion.
    fn lookup_persisted(&self, key: &ImageKey) -> Option<Image> {
        if let Some(decoded) = self.disk_cache.get(key) {
            return Some(self.promote(key, Arc::new(decoded), CacheTier::Disk));
        }

        let request = FetchRequest {
            key: key.clone(),
            cache_policy: CachePolicy::ReturnCacheDontLoad,
            timeout: self.config.fetch_timeout,
        };
        let cached = self.http_cache.cached_response(&request)?;

        let decoded = match image::load_from_memory(&cached.body) {
            Ok(img) => img,
            Err(e) => {
                debug!(key = %key, error = %e, "Stored response is not an image");
                return None;
            }
        };
        let img = self.promote(key, Arc::new(decoded), CacheTier::Http);

        if let Err(e) = self.disk_cache.put_bytes(key, &cached.body) {
            warn!(key = %key, error = %e, "Failed to cache to disk");
        }
        Some(img)
    }

    fn promote(&self, key: &ImageKey, img: Image, tier: CacheTier) -> Image {
        self.state.lock().memory.put(key.clone(), img.clone());
        trace!(key = %key, tier = %tier, "Promoted image into memory cache");
        img
    }

    /// Network fetch, decode, and population of every tier.
    async fn fetch(self: Arc<Self>, key: ImageKey) -> ImageResult<Image> {
        let _permit = self
            .downloads
            .acquire()
            .await
            .map_err(|_| ImageError::Cancelled)?;

        let timeout = self.config.fetch_timeout;
        debug!(key = %key, "Downloading image from network");

        let request = FetchRequest::reload(key.clone(), timeout);
        let response = tokio::time::timeout(timeout, self.transport.fetch(request))
            .await
            .map_err(|_| ImageError::Timeout { timeout })??;

        if !response.is_success() {
            debug!(key = %key, status = response.status, "Image request unsuccessful");
            return Err(ImageError::Status {
                status: response.status,
            });
        }

        let body = response.body.clone();
        let decoded = tokio::task::spawn_blocking(move || image::load_from_memory(&body))
            .await
            .map_err(|e| ImageError::decode(format!("Decode task failed: {e}")))?
            .map_err(|e| {
                debug!(key = %key, error = %e, "Downloaded bytes are not an image");
                ImageError::decode(e.to_string())
            })?;
        let img = Arc::new(decoded);

        let inner = Arc::clone(&self);
        let persist_key = key.clone();
        let persist_img = img.clone();
        let persisted = tokio::task::spawn_blocking(move || {
            inner.populate(&persist_key, &response, persist_img);
        })
        .await;
        if let Err(e) = persisted {
            warn!(key = %key, error = %e, "Cache population task failed");
            self.state.lock().memory.put(key.clone(), img.clone());
        }

        debug!(key = %key, source = "network", "Image loaded successfully");
        Ok(img)
    }

    /// Stores a successful response in the HTTP tier, memory and disk.
    /// Storage failures are logged and otherwise ignored.
    fn populate(&self, key: &ImageKey, response: &FetchResponse, img: Image) {
        if let Err(e) = self.http_cache.store(key, response) {
            warn!(key = %key, error = %e, "Failed to store HTTP response");
        }
        self.state.lock().memory.put(key.clone(), img);
        if let Err(e) = self.disk_cache.put_bytes(key, &response.body) {
            warn!(key = %key, error = %e, "Failed to cache to disk");
        }
    }
}

/// Removes a fetch from the in-flight table when its task ends, however it
/// ends. Only removes the entry it registered.
struct InFlightGuard {
    inner: Arc<LoaderInner>,
    key: ImageKey,
    id: u64,
}

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        self.inner.finish_fetch(&self.key, self.id);
    }
}

#[async_trait::async_trait]
impl ImageLoaderPort for ImageLoader {
    fn cached_image(&self, key: &ImageKey) -> Option<Image> {
        Self::cached_image(self, key)
    }

    async fn load(&self, key: &ImageKey) -> ImageResult<Image> {
        Self::load(self, key).await
    }

    fn cancel(&self, key: &ImageKey) {
        Self::cancel(self, key);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tempfile::TempDir;
    use tokio_test::{assert_err, assert_ok};

    /// Transport that counts calls and can hold responses until released.
    struct StubTransport {
        calls: AtomicUsize,
        response: Mutex<ImageResult<FetchResponse>>,
        gate: Option<Arc<Semaphore>>,
    }

    impl StubTransport {
        fn ok(body: Vec<u8>) -> Self {
            Self {
                calls: AtomicUsize::new(0),
                response: Mutex::new(Ok(FetchResponse::ok(body))),
                gate: None,
            }
        }

        fn failing(error: ImageError) -> Self {
            Self {
                calls: AtomicUsize::new(0),
                response: Mutex::new(Err(error)),
                gate: None,
            }
        }

        fn gated(mut self, gate: &Arc<Semaphore>) -> Self {
            self.gate = Some(Arc::clone(gate));
            self
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait::async_trait]
    impl ImageTransport for StubTransport {
        async fn fetch(&self, request: FetchRequest) -> ImageResult<FetchResponse> {
            assert_eq!(request.cache_policy, CachePolicy::ReloadIgnoringCache);
            self.calls.fetch_add(1, Ordering::SeqCst);
            if let Some(gate) = &self.gate {
                gate.acquire()
                    .await
                    .map_err(|_| ImageError::transport("gate closed"))?
                    .forget();
            }
            self.response.lock().clone()
        }
    }

    fn png_bytes() -> Vec<u8> {
        let mut buf = Vec::new();
        image::DynamicImage::new_rgb8(8, 6)
            .write_to(&mut std::io::Cursor::new(&mut buf), image::ImageFormat::Png)
            .unwrap();
        buf
    }

    fn key(name: &str) -> ImageKey {
        ImageKey::parse(&format!("https://example.com/news/{name}.png")).unwrap()
    }

    fn loader_with(transport: &Arc<StubTransport>, root: &TempDir) -> ImageLoader {
        let transport: Arc<dyn ImageTransport> = transport.clone();
        ImageLoader::open(ImageLoaderConfig::default(), transport, root.path()).unwrap()
    }

    async fn wait_until(mut condition: impl FnMut() -> bool) {
        for _ in 0..400 {
            if condition() {
                return;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        panic!("condition not reached in time");
    }

    #[tokio::test]
    async fn test_load_fetches_and_populates_every_tier() {
        let root = TempDir::new().unwrap();
        let transport = Arc::new(StubTransport::ok(png_bytes()));
        let loader = loader_with(&transport, &root);

        let img = assert_ok!(loader.load(&key("a")).await);
        assert_eq!((img.width(), img.height()), (8, 6));
        assert_eq!(transport.calls(), 1);
        assert_eq!(loader.pending_count(), 0);

        assert!(loader.inner.state.lock().memory.contains(&key("a")));
        assert!(loader.inner.disk_cache.contains(&key("a")));
        assert!(loader.inner.http_cache.get(&key("a")).is_some());

        // served from memory without another request
        let again = assert_ok!(loader.load(&key("a")).await);
        assert!(Arc::ptr_eq(&img, &again));
        assert_eq!(transport.calls(), 1);
    }

    #[tokio::test]
    async fn test_failed_disk_write_does_not_fail_load() {
        let root = TempDir::new().unwrap();
        let transport = Arc::new(StubTransport::ok(png_bytes()));
        let loader = loader_with(&transport, &root);
        std::fs::remove_dir_all(root.path().join(IMAGES_DIR)).unwrap();

        let img = assert_ok!(loader.load(&key("a")).await);
        assert!(!loader.inner.disk_cache.contains(&key("a")));

        let cached = loader.cached_image(&key("a")).unwrap();
        assert!(Arc::ptr_eq(&img, &cached));
        assert_eq!(transport.calls(), 1);
        assert_eq!(loader.pending_count(), 0);
    }

    #[test]
    fn test_load_during_runtime_shutdown_returns() {
        let root = TempDir::new().unwrap();
        let transport = Arc::new(StubTransport::ok(png_bytes()));
        let loader = loader_with(&transport, &root);

        let rt = tokio::runtime::Builder::new_multi_thread()
            .worker_threads(1)
            .enable_all()
            .build()
            .unwrap();
        let handle = rt.handle().clone();
        rt.shutdown_background();

        let (tx, rx) = std::sync::mpsc::channel();
        let shutdown_loader = loader.clone();
        std::thread::spawn(move || {
            let _entered = handle.enter();
            let outcome = shutdown_loader.load(&key("a")).now_or_never();
            let _ = tx.send(outcome);
        });

        let outcome = rx
            .recv_timeout(Duration::from_secs(3))
            .expect("load must return while the runtime shuts down");
        if let Some(result) = outcome {
            assert!(result.unwrap_err().is_cancelled());
            assert_eq!(loader.pending_count(), 0);
        }
        assert_eq!(transport.calls(), 0);
    }

    #[tokio::test]
    async fn test_concurrent_loads_share_one_fetch() {
        let root = TempDir::new().unwrap();
        let gate = Arc::new(Semaphore::new(0));
        let transport = Arc::new(StubTransport::ok(png_bytes()).gated(&gate));
        let loader = loader_with(&transport, &root);

        let first = tokio::spawn({
            let loader = loader.clone();
            async move { loader.load(&key("a")).await }
        });
        wait_until(|| transport.calls() == 1 && loader.is_loading(&key("a"))).await;

        let second = tokio::spawn({
            let loader = loader.clone();
            async move { loader.load(&key("a")).await }
        });
        tokio::time::sleep(Duration::from_millis(50)).await;
        gate.add_permits(1);

        let first = assert_ok!(first.await.unwrap());
        let second = assert_ok!(second.await.unwrap());
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(transport.calls(), 1);
        assert_eq!(loader.pending_count(), 0);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_many_concurrent_loads_invoke_transport_once() {
        let root = TempDir::new().unwrap();
        let gate = Arc::new(Semaphore::new(0));
        let transport = Arc::new(StubTransport::ok(png_bytes()).gated(&gate));
        let loader = loader_with(&transport, &root);

        let handles: Vec<_> = (0..16)
            .map(|_| {
                let loader = loader.clone();
                tokio::spawn(async move { loader.load(&key("a")).await })
            })
            .collect();

        wait_until(|| transport.calls() >= 1).await;
        tokio::time::sleep(Duration::from_millis(50)).await;
        gate.add_permits(16);

        for handle in handles {
            let img = assert_ok!(handle.await.unwrap());
            assert_eq!((img.width(), img.height()), (8, 6));
        }
        assert_eq!(transport.calls(), 1);
    }

    #[tokio::test]
    async fn test_failure_reaches_every_awaiter_and_is_not_cached() {
        let root = TempDir::new().unwrap();
        let gate = Arc::new(Semaphore::new(0));
        let transport =
            Arc::new(StubTransport::failing(ImageError::transport("reset")).gated(&gate));
        let loader = loader_with(&transport, &root);

        let first = tokio::spawn({
            let loader = loader.clone();
            async move { loader.load(&key("a")).await }
        });
        wait_until(|| loader.is_loading(&key("a"))).await;
        let second = tokio::spawn({
            let loader = loader.clone();
            async move { loader.load(&key("a")).await }
        });
        tokio::time::sleep(Duration::from_millis(50)).await;
        gate.add_permits(1);

        let expected = ImageError::transport("reset");
        assert_eq!(first.await.unwrap().unwrap_err(), expected);
        assert_eq!(second.await.unwrap().unwrap_err(), expected);
        assert_eq!(transport.calls(), 1);
        assert_eq!(loader.pending_count(), 0);

        // nothing is remembered; the next load goes back to the network
        gate.add_permits(1);
        assert_err!(loader.load(&key("a")).await);
        assert_eq!(transport.calls(), 2);
    }

    #[tokio::test]
    async fn test_decode_failure_poisons_no_tier() {
        let root = TempDir::new().unwrap();
        let transport = Arc::new(StubTransport::ok(b"<html>not an image</html>".to_vec()));
        let loader = loader_with(&transport, &root);

        let err = assert_err!(loader.load(&key("b")).await);
        assert!(matches!(err, ImageError::Decode { .. }));

        assert!(loader.cached_image(&key("b")).is_none());
        assert!(!loader.inner.disk_cache.contains(&key("b")));
        assert!(loader.inner.http_cache.get(&key("b")).is_none());
        assert_eq!(loader.pending_count(), 0);
    }

    #[tokio::test]
    async fn test_unsuccessful_status_is_error() {
        let root = TempDir::new().unwrap();
        let mut response = FetchResponse::ok(png_bytes());
        response.status = 404;
        let transport = Arc::new(StubTransport {
            calls: AtomicUsize::new(0),
            response: Mutex::new(Ok(response)),
            gate: None,
        });
        let loader = loader_with(&transport, &root);

        let err = assert_err!(loader.load(&key("gone")).await);
        assert_eq!(err, ImageError::Status { status: 404 });
        assert!(loader.cached_image(&key("gone")).is_none());
    }

    #[tokio::test]
    async fn test_cancel_unblocks_all_awaiters() {
        let root = TempDir::new().unwrap();
        let gate = Arc::new(Semaphore::new(0));
        let transport = Arc::new(StubTransport::ok(png_bytes()).gated(&gate));
        let loader = loader_with(&transport, &root);

        let first = tokio::spawn({
            let loader = loader.clone();
            async move { loader.load(&key("a")).await }
        });
        wait_until(|| transport.calls() == 1).await;
        let second = tokio::spawn({
            let loader = loader.clone();
            async move { loader.load(&key("a")).await }
        });
        tokio::time::sleep(Duration::from_millis(50)).await;

        loader.cancel(&key("a"));
        assert!(!loader.is_loading(&key("a")));

        let outcomes = tokio::time::timeout(Duration::from_secs(2), async {
            (first.await.unwrap(), second.await.unwrap())
        })
        .await
        .expect("awaiters must not hang after cancel");

        assert_eq!(outcomes.0.unwrap_err(), ImageError::Cancelled);
        assert_eq!(outcomes.1.unwrap_err(), ImageError::Cancelled);
        assert!(loader.cached_image(&key("a")).is_none());
    }

    #[tokio::test]
    async fn test_load_after_cancel_starts_fresh_fetch() {
        let root = TempDir::new().unwrap();
        let gate = Arc::new(Semaphore::new(0));
        let transport = Arc::new(StubTransport::ok(png_bytes()).gated(&gate));
        let loader = loader_with(&transport, &root);

        let cancelled = tokio::spawn({
            let loader = loader.clone();
            async move { loader.load(&key("a")).await }
        });
        wait_until(|| transport.calls() == 1).await;
        loader.cancel(&key("a"));
        assert!(cancelled.await.unwrap().unwrap_err().is_cancelled());

        gate.add_permits(1);
        assert_ok!(loader.load(&key("a")).await);
        assert_eq!(transport.calls(), 2);
        assert_eq!(loader.pending_count(), 0);
    }

    #[tokio::test]
    async fn test_cancel_without_fetch_is_noop() {
        let root = TempDir::new().unwrap();
        let transport = Arc::new(StubTransport::ok(png_bytes()));
        let loader = loader_with(&transport, &root);

        loader.cancel(&key("nothing"));
        loader.cancel(&key("nothing"));
        loader.cancel_all();
        assert_eq!(loader.pending_count(), 0);
    }

    #[tokio::test]
    async fn test_cancel_after_completion_keeps_result() {
        let root = TempDir::new().unwrap();
        let transport = Arc::new(StubTransport::ok(png_bytes()));
        let loader = loader_with(&transport, &root);

        assert_ok!(loader.load(&key("c")).await);
        loader.cancel(&key("c"));

        assert!(loader.cached_image(&key("c")).is_some());
    }

    #[tokio::test]
    async fn test_cancel_all() {
        let root = TempDir::new().unwrap();
        let gate = Arc::new(Semaphore::new(0));
        let transport = Arc::new(StubTransport::ok(png_bytes()).gated(&gate));
        let loader = loader_with(&transport, &root);

        let handles: Vec<_> = ["x", "y"]
            .into_iter()
            .map(|name| {
                let loader = loader.clone();
                tokio::spawn(async move { loader.load(&key(name)).await })
            })
            .collect();
        wait_until(|| transport.calls() == 2).await;

        loader.cancel_all();
        assert_eq!(loader.pending_count(), 0);
        for handle in handles {
            assert!(handle.await.unwrap().unwrap_err().is_cancelled());
        }
    }

    #[test]
    fn test_disk_hit_is_promoted_to_memory() {
        let root = TempDir::new().unwrap();
        let disk = DiskImageCache::new(root.path().join(IMAGES_DIR)).unwrap();
        disk.put_bytes(&key("d"), &png_bytes()).unwrap();

        let transport = Arc::new(StubTransport::ok(Vec::new()));
        let loader = loader_with(&transport, &root);

        let first = loader.cached_image(&key("d")).unwrap();
        disk.evict(&key("d"));

        // served from memory now that the file is gone
        let second = loader.cached_image(&key("d")).unwrap();
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(loader.memory_stats().hits, 1);
        assert_eq!(transport.calls(), 0);
    }

    #[test]
    fn test_http_tier_hit_is_promoted_and_persisted() {
        let root = TempDir::new().unwrap();
        let http =
            HttpResponseCache::new(root.path().join(HTTP_CACHE_DIR), 1024 * 1024).unwrap();
        http.store(&key("h"), &FetchResponse::ok(png_bytes())).unwrap();

        let transport = Arc::new(StubTransport::ok(Vec::new()));
        let loader = loader_with(&transport, &root);

        let img = loader.cached_image(&key("h")).unwrap();
        assert_eq!(img.width(), 8);
        assert!(loader.inner.disk_cache.contains(&key("h")));
        assert!(loader.inner.state.lock().memory.contains(&key("h")));
    }

    #[test]
    fn test_undecodable_disk_entry_falls_through() {
        let root = TempDir::new().unwrap();
        let disk = DiskImageCache::new(root.path().join(IMAGES_DIR)).unwrap();
        disk.put_bytes(&key("z"), b"garbage").unwrap();

        let transport = Arc::new(StubTransport::ok(Vec::new()));
        let loader = loader_with(&transport, &root);

        assert!(loader.cached_image(&key("z")).is_none());
    }

    #[tokio::test]
    async fn test_load_served_from_disk_without_network() {
        let root = TempDir::new().unwrap();
        let disk = DiskImageCache::new(root.path().join(IMAGES_DIR)).unwrap();
        disk.put_bytes(&key("d"), &png_bytes()).unwrap();

        let transport = Arc::new(StubTransport::ok(Vec::new()));
        let loader = loader_with(&transport, &root);

        assert_ok!(loader.load(&key("d")).await);
        assert_eq!(transport.calls(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_network_phase_times_out() {
        let root = TempDir::new().unwrap();
        let gate = Arc::new(Semaphore::new(0));
        let transport = Arc::new(StubTransport::ok(png_bytes()).gated(&gate));
        let loader = loader_with(&transport, &root);

        let err = assert_err!(loader.load(&key("slow")).await);
        assert_eq!(
            err,
            ImageError::Timeout {
                timeout: Duration::from_secs(60)
            }
        );
        assert_eq!(loader.pending_count(), 0);
    }

    #[tokio::test]
    async fn test_clear_all() {
        let root = TempDir::new().unwrap();
        let transport = Arc::new(StubTransport::ok(png_bytes()));
        let loader = loader_with(&transport, &root);

        assert_ok!(loader.load(&key("a")).await);
        loader.clear_all();

        assert!(loader.cached_image(&key("a")).is_none());
        assert_eq!(loader.memory_stats().size, 0);
    }

    #[tokio::test]
    async fn test_prefetch_warms_cache() {
        let root = TempDir::new().unwrap();
        let transport = Arc::new(StubTransport::ok(png_bytes()));
        let loader = loader_with(&transport, &root);

        loader.prefetch(key("p"));
        wait_until(|| loader.inner.state.lock().memory.contains(&key("p"))).await;

        assert!(loader.cached_image(&key("p")).is_some());
        assert_eq!(transport.calls(), 1);
    }
}
