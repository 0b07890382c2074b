//! Isochrone cache manager.
//!
//! Misses are resolved by spawned tokio tasks that hold a semaphore permit
//! while calling the provider and insert their result into the cache
//! themselves, so a fetch completes (and is kept) even if every caller
//! waiting for it has been dropped. Concurrent requests for the same key
//! share a single in-flight fetch.

use std::collections::{BTreeMap, BTreeSet};
use std::path::PathBuf;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use fusion_map_isochrone_models::{IsochroneKey, IsochronePolygon, IsochroneRequest, Provenance};
use fusion_map_spatial::normalize::{multipolygon_from_geojson, normalize_and_validate};
use futures::FutureExt;
use futures::future::{BoxFuture, Shared};
use tokio::sync::Semaphore;

use crate::store::{CacheLoadError, CachePersistError, JsonFileStore, LoadReport};
use crate::{IsochroneUnavailable, ProviderError, RoutingProvider};

/// Default cache file name.
pub const DEFAULT_CACHE_FILE: &str = "isochrone_cache.json";

/// Default bound on concurrent provider calls.
pub const DEFAULT_MAX_CONCURRENT_REQUESTS: usize = 4;

/// Runtime settings of the cache.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheConfig {
    /// Snapshot file.
    pub path: PathBuf,
    /// Maximum number of outstanding provider calls.
    pub max_concurrent_requests: usize,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from(DEFAULT_CACHE_FILE),
            max_concurrent_requests: DEFAULT_MAX_CONCURRENT_REQUESTS,
        }
    }
}

/// Outcome of [`IsochroneCache::persist`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PersistSummary {
    /// Entries in the written snapshot (0 when nothing was written).
    pub entries: usize,
    /// Entries added since the previous snapshot.
    pub new_entries: usize,
    /// `false` when nothing was dirty and the file was left untouched.
    pub written: bool,
}

type FetchResult = Result<IsochronePolygon, IsochroneUnavailable>;
type SharedFetch = Shared<BoxFuture<'static, FetchResult>>;

#[derive(Default)]
struct CacheState {
    entries: BTreeMap<IsochroneKey, IsochronePolygon>,
    dirty: BTreeSet<IsochroneKey>,
    inflight: BTreeMap<IsochroneKey, SharedFetch>,
}

struct Inner {
    state: Mutex<CacheState>,
    store: Mutex<JsonFileStore>,
    provider: Arc<dyn RoutingProvider>,
    permits: Arc<Semaphore>,
}

impl Inner {
    fn lock_state(&self) -> MutexGuard<'_, CacheState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Read-through isochrone cache. Cloning is cheap and clones share state.
#[derive(Clone)]
pub struct IsochroneCache {
    inner: Arc<Inner>,
}

impl std::fmt::Debug for IsochroneCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.inner.lock_state();
        f.debug_struct("IsochroneCache")
            .field("provider", &self.inner.provider.id())
            .field("entries", &state.entries.len())
            .field("dirty", &state.dirty.len())
            .field("inflight", &state.inflight.len())
            .finish()
    }
}

impl IsochroneCache {
    /// Creates an empty cache. Nothing is read from `store`.
    #[must_use]
    pub fn new(
        store: JsonFileStore,
        provider: Arc<dyn RoutingProvider>,
        max_concurrent_requests: usize,
    ) -> Self {
        Self {
            inner: Arc::new(Inner {
                state: Mutex::new(CacheState::default()),
                store: Mutex::new(store),
                provider,
                permits: Arc::new(Semaphore::new(max_concurrent_requests.max(1))),
            }),
        }
    }

    /// Loads the cache from `store`.
    ///
    /// A missing file yields an empty cache. Invalid entries are dropped
    /// and listed in the [`LoadReport`]. Entries imported from the legacy
    /// format are marked dirty so the next [`Self::persist`] rewrites them.
    ///
    /// # Errors
    ///
    /// Returns [`CacheLoadError`] if the file exists but cannot be read or
    /// parsed.
    pub fn load(
        store: JsonFileStore,
        provider: Arc<dyn RoutingProvider>,
        config: &CacheConfig,
    ) -> Result<(Self, LoadReport), CacheLoadError> {
        let loaded = store.load()?;
        let cache = Self::new(store, provider, config.max_concurrent_requests);

        {
            let mut state = cache.inner.lock_state();
            state.entries = loaded.entries;
            state.dirty = loaded.legacy_keys.into_iter().collect();
        }

        Ok((cache, loaded.report))
    }

    /// Loads the cache from `config.path`.
    ///
    /// # Errors
    ///
    /// See [`Self::load`].
    pub fn open(
        config: &CacheConfig,
        provider: Arc<dyn RoutingProvider>,
    ) -> Result<(Self, LoadReport), CacheLoadError> {
        Self::load(JsonFileStore::new(&config.path), provider, config)
    }

    /// Returns the isochrone for `key`, fetching it on a miss.
    ///
    /// # Errors
    ///
    /// Returns [`IsochroneUnavailable`] if the provider fails or returns
    /// an invalid polygon. Nothing is cached in that case.
    pub async fn get(&self, key: IsochroneKey) -> Result<IsochronePolygon, IsochroneUnavailable> {
        let fetch = {
            let mut state = self.inner.lock_state();
            if let Some(hit) = state.entries.get(&key) {
                log::debug!("Isochrone cache hit: {key}");
                return Ok(hit.clone());
            }
            if let Some(pending) = state.inflight.get(&key) {
                log::debug!("Isochrone fetch already in flight: {key}");
                pending.clone()
            } else {
                log::debug!("Isochrone cache miss: {key}");
                let pending = spawn_fetch(Arc::clone(&self.inner), key);
                state.inflight.insert(key, pending.clone());
                pending
            }
        };

        fetch.await
    }

    /// Resolves many keys at once.
    ///
    /// Duplicate keys are collapsed. Hits are served from memory; misses
    /// are fetched with at most `max_concurrent_requests` provider calls
    /// outstanding. Each key gets its own result, so one failure never
    /// affects the others.
    pub async fn get_batch(
        &self,
        keys: &[IsochroneKey],
    ) -> BTreeMap<IsochroneKey, Result<IsochronePolygon, IsochroneUnavailable>> {
        let unique: BTreeSet<IsochroneKey> = keys.iter().copied().collect();

        let results = futures::future::join_all(
            unique
                .into_iter()
                .map(|key| async move { (key, self.get(key).await) }),
        )
        .await;

        let failures = results.iter().filter(|(_, r)| r.is_err()).count();
        log::info!(
            "Resolved {} isochrones ({} unavailable)",
            results.len(),
            failures
        );

        results.into_iter().collect()
    }

    /// Returns a cached isochrone without ever fetching.
    #[must_use]
    pub fn peek(&self, key: &IsochroneKey) -> Option<IsochronePolygon> {
        self.inner.lock_state().entries.get(key).cloned()
    }

    /// Returns `true` if `key` is cached.
    #[must_use]
    pub fn contains(&self, key: &IsochroneKey) -> bool {
        self.inner.lock_state().entries.contains_key(key)
    }

    /// Number of cached isochrones.
    #[must_use]
    pub fn len(&self) -> usize {
        self.inner.lock_state().entries.len()
    }

    /// Returns `true` if nothing is cached.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.inner.lock_state().entries.is_empty()
    }

    /// Cached keys in ascending order.
    #[must_use]
    pub fn keys(&self) -> Vec<IsochroneKey> {
        self.inner.lock_state().entries.keys().copied().collect()
    }

    /// Number of entries not yet persisted.
    #[must_use]
    pub fn dirty_count(&self) -> usize {
        self.inner.lock_state().dirty.len()
    }

    /// Writes a full snapshot of the cache.
    ///
    /// Only one persist runs at a time. Does nothing when no entry
    /// changed since the last successful persist. Entries added while the
    /// snapshot is written stay dirty.
    ///
    /// # Errors
    ///
    /// Returns [`CachePersistError`] if the snapshot cannot be written.
    /// In-memory entries and dirty marks are left intact.
    pub fn persist(&self) -> Result<PersistSummary, CachePersistError> {
        let store = self
            .inner
            .store
            .lock()
            .unwrap_or_else(PoisonError::into_inner);

        let (snapshot, dirty) = {
            let state = self.inner.lock_state();
            if state.dirty.is_empty() {
                log::debug!("Isochrone cache is clean, nothing to persist");
                return Ok(PersistSummary {
                    entries: 0,
                    new_entries: 0,
                    written: false,
                });
            }
            (state.entries.clone(), state.dirty.clone())
        };

        store.save(&snapshot)?;

        let mut state = self.inner.lock_state();
        for key in &dirty {
            state.dirty.remove(key);
        }

        Ok(PersistSummary {
            entries: snapshot.len(),
            new_entries: dirty.len(),
            written: true,
        })
    }
}

/// Spawns the fetch of one key and returns a shareable handle on it.
fn spawn_fetch(inner: Arc<Inner>, key: IsochroneKey) -> SharedFetch {
    let handle = tokio::spawn(fetch_and_insert(inner, key));

    async move {
        handle.await.unwrap_or_else(|e| {
            Err(IsochroneUnavailable {
                key,
                cause: ProviderError::Task {
                    message: e.to_string(),
                },
            })
        })
    }
    .boxed()
    .shared()
}

/// Clears the in-flight entry of a fetch task that panicked or was
/// cancelled before reaching its normal cleanup.
struct InflightGuard {
    inner: Arc<Inner>,
    key: IsochroneKey,
    armed: bool,
}

impl Drop for InflightGuard {
    fn drop(&mut self) {
        if self.armed {
            log::warn!("Isochrone fetch {} aborted", self.key);
            self.inner.lock_state().inflight.remove(&self.key);
        }
    }
}

async fn fetch_and_insert(inner: Arc<Inner>, key: IsochroneKey) -> FetchResult {
    let mut guard = InflightGuard {
        inner: Arc::clone(&inner),
        key,
        armed: true,
    };
    let result = fetch(&inner, key).await;

    let mut state = inner.lock_state();
    state.inflight.remove(&key);
    guard.armed = false;
    match &result {
        Ok(polygon) => {
            state.entries.insert(key, polygon.clone());
            state.dirty.insert(key);
        }
        Err(e) => log::warn!("{e}"),
    }
    drop(state);

    result
}

async fn fetch(inner: &Inner, key: IsochroneKey) -> FetchResult {
    let unavailable = |cause: ProviderError| IsochroneUnavailable { key, cause };

    let _permit = Arc::clone(&inner.permits)
        .acquire_owned()
        .await
        .map_err(|e| {
            unavailable(ProviderError::Task {
                message: e.to_string(),
            })
        })?;

    let request = IsochroneRequest::from(&key);
    let body = inner
        .provider
        .isochrone(&request)
        .await
        .map_err(unavailable)?;

    let geometry = multipolygon_from_geojson(&body)
        .and_then(|g| normalize_and_validate(&g))
        .map_err(|e| unavailable(ProviderError::InvalidGeometry(e)))?;

    log::debug!("Fetched isochrone {key} from {}", inner.provider.id());

    Ok(IsochronePolygon {
        key,
        geometry,
        provenance: Provenance::now(inner.provider.id()),
    })
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use fusion_map_isochrone_models::TravelMode;

    use super::*;
    use crate::test_support::{MockProvider, temp_path};

    fn key(lat: f64, minutes: u16) -> IsochroneKey {
        IsochroneKey::new(lat, 2.35, TravelMode::Car, minutes).unwrap()
    }

    fn cache_with(provider: Arc<MockProvider>, name: &str, max: usize) -> IsochroneCache {
        IsochroneCache::new(JsonFileStore::new(temp_path(name)), provider, max)
    }

    #[tokio::test]
    async fn second_get_is_a_hit() {
        let provider = Arc::new(MockProvider::default());
        let cache = cache_with(Arc::clone(&provider), "cache_hit", 4);
        let k = key(48.85, 15);

        let first = cache.get(k).await.unwrap();
        let second = cache.get(k).await.unwrap();

        assert_eq!(first, second);
        assert_eq!(provider.call_count(), 1);
        assert_eq!(cache.dirty_count(), 1);
        assert_eq!(first.provenance.provider, "mock");
    }

    #[tokio::test]
    async fn provider_receives_rounded_origin() {
        let provider = Arc::new(MockProvider::default());
        let cache = cache_with(Arc::clone(&provider), "cache_rounded", 4);
        let k = IsochroneKey::new(48.856_614, 2.352_222, TravelMode::Walk, 10).unwrap();

        cache.get(k).await.unwrap();

        let requests = provider.requests.lock().unwrap();
        assert_eq!(requests.len(), 1);
        assert!((requests[0].lat - 48.856_61).abs() < 1e-9);
        assert!((requests[0].lon - 2.352_22).abs() < 1e-9);
        assert_eq!(requests[0].seconds, 600);
    }

    #[tokio::test]
    async fn concurrent_misses_share_one_fetch() {
        let provider = Arc::new(MockProvider::slow(Duration::from_millis(30)));
        let cache = cache_with(Arc::clone(&provider), "cache_shared", 4);
        let k = key(48.85, 30);

        let (a, b) = tokio::join!(cache.get(k), cache.get(k));

        assert_eq!(a.unwrap(), b.unwrap());
        assert_eq!(provider.call_count(), 1);
    }

    #[tokio::test]
    async fn batch_isolates_failures() {
        let provider = Arc::new(MockProvider::failing(&[1800]));
        let cache = cache_with(Arc::clone(&provider), "cache_batch", 4);
        let (k1, k2, k3) = (key(48.85, 15), key(48.85, 30), key(48.85, 45));

        let results = cache.get_batch(&[k1, k2, k3, k1]).await;

        assert_eq!(results.len(), 3);
        assert!(results[&k1].is_ok());
        assert!(results[&k3].is_ok());
        let err = results[&k2].as_ref().unwrap_err();
        assert_eq!(err.key, k2);
        assert!(matches!(err.cause, ProviderError::Status { status: 500, .. }));
        assert!(!cache.contains(&k2));
        assert_eq!(cache.len(), 2);
        assert_eq!(provider.call_count(), 3);
    }

    #[tokio::test]
    async fn batch_respects_concurrency_bound() {
        let provider = Arc::new(MockProvider::slow(Duration::from_millis(20)));
        let cache = cache_with(Arc::clone(&provider), "cache_bound", 2);
        let keys: Vec<IsochroneKey> = (0..8).map(|i| key(48.0 + f64::from(i), 10)).collect();

        let results = cache.get_batch(&keys).await;

        assert!(results.values().all(Result::is_ok));
        assert_eq!(provider.call_count(), 8);
        assert!(provider.max_in_flight.load(std::sync::atomic::Ordering::SeqCst) <= 2);
    }

    #[tokio::test]
    async fn failure_is_not_cached() {
        let provider = Arc::new(MockProvider::failing(&[600]));
        let cache = cache_with(Arc::clone(&provider), "cache_failure", 4);
        let k = key(48.85, 10);

        assert!(cache.get(k).await.is_err());
        assert!(cache.get(k).await.is_err());

        assert_eq!(provider.call_count(), 2);
        assert!(cache.peek(&k).is_none());
        assert_eq!(cache.dirty_count(), 0);
    }

    #[tokio::test]
    async fn panicked_fetch_is_retried() {
        let provider = Arc::new(MockProvider::panicking_once());
        let cache = cache_with(Arc::clone(&provider), "cache_panic", 4);
        let k = key(48.85, 20);

        let first = cache.get(k).await.unwrap_err();
        assert!(matches!(first.cause, ProviderError::Task { .. }));
        assert!(!cache.contains(&k));

        let second = cache.get(k).await.unwrap();
        assert_eq!(second.key, k);
        assert_eq!(provider.call_count(), 2);
        assert!(cache.contains(&k));
    }

    #[tokio::test]
    async fn concurrent_persists_leave_a_valid_snapshot() {
        let path = temp_path("cache_concurrent_persist");
        let cache = IsochroneCache::new(
            JsonFileStore::new(&path),
            Arc::new(MockProvider::default()),
            4,
        );
        let keys: Vec<IsochroneKey> = (0..6).map(|i| key(44.0 + f64::from(i), 10)).collect();
        cache.get_batch(&keys).await;

        let (a, b) = std::thread::scope(|scope| {
            let a = scope.spawn(|| cache.persist());
            let b = scope.spawn(|| cache.persist());
            (a.join().unwrap(), b.join().unwrap())
        });
        let (a, b) = (a.unwrap(), b.unwrap());

        // One persist writes every entry, the other finds nothing dirty.
        assert!(a.written ^ b.written);
        assert_eq!(a.new_entries + b.new_entries, 6);
        assert_eq!(cache.dirty_count(), 0);

        let loaded = JsonFileStore::new(&path).load().unwrap();
        assert_eq!(loaded.report.loaded, 6);
        assert!(loaded.report.dropped.is_empty());
        assert!(!JsonFileStore::new(&path).temp_path().exists());
    }

    #[tokio::test]
    async fn abandoned_batch_still_populates_cache() {
        let provider = Arc::new(MockProvider::slow(Duration::from_millis(50)));
        let cache = cache_with(Arc::clone(&provider), "cache_abandoned", 4);
        let keys = [key(48.85, 10), key(48.85, 15)];

        let timed_out =
            tokio::time::timeout(Duration::from_millis(5), cache.get_batch(&keys)).await;
        assert!(timed_out.is_err());

        tokio::time::sleep(Duration::from_millis(200)).await;

        assert!(cache.contains(&keys[0]));
        assert!(cache.contains(&keys[1]));
        assert_eq!(provider.call_count(), 2);
    }

    #[tokio::test]
    async fn persist_then_load_round_trips() {
        let path = temp_path("cache_round_trip");
        let config = CacheConfig {
            path: path.clone(),
            max_concurrent_requests: 2,
        };
        let (cache, _) = IsochroneCache::open(&config, Arc::new(MockProvider::default())).unwrap();
        let keys = [key(48.85, 10), key(45.76, 60), key(43.29, 40)];
        cache.get_batch(&keys).await;

        let summary = cache.persist().unwrap();
        assert_eq!(summary.entries, 3);
        assert_eq!(summary.new_entries, 3);
        assert_eq!(cache.dirty_count(), 0);

        let offline = Arc::new(MockProvider::failing(&[600, 2400, 3600]));
        let (reloaded, report) = IsochroneCache::open(&config, Arc::clone(&offline) as _).unwrap();

        assert_eq!(report.loaded, 3);
        assert_eq!(reloaded.keys(), cache.keys());
        for k in &keys {
            assert_eq!(reloaded.peek(k), cache.peek(k));
            assert_eq!(reloaded.get(*k).await.unwrap(), cache.peek(k).unwrap());
        }
        assert_eq!(offline.call_count(), 0);
    }

    #[tokio::test]
    async fn clean_cache_does_not_write() {
        let path = temp_path("cache_clean");
        let cache = IsochroneCache::new(
            JsonFileStore::new(&path),
            Arc::new(MockProvider::default()),
            1,
        );

        let summary = cache.persist().unwrap();

        assert!(!summary.written);
        assert!(!path.exists());
    }

    #[tokio::test]
    async fn persist_failure_keeps_entries_and_dirty_marks() {
        let path = temp_path("cache_persist_failure");
        std::fs::create_dir_all(&path).unwrap();
        let cache = IsochroneCache::new(
            JsonFileStore::new(&path),
            Arc::new(MockProvider::default()),
            1,
        );
        let k = key(48.85, 10);
        cache.get(k).await.unwrap();

        assert!(cache.persist().is_err());

        assert!(cache.contains(&k));
        assert_eq!(cache.dirty_count(), 1);
        assert!(!JsonFileStore::new(&path).temp_path().exists());
    }

    #[tokio::test]
    async fn legacy_entries_are_served_without_fetching() {
        let path = temp_path("cache_legacy");
        std::fs::write(
            &path,
            r#"{"48.856614_2.352222_900_driving-car": [[[2.34, 48.85], [2.36, 48.85], [2.36, 48.86], [2.34, 48.86], [2.34, 48.85]]]}"#,
        )
        .unwrap();
        let provider = Arc::new(MockProvider::default());
        let config = CacheConfig {
            path: path.clone(),
            ..CacheConfig::default()
        };

        let (cache, report) = IsochroneCache::open(&config, Arc::clone(&provider) as _).unwrap();
        let k = IsochroneKey::new(48.856_614, 2.352_222, TravelMode::Car, 15).unwrap();

        assert_eq!(report.legacy_imported, 1);
        assert!(cache.get(k).await.unwrap().provenance.is_legacy_import());
        assert_eq!(provider.call_count(), 0);

        assert_eq!(cache.dirty_count(), 1);
        cache.persist().unwrap();
        let rewritten = std::fs::read_to_string(&path).unwrap();
        assert!(rewritten.contains("48.85661,2.35222,car,15"));
        assert!(rewritten.contains("legacy-import"));
    }

    #[test]
    fn unparseable_store_fails_to_load() {
        let path = temp_path("cache_garbage");
        std::fs::write(&path, "garbage").unwrap();
        let config = CacheConfig {
            path,
            ..CacheConfig::default()
        };

        assert!(IsochroneCache::open(&config, Arc::new(MockProvider::default())).is_err());
    }
}
