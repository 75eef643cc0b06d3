//! # Gallery cache
//!
//! Cache-aside layer in front of collection reads.
//!
//! - A live entry is served without calling the loader.
//! - A miss or an expired entry runs the loader and stores its result,
//!   empty collections included (no negative caching).
//! - Loader errors are returned and nothing is cached.
//! - Writes never invalidate: a new asset shows up once the TTL runs out.
//! - No stampede protection. Concurrent misses on one key may each run the
//!   loader; the last one to finish wins the slot. Loaders here are cheap
//!   idempotent reads, so duplicate loads only cost a query.
//!
//! Only the map mutation is synchronized; the loader runs with no lock held.

use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};

use dashmap::DashMap;

use crate::error::Result;
use crate::models::{AssetCollection, GalleryAsset};
use crate::traits::{AssetRepo, Clock};

/// TTL of gallery listings.
pub const GALLERY_TTL: Duration = Duration::from_secs(30 * 60);

/// Cache key of a gallery listing.
pub fn gallery_key(collection: AssetCollection) -> String {
    format!("gallery:{}", collection.as_str())
}

struct CacheEntry<T> {
    snapshot: Arc<Vec<T>>,
    expires_at: Instant,
}

/// Read-through cache of collection snapshots keyed by string.
pub struct GalleryCache<T> {
    entries: DashMap<String, CacheEntry<T>>,
    clock: Arc<dyn Clock>,
}

impl<T> GalleryCache<T> {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self {
            entries: DashMap::new(),
            clock,
        }
    }

    /// Returns the snapshot for `key`, loading it on a miss.
    pub async fn get<F, Fut>(&self, key: &str, loader: F, ttl: Duration) -> Result<Arc<Vec<T>>>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<Vec<T>>>,
    {
        if let Some(snapshot) = self.live(key) {
            tracing::trace!(key, "cache hit");
            return Ok(snapshot);
        }

        tracing::debug!(key, "cache miss, loading");
        let snapshot = Arc::new(loader().await?);
        let expires_at = self.clock.now() + ttl;
        self.entries.insert(
            key.to_string(),
            CacheEntry {
                snapshot: Arc::clone(&snapshot),
                expires_at,
            },
        );
        Ok(snapshot)
    }

    fn live(&self, key: &str) -> Option<Arc<Vec<T>>> {
        let entry = self.entries.get(key)?;
        if self.clock.now() < entry.expires_at {
            Some(Arc::clone(&entry.snapshot))
        } else {
            None
        }
    }

    /// Number of stored entries, expired ones included.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Drops every entry. Teardown only; writes do not call this.
    pub fn clear(&self) {
        self.entries.clear();
    }
}

/// Gallery listings served through a [`GalleryCache`].
pub struct GalleryReader {
    cache: GalleryCache<GalleryAsset>,
    repo: Arc<dyn AssetRepo>,
    ttl: Duration,
}

impl GalleryReader {
    pub fn new(repo: Arc<dyn AssetRepo>, clock: Arc<dyn Clock>, ttl: Duration) -> Self {
        Self {
            cache: GalleryCache::new(clock),
            repo,
            ttl,
        }
    }

    pub async fn list(&self, collection: AssetCollection) -> Result<Arc<Vec<GalleryAsset>>> {
        let repo = Arc::clone(&self.repo);
        self.cache
            .get(
                &gallery_key(collection),
                || async move { repo.list_assets(collection).await },
                self.ttl,
            )
            .await
    }

    pub fn cache(&self) -> &GalleryCache<GalleryAsset> {
        &self.cache
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::AppError;
    use crate::models::BinaryRef;
    use crate::traits::{ManualClock, MockAssetRepo};
    use chrono::Utc;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use uuid::Uuid;

    fn setup() -> (Arc<ManualClock>, GalleryCache<u32>) {
        let clock = Arc::new(ManualClock::new());
        let cache = GalleryCache::new(clock.clone() as Arc<dyn Clock>);
        (clock, cache)
    }

    fn asset(name: &str) -> GalleryAsset {
        GalleryAsset {
            id: Uuid::now_v7(),
            collection: AssetCollection::Main,
            binary_ref: BinaryRef(name.to_string()),
            caption: None,
            attribution: None,
            created_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn test_live_entry_skips_loader() {
        let (clock, cache) = setup();
        let ttl = Duration::from_secs(60);

        let first = cache.get("k", || async { Ok(vec![1, 2]) }, ttl).await.unwrap();
        assert_eq!(*first, vec![1, 2]);

        clock.advance(Duration::from_secs(59));
        let calls = AtomicUsize::new(0);
        let second = cache
            .get(
                "k",
                || async {
                    calls.fetch_add(1, Ordering::SeqCst);
                    Ok(vec![9])
                },
                ttl,
            )
            .await
            .unwrap();

        assert_eq!(calls.load(Ordering::SeqCst), 0);
        assert_eq!(*second, vec![1, 2]);
    }

    #[tokio::test]
    async fn test_expired_entry_reloads_exactly_once() {
        let (clock, cache) = setup();
        let ttl = Duration::from_secs(60);
        cache.get("k", || async { Ok(vec![1]) }, ttl).await.unwrap();

        clock.advance(ttl);
        let calls = AtomicUsize::new(0);
        let loader = || async {
            calls.fetch_add(1, Ordering::SeqCst);
            Ok(vec![7, 8])
        };
        let reloaded = cache.get("k", loader, ttl).await.unwrap();
        assert_eq!(*reloaded, vec![7, 8]);

        let again = cache
            .get(
                "k",
                || async {
                    calls.fetch_add(1, Ordering::SeqCst);
                    Ok(vec![0])
                },
                ttl,
            )
            .await
            .unwrap();
        assert_eq!(*again, vec![7, 8]);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_empty_result_is_cached() {
        let (_clock, cache) = setup();
        let ttl = Duration::from_secs(60);
        let empty = cache.get("k", || async { Ok(Vec::new()) }, ttl).await.unwrap();
        assert!(empty.is_empty());

        let calls = AtomicUsize::new(0);
        let still_empty = cache
            .get(
                "k",
                || async {
                    calls.fetch_add(1, Ordering::SeqCst);
                    Ok(vec![1])
                },
                ttl,
            )
            .await
            .unwrap();
        assert!(still_empty.is_empty());
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_loader_error_is_not_cached() {
        let (_clock, cache) = setup();
        let ttl = Duration::from_secs(60);
        let err = cache
            .get("k", || async { Err(AppError::Internal("db down".into())) }, ttl)
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Internal(_)));
        assert!(cache.is_empty());

        let loaded = cache.get("k", || async { Ok(vec![3]) }, ttl).await.unwrap();
        assert_eq!(*loaded, vec![3]);
    }

    #[tokio::test]
    async fn test_keys_are_independent() {
        let (_clock, cache) = setup();
        let ttl = Duration::from_secs(60);
        cache.get("a", || async { Ok(vec![1]) }, ttl).await.unwrap();
        let b = cache.get("b", || async { Ok(vec![2]) }, ttl).await.unwrap();
        assert_eq!(*b, vec![2]);
        assert_eq!(cache.len(), 2);

        cache.clear();
        assert!(cache.is_empty());
    }

    // Writes do not invalidate: an asset added after the first read stays
    // invisible until the 30 minute TTL runs out.
    #[tokio::test]
    async fn test_gallery_is_stale_until_ttl() {
        let clock = Arc::new(ManualClock::new());
        let mut repo = MockAssetRepo::new();
        let mut seq = mockall::Sequence::new();
        repo.expect_list_assets()
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_| Ok(vec![asset("one.jpg")]));
        repo.expect_list_assets()
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_| Ok(vec![asset("one.jpg"), asset("two.jpg")]));

        let reader = GalleryReader::new(Arc::new(repo), clock.clone(), GALLERY_TTL);

        assert_eq!(reader.list(AssetCollection::Main).await.unwrap().len(), 1);

        clock.advance(GALLERY_TTL - Duration::from_secs(1));
        assert_eq!(reader.list(AssetCollection::Main).await.unwrap().len(), 1);

        clock.advance(Duration::from_secs(1));
        assert_eq!(reader.list(AssetCollection::Main).await.unwrap().len(), 2);
    }

    #[test]
    fn test_gallery_keys_per_collection() {
        assert_eq!(gallery_key(AssetCollection::Main), "gallery:main");
        assert_eq!(gallery_key(AssetCollection::Portfolio), "gallery:portfolio");
    }
}
