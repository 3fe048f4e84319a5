use rand::Rng;
use ridepool_core::CacheStore;
use ridepool_shared::{ReviewPageRequest, ReviewSummary, MAX_PAGE_SIZE};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

/// Read-through cache for the first, unfiltered page of the review listing.
///
/// Only that page is cached, one entry per page size. Any failure talking to
/// the cache is logged and treated as a miss; callers never see it.
#[derive(Clone)]
pub struct ReviewListCache {
    store: Arc<dyn CacheStore>,
    ttl: Duration,
    jitter: Duration,
}

impl ReviewListCache {
    pub fn new(store: Arc<dyn CacheStore>, ttl: Duration, jitter: Duration) -> Self {
        Self { store, ttl, jitter }
    }

    pub fn key(page_size: u32) -> String {
        format!("reviews:list:trip=0:author=0:page=1:size={}", page_size)
    }

    pub fn is_cacheable(request: &ReviewPageRequest) -> bool {
        request.is_unfiltered_first_page()
    }

    pub async fn get(&self, page_size: u32) -> Option<Vec<ReviewSummary>> {
        let key = Self::key(page_size);
        match self.store.get(&key).await {
            Ok(Some(raw)) => match serde_json::from_str(&raw) {
                Ok(items) => {
                    debug!("Review list cache hit: {}", key);
                    Some(items)
                }
                Err(e) => {
                    warn!("Discarding undecodable cache entry {}: {}", key, e);
                    None
                }
            },
            Ok(None) => None,
            Err(e) => {
                warn!("Review list cache read failed: {}", e);
                None
            }
        }
    }

    pub async fn put(&self, page_size: u32, items: &[ReviewSummary]) {
        let key = Self::key(page_size);
        let raw = match serde_json::to_string(items) {
            Ok(raw) => raw,
            Err(e) => {
                warn!("Failed to encode review list for cache: {}", e);
                return;
            }
        };
        let ttl = self.jittered_ttl();
        if let Err(e) = self.store.set_with_ttl(&key, &raw, ttl).await {
            warn!("Review list cache write failed: {}", e);
        }
    }

    /// Drop every cached page size. Run after the mutating commit.
    pub async fn invalidate(&self) {
        let keys: Vec<String> = (1..=MAX_PAGE_SIZE).map(Self::key).collect();
        if let Err(e) = self.store.delete(&keys).await {
            warn!("Review list cache invalidation failed: {}", e);
        }
    }

    fn jittered_ttl(&self) -> Duration {
        let jitter_ms = self.jitter.as_millis() as u64;
        if jitter_ms == 0 {
            return self.ttl;
        }
        self.ttl + Duration::from_millis(rand::thread_rng().gen_range(0..=jitter_ms))
    }
}
