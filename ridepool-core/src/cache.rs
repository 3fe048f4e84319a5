use async_trait::async_trait;
use std::time::Duration;

use crate::repository::StoreResult;

/// Key-value cache capability. Advisory only: never a source of truth.
#[async_trait]
pub trait CacheStore: Send + Sync {
    async fn get(&self, key: &str) -> StoreResult<Option<String>>;

    async fn set_with_ttl(&self, key: &str, value: &str, ttl: Duration) -> StoreResult<()>;

    /// Remove every listed key; missing keys are ignored
    async fn delete(&self, keys: &[String]) -> StoreResult<()>;
}
