//! # Backend Routing Abstraction
//!
//! [`CounterService`] depends on this trait rather than on
//! [`ShardClientPool`] directly so unit tests can exercise the buffer/cache
//! coherence logic against an in-memory fake instead of real
//! TCP shards.

use async_trait::async_trait;

use counter_common::{Count, PageId, ShardId};
use counter_client::ShardClientPool;

/// Routes a key to its owning shard and performs the two backend
/// operations the engine needs.
#[async_trait]
pub trait ShardRouter: Send + Sync {
    /// The shard `key` would route to, for tagging errors and reads.
    fn shard_for(&self, key: &PageId) -> ShardId;

    async fn incr_by(&self, key: &PageId, delta: Count) -> counter_client::ClientResult<Count>;

    /// Returns the count and a tag identifying which shard served it
    /// (the `served_via` value on a backend-served read).
    async fn get_with_tag(
        &self,
        key: &PageId,
    ) -> counter_client::ClientResult<(Count, String)>;
}

#[async_trait]
impl ShardRouter for ShardClientPool {
    fn shard_for(&self, key: &PageId) -> ShardId {
        self.client_for(key).shard_id().clone()
    }

    async fn incr_by(&self, key: &PageId, delta: Count) -> counter_client::ClientResult<Count> {
        self.client_for(key).incr_by(key, delta).await
    }

    async fn get_with_tag(
        &self,
        key: &PageId,
    ) -> counter_client::ClientResult<(Count, String)> {
        let client = self.client_for(key);
        let count = client.get(key).await?;
        Ok((count, client.shard_id().host_tag().to_string()))
    }
}
