//! # Shard Client Pool
//!
//! Holds one [`ShardClient`] per configured backend shard and routes keys
//! to the owning client via the consistent-hash ring (routing is a
//! pure function of the key).

use std::collections::HashMap;
use std::time::Duration;

use counter_common::{CounterError, CounterResult, HashRing, PageId, ShardId};

use crate::shard_client::ShardClient;

/// Routes page ids to the shard responsible for them and hands back a
/// ready-to-use [`ShardClient`].
pub struct ShardClientPool {
    ring: HashRing,
    clients: HashMap<ShardId, ShardClient>,
}

impl ShardClientPool {
    /// Builds one pooled client per shard and the ring that routes to them.
    pub fn new(
        shards: &[ShardId],
        virtual_nodes: usize,
        max_conns_per_shard: usize,
        call_timeout: Duration,
    ) -> CounterResult<Self> {
        let ring = HashRing::build(shards, virtual_nodes)?;

        let mut clients = HashMap::with_capacity(shards.len());
        for shard in shards {
            let client = ShardClient::new(shard.clone(), max_conns_per_shard, call_timeout)
                .map_err(|err| CounterError::BackendUnavailable {
                    shard: shard.clone(),
                    reason: err.to_string(),
                })?;
            clients.insert(shard.clone(), client);
        }

        Ok(ShardClientPool { ring, clients })
    }

    /// Returns the client owning `key`, per the consistent-hash ring.
    pub fn client_for(&self, key: &PageId) -> &ShardClient {
        let shard = self.ring.route(key.as_bytes());
        self.clients
            .get(shard)
            .expect("every ring entry maps to a configured shard client")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn routes_consistently_to_the_same_client() {
        let shards = vec![ShardId::new("127.0.0.1:1"), ShardId::new("127.0.0.1:2")];
        let pool = ShardClientPool::new(&shards, 100, 4, Duration::from_millis(50)).unwrap();

        let key = PageId::new("page-1").unwrap();
        let a = pool.client_for(&key).shard_id().clone();
        let b = pool.client_for(&key).shard_id().clone();
        assert_eq!(a, b);
    }
}
