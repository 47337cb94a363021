//! Consistent-hash ring for routing page ids to backend shards.
//!
//! Mirrors the virtual-node ring used for cache-affine load balancing
//! elsewhere in the stack, but built around a fixed shard set (no runtime
//! add/remove) and a 128-bit MD5 ring position as specified.

use md5::{Digest, Md5};

use crate::error::CounterError;
use crate::types::ShardId;

/// Default number of virtual nodes per shard.
pub const DEFAULT_VIRTUAL_NODES: usize = 100;

/// Immutable consistent-hash ring built once at startup.
///
/// `route` is a pure function of the configured shards, the virtual node
/// count, and the lookup key; there is no interior mutability here.
#[derive(Debug, Clone)]
pub struct HashRing {
    // Sorted by ring position ascending; ties broken by shard id at build time.
    entries: Vec<(u128, ShardId)>,
}

impl HashRing {
    /// Builds a ring with `virtual_nodes` replicas per shard.
    ///
    /// Returns `NoShardsConfigured` when `shards` is empty so callers fail
    /// fast at startup rather than routing into an empty ring later.
    pub fn build(shards: &[ShardId], virtual_nodes: usize) -> Result<Self, CounterError> {
        if shards.is_empty() {
            return Err(CounterError::NoShardsConfigured);
        }

        let mut entries = Vec::with_capacity(shards.len() * virtual_nodes);
        for shard in shards {
            for i in 0..virtual_nodes {
                let vnode = format!("{}:{}", shard.as_str(), i);
                let pos = ring_hash(vnode.as_bytes());
                entries.push((pos, shard.clone()));
            }
        }

        // Stable sort keeps insertion order (shard, then replica index) as
        // the deterministic tiebreak for the astronomically rare hash tie.
        entries.sort_by(|a, b| a.0.cmp(&b.0).then_with(|| a.1.cmp(&b.1)));
        Ok(HashRing { entries })
    }

    /// Routes `key` to its owning shard: the first entry whose ring
    /// position strictly exceeds `h(key)`, wrapping to index 0 otherwise.
    pub fn route(&self, key: &[u8]) -> &ShardId {
        let h = ring_hash(key);
        let idx = match self.entries.partition_point(|(pos, _)| *pos <= h) {
            len if len == self.entries.len() => 0,
            idx => idx,
        };
        &self.entries[idx].1
    }

    /// Total number of virtual node entries (`shards * virtual_nodes`).
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Hashes `data` with MD5 and reinterprets the digest as a big-endian
/// 128-bit integer, per the reference algorithm.
fn ring_hash(data: &[u8]) -> u128 {
    let digest = Md5::digest(data);
    u128::from_be_bytes(digest.into())
}
