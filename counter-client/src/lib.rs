//! Async RESP2 client for talking to Redis-compatible backend shards,
//! with connection pooling and consistent-hash routing across shards.

mod error;
mod pool;
mod resp;
mod shard_client;
mod shard_pool;

pub use error::{ClientError, ClientResult};
pub use pool::{ConnectionPool, PoolConfig};
pub use shard_client::ShardClient;
pub use shard_pool::ShardClientPool;
