//! # Shard Client
//!
//! A thin facade over one shard's [`ConnectionPool`] exposing exactly the
//! two backend operations the counting engine needs: atomic increment and
//! point read.

use std::time::Duration;

use counter_common::{Count, PageId, ShardId};

use crate::error::{ClientError, ClientResult};
use crate::pool::{ConnectionPool, PoolConfig};
use crate::resp::RespValue;

/// Per-shard client backed by a pooled RESP connection.
#[derive(Clone)]
pub struct ShardClient {
    shard: ShardId,
    pool: ConnectionPool,
}

impl ShardClient {
    pub fn new(shard: ShardId, max_conns: usize, call_timeout: Duration) -> ClientResult<Self> {
        let addr = strip_scheme(shard.as_str())?;
        let pool = ConnectionPool::new(PoolConfig {
            addr,
            max_idle: max_conns,
            max_total: max_conns,
            call_timeout: Some(call_timeout),
            connect_timeout: Some(call_timeout),
        });
        Ok(ShardClient { shard, pool })
    }

    pub fn shard_id(&self) -> &ShardId {
        &self.shard
    }

    /// Atomically adds `delta` to `key` on this shard and returns the new total.
    pub async fn incr_by(&self, key: &PageId, delta: Count) -> ClientResult<Count> {
        let delta_str = delta.to_string();
        let mut conn = self.pool.acquire().await?;
        match conn
            .exec(&[b"INCRBY", key.as_bytes(), delta_str.as_bytes()])
            .await?
        {
            RespValue::Integer(value) if value >= 0 => Ok(value as Count),
            RespValue::Integer(_) => Err(ClientError::UnexpectedResponse),
            RespValue::Error(message) => Err(ClientError::Server { message }),
            _ => Err(ClientError::UnexpectedResponse),
        }
    }

    /// Reads the current count for `key`, treating a missing key as zero.
    pub async fn get(&self, key: &PageId) -> ClientResult<Count> {
        let mut conn = self.pool.acquire().await?;
        match conn.exec(&[b"GET", key.as_bytes()]).await? {
            RespValue::Bulk(Some(data)) => parse_count(&data),
            RespValue::Bulk(None) => Ok(0),
            RespValue::Error(message) => Err(ClientError::Server { message }),
            _ => Err(ClientError::UnexpectedResponse),
        }
    }
}

fn parse_count(data: &[u8]) -> ClientResult<Count> {
    std::str::from_utf8(data)
        .ok()
        .and_then(|s| s.parse::<Count>().ok())
        .ok_or(ClientError::UnexpectedResponse)
}

/// Strips a `redis://` style scheme, leaving a bare `host:port` the TCP
/// layer can dial directly.
fn strip_scheme(endpoint: &str) -> ClientResult<String> {
    match endpoint.split_once("://") {
        Some((_, rest)) if !rest.is_empty() => Ok(rest.to_string()),
        Some(_) => Err(ClientError::InvalidAddress),
        None => Ok(endpoint.to_string()),
    }
}
