//! Process configuration, loaded once at startup from the environment.
//!
//! A small, dependency-light config struct rather than a generic
//! config-file crate: this is the entire surface the service needs.

use std::time::Duration;

use crate::error::CounterError;
use crate::types::ShardId;

/// Typed, validated process configuration.
#[derive(Debug, Clone)]
pub struct ServiceConfig {
    /// Backend shard endpoints, in the order given by `REDIS_NODES`.
    pub shards: Vec<ShardId>,
    /// Virtual nodes per shard in the consistent-hash ring.
    pub virtual_nodes: usize,
    /// Background flush period.
    pub flush_interval: Duration,
    /// Local read-cache freshness window.
    pub cache_ttl: Duration,
    /// HTTP listen address.
    pub server_bind_addr: String,
    /// Max pooled TCP connections per shard.
    pub shard_pool_max_conns: usize,
    /// Per-call backend timeout.
    pub shard_call_timeout: Duration,
}

impl ServiceConfig {
    /// Loads configuration from the environment, applying the documented
    /// defaults for anything unset. `REDIS_NODES` is the only required
    /// variable; a missing or empty value is a fatal `ConfigError`.
    pub fn from_env() -> Result<Self, CounterError> {
        let redis_nodes = std::env::var("REDIS_NODES")
            .map_err(|_| CounterError::Config("REDIS_NODES is required".to_string()))?;

        let shards: Vec<ShardId> = redis_nodes
            .split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(ShardId::new)
            .collect();

        if shards.is_empty() {
            return Err(CounterError::Config(
                "REDIS_NODES must list at least one shard".to_string(),
            ));
        }

        let virtual_nodes = parse_env_or("VIRTUAL_NODES", 100)?;
        let flush_interval_secs = parse_env_or("FLUSH_INTERVAL_SECS", 30)?;
        let cache_ttl_secs = parse_env_or("CACHE_TTL_SECS", 5)?;
        let shard_pool_max_conns = parse_env_or("SHARD_POOL_MAX_CONNS", 16)?;
        let shard_call_timeout_ms = parse_env_or("SHARD_CALL_TIMEOUT_MS", 1000)?;
        let server_bind_addr = std::env::var("SERVER_BIND_ADDR")
            .unwrap_or_else(|_| "0.0.0.0:8080".to_string());

        Ok(ServiceConfig {
            shards,
            virtual_nodes,
            flush_interval: Duration::from_secs(flush_interval_secs),
            cache_ttl: Duration::from_secs(cache_ttl_secs),
            server_bind_addr,
            shard_pool_max_conns: shard_pool_max_conns as usize,
            shard_call_timeout: Duration::from_millis(shard_call_timeout_ms),
        })
    }
}

fn parse_env_or(name: &str, default: u64) -> Result<u64, CounterError> {
    match std::env::var(name) {
        Ok(raw) => raw
            .parse::<u64>()
            .map_err(|_| CounterError::Config(format!("{name} must be a non-negative integer"))),
        Err(_) => Ok(default),
    }
}
