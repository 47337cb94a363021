use thiserror::Error;

use crate::types::ShardId;

/// Errors surfaced by the counting engine and its collaborators.
#[derive(Error, Debug, Clone)]
pub enum CounterError {
    #[error("no shards configured")]
    NoShardsConfigured,

    #[error("backend unavailable: {shard}: {reason}")]
    BackendUnavailable { shard: ShardId, reason: String },

    #[error("invalid page id: {0}")]
    InvalidPageId(String),

    #[error("invalid configuration: {0}")]
    Config(String),

    #[error("flush failed for {} page(s): {failed:?}", failed.len())]
    FlushPartial { failed: Vec<String> },
}

pub type CounterResult<T> = Result<T, CounterError>;
