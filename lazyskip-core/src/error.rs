use thiserror::Error;

/// Errors raised while building a collection.
///
/// Concurrent operations never fail: a lost race is a `false` return, and a
/// stale snapshot is retried internally.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum Error {
    #[error("max level {max_level} exceeds the supported limit of {limit}")]
    MaxLevelTooLarge { max_level: usize, limit: usize },

    #[error("shard count must be between 1 and {limit}, got {shards}")]
    InvalidShardCount { shards: usize, limit: usize },
}

pub type Result<T> = std::result::Result<T, Error>;
