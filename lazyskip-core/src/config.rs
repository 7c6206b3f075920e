use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Number of levels a tower may span, sentinels included.
pub const LEVEL_LIMIT: usize = 32;

/// Upper bound on shards in a [`crate::ShardedSkipList`].
pub const MAX_SHARDS: usize = 20_000;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SkipListConfig {
    /// Highest level index a node may reach. Sentinels span `0..=max_level`.
    pub max_level: usize,
    /// Retries of a single insert or remove before a contention warning is
    /// logged. Zero disables the warning.
    pub retry_warn_threshold: u32,
}

impl Default for SkipListConfig {
    fn default() -> Self {
        Self {
            max_level: 20,
            retry_warn_threshold: 1024,
        }
    }
}

impl SkipListConfig {
    pub fn with_max_level(mut self, max_level: usize) -> Self {
        self.max_level = max_level;
        self
    }

    pub fn validate(&self) -> Result<()> {
        if self.max_level >= LEVEL_LIMIT {
            return Err(Error::MaxLevelTooLarge {
                max_level: self.max_level,
                limit: LEVEL_LIMIT - 1,
            });
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ShardedConfig {
    pub shards: usize,
    pub list: SkipListConfig,
}

impl Default for ShardedConfig {
    fn default() -> Self {
        Self {
            shards: 16,
            list: SkipListConfig::default(),
        }
    }
}

impl ShardedConfig {
    pub fn with_shards(mut self, shards: usize) -> Self {
        self.shards = shards;
        self
    }

    pub fn with_list(mut self, list: SkipListConfig) -> Self {
        self.list = list;
        self
    }

    pub fn validate(&self) -> Result<()> {
        if self.shards == 0 || self.shards > MAX_SHARDS {
            return Err(Error::InvalidShardCount {
                shards: self.shards,
                limit: MAX_SHARDS,
            });
        }
        self.list.validate()
    }
}
