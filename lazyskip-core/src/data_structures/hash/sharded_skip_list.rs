use std::collections::hash_map::RandomState;
use std::hash::{BuildHasher, Hash};
use std::ops::RangeBounds;

use tracing::debug;

use crate::config::ShardedConfig;
use crate::data_structures::sorted::{LazySkipList, StatsSnapshot};
use crate::error::Result;
use crate::reclaim::Reclaimer;

/// N independent skip lists, one picked per key by hash.
///
/// Shards share nothing: each has its own sentinels, locks and reclamation
/// domain, so writers on different shards never meet. Point operations
/// touch exactly one shard; `range` and `len` visit all of them.
///
pub struct ShardedSkipList<K, V, R: Reclaimer, S = RandomState> {
    shards: Box<[LazySkipList<K, V, R>]>,
    hash_builder: S,
}

impl<K: Ord + Hash, V, R: Reclaimer + Default> ShardedSkipList<K, V, R> {
    pub fn new(shards: usize) -> Result<Self> {
        Self::with_config(ShardedConfig::default().with_shards(shards))
    }

    pub fn with_config(config: ShardedConfig) -> Result<Self> {
        Self::with_reclaimers(config, |_| R::default())
    }
}

impl<K: Ord + Hash, V, R: Reclaimer> ShardedSkipList<K, V, R> {
    /// Build the shards, asking `make_reclaimer` for one domain per shard.
    pub fn with_reclaimers(
        config: ShardedConfig,
        make_reclaimer: impl FnMut(usize) -> R,
    ) -> Result<Self> {
        Self::with_hasher(config, make_reclaimer, RandomState::new())
    }
}

impl<K: Ord + Hash, V, R: Reclaimer, S: BuildHasher> ShardedSkipList<K, V, R, S> {
    pub fn with_hasher(
        config: ShardedConfig,
        mut make_reclaimer: impl FnMut(usize) -> R,
        hash_builder: S,
    ) -> Result<Self> {
        config.validate()?;
        let shards = (0..config.shards)
            .map(|index| LazySkipList::with_reclaimer(config.list.clone(), make_reclaimer(index)))
            .collect::<Result<Vec<_>>>()?
            .into_boxed_slice();
        debug!(shards = config.shards, max_level = config.list.max_level, "created sharded skip list");
        Ok(ShardedSkipList { shards, hash_builder })
    }

    #[inline]
    fn shard_index(&self, key: &K) -> usize {
        (self.hash_builder.hash_one(key) % self.shards.len() as u64) as usize
    }

    #[inline]
    fn shard(&self, key: &K) -> &LazySkipList<K, V, R> {
        &self.shards[self.shard_index(key)]
    }

    pub fn shard_count(&self) -> usize {
        self.shards.len()
    }

    pub fn shards(&self) -> &[LazySkipList<K, V, R>] {
        &self.shards
    }

    pub fn insert(&self, key: K, value: V) -> bool {
        self.shard(&key).insert(key, value)
    }

    pub fn remove(&self, key: &K) -> bool {
        self.shard(key).remove(key)
    }

    pub fn take(&self, key: &K) -> Option<V>
    where
        V: Clone,
    {
        self.shard(key).take(key)
    }

    pub fn contains(&self, key: &K) -> bool {
        self.shard(key).contains(key)
    }

    pub fn get(&self, key: &K) -> Option<V>
    where
        V: Clone,
    {
        self.shard(key).get(key)
    }

    pub fn find_and_apply<F, T>(&self, key: &K, f: F) -> Option<T>
    where
        F: FnOnce(&V) -> T,
    {
        self.shard(key).find_and_apply(key, f)
    }

    /// Entries inside `bounds` from every shard, merged into key order.
    ///
    /// Each shard is read in its own reader scope, so the result is not an
    /// atomic snapshot across shards.
    pub fn range<B>(&self, bounds: B) -> Vec<(K, V)>
    where
        B: RangeBounds<K>,
        K: Clone,
        V: Clone,
    {
        let bounds = (bounds.start_bound().cloned(), bounds.end_bound().cloned());
        let mut entries: Vec<(K, V)> = self
            .shards
            .iter()
            .flat_map(|shard| shard.range(bounds.clone()))
            .collect();
        entries.sort_unstable_by(|a, b| a.0.cmp(&b.0));
        entries
    }

    pub fn len(&self) -> usize {
        self.shards.iter().map(LazySkipList::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.shards.iter().all(LazySkipList::is_empty)
    }

    pub fn stats(&self) -> StatsSnapshot {
        self.shards.iter().map(LazySkipList::stats).sum()
    }

    pub fn flush(&self) {
        for shard in self.shards.iter() {
            shard.flush();
        }
    }
}
