//! Data structures for concurrent collections.
//!
//! # Organization
//!
//! - [`sorted`] - Lazy skip list engine, node model and contention counters
//! - [`hash`] - Hash-sharded sets of independent skip lists

pub mod hash;
pub mod sorted;

pub use hash::ShardedSkipList;
pub use sorted::{ContentionStats, Iter, LazySkipList, NodeKey, SkipNode, SkipSet, StatsSnapshot};
