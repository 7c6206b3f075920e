//! Concurrent ordered sets and maps built on the lazy skip list.
//!
//! Reads never lock. Inserts and removes lock only the predecessors they
//! rewrite, validate their snapshot, and retry when it went stale. Removed
//! nodes are handed to a pluggable [`Reclaimer`] instead of being freed in
//! place.
//!
//! ```rust,ignore
//! use lazyskip_core::{DeferredReclaimer, LazySkipList};
//!
//! let list: LazySkipList<i64, &str, DeferredReclaimer> = LazySkipList::new();
//! assert!(list.insert(5, "five"));
//! assert!(!list.insert(5, "again"));
//! assert_eq!(list.get(&5), Some("five"));
//! assert!(list.remove(&5));
//! ```

pub mod common_tests;
pub mod config;
pub mod data_structures;
pub mod error;
pub mod reclaim;

pub use config::{LEVEL_LIMIT, MAX_SHARDS, ShardedConfig, SkipListConfig};
pub use data_structures::{LazySkipList, ShardedSkipList, SkipSet, StatsSnapshot};
pub use error::{Error, Result};
pub use reclaim::{DeferredRef, DeferredReclaimer, Reclaimer};
