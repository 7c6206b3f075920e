//! Hash-sharded compositions of sorted collections.

pub mod sharded_skip_list;

pub use sharded_skip_list::ShardedSkipList;
