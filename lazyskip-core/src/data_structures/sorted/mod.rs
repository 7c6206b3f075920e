//! Sorted collections with lock-free reads and fine-grained locked writes.
//!
//! Collections are parameterized by a reclamation domain `R: Reclaimer`:
//!
//! - `DeferredReclaimer`: Testing - keeps retired nodes until the domain drops
//! - `EpochReclaimer`: Production - epoch-based reclamation (lazyskip-crossbeam)

pub mod lazy_skip_list;
pub mod skip_node;
pub mod stats;

pub use lazy_skip_list::{Iter, LazySkipList, SkipSet};
pub use skip_node::{NodeKey, SkipNode};
pub use stats::{ContentionStats, StatsSnapshot};
