//! Crossbeam-based reclamation for lazyskip collections.
//!
//! This crate provides `EpochReclaimer`, an implementation of the `Reclaimer`
//! trait using crossbeam-epoch.
//!
//! # Usage
//!
//! ```ignore
//! use lazyskip_core::LazySkipList;
//! use lazyskip_crossbeam::EpochReclaimer;
//!
//! let list: LazySkipList<i64, (), EpochReclaimer> = LazySkipList::new();
//! list.add(42);
//! ```

pub mod epoch_reclaimer;

pub use epoch_reclaimer::{EpochRef, EpochReclaimer};

/// Skip list map reclaimed through crossbeam-epoch.
pub type EpochSkipList<K, V> = lazyskip_core::LazySkipList<K, V, EpochReclaimer>;
