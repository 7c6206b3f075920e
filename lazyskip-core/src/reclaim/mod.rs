//! Reclamation domains for concurrent collections.
//!
//! A collection never frees a node it has unlinked. It hands the node to the
//! [`Reclaimer`] it was built with, and the reclaimer decides when no reader
//! can still be looking at it.
//!
//! # Design
//!
//! Reclaimers are plain values injected into each collection rather than
//! process-wide state, so two lists can live in isolated domains:
//!
//! ```text
//! LazySkipList<K, V, R: Reclaimer>
//!     │
//!     ├── LazySkipList<K, V, EpochReclaimer>     (production, lazyskip-crossbeam)
//!     └── LazySkipList<K, V, DeferredReclaimer>  (testing)
//! ```
//!
//! # Example
//!
//! ```rust,ignore
//! use lazyskip_core::{DeferredReclaimer, LazySkipList};
//! use lazyskip_crossbeam::EpochReclaimer;
//!
//! // Production: epoch-based reclamation
//! let list: LazySkipList<i64, String, EpochReclaimer> = LazySkipList::new();
//! list.insert(42, "answer".to_string());
//!
//! // Testing: nothing is freed until the list is dropped
//! let test_list: LazySkipList<i64, (), DeferredReclaimer> = LazySkipList::new();
//! ```

mod deferred_reclaimer;

use std::ops::Deref;

pub use deferred_reclaimer::{DeferredRef, DeferredReclaimer};

/// A memory reclamation domain shared by every thread operating on a collection.
///
/// # Safety Contract
///
/// Implementations must ensure:
/// 1. A node passed to `retire` is not freed while any reader scope that was
///    active at the time of retirement is still open
/// 2. A `GuardedRef` keeps the referenced data valid for its whole lifetime
///
/// # Design Note
///
/// The domain is stored in the collection and must be `Send + Sync`. Entering
/// a reader scope is per operation; creating the domain pins nothing.
///
pub trait Reclaimer: Sized + Send + Sync {
    /// A reference that carries its own read protection.
    type GuardedRef<'a, T: 'a>: Deref<Target = T>
    where
        Self: 'a;

    /// An open reader scope. Dropping it exits the scope.
    ///
    /// Epoch-based domains hold a pinned participant here. The deferred
    /// domain uses `()` since nothing is freed before the domain drops.
    type ReaderScope<'a>
    where
        Self: 'a;

    /// Enter a reader scope.
    ///
    /// Every node reached while the scope is open stays allocated until the
    /// scope is dropped, even if a writer retires it in the meantime.
    /// Scopes may nest.
    fn enter(&self) -> Self::ReaderScope<'_>;

    /// Schedule a node for destruction once no reader can observe it.
    ///
    /// # Safety
    ///
    /// - `node` must have been allocated by the collection and not yet freed
    /// - `node` must be unreachable from the collection's entry points
    /// - `node` must be retired at most once
    /// - `dealloc` must be the matching deallocation function for `node`
    ///
    unsafe fn retire<N>(&self, node: *mut N, dealloc: unsafe fn(*mut N));

    /// Turn an open reader scope into a self-protecting reference.
    ///
    /// The scope moves into the returned reference, so the protection that
    /// covered the lookup is the one that covers the reference. Opening a
    /// fresh scope here instead would leave a gap in which `ptr` may already
    /// be collectable.
    ///
    /// # Safety
    ///
    /// - `scope` must have been entered on this domain
    /// - `ptr` must point to data reached while `scope` was open
    ///
    unsafe fn make_ref<'a, T: 'a>(
        &'a self,
        scope: Self::ReaderScope<'a>,
        ptr: *const T,
    ) -> Self::GuardedRef<'a, T>;

    /// Ask the domain to run whatever destructions are already safe.
    fn flush(&self) {}
}
