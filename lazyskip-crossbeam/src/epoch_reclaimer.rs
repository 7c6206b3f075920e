//! Epoch-based reclamation domain using crossbeam-epoch.
//!
//! # Design
//!
//! An `EpochReclaimer` either shares the process-wide collector or owns a
//! dedicated `Collector`. Reader scopes are pinned epoch guards, and retired
//! nodes are destroyed once every thread pinned at retirement has unpinned:
//!
//! ```text
//! LazySkipList<i64, V, EpochReclaimer>
//!     │
//!     ├── EpochReclaimer::new()        global collector, cheapest pin
//!     └── EpochReclaimer::dedicated()  private collector, isolated garbage
//! ```
//!
//! # Example
//!
//! ```rust,ignore
//! use lazyskip_core::LazySkipList;
//! use lazyskip_crossbeam::EpochReclaimer;
//!
//! let list: LazySkipList<i64, u64, EpochReclaimer> = LazySkipList::new();
//! list.insert(42, 1);
//!
//! if let Some(val) = list.get_ref(&42) {
//!     println!("Found: {}", *val);
//! }
//!
//! list.remove(&42);
//! ```

use std::fmt;
use std::ops::Deref;

use crossbeam_epoch::{self as epoch, Collector, Guard as EpochGuard};
use lazyskip_core::Reclaimer;
use tracing::trace;

/// Epoch-based memory reclamation domain.
///
/// Nodes retired through this domain are not freed until all threads have
/// advanced past the epoch in which they were retired.
///
/// When `retire` is called, it:
/// 1. Pins the current thread in this domain's collector
/// 2. Schedules destruction for after every current pin is released
/// 3. Unpins (the destruction is owned by the collector from then on)
///
/// A dedicated collector registers a fresh participant per pin, which costs
/// an allocation; prefer the global collector on hot paths.
///
#[derive(Clone, Default)]
pub struct EpochReclaimer {
    collector: Option<Collector>,
}

impl EpochReclaimer {
    /// A domain backed by the process-wide collector.
    pub fn new() -> Self {
        EpochReclaimer { collector: None }
    }

    /// A domain backed by its own collector.
    pub fn dedicated() -> Self {
        Self::with_collector(Collector::new())
    }

    pub fn with_collector(collector: Collector) -> Self {
        EpochReclaimer {
            collector: Some(collector),
        }
    }

    pub fn is_dedicated(&self) -> bool {
        self.collector.is_some()
    }

    fn pin(&self) -> EpochGuard {
        match &self.collector {
            None => epoch::pin(),
            // The guard keeps the participant alive after the handle drops.
            Some(collector) => collector.register().pin(),
        }
    }
}

impl fmt::Debug for EpochReclaimer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EpochReclaimer")
            .field("dedicated", &self.is_dedicated())
            .finish()
    }
}

/// A reference protected by a pinned epoch guard.
///
/// Dropping the `EpochRef` unpins, letting collection proceed.
///
pub struct EpochRef<'a, T> {
    _guard: EpochGuard,
    reference: &'a T,
}

impl<'a, T> EpochRef<'a, T> {
    /// # Safety
    ///
    /// `reference` must stay allocated while `guard` is pinned.
    pub(crate) unsafe fn new(guard: EpochGuard, reference: &'a T) -> Self {
        EpochRef {
            _guard: guard,
            reference,
        }
    }

    pub fn get(&self) -> &T {
        self.reference
    }
}

impl<T> Deref for EpochRef<'_, T> {
    type Target = T;

    fn deref(&self) -> &Self::Target {
        self.reference
    }
}

impl<T: fmt::Display> fmt::Display for EpochRef<'_, T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.reference)
    }
}

impl<T: fmt::Debug> fmt::Debug for EpochRef<'_, T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "EpochRef({:?})", self.reference)
    }
}

impl Reclaimer for EpochReclaimer {
    type GuardedRef<'a, T: 'a> = EpochRef<'a, T>;

    type ReaderScope<'a> = EpochGuard;

    fn enter(&self) -> Self::ReaderScope<'_> {
        self.pin()
    }

    unsafe fn retire<N>(&self, node: *mut N, dealloc: unsafe fn(*mut N)) {
        let guard = self.pin();
        unsafe {
            guard.defer_unchecked(move || {
                dealloc(node);
            });
        }
    }

    unsafe fn make_ref<'a, T: 'a>(
        &'a self,
        scope: Self::ReaderScope<'a>,
        ptr: *const T,
    ) -> Self::GuardedRef<'a, T> {
        // Keep the guard the lookup ran under. A fresh pin on a dedicated
        // collector is a new participant and may start an epoch late.
        unsafe { EpochRef::new(scope, &*ptr) }
    }

    fn flush(&self) {
        trace!(dedicated = self.is_dedicated(), "flushing epoch garbage");
        self.pin().flush();
    }
}
