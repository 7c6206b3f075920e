//! Deferred reclamation domain for tests.
//!
//! `DeferredReclaimer` keeps every retired node until the domain itself is
//! dropped, which makes destruction timing fully predictable.

#[cfg(debug_assertions)]
use std::collections::HashSet;
use std::ops::Deref;

use parking_lot::Mutex;
use tracing::{debug, error};

use super::Reclaimer;

/// A domain that frees retired nodes only when it is dropped.
///
/// Memory grows with every removal, so this is meant for tests and short
/// lived collections. A collection owns its reclaimer, and the collection's
/// own nodes are released before the reclaimer drops.
///
/// # Thread Safety
///
/// Retired nodes are collected behind a `Mutex`, so any thread may retire.
///
pub struct DeferredReclaimer {
    retired: Mutex<Vec<RetiredNode>>,
    #[cfg(debug_assertions)]
    seen: Mutex<HashSet<usize>>,
}

struct RetiredNode {
    ptr: *mut (),
    dealloc: unsafe fn(*mut ()),
}

// Safety: the pointer is only dereferenced by `dealloc` when the owning
// domain drops, after every thread has finished with it.
unsafe impl Send for RetiredNode {}

impl DeferredReclaimer {
    pub fn new() -> Self {
        DeferredReclaimer {
            retired: Mutex::new(Vec::new()),
            #[cfg(debug_assertions)]
            seen: Mutex::new(HashSet::new()),
        }
    }

    /// Number of nodes retired and still waiting for the domain to drop.
    pub fn pending(&self) -> usize {
        self.retired.lock().len()
    }
}

impl Default for DeferredReclaimer {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for DeferredReclaimer {
    fn drop(&mut self) {
        let nodes = self.retired.get_mut();

        let mut addresses: Vec<usize> = nodes.iter().map(|n| n.ptr as usize).collect();
        addresses.sort_unstable();
        let duplicates = addresses.windows(2).filter(|w| w[0] == w[1]).count();
        if duplicates > 0 {
            error!(duplicates, total = nodes.len(), "node retired more than once");
            panic!("found {} duplicate pointer(s) in retired list", duplicates);
        }

        if !nodes.is_empty() {
            debug!(nodes = nodes.len(), "releasing retired nodes");
        }
        for node in nodes.drain(..) {
            unsafe {
                (node.dealloc)(node.ptr);
            }
        }
    }
}

/// Plain reference handed out by [`DeferredReclaimer`].
///
/// Nothing retired into the domain is freed while the domain is alive, and
/// the reference borrows the domain.
///
pub struct DeferredRef<'a, T> {
    data: &'a T,
}

impl<'a, T> DeferredRef<'a, T> {
    pub fn new(data: &'a T) -> Self {
        DeferredRef { data }
    }
}

impl<T> Deref for DeferredRef<'_, T> {
    type Target = T;

    fn deref(&self) -> &Self::Target {
        self.data
    }
}

impl<T: std::fmt::Debug> std::fmt::Debug for DeferredRef<'_, T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "DeferredRef({:?})", self.data)
    }
}

impl Reclaimer for DeferredReclaimer {
    type GuardedRef<'a, T: 'a> = DeferredRef<'a, T>;

    type ReaderScope<'a> = ();

    fn enter(&self) -> Self::ReaderScope<'_> {}

    unsafe fn retire<N>(&self, node: *mut N, dealloc: unsafe fn(*mut N)) {
        #[cfg(debug_assertions)]
        {
            let addr = node as usize;
            if !self.seen.lock().insert(addr) {
                error!(addr, "node retired twice");
                panic!("duplicate retire at {:#x}", addr);
            }
        }

        let node = RetiredNode {
            ptr: node as *mut (),
            dealloc: unsafe { std::mem::transmute::<unsafe fn(*mut N), unsafe fn(*mut ())>(dealloc) },
        };
        self.retired.lock().push(node);
    }

    unsafe fn make_ref<'a, T: 'a>(
        &'a self,
        _scope: Self::ReaderScope<'a>,
        ptr: *const T,
    ) -> Self::GuardedRef<'a, T> {
        // Safety: caller guarantees ptr is reachable, and nothing is freed
        // before `self` drops.
        DeferredRef::new(unsafe { &*ptr })
    }
}
