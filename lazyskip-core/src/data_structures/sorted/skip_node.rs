use std::alloc::{Layout, alloc, dealloc, handle_alloc_error};
use std::cmp::Ordering as CmpOrdering;
use std::ptr;
use std::sync::atomic::{AtomicBool, AtomicPtr, Ordering};

use parking_lot::{Mutex, MutexGuard};

pub(crate) type SkipNodePtr<K, V> = *mut SkipNode<K, V>;

/// Ordering key of a node. Sentinels sit outside every real key, so a
/// traversal never needs a null check to know where a level ends.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NodeKey<K> {
    Head,
    Key(K),
    Tail,
}

impl<K: Ord> NodeKey<K> {
    #[inline]
    pub fn cmp_key(&self, key: &K) -> CmpOrdering {
        match self {
            NodeKey::Head => CmpOrdering::Less,
            NodeKey::Key(k) => k.cmp(key),
            NodeKey::Tail => CmpOrdering::Greater,
        }
    }

    /// True if this node sorts strictly before `key`.
    #[inline]
    pub fn precedes(&self, key: &K) -> bool {
        self.cmp_key(key) == CmpOrdering::Less
    }

    #[inline]
    pub fn matches(&self, key: &K) -> bool {
        self.cmp_key(key) == CmpOrdering::Equal
    }
}

impl<K> NodeKey<K> {
    pub fn as_key(&self) -> Option<&K> {
        match self {
            NodeKey::Key(k) => Some(k),
            _ => None,
        }
    }
}

// ============================================================================
// SkipNode - one tower of the lazy skip list
// ============================================================================

/// A skip list node with an inline tower of successor links.
///
/// Uses the flexible array member pattern:
/// - Single allocation per node
/// - Successor links are inline after the struct fields
/// - Layout: [header][next[0..=top_level]]
///
/// Lifecycle:
///
/// ```text
/// allocated ──► fully_linked ──► marked ──► unlinked ──► retired ──► freed
///               (present)        (absent, still reachable)
/// ```
///
/// `lock` is taken only by writers that are about to rewrite this node's own
/// links (as a predecessor) or retire it (as a victim). Readers never lock.
///
#[repr(C)]
pub struct SkipNode<K, V> {
    key: NodeKey<K>,
    value: Option<V>,
    top_level: usize,
    marked: AtomicBool,
    fully_linked: AtomicBool,
    lock: Mutex<()>,
    // Flexible array: top_level + 1 links allocated inline after this struct
    next: [AtomicPtr<SkipNode<K, V>>; 0],
}

impl<K, V> SkipNode<K, V> {
    fn layout(top_level: usize) -> Layout {
        // top_level is bounded by LEVEL_LIMIT, so neither step can overflow
        let links = Layout::array::<AtomicPtr<Self>>(top_level + 1).expect("tower layout overflow");
        Layout::new::<Self>()
            .extend(links)
            .expect("tower layout overflow")
            .0
            .pad_to_align()
    }

    /// Allocate a node whose links all point at `next`.
    ///
    /// Aborts through the global allocation error handler if memory is
    /// exhausted; a half built node is never returned.
    fn alloc(key: NodeKey<K>, value: Option<V>, top_level: usize, next: *mut Self) -> *mut Self {
        unsafe {
            let layout = Self::layout(top_level);
            let node = alloc(layout) as *mut Self;
            if node.is_null() {
                handle_alloc_error(layout);
            }

            ptr::write(&raw mut (*node).key, key);
            ptr::write(&raw mut (*node).value, value);
            ptr::write(&raw mut (*node).top_level, top_level);
            ptr::write(&raw mut (*node).marked, AtomicBool::new(false));
            ptr::write(&raw mut (*node).fully_linked, AtomicBool::new(false));
            ptr::write(&raw mut (*node).lock, Mutex::new(()));

            let links = (&raw mut (*node).next) as *mut AtomicPtr<Self>;
            for level in 0..=top_level {
                ptr::write(links.add(level), AtomicPtr::new(next));
            }

            node
        }
    }

    pub(crate) fn alloc_entry(key: K, value: V, top_level: usize) -> *mut Self {
        Self::alloc(NodeKey::Key(key), Some(value), top_level, ptr::null_mut())
    }

    /// Allocate the head and tail sentinels, with every head link on `tail`.
    pub(crate) fn alloc_sentinels(max_level: usize) -> (*mut Self, *mut Self) {
        let tail = Self::alloc(NodeKey::Tail, None, max_level, ptr::null_mut());
        let head = Self::alloc(NodeKey::Head, None, max_level, tail);
        unsafe {
            (*tail).set_fully_linked();
            (*head).set_fully_linked();
        }
        (head, tail)
    }

    /// Drop the key and value and release the allocation.
    ///
    /// # Safety
    /// `node` must come from `alloc_entry` or `alloc_sentinels`, must not be
    /// reachable by any thread, and must not be freed twice.
    pub(crate) unsafe fn dealloc(node: *mut Self) {
        unsafe {
            let layout = Self::layout((*node).top_level);
            ptr::drop_in_place(node);
            dealloc(node as *mut u8, layout);
        }
    }

    #[inline]
    pub fn key(&self) -> &NodeKey<K> {
        &self.key
    }

    #[inline]
    pub fn value(&self) -> Option<&V> {
        self.value.as_ref()
    }

    #[inline]
    pub fn top_level(&self) -> usize {
        self.top_level
    }

    #[inline]
    unsafe fn link_at(&self, level: usize) -> &AtomicPtr<SkipNode<K, V>> {
        unsafe { &*self.next.as_ptr().add(level) }
    }

    /// Load the successor at `level` (Acquire).
    #[inline]
    pub fn next(&self, level: usize) -> *mut SkipNode<K, V> {
        debug_assert!(level <= self.top_level, "level {} above tower", level);
        unsafe { self.link_at(level).load(Ordering::Acquire) }
    }

    /// Store the successor at `level` (Release).
    #[inline]
    pub fn set_next(&self, level: usize, node: *mut SkipNode<K, V>) {
        debug_assert!(level <= self.top_level, "level {} above tower", level);
        unsafe { self.link_at(level).store(node, Ordering::Release) }
    }

    #[inline]
    pub fn is_marked(&self) -> bool {
        self.marked.load(Ordering::Acquire)
    }

    #[inline]
    pub fn mark(&self) {
        self.marked.store(true, Ordering::Release);
    }

    #[inline]
    pub fn is_fully_linked(&self) -> bool {
        self.fully_linked.load(Ordering::Acquire)
    }

    #[inline]
    pub fn set_fully_linked(&self) {
        self.fully_linked.store(true, Ordering::Release);
    }

    /// A node is in the set iff it finished linking and nobody marked it.
    #[inline]
    pub fn is_present(&self) -> bool {
        self.is_fully_linked() && !self.is_marked()
    }

    #[inline]
    pub fn lock(&self) -> MutexGuard<'_, ()> {
        self.lock.lock()
    }
}
