use std::fmt;
use std::marker::PhantomData;
use std::ops::{Bound, RangeBounds};
use std::ptr;

use crossbeam_utils::Backoff;
use parking_lot::MutexGuard;
use tracing::{debug, trace, warn};

use super::skip_node::{SkipNode, SkipNodePtr};
use super::stats::{ContentionStats, StatsSnapshot};
use crate::config::{LEVEL_LIMIT, SkipListConfig};
use crate::error::Result;
use crate::reclaim::Reclaimer;

// =============================================================================
// LAZY SKIP LIST INVARIANTS & LOCKING PROTOCOL
// =============================================================================
//
// Structure (sorted ascending, sentinels span every level):
//
// Level 2:  HEAD ─────────────────────────────────────► 30 ─────────────────► TAIL
//             │                                          │
// Level 1:  HEAD ──────────► 10 ─────────────────────► 30 ─────────────────► TAIL
//             │               │                          │
// Level 0:  HEAD ──────────► 10 ──────────► 20 ──────► 30 ──────────► 40 ──► TAIL
//
// Every node carries two flags and a lock:
//   fully_linked  set last by the inserter once every level is spliced in
//   marked        set by the remover under the victim's lock; the key is
//                 logically gone from this moment on
//   lock          held only while rewriting this node's own links or
//                 marking it
//
// INVARIANTS:
// 1. Level 0 keys strictly increase from HEAD to TAIL
// 2. A node linked at level L is linked at every level below L once it is
//    fully linked and until it is marked
// 3. A key is in the set iff its node is fully_linked && !marked
// 4. HEAD and TAIL are never marked, locked by readers, or relinked
// 5. Only the thread that marked a node unlinks and retires it
// 6. Unlinked nodes keep their own links, so a reader standing on one can
//    always walk forward to a live node
//
// =============================================================================
// FIND (lock-free, one sweep)
// =============================================================================
//
// From HEAD at max_level down to 0, walk right while next.key < key and
// record (pred, succ) at each level. `found` is the highest level where
// succ.key == key. No flags are checked here.
//
// =============================================================================
// INSERT
// =============================================================================
//
//   find ─► key found? ─ unmarked ─► wait fully_linked ─► return false
//              │           marked ──► retry
//              ▼
//   lock distinct preds, level 0 up ─► validate each level:
//        !pred.marked && !succ.marked && pred.next[l] == succ
//              │ fail ─► unlock all, retry
//              ▼
//   new.next[l] = succ[l]; pred[l].next[l] = new; new.fully_linked = true
//
// =============================================================================
// REMOVE
// =============================================================================
//
//   find ─► eligible? (fully_linked && top_level == found && !marked)
//              │ no ─► return false
//              ▼
//   lock victim, re-check mark, mark ─────── victim lock kept across retries
//              ▼
//   lock distinct preds, level 0 up ─► validate each level:
//        !pred.marked && pred.next[l] == victim
//              │ fail ─► unlock preds, retry (victim stays marked)
//              ▼
//   pred[l].next[l] = victim.next[l] for l = top..0; unlock; retire victim
//
// Lock order: a victim is locked before its predecessors, and predecessors
// are locked from level 0 upward, which is descending key order. Every
// thread therefore acquires locks in descending key order, so no cycle can
// form.
//
// =============================================================================

/// Predecessors and successors of a key at every level.
struct Position<K, V> {
    preds: [SkipNodePtr<K, V>; LEVEL_LIMIT],
    succs: [SkipNodePtr<K, V>; LEVEL_LIMIT],
}

impl<K, V> Position<K, V> {
    fn new() -> Self {
        Position {
            preds: [ptr::null_mut(); LEVEL_LIMIT],
            succs: [ptr::null_mut(); LEVEL_LIMIT],
        }
    }
}

/// The writer an abort is charged to.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum WriteOp {
    Insert,
    Remove,
}

/// Draw a tower height: `level = 0; while coin() { level += 1 }`, capped at
/// `max_level`.
pub(crate) fn random_level_with(max_level: usize, mut coin: impl FnMut() -> bool) -> usize {
    let mut level = 0;
    while level < max_level && coin() {
        level += 1;
    }
    level
}

/// A concurrent ordered map built on the lazy skip list protocol.
///
/// Readers (`contains`, `get`, `range`, iteration) take no locks. Writers lock
/// only the handful of nodes whose links they rewrite and validate their
/// snapshot before committing; a stale snapshot restarts the operation.
///
/// Unlinked nodes are handed to the reclamation domain `R`, never freed
/// directly.
///
pub struct LazySkipList<K, V, R: Reclaimer> {
    head: SkipNodePtr<K, V>,
    tail: SkipNodePtr<K, V>,
    config: SkipListConfig,
    stats: ContentionStats,
    reclaimer: R,
}

/// Ordered set flavour of [`LazySkipList`].
pub type SkipSet<K, R> = LazySkipList<K, (), R>;

impl<K: Ord, V, R: Reclaimer + Default> LazySkipList<K, V, R> {
    pub fn new() -> Self {
        Self::build(SkipListConfig::default(), R::default())
    }

    pub fn with_config(config: SkipListConfig) -> Result<Self> {
        Self::with_reclaimer(config, R::default())
    }
}

impl<K: Ord, V, R: Reclaimer + Default> Default for LazySkipList<K, V, R> {
    fn default() -> Self {
        Self::new()
    }
}

impl<K: Ord, V, R: Reclaimer> LazySkipList<K, V, R> {
    /// Build a list that retires nodes into `reclaimer`.
    pub fn with_reclaimer(config: SkipListConfig, reclaimer: R) -> Result<Self> {
        config.validate()?;
        Ok(Self::build(config, reclaimer))
    }

    fn build(config: SkipListConfig, reclaimer: R) -> Self {
        let (head, tail) = SkipNode::alloc_sentinels(config.max_level);
        debug!(max_level = config.max_level, "created lazy skip list");
        LazySkipList {
            head,
            tail,
            config,
            stats: ContentionStats::new(),
            reclaimer,
        }
    }

    pub fn max_level(&self) -> usize {
        self.config.max_level
    }

    pub fn config(&self) -> &SkipListConfig {
        &self.config
    }

    pub fn reclaimer(&self) -> &R {
        &self.reclaimer
    }

    pub fn stats(&self) -> StatsSnapshot {
        self.stats.snapshot()
    }

    #[inline]
    fn random_level(&self) -> usize {
        random_level_with(self.config.max_level, fastrand::bool)
    }

    /// Positional search.
    ///
    /// Fills `position` for every level and returns the highest level at
    /// which a node with `key` was seen. Must run inside a reader scope.
    fn find(&self, key: &K, position: &mut Position<K, V>) -> Option<usize> {
        let mut found = None;
        let mut pred = self.head;
        for level in (0..=self.config.max_level).rev() {
            unsafe {
                let mut curr = (*pred).next(level);
                while (*curr).key().precedes(key) {
                    pred = curr;
                    curr = (*pred).next(level);
                }
                if found.is_none() && (*curr).key().matches(key) {
                    found = Some(level);
                }
                position.preds[level] = pred;
                position.succs[level] = curr;
            }
        }
        found
    }

    /// Top-down search that stops at the first node carrying `key`.
    ///
    /// Returns the node if it is present, null otherwise. Must run inside a
    /// reader scope.
    fn search(&self, key: &K) -> SkipNodePtr<K, V> {
        let mut pred = self.head;
        for level in (0..=self.config.max_level).rev() {
            unsafe {
                let mut curr = (*pred).next(level);
                while (*curr).key().precedes(key) {
                    pred = curr;
                    curr = (*pred).next(level);
                }
                if (*curr).key().matches(key) {
                    return if (*curr).is_present() { curr } else { ptr::null_mut() };
                }
            }
        }
        ptr::null_mut()
    }

    fn note_retry(&self, op: WriteOp, attempt: u32) {
        match op {
            WriteOp::Insert => self.stats.record_insert_retry(),
            WriteOp::Remove => self.stats.record_remove_retry(),
        }
        trace!(?op, attempt, "validation failed, retrying");
        let threshold = self.config.retry_warn_threshold;
        if threshold != 0 && attempt == threshold {
            warn!(?op, attempt, "operation still retrying under contention");
        }
    }

    /// Lock the distinct predecessors for levels `0..=top_level` and check
    /// that each still links to the expected successor.
    ///
    /// Predecessors repeat only on adjacent levels, so comparing against the
    /// previously locked node is enough to never lock one twice.
    fn lock_predecessors<'n>(
        position: &Position<K, V>,
        top_level: usize,
        held: &mut Vec<MutexGuard<'n, ()>>,
        mut succ_ok: impl FnMut(usize, SkipNodePtr<K, V>) -> bool,
    ) -> bool
    where
        K: 'n,
        V: 'n,
    {
        let mut last_locked: SkipNodePtr<K, V> = ptr::null_mut();
        for level in 0..=top_level {
            let pred_ptr = position.preds[level];
            // Safety: preds were reached inside the caller's reader scope
            let pred: &'n SkipNode<K, V> = unsafe { &*pred_ptr };
            if pred_ptr != last_locked {
                held.push(pred.lock());
                last_locked = pred_ptr;
            }
            if pred.is_marked() || !succ_ok(level, pred.next(level)) {
                return false;
            }
        }
        true
    }

    /// Insert `key` with `value`. Returns `false` if the key is already
    /// present, in which case the set is unchanged.
    pub fn insert(&self, key: K, value: V) -> bool {
        let top_level = self.random_level();
        self.insert_at_level(key, value, top_level)
    }

    pub(crate) fn insert_at_level(&self, key: K, value: V, top_level: usize) -> bool {
        debug_assert!(top_level <= self.config.max_level);
        let mut position = Position::new();
        let mut attempt = 0u32;

        loop {
            let _scope = self.reclaimer.enter();

            if let Some(level) = self.find(&key, &mut position) {
                let found = unsafe { &*position.succs[level] };
                if !found.is_marked() {
                    let backoff = Backoff::new();
                    while !found.is_fully_linked() {
                        backoff.snooze();
                    }
                    return false;
                }
                // Mid-removal: let the remover finish unlinking first.
                attempt += 1;
                self.note_retry(WriteOp::Insert, attempt);
                continue;
            }

            let mut held = Vec::with_capacity(top_level + 1);
            let valid = Self::lock_predecessors(&position, top_level, &mut held, |level, next| {
                let succ = position.succs[level];
                next == succ && unsafe { !(*succ).is_marked() }
            });
            if !valid {
                drop(held);
                attempt += 1;
                self.note_retry(WriteOp::Insert, attempt);
                continue;
            }

            let node = SkipNode::alloc_entry(key, value, top_level);
            unsafe {
                for level in 0..=top_level {
                    (*node).set_next(level, position.succs[level]);
                }
                for level in 0..=top_level {
                    (*position.preds[level]).set_next(level, node);
                }
                (*node).set_fully_linked();
            }
            return true;
        }
    }

    /// Logically delete then physically unlink the node holding `key`.
    ///
    /// Returns the unlinked node, still allocated and not yet retired, or
    /// null if the key was absent or another remover won.
    fn unlink(&self, key: &K) -> SkipNodePtr<K, V> {
        let mut position = Position::new();
        let mut victim: SkipNodePtr<K, V> = ptr::null_mut();
        let mut victim_lock: Option<MutexGuard<'_, ()>> = None;
        let mut top_level = 0;
        let mut attempt = 0u32;

        loop {
            let _scope = self.reclaimer.enter();
            let found = self.find(key, &mut position);

            if victim_lock.is_none() {
                let Some(level) = found else {
                    return ptr::null_mut();
                };
                let candidate_ptr = position.succs[level];
                let candidate = unsafe { &*candidate_ptr };
                if !candidate.is_fully_linked()
                    || candidate.top_level() != level
                    || candidate.is_marked()
                {
                    return ptr::null_mut();
                }

                let guard = candidate.lock();
                if candidate.is_marked() {
                    return ptr::null_mut();
                }
                candidate.mark();
                top_level = candidate.top_level();
                victim = candidate_ptr;
                victim_lock = Some(guard);
            }

            let mut held = Vec::with_capacity(top_level + 1);
            let valid =
                Self::lock_predecessors(&position, top_level, &mut held, |_, next| next == victim);
            if !valid {
                drop(held);
                attempt += 1;
                self.note_retry(WriteOp::Remove, attempt);
                continue;
            }

            unsafe {
                for level in (0..=top_level).rev() {
                    (*position.preds[level]).set_next(level, (*victim).next(level));
                }
            }
            drop(held);
            drop(victim_lock);
            return victim;
        }
    }

    /// Remove `key`. Returns `true` if this call removed it.
    pub fn remove(&self, key: &K) -> bool {
        let node = self.unlink(key);
        if node.is_null() {
            return false;
        }
        unsafe { self.reclaimer.retire(node, SkipNode::dealloc) };
        true
    }

    /// Remove `key` and return a copy of the value it held.
    pub fn take(&self, key: &K) -> Option<V>
    where
        V: Clone,
    {
        let node = self.unlink(key);
        if node.is_null() {
            return None;
        }
        // The node is unlinked but not retired, so it is still ours to read.
        let value = unsafe { (*node).value().cloned() };
        unsafe { self.reclaimer.retire(node, SkipNode::dealloc) };
        value
    }

    pub fn contains(&self, key: &K) -> bool {
        let _scope = self.reclaimer.enter();
        !self.search(key).is_null()
    }

    /// Run `f` on the value stored under `key`, inside a reader scope.
    pub fn find_and_apply<F, T>(&self, key: &K, f: F) -> Option<T>
    where
        F: FnOnce(&V) -> T,
    {
        let _scope = self.reclaimer.enter();
        let node = self.search(key);
        if node.is_null() {
            return None;
        }
        unsafe { (*node).value() }.map(f)
    }

    pub fn get(&self, key: &K) -> Option<V>
    where
        V: Clone,
    {
        self.find_and_apply(key, V::clone)
    }

    /// Borrow the value under `key`. The returned reference keeps the value
    /// alive even if the key is removed meanwhile.
    pub fn get_ref(&self, key: &K) -> Option<R::GuardedRef<'_, V>> {
        let scope = self.reclaimer.enter();
        let node = self.search(key);
        if node.is_null() {
            return None;
        }
        let value = unsafe { (*node).value() }?;
        // The lookup's scope moves into the reference.
        Some(unsafe { self.reclaimer.make_ref(scope, value as *const V) })
    }

    /// Entries with keys inside `bounds`, in key order.
    ///
    /// An inverted range yields nothing and does not traverse.
    pub fn range<B>(&self, bounds: B) -> Vec<(K, V)>
    where
        B: RangeBounds<K>,
        K: Clone,
        V: Clone,
    {
        let start = bounds.start_bound();
        let end = bounds.end_bound();
        let mut entries = Vec::new();
        if range_is_empty(start, end) {
            return entries;
        }

        let _scope = self.reclaimer.enter();
        let mut pred = self.head;
        if let Bound::Included(from) | Bound::Excluded(from) = start {
            for level in (0..=self.config.max_level).rev() {
                unsafe {
                    let mut next = (*pred).next(level);
                    while (*next).key().precedes(from) {
                        pred = next;
                        next = (*pred).next(level);
                    }
                }
            }
        }

        let mut curr = unsafe { (*pred).next(0) };
        loop {
            let node = unsafe { &*curr };
            let Some(key) = node.key().as_key() else {
                break;
            };
            let past_end = match end {
                Bound::Included(to) => key > to,
                Bound::Excluded(to) => key >= to,
                Bound::Unbounded => false,
            };
            if past_end {
                break;
            }
            let after_start = match start {
                Bound::Excluded(from) => key > from,
                _ => true,
            };
            if after_start && node.is_present() {
                if let Some(value) = node.value() {
                    entries.push((key.clone(), value.clone()));
                }
            }
            curr = node.next(0);
        }
        entries
    }

    /// Iterate over present entries in key order.
    ///
    /// The iterator holds one reader scope for its whole life; keep it short
    /// under epoch reclamation.
    pub fn iter(&self) -> Iter<'_, K, V, R> {
        let scope = self.reclaimer.enter();
        let curr = unsafe { (*self.head).next(0) };
        Iter {
            _scope: scope,
            curr,
            _list: PhantomData,
        }
    }

    /// Number of present keys. A snapshot when writers are active.
    pub fn len(&self) -> usize {
        let _scope = self.reclaimer.enter();
        let mut count = 0;
        let mut curr = unsafe { (*self.head).next(0) };
        while curr != self.tail {
            let node = unsafe { &*curr };
            if node.is_present() {
                count += 1;
            }
            curr = node.next(0);
        }
        count
    }

    pub fn is_empty(&self) -> bool {
        let _scope = self.reclaimer.enter();
        let mut curr = unsafe { (*self.head).next(0) };
        while curr != self.tail {
            let node = unsafe { &*curr };
            if node.is_present() {
                return false;
            }
            curr = node.next(0);
        }
        true
    }

    /// Keys physically linked at `level`, marked or not.
    pub fn level_keys(&self, level: usize) -> Vec<K>
    where
        K: Clone,
    {
        let mut keys = Vec::new();
        if level > self.config.max_level {
            return keys;
        }
        let _scope = self.reclaimer.enter();
        let mut curr = unsafe { (*self.head).next(level) };
        while curr != self.tail {
            let node = unsafe { &*curr };
            if let Some(key) = node.key().as_key() {
                keys.push(key.clone());
            }
            curr = node.next(level);
        }
        keys
    }

    /// One line per non-empty level, top level first.
    pub fn render_levels(&self) -> String
    where
        K: fmt::Display + Clone,
    {
        let mut out = String::new();
        for level in (0..=self.config.max_level).rev() {
            let keys = self.level_keys(level);
            if keys.is_empty() {
                continue;
            }
            let line: Vec<String> = keys.iter().map(ToString::to_string).collect();
            out.push_str(&format!("level {}: {}\n", level, line.join(" -> ")));
        }
        out
    }

    pub fn flush(&self) {
        self.reclaimer.flush();
    }
}

impl<K: Ord, R: Reclaimer> LazySkipList<K, (), R> {
    pub fn add(&self, key: K) -> bool {
        self.insert(key, ())
    }
}

fn range_is_empty<K: Ord>(start: Bound<&K>, end: Bound<&K>) -> bool {
    match (start, end) {
        (Bound::Included(s), Bound::Included(e)) => s > e,
        (Bound::Included(s), Bound::Excluded(e))
        | (Bound::Excluded(s), Bound::Included(e))
        | (Bound::Excluded(s), Bound::Excluded(e)) => s >= e,
        _ => false,
    }
}

impl<K, V, R: Reclaimer> Drop for LazySkipList<K, V, R> {
    fn drop(&mut self) {
        let mut freed = 0usize;
        unsafe {
            let mut curr = (*self.head).next(0);
            while curr != self.tail {
                let next = (*curr).next(0);
                SkipNode::dealloc(curr);
                freed += 1;
                curr = next;
            }
            SkipNode::dealloc(self.head);
            SkipNode::dealloc(self.tail);
        }
        debug!(freed, "dropped lazy skip list");
    }
}

impl<K: Ord, V, R: Reclaimer> fmt::Debug for LazySkipList<K, V, R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LazySkipList")
            .field("max_level", &self.config.max_level)
            .field("len", &self.len())
            .field("stats", &self.stats.snapshot())
            .finish()
    }
}

// Safety: nodes are shared between threads only through atomics and
// per-node locks, and K/V are reached from several threads at once.
unsafe impl<K: Send + Sync, V: Send + Sync, R: Reclaimer> Send for LazySkipList<K, V, R> {}
unsafe impl<K: Send + Sync, V: Send + Sync, R: Reclaimer> Sync for LazySkipList<K, V, R> {}

/// In-order iterator over present entries, yielding copies.
pub struct Iter<'a, K, V, R: Reclaimer + 'a> {
    _scope: R::ReaderScope<'a>,
    curr: SkipNodePtr<K, V>,
    _list: PhantomData<&'a LazySkipList<K, V, R>>,
}

impl<'a, K: Clone, V: Clone, R: Reclaimer + 'a> Iterator for Iter<'a, K, V, R> {
    type Item = (K, V);

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            // Safety: the held scope keeps every reachable node allocated
            let node = unsafe { &*self.curr };
            let key = node.key().as_key()?;
            self.curr = node.next(0);
            if node.is_present() {
                if let Some(value) = node.value() {
                    return Some((key.clone(), value.clone()));
                }
            }
        }
    }
}

impl<'a, K: Ord + Clone, V: Clone, R: Reclaimer + 'a> IntoIterator for &'a LazySkipList<K, V, R> {
    type Item = (K, V);
    type IntoIter = Iter<'a, K, V, R>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}
