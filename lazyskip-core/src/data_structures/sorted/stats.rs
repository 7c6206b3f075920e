use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

use crossbeam_utils::CachePadded;

/// Validation abort counters.
///
/// Only the retry path touches these, so the common case stays free of
/// shared writes.
#[derive(Default)]
pub struct ContentionStats {
    insert_retries: CachePadded<AtomicU64>,
    remove_retries: CachePadded<AtomicU64>,
}

impl ContentionStats {
    pub fn new() -> Self {
        Self::default()
    }

    #[inline]
    pub(crate) fn record_insert_retry(&self) {
        self.insert_retries.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub(crate) fn record_remove_retry(&self) {
        self.remove_retries.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            insert_retries: self.insert_retries.load(Ordering::Relaxed),
            remove_retries: self.remove_retries.load(Ordering::Relaxed),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StatsSnapshot {
    pub insert_retries: u64,
    pub remove_retries: u64,
}

impl StatsSnapshot {
    pub fn total_retries(&self) -> u64 {
        self.insert_retries + self.remove_retries
    }
}

impl std::ops::Add for StatsSnapshot {
    type Output = StatsSnapshot;

    fn add(self, rhs: StatsSnapshot) -> StatsSnapshot {
        StatsSnapshot {
            insert_retries: self.insert_retries + rhs.insert_retries,
            remove_retries: self.remove_retries + rhs.remove_retries,
        }
    }
}

impl std::iter::Sum for StatsSnapshot {
    fn sum<I: Iterator<Item = StatsSnapshot>>(iter: I) -> StatsSnapshot {
        iter.fold(StatsSnapshot::default(), |acc, s| acc + s)
    }
}

impl fmt::Display for StatsSnapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "aborts: {} (insert {}, remove {})",
            self.total_retries(),
            self.insert_retries,
            self.remove_retries
        )
    }
}
