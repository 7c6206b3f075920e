//! Benchmark comparing the lazy skip list against crossbeam-skiplist:
//! - LazySkipList and ShardedSkipList (epoch reclamation) vs SkipMap
//!
//! Run with: cargo bench --package lazyskip-crossbeam --bench skip_list_benchmark

use std::hint::black_box;
use std::sync::Arc;
use std::thread;

use criterion::BenchmarkId;
use criterion::Criterion;
use criterion::criterion_group;
use criterion::criterion_main;
use crossbeam_skiplist::SkipMap;
use mimalloc::MiMalloc;

use lazyskip_core::{ShardedSkipList, SkipListConfig};
use lazyskip_crossbeam::{EpochReclaimer, EpochSkipList};

#[global_allocator]
static GLOBAL: MiMalloc = MiMalloc;

const OPS_PER_THREAD: usize = 10_000;
const THREADS: [usize; 5] = [1, 2, 4, 8, 16];

type EpochShards = ShardedSkipList<i64, u64, EpochReclaimer>;

/// The operations every workload drives, so one harness covers each map.
trait BenchMap: Send + Sync + 'static {
    fn create() -> Self;
    fn insert(&self, key: i64) -> bool;
    fn remove(&self, key: i64) -> bool;
    fn contains(&self, key: i64) -> bool;
    fn scan(&self, from: i64, to: i64) -> usize;
}

impl BenchMap for EpochSkipList<i64, u64> {
    fn create() -> Self {
        EpochSkipList::new()
    }
    fn insert(&self, key: i64) -> bool {
        EpochSkipList::insert(self, key, key as u64)
    }
    fn remove(&self, key: i64) -> bool {
        EpochSkipList::remove(self, &key)
    }
    fn contains(&self, key: i64) -> bool {
        EpochSkipList::contains(self, &key)
    }
    fn scan(&self, from: i64, to: i64) -> usize {
        self.range(from..=to).len()
    }
}

impl BenchMap for EpochShards {
    fn create() -> Self {
        EpochShards::new(16).unwrap()
    }
    fn insert(&self, key: i64) -> bool {
        EpochShards::insert(self, key, key as u64)
    }
    fn remove(&self, key: i64) -> bool {
        EpochShards::remove(self, &key)
    }
    fn contains(&self, key: i64) -> bool {
        EpochShards::contains(self, &key)
    }
    fn scan(&self, from: i64, to: i64) -> usize {
        self.range(from..=to).len()
    }
}

impl BenchMap for SkipMap<i64, u64> {
    fn create() -> Self {
        SkipMap::new()
    }
    fn insert(&self, key: i64) -> bool {
        // SkipMap::insert replaces, so check first like a set would
        if SkipMap::contains_key(self, &key) {
            return false;
        }
        SkipMap::insert(self, key, key as u64);
        true
    }
    fn remove(&self, key: i64) -> bool {
        SkipMap::remove(self, &key).is_some()
    }
    fn contains(&self, key: i64) -> bool {
        SkipMap::contains_key(self, &key)
    }
    fn scan(&self, from: i64, to: i64) -> usize {
        self.range(from..=to).count()
    }
}

fn run_threads<M: BenchMap>(map: &Arc<M>, thread_count: usize, work: fn(&M, usize)) {
    let handles: Vec<_> = (0..thread_count)
        .map(|t| {
            let map = Arc::clone(map);
            thread::spawn(move || work(&map, t))
        })
        .collect();
    for handle in handles {
        handle.join().unwrap();
    }
}

// ============================================================================
// Disjoint inserts
// ============================================================================

fn bench_insert<M: BenchMap>(thread_count: usize) {
    let map = Arc::new(M::create());
    run_threads(&map, thread_count, |map, t| {
        let base = (t * OPS_PER_THREAD) as i64;
        for i in 0..OPS_PER_THREAD {
            map.insert(base + i as i64);
        }
    });
}

// ============================================================================
// Read-mostly mix (90% contains, 5% insert, 5% remove)
// ============================================================================

fn bench_read_mostly<M: BenchMap>(thread_count: usize) {
    let map = Arc::new(M::create());
    for key in (0..OPS_PER_THREAD as i64).step_by(2) {
        map.insert(key);
    }
    run_threads(&map, thread_count, |map, _| {
        for _ in 0..OPS_PER_THREAD {
            let key = fastrand::i64(0..2 * OPS_PER_THREAD as i64);
            match key % 20 {
                0 => {
                    map.insert(key);
                }
                1 => {
                    map.remove(key);
                }
                _ => {
                    black_box(map.contains(key));
                }
            }
        }
    });
}

// ============================================================================
// High contention (all threads on 100 keys)
// ============================================================================

fn bench_contention<M: BenchMap>(thread_count: usize) {
    let map = Arc::new(M::create());
    run_threads(&map, thread_count, |map, _| {
        for i in 0..OPS_PER_THREAD {
            let key = (i as i64) % 100;
            if i % 2 == 0 {
                map.insert(key);
            } else {
                map.remove(key);
            }
        }
    });
}

// ============================================================================
// Range scans while writers run
// ============================================================================

fn bench_scan<M: BenchMap>(thread_count: usize) {
    let map = Arc::new(M::create());
    for key in 0..OPS_PER_THREAD as i64 {
        map.insert(key);
    }
    run_threads(&map, thread_count, |map, t| {
        for i in 0..OPS_PER_THREAD / 100 {
            if t % 2 == 0 {
                let from = (i * 97 % OPS_PER_THREAD) as i64;
                black_box(map.scan(from, from + 64));
            } else {
                let key = (i * 31 % OPS_PER_THREAD) as i64;
                map.remove(key);
                map.insert(key);
            }
        }
    });
}

// ============================================================================
// Criterion benchmark groups
// ============================================================================

macro_rules! compare {
    ($c:expr, $group:literal, $bench:ident) => {{
        let mut group = $c.benchmark_group($group);
        for threads in THREADS {
            group.bench_with_input(BenchmarkId::new("lazy_skiplist", threads), &threads, |b, &t| {
                b.iter(|| $bench::<EpochSkipList<i64, u64>>(black_box(t)))
            });
            group.bench_with_input(BenchmarkId::new("sharded_16", threads), &threads, |b, &t| {
                b.iter(|| $bench::<EpochShards>(black_box(t)))
            });
            group.bench_with_input(BenchmarkId::new("crossbeam", threads), &threads, |b, &t| {
                b.iter(|| $bench::<SkipMap<i64, u64>>(black_box(t)))
            });
        }
        group.finish();
    }};
}

fn insert_benchmark(c: &mut Criterion) {
    compare!(c, "insert", bench_insert);
}

fn read_mostly_benchmark(c: &mut Criterion) {
    compare!(c, "read_mostly", bench_read_mostly);
}

fn contention_benchmark(c: &mut Criterion) {
    compare!(c, "contention", bench_contention);
}

fn scan_benchmark(c: &mut Criterion) {
    compare!(c, "scan", bench_scan);
}

fn tower_height_benchmark(c: &mut Criterion) {
    let mut group = c.benchmark_group("max_level");
    for max_level in [4usize, 12, 20] {
        group.bench_with_input(BenchmarkId::from_parameter(max_level), &max_level, |b, &m| {
            b.iter(|| {
                let list: EpochSkipList<i64, u64> =
                    EpochSkipList::with_config(SkipListConfig::default().with_max_level(m)).unwrap();
                for key in 0..OPS_PER_THREAD as i64 {
                    list.insert(key, 0);
                }
                black_box(list.len())
            })
        });
    }
    group.finish();
}

criterion_group!(
    benches,
    insert_benchmark,
    read_mostly_benchmark,
    contention_benchmark,
    scan_benchmark,
    tower_height_benchmark
);
criterion_main!(benches);
