use std::collections::{BTreeMap, BTreeSet};
use std::sync::{Arc, Barrier};
use std::thread;

use super::IntList;
use crate::reclaim::Reclaimer;

/// Test insert, contains, duplicate rejection and delete
pub fn test_basic_operations<R: Reclaimer>(list: &IntList<R>) {
    assert!(list.insert(5, 50));
    assert!(list.insert(10, 100));
    assert!(list.insert(3, 30));
    assert!(list.insert(7, 70));
    assert!(list.insert(1, 10));

    // Duplicates are rejected and keep the first value
    assert!(!list.insert(5, 55));
    assert!(!list.insert(10, 0));
    assert_eq!(list.get(&5), Some(50));

    for key in [1, 3, 5, 7, 10] {
        assert!(list.contains(&key), "missing key {}", key);
    }
    assert!(!list.contains(&2));
    assert!(!list.contains(&99));

    assert!(list.remove(&3));
    assert!(!list.contains(&3));
    assert!(!list.remove(&3));

    assert_eq!(list.len(), 4);
    let keys: Vec<i64> = list.iter().map(|(k, _)| k).collect();
    assert_eq!(keys, vec![1, 5, 7, 10]);
}

/// insert(5), insert(5), remove(5), remove(5), search(5) on one thread
pub fn test_single_thread_scenario<R: Reclaimer>(list: &IntList<R>) {
    assert!(list.insert(5, 1));
    assert!(!list.insert(5, 2));
    assert!(list.remove(&5));
    assert!(!list.remove(&5));
    assert_eq!(list.get(&5), None);
    assert!(!list.contains(&5));
}

/// Repeating an insert or a remove leaves the set unchanged
pub fn test_idempotence<R: Reclaimer>(list: &IntList<R>) {
    for key in 0..20 {
        list.insert(key, key);
    }
    let before = list.range(..);

    for key in 0..20 {
        assert!(!list.insert(key, -1));
    }
    assert_eq!(list.range(..), before);

    for key in 100..120 {
        assert!(!list.remove(&key));
    }
    assert_eq!(list.range(..), before);
}

/// Range boundaries, including inverted and unbounded ranges
pub fn test_range_queries<R: Reclaimer>(list: &IntList<R>) {
    for key in (0..100).step_by(5) {
        list.insert(key, key * 2);
    }

    assert_eq!(list.range(10..=20), vec![(10, 20), (15, 30), (20, 40)]);
    assert_eq!(list.range(11..20), vec![(15, 30)]);
    assert!(list.range(20..=10).is_empty());
    assert!(list.range(96..).is_empty());

    let all = list.range(i64::MIN..=i64::MAX);
    assert_eq!(all.len(), 20);
    assert!(all.windows(2).all(|w| w[0].0 < w[1].0));
    assert_eq!(all, list.range(..));
}

/// Test find_and_apply and get_ref
pub fn test_find_and_apply<R: Reclaimer>(list: &IntList<R>) {
    list.insert(5, 50);
    list.insert(10, 100);

    assert_eq!(list.find_and_apply(&5, |v| v * 2), Some(100));
    assert_eq!(list.find_and_apply(&10, |v| v + 1), Some(101));
    assert_eq!(list.find_and_apply(&99, |v| v * 2), None);

    let value = list.get_ref(&10).unwrap();
    assert_eq!(*value, 100);
    assert!(list.get_ref(&11).is_none());
}

/// take returns the stored value exactly once
pub fn test_take_returns_value<R: Reclaimer>(list: &IntList<R>) {
    list.insert(1, 111);
    assert_eq!(list.take(&1), Some(111));
    assert_eq!(list.take(&1), None);
    assert!(!list.contains(&1));
}

/// Single-threaded random operations checked against a BTreeMap
pub fn test_matches_model<R: Reclaimer>(list: &IntList<R>) {
    let mut model = BTreeMap::new();
    fastrand::seed(7);
    for _ in 0..5_000 {
        let key = fastrand::i64(-200..200);
        match fastrand::u8(0..3) {
            0 => {
                let fresh = !model.contains_key(&key);
                if fresh {
                    model.insert(key, key * 3);
                }
                assert_eq!(list.insert(key, key * 3), fresh);
            }
            1 => assert_eq!(list.remove(&key), model.remove(&key).is_some()),
            _ => assert_eq!(list.get(&key), model.get(&key).copied()),
        }
    }
    let expected: Vec<(i64, i64)> = model.into_iter().collect();
    assert_eq!(list.range(..), expected);
    assert_eq!(list.len(), expected.len());
}

/// Disjoint concurrent inserts and removes: the final set is exactly the
/// successful inserts minus the successful removes
pub fn test_concurrent_disjoint_writers<R: Reclaimer + 'static>(list: Arc<IntList<R>>) {
    let num_threads = 6;
    let per_thread = 400;

    let handles: Vec<_> = (0..num_threads)
        .map(|t| {
            let list = Arc::clone(&list);
            thread::spawn(move || {
                let mut inserted = BTreeSet::new();
                let mut removed = BTreeSet::new();
                for i in 0..per_thread {
                    let key = i * num_threads + t;
                    if list.insert(key, -key) {
                        inserted.insert(key);
                    }
                }
                for i in (0..per_thread).filter(|i| i % 3 == 0) {
                    let key = i * num_threads + t;
                    if list.remove(&key) {
                        removed.insert(key);
                    }
                }
                (inserted, removed)
            })
        })
        .collect();

    let mut expected = BTreeSet::new();
    for handle in handles {
        let (inserted, removed) = handle.join().unwrap();
        assert_eq!(inserted.len(), per_thread as usize, "disjoint insert lost");
        expected.extend(inserted.difference(&removed).copied());
    }

    let present: BTreeSet<i64> = list.iter().map(|(k, _)| k).collect();
    assert_eq!(present, expected, "lost update or phantom key");
    for key in &expected {
        assert_eq!(list.get(key), Some(-key));
    }
}

/// Insert {1,2,3} from three threads, then remove {3,3,2} from three
/// threads: exactly one remove(3) wins and {1} is left
pub fn test_duplicate_removal_scenario<R: Reclaimer + 'static>(make: impl Fn() -> IntList<R>) {
    for round in 0..50 {
        let list = Arc::new(make());

        let barrier = Arc::new(Barrier::new(3));
        let inserts: Vec<_> = [1, 2, 3]
            .into_iter()
            .map(|key| {
                let list = Arc::clone(&list);
                let barrier = Arc::clone(&barrier);
                thread::spawn(move || {
                    barrier.wait();
                    list.insert(key, key)
                })
            })
            .collect();
        for handle in inserts {
            assert!(handle.join().unwrap());
        }

        let barrier = Arc::new(Barrier::new(3));
        let removes: Vec<_> = [3, 3, 2]
            .into_iter()
            .map(|key| {
                let list = Arc::clone(&list);
                let barrier = Arc::clone(&barrier);
                thread::spawn(move || {
                    barrier.wait();
                    (key, list.remove(&key))
                })
            })
            .collect();

        let results: Vec<(i64, bool)> = removes.into_iter().map(|h| h.join().unwrap()).collect();
        let threes_won = results.iter().filter(|&&(k, ok)| k == 3 && ok).count();
        assert_eq!(threes_won, 1, "round {}: results {:?}", round, results);
        assert!(results.contains(&(2, true)));

        let keys: Vec<i64> = list.iter().map(|(k, _)| k).collect();
        assert_eq!(keys, vec![1], "round {}", round);
    }
}

/// Many threads racing to insert the same keys: one winner per key
pub fn test_concurrent_same_key_inserts<R: Reclaimer + 'static>(list: Arc<IntList<R>>) {
    let num_threads = 8;
    let keys = 200;
    let barrier = Arc::new(Barrier::new(num_threads));

    let handles: Vec<_> = (0..num_threads)
        .map(|t| {
            let list = Arc::clone(&list);
            let barrier = Arc::clone(&barrier);
            thread::spawn(move || {
                barrier.wait();
                (0..keys).filter(|&k| list.insert(k, t as i64)).count()
            })
        })
        .collect();

    let wins: usize = handles.into_iter().map(|h| h.join().unwrap()).sum();
    assert_eq!(wins, keys as usize, "every key inserted exactly once");
    assert_eq!(list.len(), keys as usize);
}
