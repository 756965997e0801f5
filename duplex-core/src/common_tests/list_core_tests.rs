//! Common conformance tests for `AtomicList`, generic over the guard.
//!
//! Small fixed scenarios with a known final state, checked against the
//! quiescent invariants once every thread has finished.

use std::collections::HashSet;
use std::sync::atomic::{AtomicIsize, Ordering};
use std::sync::{Arc, Barrier};
use std::thread;

use crossbeam_utils::sync::WaitGroup;

use super::list_probe::{assert_quiescent_invariants, check_if_any, walk_forward};
use crate::data_structures::{AtomicList, ListConfig};
use crate::guard::Guard;

/// Element that counts its live instances, to check teardown.
#[derive(Debug)]
pub struct Tracked {
    pub value: i32,
    live: Arc<AtomicIsize>,
}

impl Tracked {
    pub fn new(value: i32, live: &Arc<AtomicIsize>) -> Self {
        live.fetch_add(1, Ordering::SeqCst);
        Tracked {
            value,
            live: Arc::clone(live),
        }
    }
}

impl Clone for Tracked {
    fn clone(&self) -> Self {
        Tracked::new(self.value, &self.live)
    }
}

impl PartialEq for Tracked {
    fn eq(&self, other: &Self) -> bool {
        self.value == other.value
    }
}

impl Drop for Tracked {
    fn drop(&mut self) {
        self.live.fetch_sub(1, Ordering::SeqCst);
    }
}

/// Which end each push of `push_from_four_threads` goes to.
#[derive(Clone, Copy, Debug)]
pub enum EndMix {
    /// Even threads push only at the front, odd threads only at the back.
    PerThread,
    /// Every thread alternates front and back on each push.
    PerPush,
}

/// Four detached threads, each pushing three values (1..=12 overall).
/// Returns once every thread signalled completion.
fn push_from_four_threads<G>(list: &Arc<AtomicList<i32, G>>, mix: EndMix)
where
    G: Guard + 'static,
{
    let done = WaitGroup::new();

    for t in 0..4 {
        let list = Arc::clone(list);
        let done = done.clone();
        thread::spawn(move || {
            for i in 0..3 {
                let value = t * 3 + i + 1;
                let front = match mix {
                    EndMix::PerThread => t % 2 == 0,
                    EndMix::PerPush => i % 2 == 0,
                };
                if front {
                    list.push_front(value);
                } else {
                    list.push_back(value);
                }
            }
            drop(done);
        });
    }

    done.wait();
}

/// Test concurrent pushes at both ends onto an empty list
pub fn test_push_both_ends_from_empty<G>(mix: EndMix)
where
    G: Guard + 'static,
{
    let list = Arc::new(AtomicList::<i32, G>::new());

    push_from_four_threads(&list, mix);

    assert_eq!(list.size(), 12);
    let values: HashSet<i32> = walk_forward(&list).into_iter().collect();
    assert_eq!(values, (1..=12).collect::<HashSet<_>>());

    if let EndMix::PerThread = mix {
        // Each thread's pushes keep their order relative to its own end.
        let values = walk_forward(&list);
        let position = |v: i32| values.iter().position(|&x| x == v);
        for t in 0..4 {
            let (first, last) = (position(t * 3 + 1), position(t * 3 + 3));
            if t % 2 == 0 {
                assert!(first > last, "front pushes of thread {t} out of order");
            } else {
                assert!(first < last, "back pushes of thread {t} out of order");
            }
        }
    }
    assert_quiescent_invariants(&list);
}

/// Test concurrent pushes onto a list pre-filled with five zeros
pub fn test_push_both_ends_onto_zeros<G>(mix: EndMix)
where
    G: Guard + 'static,
{
    let list = Arc::new(AtomicList::<i32, G>::from_values([0, 0, 0, 0, 0]));

    push_from_four_threads(&list, mix);

    assert_eq!(list.size(), 17);
    let mut expected = vec![0; 5];
    expected.extend(1..=12);
    assert!(check_if_any(&list, &expected));

    let mut values = walk_forward(&list);
    values.sort_unstable();
    assert_eq!(values, expected);
    assert_quiescent_invariants(&list);
}

/// Two threads popping the front 2 and 3 times drain a five element list
pub fn test_pop_front_drains<G>()
where
    G: Guard + 'static,
{
    let list = Arc::new(AtomicList::<i32, G>::from_values([1, 2, 3, 4, 5]));
    let barrier = Arc::new(Barrier::new(2));

    let handles: Vec<_> = [2, 3]
        .into_iter()
        .map(|pops| {
            let list = Arc::clone(&list);
            let barrier = Arc::clone(&barrier);
            thread::spawn(move || {
                barrier.wait();
                (0..pops).filter_map(|_| list.pop_front()).collect::<Vec<_>>()
            })
        })
        .collect();

    let mut popped: Vec<i32> = handles
        .into_iter()
        .flat_map(|handle| handle.join().unwrap())
        .collect();
    popped.sort_unstable();

    assert_eq!(popped, vec![1, 2, 3, 4, 5]);
    assert_eq!(list.size(), 0);
    assert!(list.empty());
    assert_quiescent_invariants(&list);
}

/// Two threads popping the back twice each leave only the head
pub fn test_pop_back_leaves_head<G>()
where
    G: Guard + 'static,
{
    let list = Arc::new(AtomicList::<i32, G>::from_values([1, 2, 3, 4, 5]));
    let barrier = Arc::new(Barrier::new(2));

    let handles: Vec<_> = (0..2)
        .map(|_| {
            let list = Arc::clone(&list);
            let barrier = Arc::clone(&barrier);
            thread::spawn(move || {
                barrier.wait();
                list.pop_back();
                list.pop_back();
            })
        })
        .collect();

    for handle in handles {
        handle.join().unwrap();
    }

    assert_eq!(list.size(), 1);
    assert_eq!(list.front(), Some(1));
    assert_eq!(list.back(), Some(1));
    assert_quiescent_invariants(&list);
}

/// Test that pops on an empty list from many threads change nothing
pub fn test_pop_empty_concurrently<G>()
where
    G: Guard + 'static,
{
    let list = Arc::new(AtomicList::<i32, G>::new());

    let handles: Vec<_> = (0..4)
        .map(|t| {
            let list = Arc::clone(&list);
            thread::spawn(move || {
                for _ in 0..100 {
                    let popped = if t % 2 == 0 {
                        list.pop_front()
                    } else {
                        list.pop_back()
                    };
                    assert_eq!(popped, None);
                }
            })
        })
        .collect();

    for handle in handles {
        handle.join().unwrap();
    }

    assert_eq!(list.size(), 0);
    assert_quiescent_invariants(&list);
}

/// N concurrent pushes, any mix of ends, give N distinct elements
pub fn test_no_lost_updates<G>()
where
    G: Guard + 'static,
{
    let list = Arc::new(AtomicList::<i32, G>::new());
    let num_threads = 8;
    let items_per_thread = 500;

    let handles: Vec<_> = (0..num_threads)
        .map(|thread_id| {
            let list = Arc::clone(&list);
            thread::spawn(move || {
                for i in 0..items_per_thread {
                    let value = thread_id * items_per_thread + i;
                    if (thread_id + i) % 2 == 0 {
                        list.push_front(value);
                    } else {
                        list.push_back(value);
                    }
                }
            })
        })
        .collect();

    for handle in handles {
        handle.join().unwrap();
    }

    let total = (num_threads * items_per_thread) as usize;
    assert_eq!(list.size(), total);

    let values = walk_forward(&list);
    let unique: HashSet<i32> = values.iter().copied().collect();
    assert_eq!(values.len(), total, "chain length disagrees with pushes");
    assert_eq!(unique.len(), total, "value linked more than once");
    assert_quiescent_invariants(&list);
}

/// S concurrent pops from a list of size S empty it, S - 1 leave one
pub fn test_concurrent_pops_by_count<G>()
where
    G: Guard + 'static,
{
    for (pops, remaining) in [(400, 0), (399, 1)] {
        let list = Arc::new(AtomicList::<i32, G>::from_values(0..400));
        let num_threads = 4;

        let handles: Vec<_> = (0..num_threads)
            .map(|t| {
                let list = Arc::clone(&list);
                let share = pops / num_threads + usize::from(t < pops % num_threads);
                thread::spawn(move || {
                    for i in 0..share {
                        let popped = if (t + i) % 2 == 0 {
                            list.pop_front()
                        } else {
                            list.pop_back()
                        };
                        assert!(popped.is_some(), "pop on a non-empty list returned None");
                    }
                })
            })
            .collect();

        for handle in handles {
            handle.join().unwrap();
        }

        assert_eq!(list.size(), remaining);
        assert_quiescent_invariants(&list);
    }
}

/// Single-threaded use keeps per-end FIFO and LIFO order
pub fn test_sequential_order<G>()
where
    G: Guard + 'static,
{
    let list = AtomicList::<i32, G>::new();

    // Queue: in at the back, out at the front.
    for i in 0..10 {
        list.push_back(i);
    }
    for i in 0..10 {
        assert_eq!(list.pop_front(), Some(i));
    }

    // Stack: in and out at the front.
    for i in 0..10 {
        list.push_front(i);
    }
    for i in (0..10).rev() {
        assert_eq!(list.pop_front(), Some(i));
    }

    // Reverse queue: in at the front, out at the back.
    for i in 0..10 {
        list.push_front(i);
    }
    assert_quiescent_invariants(&list);
    for i in 0..10 {
        assert_eq!(list.pop_back(), Some(i));
    }

    assert_eq!(list.pop_back(), None);
    assert_quiescent_invariants(&list);
}

/// Bounded variants succeed without contention even with no retries allowed
pub fn test_try_operations_uncontended<G>()
where
    G: Guard + 'static,
{
    let config = ListConfig::default().with_retry_limit(0);
    let list = AtomicList::<i32, G>::with_config(config);

    for i in 0..5 {
        assert!(list.try_push_back(i).is_ok());
        assert!(list.try_push_front(-i).is_ok());
    }
    assert_eq!(list.size(), 10);

    assert_eq!(list.try_pop_front(), Ok(Some(-4)));
    assert_eq!(list.try_pop_back(), Ok(Some(4)));
    assert_quiescent_invariants(&list);
}

/// Every value still on the chain is dropped with the list
pub fn test_teardown_drops_chain<G>()
where
    G: Guard + 'static,
{
    let live = Arc::new(AtomicIsize::new(0));

    {
        let list =
            AtomicList::<Tracked, G>::from_values((0..10).map(|i| Tracked::new(i, &live)));
        for i in 10..20 {
            list.push_back(Tracked::new(i, &live));
            list.push_front(Tracked::new(-i, &live));
        }

        assert_eq!(list.size(), 30);
        assert_eq!(live.load(Ordering::SeqCst), 30);
    }

    assert_eq!(live.load(Ordering::SeqCst), 0);
}
