//! Inspection helpers shared by the list test suites.
//!
//! All of them are meant for a quiescent list; under concurrent modification
//! they return whatever chain the walk happened to see.

use std::fmt::Debug;

use crate::data_structures::AtomicList;
use crate::guard::Guard;

/// True iff the list holds `expected.len()` elements and at least one of the
/// expected values is among them.
pub fn check_if_any<T, G>(list: &AtomicList<T, G>, expected: &[T]) -> bool
where
    T: Clone + PartialEq + Send + Sync + 'static,
    G: Guard,
{
    if list.size() != expected.len() {
        return false;
    }

    let values = walk_forward(list);
    expected.iter().any(|value| values.contains(value))
}

/// Values seen following `next` links from the head.
pub fn walk_forward<T, G>(list: &AtomicList<T, G>) -> Vec<T>
where
    T: Clone + Send + Sync + 'static,
    G: Guard,
{
    list.snapshot()
}

/// Values seen following `prev` links from the tail.
pub fn walk_backward<T, G>(list: &AtomicList<T, G>) -> Vec<T>
where
    T: Clone + Send + Sync + 'static,
    G: Guard,
{
    list.snapshot_rev()
}

/// Check the invariants that hold whenever no operation is in flight:
/// both walks visit `size()` nodes, one the mirror of the other, and the
/// accessors agree with the ends of the chain.
pub fn assert_quiescent_invariants<T, G>(list: &AtomicList<T, G>)
where
    T: Clone + PartialEq + Debug + Send + Sync + 'static,
    G: Guard,
{
    let forward = walk_forward(list);
    let mut backward = walk_backward(list);
    backward.reverse();

    assert_eq!(forward.len(), list.size(), "forward walk disagrees with size");
    assert_eq!(forward, backward, "prev links do not mirror next links");
    assert_eq!(list.empty(), forward.is_empty());
    assert_eq!(list.front(), forward.first().cloned());
    assert_eq!(list.back(), forward.last().cloned());
}
