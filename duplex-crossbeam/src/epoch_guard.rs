//! Epoch-based guard implementation using crossbeam-epoch.
//!
//! This module provides `EpochGuard`, an implementation of the `Guard` trait
//! using crossbeam-epoch for memory reclamation.
//!
//! # Design
//!
//! `EpochGuard` is a zero-sized type that schedules slot reclamation on the
//! global epoch collector. Lists parameterized with `EpochGuard` recycle popped
//! slots as soon as no thread pinned at the time of the pop remains pinned:
//!
//! ```text
//! AtomicList<i32, EpochGuard>
//!     │
//!     ├── every operation pins the current thread (EpochGuard::pin)
//!     └── popped slots go back to the arena via crossbeam-epoch
//! ```
//!
//! # Example
//!
//! ```rust
//! use duplex_core::AtomicList;
//! use duplex_crossbeam::EpochGuard;
//!
//! let list: AtomicList<i32, EpochGuard> = AtomicList::new();
//!
//! list.push_back(42);
//! list.push_front(17);
//!
//! assert_eq!(list.pop_back(), Some(42));
//! assert_eq!(list.front(), Some(17));
//! ```

use crossbeam_epoch::{self as epoch, Guard as CrossbeamGuard};
use duplex_core::guard::Guard;

/// Epoch-based memory reclamation guard.
///
/// Slots are not recycled until all threads have advanced past the epoch
/// in which they were popped.
///
/// # Design
///
/// Unlike `DeferredGuard` which stores pending reclamations, `EpochGuard`
/// is a zero-sized type that schedules them on the global epoch collector.
/// Reclamation may therefore run after the list itself is dropped; the
/// scheduled closure keeps the node arena alive until then.
///
/// When `defer_reclaim` is called, it:
/// 1. Pins the current thread to the current epoch
/// 2. Schedules the reclamation to run after all threads have advanced
/// 3. Unpins immediately (the reclamation is managed globally)
///
/// # Performance
///
/// - **Pin overhead**: Very low (thread-local check)
/// - **Reclamation**: Batched, amortized O(1) per node
/// - **Memory**: Retired slots may accumulate while a thread stays pinned
///
#[derive(Clone, Copy, Default, Debug)]
pub struct EpochGuard {
    // Zero-sized - all state is in the global epoch collector
}

impl EpochGuard {
    /// Create a new epoch guard.
    ///
    /// This is a no-op since EpochGuard is stateless - the actual pinning
    /// happens when operations are performed.
    pub fn new() -> Self {
        EpochGuard {}
    }
}

impl Guard for EpochGuard {
    /// For EpochGuard, ReadGuard is an actual crossbeam epoch guard
    /// that pins the current thread for the duration of an operation.
    type ReadGuard = CrossbeamGuard;

    fn pin() -> Self::ReadGuard {
        epoch::pin()
    }

    fn defer_reclaim<F>(&self, reclaim: F)
    where
        F: FnOnce() + Send + 'static,
    {
        // The reclamation will run after all threads have advanced past the
        // current epoch.
        epoch::pin().defer(reclaim);
    }
}
