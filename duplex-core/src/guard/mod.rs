//! Guard trait for memory reclamation strategies.
//!
//! This module defines the `Guard` trait that abstracts over different memory
//! reclamation strategies (epoch-based, deferred, etc.).
//!
//! # Design
//!
//! The `Guard` trait lets the list be generic over its memory reclamation
//! strategy:
//!
//! ```text
//! AtomicList<T, G: Guard>
//!     │
//!     ├── AtomicList<T, EpochGuard>      (production, duplex-crossbeam)
//!     └── AtomicList<T, DeferredGuard>   (testing)
//! ```
//!
//! A popped node is unlinked from the anchor at once, but its arena slot is
//! handed to the guard and only recycled once no thread that might still hold
//! its handle is pinned. Because a handle cannot come back while such a thread
//! is pinned, the anchor CAS of that thread can never be fooled by a recycled
//! handle (no ABA).
//!
//! # Example
//!
//! ```rust,ignore
//! use duplex_core::AtomicList;
//! use duplex_crossbeam::EpochGuard;
//!
//! // Production: epoch-based reclamation
//! let list: AtomicList<i32, EpochGuard> = AtomicList::new();
//! list.push_back(42);
//!
//! // Testing: deferred reclamation
//! let test_list: AtomicList<i32, DeferredGuard> = AtomicList::new();
//! ```

mod deferred_guard;

pub use deferred_guard::DeferredGuard;

/// A memory reclamation guard that protects concurrent access to nodes.
///
/// Different implementations provide different trade-offs:
///
/// - **EpochGuard**: Low overhead, batched reclamation (crossbeam-epoch)
/// - **DeferredGuard**: Simple, defers all reclamation until the guard drops (testing)
///
/// # Safety Contract
///
/// Implementations must ensure that a closure passed to `defer_reclaim` does
/// not run while any `ReadGuard` pinned before the call is still alive.
///
/// # Design Note
///
/// Guards are stored in lists and must be `Send + Sync`. The stored guard is
/// used for scheduling reclamation. Actual thread pinning (for epoch-based
/// guards) happens per operation, not when the guard is created.
///
pub trait Guard: Sized + Default + Send + Sync {
    /// An active guard that protects reads for its lifetime.
    ///
    /// For epoch-based guards, this holds an actual pinned `crossbeam_epoch::Guard`.
    /// For deferred guards, this can be a unit type `()` since nothing is
    /// reclaimed before the list's stored guard drops.
    ///
    type ReadGuard: Sized;

    /// Pin an active read guard.
    ///
    /// Every handle loaded from the list while the returned guard is alive
    /// stays valid (its slot is not recycled) until the guard is dropped.
    ///
    fn pin() -> Self::ReadGuard;

    /// Schedule reclamation of a retired node.
    ///
    /// `reclaim` runs once it is safe, possibly on another thread and
    /// possibly after the list itself is gone, hence `Send + 'static`.
    ///
    fn defer_reclaim<F>(&self, reclaim: F)
    where
        F: FnOnce() + Send + 'static;
}
