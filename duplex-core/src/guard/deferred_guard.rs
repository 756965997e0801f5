//! Deferred guard implementation for testing.
//!
//! This module provides `DeferredGuard`, a simple guard implementation that
//! defers all node reclamation until the guard is dropped.

use std::sync::{Mutex, PoisonError};

use super::Guard;

type Reclaim = Box<dyn FnOnce() + Send>;

/// A simple guard that defers all node reclamation until the guard is dropped.
///
/// This is useful for testing where you want predictable destruction timing:
/// no slot is ever recycled while the owning list is alive, so every handle
/// ever read stays valid. Not suitable for long-running applications as
/// retired nodes accumulate until the guard is dropped.
///
/// # Thread Safety
///
/// `DeferredGuard` uses a `Mutex` internally to safely collect reclamations
/// from multiple threads. They all run when the guard is dropped.
///
pub struct DeferredGuard {
    deferred: Mutex<Vec<Reclaim>>,
}

impl DeferredGuard {
    /// Create a new deferred guard.
    pub fn new() -> Self {
        DeferredGuard {
            deferred: Mutex::new(Vec::new()),
        }
    }

    /// Number of reclamations waiting for the guard to drop.
    pub fn pending(&self) -> usize {
        self.deferred
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }
}

impl Default for DeferredGuard {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for DeferredGuard {
    fn drop(&mut self) {
        let deferred = self
            .deferred
            .get_mut()
            .unwrap_or_else(PoisonError::into_inner);

        for reclaim in deferred.drain(..) {
            reclaim();
        }
    }
}

impl Guard for DeferredGuard {
    /// For DeferredGuard, ReadGuard is a no-op since all nodes are protected
    /// until the list's stored guard drops.
    type ReadGuard = ();

    fn pin() -> Self::ReadGuard {
        // No-op for DeferredGuard - protection is provided by the stored guard
    }

    fn defer_reclaim<F>(&self, reclaim: F)
    where
        F: FnOnce() + Send + 'static,
    {
        self.deferred
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(Box::new(reclaim));
    }
}
