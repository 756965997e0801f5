use std::fmt;
use std::io;
use std::sync::Arc;
use std::sync::atomic::{AtomicIsize, Ordering};

use crossbeam_utils::Backoff;
use log::{debug, error, trace, warn};

use super::ListConfig;
use crate::data_structures::internal::{Anchor, AtomicAnchor, End, Handle, Link, NodeArena, Status};
use crate::error::{ListError, PushError};
use crate::guard::Guard;

///
/// Concurrent doubly linked list with push and pop at both ends, based on
/// Michael's 'CAS-Based Lock-Free Algorithm for Shared Deques'.
///
/// Nodes live in a `NodeArena` and are named by 31-bit handles, which lets
/// head, tail and a push status share one 64-bit anchor word.
///
// =============================================================================
// LIST STRUCTURE
// =============================================================================
//
//            anchor = [head, tail, status]
//              │                     │
//              ▼                     ▼
//           ┌──────┐    ┌──────┐    ┌──────┐
//   NIL ◄───│  10  │◄──►│  20  │◄──►│  30  │───► NIL
//           └──────┘    └──────┘    └──────┘
//
// INVARIANTS (at quiescence):
// 1. count == 0 <=> anchor is [NIL, NIL, Stable]
// 2. head.prev == NIL and tail.next == NIL
// 3. Forward walk from head reaches tail in `count` steps, backward walk too
// 4. status == Stable
//
// =============================================================================
// PUSH (two phases)
// =============================================================================
//
// Phase 1: swing the anchor (linearization point)
// Phase 2: stabilize - fix the displaced end's outward link
//
// push_back(40), before:      [10, 30, Stable]
//
//    10 ◄──► 20 ◄──► 30          40.prev = 30 (private node)
//
// Step 1 - CAS anchor to [10, 40, PushBack]:
//
//    10 ◄──► 20 ◄──► 30 ◄─── 40
//                     │
//                   next still NIL (or stale)
//
// Step 2 - CAS 30.next to 40, then CAS anchor to [10, 40, Stable]:
//
//    10 ◄──► 20 ◄──► 30 ◄──► 40
//
// Any thread that finds the anchor unstable helps with step 2 before trying
// its own operation, so a preempted pusher never blocks the others.
//
// =============================================================================
// POP
// =============================================================================
//
// Only from a Stable anchor. pop_back() on [10, 40, Stable]:
//
// Step 1 - CAS anchor to [10, 40.prev, Stable]    (linearization point)
// Step 2 - CAS 30.next from 40 to NIL             (restores invariant 2)
// Step 3 - retire 40 through the guard
//
// On a single-node anchor [h, h, Stable] the pop swings straight to EMPTY,
// clearing head and tail in one CAS.
//
// =============================================================================
// RECLAMATION
// =============================================================================
//
// Every operation pins `G::ReadGuard` before reading the anchor. A retired
// slot is recycled only after all threads pinned at retirement unpin, so:
// - a handle loaded under a pin always names the same node until unpinned;
// - link writes by a slow stabilizer land in a node that is at worst retired,
//   never in a recycled one;
// - the anchor never returns to a value a pinned thread saw earlier (no ABA).
//
pub struct AtomicList<T, G: Guard> {
    anchor: AtomicAnchor,
    count: AtomicIsize,
    arena: Arc<NodeArena<T>>,
    /// Shared guard instance for deferred reclamation.
    guard: G,
    config: ListConfig,
}

impl<T, G: Guard> AtomicList<T, G> {
    pub fn new() -> Self {
        Self::with_config(ListConfig::default())
    }

    pub fn with_config(config: ListConfig) -> Self {
        let list = AtomicList {
            anchor: AtomicAnchor::new(Anchor::EMPTY),
            count: AtomicIsize::new(0),
            arena: Arc::new(NodeArena::new(config.segment_capacity())),
            guard: G::default(),
            config,
        };
        debug!(
            "atomic list created with {config:?}, first segment holds {} slots",
            list.arena.first_capacity()
        );
        list
    }

    /// Build a list from an ordered sequence of values, front to back.
    ///
    /// Single-threaded: nothing else can observe the list before it is returned,
    /// so nodes are linked directly without CAS.
    ///
    pub fn from_values<I>(values: I) -> Self
    where
        I: IntoIterator<Item = T>,
    {
        Self::from_values_with_config(values, ListConfig::default())
    }

    pub fn from_values_with_config<I>(values: I, config: ListConfig) -> Self
    where
        I: IntoIterator<Item = T>,
    {
        let list = Self::with_config(config);

        let mut head = Handle::NIL;
        let mut tail = Handle::NIL;
        let mut count: isize = 0;

        for value in values {
            let handle = list.allocate_or_panic(value);
            if tail.is_nil() {
                head = handle;
            } else {
                list.arena.slot(tail).set_link(Link::Next, handle);
                list.arena.slot(handle).set_link(Link::Prev, tail);
            }
            tail = handle;
            count += 1;
        }

        list.anchor.store(Anchor::new(head, tail, Status::Stable));
        list.count.store(count, Ordering::SeqCst);
        list
    }

    pub fn config(&self) -> &ListConfig {
        &self.config
    }

    /// Get the shared guard instance for this list.
    pub fn guard(&self) -> &G {
        &self.guard
    }

    // =========================================================================
    // Snapshot accessors
    // =========================================================================

    /// Element count snapshot.
    ///
    /// The counter is adjusted after the anchor CAS of each push/pop, not as
    /// part of it. A concurrent reader may therefore see a count that is off
    /// by the number of operations in flight, and a pop can even be counted
    /// before the push that created its node; negative transients read as 0.
    ///
    pub fn size(&self) -> usize {
        self.count.load(Ordering::SeqCst).max(0) as usize
    }

    pub fn len(&self) -> usize {
        self.size()
    }

    pub fn empty(&self) -> bool {
        self.count.load(Ordering::SeqCst) <= 0
    }

    pub fn is_empty(&self) -> bool {
        self.empty()
    }

    // =========================================================================
    // Protocol helpers
    // =========================================================================

    fn allocate_or_panic(&self, value: T) -> Handle {
        match self.arena.allocate(value) {
            Ok(handle) => handle,
            Err(_) => {
                error!("node arena exhausted at {} handles", Handle::CAPACITY);
                panic!("{}", ListError::CapacityExhausted { capacity: Handle::CAPACITY });
            }
        }
    }

    /// Finish the push recorded in `anchor`, if any.
    ///
    /// Makes the displaced end node point at the freshly pushed one, then
    /// marks the anchor stable. Returns early as soon as the anchor moves on,
    /// which only happens after some thread has completed the stabilization.
    ///
    fn stabilize(&self, anchor: Anchor) {
        let Some(end) = anchor.status().pending_end() else {
            return;
        };

        let pushed = anchor.end(end);
        let displaced = self.arena.slot(pushed).link(end.inward());
        if displaced.is_nil() || self.anchor.load() != anchor {
            return;
        }

        let displaced_slot = self.arena.slot(displaced);
        loop {
            // Read the link first, then confirm the anchor: a link value read
            // while the anchor still shows this push cannot come back (ABA)
            // while we are pinned.
            let outward = displaced_slot.link(end.outward());
            if self.anchor.load() != anchor {
                return;
            }
            if outward == pushed {
                break;
            }
            if displaced_slot
                .cas_link(end.outward(), outward, pushed)
                .is_ok()
            {
                break;
            }
        }

        // Failure means another helper already marked it stable.
        let _ = self
            .anchor
            .compare_exchange(anchor, anchor.with_status(Status::Stable));
    }

    /// Walk the chain from one end to the other and collect its handles.
    ///
    /// Must run under a pinned guard. Returns `None` if the anchor changed
    /// during the walk; the collected chain is then not trustworthy.
    ///
    fn collect_chain(&self, from: End) -> Option<(Anchor, Vec<Handle>)> {
        let anchor = self.anchor.load();
        if !anchor.is_stable() {
            self.stabilize(anchor);
            return None;
        }
        if anchor.is_empty() {
            return Some((anchor, Vec::new()));
        }

        let (start, stop, link) = match from {
            End::Front => (anchor.head(), anchor.tail(), Link::Next),
            End::Back => (anchor.tail(), anchor.head(), Link::Prev),
        };

        // A well-formed chain cannot be longer than the number of handles.
        let limit = self.arena.high_water() as usize;
        let mut chain = Vec::new();
        let mut current = start;

        while !current.is_nil() && chain.len() < limit {
            chain.push(current);
            if current == stop {
                break;
            }
            current = self.arena.slot(current).link(link);
        }

        if self.anchor.load() != anchor {
            return None;
        }

        if chain.last() != Some(&stop) {
            error!(
                "broken chain walking {from:?}: {} nodes seen before {current:?}, expected to reach {stop:?}",
                chain.len()
            );
        }

        Some((anchor, chain))
    }
}

impl<T, G> AtomicList<T, G>
where
    T: Clone + Send + Sync + 'static,
    G: Guard,
{
    // =========================================================================
    // Push
    // =========================================================================

    /// Insert at the head. Spins until the push is applied.
    pub fn push_front(&self, value: T) {
        self.push_unbounded(End::Front, value)
    }

    /// Insert at the tail. Spins until the push is applied.
    pub fn push_back(&self, value: T) {
        self.push_unbounded(End::Back, value)
    }

    /// Insert at the head, giving up after `config().retry_limit()` failed attempts.
    pub fn try_push_front(&self, value: T) -> Result<(), PushError<T>> {
        self.push_internal(End::Front, value, Some(self.config.retry_limit()))
    }

    /// Insert at the tail, giving up after `config().retry_limit()` failed attempts.
    pub fn try_push_back(&self, value: T) -> Result<(), PushError<T>> {
        self.push_internal(End::Back, value, Some(self.config.retry_limit()))
    }

    fn push_unbounded(&self, end: End, value: T) {
        if let Err(rejected) = self.push_internal(end, value, None) {
            // Without a retry limit only exhaustion can reject the push.
            panic!("{rejected}");
        }
    }

    fn push_internal(
        &self,
        end: End,
        value: T,
        retry_limit: Option<u32>,
    ) -> Result<(), PushError<T>> {
        let _guard = G::pin();

        let handle = match self.arena.allocate(value) {
            Ok(handle) => handle,
            Err(value) => {
                error!("node arena exhausted at {} handles", Handle::CAPACITY);
                return Err(PushError::new(
                    value,
                    ListError::CapacityExhausted {
                        capacity: Handle::CAPACITY,
                    },
                ));
            }
        };
        let node = self.arena.slot(handle);

        let backoff = Backoff::new();
        let mut failed_attempts: u32 = 0;

        loop {
            let anchor = self.anchor.load();

            if anchor.is_empty() {
                // A previous attempt may have linked the node to an old end.
                node.set_link(end.inward(), Handle::NIL);

                if self
                    .anchor
                    .compare_exchange(anchor, Anchor::single(handle))
                    .is_ok()
                {
                    break;
                }
            } else if anchor.is_stable() {
                node.set_link(end.inward(), anchor.end(end));

                let pushed = anchor.with_end(end, handle).with_status(end.push_status());
                if self.anchor.compare_exchange(anchor, pushed).is_ok() {
                    self.stabilize(pushed);
                    break;
                }
            } else {
                trace!("push {end:?}: helping to stabilize {anchor:?}");
                self.stabilize(anchor);
            }

            failed_attempts += 1;
            if retry_limit.is_some_and(|limit| failed_attempts > limit) {
                // Safety: the CAS that would have published the node never succeeded.
                let value = unsafe { self.arena.release_unpublished(handle) };
                warn!("push {end:?} gave up after {failed_attempts} contended attempts");

                let error = ListError::Contended {
                    attempts: failed_attempts,
                };
                return match value {
                    Some(value) => Err(PushError::new(value, error)),
                    None => unreachable!("unpublished node lost its value"),
                };
            }

            if self.config.spin_backoff() {
                backoff.spin();
            }
        }

        self.count.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    // =========================================================================
    // Pop
    // =========================================================================

    /// Remove the head and return its value. `None` if the list is empty.
    pub fn pop_front(&self) -> Option<T> {
        self.pop_unbounded(End::Front)
    }

    /// Remove the tail and return its value. `None` if the list is empty.
    pub fn pop_back(&self) -> Option<T> {
        self.pop_unbounded(End::Back)
    }

    /// Remove the head, giving up after `config().retry_limit()` failed attempts.
    pub fn try_pop_front(&self) -> Result<Option<T>, ListError> {
        self.pop_internal(End::Front, Some(self.config.retry_limit()))
    }

    /// Remove the tail, giving up after `config().retry_limit()` failed attempts.
    pub fn try_pop_back(&self) -> Result<Option<T>, ListError> {
        self.pop_internal(End::Back, Some(self.config.retry_limit()))
    }

    fn pop_unbounded(&self, end: End) -> Option<T> {
        // Without a retry limit the pop cannot fail.
        self.pop_internal(end, None).unwrap_or_default()
    }

    fn pop_internal(&self, end: End, retry_limit: Option<u32>) -> Result<Option<T>, ListError> {
        let _guard = G::pin();

        let backoff = Backoff::new();
        let mut failed_attempts: u32 = 0;

        let (removed, new_end) = loop {
            let anchor = self.anchor.load();

            if anchor.is_empty() {
                return Ok(None);
            }

            if anchor.is_single() {
                if self.anchor.compare_exchange(anchor, Anchor::EMPTY).is_ok() {
                    break (anchor.end(end), Handle::NIL);
                }
            } else if anchor.is_stable() {
                let removed = anchor.end(end);
                let inner = self.arena.slot(removed).link(end.inward());

                if self
                    .anchor
                    .compare_exchange(anchor, anchor.with_end(end, inner))
                    .is_ok()
                {
                    break (removed, inner);
                }
            } else {
                trace!("pop {end:?}: helping to stabilize {anchor:?}");
                self.stabilize(anchor);
            }

            failed_attempts += 1;
            if retry_limit.is_some_and(|limit| failed_attempts > limit) {
                warn!("pop {end:?} gave up after {failed_attempts} contended attempts");
                return Err(ListError::Contended {
                    attempts: failed_attempts,
                });
            }

            if self.config.spin_backoff() {
                backoff.spin();
            }
        };

        self.count.fetch_sub(1, Ordering::SeqCst);

        if !new_end.is_nil() {
            // Fails only if a push already linked the new end onward.
            let _ = self
                .arena
                .slot(new_end)
                .cas_link(end.outward(), removed, Handle::NIL);
        }

        // Clone rather than move out: pinned readers may still be looking at
        // the node. The original value drops when the slot is reclaimed.
        //
        // Safety: `removed` was read under our pin and is not yet retired.
        let value = unsafe { self.arena.value(removed) }.cloned();
        self.retire(removed);

        Ok(value)
    }

    fn retire(&self, handle: Handle) {
        let arena = Arc::clone(&self.arena);
        self.guard.defer_reclaim(move || {
            // Safety: the guard runs this only once no pinned reader remains.
            unsafe { arena.reclaim(handle) };
        });
    }

    // =========================================================================
    // Readers
    // =========================================================================

    /// Value at the head, `None` if the list is empty.
    pub fn front(&self) -> Option<T> {
        self.peek(End::Front)
    }

    /// Value at the tail, `None` if the list is empty.
    pub fn back(&self) -> Option<T> {
        self.peek(End::Back)
    }

    fn peek(&self, end: End) -> Option<T> {
        let _guard = G::pin();

        let anchor = self.anchor.load();
        if anchor.is_empty() {
            return None;
        }

        // Safety: the handle was loaded under our pin.
        unsafe { self.arena.value(anchor.end(end)) }.cloned()
    }

    // =========================================================================
    // Diagnostics
    // =========================================================================

    /// Values from head to tail.
    ///
    /// Exact at quiescence. Under concurrent modification the walk is retried
    /// until the anchor holds still for a whole pass, so the result is a chain
    /// that really existed at some instant.
    ///
    pub fn snapshot(&self) -> Vec<T> {
        self.snapshot_from(End::Front)
    }

    /// Values from tail to head, following `prev` links.
    pub fn snapshot_rev(&self) -> Vec<T> {
        self.snapshot_from(End::Back)
    }

    fn snapshot_from(&self, from: End) -> Vec<T> {
        let _guard = G::pin();
        let backoff = Backoff::new();

        loop {
            if let Some((_, chain)) = self.collect_chain(from) {
                return chain
                    .into_iter()
                    // Safety: each handle was part of the chain while we were pinned.
                    .filter_map(|handle| unsafe { self.arena.value(handle) }.cloned())
                    .collect();
            }
            backoff.snooze();
        }
    }
}

impl<T, G> AtomicList<T, G>
where
    T: Clone + Send + Sync + fmt::Display + 'static,
    G: Guard,
{
    /// Write the whole list, one element per line, with a single `write_all`
    /// so concurrent dumps to a shared stream do not interleave.
    pub fn dump<W: io::Write>(&self, out: &mut W) -> io::Result<()> {
        let rendered = self.to_string();
        out.write_all(rendered.as_bytes())
    }
}

impl<T, G> fmt::Display for AtomicList<T, G>
where
    T: Clone + Send + Sync + fmt::Display + 'static,
    G: Guard,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for value in self.snapshot() {
            writeln!(f, "{value}")?;
        }
        Ok(())
    }
}

impl<T, G> fmt::Debug for AtomicList<T, G>
where
    T: Clone + Send + Sync + fmt::Debug + 'static,
    G: Guard,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "AtomicList ")?;
        f.debug_list().entries(self.snapshot()).finish()
    }
}

impl<T, G: Guard> Default for AtomicList<T, G> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T, G: Guard> FromIterator<T> for AtomicList<T, G> {
    fn from_iter<I: IntoIterator<Item = T>>(iter: I) -> Self {
        Self::from_values(iter)
    }
}

impl<T, G: Guard> Drop for AtomicList<T, G> {
    fn drop(&mut self) {
        let _guard = G::pin();

        // An unstable anchor here means a pusher died mid-protocol; finish it
        // so the walk below sees the whole chain.
        let anchor = self.anchor.load();
        self.stabilize(anchor);
        let anchor = self.anchor.load();

        let mut dropped: usize = 0;
        let mut current = anchor.head();
        let limit = self.arena.high_water() as usize;

        while !current.is_nil() && dropped < limit {
            let next = self.arena.slot(current).link(Link::Next);

            // Safety: we own the list exclusively; retired nodes are not on
            // the chain and are left to the guard.
            drop(unsafe { self.arena.take(current) });
            dropped += 1;

            if current == anchor.tail() {
                break;
            }
            current = next;
        }

        self.anchor.store(Anchor::EMPTY);
        debug!(
            "atomic list dropped: {dropped} live nodes freed, {} handles ever allocated",
            self.arena.high_water()
        );
    }
}

// ============================================================================
// Tests - single-threaded protocol behavior
// ============================================================================
// Note: concurrent suites are in common_tests and run against every guard.
